use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-dimension standard scaler fit jointly with the segmentation model.
///
/// Zero-variance dimensions pass through unscaled so a degenerate training
/// set cannot produce NaNs at inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(records: &Array2<f64>) -> Self {
        let n = records.nrows().max(1) as f64;
        let mean: Vec<f64> = records
            .mean_axis(Axis(0))
            .map(|m| m.to_vec())
            .unwrap_or_else(|| vec![0.0; records.ncols()]);

        let std: Vec<f64> = (0..records.ncols())
            .map(|col| {
                let variance = records
                    .column(col)
                    .iter()
                    .map(|v| (v - mean[col]).powi(2))
                    .sum::<f64>()
                    / n;
                let std = variance.sqrt();
                if std > 0.0 {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Self { mean, std }
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(self.std.iter()))
            .map(|(v, (mean, std))| (v - mean) / std)
            .collect()
    }

    pub fn transform(&self, records: &Array2<f64>) -> Array2<f64> {
        let mut scaled = records.clone();
        for mut row in scaled.axis_iter_mut(Axis(0)) {
            for (col, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[col]) / self.std[col];
            }
        }
        scaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn scaled_columns_are_centered() {
        let data = array![[1.0, 10.0], [3.0, 30.0], [5.0, 50.0]];
        let scaler = StandardScaler::fit(&data);
        let scaled = scaler.transform(&data);

        for col in 0..2 {
            let mean: f64 = scaled.column(col).iter().sum::<f64>() / 3.0;
            assert!(mean.abs() < 1e-9);
        }
        // Middle row sits on the mean in both dimensions.
        assert_eq!(scaler.transform_row(&[3.0, 30.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn constant_column_does_not_produce_nan() {
        let data = array![[2.0, 1.0], [2.0, 2.0]];
        let scaler = StandardScaler::fit(&data);
        let row = scaler.transform_row(&[2.0, 1.5]);
        assert!(row.iter().all(|v| v.is_finite()));
        assert_eq!(row[0], 0.0);
    }
}
