use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::ServiceError;
use crate::ml::encoder::CategoryEncoder;
use crate::ml::features::{FeatureRow, FEATURE_DIM};

/// Fixed placeholder confidence reported with every forecast. Not a
/// calibrated interval; callers must not treat it as uncertainty.
pub const FORECAST_CONFIDENCE: f64 = 0.85;

/// Hyperparameters for gradient-boosted regression trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub holdout_fraction: f64,
    pub seed: u64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 5,
            min_samples_leaf: 2,
            holdout_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A depth-limited regression tree fit to residuals by variance reduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegressionTree {
    nodes: Vec<TreeNode>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    fn fit(
        features: &[[f64; FEATURE_DIM]],
        residuals: &[f64],
        indices: Vec<usize>,
        max_depth: usize,
        min_samples_leaf: usize,
    ) -> Self {
        let min_samples_leaf = min_samples_leaf.max(1);
        let mut nodes = Vec::new();
        Self::build(
            &mut nodes,
            features,
            residuals,
            indices,
            max_depth,
            min_samples_leaf,
        );
        Self { nodes }
    }

    fn build(
        nodes: &mut Vec<TreeNode>,
        features: &[[f64; FEATURE_DIM]],
        residuals: &[f64],
        indices: Vec<usize>,
        depth: usize,
        min_samples_leaf: usize,
    ) -> usize {
        let mean = indices.iter().map(|&i| residuals[i]).sum::<f64>() / indices.len() as f64;

        let candidate = if depth == 0 || indices.len() < 2 * min_samples_leaf {
            None
        } else {
            Self::best_split(features, residuals, &indices, min_samples_leaf)
        };

        let Some(split) = candidate else {
            nodes.push(TreeNode::Leaf { value: mean });
            return nodes.len() - 1;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| features[i][split.feature] <= split.threshold);

        // Reserve the slot before recursing so child indices stay stable.
        let node_index = nodes.len();
        nodes.push(TreeNode::Leaf { value: mean });

        let left = Self::build(
            nodes,
            features,
            residuals,
            left_idx,
            depth - 1,
            min_samples_leaf,
        );
        let right = Self::build(
            nodes,
            features,
            residuals,
            right_idx,
            depth - 1,
            min_samples_leaf,
        );
        nodes[node_index] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_index
    }

    /// Exhaustive scan: per feature, sort by value and sweep split points,
    /// scoring by the squared-sum decomposition of variance reduction.
    fn best_split(
        features: &[[f64; FEATURE_DIM]],
        residuals: &[f64],
        indices: &[usize],
        min_samples_leaf: usize,
    ) -> Option<SplitCandidate> {
        let total: f64 = indices.iter().map(|&i| residuals[i]).sum();
        let n = indices.len();
        let mut best: Option<SplitCandidate> = None;

        for feature in 0..FEATURE_DIM {
            let mut order: Vec<usize> = indices.to_vec();
            order.sort_by(|&a, &b| {
                features[a][feature]
                    .partial_cmp(&features[b][feature])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left_sum = 0.0;
            for (pos, &idx) in order.iter().enumerate() {
                left_sum += residuals[idx];
                let left_count = pos + 1;
                let right_count = n - left_count;
                if left_count < min_samples_leaf || right_count < min_samples_leaf {
                    continue;
                }

                let here = features[idx][feature];
                let next = features[order[pos + 1]][feature];
                if next <= here {
                    continue; // no usable threshold between equal values
                }

                let right_sum = total - left_sum;
                let score = left_sum * left_sum / left_count as f64
                    + right_sum * right_sum / right_count as f64;

                if best.as_ref().map_or(true, |b| score > b.score) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (here + next) / 2.0,
                        score,
                    });
                }
            }
        }

        best
    }

    fn predict(&self, features: &[f64; FEATURE_DIM]) -> f64 {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Gradient-boosted regression trees over engineered product-day features.
///
/// Squared-loss boosting: start from the target mean, then fit each tree to
/// the current residuals and fold it in scaled by the learning rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedForecaster {
    base: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedForecaster {
    fn fit(rows: &[FeatureRow], params: &BoostParams) -> Self {
        let features: Vec<[f64; FEATURE_DIM]> = rows.iter().map(|r| r.features).collect();
        let targets: Vec<f64> = rows.iter().map(|r| r.target).collect();

        let base = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut predictions = vec![base; targets.len()];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = targets
                .iter()
                .zip(predictions.iter())
                .map(|(y, p)| y - p)
                .collect();

            let tree = RegressionTree::fit(
                &features,
                &residuals,
                (0..features.len()).collect(),
                params.max_depth,
                params.min_samples_leaf,
            );

            for (pred, feat) in predictions.iter_mut().zip(features.iter()) {
                *pred += params.learning_rate * tree.predict(feat);
            }
            trees.push(tree);
        }

        Self {
            base,
            learning_rate: params.learning_rate,
            trees,
        }
    }

    /// Raw (unclamped) model output.
    pub fn predict_raw(&self, features: &[f64; FEATURE_DIM]) -> f64 {
        self.base
            + self.learning_rate
                * self
                    .trees
                    .iter()
                    .map(|tree| tree.predict(features))
                    .sum::<f64>()
    }
}

/// Training diagnostics. RMSE is reported, never enforced: training always
/// replaces the live model, which keeps the hot-swap simple at the cost of
/// accepting a worse model unchecked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub training_rows: usize,
    pub holdout_rows: usize,
    pub holdout_rmse: f64,
}

fn rmse(model: &GradientBoostedForecaster, rows: &[&FeatureRow]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let sse: f64 = rows
        .iter()
        .map(|row| {
            let err = model.predict_raw(&row.features) - row.target;
            err * err
        })
        .sum();
    (sse / rows.len() as f64).sqrt()
}

/// Fits a forecaster on a seeded shuffle-split of the rows and reports
/// holdout RMSE (falling back to in-sample RMSE when the dataset is too
/// small to hold anything out).
pub fn train_forecaster(
    rows: &[FeatureRow],
    params: &BoostParams,
) -> Result<(GradientBoostedForecaster, TrainReport), ServiceError> {
    if rows.is_empty() {
        return Err(ServiceError::InsufficientData(
            "no feature rows survived lag construction".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..rows.len()).collect();
    let mut rng = StdRng::seed_from_u64(params.seed);
    order.shuffle(&mut rng);

    let holdout_len = ((rows.len() as f64) * params.holdout_fraction).floor() as usize;
    let (holdout_idx, train_idx) = order.split_at(holdout_len);

    let train_rows: Vec<FeatureRow> = train_idx.iter().map(|&i| rows[i].clone()).collect();
    let holdout_rows: Vec<&FeatureRow> = holdout_idx.iter().map(|&i| &rows[i]).collect();

    let model = GradientBoostedForecaster::fit(&train_rows, params);

    let holdout_rmse = if holdout_rows.is_empty() {
        rmse(&model, &train_rows.iter().collect::<Vec<_>>())
    } else {
        rmse(&model, &holdout_rows)
    };

    info!(
        training_rows = train_rows.len(),
        holdout_rows = holdout_rows.len(),
        holdout_rmse,
        "forecast model trained"
    );

    Ok((
        model,
        TrainReport {
            training_rows: train_rows.len(),
            holdout_rows: holdout_rows.len(),
            holdout_rmse,
        },
    ))
}

/// The forecast model and its paired category encoder as one versioned
/// artifact. Bundling them makes a mismatched model/encoder pair
/// structurally impossible across hot-swaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastArtifact {
    pub model: GradientBoostedForecaster,
    pub encoder: CategoryEncoder,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
    pub holdout_rmse: f64,
}

impl ForecastArtifact {
    /// Non-negative unit prediction: raw output rounded, negatives clamped
    /// to zero since demand cannot be negative.
    pub fn predict_units(&self, features: &[f64; FEATURE_DIM]) -> i64 {
        self.model.predict_raw(features).round().max(0.0) as i64
    }
}
