use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::ServiceError;
use crate::ml::forecast::ForecastArtifact;
use crate::ml::segmentation::SegmentationArtifact;

/// In-process store for the currently served model artifacts.
///
/// Each slot holds an `Arc` snapshot that is swapped atomically: readers
/// clone the `Arc` under a short read lock and keep serving the version they
/// grabbed even if a retrain installs a replacement mid-request. Because an
/// artifact bundles the model with its paired preprocessor, a request can
/// never observe a model from one training run with an encoder or scaler
/// from another.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    forecast: RwLock<Option<Arc<ForecastArtifact>>>,
    segmentation: RwLock<Option<Arc<SegmentationArtifact>>>,
}

/// Serialized registry contents for warm starts across restarts.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegistryBlob {
    pub forecast: Option<ForecastArtifact>,
    pub segmentation: Option<SegmentationArtifact>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current forecast artifact, or `None` before the first successful
    /// training run.
    pub fn forecast(&self) -> Option<Arc<ForecastArtifact>> {
        self.forecast
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn segmentation(&self) -> Option<Arc<SegmentationArtifact>> {
        self.segmentation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the served forecast artifact. A retrain always installs its
    /// result, even when the holdout error is worse than the incumbent's;
    /// newer data wins over a stale score.
    pub fn install_forecast(&self, artifact: ForecastArtifact) {
        let incumbent = self
            .forecast
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::new(artifact));
        match incumbent {
            Some(previous) => info!(
                previous_trained_at = %previous.trained_at,
                "forecast model replaced"
            ),
            None => info!("forecast model installed"),
        }
    }

    pub fn install_segmentation(&self, artifact: SegmentationArtifact) {
        let incumbent = self
            .segmentation
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::new(artifact));
        match incumbent {
            Some(previous) => info!(
                previous_trained_at = %previous.trained_at,
                "segmentation model replaced"
            ),
            None => info!("segmentation model installed"),
        }
    }

    /// Snapshot of both slots as a JSON blob.
    pub fn export_blob(&self) -> Result<Vec<u8>, ServiceError> {
        let blob = RegistryBlob {
            forecast: self.forecast().map(|a| a.as_ref().clone()),
            segmentation: self.segmentation().map(|a| a.as_ref().clone()),
        };
        Ok(serde_json::to_vec(&blob)?)
    }

    /// Restores both slots from a blob produced by [`export_blob`].
    ///
    /// [`export_blob`]: ModelRegistry::export_blob
    pub fn restore_blob(&self, bytes: &[u8]) -> Result<(), ServiceError> {
        let blob: RegistryBlob = serde_json::from_slice(bytes)?;
        match blob.forecast {
            Some(artifact) => self.install_forecast(artifact),
            None => warn!("restored registry blob has no forecast model"),
        }
        match blob.segmentation {
            Some(artifact) => self.install_segmentation(artifact),
            None => warn!("restored registry blob has no segmentation model"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::encoder::CategoryEncoder;
    use crate::ml::features::FeatureRow;
    use crate::ml::forecast::{train_forecaster, BoostParams};

    fn artifact_for(category: &str, level: f64) -> ForecastArtifact {
        let encoder = CategoryEncoder::fit([category.to_string()]);
        let rows: Vec<FeatureRow> = (0..30)
            .map(|i| FeatureRow {
                features: [1.0, 10.0, 0.0, (i % 7) as f64, 6.0, level, level, level],
                target: level,
            })
            .collect();
        let (model, report) = train_forecaster(&rows, &BoostParams::default()).unwrap();
        ForecastArtifact {
            model,
            encoder,
            trained_at: chrono::Utc::now(),
            training_rows: report.training_rows,
            holdout_rmse: report.holdout_rmse,
        }
    }

    #[test]
    fn registry_starts_empty() {
        let registry = ModelRegistry::new();
        assert!(registry.forecast().is_none());
        assert!(registry.segmentation().is_none());
    }

    #[test]
    fn install_replaces_and_readers_keep_their_snapshot() {
        let registry = ModelRegistry::new();
        registry.install_forecast(artifact_for("toys", 5.0));

        let held = registry.forecast().expect("installed");
        registry.install_forecast(artifact_for("games", 50.0));

        // The reader's snapshot is the old pair, unchanged by the swap.
        assert!(held.encoder.contains("toys"));
        assert!(registry.forecast().expect("replaced").encoder.contains("games"));
    }

    #[test]
    fn blob_roundtrip_restores_both_slots() {
        let registry = ModelRegistry::new();
        registry.install_forecast(artifact_for("toys", 5.0));

        let blob = registry.export_blob().unwrap();
        let restored = ModelRegistry::new();
        restored.restore_blob(&blob).unwrap();

        assert!(restored.forecast().expect("forecast").encoder.contains("toys"));
        assert!(restored.segmentation().is_none());
    }
}
