use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::counter;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::ml::encoder::CategoryEncoder;
use crate::ml::features::{training_rows, FeatureRow};
use crate::ml::forecast::{train_forecaster, BoostParams, ForecastArtifact};
use crate::ml::registry::ModelRegistry;
use crate::ml::segmentation::{rfm_for_training, train_segmentation};
use crate::services::sales_history::SalesHistoryService;

/// Lifecycle state of a retraining job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RetrainState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl std::fmt::Display for RetrainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrainState::Pending => write!(f, "pending"),
            RetrainState::Running => write!(f, "running"),
            RetrainState::Succeeded => write!(f, "succeeded"),
            RetrainState::Failed => write!(f, "failed"),
        }
    }
}

/// Diagnostics from one completed training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RetrainReport {
    pub training_rows: usize,
    pub holdout_rmse: f64,
    pub segmented_customers: usize,
}

/// One retraining job as seen by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RetrainJob {
    pub job_id: Uuid,
    pub state: RetrainState,
    pub requested_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub report: Option<RetrainReport>,
}

/// In-memory job table; jobs are kept for the life of the process.
#[derive(Debug, Default)]
pub struct RetrainJobTracker {
    jobs: DashMap<Uuid, RetrainJob>,
}

impl RetrainJobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, job_id: Uuid) -> Option<RetrainJob> {
        self.jobs.get(&job_id).map(|entry| entry.clone())
    }

    fn insert_pending(&self) -> Uuid {
        let job_id = Uuid::new_v4();
        self.jobs.insert(
            job_id,
            RetrainJob {
                job_id,
                state: RetrainState::Pending,
                requested_at: Utc::now(),
                started_at: None,
                finished_at: None,
                error: None,
                report: None,
            },
        );
        job_id
    }

    fn mark_running(&self, job_id: Uuid) {
        if let Some(mut job) = self.jobs.get_mut(&job_id) {
            job.state = RetrainState::Running;
            job.started_at = Some(Utc::now());
        }
    }

    fn mark_succeeded(&self, job_id: Uuid, report: RetrainReport) {
        if let Some(mut job) = self.jobs.get_mut(&job_id) {
            job.state = RetrainState::Succeeded;
            job.finished_at = Some(Utc::now());
            job.report = Some(report);
        }
    }

    fn mark_failed(&self, job_id: Uuid, reason: String) {
        if let Some(mut job) = self.jobs.get_mut(&job_id) {
            job.state = RetrainState::Failed;
            job.finished_at = Some(Utc::now());
            job.error = Some(reason);
        }
    }
}

/// Trains both model artifacts from the transaction ledger and installs them
/// into the registry. Runs in the background; callers track progress through
/// the job tracker.
#[derive(Clone)]
pub struct TrainingService {
    db: Arc<DatabaseConnection>,
    registry: Arc<ModelRegistry>,
    jobs: Arc<RetrainJobTracker>,
    events: EventSender,
    artifacts_path: Option<PathBuf>,
}

impl TrainingService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        registry: Arc<ModelRegistry>,
        jobs: Arc<RetrainJobTracker>,
        events: EventSender,
        artifacts_path: Option<PathBuf>,
    ) -> Self {
        Self {
            db,
            registry,
            jobs,
            events,
            artifacts_path,
        }
    }

    /// Records a pending job and returns its id without running it.
    pub fn enqueue(&self) -> Uuid {
        self.jobs.insert_pending()
    }

    /// Kicks off a retrain in the background and returns the job id
    /// immediately.
    pub fn spawn_retrain(&self) -> Uuid {
        let job_id = self.enqueue();
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(err) = service.run_once(job_id).await {
                error!(%job_id, error = %err, "retraining job failed");
            }
        });
        job_id
    }

    /// Runs one retraining pass for an enqueued job: fit both artifacts from
    /// current data, then install them. Installation happens only after both
    /// fits succeed, so a failure leaves the serving registry untouched.
    #[instrument(skip(self), fields(%job_id))]
    pub async fn run_once(&self, job_id: Uuid) -> Result<RetrainReport, ServiceError> {
        self.jobs.mark_running(job_id);
        if let Err(err) = self.events.send(Event::RetrainStarted { job_id }).await {
            warn!(error = %err, "failed to emit retrain started event");
        }

        match self.train_all().await {
            Ok((forecast, segmentation, report)) => {
                self.registry.install_forecast(forecast);
                self.registry.install_segmentation(segmentation);
                self.persist_artifacts().await;
                self.jobs.mark_succeeded(job_id, report);
                counter!("optistock_retrain_success_total", 1);
                if let Err(err) = self
                    .events
                    .send(Event::RetrainCompleted {
                        job_id,
                        training_rows: report.training_rows,
                        holdout_rmse: report.holdout_rmse,
                        segmented_customers: report.segmented_customers,
                    })
                    .await
                {
                    warn!(error = %err, "failed to emit retrain completed event");
                }
                Ok(report)
            }
            Err(err) => {
                let reason = err.to_string();
                self.jobs.mark_failed(job_id, reason.clone());
                counter!("optistock_retrain_failure_total", 1);
                if let Err(send_err) = self
                    .events
                    .send(Event::RetrainFailed { job_id, reason })
                    .await
                {
                    warn!(error = %send_err, "failed to emit retrain failed event");
                }
                Err(err)
            }
        }
    }

    async fn train_all(
        &self,
    ) -> Result<
        (
            ForecastArtifact,
            crate::ml::segmentation::SegmentationArtifact,
            RetrainReport,
        ),
        ServiceError,
    > {
        let history = SalesHistoryService::new(self.db.clone());

        let histories = history.all_daily_histories().await?;
        let encoder = CategoryEncoder::fit(
            histories
                .iter()
                .map(|(product, _)| product.category.clone()),
        );

        let mut rows: Vec<FeatureRow> = Vec::new();
        for (_, daily) in &histories {
            rows.extend(training_rows(daily, &encoder)?);
        }

        let (model, train_report) = train_forecaster(&rows, &BoostParams::default())?;
        let forecast = ForecastArtifact {
            model,
            encoder,
            trained_at: Utc::now(),
            training_rows: train_report.training_rows,
            holdout_rmse: train_report.holdout_rmse,
        };

        let purchases = history.all_purchases().await?;
        let rfm = rfm_for_training(&purchases)?;
        let segmentation = train_segmentation(&rfm)?;

        let report = RetrainReport {
            training_rows: train_report.training_rows,
            holdout_rmse: train_report.holdout_rmse,
            segmented_customers: segmentation.customers,
        };
        info!(
            training_rows = report.training_rows,
            holdout_rmse = report.holdout_rmse,
            segmented_customers = report.segmented_customers,
            "training pass complete"
        );

        Ok((forecast, segmentation, report))
    }

    /// Best-effort write of the registry blob; serving is unaffected when
    /// the write fails.
    async fn persist_artifacts(&self) {
        let Some(path) = &self.artifacts_path else {
            return;
        };
        match self.registry.export_blob() {
            Ok(blob) => {
                if let Err(err) = tokio::fs::write(path, blob).await {
                    warn!(path = %path.display(), error = %err, "failed to persist model artifacts");
                } else {
                    info!(path = %path.display(), "model artifacts persisted");
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize model artifacts"),
        }
    }
}

/// Loads previously persisted artifacts into the registry at startup. A
/// missing or unreadable file is not an error; the service simply starts
/// without models.
pub async fn warm_start(registry: &ModelRegistry, path: &Path) {
    match tokio::fs::read(path).await {
        Ok(blob) => match registry.restore_blob(&blob) {
            Ok(()) => info!(path = %path.display(), "model artifacts restored"),
            Err(err) => warn!(path = %path.display(), error = %err, "persisted artifacts are unreadable"),
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no persisted model artifacts, starting cold");
        }
        Err(err) => warn!(path = %path.display(), error = %err, "failed to read persisted artifacts"),
    }
}
