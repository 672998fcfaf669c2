use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::training::{RetrainJob, RetrainState, TrainingService};
use crate::{ApiResponse, AppState};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/retrain", post(start_retrain))
        .route("/retrain/:job_id", get(retrain_status))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RetrainAccepted {
    pub job_id: Uuid,
    pub state: RetrainState,
}

/// Start a background retraining job
#[utoipa::path(
    post,
    path = "/api/v1/admin/retrain",
    responses(
        (status = 202, description = "Retraining job accepted", body = crate::ApiResponse<RetrainAccepted>)
    ),
    tag = "Admin"
)]
pub async fn start_retrain(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ApiResponse<RetrainAccepted>>), ServiceError> {
    let service = TrainingService::new(
        state.db.clone(),
        state.registry.clone(),
        state.retrain_jobs.clone(),
        state.event_sender.clone(),
        state.config.model_artifacts_path.clone().map(Into::into),
    );
    let job_id = service.spawn_retrain();

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(RetrainAccepted {
            job_id,
            state: RetrainState::Pending,
        })),
    ))
}

/// Inspect a retraining job
#[utoipa::path(
    get,
    path = "/api/v1/admin/retrain/{job_id}",
    params(("job_id" = Uuid, Path, description = "Job id returned by the retrain endpoint")),
    responses(
        (status = 200, description = "Job status", body = crate::ApiResponse<RetrainJob>),
        (status = 404, description = "Unknown job", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn retrain_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<ApiResponse<RetrainJob>>, ServiceError> {
    let job = state
        .retrain_jobs
        .get(job_id)
        .ok_or_else(|| ServiceError::NotFound(format!("retrain job {} not found", job_id)))?;
    Ok(Json(ApiResponse::success(job)))
}
