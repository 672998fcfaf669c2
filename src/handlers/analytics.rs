use axum::{
    extract::{Json, Path, State},
    routing::get,
    Router,
};

use crate::errors::ServiceError;
use crate::services::forecasting::{ForecastingService, ReorderLine};
use crate::services::segmentation::{CustomerSegment, SegmentationService};
use crate::{ApiResponse, AppState};

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/segment/:customer_id", get(segment_customer))
        .route("/reorder-report", get(reorder_report))
}

/// Classify a customer into a value segment
#[utoipa::path(
    get,
    path = "/api/v1/analytics/segment/{customer_id}",
    params(("customer_id" = i64, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer segment", body = crate::ApiResponse<CustomerSegment>),
        (status = 404, description = "Unknown customer or no purchase history", body = crate::errors::ErrorResponse),
        (status = 503, description = "No model trained yet", body = crate::errors::ErrorResponse)
    ),
    tag = "Analytics"
)]
pub async fn segment_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<i64>,
) -> Result<Json<ApiResponse<CustomerSegment>>, ServiceError> {
    let service = SegmentationService::new(
        state.db.clone(),
        state.registry.clone(),
        state.config.segment_budget_threshold,
    );
    let segment = service.segment_customer(customer_id).await?;
    Ok(Json(ApiResponse::success(segment)))
}

/// Stock assessment for every at-risk product
#[utoipa::path(
    get,
    path = "/api/v1/analytics/reorder-report",
    responses(
        (status = 200, description = "Products needing reorder", body = crate::ApiResponse<Vec<ReorderLine>>),
        (status = 503, description = "No model trained yet", body = crate::errors::ErrorResponse)
    ),
    tag = "Analytics"
)]
pub async fn reorder_report(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ReorderLine>>>, ServiceError> {
    let service = ForecastingService::new(
        state.db.clone(),
        state.registry.clone(),
        state.config.safety_buffer,
    );
    let lines = service.reorder_report().await?;
    Ok(Json(ApiResponse::success(lines)))
}
