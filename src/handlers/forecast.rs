use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::services::forecasting::{DemandForecast, ForecastingService};
use crate::{ApiResponse, AppState};

pub fn forecast_routes() -> Router<AppState> {
    Router::new().route("/predict", post(predict_demand))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForecastRequest {
    pub product_id: i64,
    /// Optional what-if price; defaults to the product's current base price
    #[validate(range(min = 0.0))]
    pub price_override: Option<f64>,
}

/// Predict next-day demand for a product
#[utoipa::path(
    post,
    path = "/api/v1/forecast/predict",
    request_body = ForecastRequest,
    responses(
        (status = 200, description = "Demand forecast", body = crate::ApiResponse<DemandForecast>),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
        (status = 503, description = "No model trained yet", body = crate::errors::ErrorResponse)
    ),
    tag = "Forecasting"
)]
pub async fn predict_demand(
    State(state): State<AppState>,
    Json(payload): Json<ForecastRequest>,
) -> Result<Json<ApiResponse<DemandForecast>>, ServiceError> {
    payload.validate()?;

    let service = ForecastingService::new(
        state.db.clone(),
        state.registry.clone(),
        state.config.safety_buffer,
    );
    let forecast = service
        .predict_demand(payload.product_id, payload.price_override)
        .await?;
    Ok(Json(ApiResponse::success(forecast)))
}
