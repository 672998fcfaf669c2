use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "OptiStock API",
        version = "0.2.0",
        description = r#"
# OptiStock Demand Forecasting & Inventory API

Retail decision support: per-product demand forecasts from sales history,
reorder recommendations against safety-buffered stock targets, and RFM-based
customer value segmentation. Models are trained in-process from the
transaction ledger and hot-swapped without downtime.

## Error Handling

Errors use a consistent format with appropriate HTTP status codes:

```json
{
  "error": "Not Found",
  "message": "product 42 not found",
  "timestamp": "2026-01-01T00:00:00Z"
}
```

`503 Service Unavailable` means no trained model is installed yet; run the
retrain endpoint first.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Products", description = "Product catalog and stock levels"),
        (name = "Forecasting", description = "Demand prediction endpoints"),
        (name = "Analytics", description = "Segmentation and reorder reporting"),
        (name = "Admin", description = "Model lifecycle management")
    ),
    paths(
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::update_stock,
        crate::handlers::forecast::predict_demand,
        crate::handlers::analytics::segment_customer,
        crate::handlers::analytics::reorder_report,
        crate::handlers::admin::start_retrain,
        crate::handlers::admin::retrain_status,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::handlers::products::ProductResponse,
            crate::handlers::products::StockUpdateRequest,
            crate::handlers::forecast::ForecastRequest,
            crate::handlers::admin::RetrainAccepted,
            crate::services::forecasting::DemandForecast,
            crate::services::forecasting::ReorderLine,
            crate::services::segmentation::CustomerSegment,
            crate::services::training::RetrainJob,
            crate::services::training::RetrainState,
            crate::services::training::RetrainReport,
            crate::services::reorder::StockStatus,
            crate::ml::segmentation::Segment,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_covers_core_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("OptiStock API"));
        assert!(json.contains("/api/v1/forecast/predict"));
        assert!(json.contains("/api/v1/analytics/reorder-report"));
        assert!(json.contains("/api/v1/admin/retrain"));
    }
}
