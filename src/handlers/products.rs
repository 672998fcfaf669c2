use axum::{
    extract::{Json, Path, State},
    routing::{get, put},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::product;
use crate::errors::ServiceError;
use crate::events::Event;
use crate::services::sales_history::SalesHistoryService;
use crate::{ApiResponse, AppState};

pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
        .route("/:id/stock", put(update_stock))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub base_price: Decimal,
    pub stock: i32,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            category: model.category,
            base_price: model.base_price,
            stock: model.stock,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StockUpdateRequest {
    /// New absolute stock level
    #[validate(range(min = 0))]
    pub quantity: i32,
}

/// List the product catalog
#[utoipa::path(
    get,
    path = "/api/v1/products",
    responses(
        (status = 200, description = "Product catalog", body = crate::ApiResponse<Vec<ProductResponse>>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ProductResponse>>>, ServiceError> {
    let service = SalesHistoryService::new(state.db.clone());
    let products = service.list_products().await?;
    Ok(Json(ApiResponse::success(
        products.into_iter().map(ProductResponse::from).collect(),
    )))
}

/// Fetch one product
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = crate::ApiResponse<ProductResponse>),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let service = SalesHistoryService::new(state.db.clone());
    let product = service.get_product(id).await?;
    Ok(Json(ApiResponse::success(product.into())))
}

/// Set a product's stock level
#[utoipa::path(
    put,
    path = "/api/v1/products/{id}/stock",
    params(("id" = i64, Path, description = "Product id")),
    request_body = StockUpdateRequest,
    responses(
        (status = 200, description = "Stock updated", body = crate::ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn update_stock(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<StockUpdateRequest>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    payload.validate()?;

    let service = SalesHistoryService::new(state.db.clone());
    let (old_stock, updated) = service.update_stock(id, payload.quantity).await?;

    if let Err(err) = state
        .event_sender
        .send(Event::StockUpdated {
            product_id: id,
            old_stock,
            new_stock: updated.stock,
        })
        .await
    {
        warn!(product_id = id, error = %err, "failed to emit stock event");
    }

    Ok(Json(ApiResponse::success(updated.into())))
}
