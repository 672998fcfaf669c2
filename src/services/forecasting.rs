use std::sync::Arc;

use metrics::counter;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::errors::ServiceError;
use crate::ml::features::inference_vector;
use crate::ml::forecast::FORECAST_CONFIDENCE;
use crate::ml::registry::ModelRegistry;
use crate::services::reorder::{assess_stock, StockStatus};
use crate::services::sales_history::SalesHistoryService;

/// Demand prediction for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DemandForecast {
    pub product_id: i64,
    /// Predicted units for the next day, never negative
    pub predicted_sales: i64,
    pub confidence_score: f64,
}

/// One at-risk product in the reorder report.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ReorderLine {
    pub product_id: i64,
    pub name: String,
    pub current_stock: i32,
    pub predicted_demand: i64,
    pub status: StockStatus,
    pub recommended_order: i64,
}

pub struct ForecastingService {
    history: SalesHistoryService,
    registry: Arc<ModelRegistry>,
    safety_buffer: i64,
}

impl ForecastingService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        registry: Arc<ModelRegistry>,
        safety_buffer: i64,
    ) -> Self {
        Self {
            history: SalesHistoryService::new(db),
            registry,
            safety_buffer,
        }
    }

    /// Predicts tomorrow's demand for a product.
    ///
    /// A product with no sales history short-circuits to zero demand with
    /// zero confidence before the model is consulted, so cold products stay
    /// serveable even when no model is installed yet.
    #[instrument(skip(self))]
    pub async fn predict_demand(
        &self,
        product_id: i64,
        price_override: Option<f64>,
    ) -> Result<DemandForecast, ServiceError> {
        let product = self.history.get_product(product_id).await?;
        let history = self.history.product_daily_history(&product).await?;

        // Feature construction is encoder-dependent, so an installed model is
        // only required once we know there is history to featurize.
        let Some(artifact) = self.registry.forecast() else {
            if history.is_empty() {
                counter!("optistock_forecast_cold_product_total", 1);
                return Ok(DemandForecast {
                    product_id,
                    predicted_sales: 0,
                    confidence_score: 0.0,
                });
            }
            return Err(ServiceError::ModelUnavailable(
                "no forecast model trained yet".to_string(),
            ));
        };

        let Some(features) = inference_vector(&history, &artifact.encoder, price_override)? else {
            counter!("optistock_forecast_cold_product_total", 1);
            return Ok(DemandForecast {
                product_id,
                predicted_sales: 0,
                confidence_score: 0.0,
            });
        };

        let predicted_sales = artifact.predict_units(&features);
        debug!(product_id, predicted_sales, "demand predicted");

        Ok(DemandForecast {
            product_id,
            predicted_sales,
            confidence_score: FORECAST_CONFIDENCE,
        })
    }

    /// Stock assessment across the whole catalog, keeping only products that
    /// need attention. Healthy (OK) products are omitted.
    #[instrument(skip(self))]
    pub async fn reorder_report(&self) -> Result<Vec<ReorderLine>, ServiceError> {
        let products = self.history.list_products().await?;
        let mut lines = Vec::new();

        for product in products {
            let forecast = self.predict_demand(product.id, None).await?;
            let assessment = assess_stock(
                product.stock as i64,
                forecast.predicted_sales,
                self.safety_buffer,
            );
            if assessment.status == StockStatus::Ok {
                continue;
            }
            lines.push(ReorderLine {
                product_id: product.id,
                name: product.name,
                current_stock: product.stock,
                predicted_demand: forecast.predicted_sales,
                status: assessment.status,
                recommended_order: assessment.recommended_order,
            });
        }

        Ok(lines)
    }
}
