use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::errors::ServiceError;
use crate::ml::registry::ModelRegistry;
use crate::ml::segmentation::{rfm_for_inference, Segment};
use crate::services::sales_history::SalesHistoryService;

/// A customer's segment with the RFM evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CustomerSegment {
    pub customer_id: i64,
    pub segment: Segment,
    pub recency: i64,
    pub frequency: i64,
    pub monetary: f64,
    pub model_trained_at: DateTime<Utc>,
}

pub struct SegmentationService {
    history: SalesHistoryService,
    registry: Arc<ModelRegistry>,
    budget_threshold: f64,
}

impl SegmentationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        registry: Arc<ModelRegistry>,
        budget_threshold: f64,
    ) -> Self {
        Self {
            history: SalesHistoryService::new(db),
            registry,
            budget_threshold,
        }
    }

    /// Classifies one customer by purchase history.
    ///
    /// A customer without transactions has no defined segment and is
    /// reported as not found, matching the behavior for an unknown id.
    #[instrument(skip(self))]
    pub async fn segment_customer(
        &self,
        customer_id: i64,
    ) -> Result<CustomerSegment, ServiceError> {
        let purchases = self.history.customer_purchases(customer_id).await?;
        let rfm = rfm_for_inference(customer_id, &purchases).ok_or_else(|| {
            ServiceError::NotFound(format!(
                "customer {} has no purchase history",
                customer_id
            ))
        })?;

        let artifact = self.registry.segmentation().ok_or_else(|| {
            ServiceError::ModelUnavailable("no segmentation model trained yet".to_string())
        })?;

        let segment = artifact.classify(&rfm, self.budget_threshold)?;

        Ok(CustomerSegment {
            customer_id,
            segment,
            recency: rfm.recency,
            frequency: rfm.frequency,
            monetary: rfm.monetary,
            model_trained_at: artifact.trained_at,
        })
    }
}
