use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::instrument;

use crate::entities::{product, sales_transaction};
use crate::errors::ServiceError;
use crate::ml::features::{aggregate_daily, DailyAggregate};

/// Read-side access to the product catalog and transaction ledger, shaped
/// for the feature and RFM builders.
pub struct SalesHistoryService {
    db: Arc<DatabaseConnection>,
}

impl SalesHistoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(product::Entity::find()
            .order_by_asc(product::Column::Id)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: i64) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {} not found", product_id)))
    }

    /// Sets a product's stock level. Returns the previous level with the
    /// updated row so callers can report the transition.
    #[instrument(skip(self))]
    pub async fn update_stock(
        &self,
        product_id: i64,
        quantity: i32,
    ) -> Result<(i32, product::Model), ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "stock quantity cannot be negative".to_string(),
            ));
        }

        let current = self.get_product(product_id).await?;
        let old_stock = current.stock;

        let mut active: product::ActiveModel = current.into();
        active.stock = Set(quantity);
        let updated = active.update(&*self.db).await?;

        Ok((old_stock, updated))
    }

    /// A customer's transactions, oldest first.
    #[instrument(skip(self))]
    pub async fn transactions_for_customer(
        &self,
        customer_id: i64,
    ) -> Result<Vec<sales_transaction::Model>, ServiceError> {
        Ok(sales_transaction::Entity::find()
            .filter(sales_transaction::Column::CustomerId.eq(customer_id))
            .order_by_asc(sales_transaction::Column::OccurredAt)
            .all(&*self.db)
            .await?)
    }

    /// A customer's purchase history as (timestamp, amount) pairs.
    pub async fn customer_purchases(
        &self,
        customer_id: i64,
    ) -> Result<Vec<(DateTime<Utc>, f64)>, ServiceError> {
        Ok(self
            .transactions_for_customer(customer_id)
            .await?
            .into_iter()
            .map(|tx| (tx.occurred_at, tx.total_amount.to_f64().unwrap_or(0.0)))
            .collect())
    }

    /// Every transaction as (customer_id, timestamp, amount), for training
    /// the segmentation model.
    #[instrument(skip(self))]
    pub async fn all_purchases(&self) -> Result<Vec<(i64, DateTime<Utc>, f64)>, ServiceError> {
        Ok(sales_transaction::Entity::find()
            .order_by_asc(sales_transaction::Column::OccurredAt)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|tx| {
                (
                    tx.customer_id,
                    tx.occurred_at,
                    tx.total_amount.to_f64().unwrap_or(0.0),
                )
            })
            .collect())
    }

    /// One product's sales collapsed to per-day unit totals, oldest first.
    #[instrument(skip(self, product), fields(product_id = product.id))]
    pub async fn product_daily_history(
        &self,
        product: &product::Model,
    ) -> Result<Vec<DailyAggregate>, ServiceError> {
        let transactions = sales_transaction::Entity::find()
            .filter(sales_transaction::Column::ProductId.eq(product.id))
            .order_by_asc(sales_transaction::Column::OccurredAt)
            .all(&*self.db)
            .await?;

        Ok(aggregate_daily(
            product.id,
            &product.category,
            product.base_price.to_f64().unwrap_or(0.0),
            transactions
                .into_iter()
                .map(|tx| (tx.occurred_at.date_naive(), tx.quantity as i64)),
        ))
    }

    /// Daily histories for every product, for training the forecaster.
    pub async fn all_daily_histories(
        &self,
    ) -> Result<Vec<(product::Model, Vec<DailyAggregate>)>, ServiceError> {
        let products = self.list_products().await?;
        let mut histories = Vec::with_capacity(products.len());
        for product in products {
            let history = self.product_daily_history(&product).await?;
            histories.push((product, history));
        }
        Ok(histories)
    }
}
