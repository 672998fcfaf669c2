#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{EntityTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use optistock_api::{
    config::AppConfig,
    db,
    entities::{customer, product, sales_transaction},
    events::{self, EventSender},
    ml::registry::ModelRegistry,
    services::training::{RetrainJobTracker, TrainingService},
    AppState,
};

/// Test harness: application state over a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 18_080,
        environment: "test".to_string(),
        log_level: "info".to_string(),
        log_json: false,
        auto_migrate: true,
        cors_allowed_origins: None,
        cors_allow_any_origin: true,
        cors_allow_credentials: false,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_idle_timeout_secs: 600,
        db_acquire_timeout_secs: 5,
        safety_buffer: 5,
        segment_budget_threshold: 100.0,
        model_artifacts_path: None,
    }
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let cfg = test_config();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::setup_schema(&pool)
            .await
            .expect("failed to set up schema in tests");

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState {
            db: Arc::new(pool),
            config: Arc::new(cfg),
            registry: Arc::new(ModelRegistry::new()),
            retrain_jobs: Arc::new(RetrainJobTracker::new()),
            event_sender: EventSender::new(event_tx),
        };

        let router = optistock_api::app_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Training service wired to the same state as the router, so tests can
    /// run a training pass synchronously instead of polling a spawned job.
    pub fn training_service(&self) -> TrainingService {
        TrainingService::new(
            self.state.db.clone(),
            self.state.registry.clone(),
            self.state.retrain_jobs.clone(),
            self.state.event_sender.clone(),
            None,
        )
    }

    pub async fn seed_product(&self, name: &str, category: &str, price: &str, stock: i32) -> i64 {
        let now = Utc::now();
        let active = product::ActiveModel {
            name: Set(name.to_string()),
            category: Set(category.to_string()),
            base_price: Set(price.parse::<Decimal>().expect("valid price literal")),
            stock: Set(stock),
            created_at: Set(now),
            ..Default::default()
        };
        product::Entity::insert(active)
            .exec(&*self.state.db)
            .await
            .expect("failed to seed product")
            .last_insert_id
    }

    pub async fn seed_customer(&self, name: &str, email: &str) -> i64 {
        let active = customer::ActiveModel {
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        customer::Entity::insert(active)
            .exec(&*self.state.db)
            .await
            .expect("failed to seed customer")
            .last_insert_id
    }

    pub async fn seed_sale(
        &self,
        product_id: i64,
        customer_id: i64,
        quantity: i32,
        unit_price: &str,
        occurred_at: DateTime<Utc>,
    ) -> i64 {
        let unit = unit_price.parse::<Decimal>().expect("valid price literal");
        let active = sales_transaction::ActiveModel {
            product_id: Set(product_id),
            customer_id: Set(customer_id),
            quantity: Set(quantity),
            unit_price: Set(unit),
            total_amount: Set(unit * Decimal::from(quantity)),
            occurred_at: Set(occurred_at),
            ..Default::default()
        };
        sales_transaction::Entity::insert(active)
            .exec(&*self.state.db)
            .await
            .expect("failed to seed sale")
            .last_insert_id
    }

    /// Seeds `days` consecutive days of sales for one product, all from the
    /// same customer, with deterministic weekly-ish quantities.
    pub async fn seed_daily_sales(&self, product_id: i64, customer_id: i64, days: u32) {
        for day in 0..days {
            let occurred_at = day_at(day);
            let quantity = 3 + (day % 7) as i32;
            self.seed_sale(product_id, customer_id, quantity, "10.00", occurred_at)
                .await;
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response is not JSON")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(body)).await
    }
}

/// Deterministic timestamp `days` after a fixed epoch, at noon UTC.
pub fn day_at(days: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap() + chrono::Duration::days(days as i64)
}
