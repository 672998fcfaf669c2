use std::time::Duration;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement,
};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for the database connection pool
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

/// Establishes a connection pool to the database.
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool with custom pool settings.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(true);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db = Database::connect(opt).await?;
    Ok(db)
}

/// Establishes a connection using pool settings from the application config.
pub async fn establish_connection_from_app_config(
    cfg: &AppConfig,
) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: cfg.database_url.clone(),
        max_connections: cfg.db_max_connections,
        min_connections: cfg.db_min_connections,
        connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
        idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
        acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
    };

    establish_connection_with_config(&config).await
}

/// Bootstraps the schema with idempotent DDL.
///
/// Keeps the three core tables in step across SQLite (tests, default local
/// runs) and Postgres without a separate migrations crate.
pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), ServiceError> {
    let backend = db.get_database_backend();

    let id_column = match backend {
        DatabaseBackend::Postgres => "BIGSERIAL PRIMARY KEY",
        _ => "INTEGER PRIMARY KEY AUTOINCREMENT",
    };

    // SQLite gives DECIMAL(n,m) NUMERIC affinity, which stores whole-valued
    // prices as INTEGERs that sqlx then refuses to decode as the f64 sea-orm
    // uses for Decimal on this backend; REAL affinity keeps the round-trip.
    let price_column = match backend {
        DatabaseBackend::Postgres => "DECIMAL(12,2)",
        _ => "REAL",
    };

    let statements = [
        format!(
            "CREATE TABLE IF NOT EXISTS products (
                id {id_column},
                name TEXT NOT NULL,
                category TEXT NOT NULL,
                base_price {price_column} NOT NULL,
                stock INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS customers (
                id {id_column},
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS sales_transactions (
                id {id_column},
                product_id BIGINT NOT NULL,
                customer_id BIGINT NOT NULL,
                quantity INTEGER NOT NULL,
                unit_price {price_column} NOT NULL,
                total_amount {price_column} NOT NULL,
                occurred_at TIMESTAMP NOT NULL
            )"
        ),
        "CREATE INDEX IF NOT EXISTS idx_sales_product_time \
         ON sales_transactions (product_id, occurred_at)"
            .to_string(),
        "CREATE INDEX IF NOT EXISTS idx_sales_customer_time \
         ON sales_transactions (customer_id, occurred_at)"
            .to_string(),
    ];

    for sql in statements {
        db.execute(Statement::from_string(backend, sql)).await?;
    }

    info!("Database schema ready");
    Ok(())
}
