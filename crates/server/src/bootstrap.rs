use std::sync::Arc;

use offerdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use offerdesk_core::services::{PricingService, QuoteService};
use offerdesk_db::{connect_with_config, migrations, DbPool, SqlPricingStore};
use thiserror::Error;
use tracing::info;

use crate::api::ApiState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api: ApiState<SqlPricingStore>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let store = Arc::new(SqlPricingStore::new(db_pool.clone()));
    let api = ApiState {
        pricing: PricingService::new(Arc::clone(&store), config.pricing),
        quotes: QuoteService::new(store, config.pricing),
    };
    info!(
        event_name = "system.bootstrap.pricing_policy",
        correlation_id = "bootstrap",
        default_margin_percent = %config.pricing.default_margin_percent,
        default_min_margin_percent = %config.pricing.default_min_margin_percent,
        default_max_discount_percent = %config.pricing.default_max_discount_percent,
        "pricing policy loaded"
    );

    Ok(Application { config, db_pool, api })
}
