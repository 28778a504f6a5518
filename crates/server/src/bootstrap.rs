use std::sync::Arc;

use curator_core::config::{AppConfig, ConfigError, LoadOptions};
use curator_db::repositories::SqlUserRepository;
use curator_db::{connect_with_settings, migrations, DbPool};
use curator_monitor::{HttpMonitorClient, MonitorError};
use curator_slack::{BotRunner, MessageRouter, NoopChatTransport, ReconnectPolicy};
use thiserror::Error;
use tracing::info;

const BOT_NAME: &str = "curator";

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub router: Arc<MessageRouter>,
    pub bot_runner: BotRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("monitor client construction failed: {0}")]
    Monitor(#[source] MonitorError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires the application from an already-validated config: database pool,
/// migrations, monitor client, router, bot runner. Config validation has
/// already rejected missing credentials, so no session work can start
/// without them.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
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

    let monitor =
        Arc::new(HttpMonitorClient::new(&config.monitor).map_err(BootstrapError::Monitor)?);
    let users = Arc::new(SqlUserRepository::new(db_pool.clone()));
    let router =
        Arc::new(MessageRouter::new(BOT_NAME, monitor.clone(), monitor, users));
    let bot_runner = BotRunner::new(
        Arc::new(NoopChatTransport),
        router.clone(),
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, router, bot_runner })
}
