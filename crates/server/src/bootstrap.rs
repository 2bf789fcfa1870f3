use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use bravocado_core::config::{AppConfig, ConfigError, LoadOptions};
use bravocado_core::{DistributionEngine, DistributionPolicy};
use bravocado_db::{connect_with_settings, migrations, DbPool, SqliteQuotaStore};
use bravocado_slack::gateway::{NoopSlackApi, SlackChatGateway};
use bravocado_slack::handlers::distribution_dispatcher;
use bravocado_slack::socket::{NoopSocketTransport, ReconnectPolicy, SocketModeRunner};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub slack_runner: SocketModeRunner,
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
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let store = Arc::new(SqliteQuotaStore::new(db_pool.clone(), config.bot.daily_default));
    // The gateway and transport stay inert until the live Slack client is
    // attached; everything behind them is fully wired.
    let chat = Arc::new(SlackChatGateway::new(Arc::new(NoopSlackApi)));
    let engine = Arc::new(DistributionEngine::new(
        store,
        chat,
        DistributionPolicy { daily_default: config.bot.daily_default },
    ));

    let slack_runner = SocketModeRunner::new(
        Arc::new(NoopSocketTransport),
        distribution_dispatcher(engine),
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, slack_runner })
}
