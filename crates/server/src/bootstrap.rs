use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use slotwise_agent::runtime::{RuntimeConfig, SchedulerRuntime};
use slotwise_core::config::{AppConfig, CalendarProvider, ConfigError, LoadOptions};
use slotwise_core::{CalendarBackend, StaticCalendarBackend};
use slotwise_db::{connect_with_settings, migrations, DbPool, SqlSessionRepository};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub scheduler: Arc<SchedulerRuntime>,
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

    let runtime_config = RuntimeConfig::from_app(&config)?;

    let calendar: Arc<dyn CalendarBackend> = match config.calendar.provider {
        CalendarProvider::Fixture => {
            Arc::new(StaticCalendarBackend::weekday_fixture(Utc::now(), 28, runtime_config.tz))
        }
        CalendarProvider::Google => {
            return Err(BootstrapError::Config(ConfigError::Validation(
                "the google calendar bridge is deployed separately; this server binary only \
                 bundles the fixture provider"
                    .to_string(),
            )));
        }
    };

    if config.dialogue.enabled {
        // No dialogue provider is bundled with this binary; the runtime is
        // fully functional on its deterministic path.
        warn!(
            event_name = "system.bootstrap.dialogue_unavailable",
            correlation_id = "bootstrap",
            "dialogue engine configured but not bundled, using deterministic extraction"
        );
    }

    let store = Arc::new(SqlSessionRepository::new(db_pool.clone()));
    let scheduler = Arc::new(SchedulerRuntime::new(runtime_config, calendar, store));

    Ok(Application { config, db_pool, scheduler })
}

#[cfg(test)]
mod tests {
    use slotwise_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn memory_options() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_prepares_schema_and_scheduler() {
        let app = bootstrap(memory_options()).await.expect("bootstrap should succeed");

        slotwise_db::ping(&app.db_pool).await.expect("database should answer");

        let now = chrono::Utc::now();
        let welcome =
            app.scheduler.start_session("boot-test", "u-1", now).await.expect("session starts");
        assert!(welcome.reply.contains("meeting"));
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_timezone() {
        let options = LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                timezone: Some("Mars/Olympus_Mons".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        };

        let result = bootstrap(options).await;
        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("timezone"));
    }
}
