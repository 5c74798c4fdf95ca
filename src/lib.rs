pub mod api;
pub mod config;
pub mod core_state;
pub mod db;
pub mod flows;
pub mod models;
pub mod profiles;
pub mod reminders;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, ConfigError};
use crate::core_state::{CoreError, CoreState};

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Startup error: {0}")]
    Core(#[from] CoreError),
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Install the global tracing subscriber (`RUST_LOG` wins over the default).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Start the service and block until Ctrl-C.
pub async fn run() -> Result<(), RunError> {
    init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env()?;
    tracing::info!(
        database = %config.database_path.display(),
        utc_offset = %config.utc_offset,
        zero_token_policy = config.zero_token_policy.as_str(),
        "Configuration loaded"
    );

    let bind_addr = config.bind_addr;
    let scan_interval = config.scan_interval;
    let core = Arc::new(CoreState::from_config(config)?);

    let scheduler = match scan_interval {
        Some(interval) => Some(reminders::scheduler::start_reminder_scheduler(
            core.clone(),
            interval,
        )),
        None => {
            tracing::info!("Reminder scheduler disabled; scans run only when triggered");
            None
        }
    };
    let server = api::start_api_server(core, bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Could not listen for shutdown signal");
    }
    tracing::info!("Shutting down");

    server.stop().await;
    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }
    Ok(())
}
