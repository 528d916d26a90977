//! jobpulse REST server
//!
//! Reads configuration from the environment (and `.env`), opens the job
//! store when persistence is enabled and serves the API until SIGTERM or
//! Ctrl+C.

use jobpulse::{AppState, Config, Database, RemoteTaskClient, run_with_shutdown};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "jobpulse=info,tower_http=info";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "jobpulse-server exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> jobpulse::Result<()> {
    let config = Config::from_env()?;
    tracing::info!(
        tier = ?config.provider.tier,
        persistence = config.persistence.enabled,
        bind = %config.api.bind_address,
        "starting jobpulse-server"
    );

    let db = if config.persistence.enabled {
        let db = Database::new(&config.persistence.database_path).await?;
        tracing::info!(path = %config.persistence.database_path.display(), "job store ready");
        Some(Arc::new(db))
    } else {
        None
    };

    let client = Arc::new(RemoteTaskClient::from_config(&config)?);
    run_with_shutdown(AppState::new(client, db, Arc::new(config))).await
}
