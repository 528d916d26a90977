//! # jobpulse
//!
//! Task-group orchestration for a remote scraping provider (Octoparse).
//!
//! A run selects the tasks of one task group, clears their previous data,
//! starts them, waits until every one has finished, drains each task's rows
//! page by page and exports everything as a single xlsx workbook with one
//! sheet per task. Rows can optionally be upserted into a local SQLite job
//! store on the way.
//!
//! ## Quick Start
//!
//! ```no_run
//! use jobpulse::{Config, Orchestrator, RemoteTaskClient, RunRequest};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let client = Arc::new(RemoteTaskClient::from_config(&config)?);
//!     let orchestrator = Orchestrator::new(client, config.orchestration, config.retry);
//!
//!     let request = RunRequest {
//!         task_group_id: Some("12345".to_string()),
//!         ..Default::default()
//!     };
//!     let output = orchestrator.run(request, CancellationToken::new()).await?;
//!     std::fs::write(&output.filename, &output.bytes)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Remote provider client
pub mod client;
/// Configuration types
pub mod config;
/// Provider credential lifecycle
pub mod credentials;
/// Local job store
pub mod db;
/// Error types
pub mod error;
/// Run orchestration
pub mod orchestrator;
/// Retry and backoff
pub mod retry;
/// Core domain types
pub mod types;
/// Workbook aggregation and xlsx export
pub mod workbook;

pub use api::AppState;
pub use client::{PageSource, RemoteTaskClient, StatusSource, TaskProvider};
pub use config::{ApiTier, Config};
pub use credentials::CredentialManager;
pub use db::{Database, JobSink};
pub use error::{ApiError, Error, Result, ToHttpStatus};
pub use orchestrator::{Orchestrator, RunOutput};
pub use types::{
    RemoteTask, ResultRow, RunRequest, RunSummary, TaskGroup, TaskGroupId, TaskId, TaskResultSet,
    TaskStatus,
};
pub use workbook::{AggregationBuilder, Workbook};

/// Serve the REST API until a termination signal arrives
///
/// - **Unix:** SIGTERM and SIGINT, with fallbacks if registration fails.
/// - **Windows/other:** Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use jobpulse::{AppState, Config, RemoteTaskClient, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::from_env()?;
///     let client = Arc::new(RemoteTaskClient::from_config(&config)?);
///     run_with_shutdown(AppState::new(client, None, Arc::new(config))).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(state: AppState) -> Result<()> {
    api::start_api_server(state, wait_for_signal()).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
