//! Application state for the API server

use crate::client::{RemoteTaskClient, TaskProvider};
use crate::config::Config;
use crate::db::{Database, JobSink};
use crate::orchestrator::Orchestrator;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request; every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Provider client used by the pass-through endpoints
    pub client: Arc<RemoteTaskClient>,

    /// Pipeline behind `/run-all`, sharing `client`
    pub orchestrator: Orchestrator,

    /// Local job store, when persistence is enabled
    pub db: Option<Arc<Database>>,

    /// Configuration (read only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState, wiring the orchestrator to the client and store
    pub fn new(client: Arc<RemoteTaskClient>, db: Option<Arc<Database>>, config: Arc<Config>) -> Self {
        let provider: Arc<dyn TaskProvider> = client.clone();
        let mut orchestrator = Orchestrator::new(
            provider,
            config.orchestration.clone(),
            config.retry.clone(),
        );
        if let Some(db) = &db {
            let sink: Arc<dyn JobSink> = db.clone();
            orchestrator = orchestrator.with_sink(sink);
        }

        Self {
            client,
            orchestrator,
            db,
            config,
        }
    }
}
