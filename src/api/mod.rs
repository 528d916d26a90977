//! REST API server module
//!
//! Exposes the provider operations and the whole-group run over HTTP, with
//! an OpenAPI 3 description of every route.

use crate::error::{Error, Result};
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Prefix every route is mounted under
pub const API_PREFIX: &str = "/api/v1";

/// Create the API router with all route definitions
///
/// # Routes (under `/api/v1`)
///
/// ## Provider
/// - `GET /login` - Force a password grant
/// - `GET /task-groups` - List task groups
/// - `GET /tasks?taskGroupId=` - List the tasks of a group
/// - `POST /task/:id/start` - Start a task
/// - `POST /task/:id/stop` - Stop a task
/// - `POST /task/:id/clear` - Remove a task's data
/// - `POST /tasks/status` - Batch status lookup
/// - `GET /task/:id/data/by-offset` - One page of rows
/// - `POST /ingest/:id` - One page of rows into the job store
///
/// ## Orchestration
/// - `POST /run-all` - Run a group and download the xlsx
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
///
/// Swagger UI is served at `/swagger-ui` when enabled.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let api = Router::new()
        // Provider
        .route("/login", get(routes::login))
        .route("/task-groups", get(routes::list_task_groups))
        .route("/tasks", get(routes::list_tasks))
        .route("/task/:id/start", post(routes::start_task))
        .route("/task/:id/stop", post(routes::stop_task))
        .route("/task/:id/clear", post(routes::clear_task))
        .route("/tasks/status", post(routes::task_statuses))
        .route("/task/:id/data/by-offset", get(routes::data_by_offset))
        .route("/ingest/:id", post(routes::ingest_page))
        // Orchestration
        .route("/run-all", post(routes::run_all))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .with_state(state);

    let api = if config.api.api_key.is_some() {
        api.layer(middleware::from_fn_with_state(
            config.api.api_key.clone(),
            auth::require_api_key,
        ))
    } else {
        api
    };

    let router = Router::new().nest(API_PREFIX, api);

    // Swagger UI carries its own copy of the document so it does not
    // collide with the authenticated /api/v1/openapi.json route
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer from the configured origins ("*" allows any)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    let layer = if allow_any || origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(allowed))
    };

    layer
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any)
}

/// Serve the API on the configured bind address until `shutdown` resolves
///
/// In-flight requests are allowed to finish once `shutdown` fires.
pub async fn start_api_server<F>(state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = state.config.api.bind_address;
    let listener = TcpListener::bind(bind_address).await.map_err(Error::Io)?;
    serve(listener, state, shutdown).await
}

/// Serve the API on an already bound listener
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr().map_err(Error::Io)?;
    tracing::info!(address = %address, "API server listening");

    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
