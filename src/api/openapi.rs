//! OpenAPI documentation and schema generation
//!
//! The specification is generated at compile time with utoipa.

use utoipa::OpenApi;

/// OpenAPI documentation for the jobpulse REST API
///
/// Served at `/api/v1/openapi.json` and, when enabled, browsable at
/// `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "jobpulse REST API",
        version = "0.1.0",
        description = "Run remote scraping task groups end to end and export the results as xlsx",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:1112/api/v1", description = "Local development server")
    ),
    paths(
        // Provider pass-through
        crate::api::routes::login,
        crate::api::routes::list_task_groups,
        crate::api::routes::list_tasks,
        crate::api::routes::start_task,
        crate::api::routes::stop_task,
        crate::api::routes::clear_task,
        crate::api::routes::task_statuses,
        crate::api::routes::data_by_offset,
        crate::api::routes::ingest_page,

        // Orchestration
        crate::api::routes::run_all,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::TaskId,
        crate::types::TaskGroupId,
        crate::types::TaskGroup,
        crate::types::RemoteTask,
        crate::types::ResultRow,
        crate::types::RunRequest,
        crate::types::RunSummary,
        crate::types::PersistSummary,
        crate::credentials::CredentialSnapshot,
        crate::config::ApiTier,

        crate::api::routes::StatusRequest,
        crate::api::routes::TaskStatusView,
        crate::api::routes::TaskActionResponse,
        crate::api::routes::IngestResponse,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "tasks", description = "Provider task groups, tasks, status and data pages"),
        (name = "orchestration", description = "Clear, start, wait for and collect a whole task group"),
        (name = "system", description = "Health check and OpenAPI spec"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds the `X-Api-Key` scheme to the components
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "api_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new("X-Api-Key"),
                    ),
                ),
            );
        }
    }
}
