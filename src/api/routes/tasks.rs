//! Provider pass-through handlers.

use super::{IngestResponse, PageQuery, StatusRequest, TaskActionResponse, TaskStatusView, TasksQuery};
use crate::api::AppState;
use crate::credentials::CredentialSnapshot;
use crate::db::persist_rows;
use crate::error::{Error, Result};
use crate::types::{RemoteTask, ResultRow, TaskGroup, TaskGroupId, TaskId};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};

/// GET /login - Force a fresh password grant
#[utoipa::path(
    get,
    path = "/api/v1/login",
    tag = "tasks",
    responses(
        (status = 200, description = "Login succeeded; the token itself is never returned", body = CredentialSnapshot),
        (status = 401, description = "Provider rejected the credentials", body = crate::error::ApiError)
    )
)]
pub async fn login(State(state): State<AppState>) -> Result<Json<CredentialSnapshot>> {
    Ok(Json(state.client.credentials().login().await?))
}

/// GET /task-groups - List task groups
#[utoipa::path(
    get,
    path = "/api/v1/task-groups",
    tag = "tasks",
    responses(
        (status = 200, description = "Task groups visible to the account", body = Vec<TaskGroup>),
        (status = 401, description = "Authentication with the provider failed", body = crate::error::ApiError),
        (status = 502, description = "Provider error", body = crate::error::ApiError)
    )
)]
pub async fn list_task_groups(State(state): State<AppState>) -> Result<Json<Vec<TaskGroup>>> {
    Ok(Json(state.client.list_task_groups().await?))
}

/// GET /tasks - List the tasks of a group
#[utoipa::path(
    get,
    path = "/api/v1/tasks",
    tag = "tasks",
    params(TasksQuery),
    responses(
        (status = 200, description = "Tasks of the group", body = Vec<RemoteTask>),
        (status = 400, description = "taskGroupId missing", body = crate::error::ApiError),
        (status = 502, description = "Provider error", body = crate::error::ApiError)
    )
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    query: std::result::Result<Query<TasksQuery>, QueryRejection>,
) -> Result<Json<Vec<RemoteTask>>> {
    let Query(query) = query?;
    let group = query
        .task_group_id
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(TaskGroupId::new)
        .ok_or_else(|| Error::InvalidInput("taskGroupId is required".to_string()))?;

    Ok(Json(state.client.list_tasks(&group).await?))
}

/// POST /task/:id/start - Start a task (Advanced tier)
#[utoipa::path(
    post,
    path = "/api/v1/task/{id}/start",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task started", body = TaskActionResponse),
        (status = 403, description = "Tier does not allow task control", body = crate::error::ApiError),
        (status = 502, description = "Provider error", body = crate::error::ApiError)
    )
)]
pub async fn start_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskActionResponse>> {
    let id = TaskId::new(id);
    state.client.start_task(&id).await?;
    Ok(action(id, "start"))
}

/// POST /task/:id/stop - Stop a task (Advanced tier)
#[utoipa::path(
    post,
    path = "/api/v1/task/{id}/stop",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task stopped", body = TaskActionResponse),
        (status = 403, description = "Tier does not allow task control", body = crate::error::ApiError),
        (status = 502, description = "Provider error", body = crate::error::ApiError)
    )
)]
pub async fn stop_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskActionResponse>> {
    let id = TaskId::new(id);
    state.client.stop_task(&id).await?;
    Ok(action(id, "stop"))
}

/// POST /task/:id/clear - Remove a task's extracted data
#[utoipa::path(
    post,
    path = "/api/v1/task/{id}/clear",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task data removed", body = TaskActionResponse),
        (status = 502, description = "Provider error", body = crate::error::ApiError)
    )
)]
pub async fn clear_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskActionResponse>> {
    let id = TaskId::new(id);
    state.client.clear_task_data(&id).await?;
    Ok(action(id, "clear"))
}

fn action(task_id: TaskId, action: &str) -> Json<TaskActionResponse> {
    Json(TaskActionResponse {
        task_id,
        action: action.to_string(),
    })
}

/// POST /tasks/status - Batch status lookup (Advanced tier)
///
/// Entries come back in request order; ids the provider did not report are
/// returned as `Unknown`.
#[utoipa::path(
    post,
    path = "/api/v1/tasks/status",
    tag = "tasks",
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status of every requested task", body = Vec<TaskStatusView>),
        (status = 400, description = "taskIdList missing", body = crate::error::ApiError),
        (status = 403, description = "Tier does not allow status lookups", body = crate::error::ApiError)
    )
)]
pub async fn task_statuses(
    State(state): State<AppState>,
    body: std::result::Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<Vec<TaskStatusView>>> {
    let Json(request) = body?;
    let ids = request
        .task_id_list
        .ok_or_else(|| Error::InvalidInput("taskIdList is required".to_string()))?;

    let mut statuses = state.client.get_statuses(&ids).await?;
    Ok(Json(
        ids.into_iter()
            .map(|task_id| TaskStatusView {
                status: statuses.remove(&task_id).unwrap_or_default(),
                task_id,
            })
            .collect(),
    ))
}

/// GET /task/:id/data/by-offset - One page of a task's rows
#[utoipa::path(
    get,
    path = "/api/v1/task/{id}/data/by-offset",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID"), PageQuery),
    responses(
        (status = 200, description = "Rows of the page, possibly empty", body = Vec<ResultRow>),
        (status = 400, description = "Invalid page size", body = crate::error::ApiError),
        (status = 502, description = "Provider error", body = crate::error::ApiError)
    )
)]
pub async fn data_by_offset(
    State(state): State<AppState>,
    Path(id): Path<String>,
    page: std::result::Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Vec<ResultRow>>> {
    let Query(page) = page?;
    let (offset, size) = page.resolve()?;
    let rows = state
        .client
        .get_data_page(&TaskId::new(id), offset, size)
        .await?;
    Ok(Json(rows))
}

/// POST /ingest/:id - Fetch one page and upsert it into the job store
#[utoipa::path(
    post,
    path = "/api/v1/ingest/{id}",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID"), PageQuery),
    responses(
        (status = 200, description = "Per-row persistence outcome", body = IngestResponse),
        (status = 400, description = "Persistence disabled or invalid page size", body = crate::error::ApiError),
        (status = 502, description = "Provider error", body = crate::error::ApiError)
    )
)]
pub async fn ingest_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    page: std::result::Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<IngestResponse>> {
    let Query(page) = page?;
    let db = state
        .db
        .clone()
        .ok_or_else(|| Error::InvalidInput("persistence is not enabled".to_string()))?;
    let (offset, size) = page.resolve()?;

    let rows = state
        .client
        .get_data_page(&TaskId::new(id), offset, size)
        .await?;
    let summary = persist_rows(&*db, &rows).await;

    Ok(Json(IngestResponse {
        received: rows.len(),
        upserted: summary.upserted,
        failed: summary.failed,
    }))
}
