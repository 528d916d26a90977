//! Whole-group run exported as an xlsx download.

use crate::api::AppState;
use crate::error::{Error, Result};
use crate::types::RunRequest;
use crate::workbook::XLSX_CONTENT_TYPE;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::sync::CancellationToken;

/// Total rows in the workbook
pub const ROWS_HEADER: HeaderName = HeaderName::from_static("x-jobpulse-rows");
/// Number of tasks whose collection ended early
pub const PARTIAL_TASKS_HEADER: HeaderName = HeaderName::from_static("x-jobpulse-partial-tasks");
/// Number of tasks that could not be cleared or started
pub const SKIPPED_TASKS_HEADER: HeaderName = HeaderName::from_static("x-jobpulse-skipped-tasks");
/// Rows stored in the job store
pub const PERSISTED_HEADER: HeaderName = HeaderName::from_static("x-jobpulse-persisted");
/// Rows the job store rejected
pub const PERSIST_FAILURES_HEADER: HeaderName =
    HeaderName::from_static("x-jobpulse-persist-failures");

/// POST /run-all - Run a task group and download the workbook
///
/// Clears, starts and waits for every selected task, then collects all of
/// their rows into one sheet per task. The run is cancelled when the client
/// goes away before it finishes.
#[utoipa::path(
    post,
    path = "/api/v1/run-all",
    tag = "orchestration",
    request_body = RunRequest,
    responses(
        (status = 200, description = "Workbook with one sheet per task", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 401, description = "Provider authentication failed", body = crate::error::ApiError),
        (status = 403, description = "Tier does not allow task control", body = crate::error::ApiError),
        (status = 404, description = "No matching tasks", body = crate::error::ApiError),
        (status = 502, description = "Provider error", body = crate::error::ApiError),
        (status = 504, description = "Tasks did not finish in time", body = crate::error::ApiError)
    )
)]
pub async fn run_all(
    State(state): State<AppState>,
    body: std::result::Result<Json<RunRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = body?;
    let cancel = CancellationToken::new();
    // Dropping the handler future (client disconnect) cancels the run
    let _guard = cancel.clone().drop_guard();

    let output = state.orchestrator.run(request, cancel).await?;
    let summary = &output.summary;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(XLSX_CONTENT_TYPE));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", output.filename))
            .map_err(|e| Error::Other(format!("invalid export filename: {e}")))?,
    );
    headers.insert(ROWS_HEADER, HeaderValue::from(summary.rows_collected));
    headers.insert(
        PARTIAL_TASKS_HEADER,
        HeaderValue::from(summary.partial_tasks.len()),
    );
    headers.insert(
        SKIPPED_TASKS_HEADER,
        HeaderValue::from(summary.skipped_tasks.len()),
    );
    if let Some(persisted) = summary.persisted {
        headers.insert(PERSISTED_HEADER, HeaderValue::from(persisted.upserted));
        headers.insert(PERSIST_FAILURES_HEADER, HeaderValue::from(persisted.failed));
    }

    Ok((StatusCode::OK, headers, output.bytes).into_response())
}
