//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`system`] - Health and OpenAPI
//! - [`tasks`] - Pass-through provider operations and single-page ingest
//! - [`orchestration`] - Whole-group runs exported as xlsx

use crate::types::{TaskId, TaskStatus};
use serde::{Deserialize, Serialize};

mod orchestration;
mod system;
mod tasks;

pub use orchestration::*;
pub use system::*;
pub use tasks::*;

/// Default page size of the by-offset endpoints
pub const DEFAULT_PAGE_SIZE: usize = 100;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /tasks
#[derive(Debug, Deserialize, Serialize, utoipa::IntoParams)]
pub struct TasksQuery {
    /// Task group to list (required)
    #[serde(rename = "taskGroupId")]
    pub task_group_id: Option<String>,
}

/// Query parameters for the by-offset data endpoints
#[derive(Debug, Default, Deserialize, Serialize, utoipa::IntoParams)]
pub struct PageQuery {
    /// First row to return (default: 0)
    pub offset: Option<usize>,
    /// Rows to return (default: 100)
    pub size: Option<usize>,
}

impl PageQuery {
    /// Resolved `(offset, size)`, rejecting a zero size
    pub fn resolve(&self) -> crate::Result<(usize, usize)> {
        let size = self.size.unwrap_or(DEFAULT_PAGE_SIZE);
        if size == 0 {
            return Err(crate::Error::InvalidInput(
                "size must be greater than 0".to_string(),
            ));
        }
        Ok((self.offset.unwrap_or(0), size))
    }
}

/// Request body for POST /tasks/status
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct StatusRequest {
    /// Tasks to look up (required)
    #[serde(rename = "taskIdList", default)]
    pub task_id_list: Option<Vec<TaskId>>,
}

/// One entry of the POST /tasks/status response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TaskStatusView {
    /// Task identifier
    #[serde(rename = "taskId")]
    pub task_id: TaskId,
    /// Reported status, `Unknown` when the provider omitted the task
    #[schema(value_type = String)]
    pub status: TaskStatus,
}

/// Response of the task control endpoints
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TaskActionResponse {
    /// Task the action was applied to
    #[serde(rename = "taskId")]
    pub task_id: TaskId,
    /// `start`, `stop` or `clear`
    pub action: String,
}

/// Response of POST /ingest/:id
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct IngestResponse {
    /// Rows in the fetched page
    pub received: usize,
    /// Rows stored or updated
    pub upserted: usize,
    /// Rows the store rejected
    pub failed: usize,
}
