//! Offset-paginated retrieval of one task's rows

use crate::client::PageSource;
use crate::error::Result;
use crate::types::{RemoteTask, TaskResultSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drains a task's result set page by page
///
/// Pages are requested in strictly increasing offset order. Collection ends
/// on an empty page, a short page (fewer rows than requested), a transport
/// failure or cancellation; in the last two cases the rows gathered so far
/// are kept and the reason is recorded in [`TaskResultSet::truncated_by`].
/// Any other fetch error (auth failure, capability denial) is returned.
pub struct PaginatedCollector<'a, P: PageSource + ?Sized> {
    source: &'a P,
    page_size: usize,
    start_offset: usize,
}

impl<'a, P: PageSource + ?Sized> PaginatedCollector<'a, P> {
    /// Create a collector; `page_size` must be greater than zero
    pub fn new(source: &'a P, page_size: usize, start_offset: usize) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            start_offset,
        }
    }

    /// Collect every page of `task`
    ///
    /// # Errors
    ///
    /// Only non-transport errors from the page source, such as
    /// [`Error::AuthFailure`](crate::Error::AuthFailure).
    pub async fn collect(
        &self,
        task: RemoteTask,
        cancel: &CancellationToken,
    ) -> Result<TaskResultSet> {
        let mut result = TaskResultSet::empty(task);
        let mut cursor = self.start_offset;

        loop {
            if cancel.is_cancelled() {
                result.truncated_by = Some("cancelled".to_string());
                break;
            }

            result.fetches += 1;
            let page = tokio::select! {
                _ = cancel.cancelled() => {
                    result.truncated_by = Some("cancelled".to_string());
                    break;
                }
                page = self.source.get_data_page(&result.task.id, cursor, self.page_size) => page,
            };

            let page = match page {
                Ok(page) => page,
                Err(e) if !e.is_transport() => {
                    warn!(
                        task_id = %result.task.id,
                        offset = cursor,
                        error = %e,
                        "page fetch failed, aborting collection"
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        task_id = %result.task.id,
                        offset = cursor,
                        error = %e,
                        "page fetch failed, keeping rows collected so far"
                    );
                    result.truncated_by = Some(e.to_string());
                    break;
                }
            };

            let len = page.len();
            debug!(task_id = %result.task.id, offset = cursor, rows = len, "fetched page");
            if len == 0 {
                break;
            }

            result.rows.extend(page);
            cursor += len;
            if len < self.page_size {
                break;
            }
        }

        info!(
            task_id = %result.task.id,
            rows = result.rows.len(),
            fetches = result.fetches,
            partial = result.is_partial(),
            "collection finished"
        );
        Ok(result)
    }
}
