//! Task-group orchestration
//!
//! [`Orchestrator::run`] is the end-to-end pipeline:
//!
//! 1. list the group's tasks and apply the optional selection
//! 2. clear each task's previous data, wait a settle delay, start it
//! 3. wait for every started task to finish ([`CompletionWaiter`])
//! 4. drain each task's pages ([`PaginatedCollector`])
//! 5. optionally upsert the rows into a [`JobSink`]
//! 6. aggregate everything into an xlsx workbook
//!
//! Clearing is destructive: data previously extracted by a selected task is
//! removed from the provider before the new run starts.

mod collector;
mod waiter;

pub use collector::PaginatedCollector;
pub use waiter::{CompletionWaiter, WaitPolicy};

use crate::client::TaskProvider;
use crate::config::{OrchestrationConfig, RetryConfig};
use crate::db::{JobSink, persist_rows};
use crate::error::{Error, Result};
use crate::types::{RemoteTask, ResultRow, RunRequest, RunSummary, TaskGroupId, TaskId, TaskResultSet};
use crate::workbook::AggregationBuilder;
use futures::{StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of a successful run
#[derive(Debug)]
pub struct RunOutput {
    /// xlsx file contents
    pub bytes: Vec<u8>,
    /// Suggested download name
    pub filename: String,
    /// What the run did
    pub summary: RunSummary,
}

/// Runs task groups end to end
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn TaskProvider>,
    sink: Option<Arc<dyn JobSink>>,
    config: OrchestrationConfig,
    retry: RetryConfig,
}

impl Orchestrator {
    /// Create an orchestrator without a persistence sink
    pub fn new(
        provider: Arc<dyn TaskProvider>,
        config: OrchestrationConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            provider,
            sink: None,
            config,
            retry,
        }
    }

    /// Attach a sink used by runs that request persistence
    pub fn with_sink(mut self, sink: Arc<dyn JobSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run one task group
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for a missing group id, a zero page size, or
    ///   persistence requested without a sink (before any remote call)
    /// - [`Error::NotFound`] when no task survives the selection filter
    /// - [`Error::AuthFailure`] / [`Error::CapabilityDenied`] from any step,
    ///   collection included
    /// - waiter errors ([`Error::WaitTimedOut`], [`Error::Cancelled`], exhausted polls)
    /// - [`Error::Cancelled`] when `cancel` fires during collection
    pub async fn run(&self, request: RunRequest, cancel: CancellationToken) -> Result<RunOutput> {
        let group = request
            .task_group_id
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(TaskGroupId::new)
            .ok_or_else(|| Error::InvalidInput("taskGroupId is required".to_string()))?;

        let page_size = request.page_size.unwrap_or(self.config.page_size);
        if page_size == 0 {
            return Err(Error::InvalidInput(
                "pageSize must be greater than 0".to_string(),
            ));
        }

        let sink = match (request.persist, &self.sink) {
            (false, _) => None,
            (true, Some(sink)) => Some(sink.clone()),
            (true, None) => {
                return Err(Error::InvalidInput(
                    "persistence was requested but no job store is configured".to_string(),
                ));
            }
        };

        let tasks = self.select_tasks(&group, request.selected_task_ids.as_deref()).await?;
        info!(group = %group, tasks = tasks.len(), "starting task group run");

        let skipped = self.clear_and_start(&tasks, &cancel).await?;
        let started: Vec<TaskId> = tasks
            .iter()
            .filter(|t| !skipped.contains(&t.id))
            .map(|t| t.id.clone())
            .collect();

        if !started.is_empty() {
            let policy = self.wait_policy(&request);
            let polls = CompletionWaiter::new(&*self.provider, policy)
                .wait(&started, &cancel)
                .await?;
            info!(group = %group, polls, "tasks finished");
        } else {
            warn!(group = %group, "no task could be started; skipping wait");
        }

        let results = self
            .collect_all(tasks, &skipped, page_size, request.offset.unwrap_or(0), &cancel)
            .await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let persisted = match sink {
            Some(sink) => {
                let rows: Vec<&ResultRow> = results.iter().flat_map(|r| r.rows.iter()).collect();
                Some(persist_rows(&*sink, rows).await)
            }
            None => None,
        };

        let workbook = AggregationBuilder::from_results(&results);
        let bytes = workbook.to_xlsx_bytes()?;

        let summary = RunSummary {
            group_id: group.to_string(),
            tasks: results.len(),
            rows_collected: workbook.row_count(),
            partial_tasks: results
                .iter()
                .filter(|r| r.is_partial())
                .map(|r| r.task.id.clone())
                .collect(),
            skipped_tasks: results
                .iter()
                .filter(|r| skipped.contains(&r.task.id))
                .map(|r| r.task.id.clone())
                .collect(),
            persisted,
        };

        info!(
            group = %group,
            rows = summary.rows_collected,
            partial = summary.partial_tasks.len(),
            skipped = summary.skipped_tasks.len(),
            "task group run complete"
        );

        Ok(RunOutput {
            bytes,
            filename: export_filename(&group, chrono::Utc::now()),
            summary,
        })
    }

    async fn select_tasks(
        &self,
        group: &TaskGroupId,
        selection: Option<&[TaskId]>,
    ) -> Result<Vec<RemoteTask>> {
        let mut tasks = self.provider.list_tasks(group).await?;

        // An empty selection means "all tasks"
        if let Some(selection) = selection.filter(|s| !s.is_empty()) {
            let wanted: HashSet<&TaskId> = selection.iter().collect();
            tasks.retain(|t| wanted.contains(&t.id));
        }

        if tasks.is_empty() {
            return Err(Error::NotFound(format!(
                "no matching tasks in task group {group}"
            )));
        }
        Ok(tasks)
    }

    /// Clear then start every task, returning the ids that had to be skipped
    async fn clear_and_start(
        &self,
        tasks: &[RemoteTask],
        cancel: &CancellationToken,
    ) -> Result<HashSet<TaskId>> {
        let mut skipped = HashSet::new();

        for task in tasks {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if let Err(e) = self.provider.clear_task_data(&task.id).await {
                if !e.is_transport() {
                    return Err(e);
                }
                warn!(task_id = %task.id, error = %e, "failed to clear task data, skipping task");
                skipped.insert(task.id.clone());
                continue;
            }

            self.settle(cancel).await?;

            if let Err(e) = self.provider.start_task(&task.id).await {
                if !e.is_transport() {
                    return Err(e);
                }
                warn!(task_id = %task.id, error = %e, "failed to start task, skipping task");
                skipped.insert(task.id.clone());
                continue;
            }
            info!(task_id = %task.id, "task started");
        }

        Ok(skipped)
    }

    async fn settle(&self, cancel: &CancellationToken) -> Result<()> {
        if self.config.clear_settle_delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(self.config.clear_settle_delay) => Ok(()),
        }
    }

    async fn collect_all(
        &self,
        tasks: Vec<RemoteTask>,
        skipped: &HashSet<TaskId>,
        page_size: usize,
        offset: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<TaskResultSet>> {
        let collector = PaginatedCollector::new(&*self.provider, page_size, offset);
        let collector = &collector;

        futures::stream::iter(tasks.into_iter().map(move |task| async move {
            if skipped.contains(&task.id) {
                Ok(TaskResultSet::empty(task))
            } else {
                collector.collect(task, cancel).await
            }
        }))
        .buffered(self.config.collect_concurrency.max(1))
        .try_collect()
        .await
    }

    fn wait_policy(&self, request: &RunRequest) -> WaitPolicy {
        let requested = request
            .wait_poll_interval_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.config.poll_interval);

        WaitPolicy {
            poll_interval: requested.max(self.config.min_poll_interval),
            timeout: request
                .wait_timeout_seconds
                .map(Duration::from_secs)
                .or(self.config.wait_timeout),
            max_consecutive_failures: self.config.max_consecutive_status_failures.max(1),
            retry: self.retry.clone(),
        }
    }
}

/// `jobpulse_octoparse_tasks_<group>_<YYYYMMDD-HHMMSS>.xlsx` in UTC
///
/// Characters of the group id outside `[A-Za-z0-9_-]` are replaced so the
/// name is safe in a `Content-Disposition` header and on any filesystem.
pub fn export_filename(group: &TaskGroupId, now: chrono::DateTime<chrono::Utc>) -> String {
    let group: String = group
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "jobpulse_octoparse_tasks_{group}_{}.xlsx",
        now.format("%Y%m%d-%H%M%S")
    )
}
