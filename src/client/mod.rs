//! Authenticated client for the provider's task API
//!
//! [`RemoteTaskClient`] is a thin, typed wrapper: every call attaches the
//! bearer header from the shared [`CredentialManager`], maps any non-200
//! answer to [`Error::Remote`] and unwraps the provider's `{ "data": ... }`
//! envelope.
//!
//! The orchestrator does not depend on the concrete client. It talks to the
//! [`TaskProvider`], [`StatusSource`] and [`PageSource`] traits, which the
//! client implements and which tests replace with in-memory fakes.

mod wire;

use crate::config::{ApiTier, Config, ProviderConfig, RetryConfig};
use crate::credentials::CredentialManager;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::{RemoteTask, ResultRow, TaskGroup, TaskGroupId, TaskId, TaskStatus};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use wire::{DataPage, Envelope, StatusEntry, StatusQuery};

/// Batch status lookup for a set of tasks
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Current status of each task; ids the provider omits are absent from the map
    async fn get_statuses(&self, ids: &[TaskId]) -> Result<HashMap<TaskId, TaskStatus>>;
}

/// Offset-addressed access to a task's result rows
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Up to `size` rows starting at `offset`; an empty page means no more data
    async fn get_data_page(&self, id: &TaskId, offset: usize, size: usize)
    -> Result<Vec<ResultRow>>;
}

/// Everything a run needs from the provider
#[async_trait]
pub trait TaskProvider: StatusSource + PageSource {
    /// Tasks belonging to a group
    async fn list_tasks(&self, group: &TaskGroupId) -> Result<Vec<RemoteTask>>;

    /// Remove all previously extracted data of a task
    async fn clear_task_data(&self, id: &TaskId) -> Result<()>;

    /// Start a cloud extraction run
    async fn start_task(&self, id: &TaskId) -> Result<()>;
}

/// Typed client for the provider API
pub struct RemoteTaskClient {
    http: reqwest::Client,
    credentials: Arc<CredentialManager>,
    base_url: String,
    status_base_url: String,
    tier: ApiTier,
    request_timeout: Duration,
    data_timeout: Duration,
    retry: RetryConfig,
}

impl RemoteTaskClient {
    /// Create a client sharing an existing credential manager
    pub fn new(
        http: reqwest::Client,
        provider: &ProviderConfig,
        retry: RetryConfig,
        credentials: Arc<CredentialManager>,
    ) -> Self {
        Self {
            http,
            credentials,
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            status_base_url: provider.status_base_url.trim_end_matches('/').to_string(),
            tier: provider.tier,
            request_timeout: provider.request_timeout,
            data_timeout: provider.data_timeout,
            retry,
        }
    }

    /// Build the HTTP client and credential manager from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("jobpulse/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let credentials = Arc::new(CredentialManager::new(http.clone(), &config.provider)?);
        Ok(Self::new(
            http,
            &config.provider,
            config.retry.clone(),
            credentials,
        ))
    }

    /// The shared credential manager
    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    /// Configured API tier
    pub fn tier(&self) -> ApiTier {
        self.tier
    }

    /// All task groups visible to the account
    pub async fn list_task_groups(&self) -> Result<Vec<TaskGroup>> {
        with_retry(&self.retry, move || async move {
            let request = self
                .http
                .get(self.url("/api/TaskGroup"))
                .timeout(self.request_timeout);
            let envelope: Envelope<Vec<TaskGroup>> = self.send_json(request).await?;
            Ok(envelope.into_data())
        })
        .await
    }

    /// Tasks belonging to a group
    pub async fn list_tasks(&self, group: &TaskGroupId) -> Result<Vec<RemoteTask>> {
        with_retry(&self.retry, move || async move {
            let request = self
                .http
                .get(self.url("/api/Task"))
                .query(&[("taskGroupId", group.as_str())])
                .timeout(self.request_timeout);
            let envelope: Envelope<Vec<RemoteTask>> = self.send_json(request).await?;
            Ok(envelope.into_data())
        })
        .await
    }

    /// Start a cloud extraction run (Advanced tier)
    pub async fn start_task(&self, id: &TaskId) -> Result<()> {
        self.require_task_control("StartTask")?;
        self.post_task_action("/api/task/StartTask", id).await
    }

    /// Stop a running extraction (Advanced tier)
    pub async fn stop_task(&self, id: &TaskId) -> Result<()> {
        self.require_task_control("StopTask")?;
        self.post_task_action("/api/task/StopTask", id).await
    }

    /// Remove all previously extracted data of a task
    pub async fn clear_task_data(&self, id: &TaskId) -> Result<()> {
        self.post_task_action("/api/task/RemoveDataByTaskId", id)
            .await
    }

    /// Batch status lookup (Advanced tier)
    pub async fn get_statuses(&self, ids: &[TaskId]) -> Result<HashMap<TaskId, TaskStatus>> {
        self.require_task_control("GetTaskStatusByIdList")?;
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let request = self
            .http
            .post(format!(
                "{}/cloudextraction/statuses/v2",
                self.status_base_url
            ))
            .json(&StatusQuery { task_ids: ids })
            .timeout(self.request_timeout);
        let envelope: Envelope<Vec<StatusEntry>> = self.send_json(request).await?;

        Ok(envelope
            .into_data()
            .into_iter()
            .map(|entry| {
                let status = entry.status();
                (entry.task_id, status)
            })
            .collect())
    }

    /// One page of a task's extracted rows
    pub async fn get_data_page(
        &self,
        id: &TaskId,
        offset: usize,
        size: usize,
    ) -> Result<Vec<ResultRow>> {
        let (offset, size) = (offset.to_string(), size.to_string());
        let (offset, size) = (offset.as_str(), size.as_str());
        with_retry(&self.retry, move || async move {
            let request = self
                .http
                .get(self.url("/api/alldata/GetDataOfTaskByOffset"))
                .query(&[
                    ("taskId", id.as_str()),
                    ("offset", offset),
                    ("size", size),
                ])
                .timeout(self.data_timeout);
            let envelope: Envelope<DataPage> = self.send_json(request).await?;
            Ok(envelope.into_data().data_list)
        })
        .await
    }

    fn require_task_control(&self, operation: &str) -> Result<()> {
        if self.tier.allows_task_control() {
            Ok(())
        } else {
            Err(Error::advanced_only(operation))
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_task_action(&self, path: &str, id: &TaskId) -> Result<()> {
        let request = self
            .http
            .post(self.url(path))
            .query(&[("taskId", id.as_str())])
            .timeout(self.request_timeout);
        self.send(request).await?;
        debug!(task_id = %id, action = path, "task action accepted");
        Ok(())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let header = self.credentials.auth_header().await?;
        let response = request.header(AUTHORIZATION, header).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Remote {
            status,
            body: format!("unparseable response body: {e}"),
        })
    }
}

#[async_trait]
impl StatusSource for RemoteTaskClient {
    async fn get_statuses(&self, ids: &[TaskId]) -> Result<HashMap<TaskId, TaskStatus>> {
        RemoteTaskClient::get_statuses(self, ids).await
    }
}

#[async_trait]
impl PageSource for RemoteTaskClient {
    async fn get_data_page(
        &self,
        id: &TaskId,
        offset: usize,
        size: usize,
    ) -> Result<Vec<ResultRow>> {
        RemoteTaskClient::get_data_page(self, id, offset, size).await
    }
}

#[async_trait]
impl TaskProvider for RemoteTaskClient {
    async fn list_tasks(&self, group: &TaskGroupId) -> Result<Vec<RemoteTask>> {
        RemoteTaskClient::list_tasks(self, group).await
    }

    async fn clear_task_data(&self, id: &TaskId) -> Result<()> {
        RemoteTaskClient::clear_task_data(self, id).await
    }

    async fn start_task(&self, id: &TaskId) -> Result<()> {
        RemoteTaskClient::start_task(self, id).await
    }
}
