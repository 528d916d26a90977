//! Core types for jobpulse

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Provider-assigned task identifier
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ToSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(string_or_number(deserializer)?))
    }
}

/// Provider-assigned task group identifier
///
/// The provider returns numeric group ids; they are kept as opaque strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(transparent)]
pub struct TaskGroupId(pub String);

impl TaskGroupId {
    /// Create a new TaskGroupId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskGroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TaskGroupId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(string_or_number(deserializer)?))
    }
}

/// Deserialize an identifier the provider may send as either a string or a number
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Uint(n) => n.to_string(),
    })
}

/// A named collection of tasks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaskGroup {
    /// Group identifier
    #[serde(rename = "taskGroupId")]
    pub id: TaskGroupId,
    /// Human label
    #[serde(rename = "taskGroupName", default)]
    pub name: Option<String>,
}

/// Remote task status
///
/// `Finished` and `Stopped` are terminal; anything the provider reports that
/// is not recognized is kept verbatim in `Other`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TaskStatus {
    /// Extraction in progress
    Running,
    /// Extraction completed
    Finished,
    /// Extraction stopped by a user or the provider
    Stopped,
    /// Queued, not yet running
    Waiting,
    /// Status not reported or not recognized
    #[default]
    Unknown,
    /// Unrecognized status string
    Other(String),
}

impl TaskStatus {
    /// Parse a provider status string (case-insensitive)
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" | "executing" => TaskStatus::Running,
            "finished" | "completed" => TaskStatus::Finished,
            "stopped" => TaskStatus::Stopped,
            "waiting" | "queued" => TaskStatus::Waiting,
            "" | "unknown" => TaskStatus::Unknown,
            _ => TaskStatus::Other(raw.trim().to_string()),
        }
    }

    /// Whether no further progress occurs from this status during a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Finished | TaskStatus::Stopped)
    }

    /// Display form used on the wire
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Running => "Running",
            TaskStatus::Finished => "Finished",
            TaskStatus::Stopped => "Stopped",
            TaskStatus::Waiting => "Waiting",
            TaskStatus::Unknown => "Unknown",
            TaskStatus::Other(s) => s,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| TaskStatus::parse(&s)).unwrap_or_default())
    }
}

/// A remote scraping task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RemoteTask {
    /// Task identifier
    #[serde(rename = "taskId")]
    pub id: TaskId,
    /// Human label, used to derive the sheet title
    #[serde(rename = "taskName", default)]
    pub name: Option<String>,
    /// Last known status
    #[serde(default)]
    #[schema(value_type = String)]
    pub status: TaskStatus,
}

impl RemoteTask {
    /// Create a task with unknown status
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: TaskId::new(id),
            name: name.map(str::to_string),
            status: TaskStatus::Unknown,
        }
    }
}

/// One result row returned by the provider
///
/// An ordered mapping from field name to value. The schema is provider and
/// task dependent, so no fixed struct is imposed; key order is the order the
/// provider sent them in.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct ResultRow(Map<String, Value>);

impl ResultRow {
    /// Create an empty row
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Insert or replace a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Field names in provider order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Raw value of a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the row has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Text of a field, `None` when absent, null or blank
    pub fn text(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .map(render_cell)
            .filter(|s| !s.trim().is_empty())
    }

    /// Cell rendering of a field; absent keys render as an empty string
    pub fn cell(&self, key: &str) -> String {
        self.0.get(key).map(render_cell).unwrap_or_default()
    }

    /// Consume the row, returning the underlying map
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ResultRow {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ResultRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Render a JSON value as spreadsheet cell text
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// All rows collected for one task, in page arrival order
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct TaskResultSet {
    /// The task the rows belong to
    pub task: RemoteTask,
    /// Collected rows
    pub rows: Vec<ResultRow>,
    /// Number of page requests issued
    pub fetches: usize,
    /// Error that ended collection early, if any
    pub truncated_by: Option<String>,
}

impl TaskResultSet {
    /// An empty result set for a task that was never collected
    pub fn empty(task: RemoteTask) -> Self {
        Self {
            task,
            rows: Vec::new(),
            fetches: 0,
            truncated_by: None,
        }
    }

    /// True when collection stopped on an error rather than end of data
    pub fn is_partial(&self) -> bool {
        self.truncated_by.is_some()
    }
}

/// Outcome counts of a best-effort persistence pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PersistSummary {
    /// Rows handed to the sink
    pub attempted: usize,
    /// Rows stored or updated
    pub upserted: usize,
    /// Rows the sink rejected
    pub failed: usize,
}

/// Orchestration request
///
/// Wire names follow the provider's camelCase convention.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Task group to run (required)
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub task_group_id: Option<String>,
    /// Restrict the run to these task ids
    #[serde(default)]
    pub selected_task_ids: Option<Vec<TaskId>>,
    /// Seconds between status polls (default: 5)
    #[serde(default)]
    pub wait_poll_interval_seconds: Option<u64>,
    /// Rows per data page (default: 1000)
    #[serde(default)]
    pub page_size: Option<usize>,
    /// First offset to fetch (default: 0)
    #[serde(default)]
    pub offset: Option<usize>,
    /// Give up waiting after this many seconds
    #[serde(default)]
    pub wait_timeout_seconds: Option<u64>,
    /// Upsert collected rows into the local job store
    #[serde(default)]
    pub persist: bool,
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }

    Ok(
        Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
            Raw::Text(s) => s,
            Raw::Int(n) => n.to_string(),
        }),
    )
}

/// What a run did, reported alongside the workbook
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct RunSummary {
    /// Group that was run
    pub group_id: String,
    /// Number of tasks in the workbook
    pub tasks: usize,
    /// Total rows collected across all tasks
    pub rows_collected: usize,
    /// Tasks whose collection ended on an error
    pub partial_tasks: Vec<TaskId>,
    /// Tasks that could not be cleared or started
    pub skipped_tasks: Vec<TaskId>,
    /// Persistence outcome, when requested
    pub persisted: Option<PersistSummary>,
}
