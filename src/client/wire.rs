//! Provider response envelopes

use crate::types::{ResultRow, TaskId, TaskStatus};
use serde::Deserialize;
use serde_json::Value;

/// `{ "data": ... }` wrapper used by every provider endpoint
///
/// A missing or null `data` deserializes to `None`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: Option<T>,
}

impl<T: Default> Envelope<T> {
    pub fn into_data(self) -> T {
        self.data.unwrap_or_default()
    }
}

/// `data` of a GetDataOfTaskByOffset response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DataPage {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data_list: Vec<ResultRow>,
}

/// One entry of the batch status response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusEntry {
    pub task_id: TaskId,
    #[serde(default)]
    pub status: Value,
}

impl StatusEntry {
    /// Some deployments report the status as a string, others as a code
    pub fn status(&self) -> TaskStatus {
        match &self.status {
            Value::String(s) => TaskStatus::parse(s),
            Value::Null => TaskStatus::Unknown,
            other => TaskStatus::Other(other.to_string()),
        }
    }
}

/// Request body of the batch status endpoint
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusQuery<'a> {
    pub task_ids: &'a [TaskId],
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
