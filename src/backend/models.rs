use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::series::models::{DataPoint, ParameterId};

/// Which parameter families to load. Bit 1 is sensor, bit 2 is manual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterMask(pub u8);

impl ParameterMask {
    pub const ALL: Self = Self(3);
}

/// Body of a `fetchQuery` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    pub start_time: i64,
    pub end_time: i64,
    pub params: Vec<ParameterId>,
}

/// Response to `fetchQuery`.
#[derive(Debug, Clone, Deserialize)]
pub struct DataResponse {
    pub data: Vec<ResponseSeries>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseSeries {
    #[serde(alias = "param")]
    pub id: ParameterId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "dataValues", alias = "data")]
    pub data_values: Vec<DataPoint>,
}

/// Response to `getParameters`.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterResponse {
    pub data: Vec<ParameterGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParameterGroup {
    pub mask: u8,
    pub descriptors: Vec<WireDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireDescriptor {
    pub id: ParameterId,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    /// Older backends send the unit as a nested object or a number.
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// `{ "status": ... }` envelope used by the write actions.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Success,
    Failed,
    Error(String),
}

impl From<StatusResponse> for BackendStatus {
    fn from(resp: StatusResponse) -> Self {
        match resp.status.trim() {
            s if s.eq_ignore_ascii_case("success") => Self::Success,
            s if s.eq_ignore_ascii_case("failed") => Self::Failed,
            s => Self::Error(s.to_string()),
        }
    }
}

/// One timestamped value in an `insertData` payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InsertValue {
    pub timestamp: i64,
    pub value: f64,
}

/// All values for one parameter in an `insertData` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertGroup {
    pub name: String,
    pub values: Vec<InsertValue>,
}

/// Body of a `RemoveData` request: every timestamp to drop for one parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteDataRequest {
    pub parameter: String,
    pub time: Vec<i64>,
}

/// Collects deletions and groups them per parameter, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct DeletionQueue {
    requests: Vec<DeleteDataRequest>,
    index: HashMap<String, usize>,
}

impl DeletionQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, parameter: &str, timestamp: i64) {
        if let Some(&i) = self.index.get(parameter) {
            self.requests[i].time.push(timestamp);
            return;
        }
        self.index.insert(parameter.to_string(), self.requests.len());
        self.requests.push(DeleteDataRequest {
            parameter: parameter.to_string(),
            time: vec![timestamp],
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    #[must_use]
    pub fn into_requests(self) -> Vec<DeleteDataRequest> {
        self.requests
    }
}

/// A single hand-entered value (`InputData`).
#[derive(Debug, Clone, PartialEq)]
pub struct ManualEntry {
    pub data_name: String,
    pub time: i64,
    pub value: f64,
}
