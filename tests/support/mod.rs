//! In-memory backend for exercising the services without a servlet.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Mutex;

use envmon_dashboard::backend::Backend;
use envmon_dashboard::backend::models::{
    DataRequest, DataResponse, DeleteDataRequest, InsertGroup, ManualEntry, ParameterMask,
    ParameterResponse,
};
use envmon_dashboard::error::{AppError, AppResult};

#[derive(Default)]
pub struct FakeBackend {
    pub parameters: Option<serde_json::Value>,
    pub query_response: Option<serde_json::Value>,
    /// Fail the insert with this 0-based index.
    pub fail_insert_at: Option<usize>,
    pub queries: Mutex<Vec<DataRequest>>,
    pub inserts: Mutex<Vec<Vec<InsertGroup>>>,
    pub deletes: Mutex<Vec<DeleteDataRequest>>,
    pub inputs: Mutex<Vec<ManualEntry>>,
}

impl FakeBackend {
    pub fn with_parameters(mut self, value: serde_json::Value) -> Self {
        self.parameters = Some(value);
        self
    }

    pub fn with_query_response(mut self, value: serde_json::Value) -> Self {
        self.query_response = Some(value);
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

fn decode<T: serde::de::DeserializeOwned>(action: &str, value: Option<&serde_json::Value>) -> AppResult<T> {
    let value = value.ok_or_else(|| AppError::Transport(format!("{action}: no response configured")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| AppError::MalformedResponse(format!("{action}: {e}")))
}

#[async_trait]
impl Backend for FakeBackend {
    async fn get_parameters(&self, _mask: ParameterMask) -> AppResult<ParameterResponse> {
        decode("getParameters", self.parameters.as_ref())
    }

    async fn fetch_query(&self, request: &DataRequest) -> AppResult<DataResponse> {
        self.queries.lock().unwrap().push(request.clone());
        decode("fetchQuery", self.query_response.as_ref())
    }

    async fn insert_data(&self, payload: &[InsertGroup]) -> AppResult<()> {
        let mut inserts = self.inserts.lock().unwrap();
        if self.fail_insert_at == Some(inserts.len()) {
            return Err(AppError::Transport("HTTP 500 Internal Server Error: ".to_string()));
        }
        inserts.push(payload.to_vec());
        Ok(())
    }

    async fn remove_data(&self, request: &DeleteDataRequest) -> AppResult<()> {
        self.deletes.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn input_data(&self, entry: &ManualEntry) -> AppResult<()> {
        self.inputs.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
