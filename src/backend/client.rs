use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::backend::models::{
    BackendStatus, DataRequest, DataResponse, DeleteDataRequest, InsertGroup, ManualEntry,
    ParameterMask, ParameterResponse, StatusResponse,
};
use crate::config::Config;
use crate::error::{AppError, AppResult};

/// The servlet actions the dashboard relies on.
///
/// Every call resolves to a success payload or an `AppError`; callers never
/// inspect raw JSON to find out whether something went wrong.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Load parameter descriptors for the families in `mask`.
    async fn get_parameters(&self, mask: ParameterMask) -> AppResult<ParameterResponse>;

    /// Fetch observations for a time range.
    async fn fetch_query(&self, request: &DataRequest) -> AppResult<DataResponse>;

    /// Send one bulk-insert batch.
    async fn insert_data(&self, payload: &[InsertGroup]) -> AppResult<()>;

    /// Remove observations of one parameter at the given timestamps.
    async fn remove_data(&self, request: &DeleteDataRequest) -> AppResult<()>;

    /// Insert a single hand-entered value.
    async fn input_data(&self, entry: &ManualEntry) -> AppResult<()>;
}

pub struct DashboardClient {
    http_client: Client,
    admin_url: String,
    control_url: String,
    timeout: Duration,
    cancel: CancellationToken,
}

impl DashboardClient {
    /// # Errors
    ///
    /// Returns `AppError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> AppResult<Self> {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Build a client whose requests all abort when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transport` if the HTTP client cannot be built.
    pub fn with_cancellation(config: &Config, cancel: CancellationToken) -> AppResult<Self> {
        let timeout = config.request_timeout();
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            admin_url: config.admin_url(),
            control_url: config.control_url(),
            timeout,
            cancel,
        })
    }

    async fn cancellable<T>(&self, fut: impl Future<Output = AppResult<T>>) -> AppResult<T> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(AppError::Cancelled),
            result = fut => result,
        }
    }

    fn map_send_error(&self, e: &reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout)
        } else {
            AppError::Transport(format!("Request failed: {e}"))
        }
    }

    /// POST a form to `url` and return the response body.
    async fn post_form(&self, url: &str, action: &str, form: &[(&str, String)]) -> AppResult<String> {
        self.cancellable(async {
            let mut fields: Vec<(&str, &str)> = Vec::with_capacity(form.len() + 1);
            fields.push(("action", action));
            fields.extend(form.iter().map(|(k, v)| (*k, v.as_str())));

            let response = self
                .http_client
                .post(url)
                .form(&fields)
                .send()
                .await
                .map_err(|e| self.map_send_error(&e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::Transport(format!("HTTP {status}: {body}")));
            }

            response
                .text()
                .await
                .map_err(|e| self.map_send_error(&e))
        })
        .await
    }

    /// Write actions answer with nothing or with a `{status}` envelope.
    async fn post_write(&self, url: &str, action: &str, form: &[(&str, String)]) -> AppResult<()> {
        let text = self.post_form(url, action, form).await?;
        check_status(action, &text)
    }
}

/// Parse a response body, logging a preview of anything that does not fit.
///
/// # Errors
///
/// Returns `AppError::MalformedResponse` if `text` does not match `T`.
pub fn parse_response<T: DeserializeOwned>(action: &str, text: &str) -> AppResult<T> {
    serde_json::from_str(text).map_err(|e| {
        tracing::error!(
            action,
            error = %e,
            body_preview = %text.chars().take(500).collect::<String>(),
            "Failed to parse backend response"
        );
        AppError::MalformedResponse(format!("{action}: {e}"))
    })
}

/// Interpret the body of a write action.
///
/// # Errors
///
/// Returns `AppError::Backend` for a non-success status and
/// `AppError::MalformedResponse` for a body without one.
pub fn check_status(action: &str, text: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Ok(());
    }
    let resp: StatusResponse = parse_response(action, text)?;
    match BackendStatus::from(resp) {
        BackendStatus::Success => Ok(()),
        BackendStatus::Failed => Err(AppError::Backend(format!("{action} failed"))),
        BackendStatus::Error(msg) => Err(AppError::Backend(format!("{action}: {msg}"))),
    }
}

#[async_trait]
impl Backend for DashboardClient {
    async fn get_parameters(&self, mask: ParameterMask) -> AppResult<ParameterResponse> {
        let text = self
            .post_form(&self.admin_url, "getParameters", &[("data", mask.0.to_string())])
            .await?;
        parse_response("getParameters", &text)
    }

    async fn fetch_query(&self, request: &DataRequest) -> AppResult<DataResponse> {
        let query = serde_json::to_string(request)?;
        tracing::debug!(
            start = request.start_time,
            end = request.end_time,
            params = request.params.len(),
            "fetch_query"
        );
        let text = self
            .post_form(&self.control_url, "fetchQuery", &[("query", query)])
            .await?;
        parse_response("fetchQuery", &text)
    }

    async fn insert_data(&self, payload: &[InsertGroup]) -> AppResult<()> {
        let data = serde_json::to_string(payload)?;
        self.post_write(&self.admin_url, "insertData", &[("data", data)])
            .await
    }

    async fn remove_data(&self, request: &DeleteDataRequest) -> AppResult<()> {
        let data = serde_json::to_string(request)?;
        self.post_write(&self.admin_url, "RemoveData", &[("data", data)])
            .await
    }

    async fn input_data(&self, entry: &ManualEntry) -> AppResult<()> {
        self.post_write(
            &self.admin_url,
            "InputData",
            &[
                ("dataName", entry.data_name.clone()),
                ("time", entry.time.to_string()),
                ("value", entry.value.to_string()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_success() {
        assert!(check_status("insertData", "").is_ok());
        assert!(check_status("insertData", "  \n").is_ok());
        assert!(check_status("insertData", r#"{"status":"Success"}"#).is_ok());
    }

    #[test]
    fn failed_status_is_backend_error() {
        let err = check_status("RemoveData", r#"{"status":"Failed"}"#).unwrap_err();
        assert!(matches!(err, AppError::Backend(_)));

        let err = check_status("RemoveData", r#"{"ok":true}"#).unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_requests() {
        let config = Config::with_base_url("http://127.0.0.1:9");
        let token = CancellationToken::new();
        let client = DashboardClient::with_cancellation(&config, token.clone()).unwrap();
        token.cancel();

        let err = client.get_parameters(ParameterMask::ALL).await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
    }
}
