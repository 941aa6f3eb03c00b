use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid row {index} ({reason}): {raw}")]
    InvalidRow {
        index: usize,
        raw: String,
        reason: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    /// Whether the failure happened before a response was obtained.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_) | Self::Cancelled)
    }
}

pub type AppResult<T> = Result<T, AppError>;
