use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, XApiError>;

#[derive(Debug, Error)]
pub enum XApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, window resets at {reset_at:?}")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl From<reqwest::Error> for XApiError {
    fn from(err: reqwest::Error) -> Self {
        XApiError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for XApiError {
    fn from(err: serde_json::Error) -> Self {
        XApiError::Parse(err.to_string())
    }
}
