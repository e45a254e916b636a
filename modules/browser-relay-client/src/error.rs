use thiserror::Error;

pub type Result<T> = std::result::Result<T, CaptureError>;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Relay error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for CaptureError {
    fn from(err: reqwest::Error) -> Self {
        CaptureError::Network(err.to_string())
    }
}
