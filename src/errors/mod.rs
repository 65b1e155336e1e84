/// Error types for the fetch layer
///
/// Only HTTP 429 is absorbed inside the coordinator. Every other failure
/// crosses the component boundary as one of these variants so the caller can
/// apply its own policy.
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {url} was cancelled")]
    Cancelled { url: String },

    #[error("HTTP {status} from {url}")]
    Status { status: StatusCode, url: String },

    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Configuration error: {field}: {reason}")]
    Config { field: String, reason: String },
}

impl FetchError {
    pub fn config(field: &str, reason: impl Into<String>) -> Self {
        FetchError::Config {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled { .. })
    }

    /// HTTP status carried by a remote rejection, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Failures that happened before any request could be made
    pub fn is_configuration(&self) -> bool {
        matches!(self, FetchError::Config { .. } | FetchError::InvalidUrl { .. })
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
