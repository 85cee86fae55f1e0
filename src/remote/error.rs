//! Remote service error types

use thiserror::Error;

/// Errors that can occur when talking to the story endpoints
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Endpoint could not be reached
    #[error("Service unavailable")]
    Unavailable,

    /// Endpoint did not answer in time
    #[error("Request timeout")]
    Timeout,

    /// Request failed below the HTTP status level
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Endpoint answered with a failure status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Requested key does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Response body could not be understood
    #[error("Malformed response: {0}")]
    Decode(String),

    /// Backend does not offer this operation
    #[error("Not supported: {0}")]
    Unsupported(&'static str),
}

impl RemoteError {
    /// True when no HTTP response was received at all
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RemoteError::Unavailable | RemoteError::Timeout | RemoteError::Transport(_)
        )
    }

    /// Text to show after a "failed" prefix: the raw response body for API
    /// errors, the error description otherwise
    pub fn detail(&self) -> String {
        match self {
            RemoteError::Api { message, .. } if !message.is_empty() => message.clone(),
            RemoteError::NotFound(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Decode(err.to_string())
    }
}

/// Result type alias for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;
