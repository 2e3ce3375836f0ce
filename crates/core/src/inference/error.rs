//! Error types for the inference module.

use thiserror::Error;

/// Errors that can occur while talking to the hosted inference service.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The bounded wait for a remote call elapsed.
    #[error("{api} timed out after {timeout_secs} seconds")]
    Timeout { api: String, timeout_secs: u64 },

    /// Could not reach the service.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Transport-level failure other than connect/timeout.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The service answered with a non-success HTTP status.
    #[error("Inference API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The remote procedure itself reported an error.
    #[error("{api} failed on the remote side: {message}")]
    RemoteError { api: String, message: String },

    /// The event stream closed before a result was delivered.
    #[error("{api} event stream ended without a result")]
    StreamEnded { api: String },

    /// The result did not have the expected shape.
    #[error("Unexpected output from {api}: {detail}")]
    UnexpectedOutput { api: String, detail: String },

    /// Local I/O while staging inputs or saving outputs.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InferenceError {
    /// Creates an unexpected output error.
    pub fn unexpected_output(api: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnexpectedOutput {
            api: api.into(),
            detail: detail.into(),
        }
    }

    /// Creates a remote error.
    pub fn remote(api: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteError {
            api: api.into(),
            message: message.into(),
        }
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_connect() {
            Self::ConnectionFailed(e.to_string())
        } else {
            Self::RequestFailed(e.to_string())
        }
    }
}
