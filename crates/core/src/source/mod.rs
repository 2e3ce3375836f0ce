//! Image source: fetches the caller's image over HTTP into a local file.

mod http;

pub use http::HttpImageSource;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while fetching a source image.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be parsed or uses an unsupported scheme.
    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),

    /// The server answered with a non-success status.
    #[error("{status} error fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// The bounded wait elapsed.
    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    /// Could not connect to the server.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Any other transport failure.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Writing the local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::ConnectionFailed(_) => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A source that can stream a remote image to a local path.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Returns the name of this source implementation.
    fn name(&self) -> &str;

    /// Streams `url` into `dest`, creating or truncating it.
    /// Returns the number of bytes written.
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}
