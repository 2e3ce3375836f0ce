//! reqwest-backed image source.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::DownloadConfig;

use super::{FetchError, ImageSource};

/// Fetches images with a plain HTTP GET, streaming the body to disk.
pub struct HttpImageSource {
    client: Client,
}

impl HttpImageSource {
    /// Create a new source. `timeout_secs` bounds the whole request,
    /// body included.
    pub fn new(config: &DownloadConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        Ok(Self { client })
    }

    fn parse_url(url: &str) -> Result<Url, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(FetchError::InvalidUrl(format!(
                "unsupported scheme '{}' in {}",
                other, url
            ))),
        }
    }

    fn map_transport_error(url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if e.is_connect() {
            FetchError::ConnectionFailed(e.to_string())
        } else {
            FetchError::RequestFailed(e.to_string())
        }
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let parsed = Self::parse_url(url)?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| Self::map_transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Self::map_transport_error(url, e))?;
            if chunk.is_empty() {
                continue;
            }
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("Fetched {} bytes from {} into {}", written, url, dest.display());
        Ok(written)
    }
}
