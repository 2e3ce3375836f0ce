//! Google Cloud Storage blob store (JSON API, simple media upload).

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::GcsConfig;

use super::{content_type_for, validate_key, BlobStore, StorageError};

const DEFAULT_API_BASE: &str = "https://storage.googleapis.com";

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh metadata tokens this long before they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// GCS client implementation.
///
/// Objects are expected to be publicly readable through bucket IAM
/// (`allUsers: roles/storage.objectViewer`); no ACLs are set per object.
pub struct GcsBlobStore {
    client: Client,
    config: GcsConfig,
    api_base: String,
    metadata_url: String,
    /// Token fetched from the metadata server (unused with a static token).
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl GcsBlobStore {
    /// Create a new GCS store.
    pub fn new(config: GcsConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        info!("GCS blob store using bucket {}", config.bucket);

        Ok(Self {
            client,
            config,
            api_base: DEFAULT_API_BASE.to_string(),
            metadata_url: METADATA_TOKEN_URL.to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Point uploads at a different API host (emulators, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Point token lookups at a different metadata endpoint.
    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    fn upload_url(&self, key: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(&self.config.bucket),
            urlencoding::encode(key)
        )
    }

    /// Static token if configured, otherwise a cached metadata-server token.
    async fn access_token(&self) -> Result<String, StorageError> {
        if let Some(token) = self.config.access_token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(token.clone());
        }

        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                    return Ok(token.value.clone());
                }
            }
        }

        debug!("Fetching GCS access token from metadata server");
        let response = self
            .client
            .get(&self.metadata_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| StorageError::AuthFailed(format!("metadata server unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(StorageError::AuthFailed(format!(
                "metadata server returned HTTP {}",
                response.status()
            )));
        }

        let token: MetadataToken = response
            .json()
            .await
            .map_err(|e| StorageError::AuthFailed(format!("invalid token response: {}", e)))?;

        let value = token.access_token.clone();
        *self.token.write().await = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    fn name(&self) -> &str {
        "gcs"
    }

    async fn upload(&self, local_path: &Path, key: &str) -> Result<String, StorageError> {
        validate_key(key)?;

        let data = tokio::fs::read(local_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::SourceMissing {
                    path: local_path.to_path_buf(),
                }
            } else {
                StorageError::Io(e)
            }
        })?;
        let size = data.len();
        let token = self.access_token().await?;

        let response = self
            .client
            .post(self.upload_url(key))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type_for(key))
            .body(data)
            .send()
            .await
            .map_err(StorageError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::UploadFailed {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        debug!("Uploaded {} bytes to gs://{}/{}", size, self.config.bucket, key);
        Ok(self.public_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.public_base_url.trim_end_matches('/'),
            self.config.bucket,
            key
        )
    }
}
