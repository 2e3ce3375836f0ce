//! Blob storage for pipeline artifacts.
//!
//! Backends upload a local file under a destination key and hand back a
//! publicly readable URL.
//!
//! # Key format
//!
//! Artifacts live under `processed/{user_id}/{timestamp}/{artifact_name}`;
//! see [`artifact_key`].

mod gcs;
mod local;

pub use gcs::GcsBlobStore;
pub use local::LocalBlobStore;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Local artifact to upload does not exist.
    #[error("Artifact not found: {path}")]
    SourceMissing { path: PathBuf },

    /// Destination key is malformed or escapes the storage root.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// The backend rejected the upload.
    #[error("Upload failed with HTTP {status}: {message}")]
    UploadFailed { status: u16, message: String },

    /// No usable credentials.
    #[error("Storage authentication failed: {0}")]
    AuthFailed(String),

    #[error("Storage request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Storage request failed: {0}")]
    RequestFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionFailed(_) => true,
            Self::UploadFailed { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::ConnectionFailed(e.to_string())
        } else {
            Self::RequestFailed(e.to_string())
        }
    }
}

/// Blob store abstraction
///
/// All storage backends (GCS, local filesystem) implement this trait so the
/// pipeline never couples to a specific provider.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns the name of this backend.
    fn name(&self) -> &str;

    /// Uploads the file at `local_path` under `key` and returns its public URL.
    async fn upload(&self, local_path: &Path, key: &str) -> Result<String, StorageError>;

    /// The public URL an object stored under `key` is served from.
    fn public_url(&self, key: &str) -> String;
}

/// Destination key for one artifact of one request.
pub fn artifact_key(user_id: &str, timestamp: i64, artifact_name: &str) -> String {
    format!("processed/{}/{}/{}", user_id, timestamp, artifact_name)
}

/// Content type inferred from the key's extension.
pub fn content_type_for(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "glb" => "model/gltf-binary",
        "gltf" => "model/gltf+json",
        _ => "application/octet-stream",
    }
}

/// Rejects keys that are empty, absolute or contain parent references.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Build the configured blob store.
pub async fn create_blob_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>, StorageError> {
    match config.backend {
        StorageBackend::Gcs => {
            let gcs = config.gcs.as_ref().ok_or_else(|| {
                StorageError::ConfigError("GCS backend selected but no [storage.gcs] section".to_string())
            })?;
            Ok(Arc::new(GcsBlobStore::new(gcs.clone())?))
        }
        StorageBackend::Local => Ok(Arc::new(LocalBlobStore::new(config.local.clone()).await?)),
    }
}
