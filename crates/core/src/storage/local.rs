use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::config::LocalStorageConfig;

use super::{validate_key, BlobStore, StorageError};

/// Local filesystem blob store
///
/// Objects are copied under `root` and served from `public_base_url`
/// (the server mounts `root` at `/blobs` when this backend is active).
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    /// Create a new LocalBlobStore, creating `root` if needed.
    pub async fn new(config: LocalStorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                config.root.display(),
                e
            ))
        })?;

        Ok(Self {
            root: config.root,
            base_url: config.public_base_url,
        })
    }

    /// Root directory objects are stored under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_to_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload(&self, local_path: &Path, key: &str) -> Result<String, StorageError> {
        let destination = self.key_to_path(key)?;

        if !fs::try_exists(local_path).await.unwrap_or(false) {
            return Err(StorageError::SourceMissing {
                path: local_path.to_path_buf(),
            });
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        let bytes = fs::copy(local_path, &destination).await?;
        debug!("Stored {} bytes at {}", bytes, destination.display());

        Ok(self.public_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}
