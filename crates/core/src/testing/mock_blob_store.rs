//! Mock blob store for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::{BlobStore, StorageError};

/// A recorded upload for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    /// Local file that was uploaded.
    pub local_path: PathBuf,
    /// Destination key.
    pub key: String,
    /// File contents at upload time (empty if the upload failed).
    pub contents: Vec<u8>,
    /// Whether the upload succeeded.
    pub success: bool,
}

/// Mock implementation of the BlobStore trait.
///
/// Provides controllable behavior for testing:
/// - Track uploads (key and content) for assertions
/// - Fail the next upload, or every upload whose key matches a pattern
#[derive(Debug)]
pub struct MockBlobStore {
    base_url: String,
    uploads: Arc<RwLock<Vec<RecordedUpload>>>,
    /// If set, the next upload fails with this error.
    next_error: Arc<RwLock<Option<StorageError>>>,
    /// Uploads whose key contains any of these fail.
    failing_patterns: Arc<RwLock<Vec<String>>>,
}

impl Default for MockBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBlobStore {
    /// Create a new mock blob store.
    pub fn new() -> Self {
        Self {
            base_url: "https://storage.test/mock-bucket".to_string(),
            uploads: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            failing_patterns: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get all recorded uploads.
    pub async fn recorded_uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.read().await.clone()
    }

    /// Keys of the successful uploads, in order.
    pub async fn uploaded_keys(&self) -> Vec<String> {
        self.uploads
            .read()
            .await
            .iter()
            .filter(|u| u.success)
            .map(|u| u.key.clone())
            .collect()
    }

    /// Get the number of upload attempts.
    pub async fn upload_count(&self) -> usize {
        self.uploads.read().await.len()
    }

    /// Configure the next upload to fail with the given error.
    pub async fn set_next_error(&self, error: StorageError) {
        *self.next_error.write().await = Some(error);
    }

    /// Fail every upload whose key contains `pattern`.
    pub async fn fail_uploads_matching(&self, pattern: impl Into<String>) {
        self.failing_patterns.write().await.push(pattern.into());
    }

    async fn take_error(&self, key: &str) -> Option<StorageError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Some(err);
        }
        self.failing_patterns
            .read()
            .await
            .iter()
            .any(|p| key.contains(p.as_str()))
            .then(|| StorageError::UploadFailed {
                status: 403,
                message: format!("mock rejected {}", key),
            })
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload(&self, local_path: &Path, key: &str) -> Result<String, StorageError> {
        let failure = match self.take_error(key).await {
            Some(err) => Err(err),
            None => tokio::fs::read(local_path).await.map_err(|_| StorageError::SourceMissing {
                path: local_path.to_path_buf(),
            }),
        };

        let (contents, result) = match failure {
            Ok(contents) => (contents, Ok(self.public_url(key))),
            Err(err) => (Vec::new(), Err(err)),
        };

        self.uploads.write().await.push(RecordedUpload {
            local_path: local_path.to_path_buf(),
            key: key.to_string(),
            contents,
            success: result.is_ok(),
        });
        result
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}
