//! Mock image source for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::source::{FetchError, ImageSource};

/// A recorded fetch for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedFetch {
    pub url: String,
    pub dest: PathBuf,
    pub success: bool,
}

/// Mock implementation of the ImageSource trait.
///
/// Writes configurable bytes to the destination. Queued errors are returned
/// one per fetch before fetches start succeeding again, which lets tests
/// exercise retries.
#[derive(Debug)]
pub struct MockImageSource {
    body: Arc<RwLock<Vec<u8>>>,
    errors: Arc<RwLock<VecDeque<FetchError>>>,
    fetches: Arc<RwLock<Vec<RecordedFetch>>>,
}

impl Default for MockImageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockImageSource {
    /// Create a new mock source serving a tiny PNG signature.
    pub fn new() -> Self {
        Self {
            body: Arc::new(RwLock::new(b"\x89PNG\r\n\x1a\nmock".to_vec())),
            errors: Arc::new(RwLock::new(VecDeque::new())),
            fetches: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the bytes written by successful fetches.
    pub async fn set_body(&self, body: impl Into<Vec<u8>>) {
        *self.body.write().await = body.into();
    }

    /// Queue an error for an upcoming fetch.
    pub async fn push_error(&self, error: FetchError) {
        self.errors.write().await.push_back(error);
    }

    /// Get all recorded fetches.
    pub async fn recorded_fetches(&self) -> Vec<RecordedFetch> {
        self.fetches.read().await.clone()
    }

    /// Get the number of fetch attempts.
    pub async fn fetch_count(&self) -> usize {
        self.fetches.read().await.len()
    }
}

#[async_trait]
impl ImageSource for MockImageSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let queued = self.errors.write().await.pop_front();
        let result = match queued {
            Some(err) => Err(err),
            None => {
                let body = self.body.read().await.clone();
                tokio::fs::write(dest, &body).await?;
                Ok(body.len() as u64)
            }
        };

        self.fetches.write().await.push(RecordedFetch {
            url: url.to_string(),
            dest: dest.to_path_buf(),
            success: result.is_ok(),
        });
        result
    }
}
