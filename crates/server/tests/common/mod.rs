//! Common test utilities for endpoint testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! with mock collaborators injected, so the whole request cycle can be
//! exercised without a hosted space or a bucket.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use relay3d_core::{
    testing::{MockBlobStore, MockImageSource, MockInferenceClient},
    Config, Orchestrator,
};
use relay3d_server::state::AppState;

/// Re-export fixtures for test convenience
pub use relay3d_core::testing::fixtures;

/// Test fixture with mock dependencies.
///
/// Provides an in-process router with fully controllable mocks for:
/// - The inference service (MockInferenceClient)
/// - Blob storage (MockBlobStore)
/// - Image downloads (MockImageSource)
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Shared state, for draining detached work
    pub state: Arc<AppState>,
    pub inference: Arc<MockInferenceClient>,
    pub store: Arc<MockBlobStore>,
    pub source: Arc<MockImageSource>,
    pub config: Config,
    /// Temporary directory for scratch files and remote outputs
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture; mesh extraction completes before responding.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a test fixture with a customized config.
    pub fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = fixtures::test_config(temp_dir.path());
        customize(&mut config);

        let inference = Arc::new(MockInferenceClient::new(temp_dir.path().join("remote")));
        let store = Arc::new(MockBlobStore::new());
        let source = Arc::new(MockImageSource::new());

        let orchestrator = Orchestrator::new(
            &config,
            inference.clone(),
            store.clone(),
            source.clone(),
        );
        let state = Arc::new(AppState::new(config.clone(), orchestrator));
        let router = relay3d_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            inference,
            store,
            source,
            config,
            temp_dir,
        }
    }

    /// Files left in the scratch and remote-output directories.
    pub fn leftover_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for dir in [
            self.config.download.scratch_dir.clone(),
            self.inference.output_dir().to_path_buf(),
        ] {
            if let Ok(entries) = std::fs::read_dir(dir) {
                files.extend(entries.filter_map(|e| e.ok()).map(|e| e.path()));
            }
        }
        files
    }

    /// Send a GET request.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request(
            "POST",
            path,
            Some(serde_json::to_string(&body).expect("Failed to encode body")),
        )
        .await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request("POST", path, Some(body.to_string())).await
    }

    /// Send a request with an arbitrary method.
    pub async fn request(&self, method: &str, path: &str, body: Option<String>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = match body {
            Some(body) => {
                request_builder = request_builder.header("Content-Type", "application/json");
                Body::from(body)
            }
            None => Body::empty(),
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
