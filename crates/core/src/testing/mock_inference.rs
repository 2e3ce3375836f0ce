//! Mock inference client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::inference::{api, InferenceClient, InferenceError, RemoteCall, RemoteOutput, Session};

/// Shape of the files a mocked remote call produces.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutput {
    Empty,
    Single(String),
    Sequence(Vec<String>),
    Record(Vec<(String, String)>),
}

/// A recorded remote call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Session the call was made with.
    pub session_hash: String,
    /// The call as submitted.
    pub call: RemoteCall,
    /// Whether the call succeeded.
    pub success: bool,
}

/// Mock implementation of the InferenceClient trait.
///
/// Every successful call writes real files into `output_dir`, so tests can
/// check that the pipeline removes them afterwards.
///
/// Defaults mirror a TRELLIS space:
/// - `/preprocess_image` → one image
/// - `/image_to_3d` → a `{video}` record
/// - `/extract_glb` → one GLB
///
/// # Example
///
/// ```rust,ignore
/// use relay3d_core::testing::{MockInferenceClient, MockOutput};
///
/// let inference = MockInferenceClient::new(dir.path().join("remote"));
/// inference
///     .set_output("/extract_glb", MockOutput::Sequence(vec!["a.glb".into(), "b.glb".into()]))
///     .await;
///
/// // Run the pipeline...
///
/// assert_eq!(inference.call_names().await, vec!["/preprocess_image", "/image_to_3d", "/extract_glb"]);
/// ```
#[derive(Debug)]
pub struct MockInferenceClient {
    output_dir: PathBuf,
    /// Recorded calls (excluding session starts).
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    /// Files created by successful calls.
    created: Arc<RwLock<Vec<PathBuf>>>,
    sessions_started: AtomicU64,
    /// Per-API output shapes.
    outputs: Arc<RwLock<HashMap<String, MockOutput>>>,
    /// Per-API one-shot errors.
    errors: Arc<RwLock<HashMap<String, InferenceError>>>,
    /// If set, the next session start fails with this error.
    session_error: Arc<RwLock<Option<InferenceError>>>,
    /// Per-API simulated latency, checked against the call timeout.
    delays: Arc<RwLock<HashMap<String, Duration>>>,
}

impl MockInferenceClient {
    /// Create a new mock writing its outputs under `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let outputs = HashMap::from([
            (
                api::PREPROCESS_IMAGE.to_string(),
                MockOutput::Single("preprocessed.png".to_string()),
            ),
            (
                api::IMAGE_TO_3D.to_string(),
                MockOutput::Record(vec![("video".to_string(), "sample.mp4".to_string())]),
            ),
            (
                api::EXTRACT_GLB.to_string(),
                MockOutput::Single("sample.glb".to_string()),
            ),
        ]);

        Self {
            output_dir: output_dir.into(),
            calls: Arc::new(RwLock::new(Vec::new())),
            created: Arc::new(RwLock::new(Vec::new())),
            sessions_started: AtomicU64::new(0),
            outputs: Arc::new(RwLock::new(outputs)),
            errors: Arc::new(RwLock::new(HashMap::new())),
            session_error: Arc::new(RwLock::new(None)),
            delays: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Directory the mock writes its outputs to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// API names of the recorded calls, in order.
    pub async fn call_names(&self) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .map(|c| c.call.api_name.clone())
            .collect()
    }

    /// Number of sessions started.
    pub fn session_count(&self) -> u64 {
        self.sessions_started.load(Ordering::SeqCst)
    }

    /// Every file the mock has produced.
    pub async fn created_files(&self) -> Vec<PathBuf> {
        self.created.read().await.clone()
    }

    /// Configure the files produced by `api_name`.
    pub async fn set_output(&self, api_name: &str, output: MockOutput) {
        self.outputs
            .write()
            .await
            .insert(api_name.to_string(), output);
    }

    /// Configure the next call to `api_name` to fail with the given error.
    pub async fn set_next_error(&self, api_name: &str, error: InferenceError) {
        self.errors.write().await.insert(api_name.to_string(), error);
    }

    /// Configure the next session start to fail.
    pub async fn set_session_error(&self, error: InferenceError) {
        *self.session_error.write().await = Some(error);
    }

    /// Simulate latency for `api_name`.
    pub async fn set_delay(&self, api_name: &str, delay: Duration) {
        self.delays.write().await.insert(api_name.to_string(), delay);
    }

    async fn write_file(&self, session: &Session, name: &str) -> Result<PathBuf, InferenceError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let short_id = Uuid::new_v4().simple().to_string();
        let path = self
            .output_dir
            .join(format!("{}_{}_{}", session.hash, &short_id[..8], name));
        tokio::fs::write(&path, format!("mock {}", name)).await?;
        self.created.write().await.push(path.clone());
        Ok(path)
    }

    async fn produce(&self, session: &Session, output: &MockOutput) -> Result<RemoteOutput, InferenceError> {
        Ok(match output {
            MockOutput::Empty => RemoteOutput::Empty,
            MockOutput::Single(name) => RemoteOutput::Single(self.write_file(session, name).await?),
            MockOutput::Sequence(names) => {
                let mut paths = Vec::with_capacity(names.len());
                for name in names {
                    paths.push(self.write_file(session, name).await?);
                }
                RemoteOutput::Sequence(paths)
            }
            MockOutput::Record(fields) => {
                let mut saved = Vec::with_capacity(fields.len());
                for (field, name) in fields {
                    saved.push((field.clone(), self.write_file(session, name).await?));
                }
                RemoteOutput::Record(saved)
            }
        })
    }

    async fn record(&self, session: &Session, call: RemoteCall, success: bool) {
        self.calls.write().await.push(RecordedCall {
            session_hash: session.hash.clone(),
            call,
            success,
        });
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start_session(&self) -> Result<Session, InferenceError> {
        if let Some(err) = self.session_error.write().await.take() {
            return Err(err);
        }
        let n = self.sessions_started.fetch_add(1, Ordering::SeqCst);
        Ok(Session::new(format!("mock{:07}", n)))
    }

    async fn predict(
        &self,
        session: &Session,
        call: RemoteCall,
        timeout: Duration,
    ) -> Result<RemoteOutput, InferenceError> {
        let api_name = call.api_name.clone();

        let delay = self.delays.read().await.get(&api_name).copied();
        if let Some(delay) = delay {
            if delay > timeout {
                tokio::time::sleep(timeout).await;
                self.record(session, call, false).await;
                return Err(InferenceError::Timeout {
                    api: api_name,
                    timeout_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.errors.write().await.remove(&api_name) {
            self.record(session, call, false).await;
            return Err(err);
        }

        let shape = self
            .outputs
            .read()
            .await
            .get(&api_name)
            .cloned()
            .unwrap_or(MockOutput::Empty);
        let output = self.produce(session, &shape).await?;
        self.record(session, call, true).await;
        Ok(output)
    }
}
