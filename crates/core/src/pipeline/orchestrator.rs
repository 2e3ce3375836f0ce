//! Pipeline orchestrator implementation.
//!
//! Mandatory stages run in order and any failure ends the run:
//! session init, image download, preprocessing, 3D generation. Once the
//! preview video is stored the response is committed and mesh extraction
//! continues as a [`MeshExtraction`] with its own error boundary.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Config, ExtractionConfig, GenerationConfig};
use crate::inference::{InferenceClient, RemoteCall, RemoteOutput, Session};
use crate::metrics::{MESH_EXTRACTIONS, PIPELINE_RUNS, STAGE_DURATION, UPLOADS_TOTAL};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::source::{FetchError, ImageSource};
use crate::storage::{artifact_key, BlobStore, StorageError};
use crate::temp::TempFiles;

use super::error::PipelineError;
use super::types::{
    mesh_artifact_name, ArtifactUrls, MeshOutcome, ProcessRequest, Stage, VideoReady,
};

const PREPROCESSED_ARTIFACT: &str = "preprocessed.png";
const VIDEO_ARTIFACT: &str = "preview.mp4";

/// Values of the `artifact` label on upload metrics.
const IMAGE_KIND: &str = "image";
const VIDEO_KIND: &str = "video";
const MESH_KIND: &str = "mesh";

/// Per-stage bounds for remote calls.
#[derive(Debug, Clone)]
struct StageTimeouts {
    preprocess: Duration,
    generate: Duration,
    extract: Duration,
}

/// Outcome of the mandatory stages: the response to send, and the
/// best-effort work still owed.
pub struct Committed {
    pub response: VideoReady,
    /// Artifacts stored so far (`mesh_urls` is always empty here).
    pub artifacts: ArtifactUrls,
    pub continuation: MeshExtraction,
}

/// Drives one request through the remote service and into blob storage.
pub struct Orchestrator {
    inference: Arc<dyn InferenceClient>,
    store: Arc<dyn BlobStore>,
    source: Arc<dyn ImageSource>,
    scratch_dir: PathBuf,
    download_timeout: Duration,
    session_settle: Duration,
    timeouts: StageTimeouts,
    generation: GenerationConfig,
    extraction: ExtractionConfig,
    retry: RetryPolicy,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: &Config,
        inference: Arc<dyn InferenceClient>,
        store: Arc<dyn BlobStore>,
        source: Arc<dyn ImageSource>,
    ) -> Self {
        Self {
            inference,
            store,
            source,
            scratch_dir: config.download.scratch_dir.clone(),
            download_timeout: Duration::from_secs(config.download.timeout_secs),
            session_settle: Duration::from_millis(config.inference.session_settle_ms),
            timeouts: StageTimeouts {
                preprocess: Duration::from_secs(config.inference.preprocess_timeout_secs),
                generate: Duration::from_secs(config.inference.generate_timeout_secs),
                extract: Duration::from_secs(config.inference.extract_timeout_secs),
            },
            generation: config.generation.clone(),
            extraction: config.extraction.clone(),
            retry: RetryPolicy::from(&config.retry),
        }
    }

    /// Run the mandatory stages for `request`.
    ///
    /// On failure every temporary file created so far is removed before the
    /// error is returned. On success the temporary files travel with the
    /// returned continuation.
    pub async fn run(&self, request: &ProcessRequest) -> Result<Committed, PipelineError> {
        let timestamp = Utc::now().timestamp_millis();
        let mut temp = TempFiles::new();

        info!(
            "Processing image for user {} (timestamp {}): {}",
            request.user_id, timestamp, request.image_url
        );

        match self.run_mandatory(request, timestamp, &mut temp).await {
            Ok((session, artifacts)) => {
                PIPELINE_RUNS.with_label_values(&["video_ready"]).inc();
                info!(
                    "Video ready for user {} (timestamp {}): {}",
                    request.user_id, timestamp, artifacts.video_url
                );

                Ok(Committed {
                    response: VideoReady::new(
                        artifacts.video_url.clone(),
                        timestamp,
                        request.user_id.clone(),
                    ),
                    artifacts,
                    continuation: MeshExtraction {
                        inference: Arc::clone(&self.inference),
                        store: Arc::clone(&self.store),
                        retry: self.retry.clone(),
                        session,
                        settings: self.extraction.clone(),
                        timeout: self.timeouts.extract,
                        user_id: request.user_id.clone(),
                        timestamp,
                        temp,
                    },
                })
            }
            Err(e) => {
                PIPELINE_RUNS.with_label_values(&["failed"]).inc();
                error!(
                    "Pipeline failed for user {} (timestamp {}): {} [{}]",
                    request.user_id,
                    timestamp,
                    e,
                    e.kind()
                );
                let report = temp.sweep();
                debug!(
                    "Cleanup after failure: {} removed, {} missing, {} failed",
                    report.removed,
                    report.missing,
                    report.failed.len()
                );
                Err(e)
            }
        }
    }

    async fn run_mandatory(
        &self,
        request: &ProcessRequest,
        timestamp: i64,
        temp: &mut TempFiles,
    ) -> Result<(Session, ArtifactUrls), PipelineError> {
        let session = timed(Stage::SessionInit, self.inference.start_session())
            .await
            .map_err(PipelineError::Session)?;
        info!("Session {} opened on {}", session.hash, self.inference.name());
        if !self.session_settle.is_zero() {
            tokio::time::sleep(self.session_settle).await;
        }

        let image = self
            .download_image(&request.image_url, timestamp, temp)
            .await?;

        let preprocessed_image_url = self
            .preprocess(&session, &image, request, timestamp, temp)
            .await?;

        let video_url = self
            .generate(&session, &image, request, timestamp, temp)
            .await?;

        Ok((
            session,
            ArtifactUrls {
                preprocessed_image_url,
                video_url,
                mesh_urls: Vec::new(),
            },
        ))
    }

    async fn download_image(
        &self,
        url: &str,
        timestamp: i64,
        temp: &mut TempFiles,
    ) -> Result<PathBuf, PipelineError> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let path = self.scratch_dir.join(format!(
            "temp_image_{}_{}.png",
            timestamp,
            Uuid::new_v4().simple()
        ));
        temp.register(&path);

        // The bound covers every attempt and the backoff between them.
        let attempts =
            retry_with_backoff(&self.retry, "Image download", FetchError::is_retryable, || {
                self.source.fetch_to(url, &path)
            });
        let bytes = timed(Stage::Download, async {
            match tokio::time::timeout(self.download_timeout, attempts).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout {
                    url: url.to_string(),
                }),
            }
        })
        .await?;

        info!("Downloaded {} bytes from {}", bytes, url);
        Ok(path)
    }

    async fn preprocess(
        &self,
        session: &Session,
        image: &Path,
        request: &ProcessRequest,
        timestamp: i64,
        temp: &mut TempFiles,
    ) -> Result<String, PipelineError> {
        let output = timed(
            Stage::Preprocess,
            self.inference.predict(
                session,
                RemoteCall::preprocess_image(image),
                self.timeouts.preprocess,
            ),
        )
        .await
        .map_err(PipelineError::Preprocess)?;
        register_outputs(&output, temp);

        let processed = output.first_path().ok_or(PipelineError::MissingOutput {
            stage: Stage::Preprocess,
            expected: "image",
        })?;

        let key = artifact_key(&request.user_id, timestamp, PREPROCESSED_ARTIFACT);
        let url = upload_artifact(self.store.as_ref(), &self.retry, processed, &key, IMAGE_KIND)
            .await
            .map_err(|e| PipelineError::upload(PREPROCESSED_ARTIFACT, e))?;
        info!("Preprocessed image stored at {}", url);
        Ok(url)
    }

    /// Generation works from the original download, not the preprocessed
    /// image.
    async fn generate(
        &self,
        session: &Session,
        image: &Path,
        request: &ProcessRequest,
        timestamp: i64,
        temp: &mut TempFiles,
    ) -> Result<String, PipelineError> {
        let output = timed(
            Stage::Generate,
            self.inference.predict(
                session,
                RemoteCall::image_to_3d(image, &self.generation),
                self.timeouts.generate,
            ),
        )
        .await
        .map_err(PipelineError::Generate)?;
        register_outputs(&output, temp);

        let video = output
            .field("video")
            .or_else(|| output.first_path())
            .ok_or(PipelineError::MissingOutput {
                stage: Stage::Generate,
                expected: "video",
            })?;

        let key = artifact_key(&request.user_id, timestamp, VIDEO_ARTIFACT);
        let url = upload_artifact(self.store.as_ref(), &self.retry, video, &key, VIDEO_KIND)
            .await
            .map_err(|e| PipelineError::upload(VIDEO_ARTIFACT, e))?;
        info!("Preview video stored at {}", url);
        Ok(url)
    }
}

/// Best-effort mesh extraction, owed after the response is committed.
///
/// Owns the session and every temporary file of the request. [`run`]
/// never fails: errors are logged and reported as [`MeshOutcome::Failed`],
/// and the temporary files are removed either way.
///
/// [`run`]: MeshExtraction::run
pub struct MeshExtraction {
    inference: Arc<dyn InferenceClient>,
    store: Arc<dyn BlobStore>,
    retry: RetryPolicy,
    session: Session,
    settings: ExtractionConfig,
    timeout: Duration,
    user_id: String,
    timestamp: i64,
    temp: TempFiles,
}

impl MeshExtraction {
    /// Temporary files still owned by this request.
    pub fn temp_paths(&self) -> &[PathBuf] {
        self.temp.paths()
    }

    /// Extract and upload the meshes, then clean up.
    pub async fn run(mut self) -> MeshOutcome {
        let outcome = match self.extract().await {
            Ok(urls) => {
                MESH_EXTRACTIONS.with_label_values(&["ready"]).inc();
                info!(
                    "Stored {} mesh(es) for user {} (timestamp {})",
                    urls.len(),
                    self.user_id,
                    self.timestamp
                );
                MeshOutcome::Ready(urls)
            }
            Err(e) => {
                MESH_EXTRACTIONS.with_label_values(&["failed"]).inc();
                warn!(
                    "GLB extraction failed for user {} (timestamp {}): {}",
                    self.user_id, self.timestamp, e
                );
                MeshOutcome::Failed(e.to_string())
            }
        };

        let report = self.temp.sweep();
        debug!(
            "Cleanup for timestamp {}: {} removed, {} missing, {} failed",
            self.timestamp,
            report.removed,
            report.missing,
            report.failed.len()
        );

        outcome
    }

    async fn extract(&mut self) -> Result<Vec<String>, PipelineError> {
        let output = timed(
            Stage::ExtractMesh,
            self.inference.predict(
                &self.session,
                RemoteCall::extract_glb(&self.settings),
                self.timeout,
            ),
        )
        .await
        .map_err(PipelineError::ExtractMesh)?;
        register_outputs(&output, &mut self.temp);

        let meshes = output.paths();
        if meshes.is_empty() {
            warn!("GLB extraction returned no files");
        }

        let mut urls = Vec::with_capacity(meshes.len());
        for (index, mesh) in meshes.iter().enumerate() {
            let artifact = mesh_artifact_name(index, meshes.len());
            let key = artifact_key(&self.user_id, self.timestamp, &artifact);
            let url = upload_artifact(self.store.as_ref(), &self.retry, mesh, &key, MESH_KIND)
                .await
                .map_err(|e| PipelineError::upload(artifact.clone(), e))?;
            urls.push(url);
        }

        Ok(urls)
    }
}

/// Takes ownership of every file a remote call saved locally.
fn register_outputs(output: &RemoteOutput, temp: &mut TempFiles) {
    for path in output.paths() {
        temp.register(path);
    }
}

/// Upload one artifact, retrying transient storage failures.
/// `kind` labels the upload metrics.
async fn upload_artifact(
    store: &dyn BlobStore,
    retry: &RetryPolicy,
    path: &Path,
    key: &str,
    kind: &'static str,
) -> Result<String, StorageError> {
    let label = format!("Upload of {}", key);
    let result = retry_with_backoff(retry, &label, StorageError::is_retryable, || {
        store.upload(path, key)
    })
    .await;

    let status = if result.is_ok() { "success" } else { "error" };
    UPLOADS_TOTAL.with_label_values(&[kind, status]).inc();
    result
}

/// Await `future`, recording its duration under `stage`.
async fn timed<T, E, F>(stage: Stage, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let result = future.await;
    let status = if result.is_ok() { "success" } else { "error" };
    STAGE_DURATION
        .with_label_values(&[stage.as_str(), status])
        .observe(started.elapsed().as_secs_f64());
    result
}
