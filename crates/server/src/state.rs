use std::path::Path;

use relay3d_core::config::StorageBackend;
use relay3d_core::{Config, MeshExtraction, MeshOutcome, Orchestrator, SanitizedConfig};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::metrics::MESH_TASKS_ACTIVE;

/// Holds one unit of `MESH_TASKS_ACTIVE` until dropped, including when the
/// task panics or is aborted.
struct ActiveMeshTask;

impl ActiveMeshTask {
    fn start() -> Self {
        MESH_TASKS_ACTIVE.inc();
        Self
    }
}

impl Drop for ActiveMeshTask {
    fn drop(&mut self) {
        MESH_TASKS_ACTIVE.dec();
    }
}

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Orchestrator,
    /// Mesh extractions detached from their request.
    mesh_tasks: Mutex<JoinSet<MeshOutcome>>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Orchestrator) -> Self {
        Self {
            config,
            orchestrator,
            mesh_tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Whether mesh extraction runs after the response is sent.
    pub fn detach_mesh_extraction(&self) -> bool {
        self.config.pipeline.detach_mesh_extraction
    }

    /// Directory to serve under `/blobs` when the local backend is active.
    pub fn local_blob_root(&self) -> Option<&Path> {
        (self.config.storage.backend == StorageBackend::Local)
            .then(|| self.config.storage.local.root.as_path())
    }

    /// Run `continuation` on its own task.
    pub async fn spawn_mesh_extraction(&self, continuation: MeshExtraction) {
        let mut tasks = self.mesh_tasks.lock().await;
        while let Some(finished) = tasks.try_join_next() {
            Self::log_finished(finished);
        }

        let active = ActiveMeshTask::start();
        tasks.spawn(async move {
            let _active = active;
            continuation.run().await
        });
    }

    /// Wait for every detached mesh extraction to finish.
    pub async fn drain_mesh_extractions(&self) {
        let mut tasks = std::mem::take(&mut *self.mesh_tasks.lock().await);
        if !tasks.is_empty() {
            debug!("Waiting for {} mesh extraction(s)", tasks.len());
        }
        while let Some(finished) = tasks.join_next().await {
            Self::log_finished(finished);
        }
    }

    fn log_finished(finished: Result<MeshOutcome, tokio::task::JoinError>) {
        match finished {
            Ok(outcome) => debug!("Mesh extraction finished: {:?}", outcome),
            Err(e) => warn!("Mesh extraction task failed: {}", e),
        }
    }
}
