//! Pipeline module: one `process_3d` request from image URL to stored
//! artifacts.
//!
//! This module provides the `Orchestrator` which coordinates:
//! - Session: opening a session on the inference service
//! - Download: fetching the caller's image into a scratch file
//! - Preprocess / Generate: remote calls whose outputs are uploaded
//! - Mesh extraction: best-effort, after the response is committed
//!
//! # Example
//!
//! ```ignore
//! use relay3d_core::pipeline::{Orchestrator, ProcessRequest};
//!
//! let orchestrator = Orchestrator::new(&config, inference, store, source);
//! let request = ProcessRequest::from_json(body)?;
//!
//! let committed = orchestrator.run(&request).await?;
//! respond(committed.response);
//!
//! // Meshes are uploaded and temp files removed afterwards.
//! tokio::spawn(committed.continuation.run());
//! ```

mod error;
mod orchestrator;
mod types;

pub use error::PipelineError;
pub use orchestrator::{Committed, MeshExtraction, Orchestrator};
pub use types::{
    mesh_artifact_name, ArtifactUrls, MeshOutcome, ProcessRequest, Stage, ValidationError,
    VideoReady, DEFAULT_USER_ID,
};
