//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the collaborator traits
//! (inference service, blob store, image source), allowing the pipeline and
//! the HTTP layer to be tested without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use relay3d_core::testing::{fixtures, MockBlobStore, MockImageSource, MockInferenceClient};
//!
//! let dir = tempfile::TempDir::new()?;
//! let config = fixtures::test_config(dir.path());
//! let inference = Arc::new(MockInferenceClient::new(dir.path().join("remote")));
//! let store = Arc::new(MockBlobStore::new());
//! let source = Arc::new(MockImageSource::new());
//!
//! let orchestrator = Orchestrator::new(&config, inference.clone(), store.clone(), source);
//! ```

mod mock_blob_store;
mod mock_image_source;
mod mock_inference;

pub use mock_blob_store::{MockBlobStore, RecordedUpload};
pub use mock_image_source::{MockImageSource, RecordedFetch};
pub use mock_inference::{MockInferenceClient, MockOutput, RecordedCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::config::{
        Config, DownloadConfig, ExtractionConfig, GenerationConfig, InferenceConfig,
        LocalStorageConfig, PipelineConfig, RetryConfig, ServerConfig, StorageConfig,
    };

    /// A config rooted in `dir`: no session settle delay, fast retries,
    /// mesh extraction awaited inline.
    pub fn test_config(dir: &Path) -> Config {
        let mut inference = InferenceConfig::new("http://127.0.0.1:7860");
        inference.download_dir = dir.join("gradio");
        inference.session_settle_ms = 0;

        Config {
            inference,
            server: ServerConfig::default(),
            download: DownloadConfig {
                timeout_secs: 5,
                scratch_dir: dir.join("scratch"),
            },
            storage: StorageConfig {
                local: LocalStorageConfig {
                    root: dir.join("blobs"),
                    public_base_url: "http://localhost:8080/blobs".to_string(),
                },
                ..Default::default()
            },
            pipeline: PipelineConfig {
                detach_mesh_extraction: false,
            },
            generation: GenerationConfig::default(),
            extraction: ExtractionConfig::default(),
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 1,
                backoff_multiplier: 1.0,
            },
        }
    }

    /// A request body as a client would send it.
    pub fn request_body(image_url: &str, user_id: Option<&str>) -> String {
        match user_id {
            Some(user_id) => serde_json::json!({ "image_url": image_url, "userId": user_id }),
            None => serde_json::json!({ "image_url": image_url }),
        }
        .to_string()
    }
}
