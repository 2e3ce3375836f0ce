pub mod config;
pub mod inference;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod source;
pub mod storage;
pub mod temp;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use inference::{GradioClient, InferenceClient, InferenceError};
pub use pipeline::{
    Committed, MeshExtraction, MeshOutcome, Orchestrator, PipelineError, ProcessRequest,
    ValidationError, VideoReady,
};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use source::{FetchError, HttpImageSource, ImageSource};
pub use storage::{create_blob_store, BlobStore, GcsBlobStore, LocalBlobStore, StorageError};
pub use temp::{SweepReport, TempFiles};
