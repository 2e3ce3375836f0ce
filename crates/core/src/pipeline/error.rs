//! Error types for the pipeline module.

use thiserror::Error;

use crate::inference::InferenceError;
use crate::source::FetchError;
use crate::storage::StorageError;

use super::types::Stage;

/// A failure that ends a pipeline run (or, for [`Stage::ExtractMesh`],
/// the best-effort continuation).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to start inference session: {0}")]
    Session(#[source] InferenceError),

    #[error("Failed to download image: {0}")]
    Download(#[from] FetchError),

    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[source] InferenceError),

    #[error("3D generation failed: {0}")]
    Generate(#[source] InferenceError),

    #[error("Mesh extraction failed: {0}")]
    ExtractMesh(#[source] InferenceError),

    /// The remote call succeeded but produced nothing usable.
    #[error("{stage} produced no {expected}")]
    MissingOutput { stage: Stage, expected: &'static str },

    #[error("Failed to upload {artifact}: {source}")]
    Upload {
        artifact: String,
        #[source]
        source: StorageError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Creates an upload error.
    pub fn upload(artifact: impl Into<String>, source: StorageError) -> Self {
        Self::Upload {
            artifact: artifact.into(),
            source,
        }
    }

    /// Stable name of the error class, reported as `error_type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Session(InferenceError::Timeout { .. })
            | Self::Preprocess(InferenceError::Timeout { .. })
            | Self::Generate(InferenceError::Timeout { .. })
            | Self::ExtractMesh(InferenceError::Timeout { .. }) => "InferenceTimeout",
            Self::Session(_) => "SessionError",
            Self::Preprocess(_) | Self::Generate(_) | Self::ExtractMesh(_) => "InferenceError",
            Self::Download(FetchError::InvalidUrl(_)) => "InvalidImageUrl",
            Self::Download(_) => "DownloadError",
            Self::MissingOutput { .. } => "UnexpectedOutput",
            Self::Upload { .. } => "UploadError",
            Self::Io(_) => "IoError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        let err = PipelineError::Download(FetchError::HttpStatus {
            url: "https://x/cat.png".to_string(),
            status: 404,
        });
        assert_eq!(err.kind(), "DownloadError");

        let err = PipelineError::Generate(InferenceError::Timeout {
            api: "/image_to_3d".to_string(),
            timeout_secs: 600,
        });
        assert_eq!(err.kind(), "InferenceTimeout");

        let err = PipelineError::Preprocess(InferenceError::remote("/preprocess_image", "boom"));
        assert_eq!(err.kind(), "InferenceError");

        let err = PipelineError::Session(InferenceError::ConnectionFailed("refused".to_string()));
        assert_eq!(err.kind(), "SessionError");

        let err = PipelineError::upload("preview.mp4", StorageError::Timeout);
        assert_eq!(err.kind(), "UploadError");
    }

    #[test]
    fn test_messages_include_cause() {
        let err = PipelineError::Download(FetchError::HttpStatus {
            url: "https://x/cat.png".to_string(),
            status: 404,
        });
        let message = err.to_string();
        assert!(message.starts_with("Failed to download image"));
        assert!(message.contains("404"));

        let err = PipelineError::MissingOutput {
            stage: Stage::Generate,
            expected: "video",
        };
        assert_eq!(err.to_string(), "generate produced no video");
    }
}
