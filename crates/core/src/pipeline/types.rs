//! Types for the pipeline module.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// User id used when the request does not carry one.
pub const DEFAULT_USER_ID: &str = "default";

/// Rejected input. Never touches a remote service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No image URL provided")]
    MissingImageUrl,
}

/// A validated `process_3d` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    /// Source image to fetch.
    pub image_url: String,
    /// Namespace for every artifact of this request.
    pub user_id: String,
}

impl ProcessRequest {
    pub fn new(image_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            user_id: user_id.into(),
        }
    }

    /// Validate a raw request body.
    ///
    /// A body that is not a JSON object, or whose `image_url` is missing,
    /// empty or not a string, is rejected. A missing or non-string `userId`
    /// falls back to [`DEFAULT_USER_ID`].
    pub fn from_json(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|_| ValidationError::MissingImageUrl)?;

        let image_url = value
            .get("image_url")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ValidationError::MissingImageUrl)?;

        let user_id = value
            .get("userId")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_USER_ID);

        Ok(Self::new(image_url, user_id))
    }
}

/// Named stages of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    SessionInit,
    Download,
    Preprocess,
    Generate,
    ExtractMesh,
}

impl Stage {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionInit => "session_init",
            Self::Download => "download",
            Self::Preprocess => "preprocess",
            Self::Generate => "generate",
            Self::ExtractMesh => "extract_mesh",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of the 200 response, committed as soon as the video is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoReady {
    pub success: bool,
    pub status: String,
    pub video_url: String,
    /// Milliseconds since epoch; the same value namespaces every upload.
    pub timestamp: i64,
    #[serde(rename = "userId")]
    pub user_id: String,
}

impl VideoReady {
    pub fn new(video_url: impl Into<String>, timestamp: i64, user_id: impl Into<String>) -> Self {
        Self {
            success: true,
            status: "video_ready".to_string(),
            video_url: video_url.into(),
            timestamp,
            user_id: user_id.into(),
        }
    }
}

/// Public URLs of the artifacts stored for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactUrls {
    pub preprocessed_image_url: String,
    pub video_url: String,
    pub mesh_urls: Vec<String>,
}

/// Result of the best-effort mesh stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshOutcome {
    /// Public URLs of the uploaded meshes, in production order.
    Ready(Vec<String>),
    /// Extraction or an upload failed; the reason was logged.
    Failed(String),
}

impl MeshOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Destination name for mesh `index` out of `count`.
///
/// A lone mesh is `model.glb`; several are `model_{index}.glb`.
pub fn mesh_artifact_name(index: usize, count: usize) -> String {
    if count == 1 {
        "model.glb".to_string()
    } else {
        format!("model_{}.glb", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_json() {
        let request =
            ProcessRequest::from_json(br#"{"image_url": "https://x/cat.png", "userId": "u1"}"#)
                .unwrap();
        assert_eq!(request, ProcessRequest::new("https://x/cat.png", "u1"));
    }

    #[test]
    fn test_request_defaults_user_id() {
        let request = ProcessRequest::from_json(br#"{"image_url": "https://x/cat.png"}"#).unwrap();
        assert_eq!(request.user_id, "default");

        let request =
            ProcessRequest::from_json(br#"{"image_url": "https://x/cat.png", "userId": 7}"#)
                .unwrap();
        assert_eq!(request.user_id, "default");
    }

    #[test]
    fn test_request_rejects_missing_image_url() {
        for body in [
            &br#"{}"#[..],
            br#"{"userId": "u1"}"#,
            br#"{"image_url": ""}"#,
            br#"{"image_url": "   "}"#,
            br#"{"image_url": null}"#,
            br#"{"image_url": 42}"#,
            br#"[]"#,
            b"not json",
            b"",
        ] {
            assert_eq!(
                ProcessRequest::from_json(body),
                Err(ValidationError::MissingImageUrl),
                "body: {}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_validation_message() {
        assert_eq!(
            ValidationError::MissingImageUrl.to_string(),
            "No image URL provided"
        );
    }

    #[test]
    fn test_video_ready_serialization() {
        let body = VideoReady::new("https://cdn/preview.mp4", 1700000000123, "u1");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "status": "video_ready",
                "video_url": "https://cdn/preview.mp4",
                "timestamp": 1700000000123i64,
                "userId": "u1"
            })
        );
    }

    #[test]
    fn test_mesh_artifact_names() {
        assert_eq!(mesh_artifact_name(0, 1), "model.glb");
        assert_eq!(mesh_artifact_name(0, 2), "model_0.glb");
        assert_eq!(mesh_artifact_name(1, 2), "model_1.glb");
    }
}
