//! Types for the inference module.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::config::{ExtractionConfig, GenerationConfig};

/// Remote procedure names exposed by the TRELLIS space.
pub mod api {
    pub const START_SESSION: &str = "/start_session";
    pub const PREPROCESS_IMAGE: &str = "/preprocess_image";
    pub const IMAGE_TO_3D: &str = "/image_to_3d";
    pub const EXTRACT_GLB: &str = "/extract_glb";
}

/// A remote session. Every call made with it shares server-side state
/// (the generated model `/extract_glb` works on lives in the session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session hash sent with every call.
    pub hash: String,
}

impl Session {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }
}

/// A single call parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// Plain JSON value.
    Value(Value),
    /// Local file, uploaded before the call.
    File(PathBuf),
}

/// A named remote procedure call with keyword parameters.
///
/// Parameters are kept in declaration order: the service receives them
/// positionally.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub api_name: String,
    pub params: Vec<(String, Param)>,
}

impl RemoteCall {
    pub fn new(api_name: impl Into<String>) -> Self {
        Self {
            api_name: api_name.into(),
            params: Vec::new(),
        }
    }

    /// Appends a JSON parameter.
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push((name.into(), Param::Value(value.into())));
        self
    }

    /// Appends a file parameter.
    pub fn file(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.params.push((name.into(), Param::File(path.into())));
        self
    }

    /// Looks up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params
            .iter()
            .find(|(param_name, _)| param_name == name)
            .map(|(_, param)| param)
    }

    /// `/start_session`
    pub fn start_session() -> Self {
        Self::new(api::START_SESSION)
    }

    /// `/preprocess_image(image)`
    pub fn preprocess_image(image: &Path) -> Self {
        Self::new(api::PREPROCESS_IMAGE).file("image", image)
    }

    /// `/image_to_3d(image, multiimages, seed, ...)`
    pub fn image_to_3d(image: &Path, settings: &GenerationConfig) -> Self {
        Self::new(api::IMAGE_TO_3D)
            .file("image", image)
            .arg("multiimages", Value::Array(Vec::new()))
            .arg("seed", settings.seed)
            .arg("ss_guidance_strength", settings.ss_guidance_strength)
            .arg("ss_sampling_steps", settings.ss_sampling_steps)
            .arg("slat_guidance_strength", settings.slat_guidance_strength)
            .arg("slat_sampling_steps", settings.slat_sampling_steps)
            .arg("multiimage_algo", settings.multiimage_algo.clone())
    }

    /// `/extract_glb(mesh_simplify, texture_size)`
    pub fn extract_glb(settings: &ExtractionConfig) -> Self {
        Self::new(api::EXTRACT_GLB)
            .arg("mesh_simplify", settings.mesh_simplify)
            .arg("texture_size", settings.texture_size)
    }
}

/// Result of a remote call, with every file output already saved locally.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutput {
    /// No file outputs.
    Empty,
    /// One file.
    Single(PathBuf),
    /// Several files, in production order.
    Sequence(Vec<PathBuf>),
    /// Named file fields (e.g. a video component's `video`).
    Record(Vec<(String, PathBuf)>),
}

impl RemoteOutput {
    /// Every local path in this output, in order.
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            Self::Empty => Vec::new(),
            Self::Single(path) => vec![path.as_path()],
            Self::Sequence(paths) => paths.iter().map(PathBuf::as_path).collect(),
            Self::Record(fields) => fields.iter().map(|(_, path)| path.as_path()).collect(),
        }
    }

    /// A single path, or the first element of a sequence.
    pub fn first_path(&self) -> Option<&Path> {
        match self {
            Self::Single(path) => Some(path),
            Self::Sequence(paths) => paths.first().map(PathBuf::as_path),
            Self::Empty | Self::Record(_) => None,
        }
    }

    /// The named field of a record.
    pub fn field(&self, name: &str) -> Option<&Path> {
        match self {
            Self::Record(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, path)| path.as_path()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths().is_empty()
    }
}
