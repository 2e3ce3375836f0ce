use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub inference: InferenceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Hosted inference service (Gradio space) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InferenceConfig {
    /// Space base URL (e.g., "https://eleelenawa-trellis.hf.space")
    pub url: String,
    /// Optional Hugging Face token for private or rate-limited spaces
    #[serde(default)]
    pub hf_token: Option<String>,
    /// Directory where output files of remote calls are downloaded
    #[serde(default = "default_inference_download_dir")]
    pub download_dir: PathBuf,
    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Pause after opening a session, before any work is submitted
    #[serde(default = "default_session_settle_ms")]
    pub session_settle_ms: u64,
    /// Upper bound for `/preprocess_image`
    #[serde(default = "default_preprocess_timeout")]
    pub preprocess_timeout_secs: u64,
    /// Upper bound for `/image_to_3d`
    #[serde(default = "default_generate_timeout")]
    pub generate_timeout_secs: u64,
    /// Upper bound for `/extract_glb`
    #[serde(default = "default_extract_timeout")]
    pub extract_timeout_secs: u64,
}

impl InferenceConfig {
    /// Creates a config for the given space URL with default timeouts.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            hf_token: None,
            download_dir: default_inference_download_dir(),
            connect_timeout_secs: default_connect_timeout(),
            session_settle_ms: default_session_settle_ms(),
            preprocess_timeout_secs: default_preprocess_timeout(),
            generate_timeout_secs: default_generate_timeout(),
            extract_timeout_secs: default_extract_timeout(),
        }
    }
}

fn default_inference_download_dir() -> PathBuf {
    std::env::temp_dir().join("relay3d-gradio")
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_session_settle_ms() -> u64 {
    2000
}

fn default_preprocess_timeout() -> u64 {
    300
}

fn default_generate_timeout() -> u64 {
    600
}

fn default_extract_timeout() -> u64 {
    600
}

/// Source image download configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Total time allowed for fetching the source image
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,
    /// Scratch directory for downloaded images
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_download_timeout(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

fn default_download_timeout() -> u64 {
    300
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("relay3d")
}

/// Blob storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Storage backend type
    #[serde(default)]
    pub backend: StorageBackend,
    /// GCS-specific configuration (required when backend = "gcs")
    #[serde(default)]
    pub gcs: Option<GcsConfig>,
    /// Local filesystem configuration (used when backend = "local")
    #[serde(default)]
    pub local: LocalStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            gcs: None,
            local: LocalStorageConfig::default(),
        }
    }
}

/// Available storage backends
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Gcs,
    #[default]
    Local,
}

/// Google Cloud Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GcsConfig {
    /// Bucket name (e.g., "my-project.firebasestorage.app")
    pub bucket: String,
    /// Static OAuth access token. When absent, tokens come from the metadata server.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Base of the public object URLs
    #[serde(default = "default_gcs_public_base")]
    pub public_base_url: String,
    /// Per-upload request timeout in seconds
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,
}

fn default_gcs_public_base() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_upload_timeout() -> u64 {
    120
}

/// Local filesystem blob storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalStorageConfig {
    /// Root directory for stored blobs
    #[serde(default = "default_local_root")]
    pub root: PathBuf,
    /// Base URL under which `root` is served
    #[serde(default = "default_local_public_base")]
    pub public_base_url: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root: default_local_root(),
            public_base_url: default_local_public_base(),
        }
    }
}

fn default_local_root() -> PathBuf {
    PathBuf::from("blobs")
}

fn default_local_public_base() -> String {
    "http://localhost:8080/blobs".to_string()
}

/// Pipeline behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Run mesh extraction after the response has been sent.
    /// When false the handler waits for it before responding.
    #[serde(default = "default_detach")]
    pub detach_mesh_extraction: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detach_mesh_extraction: default_detach(),
        }
    }
}

fn default_detach() -> bool {
    true
}

/// Parameters sent to `/image_to_3d`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_ss_guidance")]
    pub ss_guidance_strength: f64,
    #[serde(default = "default_steps")]
    pub ss_sampling_steps: u32,
    #[serde(default = "default_slat_guidance")]
    pub slat_guidance_strength: f64,
    #[serde(default = "default_steps")]
    pub slat_sampling_steps: u32,
    /// "stochastic" or "multidiffusion"
    #[serde(default = "default_multiimage_algo")]
    pub multiimage_algo: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            ss_guidance_strength: default_ss_guidance(),
            ss_sampling_steps: default_steps(),
            slat_guidance_strength: default_slat_guidance(),
            slat_sampling_steps: default_steps(),
            multiimage_algo: default_multiimage_algo(),
        }
    }
}

fn default_ss_guidance() -> f64 {
    7.5
}

fn default_slat_guidance() -> f64 {
    3.0
}

fn default_steps() -> u32 {
    12
}

fn default_multiimage_algo() -> String {
    "stochastic".to_string()
}

/// Parameters sent to `/extract_glb`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_mesh_simplify")]
    pub mesh_simplify: f64,
    #[serde(default = "default_texture_size")]
    pub texture_size: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mesh_simplify: default_mesh_simplify(),
            texture_size: default_texture_size(),
        }
    }
}

fn default_mesh_simplify() -> f64 {
    0.95
}

fn default_texture_size() -> u32 {
    1024
}

/// Retry configuration for idempotent stages (image download, blob uploads).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Maximum attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt in milliseconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub inference: SanitizedInferenceConfig,
    pub download: DownloadConfig,
    pub storage: SanitizedStorageConfig,
    pub pipeline: PipelineConfig,
    pub generation: GenerationConfig,
    pub extraction: ExtractionConfig,
    pub retry: RetryConfig,
}

/// Sanitized inference config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedInferenceConfig {
    pub url: String,
    pub hf_token_configured: bool,
    pub session_settle_ms: u64,
    pub preprocess_timeout_secs: u64,
    pub generate_timeout_secs: u64,
    pub extract_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    pub access_token_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let inference = &config.inference;
        Self {
            server: config.server.clone(),
            inference: SanitizedInferenceConfig {
                url: inference.url.clone(),
                hf_token_configured: inference
                    .hf_token
                    .as_ref()
                    .is_some_and(|t| !t.is_empty()),
                session_settle_ms: inference.session_settle_ms,
                preprocess_timeout_secs: inference.preprocess_timeout_secs,
                generate_timeout_secs: inference.generate_timeout_secs,
                extract_timeout_secs: inference.extract_timeout_secs,
            },
            download: config.download.clone(),
            storage: SanitizedStorageConfig {
                backend: match config.storage.backend {
                    StorageBackend::Gcs => "gcs".to_string(),
                    StorageBackend::Local => "local".to_string(),
                },
                bucket: config.storage.gcs.as_ref().map(|g| g.bucket.clone()),
                access_token_configured: config
                    .storage
                    .gcs
                    .as_ref()
                    .and_then(|g| g.access_token.as_ref())
                    .is_some_and(|t| !t.is_empty()),
            },
            pipeline: config.pipeline.clone(),
            generation: config.generation.clone(),
            extraction: config.extraction.clone(),
            retry: config.retry.clone(),
        }
    }
}
