use super::{
    types::{Config, StorageBackend},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Inference section exists (enforced by serde) and has a URL
/// - Server port is not 0
/// - Stage timeouts are not 0
/// - GCS backend has a bucket
/// - Retry allows at least one attempt and the backoff never shrinks
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.inference.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "inference.url cannot be empty".to_string(),
        ));
    }

    let timeouts = [
        ("download.timeout_secs", config.download.timeout_secs),
        (
            "inference.preprocess_timeout_secs",
            config.inference.preprocess_timeout_secs,
        ),
        (
            "inference.generate_timeout_secs",
            config.inference.generate_timeout_secs,
        ),
        (
            "inference.extract_timeout_secs",
            config.inference.extract_timeout_secs,
        ),
    ];
    for (name, value) in timeouts {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!("{} cannot be 0", name)));
        }
    }

    if config.storage.backend == StorageBackend::Gcs {
        match &config.storage.gcs {
            Some(gcs) if !gcs.bucket.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::ValidationError(
                    "storage.gcs.bucket is required when backend = \"gcs\"".to_string(),
                ))
            }
        }
    }

    if config.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "retry.max_attempts must be at least 1".to_string(),
        ));
    }

    let multiplier = config.retry.backoff_multiplier;
    if !multiplier.is_finite() || multiplier < 1.0 {
        return Err(ConfigError::ValidationError(format!(
            "retry.backoff_multiplier must be a finite number >= 1.0, got {}",
            multiplier
        )));
    }

    Ok(())
}
