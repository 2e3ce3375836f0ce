//! Retry with exponential backoff.
//!
//! Used by the idempotent pipeline stages (source download, blob uploads).
//! Remote inference submissions are never retried.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;

/// Longest sleep between two attempts.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Backoff schedule: `initial_delay * multiplier^n` before attempt `n + 2`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    /// Three attempts, sleeping 1s then 2s between them.
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            multiplier: config.backoff_multiplier,
        }
    }
}

impl RetryPolicy {
    /// A policy that runs the operation exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay after the given failed attempt (0-indexed), capped at
    /// [`MAX_RETRY_DELAY`]. A multiplier that is not finite or below 1.0
    /// is treated as 1.0.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }
}

/// Runs `operation` until it succeeds, the policy is exhausted, or
/// `should_retry` rejects the error. The last error is returned.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    should_retry: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt + 1 >= policy.max_attempts || !should_retry(&e) {
                    return Err(e);
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} attempt {} failed: {} (retrying in {:?})",
                    label,
                    attempt + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
