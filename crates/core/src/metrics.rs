//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Pipeline runs and per-stage latency
//! - Artifact uploads to blob storage
//! - Temporary file cleanup

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Pipeline runs by terminal outcome.
pub static PIPELINE_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("relay3d_pipeline_runs_total", "Total pipeline runs"),
        &["outcome"], // "rejected", "failed", "video_ready"
    )
    .unwrap()
});

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "relay3d_stage_duration_seconds",
            "Duration of each pipeline stage",
        )
        .buckets(vec![
            0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0,
        ]),
        &["stage", "result"],
    )
    .unwrap()
});

/// Mesh extraction outcomes (best-effort continuation).
pub static MESH_EXTRACTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "relay3d_mesh_extractions_total",
            "Mesh extraction continuations by result",
        ),
        &["result"], // "ready", "failed"
    )
    .unwrap()
});

// =============================================================================
// Storage Metrics
// =============================================================================

/// Artifact uploads by artifact kind (`image`, `video`, `mesh`) and result.
pub static UPLOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("relay3d_uploads_total", "Artifact uploads to blob storage"),
        &["artifact", "result"],
    )
    .unwrap()
});

// =============================================================================
// Cleanup Metrics
// =============================================================================

/// Temporary files that could not be removed.
pub static TEMP_CLEANUP_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "relay3d_temp_cleanup_failures_total",
        "Temporary files that could not be deleted",
    )
    .unwrap()
});

/// All core metrics, for registration in the server's registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Pipeline
        Box::new(PIPELINE_RUNS.clone()),
        Box::new(STAGE_DURATION.clone()),
        Box::new(MESH_EXTRACTIONS.clone()),
        // Storage
        Box::new(UPLOADS_TOTAL.clone()),
        // Cleanup
        Box::new(TEMP_CLEANUP_FAILURES.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register_cleanly() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        UPLOADS_TOTAL
            .with_label_values(&["video", "success"])
            .inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "relay3d_uploads_total"));
    }
}
