//! Scoped ownership of the temporary files produced during one request.
//!
//! Every path handed to [`TempFiles::register`] is deleted exactly once:
//! either by an explicit [`TempFiles::sweep`] or, failing that, when the guard
//! is dropped. Deletion failures are logged and never abort the sweep.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::metrics::TEMP_CLEANUP_FAILURES;

/// Outcome of a cleanup sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Files that existed and were removed.
    pub removed: usize,
    /// Registered paths that no longer existed.
    pub missing: usize,
    /// Paths whose removal failed, with the error message.
    pub failed: Vec<(PathBuf, String)>,
}

/// Ordered set of temporary paths owned by one pipeline run.
#[derive(Debug, Default)]
pub struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `path`. Call this before writing to it, so a
    /// partially written file is still cleaned up.
    pub fn register(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    /// Paths registered so far, in registration order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Gives up ownership of every registered path without deleting it.
    pub fn release(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.paths)
    }

    /// Deletes every registered path that still exists and forgets them all.
    pub fn sweep(&mut self) -> SweepReport {
        let mut report = SweepReport::default();

        for path in self.paths.drain(..) {
            if !path.exists() {
                report.missing += 1;
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Cleaned up: {}", path.display());
                    report.removed += 1;
                }
                Err(e) => {
                    warn!("Error cleaning up file {}: {}", path.display(), e);
                    TEMP_CLEANUP_FAILURES.inc();
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        report
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        if !self.paths.is_empty() {
            self.sweep();
        }
    }
}
