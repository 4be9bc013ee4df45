/// Artifact ledger and best-effort cleanup
///
/// Every file or directory a run creates is recorded here *before* the operation
/// that may produce it, so partially failed stages are still cleaned up.
use crate::pipeline::state::Stage;
use log::{debug, info, warn};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Ledger entry for one artifact
#[derive(Debug, Clone)]
pub struct ArtifactEntry {
    pub path: PathBuf,
    pub owner: Stage,
}

/// Outcome of a cleanup sweep
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    /// Paths that existed and were removed
    pub removed: usize,
    /// Paths that were already gone
    pub already_gone: usize,
    /// Paths that could not be removed, with the reason
    pub failed: Vec<String>,
}

/// Artifact ledger. Registration is idempotent, cleanup never fails.
#[derive(Debug, Default)]
pub struct ArtifactLedger {
    entries: Vec<ArtifactEntry>,
}

impl ArtifactLedger {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record an artifact. Registering a path twice is a no-op.
    /// Returns true if the path was not yet known.
    pub fn register(&mut self, path: impl Into<PathBuf>, owner: Stage) -> bool {
        let path = path.into();
        if self.contains(&path) {
            return false;
        }

        debug!("Registering artifact {} ({:?})", path.display(), owner);
        self.entries.push(ArtifactEntry {
            path,
            owner,
        });
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Remove every registered artifact in reverse registration order.
    ///
    /// Contents are registered after their directories, so reverse order empties
    /// directories before removing them. Missing paths are tolerated and errors are
    /// only reported. The ledger is drained; a second call does nothing.
    pub fn cleanup_all(&mut self) -> CleanupReport {
        info!("Cleaning up {} artifacts", self.count());

        let mut report = CleanupReport::default();
        for entry in self.entries.drain(..).rev() {
            match remove_artifact(&entry.path) {
                Ok(true) => report.removed += 1,
                Ok(false) => report.already_gone += 1,
                Err(e) => {
                    let message = format!("{}: {}", entry.path.display(), e);
                    warn!("Failed to remove artifact {} (from {})", message, entry.owner);
                    report.failed.push(message);
                }
            }
        }

        debug!(
            "Cleanup done: {} removed, {} already gone, {} failed",
            report.removed,
            report.already_gone,
            report.failed.len()
        );
        report
    }
}

/// Remove a file, symlink or directory tree without following symlinks.
/// Returns Ok(false) if nothing was there.
fn remove_artifact(path: &Path) -> std::io::Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    let removed = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match removed {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
