/// Pipeline workspace: the single working directory that holds every artifact of a run.
/// Acquisition locks the directory; release cleans every registered artifact exactly once,
/// on normal completion, on stage failure, and on unwinding.

use crate::config::types::{PipelineError, Result};
use crate::pipeline::state::Stage;
use crate::safety::cleanup::{ArtifactLedger, CleanupReport};
use crate::safety::lock_manager::WorkspaceLock;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub struct Workspace {
    /// Unique run ID
    run_id: String,
    /// Absolute workspace directory
    root: PathBuf,
    /// Whether this run created the directory (and must remove it)
    created_root: bool,
    ledger: ArtifactLedger,
    lock: Option<WorkspaceLock>,
    /// Set once release has run
    cleanup_report: Option<CleanupReport>,
}

impl Workspace {
    /// Acquire a workspace directory, creating it if needed
    pub fn acquire(dir: &Path) -> Result<Self> {
        let created_root = !dir.exists();

        fs::create_dir_all(dir).map_err(|e| {
            PipelineError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create workspace directory {}: {}", dir.display(), e),
            ))
        })?;
        let root = dir.canonicalize()?;

        let lock = match WorkspaceLock::acquire(&root) {
            Ok(lock) => lock,
            Err(e) => {
                if created_root {
                    let _ = fs::remove_dir_all(&root);
                }
                return Err(e);
            }
        };

        let run_id = Uuid::new_v4().to_string();
        log::info!("Workspace {} acquired (run {})", root.display(), run_id);

        Ok(Self {
            run_id,
            root,
            created_root,
            ledger: ArtifactLedger::new(),
            lock: Some(lock),
            cleanup_report: None,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a workspace-relative name (not registered)
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Register an artifact for cleanup (idempotent)
    pub fn register(&mut self, path: impl Into<PathBuf>, owner: Stage) -> bool {
        self.ledger.register(path, owner)
    }

    /// Register a fixed output name and delete any stale copy, so that only a fresh
    /// product of the next invocation can be found there.
    pub fn prepare_output(&mut self, name: &str, owner: Stage) -> Result<PathBuf> {
        let path = self.root.join(name);
        self.ledger.register(&path, owner);
        remove_stale(&path)?;
        Ok(path)
    }

    /// Register and create a directory inside the workspace
    pub fn create_dir(&mut self, name: &str, owner: Stage) -> Result<PathBuf> {
        let path = self.root.join(name);
        if !path.exists() {
            self.ledger.register(&path, owner);
        }
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Copy a file into the workspace under `name`
    pub fn copy_in(&mut self, source: &Path, name: &str, owner: Stage) -> Result<PathBuf> {
        let dest = self.root.join(name);
        self.ledger.register(&dest, owner);
        fs::copy(source, &dest).map_err(|e| {
            PipelineError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to copy {} to {}: {}", source.display(), dest.display(), e),
            ))
        })?;
        Ok(dest)
    }

    /// Move a produced file to `name` inside the workspace
    pub fn move_in(&mut self, source: &Path, name: &str, owner: Stage) -> Result<PathBuf> {
        let dest = self.root.join(name);
        self.ledger.register(&dest, owner);
        remove_stale(&dest)?;
        if fs::rename(source, &dest).is_err() {
            // Cross-device: copy then drop the original
            fs::copy(source, &dest)?;
            let _ = fs::remove_file(source);
        }
        Ok(dest)
    }

    /// Clean every registered artifact, release the lock, and remove the directory
    /// if this run created it. Runs once; later calls return the first report.
    pub fn release(&mut self) -> CleanupReport {
        if let Some(report) = &self.cleanup_report {
            return report.clone();
        }

        let mut report = self.ledger.cleanup_all();

        if let Some(mut lock) = self.lock.take() {
            lock.release();
        }

        if self.created_root {
            match fs::remove_dir_all(&self.root) {
                Ok(()) => report.removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => report.already_gone += 1,
                Err(e) => {
                    log::warn!("Failed to remove workspace {}: {}", self.root.display(), e);
                    report
                        .failed
                        .push(format!("{}: {}", self.root.display(), e));
                }
            }
        }

        log::info!("Workspace {} released", self.root.display());
        self.cleanup_report = Some(report.clone());
        report
    }

    pub fn is_released(&self) -> bool {
        self.cleanup_report.is_some()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.is_released() {
            self.release();
        }
    }
}

fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            log::debug!("Removed stale {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
