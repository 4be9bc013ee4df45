/// File-based exclusive lock on a pipeline workspace
/// Fixed artifact names collide between concurrent runs, so only one pipeline may own
/// a working directory at a time.
use crate::config::types::{PipelineError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Lock file name inside the workspace
pub const LOCK_FILE_NAME: &str = ".autopie.lock";

/// Lock information stored in the lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub created_at: SystemTime,
    pub autopie_version: String,
}

/// Held workspace lock. The kernel drops the flock when the file closes,
/// so a crashed run never leaves the workspace locked.
#[derive(Debug)]
pub struct WorkspaceLock {
    lock_file: Option<File>,
    lock_path: PathBuf,
}

impl WorkspaceLock {
    /// Take the exclusive lock without blocking
    pub fn acquire(workspace: &Path) -> Result<Self> {
        let lock_path = workspace.join(LOCK_FILE_NAME);

        // Open without truncating: never destroy the owner's info before holding the lock
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)?;

        let rc = unsafe { libc::flock(lock_file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let errno = std::io::Error::last_os_error();
            return match errno.raw_os_error() {
                Some(libc::EWOULDBLOCK) => Err(PipelineError::WorkspaceBusy(
                    workspace.display().to_string(),
                )),
                _ => Err(PipelineError::Lock(format!(
                    "flock failed on {}: {}",
                    lock_path.display(),
                    errno
                ))),
            };
        }

        let info = LockInfo {
            pid: std::process::id(),
            created_at: SystemTime::now(),
            autopie_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let lock_json = serde_json::to_string(&info)
            .map_err(|e| PipelineError::Lock(e.to_string()))?;

        let mut lock_file = lock_file;
        lock_file.seek(SeekFrom::Start(0))?;
        writeln!(lock_file, "{}", lock_json)?;
        let pos = lock_file.stream_position()?;
        lock_file.set_len(pos)?;

        debug!("Acquired workspace lock {}", lock_path.display());
        Ok(Self {
            lock_file: Some(lock_file),
            lock_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// Remove the lock file and release the lock (idempotent)
    pub fn release(&mut self) {
        if let Some(file) = self.lock_file.take() {
            // Unlink while still holding the lock so no waiter grabs a doomed inode
            if let Err(e) = fs::remove_file(&self.lock_path) {
                warn!("Failed to remove lock file {}: {}", self.lock_path.display(), e);
            }
            drop(file);
            debug!("Released workspace lock {}", self.lock_path.display());
        }
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        self.release();
    }
}
