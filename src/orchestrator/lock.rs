//! Exclusive advisory lock held for the duration of a run.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::RunError;

/// Written into the lock file for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockMetadata {
    pub run_id: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

/// Released when dropped.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock without blocking. A lock held by another process is
    /// reported as [`RunError::AlreadyRunning`].
    pub fn acquire(path: &Path, run_id: &str) -> Result<Self, RunError> {
        let lock_err = |source| RunError::Lock {
            path: path.to_path_buf(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(lock_err)?;

        if file.try_lock_exclusive().is_err() {
            return Err(RunError::AlreadyRunning {
                path: path.to_path_buf(),
            });
        }

        let metadata = LockMetadata {
            run_id: run_id.to_string(),
            pid: std::process::id(),
            started_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&metadata).map_err(std::io::Error::other);
        json.and_then(|json| {
            file.set_len(0)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()
        })
        .map_err(lock_err)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
