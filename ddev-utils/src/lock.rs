//! Advisory file locks for state shared between concurrent invocations.

use anyhow::{Context, Result};
use ddev_core::DdevError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// An exclusive lock held until dropped.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

fn open(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("failed to open lock file {}", path.display()))
}

impl FileLock {
    /// Waits for the lock on a blocking thread.
    pub async fn acquire(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<Self> {
            let file = open(&path)?;
            file.lock_exclusive()
                .with_context(|| format!("failed to lock {}", path.display()))?;
            debug!("Acquired lock {}", path.display());
            Ok(Self { file, path })
        })
        .await
        .context("lock task panicked")?
    }

    /// Fails immediately when another process holds the lock.
    pub fn try_acquire(path: &Path) -> Result<Self> {
        let file = open(path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(DdevError::Io(format!(
                "{} is locked by another ddev process",
                path.display()
            ))
            .into());
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}
