//! Storage directory and its write lock
//!
//! A disk-backed engine owns one directory:
//!
//! ```text
//! <root>/
//!   mediasearch.toml   configuration
//!   index.snapshot     last committed document set
//!   write.lock         exclusive advisory lock while initialized
//! ```
//!
//! The lock file is deleted on clean shutdown. Finding one at init that
//! nobody holds means the previous owner died without cleaning up: the
//! file is stale and is replaced. A lock held by a live owner fails init.

use crate::config::CONFIG_FILE_NAME;
use fs2::FileExt;
use mediasearch_core::{Error, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Lock file name placed in the storage directory.
pub const LOCK_FILE_NAME: &str = "write.lock";

/// Snapshot file name placed in the storage directory.
pub const SNAPSHOT_FILE_NAME: &str = "index.snapshot";

/// Change log file name placed in the storage directory.
pub const LOG_FILE_NAME: &str = "index.log";

/// An opened, exclusively locked storage directory
#[derive(Debug)]
pub struct StorageDir {
    root: PathBuf,
    lock: Option<File>,
    recovered_stale_lock: bool,
}

impl StorageDir {
    /// Create the directory if needed and take its write lock
    ///
    /// # Errors
    ///
    /// `StorageLocked` if another live owner holds the lock, `Io` if the
    /// directory or lock file cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        // Canonicalize so lock errors name one stable path
        let root = root.canonicalize()?;

        let lock_path = root.join(LOCK_FILE_NAME);
        let existed = lock_path.exists();
        let lock = open_lock_file(&lock_path)?;
        if lock.try_lock_exclusive().is_err() {
            return Err(Error::StorageLocked(root));
        }

        let mut recovered_stale_lock = false;
        if existed {
            // We got the lock, so the previous owner is gone.
            warn!(
                target: "mediasearch::storage",
                path = %lock_path.display(),
                "Found stale lock file from an unclean shutdown, replacing it"
            );
            // Unlink while still holding the old lock, so nobody can take
            // it in between and lose their file to us
            std::fs::remove_file(&lock_path)?;
            let fresh = open_lock_file(&lock_path)?;
            if fresh.try_lock_exclusive().is_err() {
                return Err(Error::StorageLocked(root));
            }
            drop(lock);
            recovered_stale_lock = true;
            info!(target: "mediasearch::storage", path = %root.display(), "Storage opened after stale lock recovery");
            return Ok(StorageDir {
                root,
                lock: Some(fresh),
                recovered_stale_lock,
            });
        }

        debug!(target: "mediasearch::storage", path = %root.display(), "Storage opened");
        Ok(StorageDir {
            root,
            lock: Some(lock),
            recovered_stale_lock,
        })
    }

    /// Canonical root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `mediasearch.toml`
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Path of `index.snapshot`
    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE_NAME)
    }

    /// Path of `index.log`
    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE_NAME)
    }

    /// Path of `write.lock`
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE_NAME)
    }

    /// True if a stale lock was replaced while opening
    pub fn recovered_stale_lock(&self) -> bool {
        self.recovered_stale_lock
    }

    /// True until `release` has run
    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    /// Unlock and delete the lock file. Idempotent.
    pub fn release(&mut self) {
        let Some(lock) = self.lock.take() else {
            return;
        };
        let lock_path = self.lock_path();
        // Delete while still holding the lock so no one can grab the
        // file we are about to remove.
        if let Err(e) = std::fs::remove_file(&lock_path) {
            warn!(
                target: "mediasearch::storage",
                path = %lock_path.display(),
                error = %e,
                "Failed to delete lock file"
            );
        }
        if let Err(e) = FileExt::unlock(&lock) {
            debug!(target: "mediasearch::storage", error = %e, "Unlock failed; closing the handle releases it");
        }
        debug!(target: "mediasearch::storage", path = %self.root.display(), "Storage released");
    }
}

impl Drop for StorageDir {
    fn drop(&mut self) {
        self.release();
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .map_err(Error::from)
}
