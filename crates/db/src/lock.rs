//! Advisory cross-process lock for store files.
//!
//! The lock is a sibling `<file>.lock` created with `create_new`, holding the
//! owner pid and acquisition time. It only protects writers that also take it.

use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use brewbot_core::config::StorageConfig;

use crate::repositories::StoreError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockOptions {
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Lock files older than this (by mtime) are assumed abandoned and removed.
    pub stale_after: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            max_retries: 50,
            retry_delay: Duration::from_millis(100),
            stale_after: Duration::from_secs(30),
        }
    }
}

impl LockOptions {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            max_retries: config.lock_max_retries,
            retry_delay: config.lock_retry_delay(),
            stale_after: config.lock_stale_after(),
        }
    }
}

pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Held lock; released when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct StoreLock {
    kind: LockKind,
}

#[derive(Debug)]
enum LockKind {
    File(PathBuf),
    Memory(OwnedMutexGuard<()>),
}

impl StoreLock {
    pub async fn acquire(target: &Path, options: &LockOptions) -> Result<Self, StoreError> {
        let lock_path = lock_path_for(target);
        if let Some(parent) = lock_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
        }

        let attempts = options.max_retries.max(1);
        for attempt in 1..=attempts {
            match try_create(lock_path.clone()).await {
                Ok(()) => return Ok(Self { kind: LockKind::File(lock_path) }),
                Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                    evict_stale_lock(&lock_path, options.stale_after).await;
                    if attempt < attempts {
                        tokio::time::sleep(options.retry_delay).await;
                    }
                }
                Err(source) => return Err(StoreError::Io { path: lock_path, source }),
            }
        }

        Err(StoreError::LockUnavailable { path: lock_path, attempts })
    }

    pub(crate) fn in_memory(guard: OwnedMutexGuard<()>) -> Self {
        Self { kind: LockKind::Memory(guard) }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.kind {
            LockKind::File(path) => Some(path),
            LockKind::Memory(_) => None,
        }
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let LockKind::File(path) = &self.kind {
            if let Err(error) = fs::remove_file(path) {
                if error.kind() != ErrorKind::NotFound {
                    warn!(
                        event_name = "store.lock.release_failed",
                        lock_path = %path.display(),
                        error = %error,
                        "could not remove lock file"
                    );
                }
            }
        }
    }
}

/// Runs `operation` while holding the lock for `target`. The lock is released
/// whether the operation succeeds or fails.
pub async fn with_lock<T, F, Fut>(
    target: &Path,
    options: &LockOptions,
    operation: F,
) -> Result<T, StoreError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let _lock = StoreLock::acquire(target, options).await?;
    Ok(operation().await)
}

/// Exclusive-creates the lock file and stamps it with the owner pid and time.
/// Runs on the blocking pool so creation and stamp stay one step.
async fn try_create(lock_path: PathBuf) -> io::Result<()> {
    tokio::task::spawn_blocking(move || {
        let mut file = OpenOptions::new().write(true).create_new(true).open(&lock_path)?;
        let stamp = format!("{}\n{}", std::process::id(), Utc::now().timestamp_millis());
        if let Err(error) = file.write_all(stamp.as_bytes()) {
            debug!(
                event_name = "store.lock.stamp_failed",
                lock_path = %lock_path.display(),
                error = %error,
                "could not write lock owner stamp"
            );
        }
        Ok(())
    })
    .await
    .map_err(io::Error::other)?
}

async fn evict_stale_lock(lock_path: &Path, stale_after: Duration) {
    let Ok(modified) =
        tokio::fs::metadata(lock_path).await.and_then(|metadata| metadata.modified())
    else {
        return;
    };
    let Ok(age) = SystemTime::now().duration_since(modified) else {
        return;
    };

    if age > stale_after {
        warn!(
            event_name = "store.lock.stale_evicted",
            lock_path = %lock_path.display(),
            age_ms = age.as_millis() as u64,
            "removing abandoned lock file"
        );
        let _ = tokio::fs::remove_file(lock_path).await;
    }
}
