//! Advisory cross-process locks built on exclusive file creation.
//!
//! A lock is a file in the lock directory. Creating it with `create_new`
//! either succeeds atomically or fails because someone else holds it; there
//! is no separate existence check. The guard removes the file when dropped,
//! whichever way the protected code exits.

use crate::ArenaError;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, instrument, warn};

/// What a lock file records about its holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Holder {
    pid: u32,
    token: u64,
    acquired_at: DateTime<Utc>,
}

/// Hands out locks keyed by name within one directory.
#[derive(Debug, Clone)]
pub struct LockDir {
    dir: PathBuf,
    timeout: Duration,
    retry: Duration,
    stale_after: Duration,
}

impl LockDir {
    /// Creates a lock directory handle. The directory must exist.
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration, retry: Duration, stale_after: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
            retry,
            stale_after,
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", key))
    }

    /// Acquires the lock named `key`, retrying until the timeout elapses.
    ///
    /// A lock file older than the stale lease is presumed left behind by a
    /// crashed holder and is reclaimed.
    ///
    /// # Errors
    ///
    /// Returns a `Timeout` error if the lock stays held for the whole budget,
    /// or `Storage` if the lock file cannot be created for another reason.
    #[instrument(skip(self))]
    pub fn acquire(&self, key: &str) -> Result<LockGuard, ArenaError> {
        let path = self.path_for(key);
        let deadline = Instant::now() + self.timeout;
        let holder = Holder {
            pid: std::process::id(),
            token: rand::thread_rng().r#gen(),
            acquired_at: Utc::now(),
        };

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let body = serde_json::to_string(&holder)?;
                    if let Err(e) = file.write_all(body.as_bytes()) {
                        let _ = fs::remove_file(&path);
                        return Err(e.into());
                    }
                    debug!(lock = %path.display(), "Lock acquired");
                    return Ok(LockGuard {
                        path,
                        token: holder.token,
                    });
                }
                Err(e) if e.kind() == IoErrorKind::AlreadyExists => {
                    if self.reclaim_if_stale(&path) {
                        continue;
                    }
                }
                Err(e) => return Err(e.into()),
            }

            if Instant::now() >= deadline {
                warn!(lock = %path.display(), "Timed out waiting for lock");
                return Err(ArenaError::timeout(format!(
                    "Timed out after {}ms waiting for lock '{}'",
                    self.timeout.as_millis(),
                    key
                )));
            }
            std::thread::sleep(self.retry);
        }
    }

    /// Runs `f` while holding the lock named `key`.
    ///
    /// # Errors
    ///
    /// Returns the acquisition error, or whatever `f` returns.
    pub fn with_lock<T>(
        &self,
        key: &str,
        f: impl FnOnce() -> Result<T, ArenaError>,
    ) -> Result<T, ArenaError> {
        let _guard = self.acquire(key)?;
        f()
    }

    /// Removes `path` if its lease has expired and nobody replaced it meanwhile.
    fn reclaim_if_stale(&self, path: &Path) -> bool {
        let Ok(before) = fs::read_to_string(path) else {
            return false;
        };
        let age = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok());

        match age {
            Some(age) if age >= self.stale_after => {}
            _ => return false,
        }

        // Only remove the entry we inspected, not one a peer just recreated.
        if fs::read_to_string(path).ok().as_deref() != Some(before.as_str()) {
            return false;
        }

        warn!(lock = %path.display(), holder = %before, "Reclaiming stale lock");
        fs::remove_file(path).is_ok()
    }
}

/// A held lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    token: u64,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // A peer may have reclaimed our lease; never remove their entry.
        let ours = fs::read_to_string(&self.path)
            .ok()
            .and_then(|body| serde_json::from_str::<Holder>(&body).ok())
            .is_some_and(|holder| holder.token == self.token);

        if ours {
            match fs::remove_file(&self.path) {
                Ok(()) => debug!(lock = %self.path.display(), "Lock released"),
                Err(e) => warn!(lock = %self.path.display(), error = %e, "Failed to release lock"),
            }
        } else {
            warn!(lock = %self.path.display(), "Lock was reclaimed by another holder");
        }
    }
}
