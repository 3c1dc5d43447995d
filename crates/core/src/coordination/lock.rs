// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External mutual-exclusion lock shared between instances and processes
//!
//! Locks are advisory file locks (`flock`) on `<dir>/<key>.lock`. Acquisition
//! polls with a bounded wait; on timeout the caller gets [`LockError::Timeout`].

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

use fs2::FileExt;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out after {waited:?} waiting for lock {key}")]
    Timeout { key: String, waited: Duration },
    #[error("IO error on lock {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Lock configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Directory holding the lock files
    pub dir: PathBuf,
    /// How long to wait for a held lock before giving up
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// How often a held lock is re-checked while waiting
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("phasejob").join("locks"),
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl LockConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Held lock; released on drop
#[derive(Debug)]
pub struct LockGuard {
    key: String,
    file: File,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(key = %self.key, error = %e, "failed to release lock");
        } else {
            tracing::debug!(key = %self.key, "lock released");
        }
    }
}

/// Source of named mutual-exclusion locks
pub trait Locker: Send + Sync {
    /// Wait for the lock up to the configured timeout
    fn acquire(&self, key: &str) -> Result<LockGuard, LockError>;

    /// Take the lock only if it is free right now
    fn try_acquire(&self, key: &str) -> Result<Option<LockGuard>, LockError>;

    /// How often a waiter should retry a held lock
    fn poll_interval(&self) -> Duration;
}

#[derive(Clone, Debug)]
pub struct FileLocker {
    config: LockConfig,
}

impl FileLocker {
    pub fn new(config: LockConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Distinct keys always map to distinct files: bytes other than
    /// alphanumerics, `-` and `.` are written as `_` plus two hex digits.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut file_name = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.' {
                file_name.push(char::from(byte));
            } else {
                file_name.push_str(&format!("_{:02x}", byte));
            }
        }
        self.config.dir.join(format!("{}.lock", file_name))
    }

    fn open(&self, key: &str, path: &Path) -> Result<File, LockError> {
        let io_err = |source| LockError::Io {
            key: key.to_string(),
            source,
        };
        std::fs::create_dir_all(&self.config.dir).map_err(io_err)?;
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(io_err)
    }
}

impl FileLocker {
    fn try_lock(&self, key: &str, file: &File) -> Result<bool, LockError> {
        match file.try_lock_exclusive() {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(false),
            Err(source) => Err(LockError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

impl Locker for FileLocker {
    fn acquire(&self, key: &str) -> Result<LockGuard, LockError> {
        let path = self.path_for(key);
        let file = self.open(key, &path)?;
        let started = Instant::now();
        loop {
            if self.try_lock(key, &file)? {
                tracing::debug!(key, waited_ms = started.elapsed().as_millis() as u64, "lock acquired");
                return Ok(LockGuard {
                    key: key.to_string(),
                    file,
                });
            }
            let waited = started.elapsed();
            if waited >= self.config.timeout {
                return Err(LockError::Timeout {
                    key: key.to_string(),
                    waited,
                });
            }
            let remaining = self.config.timeout - waited;
            std::thread::sleep(self.config.poll_interval.min(remaining));
        }
    }

    fn try_acquire(&self, key: &str) -> Result<Option<LockGuard>, LockError> {
        let path = self.path_for(key);
        let file = self.open(key, &path)?;
        if !self.try_lock(key, &file)? {
            return Ok(None);
        }
        tracing::debug!(key, "lock acquired");
        Ok(Some(LockGuard {
            key: key.to_string(),
            file,
        }))
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
