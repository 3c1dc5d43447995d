// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-lines history file
//!
//! Each stored snapshot is appended as one line. Removal and clean-up
//! rewrite the file through a temporary sibling that is renamed over it.
//! Every write holds an exclusive lock on `<file>.lock`, so several handles
//! and processes can share one history file.

use crate::{InstanceQuery, JobStats, Persistence, PersistenceError};
use fs2::FileExt;
use pj_core::{Clock, InstanceMatchCriteria, JobRun, SystemClock};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static REWRITE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Exclusive hold on the history file; released when dropped
struct WriteLock {
    file: File,
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::debug!(error = %e, "failed to unlock history file");
        }
    }
}

/// `<file><suffix>` next to `path`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("history"));
    name.push(suffix);
    path.with_file_name(name)
}

pub struct FilePersistence<C: Clock = SystemClock> {
    path: PathBuf,
    max_records: usize,
    max_age: Option<Duration>,
    clock: C,
}

impl FilePersistence {
    /// Open or create the history file at `path`
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        Self::open_with_clock(path, SystemClock)
    }
}

impl<C: Clock> FilePersistence<C> {
    pub fn open_with_clock(path: &Path, clock: C) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            max_records: 0,
            max_age: None,
            clock,
        })
    }

    /// Limits enforced after every store
    pub fn with_limits(mut self, max_records: usize, max_age: Option<Duration>) -> Self {
        self.max_records = max_records;
        self.max_age = max_age;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn has_limits(&self) -> bool {
        self.max_records > 0 || self.max_age.is_some()
    }

    /// Block until no other handle or process is writing
    fn lock_writes(&self) -> Result<WriteLock, PersistenceError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(sibling(&self.path, ".lock"))?;
        file.lock_exclusive()?;
        Ok(WriteLock { file })
    }

    /// All records in storage order
    fn read_all(&self) -> Result<Vec<JobRun>, PersistenceError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut runs = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JobRun>(&line) {
                Ok(run) => runs.push(run),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), line = number + 1, error = %e, "skipping corrupt history record");
                }
            }
        }
        Ok(runs)
    }

    fn rewrite(&self, runs: &[JobRun]) -> Result<(), PersistenceError> {
        let sequence = REWRITE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let tmp = sibling(
            &self.path,
            &format!(".{}-{}.tmp", std::process::id(), sequence),
        );
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            for run in runs {
                serde_json::to_writer(&mut writer, run)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn clean_up_locked(
        &self,
        max_records: usize,
        max_age: Option<Duration>,
    ) -> Result<(), PersistenceError> {
        let runs = self.read_all()?;
        let before = runs.len();
        let mut kept: Vec<JobRun> = match max_age.and_then(|age| chrono::Duration::from_std(age).ok()) {
            Some(age) => {
                let cutoff = self.clock.now() - age;
                runs.into_iter()
                    .filter(|run| run.lifecycle.ended_at().is_none_or(|ended| ended >= cutoff))
                    .collect()
            }
            None => runs,
        };
        if max_records > 0 && kept.len() > max_records {
            kept.drain(..kept.len() - max_records);
        }
        if kept.len() != before {
            tracing::debug!(removed = before - kept.len(), "cleaned up history");
            self.rewrite(&kept)?;
        }
        Ok(())
    }
}

impl<C: Clock> Persistence for FilePersistence<C> {
    fn store_instances(&self, runs: &[JobRun]) -> Result<(), PersistenceError> {
        let _lock = self.lock_writes()?;
        {
            let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            for run in runs {
                let line = serde_json::to_string(run)?;
                writeln!(file, "{}", line)?;
            }
            file.sync_all()?;
        }
        if self.has_limits() {
            self.clean_up_locked(self.max_records, self.max_age)?;
        }
        Ok(())
    }

    fn read_instances(&self, query: &InstanceQuery) -> Result<Vec<JobRun>, PersistenceError> {
        Ok(query.apply(self.read_all()?))
    }

    fn read_stats(
        &self,
        criteria: &InstanceMatchCriteria,
    ) -> Result<Vec<JobStats>, PersistenceError> {
        let runs = self.read_all()?;
        Ok(JobStats::compute(runs.iter().filter(|run| criteria.matches(run))))
    }

    fn remove_instances(
        &self,
        criteria: &InstanceMatchCriteria,
    ) -> Result<usize, PersistenceError> {
        let _lock = self.lock_writes()?;
        let runs = self.read_all()?;
        let before = runs.len();
        let kept: Vec<JobRun> = runs.into_iter().filter(|run| !criteria.matches(run)).collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.rewrite(&kept)?;
        }
        Ok(removed)
    }

    fn clean_up(
        &self,
        max_records: usize,
        max_age: Option<Duration>,
    ) -> Result<(), PersistenceError> {
        let _lock = self.lock_writes()?;
        self.clean_up_locked(max_records, max_age)
    }

    fn close(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
