// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! pj-storage: history of finished job instances
//!
//! Callers go through the [`Persistence`] trait. When persistence is turned
//! off every data operation fails with [`PersistenceError::Disabled`], which
//! callers treat as an expected condition.

mod file;
mod query;
mod stats;

#[cfg(test)]
mod testing;

pub use file::FilePersistence;
pub use query::{InstanceQuery, SortCriteria};
pub use stats::JobStats;

use pj_core::config::PersistenceConfig;
use pj_core::{InstanceMatchCriteria, JobRun};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persistence is disabled in the configuration")]
    Disabled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PersistenceError {
    pub fn is_disabled(&self) -> bool {
        matches!(self, PersistenceError::Disabled)
    }
}

/// Storage of finished instance snapshots
pub trait Persistence: Send + Sync {
    fn is_enabled(&self) -> bool {
        true
    }

    fn store_instances(&self, runs: &[JobRun]) -> Result<(), PersistenceError>;

    fn read_instances(&self, query: &InstanceQuery) -> Result<Vec<JobRun>, PersistenceError>;

    /// Aggregated statistics per job id, ordered by job id
    fn read_stats(&self, criteria: &InstanceMatchCriteria)
        -> Result<Vec<JobStats>, PersistenceError>;

    /// Returns the number of removed records
    fn remove_instances(&self, criteria: &InstanceMatchCriteria)
        -> Result<usize, PersistenceError>;

    /// Keep at most `max_records` newest records (0 keeps all) and drop those
    /// that ended longer than `max_age` ago
    fn clean_up(&self, max_records: usize, max_age: Option<Duration>)
        -> Result<(), PersistenceError>;

    fn close(&self) -> Result<(), PersistenceError>;
}

/// Backend used when persistence is turned off
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPersistence;

impl Persistence for NoPersistence {
    fn is_enabled(&self) -> bool {
        false
    }

    fn store_instances(&self, _runs: &[JobRun]) -> Result<(), PersistenceError> {
        Err(PersistenceError::Disabled)
    }

    fn read_instances(&self, _query: &InstanceQuery) -> Result<Vec<JobRun>, PersistenceError> {
        Err(PersistenceError::Disabled)
    }

    fn read_stats(
        &self,
        _criteria: &InstanceMatchCriteria,
    ) -> Result<Vec<JobStats>, PersistenceError> {
        Err(PersistenceError::Disabled)
    }

    fn remove_instances(
        &self,
        _criteria: &InstanceMatchCriteria,
    ) -> Result<usize, PersistenceError> {
        Err(PersistenceError::Disabled)
    }

    fn clean_up(
        &self,
        _max_records: usize,
        _max_age: Option<Duration>,
    ) -> Result<(), PersistenceError> {
        Err(PersistenceError::Disabled)
    }

    fn close(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Open the backend selected by the configuration
pub fn open(config: &PersistenceConfig) -> Result<Box<dyn Persistence>, PersistenceError> {
    if !config.enabled {
        return Ok(Box::new(NoPersistence));
    }
    let persistence = FilePersistence::open(&config.path)?
        .with_limits(config.max_records, config.max_age);
    Ok(Box::new(persistence))
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
