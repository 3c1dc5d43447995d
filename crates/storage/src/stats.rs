// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use pj_core::{JobRun, RunState, TerminationStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Aggregated history of one job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub job_id: String,
    pub count: usize,
    pub first_created: Option<DateTime<Utc>>,
    pub last_created: Option<DateTime<Utc>>,
    #[serde(with = "humantime_serde")]
    pub fastest_time: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub average_time: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub slowest_time: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub last_time: Option<Duration>,
    pub last_status: Option<TerminationStatus>,
    pub failed_count: usize,
    /// Instances that raised at least one warning
    pub warning_count: usize,
}

impl JobStats {
    fn empty(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            count: 0,
            first_created: None,
            last_created: None,
            fastest_time: None,
            average_time: None,
            slowest_time: None,
            last_time: None,
            last_status: None,
            failed_count: 0,
            warning_count: 0,
        }
    }

    /// Group runs by job id; the last run of a job is the last one in `runs`
    pub fn compute<'a>(runs: impl IntoIterator<Item = &'a JobRun>) -> Vec<JobStats> {
        let mut by_job: BTreeMap<&str, (JobStats, Vec<Duration>)> = BTreeMap::new();
        for run in runs {
            let (stats, times) = by_job
                .entry(run.job_id())
                .or_insert_with(|| (JobStats::empty(run.job_id()), Vec::new()));
            stats.count += 1;
            let created = run.lifecycle.created_at();
            if created.is_some() {
                stats.first_created = min_some(stats.first_created, created);
                stats.last_created = stats.last_created.max(created);
            }
            let time = execution_time(run).and_then(|d| d.to_std().ok());
            if let Some(time) = time {
                times.push(time);
            }
            stats.last_time = time;
            stats.last_status = run.status();
            if run.status().is_some_and(TerminationStatus::is_fault) {
                stats.failed_count += 1;
            }
            if run.warning_count() > 0 {
                stats.warning_count += 1;
            }
        }

        by_job
            .into_values()
            .map(|(mut stats, times)| {
                stats.fastest_time = times.iter().min().copied();
                stats.slowest_time = times.iter().max().copied();
                stats.average_time = average(&times);
                stats
            })
            .collect()
    }
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Exact mean, computed in nanoseconds so neither the sum nor the count can overflow
pub(crate) fn average(times: &[Duration]) -> Option<Duration> {
    if times.is_empty() {
        return None;
    }
    let total: u128 = times.iter().map(Duration::as_nanos).sum();
    let mean = total / times.len() as u128;
    let secs = u64::try_from(mean / NANOS_PER_SEC).unwrap_or(u64::MAX);
    let nanos = u32::try_from(mean % NANOS_PER_SEC).unwrap_or(0);
    Some(Duration::new(secs, nanos))
}

fn min_some<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Time spent executing by an ended instance that reached execution
pub(crate) fn execution_time(run: &JobRun) -> Option<chrono::Duration> {
    let ended = run.lifecycle.ended_at()?;
    if !run.lifecycle.contains_run_state(RunState::Executing) {
        return None;
    }
    Some(run.lifecycle.total_executing_time(ended))
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
