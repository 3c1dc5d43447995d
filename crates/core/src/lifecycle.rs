// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle: the append-only, timestamped history of phase runs for one instance
//!
//! The first run is always in a CREATED-category phase, at most one run is open
//! at a time, and nothing can be appended after an ENDED-category run.

use crate::error::InvalidStateError;
use crate::phase::{Phase, RunState};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One occurrence of a phase for a specific instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRun {
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl PhaseRun {
    /// A run that started at `started_at` and is still active
    pub fn open(phase: Phase, started_at: DateTime<Utc>) -> Self {
        Self {
            phase,
            started_at,
            ended_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.phase.name
    }

    pub fn run_state(&self) -> RunState {
        self.phase.run_state
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Duration of the run, measured up to `now` while it is still open
    pub fn run_time(&self, now: DateTime<Utc>) -> Duration {
        self.ended_at.unwrap_or(now) - self.started_at
    }
}

/// Ordered history of phase runs
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LifecycleRecord", into = "LifecycleRecord")]
pub struct Lifecycle {
    runs: Vec<PhaseRun>,
}

#[derive(Serialize, Deserialize)]
struct LifecycleRecord {
    phase_runs: Vec<PhaseRun>,
}

impl TryFrom<LifecycleRecord> for Lifecycle {
    type Error = InvalidStateError;

    fn try_from(record: LifecycleRecord) -> Result<Self, Self::Error> {
        let mut lifecycle = Lifecycle::new();
        for run in record.phase_runs {
            lifecycle.add_phase_run(run)?;
        }
        Ok(lifecycle)
    }
}

impl From<Lifecycle> for LifecycleRecord {
    fn from(lifecycle: Lifecycle) -> Self {
        Self {
            phase_runs: lifecycle.runs,
        }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a lifecycle from a sequence of runs, validating each append
    pub fn from_runs(runs: impl IntoIterator<Item = PhaseRun>) -> Result<Self, InvalidStateError> {
        let mut lifecycle = Lifecycle::new();
        for run in runs {
            lifecycle.add_phase_run(run)?;
        }
        Ok(lifecycle)
    }

    /// Append a phase run, closing the currently open run at the new run's start.
    pub fn add_phase_run(&mut self, run: PhaseRun) -> Result<(), InvalidStateError> {
        if let Some(ended_at) = run.ended_at {
            if ended_at < run.started_at {
                return Err(InvalidStateError::new(format!(
                    "phase run {} ends before it starts",
                    run.name()
                )));
            }
        }

        let Some(last) = self.runs.last_mut() else {
            if run.run_state() != RunState::Created {
                return Err(InvalidStateError::new(format!(
                    "first phase run must be in CREATED state, got {} ({})",
                    run.name(),
                    run.run_state()
                )));
            }
            self.runs.push(run);
            return Ok(());
        };

        if last.run_state() == RunState::Ended {
            return Err(InvalidStateError::new(format!(
                "lifecycle already terminated, cannot add {}",
                run.name()
            )));
        }
        let boundary = last.ended_at.unwrap_or(last.started_at);
        if run.started_at < boundary {
            return Err(InvalidStateError::new(format!(
                "phase run {} starts at {} before previous run {} ends at {}",
                run.name(),
                run.started_at,
                last.name(),
                boundary
            )));
        }

        if last.ended_at.is_none() {
            last.ended_at = Some(run.started_at);
        }
        self.runs.push(run);
        Ok(())
    }

    pub fn phase_runs(&self) -> &[PhaseRun] {
        &self.runs
    }

    pub fn phases(&self) -> impl Iterator<Item = &Phase> {
        self.runs.iter().map(|run| &run.phase)
    }

    pub fn phase_names(&self) -> Vec<&str> {
        self.runs.iter().map(PhaseRun::name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn phase_count(&self) -> usize {
        self.runs.len()
    }

    pub fn current_run(&self) -> Option<&PhaseRun> {
        self.runs.last()
    }

    pub fn current_phase(&self) -> Option<&Phase> {
        self.runs.last().map(|run| &run.phase)
    }

    pub fn previous_phase(&self) -> Option<&Phase> {
        self.runs.iter().rev().nth(1).map(|run| &run.phase)
    }

    /// Run state of the current phase, `NONE` for an empty lifecycle
    pub fn run_state(&self) -> RunState {
        self.current_run()
            .map(PhaseRun::run_state)
            .unwrap_or(RunState::None)
    }

    /// First run of the named phase
    pub fn phase_run(&self, name: &str) -> Option<&PhaseRun> {
        self.runs.iter().find(|run| run.name() == name)
    }

    /// 1-based position of the first run of the named phase
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.position(name).map(|index| index + 1)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.runs.iter().position(|run| run.name() == name)
    }

    /// Inclusive slice from the first run of `from` to the first run of `to`.
    ///
    /// Empty when either phase never occurred or `to` occurred before `from`.
    pub fn phases_between(&self, from: &str, to: &str) -> &[PhaseRun] {
        match (self.position(from), self.position(to)) {
            (Some(start), Some(end)) if start <= end => &self.runs[start..=end],
            _ => &[],
        }
    }

    pub fn contains_run_state(&self, state: RunState) -> bool {
        self.runs.iter().any(|run| run.run_state() == state)
    }

    pub fn first_at(&self, state: RunState) -> Option<DateTime<Utc>> {
        self.runs
            .iter()
            .find(|run| run.run_state() == state)
            .map(|run| run.started_at)
    }

    pub fn last_at(&self, state: RunState) -> Option<DateTime<Utc>> {
        self.runs
            .iter()
            .rev()
            .find(|run| run.run_state() == state)
            .map(|run| run.started_at)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.first_at(RunState::Created)
    }

    pub fn executed_at(&self) -> Option<DateTime<Utc>> {
        self.first_at(RunState::Executing)
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.last_at(RunState::Ended)
    }

    pub fn last_transition_at(&self) -> Option<DateTime<Utc>> {
        self.runs.last().map(|run| run.started_at)
    }

    pub fn is_ended(&self) -> bool {
        self.run_state() == RunState::Ended
    }

    /// Total time spent in phases of the given run state, open runs measured up to `now`
    pub fn run_time_in_state(&self, state: RunState, now: DateTime<Utc>) -> Duration {
        self.runs
            .iter()
            .filter(|run| run.run_state() == state)
            .fold(Duration::zero(), |total, run| total + run.run_time(now))
    }

    pub fn total_executing_time(&self, now: DateTime<Utc>) -> Duration {
        self.run_time_in_state(RunState::Executing, now)
    }

    /// Wall time from creation to the end (or `now` while still running)
    pub fn total_run_time(&self, now: DateTime<Utc>) -> Option<Duration> {
        let created = self.created_at()?;
        Some(self.ended_at().unwrap_or(now) - created)
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
