// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase steps composed by the job runner

use crate::execution::{Execution, OutputSink};
use pj_core::{
    FailedRun, InstanceMatchCriteria, JobRun, LockError, LockGuard, Locker, Phase, PhaseStep,
    RunState, TerminationStatus,
};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Standard phase names
pub mod phases {
    pub const PENDING: &str = "PENDING";
    pub const DEPENDENCY: &str = "DEPENDENCY";
    pub const NO_OVERLAP: &str = "NO_OVERLAP";
    pub const QUEUE: &str = "QUEUE";
    pub const EXEC: &str = "EXEC";
}

#[derive(Default)]
struct ApprovalState {
    waiting: bool,
    released: bool,
    stopped: bool,
}

/// Holds the instance in a waiting phase until released
///
/// Ends the run with TIMEOUT when the optional timeout elapses first.
pub struct ApprovalStep {
    phase: Phase,
    timeout: Option<Duration>,
    state: Mutex<ApprovalState>,
    changed: Condvar,
}

impl ApprovalStep {
    pub fn new(phase: Phase, timeout: Option<Duration>) -> Self {
        Self {
            phase,
            timeout,
            state: Mutex::new(ApprovalState::default()),
            changed: Condvar::new(),
        }
    }

    pub fn pending(timeout: Option<Duration>) -> Self {
        Self::new(Phase::new(phases::PENDING, RunState::Pending), timeout)
    }

    /// Release a waiting instance. Returns false when it is not waiting.
    pub fn release(&self) -> bool {
        let mut state = self.lock();
        if !state.waiting || state.released || state.stopped {
            return false;
        }
        state.released = true;
        self.changed.notify_all();
        true
    }

    pub fn is_waiting(&self) -> bool {
        let state = self.lock();
        state.waiting && !state.released && !state.stopped
    }

    fn lock(&self) -> MutexGuard<'_, ApprovalState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PhaseStep for ApprovalStep {
    fn phase(&self) -> &Phase {
        &self.phase
    }

    fn run(&self) -> Result<Option<TerminationStatus>, FailedRun> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut state = self.lock();
        state.waiting = true;
        let result = loop {
            if state.stopped {
                break Some(TerminationStatus::Stopped);
            }
            if state.released {
                break None;
            }
            state = match deadline {
                None => self.changed.wait(state).unwrap_or_else(|e| e.into_inner()),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break Some(TerminationStatus::Timeout);
                    }
                    self.changed
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(|e| e.into_inner())
                        .0
                }
            };
        };
        state.waiting = false;
        Ok(result)
    }

    fn stop(&self) {
        self.lock().stopped = true;
        self.changed.notify_all();
    }
}

/// Acquires the no-overlap lock; ends the run with INVALID_OVERLAP when it is held elsewhere
///
/// The lock stays held until [`NoOverlapStep::release_lock`] is called after the run.
pub struct NoOverlapStep {
    phase: Phase,
    locker: Arc<dyn Locker>,
    key: String,
    guard: Mutex<Option<LockGuard>>,
}

impl NoOverlapStep {
    pub fn new(locker: Arc<dyn Locker>, key: impl Into<String>) -> Self {
        Self {
            phase: Phase::new(phases::NO_OVERLAP, RunState::Evaluating),
            locker,
            key: key.into(),
            guard: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn holds_lock(&self) -> bool {
        self.guard.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    pub fn release_lock(&self) {
        self.guard.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

impl PhaseStep for NoOverlapStep {
    fn phase(&self) -> &Phase {
        &self.phase
    }

    fn run(&self) -> Result<Option<TerminationStatus>, FailedRun> {
        match self.locker.acquire(&self.key) {
            Ok(guard) => {
                *self.guard.lock().unwrap_or_else(|e| e.into_inner()) = Some(guard);
                Ok(None)
            }
            Err(LockError::Timeout { key, waited }) => {
                tracing::warn!(key, ?waited, "no-overlap lock held by another instance");
                Ok(Some(TerminationStatus::InvalidOverlap))
            }
            Err(e) => Err(FailedRun::failed("LOCK_FAILED", e.to_string())),
        }
    }

    // Lock acquisition is bounded by its timeout
    fn stop(&self) {}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("execution group must be specified")]
    MissingGroup,
    #[error("max executions must be greater than zero")]
    NoSlots,
}

#[derive(Default)]
struct QueueState {
    queued: bool,
    stopped: bool,
}

/// Waits in an IN_QUEUE phase until one of the group's execution slots is free
///
/// Slots are the locks `<group>#0` .. `<group>#<max - 1>`, so the limit holds
/// across processes sharing the lock directory. The slot stays held until
/// [`QueueStep::release_slot`] is called after the run. Stopping a queued
/// instance ends it with CANCELLED.
pub struct QueueStep {
    phase: Phase,
    locker: Arc<dyn Locker>,
    group: String,
    max_executions: u32,
    state: Mutex<QueueState>,
    changed: Condvar,
    slot: Mutex<Option<LockGuard>>,
}

impl QueueStep {
    pub fn new(
        locker: Arc<dyn Locker>,
        group: impl Into<String>,
        max_executions: u32,
    ) -> Result<Self, QueueError> {
        let group = group.into();
        if group.is_empty() {
            return Err(QueueError::MissingGroup);
        }
        if max_executions == 0 {
            return Err(QueueError::NoSlots);
        }
        Ok(Self {
            phase: Phase::new(phases::QUEUE, RunState::InQueue),
            locker,
            group,
            max_executions,
            state: Mutex::new(QueueState::default()),
            changed: Condvar::new(),
            slot: Mutex::new(None),
        })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn max_executions(&self) -> u32 {
        self.max_executions
    }

    pub fn is_queued(&self) -> bool {
        let state = self.lock();
        state.queued && !state.stopped
    }

    pub fn holds_slot(&self) -> bool {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Free the execution slot for the next queued instance
    pub fn release_slot(&self) {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    fn take_free_slot(&self) -> Result<Option<LockGuard>, LockError> {
        for slot in 0..self.max_executions {
            let key = format!("{}#{}", self.group, slot);
            if let Some(guard) = self.locker.try_acquire(&key)? {
                return Ok(Some(guard));
            }
        }
        Ok(None)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PhaseStep for QueueStep {
    fn phase(&self) -> &Phase {
        &self.phase
    }

    fn run(&self) -> Result<Option<TerminationStatus>, FailedRun> {
        let poll_interval = self.locker.poll_interval();
        let mut state = self.lock();
        state.queued = true;
        let result = loop {
            if state.stopped {
                break Ok(Some(TerminationStatus::Cancelled));
            }
            match self.take_free_slot() {
                Ok(Some(guard)) => {
                    tracing::debug!(group = %self.group, slot = guard.key(), "dispatched from queue");
                    *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(guard);
                    break Ok(None);
                }
                Ok(None) => {}
                Err(e) => break Err(FailedRun::failed("QUEUE_FAILED", e.to_string())),
            }
            state = self
                .changed
                .wait_timeout(state, poll_interval)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        };
        state.queued = false;
        result
    }

    fn stop(&self) {
        self.lock().stopped = true;
        self.changed.notify_all();
    }

    fn stop_status(&self) -> TerminationStatus {
        TerminationStatus::Cancelled
    }
}

#[derive(Debug, Error)]
#[error("cannot read active instances: {0}")]
pub struct LookupError(pub String);

/// Source of the instances currently active, in this process or others
pub trait ActiveInstances: Send + Sync {
    fn active_instances(&self) -> Result<Vec<JobRun>, LookupError>;
}

/// Ends the run with UNSATISFIED unless an active instance matches the dependency
pub struct DependencyStep {
    phase: Phase,
    dependency: InstanceMatchCriteria,
    instances: Arc<dyn ActiveInstances>,
}

impl DependencyStep {
    pub fn new(dependency: InstanceMatchCriteria, instances: Arc<dyn ActiveInstances>) -> Self {
        Self {
            phase: Phase::new(phases::DEPENDENCY, RunState::Evaluating),
            dependency,
            instances,
        }
    }

    pub fn dependency(&self) -> &InstanceMatchCriteria {
        &self.dependency
    }
}

impl PhaseStep for DependencyStep {
    fn phase(&self) -> &Phase {
        &self.phase
    }

    fn run(&self) -> Result<Option<TerminationStatus>, FailedRun> {
        let active = self
            .instances
            .active_instances()
            .map_err(|e| FailedRun::failed("DEPENDENCY_LOOKUP_FAILED", e.to_string()))?;
        if active
            .iter()
            .any(|run| !run.lifecycle.is_ended() && self.dependency.matches(run))
        {
            return Ok(None);
        }
        tracing::info!(dependency = ?self.dependency, "no active instance satisfies the dependency");
        Ok(Some(TerminationStatus::Unsatisfied))
    }

    // Single evaluation, nothing to interrupt
    fn stop(&self) {}
}

/// Runs the payload
pub struct ExecutingStep {
    phase: Phase,
    execution: Arc<dyn Execution>,
    output: Arc<dyn OutputSink>,
}

impl ExecutingStep {
    pub fn new(execution: Arc<dyn Execution>, output: Arc<dyn OutputSink>) -> Self {
        Self {
            phase: Phase::new(phases::EXEC, RunState::Executing),
            execution,
            output,
        }
    }
}

impl PhaseStep for ExecutingStep {
    fn phase(&self) -> &Phase {
        &self.phase
    }

    fn run(&self) -> Result<Option<TerminationStatus>, FailedRun> {
        match self.execution.execute(self.output.as_ref())? {
            TerminationStatus::Completed => Ok(None),
            status => Ok(Some(status)),
        }
    }

    fn stop(&self) {
        self.execution.stop();
    }

    fn interrupt(&self) {
        self.execution.interrupt();
    }
}

#[cfg(test)]
#[path = "steps_tests.rs"]
mod tests;
