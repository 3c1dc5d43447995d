// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake execution for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Execution, ExecutionError, OutputSink};
use pj_core::TerminationStatus;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Configured result of a [`FakeExecution`]
#[derive(Clone, Debug)]
pub enum FakeOutcome {
    Complete,
    Status(TerminationStatus),
    Fail(String),
    Panic(String),
    /// Block until stopped, then report STOPPED
    BlockUntilStopped,
}

#[derive(Default)]
struct FakeState {
    executions: u32,
    stop_calls: u32,
    interrupt_calls: u32,
    stopped: bool,
}

/// Deterministic payload with configurable output and outcome
pub struct FakeExecution {
    outcome: FakeOutcome,
    output: Vec<(String, bool)>,
    state: Mutex<FakeState>,
    changed: Condvar,
}

impl FakeExecution {
    pub fn new(outcome: FakeOutcome) -> Self {
        Self {
            outcome,
            output: Vec::new(),
            state: Mutex::new(FakeState::default()),
            changed: Condvar::new(),
        }
    }

    pub fn completing() -> Self {
        Self::new(FakeOutcome::Complete)
    }

    pub fn blocking() -> Self {
        Self::new(FakeOutcome::BlockUntilStopped)
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::new(FakeOutcome::Fail(reason.into()))
    }

    /// Emit a line before resolving the outcome
    pub fn with_output(mut self, line: impl Into<String>) -> Self {
        self.output.push((line.into(), false));
        self
    }

    pub fn with_error_output(mut self, line: impl Into<String>) -> Self {
        self.output.push((line.into(), true));
        self
    }

    pub fn executions(&self) -> u32 {
        self.lock().executions
    }

    pub fn stop_calls(&self) -> u32 {
        self.lock().stop_calls
    }

    pub fn interrupt_calls(&self) -> u32 {
        self.lock().interrupt_calls
    }

    /// Block until `execute` has been entered; false on timeout
    pub fn wait_started(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.executions == 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Execution for FakeExecution {
    #[allow(clippy::panic)]
    fn execute(&self, output: &dyn OutputSink) -> Result<TerminationStatus, ExecutionError> {
        {
            let mut state = self.lock();
            state.executions += 1;
            self.changed.notify_all();
            if state.stopped {
                return Ok(TerminationStatus::Stopped);
            }
        }
        for (line, is_error) in &self.output {
            output.output(line, *is_error);
        }
        match &self.outcome {
            FakeOutcome::Complete => Ok(TerminationStatus::Completed),
            FakeOutcome::Status(status) => Ok(*status),
            FakeOutcome::Fail(reason) => Err(ExecutionError::failed("FAKE_FAILURE", reason.clone())),
            FakeOutcome::Panic(message) => panic!("{}", message),
            FakeOutcome::BlockUntilStopped => {
                let mut state = self.lock();
                while !state.stopped {
                    state = self.changed.wait(state).unwrap_or_else(|e| e.into_inner());
                }
                Ok(TerminationStatus::Stopped)
            }
        }
    }

    fn stop(&self) {
        let mut state = self.lock();
        state.stop_calls += 1;
        state.stopped = true;
        self.changed.notify_all();
    }

    fn interrupt(&self) {
        let mut state = self.lock();
        state.interrupt_calls += 1;
        state.stopped = true;
        self.changed.notify_all();
    }
}
