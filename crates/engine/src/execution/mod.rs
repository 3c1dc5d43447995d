// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution: the payload run during the executing phase

mod callable;
mod process;
mod traced;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use callable::CallableExecution;
pub use process::ProcessExecution;
pub use traced::TracedExecution;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeExecution, FakeOutcome};

use pj_core::{FailedRun, Fault, TerminationStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Receives payload output lines
pub trait OutputSink: Send + Sync {
    fn output(&self, line: &str, is_error: bool);
}

impl<F> OutputSink for F
where
    F: Fn(&str, bool) + Send + Sync,
{
    fn output(&self, line: &str, is_error: bool) {
        self(line, is_error)
    }
}

/// Payload failure
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{status}: {}", .fault.reason)]
pub struct ExecutionError {
    pub status: TerminationStatus,
    pub fault: Fault,
}

impl ExecutionError {
    pub fn failed(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: TerminationStatus::Failed,
            fault: Fault::new(code, reason),
        }
    }
}

impl From<ExecutionError> for FailedRun {
    fn from(e: ExecutionError) -> Self {
        FailedRun {
            status: e.status,
            fault: e.fault,
        }
    }
}

/// The payload of an instance
///
/// `stop` and `interrupt` may be called from another thread while `execute`
/// runs, before it starts, or repeatedly.
pub trait Execution: Send + Sync {
    /// Run to completion, returning the terminal status
    fn execute(&self, output: &dyn OutputSink) -> Result<TerminationStatus, ExecutionError>;

    /// Request cooperative cancellation
    fn stop(&self);

    /// The payload was already interrupted from outside (e.g. SIGINT from a terminal)
    fn interrupt(&self) {
        self.stop();
    }
}

impl<E: Execution + ?Sized> Execution for Arc<E> {
    fn execute(&self, output: &dyn OutputSink) -> Result<TerminationStatus, ExecutionError> {
        (**self).execute(output)
    }

    fn stop(&self) {
        (**self).stop()
    }

    fn interrupt(&self) {
        (**self).interrupt()
    }
}

/// Shared stop request flag handed to callable payloads
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
