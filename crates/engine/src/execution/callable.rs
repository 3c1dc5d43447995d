// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process payload

use super::{Execution, ExecutionError, OutputSink, StopFlag};
use pj_core::TerminationStatus;

type Payload = Box<dyn Fn(&dyn OutputSink, &StopFlag) -> Result<(), ExecutionError> + Send + Sync>;

/// Runs a closure on the calling thread
///
/// The closure receives the output sink and a [`StopFlag`] it should poll to
/// honor stop requests.
pub struct CallableExecution {
    payload: Payload,
    stop: StopFlag,
}

impl CallableExecution {
    pub fn new(
        payload: impl Fn(&dyn OutputSink, &StopFlag) -> Result<(), ExecutionError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            payload: Box::new(payload),
            stop: StopFlag::new(),
        }
    }
}

impl Execution for CallableExecution {
    fn execute(&self, output: &dyn OutputSink) -> Result<TerminationStatus, ExecutionError> {
        if self.stop.is_set() {
            return Ok(TerminationStatus::Stopped);
        }
        (self.payload)(output, &self.stop)?;
        if self.stop.is_set() {
            Ok(TerminationStatus::Stopped)
        } else {
            Ok(TerminationStatus::Completed)
        }
    }

    fn stop(&self) {
        self.stop.set();
    }
}

#[cfg(test)]
#[path = "callable_tests.rs"]
mod tests;
