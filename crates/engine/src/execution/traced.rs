// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution wrapper adding tracing around the payload

use super::{Execution, ExecutionError, OutputSink};
use pj_core::{JobInstanceId, TerminationStatus};

pub struct TracedExecution<E> {
    inner: E,
    id: JobInstanceId,
}

impl<E> TracedExecution<E> {
    pub fn new(inner: E, id: JobInstanceId) -> Self {
        Self { inner, id }
    }
}

impl<E: Execution> Execution for TracedExecution<E> {
    fn execute(&self, output: &dyn OutputSink) -> Result<TerminationStatus, ExecutionError> {
        let span = tracing::info_span!(
            "execution.execute",
            job_id = %self.id.job_id,
            instance_id = %self.id.instance_id
        );
        let _guard = span.enter();

        tracing::debug!("starting");
        let start = std::time::Instant::now();
        let result = self.inner.execute(output);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(status) => tracing::info!(%status, elapsed_ms, "execution finished"),
            Err(e) => tracing::warn!(elapsed_ms, error = %e, "execution failed"),
        }
        result
    }

    fn stop(&self) {
        tracing::info!(job_id = %self.id.job_id, instance_id = %self.id.instance_id, "stopping execution");
        self.inner.stop();
    }

    fn interrupt(&self) {
        tracing::info!(job_id = %self.id.job_id, instance_id = %self.id.instance_id, "execution interrupted");
        self.inner.interrupt();
    }
}
