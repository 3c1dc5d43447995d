// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job runner: one runnable instance
//!
//! Ties the phaser, the payload and the observer fan-out together. The
//! phaser's transition hook turns every transition into a [`TransitionEvent`]
//! carrying a fresh snapshot of the instance.

use crate::execution::{Execution, OutputSink, TracedExecution};
use crate::output::OutputTail;
use crate::steps::{
    ActiveInstances, ApprovalStep, DependencyStep, ExecutingStep, NoOverlapStep, QueueStep,
};
use pj_core::config::OutputConfig;
use pj_core::instance::{EXECUTION_GROUP_PARAM, MAX_EXECUTIONS_PARAM, PENDING_GROUP_PARAM};
use pj_core::{
    IdGen, InstanceMatchCriteria, InvalidStateError, JobInstanceId, JobInstanceMetadata, JobRun,
    Lifecycle, Locker,
    Notification, OutputEvent, OutputObserver, Phase, PhaseStep, Phaser, RunState,
    TerminationInfo, TimestampIdGen, Transition, TransitionEvent, TransitionObserver, Warn,
    WarningEvent, WarningObserver,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Result of releasing one instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseResult {
    Released,
    NotApplicable,
}

impl ReleaseResult {
    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseResult::Released => "RELEASED",
            ReleaseResult::NotApplicable => "NOT_APPLICABLE",
        }
    }
}

struct Shared {
    metadata: JobInstanceMetadata,
    tail: Mutex<OutputTail>,
    warnings: Mutex<BTreeMap<String, u32>>,
    transition_observers: Notification<dyn TransitionObserver>,
    output_observers: Notification<dyn OutputObserver>,
    warning_observers: Notification<dyn WarningObserver>,
}

impl Shared {
    fn tail(&self) -> MutexGuard<'_, OutputTail> {
        self.tail.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot(&self, lifecycle: Lifecycle, termination: Option<TerminationInfo>) -> JobRun {
        let (last_output, error_output) = {
            let tail = self.tail();
            (tail.lines(), tail.errors())
        };
        JobRun {
            metadata: self.metadata.clone(),
            lifecycle,
            termination,
            last_output,
            error_output,
            warnings: self
                .warnings
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }

    fn on_transition(&self, transition: &Transition) {
        let job_id = self.metadata.job_id();
        let instance_id = self.metadata.instance_id();
        tracing::info!(
            job_id,
            instance_id,
            previous = %transition.previous,
            new = %transition.new,
            ordinal = transition.ordinal,
            "phase transition"
        );
        if let Some(termination) = &transition.termination {
            let reason = termination.fault.as_ref().map(|f| f.reason.as_str());
            if termination.status.is_success() {
                tracing::info!(job_id, instance_id, status = %termination.status, "instance terminated");
            } else {
                tracing::warn!(job_id, instance_id, status = %termination.status, reason, "instance terminated");
            }
        }

        let event = TransitionEvent {
            job_run: self.snapshot(transition.lifecycle.clone(), transition.termination.clone()),
            previous_phase: transition.previous.clone(),
            new_phase: transition.new.clone(),
            ordinal: transition.ordinal,
        };
        self.transition_observers
            .notify_all(|o| o.new_transition(&event));
    }
}

/// Output sink of the executing phase
struct RunnerOutput {
    shared: Arc<Shared>,
    phase: Phase,
}

impl OutputSink for RunnerOutput {
    fn output(&self, line: &str, is_error: bool) {
        self.shared.tail().push(line, is_error);
        let event = OutputEvent {
            metadata: self.shared.metadata.clone(),
            phase: self.phase.clone(),
            output: line.to_string(),
            is_error,
        };
        self.shared.output_observers.notify_all(|o| o.new_output(&event));
    }
}

pub struct JobRunner {
    shared: Arc<Shared>,
    phaser: Phaser,
    approval: Option<Arc<ApprovalStep>>,
    no_overlap: Option<Arc<NoOverlapStep>>,
    queue: Option<Arc<QueueStep>>,
}

impl JobRunner {
    pub fn builder(job_id: impl Into<String>) -> JobRunnerBuilder {
        JobRunnerBuilder::new(job_id)
    }

    pub fn id(&self) -> &JobInstanceId {
        &self.shared.metadata.id
    }

    pub fn metadata(&self) -> &JobInstanceMetadata {
        &self.shared.metadata
    }

    /// Declared phases between INIT and TERMINAL
    pub fn phases(&self) -> Vec<Phase> {
        self.phaser.phases()
    }

    /// Prime and drive the phaser to the terminal phase. Blocks the calling thread.
    pub fn run(&self) -> Result<JobRun, InvalidStateError> {
        tracing::debug!(job_id = %self.id().job_id, instance_id = %self.id().instance_id, "running instance");
        if !self.phaser.prime_unless_terminated()? {
            // Stopped before it started
            return Ok(self.snapshot());
        }
        let result = self.phaser.run();
        if let Some(step) = &self.queue {
            step.release_slot();
        }
        if let Some(step) = &self.no_overlap {
            step.release_lock();
        }
        result?;
        Ok(self.snapshot())
    }

    /// Request termination with STOPPED, or CANCELLED while queued.
    /// Does not wait for the run to finish.
    pub fn stop(&self) {
        self.phaser.stop();
    }

    /// Like `stop`, for a payload already interrupted from outside
    pub fn interrupt(&self) {
        self.phaser.interrupt();
    }

    /// Let a waiting instance continue
    pub fn release(&self) -> ReleaseResult {
        match &self.approval {
            Some(step) if step.release() => {
                tracing::info!(job_id = %self.id().job_id, instance_id = %self.id().instance_id, "instance released");
                ReleaseResult::Released
            }
            _ => ReleaseResult::NotApplicable,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.approval.as_ref().is_some_and(|step| step.is_waiting())
    }

    pub fn snapshot(&self) -> JobRun {
        self.shared
            .snapshot(self.phaser.lifecycle(), self.phaser.termination())
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.phaser.current_phase()
    }

    pub fn is_terminated(&self) -> bool {
        self.phaser.is_terminated()
    }

    /// Up to `lines` most recent output lines
    pub fn tail(&self, lines: usize) -> Vec<String> {
        self.shared.tail().last(lines)
    }

    pub fn wait_for_state(&self, state: RunState, timeout: Option<Duration>) -> bool {
        self.phaser.wait_for_state(state, timeout)
    }

    pub fn wait_for_ended_state(&self, timeout: Option<Duration>) -> bool {
        self.phaser.wait_for_ended_state(timeout)
    }

    pub fn wait_for_phase(&self, name: &str, timeout: Option<Duration>) -> bool {
        self.phaser.wait_for_phase(name, timeout)
    }

    pub fn add_transition_observer(&self, observer: Arc<dyn TransitionObserver>, priority: i32) {
        self.shared
            .transition_observers
            .add_observer(observer, priority);
    }

    pub fn remove_transition_observer(&self, observer: &Arc<dyn TransitionObserver>) -> bool {
        self.shared.transition_observers.remove_observer(observer)
    }

    pub fn add_output_observer(&self, observer: Arc<dyn OutputObserver>, priority: i32) {
        self.shared.output_observers.add_observer(observer, priority);
    }

    pub fn remove_output_observer(&self, observer: &Arc<dyn OutputObserver>) -> bool {
        self.shared.output_observers.remove_observer(observer)
    }

    pub fn add_warning_observer(&self, observer: Arc<dyn WarningObserver>, priority: i32) {
        self.shared.warning_observers.add_observer(observer, priority);
    }

    pub fn remove_warning_observer(&self, observer: &Arc<dyn WarningObserver>) -> bool {
        self.shared.warning_observers.remove_observer(observer)
    }

    /// Record a warning and notify warning observers
    pub fn add_warning(&self, warning: Warn) {
        let count = {
            let mut warnings = self
                .shared
                .warnings
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            let count = warnings.entry(warning.name.clone()).or_insert(0);
            *count += 1;
            *count
        };
        tracing::warn!(
            job_id = %self.id().job_id,
            instance_id = %self.id().instance_id,
            warning = %warning.name,
            count,
            "warning added"
        );
        let event = WarningEvent {
            job_run: self.snapshot(),
            warning,
            count,
        };
        self.shared
            .warning_observers
            .notify_all(|o| o.new_warning(&event));
    }
}

pub struct JobRunnerBuilder {
    job_id: String,
    instance_id: Option<String>,
    user_params: BTreeMap<String, String>,
    system_params: BTreeMap<String, String>,
    approval: Option<ApprovalStep>,
    dependency: Option<DependencyStep>,
    no_overlap: Option<NoOverlapStep>,
    queue: Option<QueueStep>,
    output: OutputConfig,
}

impl JobRunnerBuilder {
    fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            instance_id: None,
            user_params: BTreeMap::new(),
            system_params: BTreeMap::new(),
            approval: None,
            dependency: None,
            no_overlap: None,
            queue: None,
            output: OutputConfig::default(),
        }
    }

    /// Defaults to a generated timestamp-based id
    pub fn instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_params.insert(key.into(), value.into());
        self
    }

    pub fn system_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.system_params.insert(key.into(), value.into());
        self
    }

    /// Wait in a PENDING phase until released
    pub fn pending(mut self, timeout: Option<Duration>) -> Self {
        self.approval = Some(ApprovalStep::pending(timeout));
        self
    }

    /// Wait in a PENDING phase until released, tagged with a pending group
    pub fn pending_group(self, group: impl Into<String>, timeout: Option<Duration>) -> Self {
        self.system_param(PENDING_GROUP_PARAM, group).pending(timeout)
    }

    pub fn approval(mut self, step: ApprovalStep) -> Self {
        self.approval = Some(step);
        self
    }

    /// Hold the lock `key` from before execution until the run ends
    pub fn no_overlap(mut self, locker: Arc<dyn Locker>, key: impl Into<String>) -> Self {
        self.no_overlap = Some(NoOverlapStep::new(locker, key));
        self
    }

    /// End with UNSATISFIED unless an active instance matches `dependency`
    pub fn depends_on(
        mut self,
        dependency: InstanceMatchCriteria,
        instances: Arc<dyn ActiveInstances>,
    ) -> Self {
        self.dependency = Some(DependencyStep::new(dependency, instances));
        self
    }

    /// Wait in the step's execution group until a slot is free
    pub fn execution_queue(mut self, step: QueueStep) -> Self {
        self.system_params
            .insert(EXECUTION_GROUP_PARAM.to_string(), step.group().to_string());
        self.system_params
            .insert(MAX_EXECUTIONS_PARAM.to_string(), step.max_executions().to_string());
        self.queue = Some(step);
        self
    }

    pub fn output_config(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    pub fn build(self, execution: Arc<dyn Execution>) -> JobRunner {
        let instance_id = self
            .instance_id
            .unwrap_or_else(|| TimestampIdGen::new().next());
        let id = JobInstanceId::new(self.job_id, instance_id);
        let metadata = JobInstanceMetadata {
            id: id.clone(),
            user_params: self.user_params,
            system_params: self.system_params,
        };
        let shared = Arc::new(Shared {
            metadata,
            tail: Mutex::new(OutputTail::new(
                self.output.tail_lines,
                self.output.error_lines,
            )),
            warnings: Mutex::new(BTreeMap::new()),
            transition_observers: Notification::new(),
            output_observers: Notification::new(),
            warning_observers: Notification::new(),
        });

        let approval = self.approval.map(Arc::new);
        let no_overlap = self.no_overlap.map(Arc::new);
        let queue = self.queue.map(Arc::new);
        let executing = ExecutingStep::new(
            Arc::new(TracedExecution::new(execution, id)),
            Arc::new(RunnerOutput {
                shared: Arc::clone(&shared),
                phase: Phase::new(crate::steps::phases::EXEC, RunState::Executing),
            }),
        );

        let mut steps: Vec<Arc<dyn PhaseStep>> = Vec::new();
        if let Some(step) = &approval {
            steps.push(step.clone());
        }
        if let Some(step) = self.dependency {
            steps.push(Arc::new(step));
        }
        if let Some(step) = &no_overlap {
            steps.push(step.clone());
        }
        if let Some(step) = &queue {
            steps.push(step.clone());
        }
        steps.push(Arc::new(executing));

        let phaser = Phaser::new(steps);
        let hook_shared = Arc::clone(&shared);
        phaser.set_transition_hook(move |transition| hook_shared.on_transition(transition));

        JobRunner {
            shared,
            phaser,
            approval,
            no_overlap,
            queue,
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
