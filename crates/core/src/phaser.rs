// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phaser: drives an instance through its phase steps
//!
//! Every transition appends a phase run to the lifecycle and then invokes the
//! transition hook, both under the phase lock. Readers use a separately
//! published copy of the lifecycle, so they never contend with a transition
//! in progress and may be called from inside the hook.

use crate::clock::{Clock, SystemClock};
use crate::error::{panic_message, InvalidStateError};
use crate::lifecycle::{Lifecycle, PhaseRun};
use crate::phase::{Phase, RunState};
use crate::termination::{FailedRun, Fault, TerminationInfo, TerminationStatus};
use chrono::{DateTime, Utc};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

/// Implementation of one phase
pub trait PhaseStep: Send + Sync {
    fn phase(&self) -> &Phase;

    /// Run the phase. `Ok(None)` continues with the next phase, `Ok(Some(status))`
    /// terminates the run early with that status.
    fn run(&self) -> Result<Option<TerminationStatus>, FailedRun>;

    /// Request cooperative cancellation. May be called before, during or after `run`.
    fn stop(&self);

    /// Like `stop`, for a payload that was already interrupted externally
    fn interrupt(&self) {
        self.stop();
    }

    /// Status recorded when the run is stopped during this phase
    fn stop_status(&self) -> TerminationStatus {
        TerminationStatus::Stopped
    }
}

/// A phase transition as seen by the transition hook
#[derive(Clone, Debug)]
pub struct Transition {
    pub previous: Phase,
    pub new: Phase,
    /// 1-based position of the new phase in the lifecycle
    pub ordinal: usize,
    pub lifecycle: Lifecycle,
    pub termination: Option<TerminationInfo>,
}

pub type TransitionHook = Arc<dyn Fn(&Transition) + Send + Sync>;

/// External request to end a run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopSignal {
    Stop,
    Interrupt,
}

struct Progress {
    lifecycle: Lifecycle,
    termination: Option<TerminationInfo>,
    current_step: Option<usize>,
    /// Set by `prime`; a stop before priming enters INIT without it
    primed: bool,
}

#[derive(Clone, Default)]
struct Published {
    lifecycle: Lifecycle,
    termination: Option<TerminationInfo>,
}

pub struct Phaser<C: Clock = SystemClock> {
    steps: Vec<Arc<dyn PhaseStep>>,
    clock: C,
    hook: Mutex<Option<TransitionHook>>,
    progress: Mutex<Progress>,
    published: Mutex<Published>,
    changed: Condvar,
    running: AtomicBool,
    transitioning: Mutex<Option<ThreadId>>,
    deferred: Mutex<Option<StopSignal>>,
}

impl Phaser {
    pub fn new(steps: Vec<Arc<dyn PhaseStep>>) -> Self {
        Self::with_clock(steps, SystemClock)
    }
}

impl<C: Clock> Phaser<C> {
    pub fn with_clock(steps: Vec<Arc<dyn PhaseStep>>, clock: C) -> Self {
        Self {
            steps,
            clock,
            hook: Mutex::new(None),
            progress: Mutex::new(Progress {
                lifecycle: Lifecycle::new(),
                termination: None,
                current_step: None,
                primed: false,
            }),
            published: Mutex::new(Published::default()),
            changed: Condvar::new(),
            running: AtomicBool::new(false),
            transitioning: Mutex::new(None),
            deferred: Mutex::new(None),
        }
    }

    /// Install the hook invoked on every transition. Replaces any previous hook.
    pub fn set_transition_hook(&self, hook: impl Fn(&Transition) + Send + Sync + 'static) {
        *self.hook.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(hook));
    }

    /// Declared phases, in order, without the standard INIT and TERMINAL phases
    pub fn phases(&self) -> Vec<Phase> {
        self.steps.iter().map(|step| step.phase().clone()).collect()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.published().lifecycle.clone()
    }

    pub fn termination(&self) -> Option<TerminationInfo> {
        self.published().termination.clone()
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.published().lifecycle.current_phase().cloned()
    }

    pub fn is_terminated(&self) -> bool {
        self.published().termination.is_some()
    }

    /// Enter the INIT phase. Fails when called more than once.
    pub fn prime(&self) -> Result<(), InvalidStateError> {
        {
            let mut progress = self.lock_progress();
            if !progress.lifecycle.is_empty() {
                return Err(InvalidStateError::new("primed already"));
            }
            progress.primed = true;
            self.enter(&mut progress, None, Phase::init())?;
        }
        self.apply_deferred();
        Ok(())
    }

    /// Enter the INIT phase unless a stop already terminated the lifecycle
    /// before it was primed. Returns false in that case; the check and the
    /// transition happen under one phase lock.
    pub fn prime_unless_terminated(&self) -> Result<bool, InvalidStateError> {
        {
            let mut progress = self.lock_progress();
            if progress.primed {
                return Err(InvalidStateError::new("primed already"));
            }
            if progress.termination.is_some() {
                return Ok(false);
            }
            progress.primed = true;
            self.enter(&mut progress, None, Phase::init())?;
        }
        self.apply_deferred();
        Ok(true)
    }

    /// Run all steps until the terminal phase is reached. Blocks the calling thread.
    pub fn run(&self) -> Result<(), InvalidStateError> {
        if self.lock_progress().lifecycle.is_empty() {
            return Err(InvalidStateError::new("prime not executed before run"));
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(InvalidStateError::new("run already executed"));
        }

        for (index, step) in self.steps.iter().enumerate() {
            {
                let mut progress = self.lock_progress();
                if progress.termination.is_some() {
                    return Ok(());
                }
                self.enter(&mut progress, Some(index), step.phase().clone())?;
            }
            self.apply_deferred();
            if self.is_terminated() {
                return Ok(());
            }

            match catch_unwind(AssertUnwindSafe(|| step.run())) {
                Ok(Ok(None)) => {}
                Ok(Ok(Some(status))) => return self.terminate(status, None),
                Ok(Err(failure)) => {
                    tracing::debug!(phase = %step.phase(), error = %failure, "phase step failed");
                    return self.terminate(failure.status, Some(failure.fault));
                }
                Err(payload) => {
                    let failure = FailedRun::unexpected(panic_message(payload.as_ref()));
                    tracing::error!(phase = %step.phase(), error = %failure, "phase step panicked");
                    return self.terminate(failure.status, Some(failure.fault));
                }
            }
        }

        self.terminate(TerminationStatus::Completed, None)
    }

    /// Force the terminal phase with status STOPPED. No-op once terminated.
    pub fn stop(&self) {
        self.signal(StopSignal::Stop);
    }

    /// Same as `stop`, but the current step is told the payload was interrupted
    pub fn interrupt(&self) {
        self.signal(StopSignal::Interrupt);
    }

    /// Block until the lifecycle contains a phase of the given run state.
    /// Returns false when the timeout elapses first.
    pub fn wait_for_state(&self, state: RunState, timeout: Option<Duration>) -> bool {
        self.wait_until(|lifecycle| lifecycle.contains_run_state(state), timeout)
    }

    pub fn wait_for_ended_state(&self, timeout: Option<Duration>) -> bool {
        self.wait_for_state(RunState::Ended, timeout)
    }

    pub fn wait_for_phase(&self, name: &str, timeout: Option<Duration>) -> bool {
        self.wait_until(|lifecycle| lifecycle.phase_run(name).is_some(), timeout)
    }

    fn wait_until(&self, done: impl Fn(&Lifecycle) -> bool, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut published = self.published();
        loop {
            if done(&published.lifecycle) {
                return true;
            }
            published = match deadline {
                None => self
                    .changed
                    .wait(published)
                    .unwrap_or_else(|e| e.into_inner()),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.changed
                        .wait_timeout(published, deadline - now)
                        .unwrap_or_else(|e| e.into_inner())
                        .0
                }
            };
        }
    }

    fn signal(&self, signal: StopSignal) {
        if self.transitioning_on_current_thread() {
            *self.deferred.lock().unwrap_or_else(|e| e.into_inner()) = Some(signal);
            return;
        }

        let step = {
            let mut progress = self.lock_progress();
            if progress.termination.is_some() {
                return;
            }
            if progress.lifecycle.is_empty() {
                if let Err(e) = self.enter(&mut progress, None, Phase::init()) {
                    tracing::error!(error = %e, "failed to enter init phase on stop");
                    return;
                }
            }
            let step = progress.current_step.and_then(|i| self.steps.get(i).cloned());
            let status = step
                .as_ref()
                .map_or(TerminationStatus::Stopped, |step| step.stop_status());
            if let Err(e) = self.enter_terminal(&mut progress, status, None) {
                tracing::error!(error = %e, "failed to enter terminal phase on stop");
            }
            step
        };
        self.apply_deferred();

        if let Some(step) = step {
            match signal {
                StopSignal::Stop => step.stop(),
                StopSignal::Interrupt => step.interrupt(),
            }
        }
    }

    fn terminate(
        &self,
        status: TerminationStatus,
        fault: Option<Fault>,
    ) -> Result<(), InvalidStateError> {
        {
            let mut progress = self.lock_progress();
            if progress.termination.is_some() {
                return Ok(());
            }
            self.enter_terminal(&mut progress, status, fault)?;
        }
        self.apply_deferred();
        Ok(())
    }

    fn enter_terminal(
        &self,
        progress: &mut Progress,
        status: TerminationStatus,
        fault: Option<Fault>,
    ) -> Result<(), InvalidStateError> {
        let terminated_at = self.timestamp(progress);
        progress.termination = Some(TerminationInfo {
            status,
            terminated_at,
            fault,
        });
        self.enter_at(progress, None, Phase::terminal(), terminated_at)
    }

    fn enter(
        &self,
        progress: &mut Progress,
        step: Option<usize>,
        phase: Phase,
    ) -> Result<(), InvalidStateError> {
        let at = self.timestamp(progress);
        self.enter_at(progress, step, phase, at)
    }

    /// Append the new phase run, publish it, then run the hook. Caller holds the phase lock.
    fn enter_at(
        &self,
        progress: &mut Progress,
        step: Option<usize>,
        phase: Phase,
        at: DateTime<Utc>,
    ) -> Result<(), InvalidStateError> {
        let previous = progress
            .lifecycle
            .current_phase()
            .cloned()
            .unwrap_or_else(Phase::none);
        progress
            .lifecycle
            .add_phase_run(PhaseRun::open(phase.clone(), at))?;
        progress.current_step = step;
        let ordinal = progress.lifecycle.phase_count();
        tracing::debug!(previous = %previous, new = %phase, ordinal, "phase transition");

        {
            let mut published = self.published();
            published.lifecycle = progress.lifecycle.clone();
            published.termination = progress.termination.clone();
        }
        self.changed.notify_all();

        let hook = self.hook.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(hook) = hook {
            let transition = Transition {
                previous,
                new: phase,
                ordinal,
                lifecycle: progress.lifecycle.clone(),
                termination: progress.termination.clone(),
            };
            self.set_transitioning(Some(std::thread::current().id()));
            let result = catch_unwind(AssertUnwindSafe(|| hook(&transition)));
            self.set_transitioning(None);
            if let Err(payload) = result {
                tracing::error!(
                    phase = %transition.new,
                    error = %panic_message(payload.as_ref()),
                    "transition hook panicked"
                );
            }
        }
        Ok(())
    }

    /// Current time, never earlier than the last transition
    fn timestamp(&self, progress: &Progress) -> DateTime<Utc> {
        let now = self.clock.now();
        match progress.lifecycle.last_transition_at() {
            Some(last) if last > now => last,
            _ => now,
        }
    }

    fn apply_deferred(&self) {
        let signal = self.deferred.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(signal) = signal {
            self.signal(signal);
        }
    }

    fn transitioning_on_current_thread(&self) -> bool {
        *self.transitioning.lock().unwrap_or_else(|e| e.into_inner())
            == Some(std::thread::current().id())
    }

    fn set_transitioning(&self, owner: Option<ThreadId>) {
        *self.transitioning.lock().unwrap_or_else(|e| e.into_inner()) = owner;
    }

    fn lock_progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn published(&self) -> MutexGuard<'_, Published> {
        self.published.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "phaser_tests.rs"]
mod tests;
