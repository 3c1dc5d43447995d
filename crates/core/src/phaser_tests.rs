// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use std::sync::atomic::AtomicUsize;
use std::thread;

enum Behavior {
    Complete,
    Terminate(TerminationStatus),
    Fail(FailedRun),
    Panic,
    BlockUntilStopped,
}

struct TestStep {
    phase: Phase,
    behavior: Behavior,
    stop_status: TerminationStatus,
    stopped: Mutex<bool>,
    stop_changed: Condvar,
    stop_calls: AtomicUsize,
    interrupt_calls: AtomicUsize,
}

impl TestStep {
    fn new(name: &str, state: RunState, behavior: Behavior) -> Arc<Self> {
        Self::stopping_with(name, state, behavior, TerminationStatus::Stopped)
    }

    fn stopping_with(
        name: &str,
        state: RunState,
        behavior: Behavior,
        stop_status: TerminationStatus,
    ) -> Arc<Self> {
        Arc::new(Self {
            phase: Phase::new(name, state),
            behavior,
            stop_status,
            stopped: Mutex::new(false),
            stop_changed: Condvar::new(),
            stop_calls: AtomicUsize::new(0),
            interrupt_calls: AtomicUsize::new(0),
        })
    }

    fn exec(name: &str, behavior: Behavior) -> Arc<Self> {
        Self::new(name, RunState::Executing, behavior)
    }

    fn release(&self) {
        *self.stopped.lock().unwrap() = true;
        self.stop_changed.notify_all();
    }
}

impl PhaseStep for TestStep {
    fn phase(&self) -> &Phase {
        &self.phase
    }

    fn run(&self) -> Result<Option<TerminationStatus>, FailedRun> {
        match &self.behavior {
            Behavior::Complete => Ok(None),
            Behavior::Terminate(status) => Ok(Some(*status)),
            Behavior::Fail(failure) => Err(failure.clone()),
            Behavior::Panic => panic!("step exploded"),
            Behavior::BlockUntilStopped => {
                let mut stopped = self.stopped.lock().unwrap();
                while !*stopped {
                    stopped = self.stop_changed.wait(stopped).unwrap();
                }
                Ok(None)
            }
        }
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.release();
    }

    fn interrupt(&self) {
        self.interrupt_calls.fetch_add(1, Ordering::SeqCst);
        self.release();
    }

    fn stop_status(&self) -> TerminationStatus {
        self.stop_status
    }
}

fn phaser(steps: Vec<Arc<TestStep>>) -> Phaser<FakeClock> {
    let steps = steps
        .into_iter()
        .map(|s| s as Arc<dyn PhaseStep>)
        .collect();
    Phaser::with_clock(steps, FakeClock::new())
}

fn names(phaser: &Phaser<FakeClock>) -> Vec<String> {
    phaser
        .lifecycle()
        .phases()
        .map(|p| p.name.clone())
        .collect()
}

fn status(phaser: &Phaser<FakeClock>) -> Option<TerminationStatus> {
    phaser.termination().map(|t| t.status)
}

#[test]
fn prime_enters_init() {
    let sut = phaser(vec![TestStep::exec("EXEC1", Behavior::Complete)]);
    sut.prime().unwrap();
    assert_eq!(sut.current_phase(), Some(Phase::init()));
    assert_eq!(sut.lifecycle().run_state(), RunState::Created);
    assert!(sut.termination().is_none());
}

#[test]
fn prime_twice_fails() {
    let sut = phaser(vec![]);
    sut.prime().unwrap();
    assert!(sut.prime().is_err());
    assert_eq!(sut.lifecycle().phase_count(), 1);
}

#[test]
fn run_before_prime_fails() {
    let sut = phaser(vec![]);
    assert!(sut.run().is_err());
}

#[test]
fn empty_phaser_completes() {
    let sut = phaser(vec![]);
    sut.prime().unwrap();
    sut.run().unwrap();
    assert_eq!(names(&sut), ["INIT", "TERMINAL"]);
    assert_eq!(status(&sut), Some(TerminationStatus::Completed));
}

#[test]
fn run_walks_all_steps() {
    let sut = phaser(vec![
        TestStep::exec("EXEC1", Behavior::Complete),
        TestStep::exec("EXEC2", Behavior::Complete),
    ]);
    sut.prime().unwrap();
    sut.run().unwrap();
    assert_eq!(names(&sut), ["INIT", "EXEC1", "EXEC2", "TERMINAL"]);
    assert_eq!(status(&sut), Some(TerminationStatus::Completed));
    assert!(sut.lifecycle().is_ended());
}

#[test]
fn premature_termination_skips_remaining_steps() {
    let sut = phaser(vec![
        TestStep::exec("EXEC1", Behavior::Terminate(TerminationStatus::Rejected)),
        TestStep::exec("EXEC2", Behavior::Complete),
    ]);
    sut.prime().unwrap();
    sut.run().unwrap();
    assert_eq!(names(&sut), ["INIT", "EXEC1", "TERMINAL"]);
    assert_eq!(status(&sut), Some(TerminationStatus::Rejected));
}

#[test]
fn failed_run_is_captured() {
    let failure = FailedRun::failed("FaultType", "reason");
    let sut = phaser(vec![
        TestStep::exec("EXEC1", Behavior::Fail(failure.clone())),
        TestStep::exec("EXEC2", Behavior::Complete),
    ]);
    sut.prime().unwrap();
    sut.run().unwrap();
    assert_eq!(names(&sut), ["INIT", "EXEC1", "TERMINAL"]);
    let termination = sut.termination().unwrap();
    assert_eq!(termination.status, TerminationStatus::Failed);
    assert_eq!(termination.fault, Some(failure.fault));
}

#[test]
fn panicking_step_becomes_error() {
    let sut = phaser(vec![TestStep::exec("EXEC1", Behavior::Panic)]);
    sut.prime().unwrap();
    sut.run().unwrap();
    let termination = sut.termination().unwrap();
    assert_eq!(termination.status, TerminationStatus::Error);
    let fault = termination.fault.unwrap();
    assert_eq!(fault.code, Fault::UNEXPECTED_ERROR);
    assert!(fault.reason.contains("step exploded"));
}

#[test]
fn stop_before_prime_enters_init_then_terminal() {
    let sut = phaser(vec![TestStep::exec("EXEC1", Behavior::Complete)]);
    sut.stop();
    assert_eq!(names(&sut), ["INIT", "TERMINAL"]);
    assert_eq!(status(&sut), Some(TerminationStatus::Stopped));
    assert!(sut.prime().is_err());
}

#[test]
fn stop_before_run() {
    let step = TestStep::exec("EXEC1", Behavior::Complete);
    let sut = phaser(vec![step.clone()]);
    sut.prime().unwrap();
    sut.stop();
    sut.run().unwrap();
    assert_eq!(names(&sut), ["INIT", "TERMINAL"]);
    assert_eq!(status(&sut), Some(TerminationStatus::Stopped));
    assert_eq!(step.stop_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn stop_during_run_stops_current_step() {
    let step = TestStep::new("APPROVAL", RunState::Pending, Behavior::BlockUntilStopped);
    let sut = Arc::new(phaser(vec![step.clone(), TestStep::exec("EXEC", Behavior::Complete)]));
    sut.prime().unwrap();
    let runner = {
        let sut = Arc::clone(&sut);
        thread::spawn(move || sut.run())
    };
    assert!(sut.wait_for_state(RunState::Pending, Some(Duration::from_secs(5))));

    sut.stop();
    runner.join().unwrap().unwrap();

    assert_eq!(names(&sut), ["INIT", "APPROVAL", "TERMINAL"]);
    assert_eq!(status(&sut), Some(TerminationStatus::Stopped));
    assert_eq!(step.stop_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn stop_records_the_current_step_stop_status() {
    let step = TestStep::stopping_with(
        "QUEUE",
        RunState::InQueue,
        Behavior::BlockUntilStopped,
        TerminationStatus::Cancelled,
    );
    let sut = Arc::new(phaser(vec![step.clone(), TestStep::exec("EXEC", Behavior::Complete)]));
    sut.prime().unwrap();
    let runner = {
        let sut = Arc::clone(&sut);
        thread::spawn(move || sut.run())
    };
    assert!(sut.wait_for_state(RunState::InQueue, Some(Duration::from_secs(5))));

    sut.stop();
    runner.join().unwrap().unwrap();

    assert_eq!(names(&sut), ["INIT", "QUEUE", "TERMINAL"]);
    assert_eq!(status(&sut), Some(TerminationStatus::Cancelled));
}

#[test]
fn stop_is_idempotent() {
    let sut = phaser(vec![]);
    sut.prime().unwrap();
    sut.stop();
    sut.stop();
    sut.interrupt();
    assert_eq!(names(&sut), ["INIT", "TERMINAL"]);
}

#[test]
fn interrupt_reports_stopped_and_interrupts_step() {
    let step = TestStep::exec("EXEC", Behavior::BlockUntilStopped);
    let sut = Arc::new(phaser(vec![step.clone()]));
    sut.prime().unwrap();
    let runner = {
        let sut = Arc::clone(&sut);
        thread::spawn(move || sut.run())
    };
    assert!(sut.wait_for_phase("EXEC", Some(Duration::from_secs(5))));

    sut.interrupt();
    runner.join().unwrap().unwrap();

    assert_eq!(status(&sut), Some(TerminationStatus::Stopped));
    assert_eq!(step.interrupt_calls.load(Ordering::SeqCst), 1);
    assert_eq!(step.stop_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn hook_sees_transition_as_latest_entry() {
    let sut = phaser(vec![TestStep::exec("EXEC1", Behavior::Complete)]);
    let seen: Arc<Mutex<Vec<(String, String, usize, bool)>>> = Arc::default();
    {
        let seen = Arc::clone(&seen);
        sut.set_transition_hook(move |t| {
            let latest = t.lifecycle.current_phase().map(|p| p == &t.new).unwrap_or(false);
            seen.lock()
                .unwrap()
                .push((t.previous.name.clone(), t.new.name.clone(), t.ordinal, latest));
        });
    }
    sut.prime().unwrap();
    sut.run().unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            ("NONE".to_string(), "INIT".to_string(), 1, true),
            ("INIT".to_string(), "EXEC1".to_string(), 2, true),
            ("EXEC1".to_string(), "TERMINAL".to_string(), 3, true),
        ]
    );
}

#[test]
fn hook_sees_termination_on_terminal_transition() {
    let sut = phaser(vec![]);
    let statuses: Arc<Mutex<Vec<Option<TerminationStatus>>>> = Arc::default();
    {
        let statuses = Arc::clone(&statuses);
        sut.set_transition_hook(move |t| {
            statuses.lock().unwrap().push(t.termination.as_ref().map(|i| i.status));
        });
    }
    sut.prime().unwrap();
    sut.run().unwrap();
    assert_eq!(
        *statuses.lock().unwrap(),
        vec![None, Some(TerminationStatus::Completed)]
    );
}

#[test]
fn stop_from_hook_is_applied_after_transition() {
    let step = TestStep::exec("EXEC1", Behavior::Complete);
    let sut = Arc::new(phaser(vec![step.clone()]));
    {
        let weak = Arc::downgrade(&sut);
        sut.set_transition_hook(move |t| {
            if t.new.name == "INIT" {
                if let Some(phaser) = weak.upgrade() {
                    assert_eq!(phaser.current_phase(), Some(Phase::init()));
                    phaser.stop();
                }
            }
        });
    }
    sut.prime().unwrap();
    sut.run().unwrap();
    assert_eq!(names(&sut), ["INIT", "TERMINAL"]);
    assert_eq!(status(&sut), Some(TerminationStatus::Stopped));
}

#[test]
fn panicking_hook_does_not_break_run() {
    let sut = phaser(vec![TestStep::exec("EXEC1", Behavior::Complete)]);
    sut.set_transition_hook(|_| panic!("hook exploded"));
    sut.prime().unwrap();
    sut.run().unwrap();
    assert_eq!(status(&sut), Some(TerminationStatus::Completed));
}

#[test]
fn transitions_are_timestamped_by_clock() {
    let clock = FakeClock::new();
    let step = TestStep::exec("EXEC1", Behavior::Complete);
    let sut = Phaser::with_clock(vec![step as Arc<dyn PhaseStep>], clock.clone());
    let start = clock.now();
    sut.prime().unwrap();
    clock.advance(Duration::from_secs(60));
    sut.run().unwrap();

    let lifecycle = sut.lifecycle();
    assert_eq!(lifecycle.created_at(), Some(start));
    assert_eq!(lifecycle.executed_at(), Some(start + chrono::Duration::seconds(60)));
    assert_eq!(
        sut.termination().unwrap().terminated_at,
        lifecycle.ended_at().unwrap()
    );
}

#[test]
fn wait_for_state_times_out() {
    let sut = phaser(vec![]);
    sut.prime().unwrap();
    assert!(!sut.wait_for_ended_state(Some(Duration::from_millis(20))));
    sut.run().unwrap();
    assert!(sut.wait_for_ended_state(Some(Duration::from_millis(20))));
}

#[test]
fn second_run_fails() {
    let sut = phaser(vec![]);
    sut.prime().unwrap();
    sut.run().unwrap();
    assert!(sut.run().is_err());
}

#[test]
fn prime_unless_terminated_skips_a_stopped_lifecycle() {
    let sut = phaser(vec![TestStep::exec("EXEC1", Behavior::Complete)]);
    sut.stop();

    assert!(!sut.prime_unless_terminated().unwrap());
    assert_eq!(names(&sut), ["INIT", "TERMINAL"]);
    assert_eq!(status(&sut), Some(TerminationStatus::Stopped));
}

#[test]
fn prime_unless_terminated_primes_once() {
    let sut = phaser(vec![TestStep::exec("EXEC1", Behavior::Complete)]);

    assert!(sut.prime_unless_terminated().unwrap());
    assert_eq!(names(&sut), ["INIT"]);
    assert!(sut.prime_unless_terminated().is_err());
}
