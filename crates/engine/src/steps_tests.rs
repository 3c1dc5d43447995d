// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::execution::{FakeExecution, FakeOutcome};
use crate::runner::JobRunner;
use pj_core::{FileLocker, LockConfig, MatchingStrategy};
use yare::parameterized;

fn locker(dir: &std::path::Path, timeout_ms: u64) -> Arc<dyn Locker> {
    Arc::new(FileLocker::new(
        LockConfig::new(dir)
            .with_timeout(Duration::from_millis(timeout_ms))
            .with_poll_interval(Duration::from_millis(10)),
    ))
}

fn wait_until(done: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "condition not reached");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn release_before_waiting_is_not_applicable() {
    let step = ApprovalStep::pending(None);
    assert!(!step.is_waiting());
    assert!(!step.release());
}

#[test]
fn release_unblocks_waiting_step() {
    let step = Arc::new(ApprovalStep::pending(None));
    let runner = Arc::clone(&step);
    let handle = std::thread::spawn(move || runner.run());
    wait_until(|| step.is_waiting());
    assert!(step.release());
    assert!(!step.release());
    assert_eq!(handle.join().unwrap(), Ok(None));
}

#[test]
fn approval_times_out() {
    let step = ApprovalStep::pending(Some(Duration::from_millis(30)));
    assert_eq!(step.run(), Ok(Some(TerminationStatus::Timeout)));
}

#[test]
fn stop_ends_approval_wait() {
    let step = Arc::new(ApprovalStep::pending(None));
    let runner = Arc::clone(&step);
    let handle = std::thread::spawn(move || runner.run());
    wait_until(|| step.is_waiting());
    step.stop();
    assert_eq!(handle.join().unwrap(), Ok(Some(TerminationStatus::Stopped)));
    assert!(!step.release());
}

#[test]
fn approval_phase_is_pending() {
    let step = ApprovalStep::pending(None);
    assert_eq!(step.phase().name, phases::PENDING);
    assert_eq!(step.phase().run_state, RunState::Pending);
}

#[test]
fn no_overlap_holds_lock_until_released() {
    let dir = tempfile::tempdir().unwrap();
    let first = NoOverlapStep::new(locker(dir.path(), 50), "backup");
    let second = NoOverlapStep::new(locker(dir.path(), 50), "backup");

    assert_eq!(first.run(), Ok(None));
    assert!(first.holds_lock());
    assert_eq!(second.run(), Ok(Some(TerminationStatus::InvalidOverlap)));
    assert!(!second.holds_lock());

    first.release_lock();
    assert!(!first.holds_lock());
    assert_eq!(second.run(), Ok(None));
}

#[test]
fn no_overlap_distinct_keys_do_not_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let a = NoOverlapStep::new(locker(dir.path(), 50), "a");
    let b = NoOverlapStep::new(locker(dir.path(), 50), "b");
    assert_eq!(a.run(), Ok(None));
    assert_eq!(b.run(), Ok(None));
}

#[parameterized(
    completed = { FakeOutcome::Complete, Ok(None) },
    stopped = { FakeOutcome::Status(TerminationStatus::Stopped), Ok(Some(TerminationStatus::Stopped)) },
    rejected = { FakeOutcome::Status(TerminationStatus::Rejected), Ok(Some(TerminationStatus::Rejected)) },
)]
fn executing_step_maps_status(
    outcome: FakeOutcome,
    expected: Result<Option<TerminationStatus>, FailedRun>,
) {
    let sink: Arc<dyn OutputSink> = Arc::new(|_: &str, _: bool| {});
    let step = ExecutingStep::new(Arc::new(FakeExecution::new(outcome)), sink);
    assert_eq!(step.run(), expected);
}

#[test]
fn executing_step_converts_failure() {
    let sink: Arc<dyn OutputSink> = Arc::new(|_: &str, _: bool| {});
    let step = ExecutingStep::new(Arc::new(FakeExecution::failing("boom")), sink);
    let failure = step.run().unwrap_err();
    assert_eq!(failure.status, TerminationStatus::Failed);
    assert_eq!(failure.fault.reason, "boom");
}

#[test]
fn executing_step_forwards_stop_and_interrupt() {
    let execution = Arc::new(FakeExecution::completing());
    let sink: Arc<dyn OutputSink> = Arc::new(|_: &str, _: bool| {});
    let step = ExecutingStep::new(execution.clone(), sink);
    step.stop();
    step.interrupt();
    assert_eq!(execution.stop_calls(), 1);
    assert_eq!(execution.interrupt_calls(), 1);
}

fn queue(locker: &Arc<dyn Locker>, group: &str, max_executions: u32) -> Arc<QueueStep> {
    Arc::new(QueueStep::new(Arc::clone(locker), group, max_executions).unwrap())
}

#[test]
fn queue_dispatches_up_to_max_executions() {
    let dir = tempfile::tempdir().unwrap();
    let locker = locker(dir.path(), 100);
    let first = queue(&locker, "nightly", 2);
    let second = queue(&locker, "nightly", 2);
    let third = queue(&locker, "nightly", 2);

    assert_eq!(first.run(), Ok(None));
    assert_eq!(second.run(), Ok(None));
    let waiting = {
        let third = Arc::clone(&third);
        std::thread::spawn(move || third.run())
    };
    wait_until(|| third.is_queued());
    assert!(!third.holds_slot());

    first.release_slot();
    assert_eq!(waiting.join().unwrap(), Ok(None));
    assert!(third.holds_slot());
    assert!(!third.is_queued());
}

#[test]
fn stop_cancels_queued_step() {
    let dir = tempfile::tempdir().unwrap();
    let locker = locker(dir.path(), 100);
    let running = queue(&locker, "nightly", 1);
    let queued = queue(&locker, "nightly", 1);
    assert_eq!(running.run(), Ok(None));

    let waiting = {
        let queued = Arc::clone(&queued);
        std::thread::spawn(move || queued.run())
    };
    wait_until(|| queued.is_queued());
    queued.stop();

    assert_eq!(waiting.join().unwrap(), Ok(Some(TerminationStatus::Cancelled)));
    assert!(!queued.holds_slot());
    assert_eq!(queued.stop_status(), TerminationStatus::Cancelled);
}

#[test]
fn execution_groups_do_not_share_slots() {
    let dir = tempfile::tempdir().unwrap();
    let locker = locker(dir.path(), 100);
    assert_eq!(queue(&locker, "nightly", 1).run(), Ok(None));
    let other = queue(&locker, "hourly", 1);
    assert_eq!(other.run(), Ok(None));
    assert!(other.holds_slot());
}

#[test]
fn queue_phase_is_in_queue() {
    let dir = tempfile::tempdir().unwrap();
    let step = queue(&locker(dir.path(), 100), "nightly", 1);
    assert_eq!(step.phase().name, phases::QUEUE);
    assert_eq!(step.phase().run_state, RunState::InQueue);
}

#[parameterized(
    missing_group = { "", 1, QueueError::MissingGroup },
    no_slots = { "nightly", 0, QueueError::NoSlots },
)]
fn queue_rejects_invalid_limits(group: &str, max_executions: u32, expected: QueueError) {
    let dir = tempfile::tempdir().unwrap();
    let step = QueueStep::new(locker(dir.path(), 100), group, max_executions);
    assert_eq!(step.err(), Some(expected));
}

struct StaticInstances(Result<Vec<JobRun>, String>);

impl ActiveInstances for StaticInstances {
    fn active_instances(&self) -> Result<Vec<JobRun>, LookupError> {
        self.0.clone().map_err(LookupError)
    }
}

fn active(job: &str) -> JobRun {
    let runner = JobRunner::builder(job)
        .instance_id("1")
        .build(Arc::new(FakeExecution::completing()));
    runner.snapshot()
}

fn ended(job: &str) -> JobRun {
    let runner = JobRunner::builder(job)
        .instance_id("2")
        .build(Arc::new(FakeExecution::completing()));
    runner.run().unwrap()
}

fn dependency(pattern: &str, instances: Result<Vec<JobRun>, String>) -> DependencyStep {
    DependencyStep::new(
        InstanceMatchCriteria::parse_pattern(pattern, MatchingStrategy::Exact),
        Arc::new(StaticInstances(instances)),
    )
}

#[test]
fn dependency_satisfied_by_active_instance() {
    let step = dependency("backup", Ok(vec![active("report"), active("backup")]));
    assert_eq!(step.run(), Ok(None));
}

#[test]
fn dependency_without_match_is_unsatisfied() {
    let step = dependency("backup", Ok(vec![active("report")]));
    assert_eq!(step.run(), Ok(Some(TerminationStatus::Unsatisfied)));
}

#[test]
fn ended_instance_does_not_satisfy_dependency() {
    let step = dependency("backup", Ok(vec![ended("backup")]));
    assert_eq!(step.run(), Ok(Some(TerminationStatus::Unsatisfied)));
}

#[test]
fn dependency_lookup_failure_fails_the_run() {
    let step = dependency("backup", Err("no sockets".to_string()));
    let failure = step.run().unwrap_err();
    assert_eq!(failure.status, TerminationStatus::Failed);
    assert_eq!(failure.fault.code, "DEPENDENCY_LOOKUP_FAILED");
    assert!(failure.fault.reason.contains("no sockets"));
}

#[test]
fn dependency_phase_is_evaluating() {
    let step = dependency("backup", Ok(vec![]));
    assert_eq!(step.phase().name, phases::DEPENDENCY);
    assert_eq!(step.phase().run_state, RunState::Evaluating);
}
