// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::instance::{JobInstanceId, JobInstanceMetadata, JobRun, Warn};
use crate::lifecycle::{Lifecycle, PhaseRun};
use crate::phase::{Phase, RunState};
use chrono::Utc;

fn metadata() -> JobInstanceMetadata {
    JobInstanceMetadata::new(JobInstanceId::new("backup", "i-1"))
}

fn job_run() -> JobRun {
    let lifecycle = Lifecycle::from_runs([
        PhaseRun::open(Phase::init(), Utc::now()),
    ])
    .unwrap();
    JobRun::new(metadata(), lifecycle)
}

fn transition() -> TransitionEvent {
    TransitionEvent {
        job_run: job_run(),
        previous_phase: Phase::none(),
        new_phase: Phase::init(),
        ordinal: 1,
    }
}

#[test]
fn transition_event_is_tagged_on_the_wire() {
    let bytes = InstanceEvent::InstancePhaseTransition(transition()).encode().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["event_type"], "instance_phase_transition");
    assert_eq!(json["ordinal"], 1);
}

#[test]
fn dispatched_events_replay_identically() {
    let (sender, source) = in_memory_channel();
    let dispatcher = Dispatcher::new(sender);
    let receiver = Receiver::new();

    let transitions = Arc::new(Mutex::new(Vec::new()));
    let outputs = Arc::new(Mutex::new(Vec::new()));
    let warnings = Arc::new(Mutex::new(Vec::new()));
    {
        let transitions = Arc::clone(&transitions);
        receiver.transitions.add_observer(
            Arc::new(move |e: &TransitionEvent| transitions.lock().unwrap().push(e.clone())),
            1,
        );
        let outputs = Arc::clone(&outputs);
        receiver
            .outputs
            .add_observer(Arc::new(move |e: &OutputEvent| outputs.lock().unwrap().push(e.clone())), 1);
        let warnings = Arc::clone(&warnings);
        receiver.warnings.add_observer(
            Arc::new(move |e: &WarningEvent| warnings.lock().unwrap().push(e.clone())),
            1,
        );
    }

    let transition = transition();
    let output = OutputEvent {
        metadata: metadata(),
        phase: Phase::new("EXEC", RunState::Executing),
        output: "hello".to_string(),
        is_error: false,
    };
    let warning = WarningEvent {
        job_run: job_run(),
        warning: Warn::new("exec_time_exceeded").with_param("limit", "1s"),
        count: 1,
    };
    dispatcher.new_transition(&transition);
    dispatcher.new_output(&output);
    dispatcher.new_warning(&warning);
    drop(dispatcher);

    receiver.run(&source).unwrap();

    assert_eq!(*transitions.lock().unwrap(), vec![transition]);
    assert_eq!(*outputs.lock().unwrap(), vec![output]);
    assert_eq!(*warnings.lock().unwrap(), vec![warning]);
}

#[test]
fn garbage_frames_are_skipped() {
    let (sender, source) = in_memory_channel();
    sender.send(b"not json").unwrap();
    sender
        .send(&InstanceEvent::InstancePhaseTransition(transition()).encode().unwrap())
        .unwrap();
    drop(sender);

    let receiver = Receiver::new();
    let count = Arc::new(Mutex::new(0));
    {
        let count = Arc::clone(&count);
        receiver
            .transitions
            .add_observer(Arc::new(move |_: &TransitionEvent| *count.lock().unwrap() += 1), 1);
    }
    receiver.run(&source).unwrap();
    assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn deliver_rejects_invalid_frame() {
    let receiver = Receiver::new();
    assert!(receiver.deliver(b"{}").is_err());
}
