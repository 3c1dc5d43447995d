// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pj_core::{InstanceEvent, Phase, Receiver, TransitionEvent};
use pj_engine::FakeExecution;
use std::sync::{mpsc, Mutex};

/// Receive messages on a background thread so a missing frame fails instead of hanging
fn collect(listener: EventListener, count: usize) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for _ in 0..count {
            match listener.receive() {
                Ok(Some(message)) => {
                    if tx.send(message).is_err() {
                        return;
                    }
                }
                _ => return,
            }
        }
    });
    rx
}

fn next(rx: &mpsc::Receiver<Vec<u8>>) -> InstanceEvent {
    let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    InstanceEvent::decode(&message).unwrap()
}

#[test]
fn broadcast_without_listeners_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let channel = SocketBroadcastChannel::new(dir.path().join("none"));

    assert!(channel.send(b"{}").is_ok());
}

#[test]
fn every_listener_gets_the_frame() {
    let dir = tempfile::tempdir().unwrap();
    let first = EventListener::bind(dir.path()).unwrap();
    let second = EventListener::bind(dir.path()).unwrap();
    let first_rx = collect(first, 1);
    let second_rx = collect(second, 1);

    SocketBroadcastChannel::new(dir.path())
        .send(b"frame")
        .unwrap();

    assert_eq!(first_rx.recv_timeout(Duration::from_secs(5)).unwrap(), b"frame");
    assert_eq!(second_rx.recv_timeout(Duration::from_secs(5)).unwrap(), b"frame");
}

#[test]
fn stale_listener_socket_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("gone.listener"), b"").unwrap();
    let listener = EventListener::bind(dir.path()).unwrap();
    let rx = collect(listener, 1);

    SocketBroadcastChannel::new(dir.path())
        .send(b"frame")
        .unwrap();

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), b"frame");
}

#[test]
fn listener_socket_is_removed_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let listener = EventListener::bind(dir.path()).unwrap();
    let path = listener.socket_path().to_path_buf();
    assert!(path.exists());

    drop(listener);

    assert!(!path.exists());
}

#[test]
fn runner_events_reach_listener_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let listener = EventListener::bind(dir.path()).unwrap();
    let rx = collect(listener, 4);
    let manager = EventDispatchManager::for_socket_dir(dir.path()).unwrap();
    let runner = Arc::new(
        JobRunner::builder("backup")
            .instance_id("1")
            .build(Arc::new(FakeExecution::completing().with_output("hello"))),
    );

    manager.register_instance(&runner).unwrap();
    runner.run().unwrap();
    manager.unregister_instance(&runner).unwrap();

    let phases: Vec<String> = (0..4)
        .filter_map(|_| match next(&rx) {
            InstanceEvent::InstancePhaseTransition(event) => Some(event.new_phase.name),
            InstanceEvent::InstanceOutput(event) => Some(format!("output {}", event.output)),
            InstanceEvent::InstanceWarning(_) => None,
        })
        .collect();
    assert_eq!(phases, vec!["INIT", "EXEC", "output hello", Phase::TERMINAL]);
}

#[test]
fn received_frames_replay_into_local_observers() {
    let dir = tempfile::tempdir().unwrap();
    let listener = EventListener::bind(dir.path()).unwrap();
    let rx = collect(listener, 3);
    let manager = EventDispatchManager::for_socket_dir(dir.path()).unwrap();
    let runner = Arc::new(
        JobRunner::builder("backup")
            .instance_id("2")
            .build(Arc::new(FakeExecution::completing())),
    );
    manager.register_instance(&runner).unwrap();
    runner.run().unwrap();

    let receiver = Receiver::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    receiver.transitions.add_observer(
        Arc::new(move |event: &TransitionEvent| {
            sink.lock().unwrap().push(event.job_run.id().to_string());
        }),
        DEFAULT_OBSERVER_PRIORITY,
    );
    for _ in 0..3 {
        let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        receiver.deliver(&message).unwrap();
    }

    assert_eq!(*seen.lock().unwrap(), vec!["backup@2"; 3]);
}

#[test]
fn unregistered_runner_stops_dispatching() {
    let manager = EventDispatchManager::for_socket_dir("/nonexistent/pj-sockets").unwrap();
    let runner = Arc::new(
        JobRunner::builder("backup")
            .instance_id("3")
            .build(Arc::new(FakeExecution::completing())),
    );

    manager.register_instance(&runner).unwrap();
    manager.unregister_instance(&runner).unwrap();

    assert!(!runner.remove_transition_observer(&manager.transitions));
    assert!(!runner.remove_output_observer(&manager.outputs));
    assert!(!runner.remove_warning_observer(&manager.warnings));
}

/// Inner channel that blocks every send until the gate is released
struct GatedChannel {
    gate: Arc<Mutex<()>>,
    delivered: mpsc::Sender<Vec<u8>>,
}

impl MessageChannel for GatedChannel {
    fn send(&self, message: &[u8]) -> Result<(), ChannelError> {
        let _open = self.gate.lock().unwrap();
        self.delivered
            .send(message.to_vec())
            .map_err(|_| ChannelError::Closed)
    }
}

#[test]
fn queued_send_does_not_wait_for_slow_listeners() {
    let gate = Arc::new(Mutex::new(()));
    let (delivered, rx) = mpsc::channel();
    let held = gate.lock().unwrap();
    let channel = QueuedChannel::spawn(GatedChannel {
        gate: Arc::clone(&gate),
        delivered,
    })
    .unwrap();

    for message in [b"one", b"two", b"six"] {
        channel.send(message).unwrap();
    }
    assert!(rx.try_recv().is_err());

    drop(held);
    drop(channel);

    let received: Vec<Vec<u8>> = rx.try_iter().collect();
    assert_eq!(received, vec![b"one".to_vec(), b"two".to_vec(), b"six".to_vec()]);
}

#[test]
fn queued_channel_forwards_to_listeners() {
    let dir = tempfile::tempdir().unwrap();
    let listener = EventListener::bind(dir.path()).unwrap();
    let rx = collect(listener, 2);
    let channel = QueuedChannel::spawn(SocketBroadcastChannel::new(dir.path())).unwrap();

    channel.send(b"first").unwrap();
    channel.send(b"second").unwrap();

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), b"first");
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), b"second");
}
