// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::execution::FakeExecution;
use pj_core::TerminationStatus;
use pj_storage::{FilePersistence, InstanceQuery};
use std::sync::Mutex;

#[derive(Default)]
struct Recording {
    calls: Mutex<Vec<String>>,
}

impl InstanceManager for Recording {
    fn register_instance(&self, runner: &Arc<JobRunner>) -> Result<(), PluginError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("register {}", runner.id()));
        Ok(())
    }

    fn unregister_instance(&self, runner: &Arc<JobRunner>) -> Result<(), PluginError> {
        let status = runner.snapshot().status();
        self.calls
            .lock()
            .unwrap()
            .push(format!("unregister {} {:?}", runner.id(), status));
        Ok(())
    }
}

struct Failing;

impl InstanceManager for Failing {
    fn register_instance(&self, _runner: &Arc<JobRunner>) -> Result<(), PluginError> {
        Err(PluginError::Failed {
            name: "failing".to_string(),
            reason: "nope".to_string(),
        })
    }

    fn unregister_instance(&self, _runner: &Arc<JobRunner>) -> Result<(), PluginError> {
        panic!("unregister panic")
    }
}

fn runner() -> Arc<JobRunner> {
    Arc::new(
        JobRunner::builder("job")
            .instance_id("i1")
            .build(Arc::new(FakeExecution::completing())),
    )
}

#[test]
fn managers_see_register_and_unregister() {
    let recording = Arc::new(Recording::default());
    let context = RunContext::default().with_manager("rec", recording.clone());
    let run = context.run(runner()).unwrap();
    assert_eq!(run.status(), Some(TerminationStatus::Completed));
    assert_eq!(
        *recording.calls.lock().unwrap(),
        ["register job@i1", "unregister job@i1 Some(Completed)"]
    );
}

#[test]
fn manager_failures_do_not_reach_runner() {
    let recording = Arc::new(Recording::default());
    let context = RunContext::default()
        .with_manager("failing", Arc::new(Failing))
        .with_manager("rec", recording.clone());
    let run = context.run(runner()).unwrap();
    assert_eq!(run.status(), Some(TerminationStatus::Completed));
    assert_eq!(recording.calls.lock().unwrap().len(), 2);
}

#[test]
fn finished_run_is_stored() {
    let dir = tempfile::tempdir().unwrap();
    let persistence = FilePersistence::open(&dir.path().join("history.jsonl")).unwrap();
    let context = RunContext::new(Box::new(persistence));
    context.run(runner()).unwrap();

    let stored = context
        .persistence()
        .read_instances(&InstanceQuery::default())
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].instance_id(), "i1");
    assert_eq!(stored[0].status(), Some(TerminationStatus::Completed));
    context.close();
}

#[test]
fn disabled_persistence_is_ignored() {
    let context = RunContext::default();
    assert!(!context.persistence().is_enabled());
    assert!(context.run(runner()).is_ok());
}
