// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runners visible to the API of this process

use pj_core::{InstanceMatchCriteria, JobInstanceId};
use pj_engine::{InstanceManager, JobRunner, PluginError};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct InstanceRegistry {
    runners: Mutex<Vec<Arc<JobRunner>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, runner: Arc<JobRunner>) {
        let mut runners = self.runners.lock().unwrap_or_else(|e| e.into_inner());
        if !runners.iter().any(|r| Arc::ptr_eq(r, &runner)) {
            runners.push(runner);
        }
    }

    pub fn remove(&self, id: &JobInstanceId) -> bool {
        let mut runners = self.runners.lock().unwrap_or_else(|e| e.into_inner());
        let before = runners.len();
        runners.retain(|r| r.id() != id);
        runners.len() != before
    }

    pub fn len(&self) -> usize {
        self.runners.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered runners whose current snapshot matches, in registration order
    pub fn matching(&self, criteria: &InstanceMatchCriteria) -> Vec<Arc<JobRunner>> {
        let runners = self.runners.lock().unwrap_or_else(|e| e.into_inner()).clone();
        runners
            .into_iter()
            .filter(|r| criteria.is_empty() || criteria.matches(&r.snapshot()))
            .collect()
    }
}

impl InstanceManager for InstanceRegistry {
    fn register_instance(&self, runner: &Arc<JobRunner>) -> Result<(), PluginError> {
        self.add(Arc::clone(runner));
        Ok(())
    }

    fn unregister_instance(&self, runner: &Arc<JobRunner>) -> Result<(), PluginError> {
        self.remove(runner.id());
        Ok(())
    }
}
