// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run context: the environment a runner executes in
//!
//! Registers each runner with the instance managers before it runs, stores
//! its final snapshot and unregisters it afterwards. Manager failures are
//! logged and never reach the runner.

use crate::plugin::{InstanceManager, PluginError};
use crate::runner::JobRunner;
use pj_core::{InvalidStateError, JobRun};
use pj_storage::{NoPersistence, Persistence};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

pub struct RunContext {
    managers: Vec<(String, Arc<dyn InstanceManager>)>,
    persistence: Box<dyn Persistence>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(Box::new(NoPersistence))
    }
}

impl RunContext {
    pub fn new(persistence: Box<dyn Persistence>) -> Self {
        Self {
            managers: Vec::new(),
            persistence,
        }
    }

    pub fn with_manager(mut self, name: impl Into<String>, manager: Arc<dyn InstanceManager>) -> Self {
        self.add_manager(name, manager);
        self
    }

    pub fn add_manager(&mut self, name: impl Into<String>, manager: Arc<dyn InstanceManager>) {
        self.managers.push((name.into(), manager));
    }

    pub fn persistence(&self) -> &dyn Persistence {
        self.persistence.as_ref()
    }

    /// Run an instance inside the context. Blocks until the instance terminates.
    pub fn run(&self, runner: Arc<JobRunner>) -> Result<JobRun, InvalidStateError> {
        for (name, manager) in &self.managers {
            guarded(name, "register", || manager.register_instance(&runner));
        }

        let result = runner.run();

        if let Ok(run) = &result {
            match self.persistence.store_instances(std::slice::from_ref(run)) {
                Ok(()) => {}
                Err(e) if e.is_disabled() => {
                    tracing::debug!("persistence disabled, run not stored");
                }
                Err(e) => tracing::error!(instance = %run.id(), error = %e, "failed to store run"),
            }
        }

        for (name, manager) in self.managers.iter().rev() {
            guarded(name, "unregister", || manager.unregister_instance(&runner));
        }
        result
    }

    pub fn close(&self) {
        if let Err(e) = self.persistence.close() {
            tracing::warn!(error = %e, "failed to close persistence");
        }
    }
}

fn guarded(name: &str, action: &str, call: impl FnOnce() -> Result<(), PluginError>) {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(manager = name, action, error = %e, "instance manager failed"),
        Err(payload) => tracing::error!(
            manager = name,
            action,
            error = %pj_core::error::panic_message(payload.as_ref()),
            "instance manager panicked"
        ),
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
