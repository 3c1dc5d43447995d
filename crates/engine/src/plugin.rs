// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance managers and the plugin registry
//!
//! Plugins are instance managers created by name from an explicit registry.
//! The registry is populated by [`PluginRegistry::with_builtins`] and
//! [`PluginRegistry::register`]; nothing registers itself implicitly.

use crate::runner::JobRunner;
use pj_core::{
    Config, JobInstanceId, TransitionEvent, TransitionObserver, WarningEvent, WarningObserver,
    DEFAULT_OBSERVER_PRIORITY,
};
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("unknown plugin: {0}")]
    Unknown(String),
    #[error("plugin {name} failed: {reason}")]
    Failed { name: String, reason: String },
}

/// Receives runners as they are created and when they finish
pub trait InstanceManager: Send + Sync {
    fn register_instance(&self, runner: &Arc<JobRunner>) -> Result<(), PluginError>;

    fn unregister_instance(&self, runner: &Arc<JobRunner>) -> Result<(), PluginError>;
}

pub type PluginFactory =
    Box<dyn Fn(&Config) -> Result<Arc<dyn InstanceManager>, PluginError> + Send + Sync>;

pub const LOG_PLUGIN: &str = "log";

/// Named plugin factories
pub struct PluginRegistry {
    factories: BTreeMap<String, PluginFactory>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl PluginRegistry {
    /// Registry without any plugin
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(LOG_PLUGIN, |_config: &Config| {
            Ok(Arc::new(LogPlugin::default()) as Arc<dyn InstanceManager>)
        });
        registry
    }

    /// Add or replace a factory
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&Config) -> Result<Arc<dyn InstanceManager>, PluginError>
            + Send
            + Sync
            + 'static,
    ) {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn create_one(
        &self,
        name: &str,
        config: &Config,
    ) -> Result<Arc<dyn InstanceManager>, PluginError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PluginError::Unknown(name.to_string()))?;
        match catch_unwind(AssertUnwindSafe(|| factory(config))) {
            Ok(result) => result,
            Err(payload) => Err(PluginError::Failed {
                name: name.to_string(),
                reason: pj_core::error::panic_message(payload.as_ref()),
            }),
        }
    }

    /// Instantiate the named plugins. Unknown or failing plugins are logged and skipped.
    pub fn create(
        &self,
        names: &[String],
        config: &Config,
    ) -> Vec<(String, Arc<dyn InstanceManager>)> {
        let mut plugins = Vec::new();
        for name in names {
            match self.create_one(name, config) {
                Ok(plugin) => {
                    tracing::debug!(plugin = %name, "plugin created");
                    plugins.push((name.clone(), plugin));
                }
                Err(e) => tracing::warn!(plugin = %name, error = %e, "plugin not loaded"),
            }
        }
        plugins
    }
}

/// Logs transitions and warnings of every registered instance
#[derive(Default)]
pub struct LogPlugin {
    registered: Mutex<HashMap<JobInstanceId, LogObservers>>,
}

struct LogObservers {
    transitions: Arc<dyn TransitionObserver>,
    warnings: Arc<dyn WarningObserver>,
}

impl LogPlugin {
    pub fn registered_count(&self) -> usize {
        self.registered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl InstanceManager for LogPlugin {
    fn register_instance(&self, runner: &Arc<JobRunner>) -> Result<(), PluginError> {
        let observers = LogObservers {
            transitions: Arc::new(|event: &TransitionEvent| {
                tracing::info!(
                    target: "pj::plugin::log",
                    instance = %event.job_run.id(),
                    phase = %event.new_phase,
                    "transition"
                );
            }),
            warnings: Arc::new(|event: &WarningEvent| {
                tracing::warn!(
                    target: "pj::plugin::log",
                    instance = %event.job_run.id(),
                    warning = %event.warning.name,
                    count = event.count,
                    "warning"
                );
            }),
        };
        runner.add_transition_observer(Arc::clone(&observers.transitions), DEFAULT_OBSERVER_PRIORITY);
        runner.add_warning_observer(Arc::clone(&observers.warnings), DEFAULT_OBSERVER_PRIORITY);
        self.registered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(runner.id().clone(), observers);
        Ok(())
    }

    fn unregister_instance(&self, runner: &Arc<JobRunner>) -> Result<(), PluginError> {
        let removed = self
            .registered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(runner.id());
        if let Some(observers) = removed {
            runner.remove_transition_observer(&observers.transitions);
            runner.remove_warning_observer(&observers.warnings);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "plugin_tests.rs"]
mod tests;
