// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in warning triggers
//!
//! Triggers are observers registered on a runner. They hold a weak reference
//! so a finished runner is not kept alive by its own observers.

use crate::runner::JobRunner;
use pj_core::{
    OutputEvent, RunState, TransitionEvent, Warn, DEFAULT_OBSERVER_PRIORITY,
};
use regex::Regex;
use std::sync::{Arc, Weak};
use std::time::Duration;

pub const EXEC_TIME_WARNING: &str = "exec_time";
pub const OUTPUT_MATCHES_WARNING: &str = "output_matches";

/// Warn once when the executing phase lasts longer than `threshold`
pub fn exec_time_exceeded(runner: &Arc<JobRunner>, threshold: Duration) {
    let weak: Weak<JobRunner> = Arc::downgrade(runner);
    runner.add_transition_observer(
        Arc::new(move |event: &TransitionEvent| {
            if event.new_phase.run_state != RunState::Executing {
                return;
            }
            let weak = weak.clone();
            let spawned = std::thread::Builder::new()
                .name("pj-exec-time".to_string())
                .spawn(move || {
                    let Some(runner) = weak.upgrade() else { return };
                    if runner.wait_for_ended_state(Some(threshold)) {
                        return;
                    }
                    runner.add_warning(
                        Warn::new(EXEC_TIME_WARNING)
                            .with_param("threshold", humantime::format_duration(threshold).to_string()),
                    );
                });
            if let Err(e) = spawned {
                tracing::error!(error = %e, "failed to start exec time watcher");
            }
        }),
        DEFAULT_OBSERVER_PRIORITY,
    );
}

/// Warn for every output line matching `pattern`
pub fn output_matches(runner: &Arc<JobRunner>, pattern: Regex) {
    let weak: Weak<JobRunner> = Arc::downgrade(runner);
    runner.add_output_observer(
        Arc::new(move |event: &OutputEvent| {
            if !pattern.is_match(&event.output) {
                return;
            }
            if let Some(runner) = weak.upgrade() {
                runner.add_warning(
                    Warn::new(OUTPUT_MATCHES_WARNING)
                        .with_param("pattern", pattern.as_str())
                        .with_param("line", event.output.clone()),
                );
            }
        }),
        DEFAULT_OBSERVER_PRIORITY,
    );
}

#[cfg(test)]
#[path = "warning_tests.rs"]
mod tests;
