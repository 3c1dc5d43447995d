// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! pj-engine: runnable job instances

pub mod context;
pub mod execution;
mod output;
pub mod plugin;
pub mod runner;
pub mod steps;
pub mod warning;

pub use context::RunContext;
pub use execution::{
    CallableExecution, Execution, ExecutionError, OutputSink, ProcessExecution, StopFlag,
    TracedExecution,
};
pub use plugin::{InstanceManager, LogPlugin, PluginError, PluginRegistry};
pub use runner::{JobRunner, JobRunnerBuilder, ReleaseResult};
pub use steps::{
    ActiveInstances, ApprovalStep, DependencyStep, ExecutingStep, LookupError, NoOverlapStep,
    QueueError, QueueStep,
};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use execution::{FakeExecution, FakeOutcome};
