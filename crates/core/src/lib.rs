// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! pj-core: phase-based job execution model
//!
//! This crate provides:
//! - Phases, lifecycles and termination statuses
//! - The phaser state machine that drives a job instance through its phases
//! - Prioritized observer notification and event dispatch
//! - Instance matching criteria
//! - File-based coordination locks and typed configuration

pub mod clock;
pub mod config;
pub mod coordination;
pub mod criteria;
pub mod dispatch;
pub mod error;
pub mod id;
pub mod instance;
pub mod lifecycle;
pub mod notification;
pub mod phase;
pub mod phaser;
pub mod termination;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{Config, ConfigError};
pub use coordination::{FileLocker, LockConfig, LockError, LockGuard, Locker};
pub use criteria::{
    CriteriaError, IdMatchingCriterion, InstanceMatchCriteria, IntervalCriterion, LifecycleEvent,
    MatchingStrategy, TerminationCriterion,
};
pub use dispatch::{ChannelError, Dispatcher, InstanceEvent, MessageChannel, MessageSource, Receiver};
pub use error::InvalidStateError;
pub use id::{IdGen, SequentialIdGen, TimestampIdGen};
pub use instance::{
    JobInstanceId, JobInstanceMetadata, JobRun, OutputEvent, TransitionEvent, Warn, WarningEvent,
};
pub use lifecycle::{Lifecycle, PhaseRun};
pub use notification::{
    Notification, OutputObserver, TransitionObserver, WarningObserver, DEFAULT_OBSERVER_PRIORITY,
};
pub use phase::{Phase, RunState};
pub use phaser::{PhaseStep, Phaser, StopSignal, Transition, TransitionHook};
pub use termination::{FailedRun, Fault, Outcome, TerminationInfo, TerminationStatus};
