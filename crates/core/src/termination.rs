// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Termination status, outcome categories and failure details

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How an instance ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationStatus {
    Completed,
    Stopped,
    Failed,
    Error,
    Timeout,
    InvalidOverlap,
    Rejected,
    /// A required instance was not active
    Unsatisfied,
    /// Stopped while still queued
    Cancelled,
}

/// Category grouping termination statuses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Aborted,
    Rejected,
    Fault,
}

impl TerminationStatus {
    pub const ALL: [TerminationStatus; 9] = [
        TerminationStatus::Completed,
        TerminationStatus::Stopped,
        TerminationStatus::Failed,
        TerminationStatus::Error,
        TerminationStatus::Timeout,
        TerminationStatus::InvalidOverlap,
        TerminationStatus::Rejected,
        TerminationStatus::Unsatisfied,
        TerminationStatus::Cancelled,
    ];

    pub fn outcome(self) -> Outcome {
        match self {
            TerminationStatus::Completed => Outcome::Success,
            TerminationStatus::Stopped | TerminationStatus::Cancelled => Outcome::Aborted,
            TerminationStatus::Timeout
            | TerminationStatus::InvalidOverlap
            | TerminationStatus::Rejected
            | TerminationStatus::Unsatisfied => Outcome::Rejected,
            TerminationStatus::Failed | TerminationStatus::Error => Outcome::Fault,
        }
    }

    pub fn is_success(self) -> bool {
        self.outcome() == Outcome::Success
    }

    pub fn is_fault(self) -> bool {
        self.outcome() == Outcome::Fault
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TerminationStatus::Completed => "COMPLETED",
            TerminationStatus::Stopped => "STOPPED",
            TerminationStatus::Failed => "FAILED",
            TerminationStatus::Error => "ERROR",
            TerminationStatus::Timeout => "TIMEOUT",
            TerminationStatus::InvalidOverlap => "INVALID_OVERLAP",
            TerminationStatus::Rejected => "REJECTED",
            TerminationStatus::Unsatisfied => "UNSATISFIED",
            TerminationStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TerminationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == upper)
            .ok_or_else(|| format!("unknown termination status: {}", s))
    }
}

impl Outcome {
    pub fn statuses(self) -> impl Iterator<Item = TerminationStatus> {
        TerminationStatus::ALL
            .into_iter()
            .filter(move |status| status.outcome() == self)
    }
}

/// Failure detail attached to a fault termination
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub code: String,
    pub reason: String,
}

impl Fault {
    pub const UNEXPECTED_ERROR: &'static str = "UNEXPECTED_ERROR";
    pub const EXECUTION_FAILED: &'static str = "EXECUTION_FAILED";

    pub fn new(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            reason: reason.into(),
        }
    }
}

/// Final status of an instance, set once when its lifecycle reaches the terminal phase
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationInfo {
    pub status: TerminationStatus,
    pub terminated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<Fault>,
}

/// Payload failure reported by a phase step
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{status}: {}", .fault.reason)]
pub struct FailedRun {
    pub status: TerminationStatus,
    pub fault: Fault,
}

impl FailedRun {
    /// Expected operational failure of the payload
    pub fn failed(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: TerminationStatus::Failed,
            fault: Fault::new(code, reason),
        }
    }

    /// Unexpected failure such as a panicking payload
    pub fn unexpected(reason: impl Into<String>) -> Self {
        Self {
            status: TerminationStatus::Error,
            fault: Fault::new(Fault::UNEXPECTED_ERROR, reason),
        }
    }
}
