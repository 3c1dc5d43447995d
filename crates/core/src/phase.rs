// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phases and their run-state categories

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Coarse category describing what an instance is doing while in a phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    None,
    Created,
    Pending,
    Waiting,
    Evaluating,
    InQueue,
    Executing,
    Ended,
}

impl RunState {
    /// States in which an instance sits until something external lets it continue
    pub fn is_waiting(self) -> bool {
        matches!(self, RunState::Pending | RunState::Waiting | RunState::InQueue)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::None => "NONE",
            RunState::Created => "CREATED",
            RunState::Pending => "PENDING",
            RunState::Waiting => "WAITING",
            RunState::Evaluating => "EVALUATING",
            RunState::InQueue => "IN_QUEUE",
            RunState::Executing => "EXECUTING",
            RunState::Ended => "ENDED",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named stage of an instance lifecycle
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub run_state: RunState,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Phase {
    pub const NONE: &'static str = "NONE";
    pub const INIT: &'static str = "INIT";
    pub const TERMINAL: &'static str = "TERMINAL";

    pub fn new(name: impl Into<String>, run_state: RunState) -> Self {
        Self {
            name: name.into(),
            run_state,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Placeholder for "no phase yet", reported as the previous phase of the first transition
    pub fn none() -> Self {
        Self::new(Self::NONE, RunState::None)
    }

    /// The phase every lifecycle starts in
    pub fn init() -> Self {
        Self::new(Self::INIT, RunState::Created)
    }

    /// The implicit last phase of every lifecycle
    pub fn terminal() -> Self {
        Self::new(Self::TERMINAL, RunState::Ended)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
