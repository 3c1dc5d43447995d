// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job instance identity, metadata and point-in-time snapshots

use crate::lifecycle::Lifecycle;
use crate::phase::{Phase, RunState};
use crate::termination::{TerminationInfo, TerminationStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// System parameter naming the group used to batch-release waiting instances
pub const PENDING_GROUP_PARAM: &str = "pending_group";

/// System parameters of an instance limited by an execution queue
pub const EXECUTION_GROUP_PARAM: &str = "execution_group";
pub const MAX_EXECUTIONS_PARAM: &str = "max_executions";

/// Identity of one run of a job
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobInstanceId {
    pub job_id: String,
    pub instance_id: String,
}

impl JobInstanceId {
    pub fn new(job_id: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            instance_id: instance_id.into(),
        }
    }
}

impl fmt::Display for JobInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.job_id, self.instance_id)
    }
}

/// Immutable description of an instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInstanceMetadata {
    pub id: JobInstanceId,
    #[serde(default)]
    pub user_params: BTreeMap<String, String>,
    #[serde(default)]
    pub system_params: BTreeMap<String, String>,
}

impl JobInstanceMetadata {
    pub fn new(id: JobInstanceId) -> Self {
        Self {
            id,
            user_params: BTreeMap::new(),
            system_params: BTreeMap::new(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.id.job_id
    }

    pub fn instance_id(&self) -> &str {
        &self.id.instance_id
    }

    pub fn pending_group(&self) -> Option<&str> {
        self.system_params
            .get(PENDING_GROUP_PARAM)
            .map(String::as_str)
    }
}

/// A warning raised against a running instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warn {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl Warn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Point-in-time copy of an instance, disconnected from the live runner
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
    pub metadata: JobInstanceMetadata,
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub termination: Option<TerminationInfo>,
    #[serde(default)]
    pub last_output: Vec<String>,
    #[serde(default)]
    pub error_output: Vec<String>,
    /// Count per warning name
    #[serde(default)]
    pub warnings: BTreeMap<String, u32>,
}

impl JobRun {
    pub fn new(metadata: JobInstanceMetadata, lifecycle: Lifecycle) -> Self {
        Self {
            metadata,
            lifecycle,
            termination: None,
            last_output: Vec::new(),
            error_output: Vec::new(),
            warnings: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &JobInstanceId {
        &self.metadata.id
    }

    pub fn job_id(&self) -> &str {
        self.metadata.job_id()
    }

    pub fn instance_id(&self) -> &str {
        self.metadata.instance_id()
    }

    pub fn run_state(&self) -> RunState {
        self.lifecycle.run_state()
    }

    pub fn status(&self) -> Option<TerminationStatus> {
        self.termination.as_ref().map(|t| t.status)
    }

    pub fn warning_count(&self) -> u32 {
        self.warnings.values().sum()
    }
}

/// A phase transition of an instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub job_run: JobRun,
    pub previous_phase: Phase,
    pub new_phase: Phase,
    pub ordinal: usize,
}

/// A line of output produced by an instance payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub metadata: JobInstanceMetadata,
    pub phase: Phase,
    pub output: String,
    pub is_error: bool,
}

/// A warning added to an instance, with the running count for its name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningEvent {
    pub job_run: JobRun,
    pub warning: Warn,
    pub count: u32,
}
