// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Matching on termination status and outcome

use crate::termination::{Outcome, TerminationInfo, TerminationStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Matches terminated instances whose status is listed or whose outcome is listed.
/// With both sets empty, any terminated instance matches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationCriterion {
    #[serde(default)]
    pub statuses: BTreeSet<TerminationStatus>,
    #[serde(default)]
    pub outcomes: BTreeSet<Outcome>,
}

impl TerminationCriterion {
    pub fn statuses(statuses: impl IntoIterator<Item = TerminationStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            outcomes: BTreeSet::new(),
        }
    }

    pub fn outcomes(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            statuses: BTreeSet::new(),
            outcomes: outcomes.into_iter().collect(),
        }
    }

    pub fn matches(&self, termination: Option<&TerminationInfo>) -> bool {
        let Some(info) = termination else {
            return false;
        };
        if self.statuses.is_empty() && self.outcomes.is_empty() {
            return true;
        }
        self.statuses.contains(&info.status) || self.outcomes.contains(&info.status.outcome())
    }
}
