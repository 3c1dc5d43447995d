// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Criteria for selecting job instances
//!
//! Individual criteria are pure predicates. [`InstanceMatchCriteria`] combines
//! them: any listed id criterion may match, every other filter must match, and
//! an absent filter matches everything.

mod id;
mod interval;
mod termination;

pub use id::{IdMatchingCriterion, MatchingStrategy};
pub use interval::{IntervalCriterion, LifecycleEvent};
pub use termination::TerminationCriterion;

use crate::instance::JobRun;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CriteriaError {
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("interval needs at least one bound")]
    EmptyInterval,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMatchCriteria {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub id_criteria: Vec<IdMatchingCriterion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interval_criteria: Vec<IntervalCriterion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_criterion: Option<TerminationCriterion>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub job_ids: BTreeSet<String>,
}

impl InstanceMatchCriteria {
    /// Criteria matching every instance
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parse_pattern(pattern: &str, strategy: MatchingStrategy) -> Self {
        Self::default().with_id(IdMatchingCriterion::parse_pattern(pattern, strategy))
    }

    /// Any of the patterns may match
    pub fn parse_patterns<'a>(
        patterns: impl IntoIterator<Item = &'a str>,
        strategy: MatchingStrategy,
    ) -> Self {
        Self {
            id_criteria: patterns
                .into_iter()
                .map(|p| IdMatchingCriterion::parse_pattern(p, strategy))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, criterion: IdMatchingCriterion) -> Self {
        self.id_criteria.push(criterion);
        self
    }

    pub fn with_interval(mut self, criterion: IntervalCriterion) -> Self {
        self.interval_criteria.push(criterion);
        self
    }

    pub fn with_termination(mut self, criterion: TerminationCriterion) -> Self {
        self.termination_criterion = Some(criterion);
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_ids.insert(job_id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.id_criteria.is_empty()
            && self.interval_criteria.is_empty()
            && self.termination_criterion.is_none()
            && self.job_ids.is_empty()
    }

    pub fn matches(&self, run: &JobRun) -> bool {
        let id_ok =
            self.id_criteria.is_empty() || self.id_criteria.iter().any(|c| c.matches(run.id()));
        let interval_ok = self
            .interval_criteria
            .iter()
            .all(|c| c.matches(&run.lifecycle));
        let termination_ok = self
            .termination_criterion
            .as_ref()
            .map(|c| c.matches(run.termination.as_ref()))
            .unwrap_or(true);
        let job_ok = self.job_ids.is_empty() || self.job_ids.contains(run.job_id());
        id_ok && interval_ok && termination_ok && job_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{JobInstanceId, JobInstanceMetadata};
    use crate::lifecycle::{Lifecycle, PhaseRun};
    use crate::phase::Phase;
    use crate::termination::{TerminationInfo, TerminationStatus};
    use chrono::{TimeZone, Utc};

    fn run(job: &str, instance: &str, status: Option<TerminationStatus>) -> JobRun {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let lifecycle = Lifecycle::from_runs([PhaseRun::open(Phase::init(), created)]).unwrap();
        let mut run = JobRun::new(
            JobInstanceMetadata::new(JobInstanceId::new(job, instance)),
            lifecycle,
        );
        run.termination = status.map(|status| TerminationInfo {
            status,
            terminated_at: created,
            fault: None,
        });
        run
    }

    #[test]
    fn empty_criteria_match_all() {
        let c = InstanceMatchCriteria::all();
        assert!(c.is_empty());
        assert!(c.matches(&run("a", "1", None)));
    }

    #[test]
    fn id_criteria_are_alternatives() {
        let c = InstanceMatchCriteria::parse_patterns(["a@", "@2"], MatchingStrategy::Exact);
        assert!(c.matches(&run("a", "1", None)));
        assert!(c.matches(&run("b", "2", None)));
        assert!(!c.matches(&run("b", "1", None)));
    }

    #[test]
    fn all_filters_must_match() {
        let c = InstanceMatchCriteria::parse_pattern("a", MatchingStrategy::Exact)
            .with_termination(TerminationCriterion::statuses([TerminationStatus::Completed]));
        assert!(c.matches(&run("a", "1", Some(TerminationStatus::Completed))));
        assert!(!c.matches(&run("a", "1", Some(TerminationStatus::Failed))));
        assert!(!c.matches(&run("b", "1", Some(TerminationStatus::Completed))));

        let c = InstanceMatchCriteria::all()
            .with_job_id("a")
            .with_interval(IntervalCriterion::parse(LifecycleEvent::Created, Some("2024-03-02"), None).unwrap());
        assert!(!c.matches(&run("a", "1", None)));
    }

    #[test]
    fn serializes_compactly() {
        let c = InstanceMatchCriteria::parse_pattern("a@b", MatchingStrategy::Exact);
        let json = serde_json::to_string(&c).unwrap();
        assert!(!json.contains("job_ids"));
        let back: InstanceMatchCriteria = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
        let empty: InstanceMatchCriteria = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}
