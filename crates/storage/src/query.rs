// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::stats::execution_time;
use pj_core::{InstanceMatchCriteria, JobRun};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortCriteria {
    #[default]
    Created,
    Ended,
    Time,
}

impl SortCriteria {
    fn key(self, run: &JobRun) -> Option<i64> {
        match self {
            SortCriteria::Created => run.lifecycle.created_at().map(|t| t.timestamp_micros()),
            SortCriteria::Ended => run.lifecycle.ended_at().map(|t| t.timestamp_micros()),
            SortCriteria::Time => execution_time(run).and_then(|d| d.num_microseconds()),
        }
    }
}

/// Selection, ordering and paging of stored instances
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceQuery {
    pub criteria: InstanceMatchCriteria,
    pub sort: SortCriteria,
    pub asc: bool,
    pub limit: Option<usize>,
    pub offset: usize,
    /// Only the most recently created instance of each job
    pub last: bool,
}

impl Default for InstanceQuery {
    fn default() -> Self {
        Self {
            criteria: InstanceMatchCriteria::all(),
            sort: SortCriteria::Created,
            asc: true,
            limit: None,
            offset: 0,
            last: false,
        }
    }
}

impl InstanceQuery {
    pub fn new(criteria: InstanceMatchCriteria) -> Self {
        Self {
            criteria,
            ..Self::default()
        }
    }

    pub fn sorted_by(mut self, sort: SortCriteria, asc: bool) -> Self {
        self.sort = sort;
        self.asc = asc;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn last_per_job(mut self) -> Self {
        self.last = true;
        self
    }

    /// Apply the query to records in storage order
    pub fn apply(&self, runs: Vec<JobRun>) -> Vec<JobRun> {
        let mut selected: Vec<JobRun> = runs
            .into_iter()
            .filter(|run| self.criteria.matches(run))
            .collect();

        if self.last {
            let mut latest: HashMap<String, usize> = HashMap::new();
            for (index, run) in selected.iter().enumerate() {
                let replace = match latest.get(run.job_id()) {
                    Some(&current) => {
                        selected[current].lifecycle.created_at() <= run.lifecycle.created_at()
                    }
                    None => true,
                };
                if replace {
                    latest.insert(run.job_id().to_string(), index);
                }
            }
            let mut keep: Vec<usize> = latest.into_values().collect();
            keep.sort_unstable();
            selected = keep.into_iter().map(|i| selected[i].clone()).collect();
        }

        // Records without a key (e.g. never ended) sort first in ascending order
        if self.asc {
            selected.sort_by_key(|run| self.sort.key(run));
        } else {
            selected.sort_by_key(|run| Reverse(self.sort.key(run)));
        }

        let paged = selected.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => paged.take(limit).collect(),
            None => paged.collect(),
        }
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
