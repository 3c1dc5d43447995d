// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Matching on job and instance identifiers

use crate::instance::JobInstanceId;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// How a pattern is tested against an identifier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchingStrategy {
    #[default]
    Exact,
    /// Shell-style wildcard: `*` any run of characters, `?` a single character
    FnMatch,
    /// Pattern occurs anywhere in the identifier
    Partial,
    AlwaysTrue,
    AlwaysFalse,
}

impl MatchingStrategy {
    pub fn matches(self, tested: &str, pattern: &str) -> bool {
        match self {
            MatchingStrategy::Exact => tested == pattern,
            MatchingStrategy::FnMatch => glob_regex(pattern)
                .map(|re| re.is_match(tested))
                .unwrap_or(false),
            MatchingStrategy::Partial => tested.contains(pattern),
            MatchingStrategy::AlwaysTrue => true,
            MatchingStrategy::AlwaysFalse => false,
        }
    }
}

fn glob_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    expr.push('$');
    Regex::new(&expr)
}

/// Matches `job_id@instance_id` patterns; an empty side matches anything.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMatchingCriterion {
    pub job_id: String,
    pub instance_id: String,
    /// When false, a match on either identifier is enough
    pub match_both_ids: bool,
    #[serde(default)]
    pub strategy: MatchingStrategy,
}

impl IdMatchingCriterion {
    pub fn new(job_id: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            instance_id: instance_id.into(),
            match_both_ids: true,
            strategy: MatchingStrategy::Exact,
        }
    }

    /// Parse `job@instance`, `job@`, `@instance`, or a bare pattern tested against both ids
    pub fn parse_pattern(pattern: &str, strategy: MatchingStrategy) -> Self {
        match pattern.split_once('@') {
            Some((job_id, instance_id)) => Self {
                job_id: job_id.to_string(),
                instance_id: instance_id.to_string(),
                match_both_ids: true,
                strategy,
            },
            None => Self {
                job_id: pattern.to_string(),
                instance_id: pattern.to_string(),
                match_both_ids: false,
                strategy,
            },
        }
    }

    /// Criterion matching exactly the given instance
    pub fn for_instance(id: &JobInstanceId) -> Self {
        Self::new(id.job_id.clone(), id.instance_id.clone())
    }

    pub fn none_match() -> Self {
        Self {
            job_id: String::new(),
            instance_id: String::new(),
            match_both_ids: true,
            strategy: MatchingStrategy::AlwaysFalse,
        }
    }

    pub fn matches(&self, id: &JobInstanceId) -> bool {
        if self.strategy == MatchingStrategy::AlwaysFalse {
            return false;
        }
        let job = self.job_id.is_empty() || self.strategy.matches(&id.job_id, &self.job_id);
        let instance =
            self.instance_id.is_empty() || self.strategy.matches(&id.instance_id, &self.instance_id);
        if self.match_both_ids {
            job && instance
        } else {
            job || instance
        }
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
