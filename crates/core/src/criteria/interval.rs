// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Matching on lifecycle timestamps
//!
//! Bounds are always held in UTC. Parsed timestamps carrying an offset are
//! converted; timestamps without one are taken as UTC.

use super::CriteriaError;
use crate::lifecycle::Lifecycle;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle timestamp an interval is tested against
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleEvent {
    #[default]
    Created,
    Executed,
    Ended,
}

impl LifecycleEvent {
    pub fn timestamp(self, lifecycle: &Lifecycle) -> Option<DateTime<Utc>> {
        match self {
            LifecycleEvent::Created => lifecycle.created_at(),
            LifecycleEvent::Executed => lifecycle.executed_at(),
            LifecycleEvent::Ended => lifecycle.ended_at(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalCriterion {
    #[serde(default)]
    pub event: LifecycleEvent,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    /// Whether `to` itself is inside the interval
    #[serde(default = "default_include_to")]
    pub include_to: bool,
}

fn default_include_to() -> bool {
    true
}

enum Parsed {
    Instant(DateTime<Utc>),
    Day(NaiveDate),
}

fn parse(value: &str) -> Result<Parsed, CriteriaError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(Parsed::Instant(dt.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Ok(Parsed::Instant(dt.with_timezone(&Utc)));
        }
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Parsed::Instant(dt.and_utc()));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Parsed::Day)
        .map_err(|_| CriteriaError::InvalidTimestamp(value.to_string()))
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

impl IntervalCriterion {
    pub fn new(event: LifecycleEvent, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self {
            event,
            from,
            to,
            include_to: true,
        }
    }

    /// Build from textual bounds.
    ///
    /// A date-only `from` starts at midnight; a date-only `to` covers that whole
    /// day, so it becomes the next midnight, excluded.
    pub fn parse(
        event: LifecycleEvent,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Self, CriteriaError> {
        if from.is_none() && to.is_none() {
            return Err(CriteriaError::EmptyInterval);
        }
        let from = match from.map(parse).transpose()? {
            None => None,
            Some(Parsed::Instant(dt)) => Some(dt),
            Some(Parsed::Day(day)) => Some(start_of(day)),
        };
        let (to, include_to) = match to.map(parse).transpose()? {
            None => (None, true),
            Some(Parsed::Instant(dt)) => (Some(dt), true),
            Some(Parsed::Day(day)) => {
                let next = day.succ_opt().unwrap_or(day);
                (Some(start_of(next)), false)
            }
        };
        Ok(Self {
            event,
            from,
            to,
            include_to,
        })
    }

    /// The UTC day containing `now`
    pub fn today(event: LifecycleEvent, now: DateTime<Utc>) -> Self {
        Self::days_back(event, 0, now)
    }

    /// From midnight `days` days before `now` up to the end of today
    pub fn days_back(event: LifecycleEvent, days: u32, now: DateTime<Utc>) -> Self {
        let today = start_of(now.date_naive());
        Self {
            event,
            from: Some(today - Duration::days(i64::from(days))),
            to: Some(today + Duration::days(1)),
            include_to: false,
        }
    }

    pub fn matches(&self, lifecycle: &Lifecycle) -> bool {
        let Some(checked) = self.event.timestamp(lifecycle) else {
            return false;
        };
        if let Some(from) = self.from {
            if checked < from {
                return false;
            }
        }
        match self.to {
            Some(to) if self.include_to => checked <= to,
            Some(to) => checked < to,
            None => true,
        }
    }
}

#[cfg(test)]
#[path = "interval_tests.rs"]
mod tests;
