// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot builders shared by the storage tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use pj_core::{
    JobInstanceId, JobInstanceMetadata, JobRun, Lifecycle, Phase, PhaseRun, RunState,
    TerminationInfo, TerminationStatus,
};

pub fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
}

/// A finished run created `created` minutes after [`base`], executing for
/// `executing` minutes and then ending with `status`
pub fn finished(
    job: &str,
    instance: &str,
    created: i64,
    executing: i64,
    status: TerminationStatus,
) -> JobRun {
    let start = base() + Duration::minutes(created);
    let exec = start + Duration::minutes(1);
    let end = exec + Duration::minutes(executing);
    let lifecycle = Lifecycle::from_runs([
        PhaseRun::open(Phase::init(), start),
        PhaseRun::open(Phase::new("EXEC", RunState::Executing), exec),
        PhaseRun::open(Phase::terminal(), end),
    ])
    .unwrap();
    let mut run = JobRun::new(
        JobInstanceMetadata::new(JobInstanceId::new(job, instance)),
        lifecycle,
    );
    run.termination = Some(TerminationInfo {
        status,
        terminated_at: end,
        fault: None,
    });
    run
}

/// A run rejected before it reached execution
pub fn rejected(job: &str, instance: &str, created: i64) -> JobRun {
    let start = base() + Duration::minutes(created);
    let lifecycle = Lifecycle::from_runs([
        PhaseRun::open(Phase::init(), start),
        PhaseRun::open(Phase::terminal(), start + Duration::seconds(1)),
    ])
    .unwrap();
    let mut run = JobRun::new(
        JobInstanceMetadata::new(JobInstanceId::new(job, instance)),
        lifecycle,
    );
    run.termination = Some(TerminationInfo {
        status: TerminationStatus::InvalidOverlap,
        terminated_at: start + Duration::seconds(1),
        fault: None,
    });
    run
}
