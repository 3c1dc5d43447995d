// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pj history [ID]` - Show, summarize or remove finished instances

use super::criteria;
use crate::output::{format_duration, format_time, print_json, print_table, OutputFormat};
use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Args, ValueEnum};
use pj_core::{Config, InstanceMatchCriteria, IntervalCriterion, JobRun, LifecycleEvent, MatchingStrategy};
use pj_storage::{InstanceQuery, JobStats, Persistence, SortCriteria};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum SortArg {
    #[default]
    Created,
    Ended,
    Time,
}

impl From<SortArg> for SortCriteria {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Created => SortCriteria::Created,
            SortArg::Ended => SortCriteria::Ended,
            SortArg::Time => SortCriteria::Time,
        }
    }
}

#[derive(Args)]
pub struct HistoryArgs {
    /// Job or instance filter (substring, or JOB@INSTANCE)
    pub id: Option<String>,

    /// Only instances created today (UTC)
    #[arg(short = 'T', long, conflicts_with_all = ["since", "until"])]
    pub today: bool,

    /// Only instances created at or after this date/time
    #[arg(short = 'S', long)]
    pub since: Option<String>,

    /// Only instances created at or before this date/time
    #[arg(short = 'U', long)]
    pub until: Option<String>,

    /// Number of entries to show
    #[arg(short = 'n', long)]
    pub lines: Option<usize>,

    /// Only the latest instance of each job
    #[arg(short = 'L', long)]
    pub last: bool,

    /// Oldest first
    #[arg(short = 'a', long, alias = "ascending")]
    pub asc: bool,

    #[arg(short = 's', long, value_enum, default_value_t)]
    pub sort: SortArg,

    /// Per-job statistics instead of individual instances
    #[arg(long, conflicts_with = "remove")]
    pub stats: bool,

    /// Delete the matching instances from the history
    #[arg(long, requires = "id")]
    pub remove: bool,

    #[arg(short = 'f', long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

pub fn history(args: HistoryArgs, config: &Config) -> Result<()> {
    let persistence = pj_storage::open(&config.persistence)?;
    if !persistence.is_enabled() {
        println!("History is disabled (persistence.enabled = false)");
        return Ok(());
    }
    let criteria = build_criteria(&args)?;

    let result = if args.remove {
        remove(persistence.as_ref(), &criteria)
    } else if args.stats {
        stats(persistence.as_ref(), &criteria, args.format)
    } else {
        list(persistence.as_ref(), criteria, &args)
    };
    persistence.close()?;
    result
}

fn build_criteria(args: &HistoryArgs) -> Result<InstanceMatchCriteria> {
    let mut criteria = criteria(args.id.as_deref(), MatchingStrategy::Partial);
    if args.today {
        criteria = criteria.with_interval(IntervalCriterion::today(LifecycleEvent::Created, Utc::now()));
    } else if args.since.is_some() || args.until.is_some() {
        criteria = criteria.with_interval(IntervalCriterion::parse(
            LifecycleEvent::Created,
            args.since.as_deref(),
            args.until.as_deref(),
        )?);
    }
    Ok(criteria)
}

fn remove(persistence: &dyn Persistence, criteria: &InstanceMatchCriteria) -> Result<()> {
    if criteria.is_empty() {
        bail!("refusing to remove the whole history without a filter");
    }
    let removed = persistence.remove_instances(criteria)?;
    println!("Removed {} instance(s)", removed);
    Ok(())
}

fn stats(
    persistence: &dyn Persistence,
    criteria: &InstanceMatchCriteria,
    format: OutputFormat,
) -> Result<()> {
    let stats = persistence.read_stats(criteria)?;
    match format {
        OutputFormat::Json => print_json(&stats),
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = stats.iter().map(stats_row).collect();
            print_table(
                &[
                    "JOB ID", "RUNS", "FIRST CREATED", "LAST CREATED", "FASTEST", "AVERAGE",
                    "SLOWEST", "LAST TIME", "LAST STATUS", "FAILED", "WARNINGS",
                ],
                &rows,
            );
        }
    }
    Ok(())
}

fn stats_row(stats: &JobStats) -> Vec<String> {
    vec![
        stats.job_id.clone(),
        stats.count.to_string(),
        format_time(stats.first_created),
        format_time(stats.last_created),
        format_duration(stats.fastest_time),
        format_duration(stats.average_time),
        format_duration(stats.slowest_time),
        format_duration(stats.last_time),
        stats
            .last_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string()),
        stats.failed_count.to_string(),
        stats.warning_count.to_string(),
    ]
}

fn list(persistence: &dyn Persistence, criteria: InstanceMatchCriteria, args: &HistoryArgs) -> Result<()> {
    let mut query = InstanceQuery::new(criteria).sorted_by(args.sort.into(), args.asc);
    if let Some(lines) = args.lines {
        query = query.with_limit(lines);
    }
    if args.last {
        query = query.last_per_job();
    }
    let runs = persistence.read_instances(&query)?;

    match args.format {
        OutputFormat::Json => print_json(&runs),
        OutputFormat::Table if runs.is_empty() => println!("No history"),
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = runs.iter().map(run_row).collect();
            print_table(
                &["JOB ID", "INSTANCE ID", "CREATED", "ENDED", "EXEC TIME", "STATUS", "WARNINGS", "RESULT"],
                &rows,
            );
        }
    }
    Ok(())
}

fn execution_time(run: &JobRun) -> Option<Duration> {
    let started = run.lifecycle.executed_at()?;
    let ended = run.lifecycle.ended_at()?;
    (ended - started).to_std().ok()
}

fn run_row(run: &JobRun) -> Vec<String> {
    let termination = run.termination.as_ref();
    vec![
        run.job_id().to_string(),
        run.instance_id().to_string(),
        format_time(run.lifecycle.created_at()),
        format_time(run.lifecycle.ended_at()),
        format_duration(execution_time(run)),
        termination
            .map(|t| t.status.to_string())
            .unwrap_or_else(|| "-".to_string()),
        run.warning_count().to_string(),
        termination
            .and_then(|t| t.fault.as_ref())
            .map(|f| f.reason.clone())
            .unwrap_or_default(),
    ]
}
