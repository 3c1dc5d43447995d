// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pj ps [INSTANCE]` - List active instances of all processes

use super::{criteria, phase_name};
use crate::client::{api_client, report_errors};
use crate::output::{format_time, print_json, print_table, OutputFormat};
use anyhow::Result;
use clap::Args;
use pj_core::{Config, JobRun, MatchingStrategy};

#[derive(Args)]
pub struct PsArgs {
    /// Instance filter (substring of job or instance ID, or JOB@INSTANCE)
    pub instance: Option<String>,

    #[arg(short = 'f', long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

pub async fn ps(args: PsArgs, config: &Config) -> Result<()> {
    let criteria = criteria(args.instance.as_deref(), MatchingStrategy::Partial);
    let response = api_client(config).list(criteria).await?;
    report_errors(&response.errors);

    let runs: Vec<JobRun> = response.instances.into_iter().map(|r| r.instance).collect();
    match args.format {
        OutputFormat::Json => print_json(&runs),
        OutputFormat::Table if runs.is_empty() => println!("No active instances"),
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = runs.iter().map(row).collect();
            print_table(
                &["JOB ID", "INSTANCE ID", "CREATED", "PHASE", "STATE", "WARNINGS"],
                &rows,
            );
        }
    }
    Ok(())
}

fn row(run: &JobRun) -> Vec<String> {
    vec![
        run.job_id().to_string(),
        run.instance_id().to_string(),
        format_time(run.lifecycle.created_at()),
        phase_name(run),
        run.run_state().to_string(),
        run.warning_count().to_string(),
    ]
}
