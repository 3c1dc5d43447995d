// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pj listen [INSTANCE]` - Print phase transitions and warnings as they happen

use super::{criteria, follow};
use crate::output::{print_json, OutputFormat};
use anyhow::Result;
use clap::Args;
use pj_core::{
    Config, MatchingStrategy, Receiver, TransitionEvent, WarningEvent, DEFAULT_OBSERVER_PRIORITY,
};
use std::sync::Arc;

#[derive(Args)]
pub struct ListenArgs {
    /// Instance filter (substring of job or instance ID, or JOB@INSTANCE)
    pub instance: Option<String>,

    #[arg(short = 'f', long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

pub async fn listen(args: ListenArgs, config: &Config) -> Result<()> {
    let criteria = Arc::new(criteria(args.instance.as_deref(), MatchingStrategy::Partial));
    let receiver = Receiver::new();
    let format = args.format;

    let matching = Arc::clone(&criteria);
    receiver.transitions.add_observer(
        Arc::new(move |event: &TransitionEvent| {
            if matching.matches(&event.job_run) {
                print_transition(event, format);
            }
        }),
        DEFAULT_OBSERVER_PRIORITY,
    );
    receiver.warnings.add_observer(
        Arc::new(move |event: &WarningEvent| {
            if criteria.matches(&event.job_run) {
                print_warning(event, format);
            }
        }),
        DEFAULT_OBSERVER_PRIORITY,
    );

    follow(config, receiver).await
}

fn print_transition(event: &TransitionEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(event),
        OutputFormat::Table => {
            let run = &event.job_run;
            let mut line = format!(
                "{}  {} -> {}  {}",
                run.id(),
                event.previous_phase.name,
                event.new_phase.name,
                event.new_phase.run_state
            );
            if let Some(termination) = &run.termination {
                line.push_str(&format!("  {}", termination.status));
            }
            println!("{}", line);
        }
    }
}

fn print_warning(event: &WarningEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(event),
        OutputFormat::Table => println!(
            "{}  warning {} (x{})",
            event.job_run.id(),
            event.warning.name,
            event.count
        ),
    }
}

