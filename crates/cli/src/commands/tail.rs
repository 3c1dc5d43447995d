// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pj tail [INSTANCE]` - Show the last output lines of active instances

use super::{criteria, follow};
use crate::client::{api_client, report_errors};
use anyhow::Result;
use clap::Args;
use pj_api::InstanceDetail;
use pj_core::{
    Config, InstanceMatchCriteria, MatchingStrategy, OutputEvent, Receiver,
    DEFAULT_OBSERVER_PRIORITY,
};
use std::sync::Arc;

#[derive(Args)]
pub struct TailArgs {
    /// Instance filter (substring of job or instance ID, or JOB@INSTANCE)
    pub instance: Option<String>,

    /// Number of lines per instance
    #[arg(short = 'n', long)]
    pub lines: Option<usize>,

    /// Keep printing new output until Ctrl+C
    #[arg(short = 'f', long)]
    pub follow: bool,
}

pub async fn tail(args: TailArgs, config: &Config) -> Result<()> {
    let criteria = criteria(args.instance.as_deref(), MatchingStrategy::Partial);
    if args.follow {
        return follow(config, output_receiver(criteria)).await;
    }

    let response = api_client(config).tail(criteria, args.lines).await?;
    report_errors(&response.errors);
    for result in &response.instances {
        if let InstanceDetail::Tail { lines } = &result.detail {
            println!("==> {} <==", result.instance.id());
            for line in lines {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn output_receiver(criteria: InstanceMatchCriteria) -> Receiver {
    let receiver = Receiver::new();
    let id_criteria = criteria.id_criteria;
    receiver.outputs.add_observer(
        Arc::new(move |event: &OutputEvent| {
            let id = &event.metadata.id;
            if id_criteria.is_empty() || id_criteria.iter().any(|c| c.matches(id)) {
                println!("{}", event.output);
            }
        }),
        DEFAULT_OBSERVER_PRIORITY,
    );
    receiver
}
