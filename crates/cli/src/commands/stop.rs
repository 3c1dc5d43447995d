// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pj stop <INSTANCE>` - Stop running instances

use super::criteria;
use crate::client::{api_client, report_errors};
use anyhow::{bail, Result};
use clap::Args;
use pj_api::InstanceDetail;
use pj_core::{Config, MatchingStrategy};

#[derive(Args)]
pub struct StopArgs {
    /// Instance to stop (`*` and `?` wildcards, or JOB@INSTANCE)
    pub instance: String,

    /// Stop every match when the filter matches more than one instance
    #[arg(long)]
    pub all: bool,
}

pub async fn stop(args: StopArgs, config: &Config) -> Result<()> {
    let criteria = criteria(Some(&args.instance), MatchingStrategy::FnMatch);
    let client = api_client(config);

    if !args.all {
        let matching = client.list(criteria.clone()).await?;
        if matching.instances.len() > 1 {
            let ids: Vec<String> = matching
                .instances
                .iter()
                .map(|r| r.instance.id().to_string())
                .collect();
            bail!(
                "{} instances match, use --all to stop them all: {}",
                ids.len(),
                ids.join(", ")
            );
        }
    }

    let response = client.stop(criteria).await?;
    report_errors(&response.errors);
    for result in &response.instances {
        if let InstanceDetail::Stop { result: stopped } = result.detail {
            println!("{} {}", result.instance.id(), stopped.as_str());
        }
    }
    if response.instances.is_empty() {
        println!("No matching instances");
    }
    Ok(())
}
