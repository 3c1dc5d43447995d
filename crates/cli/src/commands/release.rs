// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pj release` - Let waiting instances continue

use super::criteria;
use crate::client::{api_client, report_errors};
use anyhow::{bail, Result};
use clap::Args;
use pj_api::InstanceDetail;
use pj_core::{Config, MatchingStrategy};

#[derive(Args)]
pub struct ReleaseArgs {
    /// Release the instances waiting in this pending group
    #[arg(short = 'p', long)]
    pub pending: Option<String>,

    /// Instance filter (`*` and `?` wildcards, or JOB@INSTANCE)
    pub instance: Option<String>,
}

pub async fn release(args: ReleaseArgs, config: &Config) -> Result<()> {
    if args.pending.is_none() && args.instance.is_none() {
        bail!("nothing to release: give an INSTANCE filter or --pending GROUP");
    }
    let criteria = criteria(args.instance.as_deref(), MatchingStrategy::FnMatch);
    let client = api_client(config);
    let response = match &args.pending {
        Some(group) => client.release_pending(group, criteria).await?,
        None => client.release_waiting(criteria).await?,
    };
    report_errors(&response.errors);

    for result in &response.instances {
        if let InstanceDetail::Release { result: released } = result.detail {
            println!("{} {}", result.instance.id(), released.as_str());
        }
    }
    if response.instances.is_empty() {
        println!("No matching instances");
    }
    Ok(())
}
