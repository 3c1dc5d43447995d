// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod exec;
pub mod history;
pub mod listen;
pub mod ps;
pub mod release;
pub mod stop;
pub mod tail;

use anyhow::Result;
use pj_api::EventListener;
use pj_core::{Config, InstanceMatchCriteria, JobRun, MatchingStrategy, Receiver};

/// Criteria for an optional instance pattern (`JOB`, `INSTANCE` or `JOB@INSTANCE`)
pub fn criteria(pattern: Option<&str>, strategy: MatchingStrategy) -> InstanceMatchCriteria {
    match pattern {
        Some(pattern) => InstanceMatchCriteria::parse_pattern(pattern, strategy),
        None => InstanceMatchCriteria::all(),
    }
}

/// Current phase name of a snapshot, `-` before the first transition
pub fn phase_name(run: &JobRun) -> String {
    run.lifecycle
        .current_phase()
        .map(|p| p.name.clone())
        .unwrap_or_else(|| "-".to_string())
}

/// Deliver events from other processes to `receiver` until Ctrl+C
pub async fn follow(config: &Config, receiver: Receiver) -> Result<()> {
    let listener = EventListener::bind(&config.api.socket_dir)?;
    let socket = listener.socket_path().to_path_buf();

    let mut delivery = tokio::task::spawn_blocking(move || receiver.run(&listener));
    tokio::select! {
        result = &mut delivery => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            // The blocking thread keeps the listener; remove its socket here
            let _ = std::fs::remove_file(&socket);
        }
    }
    Ok(())
}
