// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pj exec [options] <command> [args]` - Run a program as a tracked job instance

use anyhow::{anyhow, Result};
use clap::Args;
use pj_api::{ApiActiveInstances, ApiClient, ApiServer, EventDispatchManager, InstanceRegistry};
use pj_core::{
    Config, FileLocker, InstanceMatchCriteria, MatchingStrategy, OutputEvent, TerminationStatus,
    DEFAULT_OBSERVER_PRIORITY,
};
use pj_engine::warning::{exec_time_exceeded, output_matches};
use pj_engine::{JobRunner, PluginRegistry, ProcessExecution, QueueStep, RunContext};
use pj_storage::{NoPersistence, Persistence};
use regex::Regex;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Args)]
pub struct ExecArgs {
    /// Job ID (defaults to the program name)
    #[arg(long)]
    pub id: Option<String>,

    /// Instance ID (generated when absent)
    #[arg(long)]
    pub instance: Option<String>,

    /// Wait in this pending group until released with `pj release --pending`
    #[arg(short = 'p', long)]
    pub pending: Option<String>,

    /// Give up waiting for release after this long (e.g. "10m")
    #[arg(long, value_parser = humantime::parse_duration, requires = "pending")]
    pub pending_timeout: Option<Duration>,

    /// Reject the run while another instance of the same job is running
    #[arg(short = 'o', long)]
    pub no_overlap: bool,

    /// Run only while an instance matching this pattern is active (wildcards allowed)
    #[arg(long)]
    pub depends_on: Vec<String>,

    /// Queue in this execution group before executing
    #[arg(long)]
    pub queue: Option<String>,

    /// Instances of the execution group allowed to execute at once
    #[arg(long, default_value_t = 1, requires = "queue")]
    pub max_executions: u32,

    /// Warn when execution takes longer than this (e.g. "5m")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub warn_time: Vec<Duration>,

    /// Warn when an output line matches this regular expression
    #[arg(long, value_parser = parse_regex)]
    pub warn_output: Vec<Regex>,

    /// Instance parameter (key=value)
    #[arg(short = 'a', long = "param", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,

    /// Do not print the program output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Program and its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid key=value: no `=` found in `{s}`"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn parse_regex(s: &str) -> Result<Regex, String> {
    Regex::new(s).map_err(|e| e.to_string())
}

/// Job ID derived from the program path
fn default_job_id(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

pub async fn exec(args: ExecArgs, config: &Config) -> Result<ExitCode> {
    let execution = ProcessExecution::from_command_line(&args.command)
        .ok_or_else(|| anyhow!("no command to execute"))?;
    let job_id = match args.id {
        Some(id) => id,
        None => default_job_id(&args.command[0]),
    };

    let mut builder = JobRunner::builder(job_id.clone()).output_config(config.output.clone());
    if let Some(instance) = args.instance {
        builder = builder.instance_id(instance);
    }
    for (key, value) in args.params {
        builder = builder.param(key, value);
    }
    if let Some(group) = args.pending {
        builder = builder.pending_group(group, args.pending_timeout);
    }
    if !args.depends_on.is_empty() {
        let dependency = InstanceMatchCriteria::parse_patterns(
            args.depends_on.iter().map(String::as_str),
            MatchingStrategy::FnMatch,
        );
        let instances = ApiActiveInstances::new(
            ApiClient::from_config(&config.api),
            tokio::runtime::Handle::current(),
        );
        builder = builder.depends_on(dependency, Arc::new(instances));
    }
    if args.no_overlap {
        let locker = Arc::new(FileLocker::new(config.lock.clone()));
        builder = builder.no_overlap(locker, job_id);
    }
    if let Some(group) = args.queue {
        let locker = Arc::new(FileLocker::new(config.lock.clone()));
        builder = builder.execution_queue(QueueStep::new(locker, group, args.max_executions)?);
    }
    let runner = Arc::new(builder.build(Arc::new(execution)));

    if !args.quiet {
        runner.add_output_observer(
            Arc::new(|event: &OutputEvent| {
                if event.is_error {
                    eprintln!("{}", event.output);
                } else {
                    println!("{}", event.output);
                }
            }),
            DEFAULT_OBSERVER_PRIORITY,
        );
    }
    for threshold in args.warn_time {
        exec_time_exceeded(&runner, threshold);
    }
    for pattern in args.warn_output {
        output_matches(&runner, pattern);
    }

    let registry = Arc::new(InstanceRegistry::new());
    let mut context =
        RunContext::new(open_persistence(config)).with_manager("api", registry.clone());
    match EventDispatchManager::for_socket_dir(&config.api.socket_dir) {
        Ok(events) => context.add_manager("events", Arc::new(events)),
        Err(e) => tracing::warn!(error = %e, "events will not be broadcast for this instance"),
    }
    for (name, plugin) in PluginRegistry::with_builtins().create(&config.plugins.enabled, config) {
        context.add_manager(name, plugin);
    }

    let (shutdown, shutdown_rx) = oneshot::channel::<()>();
    let server = match ApiServer::bind(&config.api.socket_dir, registry) {
        Ok(server) => Some(tokio::spawn(server.serve(async {
            let _ = shutdown_rx.await;
        }))),
        Err(e) => {
            tracing::warn!(error = %e, "API not available for this instance");
            None
        }
    };

    // SIGINT already reached the child through the terminal
    let interrupted = Arc::clone(&runner);
    ctrlc::set_handler(move || interrupted.interrupt())?;

    let run = tokio::task::spawn_blocking(move || {
        let run = context.run(runner);
        context.close();
        run
    })
    .await??;

    let _ = shutdown.send(());
    if let Some(server) = server {
        let _ = server.await;
    }

    let Some(termination) = run.termination else {
        return Err(anyhow!("instance {} ended without termination", run.metadata.id));
    };
    if termination.status == TerminationStatus::Completed {
        return Ok(ExitCode::SUCCESS);
    }
    match &termination.fault {
        Some(fault) => eprintln!(
            "pj: {} {}: {}",
            run.metadata.id, termination.status, fault.reason
        ),
        None => eprintln!("pj: {} {}", run.metadata.id, termination.status),
    }
    Ok(ExitCode::FAILURE)
}

fn open_persistence(config: &Config) -> Box<dyn Persistence> {
    pj_storage::open(&config.persistence).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "history not available, run will not be recorded");
        Box::new(NoPersistence)
    })
}
