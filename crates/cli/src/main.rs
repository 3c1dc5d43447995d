// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pj - run programs as tracked job instances

mod client;
mod commands;
mod logging;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{exec, history, listen, ps, release, stop, tail};
use pj_core::Config;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pj", version, about = "phasejob - run, watch and control job instances")]
struct Cli {
    /// Configuration file (defaults to $PJ_CONFIG or the user config directory)
    #[arg(short = 'C', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a program as a job instance
    Exec(exec::ExecArgs),
    /// List active instances
    Ps(ps::PsArgs),
    /// Release waiting instances
    Release(release::ReleaseArgs),
    /// Stop running instances
    Stop(stop::StopArgs),
    /// Show the last output of active instances
    Tail(tail::TailArgs),
    /// Print phase transitions of instances in other processes
    Listen(listen::ListenArgs),
    /// Show finished instances
    History(history::HistoryArgs),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    let _log_guard = logging::init(&config.log);

    match cli.command {
        Commands::Exec(args) => return exec::exec(args, &config).await,
        Commands::Ps(args) => ps::ps(args, &config).await?,
        Commands::Release(args) => release::release(args, &config).await?,
        Commands::Stop(args) => stop::stop(args, &config).await?,
        Commands::Tail(args) => tail::tail(args, &config).await?,
        Commands::Listen(args) => listen::listen(args, &config).await?,
        Commands::History(args) => history::history(args, &config)?,
    }

    Ok(ExitCode::SUCCESS)
}
