// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rr - iterative AI review and fix loops for a working tree

mod commands;
mod git;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "rr",
    version,
    about = "Drive an AI reviewer and fixer over your uncommitted changes"
)]
struct Cli {
    /// Change to <dir> before doing anything
    #[arg(short = 'C', global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the review and fix cycle
    Run(commands::run::RunArgs),
    /// Check installed tools, config, and project state
    Doctor(commands::doctor::DoctorArgs),
    /// Write a default config and verify the setup
    Init,
    /// List active sessions across projects
    Sessions,
    /// Ask a running session to stop
    Stop,
}

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rr=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir)?;
    }
    let project_path = std::env::current_dir()?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        match cli.command {
            Commands::Run(args) => commands::run::execute(args, project_path).await,
            Commands::Doctor(args) => commands::doctor::execute(args, project_path).await,
            Commands::Init => commands::init::execute(project_path).await,
            Commands::Sessions => commands::sessions::execute().await,
            Commands::Stop => commands::stop::execute(project_path).await,
        }
    })
}
