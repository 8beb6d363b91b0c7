// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rr doctor` - report tool and project health, optionally fix it.

use crate::commands::print_report;
use anyhow::Result;
use clap::Args;
use rr_adapters::{CapabilityCache, CliCapabilityProbe, SystemProbe};
use rr_core::clock::SystemClock;
use rr_core::config::Config;
use rr_doctor::{
    apply_fixes, run_preflight, DoctorContext, FixOutcome, PreflightInputs, SystemGitProbe,
    SystemTooling,
};
use rr_storage::LockStore;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args)]
pub struct DoctorArgs {
    /// Apply whitelisted fixes (install tmux, rewrite config, remove lock)
    #[arg(long)]
    pub fix: bool,
}

pub async fn execute(args: DoctorArgs, project_path: PathBuf) -> Result<i32> {
    let capabilities = CapabilityCache::new("rr", Arc::new(CliCapabilityProbe::new()));
    let logs_dir = Config::load(&Config::default_path(&project_path))
        .map(|c| c.logs_dir())
        .unwrap_or_else(|_| rr_core::config::default_logs_dir());
    let locks = LockStore::new(logs_dir, Arc::new(SystemProbe::new()), SystemClock);

    let report = run_preflight(PreflightInputs {
        context: DoctorContext::Doctor,
        project_path: project_path.clone(),
        base_branch: None,
        commit_sha: None,
        capabilities: &capabilities,
        locks: &locks,
        git: &SystemGitProbe,
        tooling: &SystemTooling,
    })
    .await;
    print_report(&report);

    if args.fix {
        let outcomes = apply_fixes(&report, &project_path, &locks).await;
        for outcome in &outcomes {
            match outcome {
                FixOutcome::Fixed { check, detail } => println!("fixed  {check}: {detail}"),
                FixOutcome::Failed { check, detail } => println!("FAILED {check}: {detail}"),
                FixOutcome::Skipped { check, detail } => println!("skip   {check}: {detail}"),
            }
        }
        if outcomes
            .iter()
            .any(|o| matches!(o, FixOutcome::Failed { .. }))
        {
            return Ok(1);
        }
        return Ok(0);
    }

    Ok(if report.has_errors() { 1 } else { 0 })
}
