// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rr init` - write a default config and report what is still missing.

use crate::commands::print_report;
use anyhow::Result;
use rr_adapters::{CapabilityCache, CliCapabilityProbe, SystemProbe};
use rr_core::clock::SystemClock;
use rr_core::config::Config;
use rr_doctor::{run_preflight, DoctorContext, PreflightInputs, SystemGitProbe, SystemTooling};
use rr_storage::LockStore;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn execute(project_path: PathBuf) -> Result<i32> {
    let config_path = Config::default_path(&project_path);
    if config_path.exists() {
        println!("config already present: {}", config_path.display());
    } else {
        Config::write_default(&config_path)?;
        println!("wrote {}", config_path.display());
    }

    let capabilities = CapabilityCache::new("rr", Arc::new(CliCapabilityProbe::new()));
    let locks = LockStore::new(
        rr_core::config::default_logs_dir(),
        Arc::new(SystemProbe::new()),
        SystemClock,
    );
    let report = run_preflight(PreflightInputs {
        context: DoctorContext::Init,
        project_path,
        base_branch: None,
        commit_sha: None,
        capabilities: &capabilities,
        locks: &locks,
        git: &SystemGitProbe,
        tooling: &SystemTooling,
    })
    .await;
    print_report(&report);
    Ok(0)
}
