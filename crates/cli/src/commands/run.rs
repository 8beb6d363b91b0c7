// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rr run` - preflight, lock, session log, then the cycle engine.

use crate::commands::print_report;
use anyhow::{bail, Context, Result};
use clap::Args;
use rr_adapters::{
    CapabilityCache, CliAgentRunner, CliCapabilityProbe, GitCheckpoint, SystemProbe, TracingSink,
};
use rr_core::agent::ReviewOptions;
use rr_core::cancel::{CancelKind, CancelToken};
use rr_core::clock::{Clock, SystemClock};
use rr_core::config::Config;
use rr_core::lock::{LockMode, LockPatch, LockState, Lockfile, LOCK_SCHEMA_VERSION};
use rr_core::log::SessionStatus;
use rr_doctor::{
    run_preflight, DoctorContext, PreflightInputs, SystemGitProbe, SystemTooling,
};
use rr_engine::{
    spawn_heartbeat, CycleContext, CycleEngine, CycleOptions, DefaultPromptBuilder, EngineDeps,
    StoreLockSink, StoreSessionSink,
};
use rr_storage::{session_log_path, LockStore, SessionLog};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

#[derive(Args)]
pub struct RunArgs {
    /// Review the diff against this base branch instead of uncommitted changes
    #[arg(long)]
    pub base_branch: Option<String>,

    /// Review a single commit
    #[arg(long)]
    pub commit: Option<String>,

    /// Extra review instructions replacing the default diff selection
    #[arg(long)]
    pub instructions: Option<String>,

    /// Run the configured code simplifier before each review
    #[arg(long)]
    pub simplify: bool,

    /// Keep iterating to max_iterations even when the fixer says stop
    #[arg(long)]
    pub force_max_iterations: bool,
}

pub async fn execute(args: RunArgs, project_path: PathBuf) -> Result<i32> {
    let clock = SystemClock;
    let capabilities = CapabilityCache::new("rr", Arc::new(CliCapabilityProbe::new()));

    // Config first so the lock store lands in the right logs dir.
    let config = Config::load(&Config::default_path(&project_path)).ok();
    let logs_dir = config
        .as_ref()
        .map(Config::logs_dir)
        .unwrap_or_else(rr_core::config::default_logs_dir);
    let locks = LockStore::new(logs_dir.clone(), Arc::new(SystemProbe::new()), clock.clone());

    let report = run_preflight(PreflightInputs {
        context: DoctorContext::Run,
        project_path: project_path.clone(),
        base_branch: args.base_branch.clone(),
        commit_sha: args.commit.clone(),
        capabilities: &capabilities,
        locks: &locks,
        git: &SystemGitProbe,
        tooling: &SystemTooling,
    })
    .await;
    print_report(&report);
    if report.has_errors() {
        bail!("preflight failed; run `rr doctor --fix` or fix the items above");
    }
    let config = report
        .config
        .clone()
        .context("preflight passed without a config")?;

    // Session identity.
    let session_id = uuid::Uuid::new_v4().to_string();
    let branch = crate::git::current_branch(&project_path).await;
    let now = clock.now_utc();
    let session_name = format!("rr-{}", now.format("%Y%m%d-%H%M%S"));
    let log_path = session_log_path(&logs_dir, &project_path, now, branch.as_deref());

    let lock = Lockfile {
        schema_version: LOCK_SCHEMA_VERSION,
        session_id: session_id.clone(),
        session_name: session_name.clone(),
        project_path: project_path.display().to_string(),
        branch: branch.clone(),
        start_time: now,
        last_heartbeat: now,
        pid: std::process::id(),
        mode: LockMode::Foreground,
        state: LockState::Pending,
        session_path: Some(log_path.display().to_string()),
        end_time: None,
        reason: None,
        iteration: None,
        current_agent: None,
        review_summary: None,
        codex_review_text: None,
    };
    if !locks.create(&lock).await? {
        bail!("another session took the lock; try again");
    }
    let lock_path = locks.lock_path(&project_path);

    let log = SessionLog::open(&log_path)
        .with_context(|| format!("could not open session log {}", log_path.display()))?;
    println!("session log: {}", log_path.display());

    // Cancellation: SIGINT propagates through the token; the runner kills
    // the active child.
    let cancel = CancelToken::new();
    let sigint = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("SIGINT received, cancelling run");
            sigint.cancel(CancelKind::Interrupt);
        }
    });

    let lock_sink = Arc::new(StoreLockSink::new(
        locks.clone(),
        lock_path.clone(),
        session_id.clone(),
    ));
    let heartbeat = spawn_heartbeat(lock_sink.clone(), clock.clone(), cancel.clone());

    let deps = EngineDeps {
        agents: Arc::new(CliAgentRunner::new(clock.clone(), config.rollout_window_days)),
        checkpoints: Arc::new(GitCheckpoint::new()),
        clock: clock.clone(),
        locks: lock_sink,
        log: Arc::new(StoreSessionSink::new(log)),
        prompts: Arc::new(DefaultPromptBuilder),
        sink: Arc::new(TracingSink),
    };

    let review_options = if let Some(instructions) = args.instructions {
        ReviewOptions::CustomInstructions(instructions)
    } else if let Some(commit) = args.commit {
        ReviewOptions::Commit(commit)
    } else if let Some(base) = args.base_branch {
        ReviewOptions::BaseBranch(base)
    } else {
        ReviewOptions::Uncommitted
    };

    let engine = CycleEngine::new(
        config,
        deps,
        CycleContext {
            project_path,
            session_id,
            session_name,
            branch,
        },
        CycleOptions {
            simplifier: args.simplify,
            force_max_iterations: args.force_max_iterations,
            review_options,
        },
        cancel,
    )
    .with_iteration_callback(|iteration, role| {
        println!("iteration {iteration}: {role}");
    });

    let result = engine.run().await;
    drop(heartbeat);

    // Push the session path one last time so observers can find the log
    // next to the terminal state.
    let _ = locks
        .update(
            &lock_path,
            LockPatch {
                session_path: Some(Some(log_path.display().to_string())),
                ..LockPatch::default()
            },
            None,
        )
        .await;

    println!("{}: {}", result.final_status, result.reason);
    Ok(exit_code(&result.final_status, result.success, result.timed_out))
}

/// 0 on clean completion, 124 for any agent timeout, 1 otherwise.
fn exit_code(status: &SessionStatus, success: bool, timed_out: bool) -> i32 {
    if timed_out {
        return 124;
    }
    if success && *status == SessionStatus::Completed {
        return 0;
    }
    1
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
