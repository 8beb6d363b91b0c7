// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `--fix` whitelist.
//!
//! Only three repairs are ever attempted: install tmux (platform-aware),
//! rewrite a default config, and remove a lockfile. Each is idempotent,
//! and the fixer never proceeds past errors it did not itself repair.

use crate::report::{DiagnosticsReport, DoctorContext};
use rr_adapters::run_with_timeout;
use rr_core::clock::Clock;
use rr_core::config::Config;
use rr_storage::LockStore;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// What one fix attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    Fixed { check: String, detail: String },
    Failed { check: String, detail: String },
    Skipped { check: String, detail: String },
}

/// Apply whitelisted fixes for the report's fixable items.
pub async fn apply_fixes<C: Clock>(
    report: &DiagnosticsReport,
    project_path: &Path,
    locks: &LockStore<C>,
) -> Vec<FixOutcome> {
    let mut outcomes = Vec::new();
    for item in report.fixable_items() {
        let outcome = match item.check.as_str() {
            "tmux" => install_tmux().await,
            "config" => repair_config(project_path),
            "lockfile" => remove_lockfile(project_path, locks).await,
            other => FixOutcome::Skipped {
                check: other.to_string(),
                detail: "not on the fix whitelist".to_string(),
            },
        };
        match &outcome {
            FixOutcome::Fixed { check, detail } => info!(check, detail, "fixed"),
            FixOutcome::Failed { check, detail } => warn!(check, detail, "fix failed"),
            FixOutcome::Skipped { .. } => {}
        }
        outcomes.push(outcome);
    }
    outcomes
}

/// Whether the fixes left the preflight clean enough to proceed in `run`
/// context: every error item must have been fixed.
pub fn all_errors_fixed(report: &DiagnosticsReport, outcomes: &[FixOutcome]) -> bool {
    report
        .items
        .iter()
        .filter(|i| i.severity == crate::report::Severity::Error)
        .all(|item| {
            outcomes
                .iter()
                .any(|o| matches!(o, FixOutcome::Fixed { check, .. } if *check == item.check))
        })
}

async fn install_tmux() -> FixOutcome {
    let check = "tmux".to_string();
    if rr_adapters::tmux_installed().await {
        return FixOutcome::Fixed {
            check,
            detail: "already installed".to_string(),
        };
    }
    let (binary, args): (&str, &[&str]) = if cfg!(target_os = "macos") {
        ("brew", &["install", "tmux"])
    } else {
        ("apt-get", &["install", "-y", "tmux"])
    };
    let mut cmd = Command::new(binary);
    cmd.args(args);
    match run_with_timeout(cmd, Duration::from_secs(300), "tmux install").await {
        Ok(output) if output.status.success() => FixOutcome::Fixed {
            check,
            detail: format!("installed via {binary}"),
        },
        Ok(output) => FixOutcome::Failed {
            check,
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        },
        Err(e) => FixOutcome::Failed { check, detail: e },
    }
}

fn repair_config(project_path: &Path) -> FixOutcome {
    let check = "config".to_string();
    let path = Config::default_path(project_path);
    match Config::write_default(&path) {
        Ok(()) => FixOutcome::Fixed {
            check,
            detail: format!("wrote default config to {}", path.display()),
        },
        Err(e) => FixOutcome::Failed {
            check,
            detail: e.to_string(),
        },
    }
}

async fn remove_lockfile<C: Clock>(project_path: &Path, locks: &LockStore<C>) -> FixOutcome {
    let check = "lockfile".to_string();
    let path = locks.lock_path(project_path);
    match locks.remove(&path, None).await {
        Ok(_) => FixOutcome::Fixed {
            check,
            detail: format!("removed {}", path.display()),
        },
        Err(e) => FixOutcome::Failed {
            check,
            detail: e.to_string(),
        },
    }
}

/// Context gate: fixes only run where they make sense. `doctor --fix` and
/// `init` may install; a bare `run` never mutates the machine.
pub fn fixes_allowed(context: DoctorContext) -> bool {
    !matches!(context, DoctorContext::Run)
}

#[cfg(test)]
#[path = "fix_tests.rs"]
mod tests;
