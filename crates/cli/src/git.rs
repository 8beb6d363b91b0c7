// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Small git queries the CLI needs for session identity.

use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

/// Current branch name, or `None` outside a repo or on a detached HEAD.
pub async fn current_branch(project_path: &Path) -> Option<String> {
    let mut cmd = Command::new("git");
    cmd.arg("-C")
        .arg(project_path)
        .args(["rev-parse", "--abbrev-ref", "HEAD"]);
    let output = rr_adapters::run_with_timeout(cmd, Duration::from_secs(10), "git rev-parse")
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if branch.is_empty() || branch == "HEAD" {
        None
    } else {
        Some(branch)
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
