// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux presence and session probes.
//!
//! rr does not drive tmux itself; background runs are started inside tmux
//! by the CLI, and the lockfile staleness check only needs to know whether
//! the advertised session still exists.

use crate::subprocess::{run_with_timeout, TMUX_TIMEOUT};
use async_trait::async_trait;
use rr_storage::LivenessProbe;
use tokio::process::Command;

/// Whether a tmux binary is on PATH and answers `-V`.
pub async fn tmux_installed() -> bool {
    let mut cmd = Command::new("tmux");
    cmd.arg("-V");
    matches!(
        run_with_timeout(cmd, TMUX_TIMEOUT, "tmux -V").await,
        Ok(output) if output.status.success()
    )
}

/// Whether a tmux session with this exact name exists.
pub async fn session_exists(name: &str) -> bool {
    let mut cmd = Command::new("tmux");
    cmd.args(["has-session", "-t", name]);
    matches!(
        run_with_timeout(cmd, TMUX_TIMEOUT, "tmux has-session").await,
        Ok(output) if output.status.success()
    )
}

/// Production liveness probe: signal-0 for processes, `has-session` for
/// tmux artefacts.
#[derive(Clone, Default)]
pub struct SystemProbe;

impl SystemProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LivenessProbe for SystemProbe {
    fn process_alive(&self, pid: u32) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;
        // EPERM still means the process exists.
        match kill(Pid::from_raw(pid as i32), None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    async fn session_alive(&self, session_name: &str) -> bool {
        session_exists(session_name).await
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
