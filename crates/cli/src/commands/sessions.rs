// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rr sessions` - list active sessions across projects.

use anyhow::Result;
use rr_adapters::SystemProbe;
use rr_core::clock::SystemClock;
use rr_storage::LockStore;
use std::sync::Arc;

pub async fn execute() -> Result<i32> {
    let locks = LockStore::new(
        rr_core::config::default_logs_dir(),
        Arc::new(SystemProbe::new()),
        SystemClock,
    );
    let sessions = locks.list_all_active_sessions().await?;
    if sessions.is_empty() {
        println!("no active sessions");
        return Ok(0);
    }
    for lock in sessions {
        let iteration = lock
            .iteration
            .map(|i| format!("iteration {i}"))
            .unwrap_or_else(|| "starting".to_string());
        let agent = lock
            .current_agent
            .flatten()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<11} {:<9} {}  {}",
            lock.session_name, lock.state, iteration, agent, lock.project_path
        );
    }
    Ok(0)
}
