// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rr stop` - flip a running session's lock to `stopping`.
//!
//! The owning engine's heartbeat loop notices the state and winds the run
//! down as `stopped`. This command never touches the session's files.

use anyhow::{bail, Result};
use rr_adapters::SystemProbe;
use rr_core::clock::SystemClock;
use rr_core::config::Config;
use rr_core::lock::{LockPatch, LockState};
use rr_storage::LockStore;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn execute(project_path: PathBuf) -> Result<i32> {
    let logs_dir = Config::load(&Config::default_path(&project_path))
        .map(|c| c.logs_dir())
        .unwrap_or_else(|_| rr_core::config::default_logs_dir());
    let locks = LockStore::new(logs_dir, Arc::new(SystemProbe::new()), SystemClock);
    let lock_path = locks.lock_path(&project_path);

    let Some(lock) = locks.read(&lock_path).await else {
        bail!("no session is running for {}", project_path.display());
    };
    if lock.state.is_terminal() {
        println!("session already ended: {}", lock.state);
        return Ok(0);
    }

    let applied = locks
        .update(
            &lock_path,
            LockPatch::state(LockState::Stopping),
            Some(&lock.session_id),
        )
        .await?;
    if !applied {
        bail!("session changed hands; try again");
    }
    println!("stop requested for {}", lock.session_name);
    Ok(0)
}
