// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat loop for the session lockfile.
//!
//! Touches `lastHeartbeat` every 5 seconds while the engine runs and
//! watches for an observer-requested `stopping` state, which it converts
//! into a sticky Stop cancellation. Push failures are swallowed; the next
//! tick retries.

use crate::deps::LockSink;
use rr_core::cancel::{CancelKind, CancelToken};
use rr_core::clock::Clock;
use rr_core::lock::{LockPatch, LockState};
use rr_storage::timeouts::HEARTBEAT;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Start the heartbeat task. Dropping or firing the returned sender stops it.
pub fn spawn_heartbeat<C: Clock>(
    locks: Arc<dyn LockSink>,
    clock: C,
    cancel: CancelToken,
) -> oneshot::Sender<()> {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !locks.push(LockPatch::heartbeat(clock.now_utc())).await {
                        debug!("heartbeat push failed, will retry next tick");
                    }
                    if locks.state().await == Some(LockState::Stopping) {
                        info!("observer requested stop, cancelling run");
                        cancel.cancel(CancelKind::Stop);
                    }
                }
                _ = &mut shutdown_rx => {
                    debug!("heartbeat shutdown requested");
                    break;
                }
            }
        }
    });
    shutdown_tx
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
