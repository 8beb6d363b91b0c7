// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sticky cancellation token.
//!
//! One token per run, wired to the process SIGINT handler and to the
//! observer stop request. Assertion is sticky: once cancelled, every
//! later poll and every pending `cancelled().await` observes it.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Why the run was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelKind {
    /// SIGINT (or platform equivalent) on the owning process.
    Interrupt,
    /// An observer flipped the lockfile to `stopping`.
    Stop,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    kind: Mutex<Option<CancelKind>>,
    notify: Notify,
}

/// Cloneable handle to the run's cancellation state.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert cancellation. The first kind wins; later calls are no-ops.
    pub fn cancel(&self, kind: CancelKind) {
        {
            let mut slot = self.inner.kind.lock();
            if slot.is_none() {
                *slot = Some(kind);
            }
        }
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn kind(&self) -> Option<CancelKind> {
        *self.inner.kind.lock()
    }

    /// Wait until cancellation is asserted. Returns immediately if it
    /// already is.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
#[path = "cancel_tests.rs"]
mod tests;
