// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Injectable engine dependencies.
//!
//! Every external effect the cycle engine performs goes through one of
//! these seams: agent runs, checkpoints, lockfile pushes, session log
//! appends, prompt building. Production wires the rr-storage and
//! rr-adapters implementations; tests wire fakes and script every edge.

use crate::prompts::PromptBuilder;
use async_trait::async_trait;
use rr_adapters::{AgentRunner, CheckpointAdapter, OutputSink};
use rr_core::clock::Clock;
use rr_core::lock::{LockPatch, LockState};
use rr_core::log::SessionEvent;
use rr_storage::{LockStore, SessionLog};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Engine-facing lockfile operations, already bound to one session.
///
/// Push failures are the caller's to swallow; `push` reports them as
/// `false` and never raises.
#[async_trait]
pub trait LockSink: Send + Sync + 'static {
    /// Guarded merge of a progress patch. `false` means the update did not
    /// land (missing lock, guard mismatch, or I/O trouble).
    async fn push(&self, patch: LockPatch) -> bool;

    /// Current advertised state, if the lock still exists.
    async fn state(&self) -> Option<LockState>;
}

/// Engine-facing session log, already bound to one log file.
#[async_trait]
pub trait SessionSink: Send + Sync + 'static {
    async fn append(&self, event: SessionEvent) -> Result<(), String>;

    /// Where the log lives, for advertising on the lockfile.
    fn path(&self) -> PathBuf;
}

/// Production [`LockSink`] over [`rr_storage::LockStore`].
#[derive(Clone)]
pub struct StoreLockSink<C: Clock> {
    store: LockStore<C>,
    lock_path: PathBuf,
    session_id: String,
}

impl<C: Clock> StoreLockSink<C> {
    pub fn new(store: LockStore<C>, lock_path: PathBuf, session_id: String) -> Self {
        Self {
            store,
            lock_path,
            session_id,
        }
    }
}

#[async_trait]
impl<C: Clock> LockSink for StoreLockSink<C> {
    async fn push(&self, patch: LockPatch) -> bool {
        match self
            .store
            .update(&self.lock_path, patch, Some(&self.session_id))
            .await
        {
            Ok(applied) => applied,
            Err(e) => {
                warn!(error = %e, "lockfile push failed");
                false
            }
        }
    }

    async fn state(&self) -> Option<LockState> {
        self.store.read(&self.lock_path).await.map(|lock| lock.state)
    }
}

/// Production [`SessionSink`] over [`rr_storage::SessionLog`].
#[derive(Clone)]
pub struct StoreSessionSink {
    log: SessionLog,
}

impl StoreSessionSink {
    pub fn new(log: SessionLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl SessionSink for StoreSessionSink {
    async fn append(&self, event: SessionEvent) -> Result<(), String> {
        self.log.append(event).await.map_err(|e| e.to_string())
    }

    fn path(&self) -> PathBuf {
        self.log.path().to_path_buf()
    }
}

/// Everything the cycle engine calls out to.
pub struct EngineDeps<A, K, C>
where
    A: AgentRunner,
    K: CheckpointAdapter,
    C: Clock,
{
    pub agents: Arc<A>,
    pub checkpoints: Arc<K>,
    pub clock: C,
    pub locks: Arc<dyn LockSink>,
    pub log: Arc<dyn SessionSink>,
    pub prompts: Arc<dyn PromptBuilder>,
    pub sink: Arc<dyn OutputSink>,
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fakes {
    use super::*;
    use parking_lot::Mutex;

    /// Records patches; scriptable failure and observed state.
    #[derive(Clone, Default)]
    pub struct FakeLockSink {
        inner: Arc<Mutex<FakeLockState>>,
    }

    #[derive(Default)]
    struct FakeLockState {
        patches: Vec<LockPatch>,
        fail_pushes: bool,
        state: Option<LockState>,
    }

    impl FakeLockSink {
        pub fn new() -> Self {
            let sink = Self::default();
            sink.inner.lock().state = Some(LockState::Pending);
            sink
        }

        pub fn patches(&self) -> Vec<LockPatch> {
            self.inner.lock().patches.clone()
        }

        pub fn set_fail_pushes(&self, fail: bool) {
            self.inner.lock().fail_pushes = fail;
        }

        pub fn set_state(&self, state: Option<LockState>) {
            self.inner.lock().state = state;
        }

        /// The last state pushed through a patch, if any.
        pub fn last_pushed_state(&self) -> Option<LockState> {
            self.patches().iter().rev().find_map(|p| p.state)
        }

        /// The last codex review text pushed, flattened.
        pub fn last_codex_review_text(&self) -> Option<String> {
            self.patches()
                .iter()
                .rev()
                .find_map(|p| p.codex_review_text.clone())
                .flatten()
        }

        pub fn pushed_review_summary(&self) -> bool {
            self.patches()
                .iter()
                .any(|p| matches!(&p.review_summary, Some(Some(_))))
        }
    }

    #[async_trait]
    impl LockSink for FakeLockSink {
        async fn push(&self, patch: LockPatch) -> bool {
            let mut inner = self.inner.lock();
            if inner.fail_pushes {
                return false;
            }
            if let Some(state) = patch.state {
                inner.state = Some(state);
            }
            inner.patches.push(patch);
            true
        }

        async fn state(&self) -> Option<LockState> {
            self.inner.lock().state
        }
    }

    /// Records appended events; scriptable append failure.
    #[derive(Clone, Default)]
    pub struct FakeSessionSink {
        inner: Arc<Mutex<FakeLogState>>,
    }

    #[derive(Default)]
    struct FakeLogState {
        events: Vec<SessionEvent>,
        fail_appends: bool,
    }

    impl FakeSessionSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<SessionEvent> {
            self.inner.lock().events.clone()
        }

        pub fn set_fail_appends(&self, fail: bool) {
            self.inner.lock().fail_appends = fail;
        }
    }

    #[async_trait]
    impl SessionSink for FakeSessionSink {
        async fn append(&self, event: SessionEvent) -> Result<(), String> {
            let mut inner = self.inner.lock();
            if inner.fail_appends {
                return Err("injected append failure".to_string());
            }
            inner.events.push(event);
            Ok(())
        }

        fn path(&self) -> PathBuf {
            PathBuf::from("/fake/session.jsonl")
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fakes::{FakeLockSink, FakeSessionSink};
