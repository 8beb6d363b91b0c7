// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-writer-per-project lockfile store.
//!
//! One lock per project slug, pretty-printed JSON so a human can inspect it
//! mid-run. In-process read-modify-write races are serialized by a per-path
//! async mutex; cross-process races are settled by the guarded-update
//! semantics: a writer whose `expected_session_id` no longer matches sees
//! `false` and writes nothing.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rr_core::clock::Clock;
use rr_core::lock::{LockPatch, LockState, Lockfile};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::slug::project_slug;

/// Staleness thresholds. Suggested defaults from the lock protocol; owners
/// heartbeat every [`timeouts::HEARTBEAT`].
pub mod timeouts {
    use std::time::Duration;

    /// How often a running owner must touch its heartbeat.
    pub const HEARTBEAT: Duration = Duration::from_secs(5);
    /// A `running` lock with no heartbeat for this long may be stale.
    pub const RUNNING_STALE: Duration = Duration::from_secs(20);
    /// A `pending` lock older than this may be stale.
    pub const PENDING_STARTUP: Duration = Duration::from_secs(45);
    /// A `stopping` lock with no heartbeat for this long may be stale.
    pub const STOPPING_STALE: Duration = Duration::from_secs(20);
}

/// Errors from lockfile operations
#[derive(Debug, Error)]
pub enum LockError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a lock was judged stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    TerminalState,
    PendingTimeout,
    HeartbeatLost,
    StoppingAbandoned,
}

/// Liveness observations combined by the staleness check.
///
/// Process liveness and session liveness are both weak observations; the
/// check combines them, it never treats either as ownership.
#[async_trait]
pub trait LivenessProbe: Send + Sync + 'static {
    fn process_alive(&self, pid: u32) -> bool;
    async fn session_alive(&self, session_name: &str) -> bool;
}

/// Probe that answers from recorded maps; everything unknown is dead.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct FakeProbe {
    inner: Arc<Mutex<FakeProbeState>>,
}

#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
struct FakeProbeState {
    live_pids: Vec<u32>,
    live_sessions: Vec<String>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_process_alive(&self, pid: u32, alive: bool) {
        let mut state = self.inner.lock();
        state.live_pids.retain(|p| *p != pid);
        if alive {
            state.live_pids.push(pid);
        }
    }

    pub fn set_session_alive(&self, name: &str, alive: bool) {
        let mut state = self.inner.lock();
        state.live_sessions.retain(|s| s != name);
        if alive {
            state.live_sessions.push(name.to_string());
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl LivenessProbe for FakeProbe {
    fn process_alive(&self, pid: u32) -> bool {
        self.inner.lock().live_pids.contains(&pid)
    }

    async fn session_alive(&self, session_name: &str) -> bool {
        self.inner
            .lock()
            .live_sessions
            .iter()
            .any(|s| s == session_name)
    }
}

/// The lockfile store for one logs directory.
#[derive(Clone)]
pub struct LockStore<C: Clock> {
    logs_dir: PathBuf,
    probe: Arc<dyn LivenessProbe>,
    clock: C,
    // Per-path write queue: serializes in-process read-modify-write.
    paths: Arc<Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>>,
}

impl<C: Clock> LockStore<C> {
    pub fn new(logs_dir: PathBuf, probe: Arc<dyn LivenessProbe>, clock: C) -> Self {
        Self {
            logs_dir,
            probe,
            clock,
            paths: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// `<logs_dir>/<slug>.lock`, stable across branches.
    pub fn lock_path(&self, project_path: &Path) -> PathBuf {
        self.logs_dir
            .join(format!("{}.lock", project_slug(project_path)))
    }

    fn path_mutex(&self, path: &Path) -> Arc<AsyncMutex<()>> {
        let mut paths = self.paths.lock();
        paths
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Create a new lockfile. Returns `false` without writing when an
    /// active lock already exists (stale ones are cleaned first).
    pub async fn create(&self, lock: &Lockfile) -> Result<bool, LockError> {
        let path = self.lock_path(Path::new(&lock.project_path));
        let mutex = self.path_mutex(&path);
        let _guard = mutex.lock().await;

        self.cleanup_stale_locked(&path).await?;
        if path.exists() {
            debug!(path = %path.display(), "active lock present, create rejected");
            return Ok(false);
        }
        write_lock(&path, lock)?;
        Ok(true)
    }

    /// Parse and validate. Any schema violation reads as "no lock".
    pub async fn read(&self, path: &Path) -> Option<Lockfile> {
        read_lock(path)
    }

    /// Merge a patch into the lock.
    ///
    /// Returns `false` without writing when the lock is missing, when
    /// `expected_session_id` mismatches, or when the patch would resurrect
    /// a terminal lock into an active state.
    pub async fn update(
        &self,
        path: &Path,
        patch: LockPatch,
        expected_session_id: Option<&str>,
    ) -> Result<bool, LockError> {
        let mutex = self.path_mutex(path);
        let _guard = mutex.lock().await;

        let Some(mut lock) = read_lock(path) else {
            return Ok(false);
        };
        if let Some(expected) = expected_session_id {
            if lock.session_id != expected {
                debug!(path = %path.display(), expected, actual = %lock.session_id, "guarded update rejected");
                return Ok(false);
            }
        }
        if lock.state.is_terminal() {
            if let Some(next) = patch.state {
                if next.is_active() {
                    warn!(path = %path.display(), from = %lock.state, to = %next, "refusing terminal-to-active transition");
                    return Ok(false);
                }
            }
        }
        patch.apply(&mut lock);
        write_lock(path, &lock)?;
        Ok(true)
    }

    /// Shorthand: guarded `last_heartbeat = now()`.
    pub async fn touch_heartbeat(&self, path: &Path, session_id: &str) -> Result<bool, LockError> {
        self.update(
            path,
            LockPatch::heartbeat(self.clock.now_utc()),
            Some(session_id),
        )
        .await
    }

    /// Guarded delete. Returns `false` when the guard mismatches; missing
    /// file counts as removed.
    pub async fn remove(&self, path: &Path, expected_session_id: Option<&str>) -> Result<bool, LockError> {
        let mutex = self.path_mutex(path);
        let _guard = mutex.lock().await;

        let Some(lock) = read_lock(path) else {
            return Ok(true);
        };
        if let Some(expected) = expected_session_id {
            if lock.session_id != expected {
                return Ok(false);
            }
        }
        remove_file(path)?;
        Ok(true)
    }

    /// Clean a stale lock, then report whether an active one remains.
    pub async fn has_active_lockfile(&self, path: &Path) -> Result<bool, LockError> {
        let mutex = self.path_mutex(path);
        let _guard = mutex.lock().await;
        self.cleanup_stale_locked(path).await?;
        Ok(read_lock(path).is_some())
    }

    /// Remove the lock at `path` if stale. Idempotent.
    pub async fn cleanup_stale_lockfile(&self, path: &Path) -> Result<Option<StaleReason>, LockError> {
        let mutex = self.path_mutex(path);
        let _guard = mutex.lock().await;
        self.cleanup_stale_locked(path).await
    }

    async fn cleanup_stale_locked(&self, path: &Path) -> Result<Option<StaleReason>, LockError> {
        let Some(lock) = read_lock(path) else {
            // Unreadable lock files are stale by definition.
            if path.exists() {
                remove_file(path)?;
                return Ok(Some(StaleReason::TerminalState));
            }
            return Ok(None);
        };
        let Some(reason) = self.staleness(&lock).await else {
            return Ok(None);
        };
        debug!(path = %path.display(), session_id = %lock.session_id, ?reason, "removing stale lock");
        remove_file(path)?;
        Ok(Some(reason))
    }

    /// The staleness rules. Process liveness and session liveness are both
    /// consulted; a fresh `pending` lock is never stale, dead pid or not.
    async fn staleness(&self, lock: &Lockfile) -> Option<StaleReason> {
        if lock.state.is_terminal() {
            return Some(StaleReason::TerminalState);
        }
        let now = self.clock.now_utc();
        match lock.state {
            LockState::Pending => {
                if age(now, lock.start_time) > timeouts::PENDING_STARTUP
                    && self.session_artefact_gone(lock).await
                {
                    return Some(StaleReason::PendingTimeout);
                }
            }
            LockState::Running => {
                if age(now, lock.last_heartbeat) > timeouts::RUNNING_STALE
                    && (!self.probe.process_alive(lock.pid)
                        || self.session_artefact_gone(lock).await)
                {
                    return Some(StaleReason::HeartbeatLost);
                }
            }
            LockState::Stopping => {
                if age(now, lock.last_heartbeat) > timeouts::STOPPING_STALE
                    && self.session_artefact_gone(lock).await
                {
                    return Some(StaleReason::StoppingAbandoned);
                }
            }
            _ => {}
        }
        None
    }

    /// Whether the advertised session artefact is gone. Background owners
    /// advertise a tmux session named after the lock; foreground owners
    /// advertise only their process.
    async fn session_artefact_gone(&self, lock: &Lockfile) -> bool {
        match lock.mode {
            rr_core::lock::LockMode::Background => {
                !self.probe.session_alive(&lock.session_name).await
            }
            rr_core::lock::LockMode::Foreground => !self.probe.process_alive(lock.pid),
        }
    }

    /// Scan the logs directory, cleaning stale locks, and return the
    /// remaining active sessions.
    pub async fn list_all_active_sessions(&self) -> Result<Vec<Lockfile>, LockError> {
        let mut sessions = Vec::new();
        let entries = match std::fs::read_dir(&self.logs_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(sessions),
            Err(e) => return Err(e.into()),
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "lock") {
                continue;
            }
            self.cleanup_stale_lockfile(&path).await?;
            if let Some(lock) = read_lock(&path) {
                sessions.push(lock);
            }
        }
        sessions.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(sessions)
    }
}

fn age(now: DateTime<Utc>, then: DateTime<Utc>) -> std::time::Duration {
    (now - then)
        .max(Duration::zero())
        .to_std()
        .unwrap_or_default()
}

fn read_lock(path: &Path) -> Option<Lockfile> {
    let text = std::fs::read_to_string(path).ok()?;
    let lock: Lockfile = match serde_json::from_str(&text) {
        Ok(lock) => lock,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable lockfile");
            return None;
        }
    };
    if let Err(e) = lock.validate() {
        warn!(path = %path.display(), error = %e, "invalid lockfile");
        return None;
    }
    Some(lock)
}

/// Pretty-printed 2-space JSON, written via tmp + rename so observers never
/// see a torn file.
fn write_lock(path: &Path, lock: &Lockfile) -> Result<(), LockError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let rand = uuid::Uuid::new_v4().simple().to_string();
    let tmp = path.with_extension(format!("lock.tmp.{}", &rand[..8]));
    let text = serde_json::to_string_pretty(lock)?;
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn remove_file(path: &Path) -> Result<(), LockError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "lockfile_tests.rs"]
mod tests;
