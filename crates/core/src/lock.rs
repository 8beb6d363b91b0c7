// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lockfile v2 record: single-writer-per-project coordination.
//!
//! The lockfile is a pretty-printed JSON file observers may read but never
//! mutate. State transitions out of an active state into a terminal state
//! are irreversible; `schema_version` is re-pinned on every write.

use crate::agent::AgentRole;
use crate::summary::ReviewSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const LOCK_SCHEMA_VERSION: u32 = 2;

/// How the owning process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    Background,
    Foreground,
}

/// Lifecycle state advertised to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    Pending,
    Running,
    Stopping,
    Completed,
    Failed,
    Interrupted,
    Stopped,
}

impl LockState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LockState::Completed | LockState::Failed | LockState::Interrupted | LockState::Stopped
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LockState::Pending => "pending",
            LockState::Running => "running",
            LockState::Stopping => "stopping",
            LockState::Completed => "completed",
            LockState::Failed => "failed",
            LockState::Interrupted => "interrupted",
            LockState::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// The on-disk lock record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    pub schema_version: u32,
    pub session_id: String,
    pub session_name: String,
    pub project_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub start_time: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub pid: u32,
    pub mode: LockMode,
    pub state: LockState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    /// `Some(None)` is serialized as an explicit `null` between agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_agent: Option<Option<AgentRole>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_summary: Option<ReviewSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codex_review_text: Option<String>,
}

impl Lockfile {
    /// Validate invariants a reader relies on. Readers treat any violation
    /// as "no lock".
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != LOCK_SCHEMA_VERSION {
            return Err(format!(
                "unsupported schemaVersion {} (expected {})",
                self.schema_version, LOCK_SCHEMA_VERSION
            ));
        }
        if self.session_id.is_empty() {
            return Err("empty sessionId".to_string());
        }
        if self.project_path.is_empty() {
            return Err("empty projectPath".to_string());
        }
        Ok(())
    }
}

/// A merge patch for [`Lockfile`].
///
/// Outer `None` leaves the field alone; `Some(None)` on a doubly-optional
/// field clears it (the "patch value is undefined deletes the key"
/// semantics of the on-disk format).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockPatch {
    pub state: Option<LockState>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub iteration: Option<u32>,
    pub current_agent: Option<Option<AgentRole>>,
    pub session_path: Option<Option<String>>,
    pub end_time: Option<Option<DateTime<Utc>>>,
    pub reason: Option<Option<String>>,
    pub review_summary: Option<Option<ReviewSummary>>,
    pub codex_review_text: Option<Option<String>>,
}

impl LockPatch {
    pub fn state(state: LockState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn heartbeat(now: DateTime<Utc>) -> Self {
        Self {
            last_heartbeat: Some(now),
            ..Self::default()
        }
    }

    /// Apply onto a lock record. Heartbeats never move backwards, and the
    /// schema version is re-pinned unconditionally.
    pub fn apply(&self, lock: &mut Lockfile) {
        lock.schema_version = LOCK_SCHEMA_VERSION;
        if let Some(state) = self.state {
            lock.state = state;
        }
        if let Some(hb) = self.last_heartbeat {
            if hb > lock.last_heartbeat {
                lock.last_heartbeat = hb;
            }
        }
        if let Some(iteration) = self.iteration {
            lock.iteration = Some(iteration);
        }
        if let Some(agent) = &self.current_agent {
            lock.current_agent = Some(*agent);
        }
        if let Some(session_path) = &self.session_path {
            lock.session_path = session_path.clone();
        }
        if let Some(end_time) = &self.end_time {
            lock.end_time = *end_time;
        }
        if let Some(reason) = &self.reason {
            lock.reason = reason.clone();
        }
        if let Some(review) = &self.review_summary {
            lock.review_summary = review.clone();
        }
        if let Some(text) = &self.codex_review_text {
            lock.codex_review_text = text.clone();
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
