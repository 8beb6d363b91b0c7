// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session log event union and the derived summary fold.
//!
//! One NDJSON event per line; the summary sidecar is a pure function of the
//! log prefix. `fold_summary` is that function; storage replays it after
//! every append and whenever the sidecar has to be rebuilt.

use crate::agent::AgentRole;
use crate::summary::{FixSummary, Priority, ReviewSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal (or in-flight) status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
    Interrupted,
    Stopped,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Interrupted => "interrupted",
            SessionStatus::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// Which phase of an iteration errored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseError {
    pub phase: AgentRole,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// Outcome of a post-fixer rollback attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackOutcome {
    pub attempted: bool,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Raw reviewer text persisted when a codex-class verdict would not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodexReview {
    pub text: String,
}

/// One reviewer→fixer pass, including partial passes that errored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationEntry {
    pub iteration: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixes: Option<FixSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codex_review: Option<CodexReview>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PhaseError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackOutcome>,
}

/// The append-only event union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    System {
        timestamp: DateTime<Utc>,
        session_id: String,
        session_name: String,
        project_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
        max_iterations: u32,
    },
    Iteration(IterationEntry),
    #[serde(rename_all = "camelCase")]
    SessionEnd {
        timestamp: DateTime<Utc>,
        status: SessionStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        iterations: u32,
    },
}

/// Per-priority fix counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCounts {
    #[serde(rename = "P0")]
    pub p0: u32,
    #[serde(rename = "P1")]
    pub p1: u32,
    #[serde(rename = "P2")]
    pub p2: u32,
    #[serde(rename = "P3")]
    pub p3: u32,
}

impl PriorityCounts {
    fn bump(&mut self, priority: Priority) {
        match priority {
            Priority::P0 => self.p0 += 1,
            Priority::P1 => self.p1 += 1,
            Priority::P2 => self.p2 += 1,
            Priority::P3 => self.p3 += 1,
        }
    }
}

/// Derived aggregates over a session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub iterations: u32,
    pub has_iteration: bool,
    pub total_fixes: u32,
    pub total_skipped: u32,
    pub priority_counts: PriorityCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    pub rollback_count: u32,
    pub rollback_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(
        rename = "stop_iteration",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub stop_iteration: Option<bool>,
}

impl Default for SessionSummary {
    fn default() -> Self {
        Self {
            status: SessionStatus::Running,
            started_at: None,
            ended_at: None,
            iterations: 0,
            has_iteration: false,
            total_fixes: 0,
            total_skipped: 0,
            priority_counts: PriorityCounts::default(),
            total_duration: None,
            rollback_count: 0,
            rollback_failures: 0,
            reason: None,
            stop_iteration: None,
        }
    }
}

impl SessionSummary {
    /// Fold one event into the summary.
    pub fn apply(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::System { timestamp, .. } => {
                self.started_at = Some(*timestamp);
            }
            SessionEvent::Iteration(entry) => {
                self.iterations = self.iterations.max(entry.iteration);
                self.has_iteration = true;
                if let Some(d) = entry.duration_ms {
                    self.total_duration = Some(self.total_duration.unwrap_or(0) + d);
                }
                if let Some(fixes) = &entry.fixes {
                    self.total_fixes += fixes.fixes.len() as u32;
                    self.total_skipped += fixes.skipped.len() as u32;
                    for fix in &fixes.fixes {
                        self.priority_counts.bump(fix.priority);
                    }
                    self.stop_iteration = Some(fixes.stop_iteration);
                }
                if let Some(rollback) = &entry.rollback {
                    if rollback.attempted {
                        self.rollback_count += 1;
                        if !rollback.success {
                            self.rollback_failures += 1;
                        }
                    }
                }
            }
            SessionEvent::SessionEnd {
                timestamp,
                status,
                reason,
                iterations,
            } => {
                self.status = *status;
                self.ended_at = Some(*timestamp);
                self.reason = reason.clone();
                self.iterations = self.iterations.max(*iterations);
            }
        }
    }
}

/// Pure fold of an entire log into its summary.
pub fn fold_summary(events: &[SessionEvent]) -> SessionSummary {
    let mut summary = SessionSummary::default();
    for event in events {
        summary.apply(event);
    }
    summary
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
