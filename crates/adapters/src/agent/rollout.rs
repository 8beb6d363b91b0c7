// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex session rollout lookup.
//!
//! Codex persists its review verdict in an on-disk rollout file under
//! `$CODEX_HOME/sessions/YYYY/MM/DD/rollout-*.jsonl`. The result extractor
//! must prefer the latest same-session `exited_review_mode.review_output`
//! payload over the stream text, falling back to the stream only when the
//! rollout is missing, unreadable, or predates the invocation.

use chrono::{DateTime, Days, Utc};
use serde_json::Value;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::debug;

/// Finds the review output of the current codex session.
#[derive(Debug, Clone)]
pub struct RolloutLocator {
    codex_home: PathBuf,
    /// How many day-directories back the search scans (today counts as 1).
    window_days: u32,
}

impl RolloutLocator {
    /// Default home: `$CODEX_HOME` or `~/.codex`.
    pub fn new(window_days: u32) -> Self {
        let codex_home = std::env::var_os("CODEX_HOME")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".codex")))
            .unwrap_or_else(|| PathBuf::from(".codex"));
        Self::with_home(codex_home, window_days)
    }

    pub fn with_home(codex_home: PathBuf, window_days: u32) -> Self {
        Self {
            codex_home,
            window_days: window_days.max(1),
        }
    }

    /// The latest `exited_review_mode.review_output` payload from a rollout
    /// written at or after `not_before`.
    pub fn find_review_output(&self, not_before: DateTime<Utc>) -> Option<String> {
        let rollout = self.newest_rollout_since(not_before)?;
        debug!(path = %rollout.display(), "reading codex rollout");
        let text = std::fs::read_to_string(&rollout).ok()?;
        let mut latest: Option<String> = None;
        for line in text.lines() {
            let Ok(json) = serde_json::from_str::<Value>(line.trim()) else {
                continue;
            };
            if let Some(output) = review_output(&json) {
                latest = Some(output);
            }
        }
        latest
    }

    /// Newest rollout file within the day window whose mtime is not before
    /// the invocation start.
    fn newest_rollout_since(&self, not_before: DateTime<Utc>) -> Option<PathBuf> {
        let cutoff: SystemTime = not_before.into();
        let mut candidates: Vec<(SystemTime, PathBuf)> = Vec::new();
        for day_dir in self.window_dirs(not_before) {
            let Ok(entries) = std::fs::read_dir(&day_dir) else {
                continue;
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if !name.starts_with("rollout-") || !name.ends_with(".jsonl") {
                    continue;
                }
                let Ok(mtime) = entry.metadata().and_then(|m| m.modified()) else {
                    continue;
                };
                if mtime >= cutoff {
                    candidates.push((mtime, path));
                }
            }
        }
        candidates.sort();
        candidates.pop().map(|(_, path)| path)
    }

    fn window_dirs(&self, now: DateTime<Utc>) -> Vec<PathBuf> {
        let sessions = self.codex_home.join("sessions");
        (0..self.window_days)
            .filter_map(|back| now.checked_sub_days(Days::new(back as u64)))
            .map(|day| {
                sessions
                    .join(day.format("%Y").to_string())
                    .join(day.format("%m").to_string())
                    .join(day.format("%d").to_string())
            })
            .collect()
    }
}

/// Pull `review_output` out of an `exited_review_mode` record, whatever
/// envelope it arrived in.
fn review_output(json: &Value) -> Option<String> {
    let payload = json
        .get("payload")
        .filter(|p| p.get("type").and_then(Value::as_str) == Some("exited_review_mode"))
        .or_else(|| {
            json.get("msg")
                .filter(|m| m.get("type").and_then(Value::as_str) == Some("exited_review_mode"))
        })?;
    let output = payload.get("review_output")?;
    match output {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(_) => Some(output.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "rollout_tests.rs"]
mod tests;
