// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured agent verdicts: what a reviewer found and what a fixer did.
//!
//! These are the wire types agents are prompted to emit. Deserialization is
//! tolerant of extras (unknown fields are dropped), but `validate()` is
//! strict about discriminants and numeric ranges so a half-formed verdict
//! never reaches the engine.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reviewer's overall verdict on the patch under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallCorrectness {
    #[serde(rename = "patch is correct")]
    Correct,
    #[serde(rename = "patch is incorrect")]
    Incorrect,
}

/// Line span of a finding, 1-based inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

/// Where in the tree a finding points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLocation {
    pub absolute_file_path: String,
    pub line_range: LineRange,
}

/// One issue the reviewer identified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub body: String,
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    pub code_location: CodeLocation,
}

/// The reviewer's structured verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub findings: Vec<Finding>,
    pub overall_correctness: OverallCorrectness,
    pub overall_explanation: String,
    pub overall_confidence_score: f64,
}

impl ReviewSummary {
    /// Range checks serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.overall_confidence_score) {
            return Err(format!(
                "overall_confidence_score {} outside [0, 1]",
                self.overall_confidence_score
            ));
        }
        for (i, finding) in self.findings.iter().enumerate() {
            if !(0.0..=1.0).contains(&finding.confidence_score) {
                return Err(format!(
                    "findings[{i}].confidence_score {} outside [0, 1]",
                    finding.confidence_score
                ));
            }
            if let Some(p) = finding.priority {
                if p > 3 {
                    return Err(format!("findings[{i}].priority {p} outside 0..3"));
                }
            }
            if finding.code_location.line_range.start > finding.code_location.line_range.end {
                return Err(format!("findings[{i}].line_range start > end"));
            }
        }
        Ok(())
    }
}

/// How much of the review the fixer chose to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixDecision {
    #[serde(rename = "NO_CHANGES_NEEDED")]
    NoChangesNeeded,
    #[serde(rename = "APPLY_SELECTIVELY")]
    ApplySelectively,
    #[serde(rename = "APPLY_MOST")]
    ApplyMost,
    #[serde(rename = "APPLY_ALL")]
    ApplyAll,
}

impl fmt::Display for FixDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FixDecision::NoChangesNeeded => "NO_CHANGES_NEEDED",
            FixDecision::ApplySelectively => "APPLY_SELECTIVELY",
            FixDecision::ApplyMost => "APPLY_MOST",
            FixDecision::ApplyAll => "APPLY_ALL",
        };
        write!(f, "{s}")
    }
}

/// Fix priority bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl Priority {
    pub fn index(&self) -> usize {
        match self {
            Priority::P0 => 0,
            Priority::P1 => 1,
            Priority::P2 => 2,
            Priority::P3 => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.index())
    }
}

/// One fix the fixer applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    pub priority: Priority,
    /// Absent and explicit `null` both mean "no single file".
    #[serde(default)]
    pub file: Option<String>,
    pub claim: String,
    pub evidence: String,
    pub fix: String,
}

/// One finding the fixer declined to act on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    pub reason: String,
}

/// The fixer's structured verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixSummary {
    pub decision: FixDecision,
    pub stop_iteration: bool,
    pub fixes: Vec<FixEntry>,
    pub skipped: Vec<SkippedEntry>,
}

impl FixSummary {
    /// A summary equivalent to the fixer's inline no-issues marker.
    pub fn no_changes_needed() -> Self {
        Self {
            decision: FixDecision::NoChangesNeeded,
            stop_iteration: true,
            fixes: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        // Discriminants and priorities are enforced by serde; nothing in the
        // fix summary carries a numeric range beyond them.
        Ok(())
    }
}

/// Accept `"3"` and `3` alike; agents disagree about id types.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
#[path = "summary_tests.rs"]
mod tests;
