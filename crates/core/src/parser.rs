// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery of structured verdicts from free-form agent output.
//!
//! Agents are prompted to emit a single JSON object, but in practice the
//! object arrives wrapped in prose, inside a fenced code block, or with
//! small syntax damage. The ladder: fenced block in the result text, bare
//! object in the result text, fenced block in the raw transcript, bare
//! object in the raw transcript, then a single-shot repair pass over the
//! best candidate. Parse failure is data, not an error path.

use crate::summary::{FixSummary, ReviewSummary};
use serde::de::DeserializeOwned;
use std::fmt;

/// Where the accepted JSON came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSource {
    /// A ```json fenced block.
    Fenced,
    /// A bare object in the agent's final result text.
    Direct,
    /// A bare object scanned out of the raw transcript.
    LegacyDirect,
    /// Accepted only after the repair pass.
    Repaired,
}

impl fmt::Display for ParseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseSource::Fenced => write!(f, "fenced"),
            ParseSource::Direct => write!(f, "direct"),
            ParseSource::LegacyDirect => write!(f, "legacy-direct"),
            ParseSource::Repaired => write!(f, "repaired"),
        }
    }
}

/// Result of a structured-parse attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome<T> {
    pub value: Option<T>,
    pub source: Option<ParseSource>,
    pub used_repair: bool,
    pub failure_reason: Option<String>,
}

impl<T> ParseOutcome<T> {
    pub fn ok(&self) -> bool {
        self.value.is_some()
    }

    fn accepted(value: T, source: ParseSource) -> Self {
        Self {
            value: Some(value),
            source: Some(source),
            used_repair: source == ParseSource::Repaired,
            failure_reason: None,
        }
    }

    fn rejected(reason: String) -> Self {
        Self {
            value: None,
            source: None,
            used_repair: false,
            failure_reason: Some(reason),
        }
    }
}

/// Recover a validated [`ReviewSummary`] from reviewer output.
pub fn parse_review_summary(
    result_text: Option<&str>,
    raw_output: &str,
) -> ParseOutcome<ReviewSummary> {
    parse_summary(result_text, raw_output, ReviewSummary::validate)
}

/// Recover a validated [`FixSummary`] from fixer output.
pub fn parse_fix_summary(result_text: Option<&str>, raw_output: &str) -> ParseOutcome<FixSummary> {
    parse_summary(result_text, raw_output, FixSummary::validate)
}

fn parse_summary<T: DeserializeOwned>(
    result_text: Option<&str>,
    raw_output: &str,
    validate: impl Fn(&T) -> Result<(), String>,
) -> ParseOutcome<T> {
    let mut last_error = String::from("no JSON object found in output");
    // Candidates in preference order. Direct vs LegacyDirect records whether
    // the object came from the final result text or the raw transcript.
    let mut candidates: Vec<(&str, ParseSource)> = Vec::new();
    let mut fenced_storage: Vec<String> = Vec::new();

    if let Some(text) = result_text {
        if let Some(block) = fenced_json_block(text) {
            fenced_storage.push(block);
        }
    }
    if let Some(block) = fenced_json_block(raw_output) {
        fenced_storage.push(block);
    }
    for block in &fenced_storage {
        candidates.push((block.as_str(), ParseSource::Fenced));
    }
    if let Some(text) = result_text {
        if let Some(obj) = bare_object(text) {
            candidates.push((obj, ParseSource::Direct));
        }
    }
    if let Some(obj) = bare_object(raw_output) {
        candidates.push((obj, ParseSource::LegacyDirect));
    }

    for (candidate, source) in &candidates {
        match try_parse(candidate, &validate) {
            Ok(value) => return ParseOutcome::accepted(value, *source),
            Err(e) => last_error = e,
        }
    }

    // Single-shot repair pass over the best (first) candidate.
    if let Some((candidate, _)) = candidates.first() {
        let repaired = repair_json(candidate);
        match try_parse(&repaired, &validate) {
            Ok(value) => return ParseOutcome::accepted(value, ParseSource::Repaired),
            Err(e) => last_error = e,
        }
    }

    ParseOutcome::rejected(last_error)
}

fn try_parse<T: DeserializeOwned>(
    candidate: &str,
    validate: &impl Fn(&T) -> Result<(), String>,
) -> Result<T, String> {
    let value: T = serde_json::from_str(candidate).map_err(|e| e.to_string())?;
    validate(&value)?;
    Ok(value)
}

/// Extract the contents of the first ```json … ``` region.
fn fenced_json_block(text: &str) -> Option<String> {
    let open = text.find("```json")?;
    let body_start = open + "```json".len();
    let rest = &text[body_start..];
    let close = rest.find("```")?;
    Some(rest[..close].trim().to_string())
}

/// Slice from the first `{` to the last `}`, if both exist in order.
fn bare_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// One-shot repair: smart quotes to straight, literal control characters
/// inside strings escaped, trailing commas removed. ASCII-legal fixes only.
fn repair_json(input: &str) -> String {
    let dequoted: String = input
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect();

    let mut out = String::with_capacity(dequoted.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = dequoted.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            if escaped {
                out.push(c);
                escaped = false;
                continue;
            }
            match c {
                '\\' => {
                    out.push(c);
                    escaped = true;
                }
                '"' => {
                    out.push(c);
                    in_string = false;
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                other => out.push(other),
            }
            continue;
        }

        match c {
            '"' => {
                out.push(c);
                in_string = true;
            }
            ',' => {
                // Drop the comma if the next non-whitespace closes a scope.
                let mut lookahead = chars.clone();
                let mut next_significant = None;
                for la in lookahead.by_ref() {
                    if !la.is_whitespace() {
                        next_significant = Some(la);
                        break;
                    }
                }
                if matches!(next_significant, Some('}') | Some(']')) {
                    continue;
                }
                out.push(c);
            }
            other => out.push(other),
        }
    }

    out
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
