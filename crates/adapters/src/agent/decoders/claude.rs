// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decoder for the Claude Code `stream-json` output format.
//!
//! Lines are JSON objects tagged by `type`: `system` (init bookkeeping),
//! `assistant` (text and tool_use content blocks), `user` (tool results,
//! which may interleave `<system-reminder>` blocks that must never reach
//! the log or the next prompt), and `result` (the completion object whose
//! `result` field carries the final text).

use super::{get_str, strip_system_reminders, AgentEvent, EventDecoder};
use serde_json::Value;

#[derive(Default)]
pub struct ClaudeDecoder;

impl ClaudeDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl EventDecoder for ClaudeDecoder {
    fn parse_line(&mut self, line: &str) -> Option<AgentEvent> {
        let json: Value = serde_json::from_str(line.trim()).ok()?;
        match get_str(&json, "type")? {
            "system" => Some(AgentEvent::Meta {
                description: get_str(&json, "subtype").unwrap_or("system").to_string(),
            }),
            "assistant" => {
                let content = json.get("message")?.get("content")?.as_array()?;
                // Tool use is the interesting part of a mixed message; plain
                // text only matters when there is no tool call.
                for block in content {
                    if get_str(block, "type") == Some("tool_use") {
                        let name = get_str(block, "name").unwrap_or("tool").to_string();
                        let detail = block.get("input").and_then(tool_detail);
                        return Some(AgentEvent::ToolCall { name, detail });
                    }
                }
                let text: String = content
                    .iter()
                    .filter(|b| get_str(b, "type") == Some("text"))
                    .filter_map(|b| get_str(b, "text"))
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.is_empty() {
                    return Some(AgentEvent::Meta {
                        description: "assistant".to_string(),
                    });
                }
                Some(AgentEvent::Assistant { text })
            }
            "user" => {
                let content = json.get("message")?.get("content")?.as_array()?;
                let output: String = content
                    .iter()
                    .filter(|b| get_str(b, "type") == Some("tool_result"))
                    .filter_map(tool_result_text)
                    .collect::<Vec<_>>()
                    .join("\n");
                Some(AgentEvent::ToolResult {
                    output: strip_system_reminders(&output),
                })
            }
            "result" => Some(AgentEvent::Final {
                text: get_str(&json, "result").unwrap_or_default().to_string(),
            }),
            _ => None,
        }
    }

    fn format_event(&self, event: &AgentEvent) -> Option<String> {
        match event {
            AgentEvent::Assistant { text } => Some(text.clone()),
            AgentEvent::ToolCall { name, detail } => Some(match detail {
                Some(detail) => format!("● {name}: {detail}"),
                None => format!("● {name}"),
            }),
            AgentEvent::Final { text } => Some(text.clone()),
            AgentEvent::Notice { text } => Some(format!("error: {text}")),
            AgentEvent::ToolResult { .. }
            | AgentEvent::Meta { .. }
            | AgentEvent::AssistantDelta { .. } => None,
        }
    }
}

/// Human-oriented one-liner for a tool invocation.
fn tool_detail(input: &Value) -> Option<String> {
    get_str(input, "command")
        .or_else(|| get_str(input, "file_path"))
        .or_else(|| get_str(input, "pattern"))
        .map(|s| {
            if s.len() > 80 {
                format!("{}...", &s[..77])
            } else {
                s.to_string()
            }
        })
}

/// Tool result content is either a string or a list of content blocks.
fn tool_result_text(block: &Value) -> Option<String> {
    match block.get("content")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(|p| get_str(p, "text"))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        _ => None,
    }
}

/// Final text: the last `result` event's `result` field.
pub(super) fn extract_result(full_output: &str) -> Option<String> {
    for line in full_output.lines().rev() {
        let Ok(json) = serde_json::from_str::<Value>(line.trim()) else {
            continue;
        };
        if get_str(&json, "type") != Some("result") {
            continue;
        }
        let text = get_str(&json, "result")?;
        let cleaned = strip_system_reminders(text);
        if cleaned.is_empty() {
            return None;
        }
        return Some(cleaned);
    }
    None
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
