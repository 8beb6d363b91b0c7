// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decoder for `cursor-agent --output-format stream-json`.
//!
//! The shape mirrors Claude's stream with one quirk: the completion object
//! carries the final text under a dedicated `finalText` field.

use super::{get_str, AgentEvent, EventDecoder};
use serde_json::Value;

#[derive(Default)]
pub struct CursorDecoder;

impl CursorDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl EventDecoder for CursorDecoder {
    fn parse_line(&mut self, line: &str) -> Option<AgentEvent> {
        let json: Value = serde_json::from_str(line.trim()).ok()?;
        match get_str(&json, "type")? {
            "system" => Some(AgentEvent::Meta {
                description: get_str(&json, "subtype").unwrap_or("system").to_string(),
            }),
            "assistant" => {
                let text: String = json
                    .get("message")?
                    .get("content")?
                    .as_array()?
                    .iter()
                    .filter(|b| get_str(b, "type") == Some("text"))
                    .filter_map(|b| get_str(b, "text"))
                    .collect::<Vec<_>>()
                    .join("\n");
                Some(AgentEvent::Assistant { text })
            }
            "tool_call" => {
                let name = json
                    .get("tool_call")
                    .and_then(|t| get_str(t, "name"))
                    .unwrap_or("tool")
                    .to_string();
                Some(AgentEvent::ToolCall { name, detail: None })
            }
            "result" => Some(AgentEvent::Final {
                text: get_str(&json, "finalText").unwrap_or_default().to_string(),
            }),
            _ => None,
        }
    }

    fn format_event(&self, event: &AgentEvent) -> Option<String> {
        match event {
            AgentEvent::Assistant { text } => Some(text.clone()),
            AgentEvent::ToolCall { name, .. } => Some(format!("● {name}")),
            AgentEvent::Final { text } => Some(text.clone()),
            AgentEvent::Notice { text } => Some(format!("error: {text}")),
            AgentEvent::ToolResult { .. }
            | AgentEvent::Meta { .. }
            | AgentEvent::AssistantDelta { .. } => None,
        }
    }
}

/// Final text: the last completion object's `finalText`.
pub(super) fn extract_result(full_output: &str) -> Option<String> {
    for line in full_output.lines().rev() {
        let Ok(json) = serde_json::from_str::<Value>(line.trim()) else {
            continue;
        };
        if get_str(&json, "type") != Some("result") {
            continue;
        }
        let text = get_str(&json, "finalText")?;
        if text.is_empty() {
            return None;
        }
        return Some(text.to_string());
    }
    None
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;
