// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decoder for `gemini --output-format stream-json`.
//!
//! Assistant text streams as `content` deltas that must be concatenated in
//! arrival order; the `finish` event closes the message, at which point the
//! joined text is surfaced.

use super::{get_str, AgentEvent, EventDecoder};
use serde_json::Value;

#[derive(Default)]
pub struct GeminiDecoder {
    accumulated: String,
}

impl GeminiDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventDecoder for GeminiDecoder {
    fn parse_line(&mut self, line: &str) -> Option<AgentEvent> {
        let json: Value = serde_json::from_str(line.trim()).ok()?;
        match get_str(&json, "type")? {
            "init" => Some(AgentEvent::Meta {
                description: "init".to_string(),
            }),
            "content" => {
                let delta = get_str(&json, "delta").unwrap_or_default().to_string();
                self.accumulated.push_str(&delta);
                Some(AgentEvent::AssistantDelta { delta })
            }
            "tool_call" => {
                let name = get_str(&json, "name").unwrap_or("tool").to_string();
                let detail = json
                    .get("args")
                    .map(|args| args.to_string())
                    .filter(|s| s != "null");
                Some(AgentEvent::ToolCall { name, detail })
            }
            "tool_result" => Some(AgentEvent::ToolResult {
                output: get_str(&json, "output").unwrap_or_default().to_string(),
            }),
            "finish" => Some(AgentEvent::Final {
                text: self.accumulated.clone(),
            }),
            "error" => Some(AgentEvent::Notice {
                text: get_str(&json, "message").unwrap_or_default().to_string(),
            }),
            _ => None,
        }
    }

    fn format_event(&self, event: &AgentEvent) -> Option<String> {
        match event {
            // Deltas surface whole at finish.
            AgentEvent::AssistantDelta { .. } => None,
            AgentEvent::Assistant { text } => Some(text.clone()),
            AgentEvent::ToolCall { name, detail } => Some(match detail {
                Some(detail) => format!("● {name}: {detail}"),
                None => format!("● {name}"),
            }),
            AgentEvent::Final { text } => Some(text.clone()),
            AgentEvent::Notice { text } => Some(format!("error: {text}")),
            AgentEvent::ToolResult { .. } | AgentEvent::Meta { .. } => None,
        }
    }
}

/// Final text: all `content` deltas joined in arrival order.
pub(super) fn extract_result(full_output: &str) -> Option<String> {
    let mut joined = String::new();
    for line in full_output.lines() {
        let Ok(json) = serde_json::from_str::<Value>(line.trim()) else {
            continue;
        };
        if get_str(&json, "type") == Some("content") {
            joined.push_str(get_str(&json, "delta").unwrap_or_default());
        }
    }
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

#[cfg(test)]
#[path = "gemini_tests.rs"]
mod tests;
