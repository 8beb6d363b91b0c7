// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decoder for `codex exec --json`.
//!
//! Lines wrap a `msg` object tagged by `type`. Assistant text arrives as
//! `agent_message_delta` fragments that must be concatenated in arrival
//! order; shell commands come wrapped as `["/bin/sh", "-c", "<cmd>"]` and
//! the wrapper is stripped for display. `task_complete` carries the final
//! text in `last_agent_message`.

use super::{get_str, AgentEvent, EventDecoder};
use serde_json::Value;

#[derive(Default)]
pub struct CodexDecoder {
    /// Assistant deltas joined in arrival order.
    accumulated: String,
}

impl CodexDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventDecoder for CodexDecoder {
    fn parse_line(&mut self, line: &str) -> Option<AgentEvent> {
        let json: Value = serde_json::from_str(line.trim()).ok()?;
        let msg = json.get("msg")?;
        match get_str(msg, "type")? {
            "agent_message_delta" => {
                let delta = get_str(msg, "delta").unwrap_or_default().to_string();
                self.accumulated.push_str(&delta);
                Some(AgentEvent::AssistantDelta { delta })
            }
            "agent_message" => Some(AgentEvent::Assistant {
                text: get_str(msg, "message").unwrap_or_default().to_string(),
            }),
            "exec_command_begin" => {
                let command = msg
                    .get("command")
                    .and_then(Value::as_array)
                    .map(|argv| unwrap_shell_command(argv))
                    .unwrap_or_default();
                Some(AgentEvent::ToolCall {
                    name: "shell".to_string(),
                    detail: Some(command),
                })
            }
            "exec_command_end" => {
                let exit = msg.get("exit_code").and_then(Value::as_i64).unwrap_or(0);
                Some(AgentEvent::ToolResult {
                    output: format!("exit {exit}"),
                })
            }
            "token_count" => Some(AgentEvent::Meta {
                description: "token_count".to_string(),
            }),
            "task_started" => Some(AgentEvent::Meta {
                description: "task_started".to_string(),
            }),
            "task_complete" => Some(AgentEvent::Final {
                text: get_str(msg, "last_agent_message")
                    .unwrap_or_default()
                    .to_string(),
            }),
            "error" => Some(AgentEvent::Notice {
                text: get_str(msg, "message").unwrap_or_default().to_string(),
            }),
            _ => None,
        }
    }

    fn format_event(&self, event: &AgentEvent) -> Option<String> {
        match event {
            AgentEvent::Assistant { text } => Some(text.clone()),
            // Deltas surface whole at task_complete.
            AgentEvent::AssistantDelta { .. } => None,
            AgentEvent::ToolCall { name, detail } => Some(match detail {
                Some(detail) => format!("● {name}: {detail}"),
                None => format!("● {name}"),
            }),
            AgentEvent::Final { text } => {
                if text.is_empty() {
                    Some(self.accumulated.clone())
                } else {
                    Some(text.clone())
                }
            }
            AgentEvent::Notice { text } => Some(format!("error: {text}")),
            AgentEvent::ToolResult { .. } | AgentEvent::Meta { .. } => None,
        }
    }
}

/// The command extractor strips the `/bin/sh -c '<cmd>'` wrapper.
fn unwrap_shell_command(argv: &[Value]) -> String {
    let parts: Vec<&str> = argv.iter().filter_map(Value::as_str).collect();
    match parts.as_slice() {
        [shell, "-c", cmd, ..] if shell.ends_with("sh") => (*cmd).to_string(),
        _ => parts.join(" "),
    }
}

/// Final text from the stream: the last `task_complete.last_agent_message`,
/// falling back to the joined deltas.
pub(super) fn extract_result(full_output: &str) -> Option<String> {
    let mut deltas = String::new();
    let mut last_complete: Option<String> = None;
    for line in full_output.lines() {
        let Ok(json) = serde_json::from_str::<Value>(line.trim()) else {
            continue;
        };
        let Some(msg) = json.get("msg") else { continue };
        match get_str(msg, "type") {
            Some("agent_message_delta") => {
                deltas.push_str(get_str(msg, "delta").unwrap_or_default());
            }
            Some("task_complete") => {
                if let Some(text) = get_str(msg, "last_agent_message") {
                    if !text.is_empty() {
                        last_complete = Some(text.to_string());
                    }
                }
            }
            _ => {}
        }
    }
    last_complete.or(if deltas.is_empty() {
        None
    } else {
        Some(deltas)
    })
}

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;
