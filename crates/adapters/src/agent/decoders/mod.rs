// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent NDJSON event decoders.
//!
//! A decoder turns one stdout line into an internal event and decides how
//! the event reads on the observer's stream. The runner's contract: a line
//! that is not a valid event is forwarded raw; a valid-but-noisy event is
//! suppressed; a displayable event is forwarded followed by one blank line.
//!
//! Events carry one of three semantic roles: assistant text, tool
//! call/result, final result. Delta-streaming agents accumulate assistant
//! text in decoder state and only surface it whole.

mod claude;
mod codex;
mod cursor;
mod gemini;

pub use claude::ClaudeDecoder;
pub use codex::CodexDecoder;
pub use cursor::CursorDecoder;
pub use gemini::GeminiDecoder;

use rr_core::agent::AgentKind;

/// Internal event model shared by all decoders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// Complete assistant text.
    Assistant { text: String },
    /// A fragment of assistant text; joined in arrival order.
    AssistantDelta { delta: String },
    /// The agent invoked a tool.
    ToolCall { name: String, detail: Option<String> },
    /// Output a tool returned to the agent.
    ToolResult { output: String },
    /// The agent's final result.
    Final { text: String },
    /// Stream bookkeeping (init banners, token counts). Never displayed.
    Meta { description: String },
    /// An error surfaced inside the stream.
    Notice { text: String },
}

/// How one line reads on the observer stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineVerdict {
    /// Not a valid event: forward the raw line.
    NotEvent,
    /// Valid but intentionally suppressed: forward nothing.
    Suppressed,
    /// Forward this text followed by a blank line.
    Display(String),
}

/// One agent's stream decoder. Holds per-invocation state (delta
/// accumulators), so the runner builds a fresh one per run.
pub trait EventDecoder: Send {
    fn parse_line(&mut self, line: &str) -> Option<AgentEvent>;

    /// `None` and `Some("")` both read as "suppress".
    fn format_event(&self, event: &AgentEvent) -> Option<String>;

    fn format_line(&mut self, line: &str) -> LineVerdict {
        match self.parse_line(line) {
            None => LineVerdict::NotEvent,
            Some(event) => match self.format_event(&event) {
                None => LineVerdict::Suppressed,
                Some(text) if text.is_empty() => LineVerdict::Suppressed,
                Some(text) => LineVerdict::Display(text),
            },
        }
    }
}

/// Fresh decoder for a structured-stream agent; `None` for plain-text ones.
pub fn decoder_for(kind: AgentKind) -> Option<Box<dyn EventDecoder>> {
    match kind {
        AgentKind::ClaudeCode => Some(Box::new(ClaudeDecoder::new())),
        AgentKind::Codex => Some(Box::new(CodexDecoder::new())),
        AgentKind::Cursor => Some(Box::new(CursorDecoder::new())),
        AgentKind::Gemini => Some(Box::new(GeminiDecoder::new())),
        AgentKind::OpenCode | AgentKind::Pi => None,
    }
}

/// Extract the canonical final-text artifact from a finished stream.
///
/// Plain-text agents return the whole transcript; structured agents replay
/// their stream shape. The codex session-rollout preference is layered on
/// top of this by the runner.
pub fn extract_stream_result(kind: AgentKind, full_output: &str) -> Option<String> {
    match kind {
        AgentKind::ClaudeCode => claude::extract_result(full_output),
        AgentKind::Codex => codex::extract_result(full_output),
        AgentKind::Cursor => cursor::extract_result(full_output),
        AgentKind::Gemini => gemini::extract_result(full_output),
        AgentKind::OpenCode | AgentKind::Pi => {
            let trimmed = full_output.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
    }
}

/// Strip `<system-reminder>…</system-reminder>` blocks, tags and enclosed
/// content both. Unbalanced opening tags drop the rest of the text.
pub fn strip_system_reminders(text: &str) -> String {
    const OPEN: &str = "<system-reminder>";
    const CLOSE: &str = "</system-reminder>";
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        match rest[start + OPEN.len()..].find(CLOSE) {
            Some(end) => {
                rest = &rest[start + OPEN.len() + end + CLOSE.len()..];
            }
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Extract a string field from a JSON object.
pub(crate) fn get_str<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
