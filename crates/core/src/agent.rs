// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity, role bindings, and invocation results.
//!
//! An agent is an externally installed coding CLI. rr never emulates one:
//! if the binary is missing the preflight fails the run. The closed
//! `AgentKind` set is what the runtime knows how to spawn and decode.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of coding CLIs rr knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    #[serde(rename = "claude")]
    ClaudeCode,
    #[serde(rename = "codex")]
    Codex,
    #[serde(rename = "cursor-agent")]
    Cursor,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "opencode")]
    OpenCode,
    #[serde(rename = "pi")]
    Pi,
}

impl AgentKind {
    pub const ALL: [AgentKind; 6] = [
        AgentKind::ClaudeCode,
        AgentKind::Codex,
        AgentKind::Cursor,
        AgentKind::Gemini,
        AgentKind::OpenCode,
        AgentKind::Pi,
    ];

    /// The binary name looked up on PATH.
    pub fn binary(&self) -> &'static str {
        match self {
            AgentKind::ClaudeCode => "claude",
            AgentKind::Codex => "codex",
            AgentKind::Cursor => "cursor-agent",
            AgentKind::Gemini => "gemini",
            AgentKind::OpenCode => "opencode",
            AgentKind::Pi => "pi",
        }
    }

    /// Name used in config files and diagnostics output.
    pub fn cli_name(&self) -> &'static str {
        self.binary()
    }

    pub fn from_cli_name(name: &str) -> Option<AgentKind> {
        Self::ALL.iter().copied().find(|k| k.cli_name() == name)
    }

    /// Whether stdout is a newline-delimited JSON event stream.
    pub fn uses_structured_stream(&self) -> bool {
        matches!(
            self,
            AgentKind::ClaudeCode | AgentKind::Codex | AgentKind::Cursor | AgentKind::Gemini
        )
    }

    /// Whether the agent advertises a dynamic model catalog that must be
    /// probed (`opencode models`, `pi --list-models`).
    pub fn has_dynamic_catalog(&self) -> bool {
        matches!(self, AgentKind::OpenCode | AgentKind::Pi)
    }

    /// Whether the agent requires both `provider` and `model` in its settings.
    pub fn requires_provider(&self) -> bool {
        matches!(self, AgentKind::Pi)
    }

    /// Whether the agent persists its review verdict in an on-disk session
    /// rollout file that the result extractor must prefer over stream text.
    pub fn has_session_rollout(&self) -> bool {
        matches!(self, AgentKind::Codex)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cli_name())
    }
}

/// Which seat an agent occupies in the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    #[serde(rename = "reviewer")]
    Reviewer,
    #[serde(rename = "fixer")]
    Fixer,
    #[serde(rename = "code-simplifier")]
    CodeSimplifier,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentRole::Reviewer => write!(f, "reviewer"),
            AgentRole::Fixer => write!(f, "fixer"),
            AgentRole::CodeSimplifier => write!(f, "code-simplifier"),
        }
    }
}

/// A role's binding to a concrete agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSettings {
    pub agent: AgentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl AgentSettings {
    pub fn new(agent: AgentKind) -> Self {
        Self {
            agent,
            model: None,
            provider: None,
            reasoning: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

/// What the reviewer is asked to look at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReviewOptions {
    /// Uncommitted changes in the working tree (the default).
    #[default]
    Uncommitted,
    /// Diff against a base branch.
    BaseBranch(String),
    /// A single commit.
    Commit(String),
    /// Free-form instructions replacing the diff selection.
    CustomInstructions(String),
}

/// Outcome of one agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationResult {
    /// `exit_code == 0`
    pub success: bool,
    /// Full transcript: stdout, then `\n[stderr]\n` + stderr when non-empty.
    pub output: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl IterationResult {
    pub fn failed(message: impl Into<String>, exit_code: i32, duration_ms: u64) -> Self {
        Self {
            success: false,
            output: message.into(),
            exit_code,
            duration_ms,
        }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
