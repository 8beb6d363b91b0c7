// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-kind capability table: argv and env construction.

use rr_core::agent::{AgentKind, AgentRole, AgentSettings, ReviewOptions};

/// Capability table entry for one agent kind.
///
/// Stateless; the kind tag selects the behavior. The prompt itself is
/// built elsewhere; this only knows how to put it on a command line.
#[derive(Debug, Clone, Copy)]
pub struct AgentSpec {
    pub kind: AgentKind,
}

impl AgentSpec {
    pub fn for_kind(kind: AgentKind) -> Self {
        Self { kind }
    }

    pub fn command(&self) -> &'static str {
        self.kind.binary()
    }

    /// Build the argv for one invocation.
    pub fn build_args(
        &self,
        role: AgentRole,
        prompt: &str,
        settings: &AgentSettings,
        review_options: &ReviewOptions,
    ) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        match self.kind {
            AgentKind::ClaudeCode => {
                args.extend(strings(&["-p", prompt, "--output-format", "stream-json", "--verbose"]));
                if let Some(model) = &settings.model {
                    args.extend(strings(&["--model", model]));
                }
                if role != AgentRole::Reviewer {
                    args.extend(strings(&["--permission-mode", "acceptEdits"]));
                }
            }
            AgentKind::Codex => {
                args.extend(strings(&["exec", "--json"]));
                if let Some(model) = &settings.model {
                    args.extend(strings(&["-m", model]));
                }
                if let Some(reasoning) = &settings.reasoning {
                    args.push("-c".to_string());
                    args.push(format!("model_reasoning_effort={reasoning}"));
                }
                match role {
                    AgentRole::Reviewer => args.extend(strings(&["--sandbox", "read-only"])),
                    _ => args.push("--full-auto".to_string()),
                }
                match review_options {
                    ReviewOptions::BaseBranch(branch) => {
                        args.push("-c".to_string());
                        args.push(format!("review.base_branch={branch}"));
                    }
                    ReviewOptions::Commit(sha) => {
                        args.push("-c".to_string());
                        args.push(format!("review.commit={sha}"));
                    }
                    _ => {}
                }
                args.push(prompt.to_string());
            }
            AgentKind::Cursor => {
                args.extend(strings(&["-p", prompt, "--output-format", "stream-json"]));
                if let Some(model) = &settings.model {
                    args.extend(strings(&["--model", model]));
                }
                if role != AgentRole::Reviewer {
                    args.push("--force".to_string());
                }
            }
            AgentKind::Gemini => {
                args.extend(strings(&["--output-format", "stream-json", "-p", prompt]));
                if let Some(model) = &settings.model {
                    args.extend(strings(&["--model", model]));
                }
                if role != AgentRole::Reviewer {
                    args.push("--yolo".to_string());
                }
            }
            AgentKind::OpenCode => {
                args.extend(strings(&["run", prompt]));
                match (&settings.provider, &settings.model) {
                    (Some(provider), Some(model)) => {
                        args.push("--model".to_string());
                        args.push(format!("{provider}/{model}"));
                    }
                    (None, Some(model)) => {
                        args.extend(strings(&["--model", model]));
                    }
                    _ => {}
                }
            }
            AgentKind::Pi => {
                if let Some(provider) = &settings.provider {
                    args.extend(strings(&["--provider", provider]));
                }
                if let Some(model) = &settings.model {
                    args.extend(strings(&["--model", model]));
                }
                args.extend(strings(&["-p", prompt]));
            }
        }
        args
    }

    /// Environment overlay on top of the inherited parent env.
    pub fn build_env(&self) -> Vec<(String, String)> {
        let mut env = vec![("NO_COLOR".to_string(), "1".to_string())];
        if self.kind == AgentKind::ClaudeCode {
            // Keep update chatter out of the event stream.
            env.push((
                "DISABLE_AUTOUPDATER".to_string(),
                "1".to_string(),
            ));
        }
        env
    }
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
