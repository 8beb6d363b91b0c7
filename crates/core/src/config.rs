// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rr configuration: role bindings and engine tuning.
//!
//! Loaded from `rr.toml` at the project root. Discovery beyond that single
//! path belongs to the CLI; this module owns the schema, defaults, and
//! validation hooks the doctor builds on.

use crate::agent::{AgentKind, AgentRole, AgentSettings};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default per-invocation agent timeout: 30 minutes.
pub const DEFAULT_AGENT_TIMEOUT_MS: u64 = 30 * 60 * 1000;

/// Errors from config load/store
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config not found at {0}")]
    NotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top-level rr configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reviewer: AgentSettings,
    pub fixer: AgentSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_simplifier: Option<AgentSettings>,
    pub max_iterations: u32,
    pub agent_timeout_ms: u64,
    pub retry: RetryPolicy,
    /// How many days back the codex session-rollout search looks.
    pub rollout_window_days: u32,
    /// Override for the state directory holding locks and session logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reviewer: AgentSettings::new(AgentKind::ClaudeCode),
            fixer: AgentSettings::new(AgentKind::ClaudeCode),
            code_simplifier: None,
            max_iterations: 5,
            agent_timeout_ms: DEFAULT_AGENT_TIMEOUT_MS,
            retry: RetryPolicy::default(),
            rollout_window_days: 2,
            logs_dir: None,
        }
    }
}

impl Config {
    /// Canonical config path for a project.
    pub fn default_path(project_path: &Path) -> PathBuf {
        project_path.join("rr.toml")
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Write a default config, overwriting whatever is there.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(&Config::default())?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Settings bound to a role, if the role is configured.
    pub fn settings_for(&self, role: AgentRole) -> Option<&AgentSettings> {
        match role {
            AgentRole::Reviewer => Some(&self.reviewer),
            AgentRole::Fixer => Some(&self.fixer),
            AgentRole::CodeSimplifier => self.code_simplifier.as_ref(),
        }
    }

    /// Roles that are actually configured, in cycle order.
    pub fn configured_roles(&self) -> Vec<(AgentRole, &AgentSettings)> {
        let mut roles = Vec::new();
        if let Some(s) = &self.code_simplifier {
            roles.push((AgentRole::CodeSimplifier, s));
        }
        roles.push((AgentRole::Reviewer, &self.reviewer));
        roles.push((AgentRole::Fixer, &self.fixer));
        roles
    }

    /// State directory holding lockfiles and per-project session logs.
    ///
    /// `logs_dir` override wins; otherwise `$XDG_STATE_HOME/rr/logs` with a
    /// `~/.local/state` fallback.
    pub fn logs_dir(&self) -> PathBuf {
        if let Some(dir) = &self.logs_dir {
            return dir.clone();
        }
        default_logs_dir()
    }
}

/// `$XDG_STATE_HOME/rr/logs`, falling back to `~/.local/state/rr/logs`.
pub fn default_logs_dir() -> PathBuf {
    let state_root = std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .or_else(dirs::state_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
        .unwrap_or_else(|| PathBuf::from("."));
    state_root.join("rr").join("logs")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
