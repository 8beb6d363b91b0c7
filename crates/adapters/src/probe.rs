// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent capability probes: installation and dynamic model catalogs.
//!
//! `opencode models` and `pi --list-models` take no arguments and print one
//! model per line (pi prints `provider model` columns under a header the
//! parser skips). Every probe is bounded at 8 seconds; a probe that blows
//! the bound reports `Timeout`, never hangs the preflight.

use crate::subprocess::{run_with_timeout, PROBE_TIMEOUT};
use async_trait::async_trait;
use parking_lot::Mutex;
use rr_core::agent::AgentKind;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// How thorough the probe is. Part of the cache key, so a quick
/// install-only answer never shadows a full catalog enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeMode {
    /// Binary presence only.
    Install,
    /// Presence plus model catalog (for dynamic-catalog agents).
    Catalog,
}

impl ProbeMode {
    fn key(&self) -> &'static str {
        match self {
            ProbeMode::Install => "install",
            ProbeMode::Catalog => "catalog",
        }
    }
}

/// Probe result for one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    NotInstalled,
    /// Installed; `models` is empty for agents without a dynamic catalog
    /// or when the probe ran in `Install` mode.
    Installed { models: Vec<String> },
    /// Installed but the catalog probe blew its 8 s bound.
    Timeout,
}

impl ProbeOutcome {
    pub fn is_installed(&self) -> bool {
        !matches!(self, ProbeOutcome::NotInstalled)
    }

    pub fn models(&self) -> &[String] {
        match self {
            ProbeOutcome::Installed { models } => models,
            _ => &[],
        }
    }
}

/// Capability probe over external agent binaries.
#[async_trait]
pub trait CapabilityProbe: Send + Sync + 'static {
    async fn probe(&self, agent: AgentKind, mode: ProbeMode) -> ProbeOutcome;
}

/// Production probe: `--version` for presence, the agent's list command for
/// catalogs.
#[derive(Clone, Default)]
pub struct CliCapabilityProbe;

impl CliCapabilityProbe {
    pub fn new() -> Self {
        Self
    }

    async fn installed(agent: AgentKind) -> bool {
        let mut cmd = Command::new(agent.binary());
        cmd.arg("--version");
        matches!(
            run_with_timeout(cmd, PROBE_TIMEOUT, agent.binary()).await,
            Ok(output) if output.status.success()
        )
    }

    async fn catalog(agent: AgentKind) -> ProbeOutcome {
        let mut cmd = Command::new(agent.binary());
        match agent {
            AgentKind::OpenCode => {
                cmd.arg("models");
            }
            AgentKind::Pi => {
                cmd.arg("--list-models");
            }
            // Static catalogs: nothing to enumerate.
            _ => return ProbeOutcome::Installed { models: Vec::new() },
        }
        let description = format!("{} model catalog", agent.binary());
        match run_with_timeout(cmd, PROBE_TIMEOUT, &description).await {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let models = match agent {
                    AgentKind::Pi => parse_pi_models(&stdout),
                    _ => parse_model_lines(&stdout),
                };
                ProbeOutcome::Installed { models }
            }
            Ok(_) => ProbeOutcome::Installed { models: Vec::new() },
            Err(message) if message.contains("timed out") => ProbeOutcome::Timeout,
            Err(_) => ProbeOutcome::Installed { models: Vec::new() },
        }
    }
}

#[async_trait]
impl CapabilityProbe for CliCapabilityProbe {
    async fn probe(&self, agent: AgentKind, mode: ProbeMode) -> ProbeOutcome {
        if !Self::installed(agent).await {
            return ProbeOutcome::NotInstalled;
        }
        match mode {
            ProbeMode::Install => ProbeOutcome::Installed { models: Vec::new() },
            ProbeMode::Catalog => Self::catalog(agent).await,
        }
    }
}

/// One model per line; blanks ignored.
fn parse_model_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// `provider model` columns with a header line the parser skips.
/// Returned entries are `provider/model`.
fn parse_pi_models(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let provider = columns.next()?;
            let model = columns.next()?;
            Some(format!("{provider}/{model}"))
        })
        .collect()
}

/// Process-local probe cache keyed `{namespace}:{agent}:{probe_mode}`.
#[derive(Clone)]
pub struct CapabilityCache {
    namespace: String,
    probe: Arc<dyn CapabilityProbe>,
    entries: Arc<Mutex<HashMap<String, ProbeOutcome>>>,
}

impl CapabilityCache {
    pub fn new(namespace: impl Into<String>, probe: Arc<dyn CapabilityProbe>) -> Self {
        Self {
            namespace: namespace.into(),
            probe,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn key(&self, agent: AgentKind, mode: ProbeMode) -> String {
        format!("{}:{}:{}", self.namespace, agent.cli_name(), mode.key())
    }

    /// Cached probe; runs the underlying probe on a miss.
    pub async fn probe(&self, agent: AgentKind, mode: ProbeMode) -> ProbeOutcome {
        let key = self.key(agent, mode);
        if let Some(hit) = self.entries.lock().get(&key).cloned() {
            debug!(key, "capability cache hit");
            return hit;
        }
        let outcome = self.probe.probe(agent, mode).await;
        self.entries.lock().insert(key, outcome.clone());
        outcome
    }

    /// Drop the cached entry and probe again.
    pub async fn refresh(&self, agent: AgentKind, mode: ProbeMode) -> ProbeOutcome {
        let key = self.key(agent, mode);
        self.entries.lock().remove(&key);
        self.probe(agent, mode).await
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;

    /// Scriptable probe: answers from a table, counts invocations.
    #[derive(Clone, Default)]
    pub struct FakeCapabilityProbe {
        inner: Arc<Mutex<FakeState>>,
    }

    #[derive(Default)]
    struct FakeState {
        outcomes: HashMap<(AgentKind, ProbeMode), ProbeOutcome>,
        calls: u32,
    }

    impl FakeCapabilityProbe {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set(&self, agent: AgentKind, mode: ProbeMode, outcome: ProbeOutcome) {
            self.inner.lock().outcomes.insert((agent, mode), outcome);
        }

        pub fn set_installed_with_models(&self, agent: AgentKind, models: &[&str]) {
            let models = models.iter().map(|m| m.to_string()).collect::<Vec<_>>();
            self.set(
                agent,
                ProbeMode::Install,
                ProbeOutcome::Installed { models: Vec::new() },
            );
            self.set(agent, ProbeMode::Catalog, ProbeOutcome::Installed { models });
        }

        pub fn calls(&self) -> u32 {
            self.inner.lock().calls
        }
    }

    #[async_trait]
    impl CapabilityProbe for FakeCapabilityProbe {
        async fn probe(&self, agent: AgentKind, mode: ProbeMode) -> ProbeOutcome {
            let mut state = self.inner.lock();
            state.calls += 1;
            state
                .outcomes
                .get(&(agent, mode))
                .cloned()
                .unwrap_or(ProbeOutcome::NotInstalled)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeCapabilityProbe;

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
