// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The preflight checks.

use crate::report::{DiagnosticItem, DiagnosticsReport, DoctorContext, Severity};
use async_trait::async_trait;
use rr_adapters::{run_with_timeout, CapabilityCache, ProbeMode, ProbeOutcome};
use rr_core::agent::AgentKind;
use rr_core::clock::Clock;
use rr_core::config::{Config, ConfigError};
use rr_storage::LockStore;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Git observations the preflight needs.
#[async_trait]
pub trait GitProbe: Send + Sync + 'static {
    async fn is_repository(&self, project_path: &Path) -> bool;
    async fn has_uncommitted_changes(&self, project_path: &Path) -> bool;
}

/// Real git probe.
#[derive(Clone, Default)]
pub struct SystemGitProbe;

#[async_trait]
impl GitProbe for SystemGitProbe {
    async fn is_repository(&self, project_path: &Path) -> bool {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(project_path)
            .args(["rev-parse", "--is-inside-work-tree"]);
        matches!(
            run_with_timeout(cmd, Duration::from_secs(10), "git rev-parse").await,
            Ok(output) if output.status.success()
        )
    }

    async fn has_uncommitted_changes(&self, project_path: &Path) -> bool {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(project_path)
            .args(["status", "--porcelain"]);
        match run_with_timeout(cmd, Duration::from_secs(10), "git status").await {
            Ok(output) if output.status.success() => !output.stdout.is_empty(),
            _ => false,
        }
    }
}

/// Non-agent tooling observations (tmux).
#[async_trait]
pub trait ToolingProbe: Send + Sync + 'static {
    async fn tmux_installed(&self) -> bool;
}

/// Real tooling probe.
#[derive(Clone, Default)]
pub struct SystemTooling;

#[async_trait]
impl ToolingProbe for SystemTooling {
    async fn tmux_installed(&self) -> bool {
        rr_adapters::tmux_installed().await
    }
}

/// Everything `run_preflight` consumes.
pub struct PreflightInputs<'a, C: Clock> {
    pub context: DoctorContext,
    pub project_path: PathBuf,
    /// Review target overrides: `(base_branch, commit_sha)`.
    pub base_branch: Option<String>,
    pub commit_sha: Option<String>,
    pub capabilities: &'a CapabilityCache,
    pub locks: &'a LockStore<C>,
    pub git: &'a dyn GitProbe,
    pub tooling: &'a dyn ToolingProbe,
}

/// Run every check and assemble the report.
pub async fn run_preflight<C: Clock>(inputs: PreflightInputs<'_, C>) -> DiagnosticsReport {
    let mut report = DiagnosticsReport::default();

    check_agents(&inputs, &mut report).await;
    let config = check_config(&inputs, &mut report).await;
    check_git(&inputs, &mut report).await;
    check_lockfile(&inputs, &mut report).await;
    check_tmux(&inputs, &mut report).await;

    report.config = config;
    report
}

/// Record installed / not-installed per supported agent, enumerating the
/// model catalog for dynamic-catalog agents.
async fn check_agents<C: Clock>(inputs: &PreflightInputs<'_, C>, report: &mut DiagnosticsReport) {
    for kind in AgentKind::ALL {
        let mode = if kind.has_dynamic_catalog() {
            ProbeMode::Catalog
        } else {
            ProbeMode::Install
        };
        let outcome = inputs.capabilities.probe(kind, mode).await;
        debug!(agent = %kind, ?outcome, "agent probe");
        let check = format!("agent.{kind}");
        match &outcome {
            ProbeOutcome::NotInstalled => {
                report.push(DiagnosticItem::ok(check, format!("{kind} not installed")));
            }
            ProbeOutcome::Installed { models } if models.is_empty() => {
                report.push(DiagnosticItem::ok(check, format!("{kind} installed")));
            }
            ProbeOutcome::Installed { models } => {
                report.push(DiagnosticItem::ok(
                    check,
                    format!("{kind} installed, {} models", models.len()),
                ));
            }
            ProbeOutcome::Timeout => {
                report.push(DiagnosticItem::warning(
                    check,
                    format!("{kind} model catalog probe timed out"),
                ));
            }
        }
        report.capabilities_by_agent.insert(kind, outcome);
    }
}

/// Config presence, parseability, and per-role validity.
async fn check_config<C: Clock>(
    inputs: &PreflightInputs<'_, C>,
    report: &mut DiagnosticsReport,
) -> Option<Config> {
    let path = Config::default_path(&inputs.project_path);
    let config = match Config::load(&path) {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) => {
            let severity = match inputs.context {
                DoctorContext::Run => Severity::Error,
                _ => Severity::Warning,
            };
            report.push(
                DiagnosticItem {
                    check: "config".to_string(),
                    severity,
                    message: format!("no config at {}", path.display()),
                    fixable: true,
                },
            );
            return None;
        }
        Err(e) => {
            let severity = match inputs.context {
                DoctorContext::Run => Severity::Error,
                _ => Severity::Warning,
            };
            report.push(DiagnosticItem {
                check: "config".to_string(),
                severity,
                message: format!("config is invalid: {e}"),
                fixable: true,
            });
            return None;
        }
    };

    for (role, settings) in config.configured_roles() {
        let check = format!("config.{role}");
        let kind = settings.agent;
        let capability = report.capabilities_by_agent.get(&kind);
        let installed = capability.is_some_and(ProbeOutcome::is_installed);
        if !installed {
            report.push(DiagnosticItem::error(
                check,
                format!("{role} is bound to {kind}, which is not installed"),
            ));
            continue;
        }
        if kind.requires_provider() && (settings.provider.is_none() || settings.model.is_none()) {
            report.push(DiagnosticItem::error(
                check,
                format!("{kind} requires both provider and model for the {role} role"),
            ));
            continue;
        }
        if kind.has_dynamic_catalog() {
            if let Some(model) = &settings.model {
                let catalog = capability.map(|c| c.models()).unwrap_or_default();
                let qualified = settings
                    .provider
                    .as_ref()
                    .map(|p| format!("{p}/{model}"))
                    .unwrap_or_else(|| model.clone());
                let known = catalog.iter().any(|m| m == model || *m == qualified);
                if !catalog.is_empty() && !known {
                    let severity = match inputs.context {
                        DoctorContext::Run => Severity::Error,
                        _ => Severity::Warning,
                    };
                    report.push(DiagnosticItem {
                        check,
                        severity,
                        message: format!("model {model} is not in the {kind} catalog"),
                        fixable: false,
                    });
                    continue;
                }
            }
        }
        report.push(DiagnosticItem::ok(check, format!("{role}: {kind}")));
    }

    Some(config)
}

/// `run` requires a repository and (absent explicit refs) uncommitted work.
async fn check_git<C: Clock>(inputs: &PreflightInputs<'_, C>, report: &mut DiagnosticsReport) {
    if inputs.context != DoctorContext::Run {
        return;
    }
    if !inputs.git.is_repository(&inputs.project_path).await {
        report.push(DiagnosticItem::error(
            "git",
            format!("{} is not inside a git repository", inputs.project_path.display()),
        ));
        return;
    }
    let has_explicit_target = inputs.base_branch.is_some() || inputs.commit_sha.is_some();
    if !has_explicit_target && !inputs.git.has_uncommitted_changes(&inputs.project_path).await {
        report.push(DiagnosticItem::error(
            "git",
            "no uncommitted changes to review",
        ));
        return;
    }
    report.push(DiagnosticItem::ok("git", "repository ready"));
}

/// `run` requires no active lock (stale ones are cleaned first).
async fn check_lockfile<C: Clock>(inputs: &PreflightInputs<'_, C>, report: &mut DiagnosticsReport) {
    if inputs.context != DoctorContext::Run {
        return;
    }
    let lock_path = inputs.locks.lock_path(&inputs.project_path);
    match inputs.locks.has_active_lockfile(&lock_path).await {
        Ok(true) => {
            report.push(
                DiagnosticItem::error(
                    "lockfile",
                    "another session holds the lock for this project",
                )
                .fixable(),
            );
        }
        Ok(false) => report.push(DiagnosticItem::ok("lockfile", "no active lock")),
        Err(e) => report.push(DiagnosticItem::warning(
            "lockfile",
            format!("lock check failed: {e}"),
        )),
    }
}

async fn check_tmux<C: Clock>(inputs: &PreflightInputs<'_, C>, report: &mut DiagnosticsReport) {
    if inputs.tooling.tmux_installed().await {
        report.push(DiagnosticItem::ok("tmux", "tmux installed"));
        return;
    }
    let item = match inputs.context {
        DoctorContext::Run => DiagnosticItem::error("tmux", "tmux is not installed"),
        _ => DiagnosticItem::warning("tmux", "tmux is not installed"),
    };
    report.push(item.fixable());
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fakes {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Scriptable git probe.
    #[derive(Clone)]
    pub struct FakeGitProbe {
        state: Arc<Mutex<(bool, bool)>>,
    }

    impl FakeGitProbe {
        pub fn new(is_repo: bool, has_changes: bool) -> Self {
            Self {
                state: Arc::new(Mutex::new((is_repo, has_changes))),
            }
        }
    }

    #[async_trait]
    impl GitProbe for FakeGitProbe {
        async fn is_repository(&self, _project_path: &Path) -> bool {
            self.state.lock().0
        }

        async fn has_uncommitted_changes(&self, _project_path: &Path) -> bool {
            self.state.lock().1
        }
    }

    /// Scriptable tooling probe.
    #[derive(Clone)]
    pub struct FakeTooling {
        tmux: Arc<Mutex<bool>>,
    }

    impl FakeTooling {
        pub fn new(tmux: bool) -> Self {
            Self {
                tmux: Arc::new(Mutex::new(tmux)),
            }
        }

        pub fn set_tmux(&self, installed: bool) {
            *self.tmux.lock() = installed;
        }
    }

    #[async_trait]
    impl ToolingProbe for FakeTooling {
        async fn tmux_installed(&self) -> bool {
            *self.tmux.lock()
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fakes::{FakeGitProbe, FakeTooling};

#[cfg(test)]
#[path = "checks_tests.rs"]
mod tests;
