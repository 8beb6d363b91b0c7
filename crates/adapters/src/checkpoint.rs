// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Working-tree checkpoints around the fixer phase.
//!
//! A checkpoint is an opaque restorable token, never a permanent commit.
//! Dirty trees are captured with `git stash create` + `git stash store`
//! (the tree itself is untouched); clean trees just record HEAD. Rollback
//! resets to HEAD and, for a dirty checkpoint, re-applies the stashed
//! state, so a failed fixer leaves the tree exactly as the reviewer saw it.

use crate::subprocess::{run_with_timeout, GIT_TIMEOUT};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors from checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("not a git repository: {0}")]
    NotARepo(PathBuf),
    #[error("git {op} failed: {message}")]
    Git { op: &'static str, message: String },
}

/// What the checkpoint captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointKind {
    /// Tree was clean; `id` is the HEAD ref.
    Clean,
    /// Tree was dirty; `id` is the stash commit.
    Dirty,
}

/// Opaque restorable snapshot of the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub kind: CheckpointKind,
    /// Stash commit for dirty trees, HEAD for clean ones.
    pub id: String,
    /// HEAD at creation time; rollback resets here.
    pub base: String,
    pub label: String,
}

/// Adapter over the local VCS.
#[async_trait]
pub trait CheckpointAdapter: Send + Sync + 'static {
    /// Snapshot the working tree. Never commits permanently.
    async fn create(&self, project_path: &Path, label: &str)
        -> Result<Checkpoint, CheckpointError>;

    /// Restore the tree to the snapshot. Fails only if the VCS refuses.
    async fn rollback(
        &self,
        project_path: &Path,
        checkpoint: &Checkpoint,
    ) -> Result<(), CheckpointError>;

    /// Forget the snapshot after a successful iteration. Errors are logged
    /// but never raised to the caller.
    async fn discard(&self, project_path: &Path, checkpoint: &Checkpoint);
}

/// Git-backed checkpoint adapter.
#[derive(Clone, Default)]
pub struct GitCheckpoint;

impl GitCheckpoint {
    pub fn new() -> Self {
        Self
    }

    async fn git(
        project_path: &Path,
        args: &[&str],
        op: &'static str,
    ) -> Result<String, CheckpointError> {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(project_path).args(args);
        let output = run_with_timeout(cmd, GIT_TIMEOUT, op)
            .await
            .map_err(|message| CheckpointError::Git { op, message })?;
        if !output.status.success() {
            return Err(CheckpointError::Git {
                op,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl CheckpointAdapter for GitCheckpoint {
    async fn create(
        &self,
        project_path: &Path,
        label: &str,
    ) -> Result<Checkpoint, CheckpointError> {
        let inside = Self::git(
            project_path,
            &["rev-parse", "--is-inside-work-tree"],
            "rev-parse",
        )
        .await
        .map_err(|_| CheckpointError::NotARepo(project_path.to_path_buf()))?;
        if inside != "true" {
            return Err(CheckpointError::NotARepo(project_path.to_path_buf()));
        }

        let head = Self::git(project_path, &["rev-parse", "HEAD"], "rev-parse HEAD").await?;
        let status = Self::git(project_path, &["status", "--porcelain"], "status").await?;
        if status.is_empty() {
            debug!(project = %project_path.display(), label, "clean tree, checkpoint is HEAD");
            return Ok(Checkpoint {
                kind: CheckpointKind::Clean,
                id: head.clone(),
                base: head,
                label: label.to_string(),
            });
        }

        // `stash create` builds the stash commit without touching the tree.
        let stash = Self::git(project_path, &["stash", "create", label], "stash create").await?;
        if stash.is_empty() {
            // Only untracked noise; capture HEAD and treat as clean.
            return Ok(Checkpoint {
                kind: CheckpointKind::Clean,
                id: head.clone(),
                base: head,
                label: label.to_string(),
            });
        }
        // Keep a ref so gc cannot collect it while the fixer runs.
        Self::git(
            project_path,
            &["stash", "store", "-m", label, &stash],
            "stash store",
        )
        .await?;
        debug!(project = %project_path.display(), stash = %stash, label, "dirty tree checkpointed");
        Ok(Checkpoint {
            kind: CheckpointKind::Dirty,
            id: stash,
            base: head,
            label: label.to_string(),
        })
    }

    async fn rollback(
        &self,
        project_path: &Path,
        checkpoint: &Checkpoint,
    ) -> Result<(), CheckpointError> {
        // Drop whatever the fixer did, tracked and untracked.
        Self::git(project_path, &["reset", "--hard", &checkpoint.base], "reset").await?;
        Self::git(project_path, &["clean", "-fd"], "clean").await?;
        if checkpoint.kind == CheckpointKind::Dirty {
            // Restore the pre-fixer dirty state.
            Self::git(
                project_path,
                &["stash", "apply", &checkpoint.id],
                "stash apply",
            )
            .await?;
        }
        Ok(())
    }

    async fn discard(&self, project_path: &Path, checkpoint: &Checkpoint) {
        if checkpoint.kind != CheckpointKind::Dirty {
            return;
        }
        // Find the stored stash ref by commit id and drop it.
        let list = match Self::git(
            project_path,
            &["stash", "list", "--format=%gd %H"],
            "stash list",
        )
        .await
        {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "discard: stash list failed");
                return;
            }
        };
        let entry = list
            .lines()
            .find(|line| line.ends_with(&checkpoint.id))
            .and_then(|line| line.split_whitespace().next())
            .map(str::to_string);
        let Some(stash_ref) = entry else {
            debug!(stash = %checkpoint.id, "discard: stash entry already gone");
            return;
        };
        if let Err(e) = Self::git(
            project_path,
            &["stash", "drop", &stash_ref],
            "stash drop",
        )
        .await
        {
            warn!(error = %e, stash = %stash_ref, "discard: stash drop failed");
        }
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recorded call to FakeCheckpoint
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum CheckpointCall {
        Create { label: String },
        Rollback { id: String },
        Discard { id: String },
    }

    /// Fake checkpoint adapter for deterministic engine tests.
    #[derive(Clone, Default)]
    pub struct FakeCheckpoint {
        inner: Arc<Mutex<FakeState>>,
    }

    #[derive(Default)]
    struct FakeState {
        calls: Vec<CheckpointCall>,
        next_id: u32,
        fail_create: bool,
        fail_rollback: bool,
    }

    impl FakeCheckpoint {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<CheckpointCall> {
            self.inner.lock().calls.clone()
        }

        pub fn set_fail_create(&self, fail: bool) {
            self.inner.lock().fail_create = fail;
        }

        pub fn set_fail_rollback(&self, fail: bool) {
            self.inner.lock().fail_rollback = fail;
        }

        pub fn rollback_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, CheckpointCall::Rollback { .. }))
                .count()
        }

        pub fn discard_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, CheckpointCall::Discard { .. }))
                .count()
        }
    }

    #[async_trait]
    impl CheckpointAdapter for FakeCheckpoint {
        async fn create(
            &self,
            _project_path: &Path,
            label: &str,
        ) -> Result<Checkpoint, CheckpointError> {
            let mut state = self.inner.lock();
            state.calls.push(CheckpointCall::Create {
                label: label.to_string(),
            });
            if state.fail_create {
                return Err(CheckpointError::Git {
                    op: "stash create",
                    message: "injected create failure".to_string(),
                });
            }
            state.next_id += 1;
            Ok(Checkpoint {
                kind: CheckpointKind::Dirty,
                id: format!("ckpt-{}", state.next_id),
                base: "head".to_string(),
                label: label.to_string(),
            })
        }

        async fn rollback(
            &self,
            _project_path: &Path,
            checkpoint: &Checkpoint,
        ) -> Result<(), CheckpointError> {
            let mut state = self.inner.lock();
            state.calls.push(CheckpointCall::Rollback {
                id: checkpoint.id.clone(),
            });
            if state.fail_rollback {
                return Err(CheckpointError::Git {
                    op: "stash apply",
                    message: "injected rollback failure".to_string(),
                });
            }
            Ok(())
        }

        async fn discard(&self, _project_path: &Path, checkpoint: &Checkpoint) {
            self.inner.lock().calls.push(CheckpointCall::Discard {
                id: checkpoint.id.clone(),
            });
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{CheckpointCall, FakeCheckpoint};

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
