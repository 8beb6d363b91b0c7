// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rr-doctor: diagnostic preflight gating a run
//!
//! Checks installed agents (with bounded model-catalog probes), config
//! validity, git state, lockfile availability, and tmux presence, and can
//! apply a small whitelist of auto-fixes. The same report drives `rr init`
//! (lenient), `rr doctor` (informational), and `rr run` (strict).

mod checks;
mod fix;
mod report;

pub use checks::{
    run_preflight, GitProbe, PreflightInputs, SystemGitProbe, SystemTooling, ToolingProbe,
};
pub use fix::{all_errors_fixed, apply_fixes, fixes_allowed, FixOutcome};
pub use report::{DiagnosticItem, DiagnosticsReport, DoctorContext, Severity};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use checks::{FakeGitProbe, FakeTooling};
