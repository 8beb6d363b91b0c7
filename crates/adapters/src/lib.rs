// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rr-adapters: process, git, and tmux edges of the rr engine
//!
//! Everything that touches the outside world lives here behind a trait with
//! a fake implementation, so the engine can be driven deterministically in
//! tests. The agent runtime spawns external coding CLIs and decodes their
//! event streams; the checkpoint adapter shells out to git; the probes
//! answer "is this tool installed and what can it do".

pub mod agent;
mod checkpoint;
mod probe;
mod sink;
mod subprocess;
mod tmux;

pub use agent::{
    AgentRequest, AgentRunOutcome, AgentRunner, CliAgentRunner, RolloutLocator, TIMEOUT_EXIT_CODE,
};
pub use checkpoint::{Checkpoint, CheckpointAdapter, CheckpointError, CheckpointKind, GitCheckpoint};
pub use probe::{CapabilityCache, CapabilityProbe, CliCapabilityProbe, ProbeMode, ProbeOutcome};
pub use sink::{OutputSink, TracingSink};
pub use subprocess::run_with_timeout;
pub use tmux::{session_exists, tmux_installed, SystemProbe};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use agent::FakeAgentRunner;
#[cfg(any(test, feature = "test-support"))]
pub use checkpoint::{CheckpointCall, FakeCheckpoint};
#[cfg(any(test, feature = "test-support"))]
pub use probe::FakeCapabilityProbe;
#[cfg(any(test, feature = "test-support"))]
pub use sink::RecordingSink;
