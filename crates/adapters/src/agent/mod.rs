// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent runtime: spawning external coding CLIs and decoding their streams.
//!
//! Each supported CLI is described by a small capability table (binary,
//! argv builder, env builder, structured-stream flag, decoder): a
//! discriminated tag plus per-kind functions, no inheritance. The runner
//! tees stdout/stderr to an observer while buffering the transcript, and
//! extracts the canonical final-text artifact the structured parser
//! consumes downstream.

pub mod decoders;
mod rollout;
mod runner;
mod spec;

pub use rollout::RolloutLocator;
pub use runner::{CliAgentRunner, TIMEOUT_EXIT_CODE};
pub use spec::AgentSpec;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeAgentRunner, RecordedRun};

use crate::sink::OutputSink;
use async_trait::async_trait;
use rr_core::agent::{AgentRole, AgentSettings, IterationResult, ReviewOptions};
use rr_core::cancel::CancelToken;
use std::sync::Arc;

/// One agent invocation.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub role: AgentRole,
    pub settings: AgentSettings,
    /// May be empty; the agent is still launched.
    pub prompt: String,
    /// Per-invocation timeout; `0` disables the timer.
    pub timeout_ms: u64,
    pub review_options: ReviewOptions,
}

/// Transcript plus the canonical final-text artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRunOutcome {
    pub result: IterationResult,
    /// The agent's final result text, when one could be extracted.
    /// For the codex-class reviewer this prefers the on-disk session
    /// rollout over the stream.
    pub final_text: Option<String>,
}

/// Runs agents. The engine only sees this trait, so tests script every
/// invocation.
#[async_trait]
pub trait AgentRunner: Send + Sync + 'static {
    async fn run_agent(
        &self,
        request: AgentRequest,
        sink: Arc<dyn OutputSink>,
        cancel: CancelToken,
    ) -> AgentRunOutcome;
}
