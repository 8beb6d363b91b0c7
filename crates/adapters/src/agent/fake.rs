// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake agent runner for deterministic engine testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{AgentRequest, AgentRunOutcome, AgentRunner};
use crate::sink::OutputSink;
use async_trait::async_trait;
use parking_lot::Mutex;
use rr_core::agent::{AgentRole, IterationResult};
use rr_core::cancel::{CancelKind, CancelToken};
use std::collections::VecDeque;
use std::sync::Arc;

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedRun {
    pub role: AgentRole,
    pub prompt: String,
    pub timeout_ms: u64,
}

/// Scripted response for one invocation.
#[derive(Debug, Clone)]
enum Scripted {
    Outcome(AgentRunOutcome),
    /// Assert the cancel token mid-run, then return the outcome.
    CancelDuring(CancelKind, AgentRunOutcome),
}

#[derive(Default)]
struct FakeState {
    runs: Vec<RecordedRun>,
    script: std::collections::HashMap<AgentRole, VecDeque<Scripted>>,
}

/// Fake agent runner: answers from a per-role script queue and records
/// every invocation.
#[derive(Clone, Default)]
pub struct FakeAgentRunner {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeAgentRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a full outcome for the next invocation of `role`.
    pub fn push_outcome(&self, role: AgentRole, outcome: AgentRunOutcome) {
        self.inner
            .lock()
            .script
            .entry(role)
            .or_default()
            .push_back(Scripted::Outcome(outcome));
    }

    /// Queue a success whose final text is `text`.
    pub fn push_success(&self, role: AgentRole, text: &str) {
        self.push_outcome(
            role,
            AgentRunOutcome {
                result: IterationResult {
                    success: true,
                    output: text.to_string(),
                    exit_code: 0,
                    duration_ms: 10,
                },
                final_text: Some(text.to_string()),
            },
        );
    }

    /// Queue a failure with the given exit code.
    pub fn push_failure(&self, role: AgentRole, exit_code: i32) {
        self.push_outcome(
            role,
            AgentRunOutcome {
                result: IterationResult::failed(
                    format!("[Error: exit {exit_code}]"),
                    exit_code,
                    10,
                ),
                final_text: None,
            },
        );
    }

    /// Queue an invocation that observes cancellation mid-run.
    pub fn push_cancel_during(&self, role: AgentRole, kind: CancelKind) {
        let outcome = AgentRunOutcome {
            result: IterationResult::failed("[Interrupted]", 130, 10),
            final_text: None,
        };
        self.inner
            .lock()
            .script
            .entry(role)
            .or_default()
            .push_back(Scripted::CancelDuring(kind, outcome));
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.inner.lock().runs.clone()
    }

    pub fn run_count(&self, role: AgentRole) -> usize {
        self.runs().iter().filter(|r| r.role == role).count()
    }
}

#[async_trait]
impl AgentRunner for FakeAgentRunner {
    async fn run_agent(
        &self,
        request: AgentRequest,
        _sink: Arc<dyn OutputSink>,
        cancel: CancelToken,
    ) -> AgentRunOutcome {
        let scripted = {
            let mut state = self.inner.lock();
            state.runs.push(RecordedRun {
                role: request.role,
                prompt: request.prompt.clone(),
                timeout_ms: request.timeout_ms,
            });
            state
                .script
                .get_mut(&request.role)
                .and_then(|queue| queue.pop_front())
        };
        match scripted {
            Some(Scripted::Outcome(outcome)) => outcome,
            Some(Scripted::CancelDuring(kind, outcome)) => {
                cancel.cancel(kind);
                outcome
            }
            None => AgentRunOutcome {
                result: IterationResult::failed("[Error: unscripted invocation]", 1, 0),
                final_text: None,
            },
        }
    }
}
