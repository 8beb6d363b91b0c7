// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry driver for agent invocations.
//!
//! A non-zero exit is retried up to `retry.max_retries` times with
//! exponential backoff plus jitter. Retries never count as iterations,
//! and a cancellation observed between attempts stops the loop cold.

use rand::Rng;
use rr_adapters::{AgentRequest, AgentRunOutcome, AgentRunner, OutputSink};
use rr_core::cancel::CancelToken;
use rr_core::retry::{backoff_delay_ms, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Run one agent request, retrying per the policy.
///
/// Returns the last outcome together with how many invocations happened.
pub(crate) async fn run_with_retry<A: AgentRunner>(
    agents: &Arc<A>,
    request: &AgentRequest,
    policy: &RetryPolicy,
    sink: &Arc<dyn OutputSink>,
    cancel: &CancelToken,
) -> (AgentRunOutcome, u32) {
    let mut attempts = 0u32;
    loop {
        let outcome = agents
            .run_agent(request.clone(), Arc::clone(sink), cancel.clone())
            .await;
        attempts += 1;

        if outcome.result.success || cancel.is_cancelled() {
            return (outcome, attempts);
        }
        // `attempts - 1` retries have happened so far.
        if attempts > policy.max_retries {
            return (outcome, attempts);
        }

        let jitter: f64 = rand::rng().random::<f64>();
        let delay = backoff_delay_ms(policy, attempts - 1, jitter);
        warn!(
            role = %request.role,
            exit_code = outcome.result.exit_code,
            attempt = attempts,
            delay_ms = delay,
            "agent failed, retrying after backoff"
        );

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
            _ = cancel.cancelled() => {
                debug!(role = %request.role, "cancelled during retry backoff");
                return (outcome, attempts);
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
