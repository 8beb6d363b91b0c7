// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry budget and backoff arithmetic.
//!
//! Pure computation; the engine supplies the jitter draw so tests can pin
//! it. `delay = min(max_delay_ms, base_delay_ms * 2^attempt) + jitter`,
//! with jitter drawn uniformly from `[0, delay/2)`.

use serde::{Deserialize, Serialize};

/// Retry budget for a single agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

/// Backoff delay for the given zero-based attempt.
///
/// `jitter_unit` must lie in `[0, 1)`; the caller draws it (uniformly at
/// random in production, pinned in tests).
pub fn backoff_delay_ms(policy: &RetryPolicy, attempt: u32, jitter_unit: f64) -> u64 {
    let exponential = policy
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let capped = exponential.min(policy.max_delay_ms);
    let jitter = (jitter_unit.clamp(0.0, 1.0) * (capped as f64 / 2.0)) as u64;
    capped.saturating_add(jitter)
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
