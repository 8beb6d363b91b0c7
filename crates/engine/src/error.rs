// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type

use thiserror::Error;

/// Errors the cycle engine cannot absorb into a terminal status on its own.
///
/// Everything here funnels into the `session_end { status: failed,
/// reason: "Unexpected error: …" }` finally-path.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("session log append failed: {0}")]
    Log(String),
    #[error("{0}")]
    Internal(String),
}
