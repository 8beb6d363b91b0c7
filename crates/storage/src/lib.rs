// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rr-storage: durable session logs and the per-project lockfile store

mod lockfile;
mod session_log;
mod slug;

pub use lockfile::{timeouts, LivenessProbe, LockError, LockStore, StaleReason};
#[cfg(any(test, feature = "test-support"))]
pub use lockfile::FakeProbe;
pub use session_log::{
    delete_session_files, read_log, read_log_incremental, read_summary, session_log_path,
    summary_path, LogRead, LogReadState, SessionLog, SessionLogError,
};
pub use slug::project_slug;
