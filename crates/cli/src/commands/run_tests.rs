// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    clean_completion   = { SessionStatus::Completed, true, false, 0 },
    max_reached        = { SessionStatus::Completed, false, false, 1 },
    failed             = { SessionStatus::Failed, false, false, 1 },
    interrupted        = { SessionStatus::Interrupted, false, false, 1 },
    stopped            = { SessionStatus::Stopped, false, false, 1 },
    timeout_wins       = { SessionStatus::Completed, true, true, 124 },
    timeout_on_failure = { SessionStatus::Failed, false, true, 124 },
)]
fn exit_codes(status: SessionStatus, success: bool, timed_out: bool, expected: i32) {
    assert_eq!(exit_code(&status, success, timed_out), expected);
}
