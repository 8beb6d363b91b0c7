// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The end-to-end cycle scenarios, checked against what actually lands on
//! disk: session log, summary sidecar, and lockfile.

use crate::prelude::*;
use rr_core::agent::{AgentKind, AgentRole, AgentSettings};
use rr_core::cancel::CancelKind;
use rr_core::lock::LockState;
use rr_core::log::{fold_summary, SessionEvent, SessionStatus};
use rr_engine::CycleOptions;
use rr_storage::{read_log, read_summary};

fn event_shape(events: &[SessionEvent]) -> (usize, usize, usize) {
    let system = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::System { .. }))
        .count();
    let iterations = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Iteration(_)))
        .count();
    let ends = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::SessionEnd { .. }))
        .count();
    (system, iterations, ends)
}

#[tokio::test]
async fn clean_pass_leaves_consistent_artifacts() {
    let h = SpecHarness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    let result = h
        .run(SpecHarness::config(3, 0), CycleOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(result.final_status, SessionStatus::Completed);
    assert_eq!(result.iterations, 1);
    assert!(result.reason.contains("No issues"), "{}", result.reason);

    // Log: one system, one iteration, one session_end.
    let events = read_log(&h.log_path).expect("read log");
    assert_eq!(event_shape(&events), (1, 1, 1));

    // Sidecar equals the pure fold of the log.
    let summary = read_summary(&h.log_path).expect("read summary");
    assert_eq!(summary, fold_summary(&events));
    assert_eq!(summary.status, SessionStatus::Completed);
    assert!(summary.has_iteration);

    // Lock ended completed with a reason.
    let lock = h.lock_on_disk().await;
    assert_eq!(lock.state, LockState::Completed);
    assert!(lock.reason.as_deref().unwrap_or("").contains("No issues"));
    assert!(lock.end_time.is_some());
}

#[tokio::test]
async fn max_iterations_reached_reports_remaining_issues() {
    let h = SpecHarness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_CONTINUE_JSON);

    let result = h
        .run(SpecHarness::config(1, 0), CycleOptions::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.final_status, SessionStatus::Completed);
    assert_eq!(result.iterations, 1);
    assert!(
        result.reason.contains("Max iterations (1) reached"),
        "{}",
        result.reason
    );

    let summary = read_summary(&h.log_path).expect("read summary");
    assert_eq!(summary.total_fixes, 1);
    assert_eq!(summary.priority_counts.p1, 1);
    assert_eq!(summary.stop_iteration, Some(false));
}

#[tokio::test]
async fn reviewer_retries_then_succeeds() {
    let h = SpecHarness::new();
    h.runner.push_failure(AgentRole::Reviewer, 30);
    h.runner.push_failure(AgentRole::Reviewer, 31);
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    let result = h
        .run(SpecHarness::config(3, 2), CycleOptions::default())
        .await;

    assert!(result.success, "{}", result.reason);
    assert_eq!(h.runner.run_count(AgentRole::Reviewer), 3);
    assert_eq!(h.runner.run_count(AgentRole::Fixer), 1);
}

#[tokio::test]
async fn fixer_failure_rolls_back_and_fails_the_session() {
    let h = SpecHarness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_failure(AgentRole::Fixer, 17);

    let result = h
        .run(SpecHarness::config(3, 0), CycleOptions::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.final_status, SessionStatus::Failed);
    assert!(result.reason.contains("Fixer failed with exit code 17"));
    assert!(result.reason.contains("Changes were rolled back"));
    assert_eq!(h.checkpoints.rollback_count(), 1);

    let events = read_log(&h.log_path).expect("read log");
    let entry = events
        .iter()
        .find_map(|e| match e {
            SessionEvent::Iteration(entry) => Some(entry),
            _ => None,
        })
        .expect("iteration entry");
    let error = entry.error.as_ref().expect("error recorded");
    assert_eq!(error.phase, AgentRole::Fixer);
    assert_eq!(error.exit_code, Some(17));
    assert!(entry.rollback.as_ref().is_some_and(|r| r.success));

    let summary = read_summary(&h.log_path).expect("read summary");
    assert_eq!(summary.rollback_count, 1);
    assert_eq!(summary.rollback_failures, 0);

    assert_eq!(h.lock_on_disk().await.state, LockState::Failed);
}

#[tokio::test]
async fn cancellation_during_reviewer_interrupts_without_fixer() {
    let h = SpecHarness::new();
    h.runner
        .push_cancel_during(AgentRole::Reviewer, CancelKind::Interrupt);

    let result = h
        .run(SpecHarness::config(3, 2), CycleOptions::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.final_status, SessionStatus::Interrupted);
    assert_eq!(result.iterations, 1);
    assert!(
        result.reason.contains("interrupted before fixer"),
        "{}",
        result.reason
    );
    assert_eq!(h.runner.run_count(AgentRole::Fixer), 0);
    assert_eq!(h.lock_on_disk().await.state, LockState::Interrupted);
}

#[tokio::test]
async fn codex_parse_fallback_persists_raw_text_on_the_lock() {
    let h = SpecHarness::new();
    h.runner
        .push_success(AgentRole::Reviewer, "prose, not a summary");
    h.runner
        .push_success(AgentRole::Reviewer, "retry prose, still not a summary");
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    let mut config = SpecHarness::config(3, 0);
    config.reviewer = AgentSettings::new(AgentKind::Codex);

    let result = h.run(config, CycleOptions::default()).await;
    assert!(result.success, "{}", result.reason);

    let lock = h.lock_on_disk().await;
    assert_eq!(
        lock.codex_review_text.as_deref(),
        Some("prose, not a summary")
    );
    assert!(lock.review_summary.is_none());
    assert_eq!(h.runner.run_count(AgentRole::Fixer), 1);
}

#[tokio::test]
async fn summary_sidecar_matches_fold_after_every_scenario() {
    let h = SpecHarness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_CONTINUE_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    h.run(SpecHarness::config(5, 0), CycleOptions::default())
        .await;

    let events = read_log(&h.log_path).expect("read log");
    assert_eq!(event_shape(&events), (1, 2, 1));
    let summary = read_summary(&h.log_path).expect("read summary");
    assert_eq!(summary, fold_summary(&events));
}
