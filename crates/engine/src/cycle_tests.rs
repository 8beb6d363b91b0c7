// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::deps::{FakeLockSink, FakeSessionSink};
use crate::prompts::DefaultPromptBuilder;
use rr_adapters::{FakeAgentRunner, FakeCheckpoint, RecordingSink};
use rr_core::agent::AgentKind;
use rr_core::agent::AgentSettings;
use rr_core::clock::FakeClock;
use rr_core::retry::RetryPolicy;

const REVIEW_JSON: &str = r#"{"findings":[],"overall_correctness":"patch is correct","overall_explanation":"looks fine","overall_confidence_score":0.9}"#;

const FIX_STOP_JSON: &str = r#"{"decision":"NO_CHANGES_NEEDED","stop_iteration":true,"fixes":[],"skipped":[]}"#;

const FIX_CONTINUE_JSON: &str = r#"{"decision":"APPLY_SELECTIVELY","stop_iteration":false,"fixes":[{"id":"1","title":"t","priority":"P1","file":null,"claim":"c","evidence":"e","fix":"f"}],"skipped":[]}"#;

struct Harness {
    runner: FakeAgentRunner,
    checkpoints: FakeCheckpoint,
    locks: FakeLockSink,
    log: FakeSessionSink,
    cancel: CancelToken,
}

impl Harness {
    fn new() -> Self {
        Self {
            runner: FakeAgentRunner::new(),
            checkpoints: FakeCheckpoint::new(),
            locks: FakeLockSink::new(),
            log: FakeSessionSink::new(),
            cancel: CancelToken::new(),
        }
    }

    fn config(max_iterations: u32, max_retries: u32) -> Config {
        let mut config = Config::default();
        config.max_iterations = max_iterations;
        config.retry = RetryPolicy {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 4,
        };
        config
    }

    fn engine(
        &self,
        config: Config,
        options: CycleOptions,
    ) -> CycleEngine<FakeAgentRunner, FakeCheckpoint, FakeClock> {
        let deps = EngineDeps {
            agents: Arc::new(self.runner.clone()),
            checkpoints: Arc::new(self.checkpoints.clone()),
            clock: FakeClock::new(),
            locks: Arc::new(self.locks.clone()),
            log: Arc::new(self.log.clone()),
            prompts: Arc::new(DefaultPromptBuilder),
            sink: Arc::new(RecordingSink::new()),
        };
        let context = CycleContext {
            project_path: PathBuf::from("/repo"),
            session_id: "sess-1".to_string(),
            session_name: "test-session".to_string(),
            branch: Some("main".to_string()),
        };
        CycleEngine::new(config, deps, context, options, self.cancel.clone())
    }

    fn counts(&self) -> (usize, usize, usize) {
        let events = self.log.events();
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

    fn end_status(&self) -> Option<SessionStatus> {
        self.log.events().iter().rev().find_map(|e| match e {
            SessionEvent::SessionEnd { status, .. } => Some(*status),
            _ => None,
        })
    }

    fn iteration_entries(&self) -> Vec<IterationEntry> {
        self.log
            .events()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Iteration(entry) => Some(entry.clone()),
                _ => None,
            })
            .collect()
    }
}

// --- Scenario 1: clean pass ---

#[tokio::test]
async fn clean_pass_completes_in_one_iteration() {
    let h = Harness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    let result = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .run()
        .await;

    assert!(result.success);
    assert_eq!(result.final_status, SessionStatus::Completed);
    assert_eq!(result.iterations, 1);
    assert!(result.reason.contains("No issues"), "{}", result.reason);

    assert_eq!(h.counts(), (1, 1, 1));
    assert_eq!(h.end_status(), Some(SessionStatus::Completed));
    assert_eq!(h.locks.last_pushed_state(), Some(LockState::Completed));
    // One checkpoint, discarded exactly once, never rolled back.
    assert_eq!(h.checkpoints.discard_count(), 1);
    assert_eq!(h.checkpoints.rollback_count(), 0);
}

// --- Scenario 2: max iterations with remaining issues ---

#[tokio::test]
async fn max_iterations_reached_with_remaining_issues() {
    let h = Harness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_CONTINUE_JSON);

    let result = h
        .engine(Harness::config(1, 0), CycleOptions::default())
        .run()
        .await;

    assert!(!result.success);
    assert_eq!(result.final_status, SessionStatus::Completed);
    assert_eq!(result.iterations, 1);
    assert!(
        result.reason.contains("Max iterations (1) reached"),
        "{}",
        result.reason
    );
    assert_eq!(h.checkpoints.discard_count(), 1);
}

// --- Scenario 3: reviewer retried twice, then succeeds ---

#[tokio::test]
async fn reviewer_retries_exhaust_then_succeed() {
    let h = Harness::new();
    h.runner.push_failure(AgentRole::Reviewer, 30);
    h.runner.push_failure(AgentRole::Reviewer, 31);
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    let result = h
        .engine(Harness::config(3, 2), CycleOptions::default())
        .run()
        .await;

    assert!(result.success, "{}", result.reason);
    assert_eq!(h.runner.run_count(AgentRole::Reviewer), 3);
    assert_eq!(h.runner.run_count(AgentRole::Fixer), 1);
    // Retries never count as iterations.
    assert_eq!(result.iterations, 1);
}

#[tokio::test]
async fn reviewer_retries_exhausted_aborts_iteration() {
    let h = Harness::new();
    h.runner.push_failure(AgentRole::Reviewer, 30);
    h.runner.push_failure(AgentRole::Reviewer, 31);
    h.runner.push_failure(AgentRole::Reviewer, 32);

    let result = h
        .engine(Harness::config(3, 2), CycleOptions::default())
        .run()
        .await;

    assert!(!result.success);
    assert_eq!(result.final_status, SessionStatus::Failed);
    assert!(
        result.reason.contains("Reviewer failed with exit code 32"),
        "{}",
        result.reason
    );
    let entries = h.iteration_entries();
    assert_eq!(entries.len(), 1);
    let error = entries[0].error.as_ref().unwrap();
    assert_eq!(error.phase, AgentRole::Reviewer);
    assert_eq!(error.exit_code, Some(32));
    // Reviewer failure happens before the checkpoint exists.
    assert_eq!(h.checkpoints.rollback_count(), 0);
}

// --- Scenario 4: fixer fails after checkpoint ---

#[tokio::test]
async fn fixer_failure_rolls_back_exactly_once() {
    let h = Harness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_failure(AgentRole::Fixer, 17);

    let result = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .run()
        .await;

    assert!(!result.success);
    assert_eq!(result.final_status, SessionStatus::Failed);
    assert!(
        result.reason.contains("Fixer failed with exit code 17"),
        "{}",
        result.reason
    );
    assert!(
        result.reason.contains("Changes were rolled back"),
        "{}",
        result.reason
    );

    assert_eq!(h.checkpoints.rollback_count(), 1);
    assert_eq!(h.checkpoints.discard_count(), 0);

    let entries = h.iteration_entries();
    assert_eq!(entries.len(), 1);
    let error = entries[0].error.as_ref().unwrap();
    assert_eq!(error.phase, AgentRole::Fixer);
    assert_eq!(error.exit_code, Some(17));
    let rollback = entries[0].rollback.as_ref().unwrap();
    assert!(rollback.attempted && rollback.success);
}

#[tokio::test]
async fn failed_rollback_is_recorded_and_session_still_ends() {
    let h = Harness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_failure(AgentRole::Fixer, 9);
    h.checkpoints.set_fail_rollback(true);

    let result = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .run()
        .await;

    assert_eq!(result.final_status, SessionStatus::Failed);
    let entries = h.iteration_entries();
    let rollback = entries[0].rollback.as_ref().unwrap();
    assert!(rollback.attempted && !rollback.success);
    assert!(rollback.reason.is_some());
    // The session log still closed cleanly.
    assert_eq!(h.counts().2, 1);
}

// --- Scenario 5: cancellation during reviewer ---

#[tokio::test]
async fn cancellation_during_reviewer_interrupts_before_fixer() {
    let h = Harness::new();
    h.runner
        .push_cancel_during(AgentRole::Reviewer, CancelKind::Interrupt);

    let result = h
        .engine(Harness::config(3, 2), CycleOptions::default())
        .run()
        .await;

    assert!(!result.success);
    assert_eq!(result.final_status, SessionStatus::Interrupted);
    assert_eq!(result.iterations, 1);
    assert!(
        result.reason.contains("interrupted before fixer"),
        "{}",
        result.reason
    );
    // No fixer invocation, no retry of the killed reviewer.
    assert_eq!(h.runner.run_count(AgentRole::Fixer), 0);
    assert_eq!(h.runner.run_count(AgentRole::Reviewer), 1);
    assert_eq!(h.end_status(), Some(SessionStatus::Interrupted));
    assert_eq!(h.locks.last_pushed_state(), Some(LockState::Interrupted));
}

#[tokio::test]
async fn cancellation_before_start_interrupts_without_iterations() {
    let h = Harness::new();
    h.cancel.cancel(CancelKind::Interrupt);

    let result = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .run()
        .await;

    assert_eq!(result.final_status, SessionStatus::Interrupted);
    assert_eq!(result.iterations, 0);
    assert!(
        result.reason.contains("interrupted before iteration start"),
        "{}",
        result.reason
    );
    assert_eq!(h.runner.runs().len(), 0);
}

#[tokio::test]
async fn cancellation_during_fixer_still_rolls_back() {
    let h = Harness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner
        .push_cancel_during(AgentRole::Fixer, CancelKind::Interrupt);

    let result = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .run()
        .await;

    assert_eq!(result.final_status, SessionStatus::Interrupted);
    assert_eq!(h.checkpoints.rollback_count(), 1);
    assert!(
        result.reason.contains("during fixer"),
        "{}",
        result.reason
    );
}

#[tokio::test]
async fn stop_request_ends_as_stopped() {
    let h = Harness::new();
    h.runner
        .push_cancel_during(AgentRole::Reviewer, CancelKind::Stop);

    let result = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .run()
        .await;

    assert_eq!(result.final_status, SessionStatus::Stopped);
    assert!(result.reason.contains("stopped"), "{}", result.reason);
    assert_eq!(h.locks.last_pushed_state(), Some(LockState::Stopped));
}

// --- Scenario 6: codex-class format-retry fallback ---

#[tokio::test]
async fn codex_reviewer_parse_failure_falls_back_to_raw_text() {
    let h = Harness::new();
    h.runner
        .push_success(AgentRole::Reviewer, "prose without any json");
    h.runner
        .push_success(AgentRole::Reviewer, "still prose on retry");
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    let mut config = Harness::config(3, 0);
    config.reviewer = AgentSettings::new(AgentKind::Codex);

    let result = h.engine(config, CycleOptions::default()).run().await;

    assert!(result.success, "{}", result.reason);
    // Two reviewer invocations: original plus exactly one format retry.
    assert_eq!(h.runner.run_count(AgentRole::Reviewer), 2);
    // The retry prompt carried the reminder.
    let prompts: Vec<_> = h
        .runner
        .runs()
        .into_iter()
        .filter(|r| r.role == AgentRole::Reviewer)
        .map(|r| r.prompt)
        .collect();
    assert!(prompts[1].contains("REMINDER"));
    // Lockfile got the raw text, not a structured summary.
    assert_eq!(
        h.locks.last_codex_review_text().as_deref(),
        Some("prose without any json")
    );
    assert!(!h.locks.pushed_review_summary());
    // Engine continued to the fixer.
    assert_eq!(h.runner.run_count(AgentRole::Fixer), 1);
}

#[tokio::test]
async fn non_codex_reviewer_parse_failure_falls_through_without_lock_text() {
    let h = Harness::new();
    h.runner.push_success(AgentRole::Reviewer, "prose");
    h.runner.push_success(AgentRole::Reviewer, "prose again");
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    let result = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .run()
        .await;

    assert!(result.success, "{}", result.reason);
    assert_eq!(h.locks.last_codex_review_text(), None);
    assert!(!h.locks.pushed_review_summary());
    assert_eq!(h.runner.run_count(AgentRole::Fixer), 1);
}

// --- fixer parse handling ---

#[tokio::test]
async fn fixer_parse_failure_after_retry_rolls_back_and_aborts() {
    let h = Harness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, "not a summary");
    h.runner.push_success(AgentRole::Fixer, "still not a summary");

    let result = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .run()
        .await;

    assert!(!result.success);
    assert_eq!(result.final_status, SessionStatus::Failed);
    assert!(
        result.reason.contains("Changes were rolled back"),
        "{}",
        result.reason
    );
    assert_eq!(h.runner.run_count(AgentRole::Fixer), 2);
    assert_eq!(h.checkpoints.rollback_count(), 1);
}

#[tokio::test]
async fn fixer_parse_succeeds_on_format_retry() {
    let h = Harness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, "garbled");
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    let result = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .run()
        .await;

    assert!(result.success, "{}", result.reason);
    assert_eq!(h.checkpoints.rollback_count(), 0);
    assert_eq!(h.checkpoints.discard_count(), 1);
}

#[tokio::test]
async fn no_issues_marker_is_equivalent_to_stop() {
    let h = Harness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner
        .push_success(AgentRole::Fixer, "Everything checks out. NO_ISSUES_FOUND");

    let result = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .run()
        .await;

    assert!(result.success, "{}", result.reason);
    assert_eq!(result.iterations, 1);
    let entries = h.iteration_entries();
    let fixes = entries[0].fixes.as_ref().unwrap();
    assert_eq!(fixes.decision, FixDecision::NoChangesNeeded);
    assert!(fixes.stop_iteration);
}

// --- checkpoint failure ---

#[tokio::test]
async fn checkpoint_failure_aborts_without_rollback() {
    let h = Harness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.checkpoints.set_fail_create(true);

    let result = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .run()
        .await;

    assert!(!result.success);
    assert!(
        result.reason.contains("Failed to create pre-fixer checkpoint"),
        "{}",
        result.reason
    );
    // Nothing to roll back to.
    assert_eq!(h.checkpoints.rollback_count(), 0);
    assert_eq!(h.runner.run_count(AgentRole::Fixer), 0);
    let entries = h.iteration_entries();
    assert_eq!(entries[0].error.as_ref().unwrap().phase, AgentRole::Fixer);
}

// --- force max iterations / multi-iteration flow ---

#[tokio::test]
async fn force_max_iterations_overrides_stop() {
    let h = Harness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    let options = CycleOptions {
        force_max_iterations: true,
        ..CycleOptions::default()
    };
    let result = h.engine(Harness::config(2, 0), options).run().await;

    // stop_iteration was true both times but the operator forced the loop on.
    assert_eq!(result.iterations, 2);
    assert!(result.reason.contains("Max iterations (2) reached"));
    assert_eq!(h.checkpoints.discard_count(), 2);
}

#[tokio::test]
async fn continue_decision_runs_another_iteration() {
    let h = Harness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_CONTINUE_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    let result = h
        .engine(Harness::config(5, 0), CycleOptions::default())
        .run()
        .await;

    assert!(result.success);
    assert_eq!(result.iterations, 2);
    assert_eq!(h.counts(), (1, 2, 1));
    assert_eq!(h.checkpoints.discard_count(), 2);
}

// --- simplifier ---

#[tokio::test]
async fn simplifier_runs_before_reviewer_when_enabled() {
    let h = Harness::new();
    h.runner.push_success(AgentRole::CodeSimplifier, "simplified");
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    let mut config = Harness::config(3, 0);
    config.code_simplifier = Some(AgentSettings::new(AgentKind::ClaudeCode));
    let options = CycleOptions {
        simplifier: true,
        ..CycleOptions::default()
    };

    let result = h.engine(config, options).run().await;
    assert!(result.success, "{}", result.reason);

    let roles: Vec<_> = h.runner.runs().into_iter().map(|r| r.role).collect();
    assert_eq!(
        roles,
        vec![
            AgentRole::CodeSimplifier,
            AgentRole::Reviewer,
            AgentRole::Fixer
        ]
    );
}

#[tokio::test]
async fn simplifier_failure_aborts_the_iteration() {
    let h = Harness::new();
    h.runner.push_failure(AgentRole::CodeSimplifier, 3);

    let mut config = Harness::config(3, 0);
    config.code_simplifier = Some(AgentSettings::new(AgentKind::ClaudeCode));
    let options = CycleOptions {
        simplifier: true,
        ..CycleOptions::default()
    };

    let result = h.engine(config, options).run().await;
    assert!(!result.success);
    assert!(
        result.reason.contains("Code simplifier failed with exit code 3"),
        "{}",
        result.reason
    );
    assert_eq!(h.runner.run_count(AgentRole::Reviewer), 0);
}

// --- lock and log coupling ---

#[tokio::test]
async fn running_is_pushed_after_the_first_successful_launch() {
    let h = Harness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    let result = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .run()
        .await;
    assert!(result.success, "{}", result.reason);

    // pending -> running -> completed, with running flipped exactly once.
    let states: Vec<_> = h.locks.patches().iter().filter_map(|p| p.state).collect();
    assert_eq!(states, vec![LockState::Running, LockState::Completed]);
}

#[tokio::test]
async fn lock_never_reaches_running_when_no_agent_launches() {
    let h = Harness::new();
    // Every reviewer attempt fails; no agent run ever succeeds.
    h.runner.push_failure(AgentRole::Reviewer, 30);
    h.runner.push_failure(AgentRole::Reviewer, 31);
    h.runner.push_failure(AgentRole::Reviewer, 32);

    let result = h
        .engine(Harness::config(3, 2), CycleOptions::default())
        .run()
        .await;
    assert!(!result.success);

    let states: Vec<_> = h.locks.patches().iter().filter_map(|p| p.state).collect();
    assert!(
        !states.contains(&LockState::Running),
        "lock reached running without a successful launch: {states:?}"
    );
    assert_eq!(states.last(), Some(&LockState::Failed));
}

#[tokio::test]
async fn lock_push_failures_never_fail_the_run() {
    let h = Harness::new();
    h.locks.set_fail_pushes(true);
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    let result = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .run()
        .await;
    assert!(result.success, "{}", result.reason);
}

#[tokio::test]
async fn log_append_failure_is_an_unexpected_error() {
    let h = Harness::new();
    h.log.set_fail_appends(true);
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    let result = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .run()
        .await;

    assert!(!result.success);
    assert_eq!(result.final_status, SessionStatus::Failed);
    assert!(
        result.reason.contains("Unexpected error"),
        "{}",
        result.reason
    );
    // The terminal lock push still happened.
    assert_eq!(h.locks.last_pushed_state(), Some(LockState::Failed));
}

#[tokio::test]
async fn timeout_exit_code_is_flagged_on_the_result() {
    let h = Harness::new();
    h.runner.push_failure(AgentRole::Reviewer, 124);

    let result = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .run()
        .await;

    assert!(result.timed_out);
    assert!(result.reason.contains("exit code 124"), "{}", result.reason);
}

#[tokio::test]
async fn iteration_callback_fires_per_phase() {
    let h = Harness::new();
    h.runner.push_success(AgentRole::Reviewer, REVIEW_JSON);
    h.runner.push_success(AgentRole::Fixer, FIX_STOP_JSON);

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let engine = h
        .engine(Harness::config(3, 0), CycleOptions::default())
        .with_iteration_callback(move |iteration, role| {
            sink.lock().push((iteration, role));
        });

    engine.run().await;
    assert_eq!(
        *seen.lock(),
        vec![(1, AgentRole::Reviewer), (1, AgentRole::Fixer)]
    );
}
