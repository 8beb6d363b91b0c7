// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cycle engine: a bounded loop of reviewer → fixer iterations.
//!
//! Per iteration: optional code simplify, review (with retry budget and a
//! one-shot format retry), checkpoint, fix (same retry structure, rollback
//! on failure), then stop/continue. Cancellation is polled at every state
//! transition; a cancel observed during the fixer still rolls back. The
//! session log gets exactly one `system` entry, one `iteration` entry per
//! iteration (partial iterations included), and exactly one `session_end`
//! on the way out, even when the loop errors unexpectedly.

use crate::deps::EngineDeps;
use crate::error::EngineError;
use crate::retry::run_with_retry;
use rr_adapters::{
    AgentRequest, AgentRunOutcome, AgentRunner, Checkpoint, CheckpointAdapter, TIMEOUT_EXIT_CODE,
};
use rr_core::agent::{AgentRole, ReviewOptions};
use rr_core::cancel::{CancelKind, CancelToken};
use rr_core::clock::Clock;
use rr_core::config::Config;
use rr_core::lock::{LockPatch, LockState};
use rr_core::log::{
    CodexReview, IterationEntry, PhaseError, RollbackOutcome, SessionEvent, SessionStatus,
};
use rr_core::parser::{parse_fix_summary, parse_review_summary};
use rr_core::summary::{FixDecision, FixSummary, ReviewSummary};
use rr_core::NO_ISSUES_MARKER;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct CycleOptions {
    /// Run the code simplifier before each review (requires a configured
    /// simplifier role).
    pub simplifier: bool,
    /// Keep iterating to `max_iterations` even when the fixer says stop.
    pub force_max_iterations: bool,
    /// What the reviewer is asked to look at.
    pub review_options: ReviewOptions,
}

/// Identity of this run.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub project_path: PathBuf,
    pub session_id: String,
    pub session_name: String,
    pub branch: Option<String>,
}

/// What one engine call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleResult {
    /// True only when the loop ended because the fixer said stop.
    pub success: bool,
    pub final_status: SessionStatus,
    pub iterations: u32,
    pub reason: String,
    /// Whether any agent invocation timed out (drives exit code 124).
    pub timed_out: bool,
}

type IterationCallback = Arc<dyn Fn(u32, AgentRole) + Send + Sync>;

/// The review and fix cycle engine.
pub struct CycleEngine<A, K, C>
where
    A: AgentRunner,
    K: CheckpointAdapter,
    C: Clock,
{
    config: Config,
    deps: EngineDeps<A, K, C>,
    context: CycleContext,
    options: CycleOptions,
    cancel: CancelToken,
    on_iteration_start: Option<IterationCallback>,
}

impl<A, K, C> CycleEngine<A, K, C>
where
    A: AgentRunner,
    K: CheckpointAdapter,
    C: Clock,
{
    pub fn new(
        config: Config,
        deps: EngineDeps<A, K, C>,
        context: CycleContext,
        options: CycleOptions,
        cancel: CancelToken,
    ) -> Self {
        Self {
            config,
            deps,
            context,
            options,
            cancel,
            on_iteration_start: None,
        }
    }

    pub fn with_iteration_callback(
        mut self,
        callback: impl Fn(u32, AgentRole) + Send + Sync + 'static,
    ) -> Self {
        self.on_iteration_start = Some(Arc::new(callback));
        self
    }

    /// Drive the cycle to a terminal state.
    ///
    /// Always appends a `session_end` and pushes the terminal lock state
    /// before returning, whatever happened inside.
    pub async fn run(&self) -> CycleResult {
        let mut iterations_done = 0u32;
        let mut timed_out = false;

        let result = match self
            .run_inner(&mut iterations_done, &mut timed_out)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "cycle ended unexpectedly");
                CycleResult {
                    success: false,
                    final_status: SessionStatus::Failed,
                    iterations: iterations_done,
                    reason: format!("Unexpected error: {e}"),
                    timed_out,
                }
            }
        };

        // Finally-path: best effort, never fails the run.
        let end = SessionEvent::SessionEnd {
            timestamp: self.deps.clock.now_utc(),
            status: result.final_status,
            reason: Some(result.reason.clone()),
            iterations: result.iterations,
        };
        if let Err(e) = self.deps.log.append(end).await {
            warn!(error = %e, "session_end append failed");
        }

        let terminal = match result.final_status {
            SessionStatus::Completed => LockState::Completed,
            SessionStatus::Failed => LockState::Failed,
            SessionStatus::Interrupted => LockState::Interrupted,
            SessionStatus::Stopped => LockState::Stopped,
            SessionStatus::Running => LockState::Failed,
        };
        let patch = LockPatch {
            state: Some(terminal),
            end_time: Some(Some(self.deps.clock.now_utc())),
            reason: Some(Some(result.reason.clone())),
            current_agent: Some(None),
            ..LockPatch::default()
        };
        self.push_lock(patch).await;

        info!(
            status = %result.final_status,
            iterations = result.iterations,
            reason = %result.reason,
            "cycle finished"
        );
        result
    }

    async fn run_inner(
        &self,
        iterations_done: &mut u32,
        timed_out: &mut bool,
    ) -> Result<CycleResult, EngineError> {
        self.deps
            .log
            .append(SessionEvent::System {
                timestamp: self.deps.clock.now_utc(),
                session_id: self.context.session_id.clone(),
                session_name: self.context.session_name.clone(),
                project_path: self.context.project_path.display().to_string(),
                branch: self.context.branch.clone(),
                max_iterations: self.config.max_iterations,
            })
            .await
            .map_err(EngineError::Log)?;

        // The lock leaves `pending` only once an agent has actually
        // launched successfully.
        let mut running_announced = false;

        loop {
            let iteration = *iterations_done + 1;
            if self.cancelled() {
                return Ok(self.halted(*iterations_done, "before iteration start", *timed_out));
            }

            let iteration_started = self.deps.clock.now();
            self.push_lock(LockPatch {
                iteration: Some(iteration),
                ..LockPatch::default()
            })
            .await;

            // ---- optional code simplify ----
            if self.options.simplifier {
                if let Some(settings) = self.config.code_simplifier.clone() {
                    self.notify(iteration, AgentRole::CodeSimplifier);
                    self.set_current_agent(AgentRole::CodeSimplifier).await;
                    let request = AgentRequest {
                        role: AgentRole::CodeSimplifier,
                        settings,
                        prompt: self.deps.prompts.simplifier_prompt(),
                        timeout_ms: self.config.agent_timeout_ms,
                        review_options: ReviewOptions::Uncommitted,
                    };
                    let (outcome, _) = self.invoke(&request, &mut running_announced).await;
                    self.note_timeout(&outcome, timed_out);
                    if self.cancelled() {
                        *iterations_done = iteration;
                        self.log_partial(iteration, iteration_started, None, None)
                            .await;
                        return Ok(self.halted(iteration, "before reviewer", *timed_out));
                    }
                    if !outcome.result.success {
                        *iterations_done = iteration;
                        let message = format!(
                            "Code simplifier failed with exit code {}",
                            outcome.result.exit_code
                        );
                        self.log_iteration(IterationEntry {
                            iteration,
                            timestamp: self.deps.clock.now_utc(),
                            duration_ms: Some(self.elapsed_ms(iteration_started)),
                            fixes: None,
                            review: None,
                            codex_review: None,
                            error: Some(PhaseError {
                                phase: AgentRole::CodeSimplifier,
                                message: message.clone(),
                                exit_code: Some(outcome.result.exit_code),
                            }),
                            rollback: None,
                        })
                        .await?;
                        return Ok(self.failed(iteration, message, *timed_out));
                    }
                }
            }

            if self.cancelled() {
                *iterations_done = iteration;
                self.log_partial(iteration, iteration_started, None, None).await;
                return Ok(self.halted(iteration, "before reviewer", *timed_out));
            }

            // ---- review ----
            self.notify(iteration, AgentRole::Reviewer);
            self.set_current_agent(AgentRole::Reviewer).await;
            let reviewer_prompt = self
                .deps
                .prompts
                .reviewer_prompt(&self.options.review_options);
            let review_request = AgentRequest {
                role: AgentRole::Reviewer,
                settings: self.config.reviewer.clone(),
                prompt: reviewer_prompt,
                timeout_ms: self.config.agent_timeout_ms,
                review_options: self.options.review_options.clone(),
            };
            let (review_outcome, attempts) =
                self.invoke(&review_request, &mut running_announced).await;
            self.note_timeout(&review_outcome, timed_out);
            debug!(attempts, success = review_outcome.result.success, "reviewer finished");

            if self.cancelled() {
                *iterations_done = iteration;
                self.log_partial(iteration, iteration_started, None, None).await;
                return Ok(self.halted(iteration, "before fixer", *timed_out));
            }
            if !review_outcome.result.success {
                *iterations_done = iteration;
                let message = format!(
                    "Reviewer failed with exit code {}",
                    review_outcome.result.exit_code
                );
                self.log_iteration(IterationEntry {
                    iteration,
                    timestamp: self.deps.clock.now_utc(),
                    duration_ms: Some(self.elapsed_ms(iteration_started)),
                    fixes: None,
                    review: None,
                    codex_review: None,
                    error: Some(PhaseError {
                        phase: AgentRole::Reviewer,
                        message: message.clone(),
                        exit_code: Some(review_outcome.result.exit_code),
                    }),
                    rollback: None,
                })
                .await?;
                return Ok(self.failed(iteration, message, *timed_out));
            }

            let (review_summary, codex_review_text, review_text) = self
                .resolve_review(&review_request, review_outcome, timed_out)
                .await;
            if self.cancelled() {
                *iterations_done = iteration;
                self.log_partial(iteration, iteration_started, review_summary.clone(), None)
                    .await;
                return Ok(self.halted(iteration, "before fixer", *timed_out));
            }
            if let Some(summary) = &review_summary {
                self.push_lock(LockPatch {
                    review_summary: Some(Some(summary.clone())),
                    ..LockPatch::default()
                })
                .await;
            }
            if let Some(text) = &codex_review_text {
                self.push_lock(LockPatch {
                    codex_review_text: Some(Some(text.clone())),
                    ..LockPatch::default()
                })
                .await;
            }

            // ---- checkpoint ----
            let label = format!("rr pre-fixer iteration {iteration}");
            let checkpoint = match self
                .deps
                .checkpoints
                .create(&self.context.project_path, &label)
                .await
            {
                Ok(checkpoint) => checkpoint,
                Err(e) => {
                    *iterations_done = iteration;
                    let message = format!("Failed to create pre-fixer checkpoint: {e}");
                    self.log_iteration(IterationEntry {
                        iteration,
                        timestamp: self.deps.clock.now_utc(),
                        duration_ms: Some(self.elapsed_ms(iteration_started)),
                        fixes: None,
                        review: review_summary.clone(),
                        codex_review: codex_review_text.clone().map(|text| CodexReview { text }),
                        error: Some(PhaseError {
                            phase: AgentRole::Fixer,
                            message: message.clone(),
                            exit_code: None,
                        }),
                        rollback: None,
                    })
                    .await?;
                    return Ok(self.failed(iteration, message, *timed_out));
                }
            };

            // ---- fix ----
            self.notify(iteration, AgentRole::Fixer);
            self.set_current_agent(AgentRole::Fixer).await;
            let fixer_request = AgentRequest {
                role: AgentRole::Fixer,
                settings: self.config.fixer.clone(),
                prompt: self.deps.prompts.fixer_prompt(&review_text),
                timeout_ms: self.config.agent_timeout_ms,
                review_options: ReviewOptions::Uncommitted,
            };
            let (fix_outcome, _) = self.invoke(&fixer_request, &mut running_announced).await;
            self.note_timeout(&fix_outcome, timed_out);

            if self.cancelled() {
                // Cancelling during a fixer run still triggers rollback.
                let rollback = self.rollback(&checkpoint).await;
                *iterations_done = iteration;
                self.log_partial(
                    iteration,
                    iteration_started,
                    review_summary.clone(),
                    Some(rollback),
                )
                .await;
                return Ok(self.halted(iteration, "during fixer; changes were rolled back", *timed_out));
            }
            if !fix_outcome.result.success {
                let rollback = self.rollback(&checkpoint).await;
                *iterations_done = iteration;
                let message = format!(
                    "Fixer failed with exit code {}",
                    fix_outcome.result.exit_code
                );
                let reason = self.with_rollback_note(&message, &rollback);
                self.log_iteration(IterationEntry {
                    iteration,
                    timestamp: self.deps.clock.now_utc(),
                    duration_ms: Some(self.elapsed_ms(iteration_started)),
                    fixes: None,
                    review: review_summary.clone(),
                    codex_review: codex_review_text.clone().map(|text| CodexReview { text }),
                    error: Some(PhaseError {
                        phase: AgentRole::Fixer,
                        message,
                        exit_code: Some(fix_outcome.result.exit_code),
                    }),
                    rollback: Some(rollback),
                })
                .await?;
                return Ok(self.failed(iteration, reason, *timed_out));
            }

            let fix_summary = match self
                .resolve_fix(&fixer_request, fix_outcome, timed_out)
                .await
            {
                Ok(summary) => summary,
                Err(interrupted_during_retry) => {
                    let rollback = self.rollback(&checkpoint).await;
                    *iterations_done = iteration;
                    if interrupted_during_retry {
                        self.log_partial(
                            iteration,
                            iteration_started,
                            review_summary.clone(),
                            Some(rollback),
                        )
                        .await;
                        return Ok(self.halted(
                            iteration,
                            "during fixer; changes were rolled back",
                            *timed_out,
                        ));
                    }
                    let message = "Fixer produced no parseable fix summary".to_string();
                    let reason = self.with_rollback_note(&message, &rollback);
                    self.log_iteration(IterationEntry {
                        iteration,
                        timestamp: self.deps.clock.now_utc(),
                        duration_ms: Some(self.elapsed_ms(iteration_started)),
                        fixes: None,
                        review: review_summary.clone(),
                        codex_review: codex_review_text.clone().map(|text| CodexReview { text }),
                        error: Some(PhaseError {
                            phase: AgentRole::Fixer,
                            message,
                            exit_code: None,
                        }),
                        rollback: Some(rollback),
                    })
                    .await?;
                    return Ok(self.failed(iteration, reason, *timed_out));
                }
            };

            // ---- fix validated ----
            *iterations_done = iteration;
            self.log_iteration(IterationEntry {
                iteration,
                timestamp: self.deps.clock.now_utc(),
                duration_ms: Some(self.elapsed_ms(iteration_started)),
                fixes: Some(fix_summary.clone()),
                review: review_summary.clone(),
                codex_review: codex_review_text.clone().map(|text| CodexReview { text }),
                error: None,
                rollback: None,
            })
            .await?;

            self.deps
                .checkpoints
                .discard(&self.context.project_path, &checkpoint)
                .await;

            if fix_summary.stop_iteration && !self.options.force_max_iterations {
                let reason = if fix_summary.decision == FixDecision::NoChangesNeeded {
                    "No issues found; nothing left to fix".to_string()
                } else {
                    format!("Fixer requested stop after iteration {iteration}")
                };
                return Ok(CycleResult {
                    success: true,
                    final_status: SessionStatus::Completed,
                    iterations: iteration,
                    reason,
                    timed_out: *timed_out,
                });
            }
            if iteration >= self.config.max_iterations {
                return Ok(CycleResult {
                    success: false,
                    final_status: SessionStatus::Completed,
                    iterations: iteration,
                    reason: format!(
                        "Max iterations ({}) reached with remaining issues",
                        self.config.max_iterations
                    ),
                    timed_out: *timed_out,
                });
            }
        }
    }

    /// Run the reviewer's structured-parse ladder, including the one-shot
    /// format retry and the codex-class raw-text fallback.
    ///
    /// Returns `(parsed summary, codex fallback text, text for the fixer)`.
    async fn resolve_review(
        &self,
        request: &AgentRequest,
        outcome: AgentRunOutcome,
        timed_out: &mut bool,
    ) -> (Option<ReviewSummary>, Option<String>, String) {
        let raw_text = |o: &AgentRunOutcome| {
            o.final_text
                .clone()
                .unwrap_or_else(|| o.result.output.clone())
        };

        let parse = parse_review_summary(outcome.final_text.as_deref(), &outcome.result.output);
        if let Some(summary) = parse.value {
            return (Some(summary), None, raw_text(&outcome));
        }
        debug!(
            reason = parse.failure_reason.as_deref().unwrap_or("unknown"),
            "review summary parse failed, format retry"
        );

        if self.cancelled() {
            return (None, None, raw_text(&outcome));
        }
        let retry_outcome = self
            .format_retry(request, self.deps.prompts.reviewer_summary_retry_reminder())
            .await;
        self.note_timeout(&retry_outcome, timed_out);
        if retry_outcome.result.success {
            let retry_parse = parse_review_summary(
                retry_outcome.final_text.as_deref(),
                &retry_outcome.result.output,
            );
            if let Some(summary) = retry_parse.value {
                return (Some(summary), None, raw_text(&retry_outcome));
            }
        }

        // Both attempts failed to parse. Codex-class reviewers persist the
        // raw text on the lockfile; everyone falls through on best-effort
        // text so the fixer still has something to work with.
        let text = raw_text(&outcome);
        if request.settings.agent.has_session_rollout() {
            (None, Some(text.clone()), text)
        } else {
            (None, None, text)
        }
    }

    /// Fixer verdict resolution: inline no-issues marker, structured parse,
    /// one-shot format retry. `Err(true)` means cancellation was observed
    /// mid-retry; `Err(false)` means the verdict never parsed.
    async fn resolve_fix(
        &self,
        request: &AgentRequest,
        outcome: AgentRunOutcome,
        timed_out: &mut bool,
    ) -> Result<FixSummary, bool> {
        if has_marker(&outcome) {
            return Ok(FixSummary::no_changes_needed());
        }
        let parse = parse_fix_summary(outcome.final_text.as_deref(), &outcome.result.output);
        if let Some(summary) = parse.value {
            return Ok(summary);
        }
        debug!(
            reason = parse.failure_reason.as_deref().unwrap_or("unknown"),
            "fix summary parse failed, format retry"
        );

        if self.cancelled() {
            return Err(true);
        }
        let retry_outcome = self
            .format_retry(request, self.deps.prompts.fixer_summary_retry_reminder())
            .await;
        self.note_timeout(&retry_outcome, timed_out);
        if self.cancelled() {
            return Err(true);
        }
        if retry_outcome.result.success {
            if has_marker(&retry_outcome) {
                return Ok(FixSummary::no_changes_needed());
            }
            let retry_parse = parse_fix_summary(
                retry_outcome.final_text.as_deref(),
                &retry_outcome.result.output,
            );
            if let Some(summary) = retry_parse.value {
                return Ok(summary);
            }
        }
        Err(false)
    }

    /// Run one agent request through the retry budget. The first
    /// invocation that comes back successful flips the lock from
    /// `pending` to `running`.
    async fn invoke(
        &self,
        request: &AgentRequest,
        running_announced: &mut bool,
    ) -> (AgentRunOutcome, u32) {
        let (outcome, attempts) = run_with_retry(
            &self.deps.agents,
            request,
            &self.config.retry,
            &self.deps.sink,
            &self.cancel,
        )
        .await;
        if outcome.result.success && !*running_announced {
            *running_announced = true;
            self.push_lock(LockPatch::state(LockState::Running)).await;
        }
        (outcome, attempts)
    }

    /// Re-invoke the same agent exactly once with the reminder appended.
    async fn format_retry(&self, base: &AgentRequest, reminder: String) -> AgentRunOutcome {
        let mut request = base.clone();
        request.prompt = format!("{}{}", base.prompt, reminder);
        self.deps
            .agents
            .run_agent(request, Arc::clone(&self.deps.sink), self.cancel.clone())
            .await
    }

    async fn rollback(&self, checkpoint: &Checkpoint) -> RollbackOutcome {
        match self
            .deps
            .checkpoints
            .rollback(&self.context.project_path, checkpoint)
            .await
        {
            Ok(()) => RollbackOutcome {
                attempted: true,
                success: true,
                reason: None,
            },
            Err(e) => {
                warn!(error = %e, "rollback failed");
                RollbackOutcome {
                    attempted: true,
                    success: false,
                    reason: Some(e.to_string()),
                }
            }
        }
    }

    fn with_rollback_note(&self, message: &str, rollback: &RollbackOutcome) -> String {
        if rollback.success {
            format!("{message}. Changes were rolled back")
        } else {
            format!("{message}. Rollback failed; the working tree may need attention")
        }
    }

    fn halted(&self, iterations: u32, phase: &str, timed_out: bool) -> CycleResult {
        let (verb, status) = match self.cancel.kind() {
            Some(CancelKind::Stop) => ("stopped", SessionStatus::Stopped),
            _ => ("interrupted", SessionStatus::Interrupted),
        };
        CycleResult {
            success: false,
            final_status: status,
            iterations,
            reason: format!("Review cycle {verb} {phase}"),
            timed_out,
        }
    }

    fn failed(&self, iterations: u32, reason: String, timed_out: bool) -> CycleResult {
        CycleResult {
            success: false,
            final_status: SessionStatus::Failed,
            iterations,
            reason,
            timed_out,
        }
    }

    async fn log_iteration(&self, entry: IterationEntry) -> Result<(), EngineError> {
        self.deps
            .log
            .append(SessionEvent::Iteration(entry))
            .await
            .map_err(EngineError::Log)
    }

    /// Partial-iteration entry on the cancellation paths; append failures
    /// must not mask the interruption, so they are only warned about.
    async fn log_partial(
        &self,
        iteration: u32,
        started: std::time::Instant,
        review: Option<ReviewSummary>,
        rollback: Option<RollbackOutcome>,
    ) {
        let entry = IterationEntry {
            iteration,
            timestamp: self.deps.clock.now_utc(),
            duration_ms: Some(self.elapsed_ms(started)),
            fixes: None,
            review,
            codex_review: None,
            error: None,
            rollback,
        };
        if let Err(e) = self.deps.log.append(SessionEvent::Iteration(entry)).await {
            warn!(error = %e, "partial iteration append failed");
        }
    }

    async fn set_current_agent(&self, role: AgentRole) {
        self.push_lock(LockPatch {
            current_agent: Some(Some(role)),
            ..LockPatch::default()
        })
        .await;
    }

    /// Lock pushes are advisory: failures are logged and swallowed, and the
    /// next transition retries.
    async fn push_lock(&self, patch: LockPatch) {
        if !self.deps.locks.push(patch).await {
            warn!("lock progress push did not land");
        }
    }

    fn notify(&self, iteration: u32, role: AgentRole) {
        if let Some(callback) = &self.on_iteration_start {
            callback(iteration, role);
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn note_timeout(&self, outcome: &AgentRunOutcome, timed_out: &mut bool) {
        if outcome.result.exit_code == TIMEOUT_EXIT_CODE {
            *timed_out = true;
        }
    }

    fn elapsed_ms(&self, started: std::time::Instant) -> u64 {
        self.deps
            .clock
            .now()
            .duration_since(started)
            .as_millis() as u64
    }
}

fn has_marker(outcome: &AgentRunOutcome) -> bool {
    outcome
        .final_text
        .as_deref()
        .is_some_and(|t| t.contains(NO_ISSUES_MARKER))
        || outcome.result.output.contains(NO_ISSUES_MARKER)
}

#[cfg(test)]
#[path = "cycle_tests.rs"]
mod tests;
