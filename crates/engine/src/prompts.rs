// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt construction seam.
//!
//! The wording sent to agents is a collaborator concern; the engine only
//! needs somewhere to get a prompt for each phase and the one-shot
//! format-retry reminders. The default builder keeps the texts short and
//! mechanical.

use rr_core::agent::ReviewOptions;

/// Builds the prompts the engine hands to agents.
pub trait PromptBuilder: Send + Sync + 'static {
    fn reviewer_prompt(&self, options: &ReviewOptions) -> String;
    fn fixer_prompt(&self, review_text: &str) -> String;
    fn simplifier_prompt(&self) -> String;

    /// Appended to the reviewer prompt on the one-shot format retry.
    fn reviewer_summary_retry_reminder(&self) -> String;

    /// Appended to the fixer prompt on the one-shot format retry.
    fn fixer_summary_retry_reminder(&self) -> String;
}

/// Default prompt builder.
#[derive(Clone, Default)]
pub struct DefaultPromptBuilder;

impl PromptBuilder for DefaultPromptBuilder {
    fn reviewer_prompt(&self, options: &ReviewOptions) -> String {
        let scope = match options {
            ReviewOptions::Uncommitted => "the uncommitted changes in this repository".to_string(),
            ReviewOptions::BaseBranch(branch) => {
                format!("the changes relative to branch {branch}")
            }
            ReviewOptions::Commit(sha) => format!("commit {sha}"),
            ReviewOptions::CustomInstructions(instructions) => {
                return format!(
                    "Review this repository. {instructions}\n\n\
                     Finish with a single JSON object: findings (array of \
                     {{title, body, confidence_score, priority, code_location}}), \
                     overall_correctness, overall_explanation, overall_confidence_score."
                );
            }
        };
        format!(
            "Review {scope} for bugs, regressions, and broken invariants. \
             Finish with a single JSON object: findings (array of \
             {{title, body, confidence_score, priority, code_location}}), \
             overall_correctness (\"patch is correct\" or \"patch is incorrect\"), \
             overall_explanation, overall_confidence_score."
        )
    }

    fn fixer_prompt(&self, review_text: &str) -> String {
        format!(
            "A reviewer reported the following issues:\n\n{review_text}\n\n\
             Apply the fixes you judge correct. If nothing is actionable, print \
             NO_ISSUES_FOUND. Finish with a single JSON object: decision \
             (NO_CHANGES_NEEDED, APPLY_SELECTIVELY, APPLY_MOST, or APPLY_ALL), \
             stop_iteration (bool), fixes (array of {{id, title, priority, file, \
             claim, evidence, fix}}), skipped (array of {{id, title, priority, reason}})."
        )
    }

    fn simplifier_prompt(&self) -> String {
        "Simplify the uncommitted changes in this repository without altering \
         behavior: remove dead code, collapse needless indirection, tighten \
         naming. Keep the diff minimal."
            .to_string()
    }

    fn reviewer_summary_retry_reminder(&self) -> String {
        "\n\nREMINDER: your previous reply did not contain a parseable review \
         summary. Reply again, ending with exactly one valid JSON object and \
         no surrounding commentary."
            .to_string()
    }

    fn fixer_summary_retry_reminder(&self) -> String {
        "\n\nREMINDER: your previous reply did not contain a parseable fix \
         summary. Reply again, ending with exactly one valid JSON object and \
         no surrounding commentary."
            .to_string()
    }
}

#[cfg(test)]
#[path = "prompts_tests.rs"]
mod tests;
