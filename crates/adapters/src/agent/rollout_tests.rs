// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Duration;
use tempfile::TempDir;

fn day_dir(home: &std::path::Path, day: DateTime<Utc>) -> PathBuf {
    home.join("sessions")
        .join(day.format("%Y").to_string())
        .join(day.format("%m").to_string())
        .join(day.format("%d").to_string())
}

fn write_rollout(home: &std::path::Path, day: DateTime<Utc>, name: &str, lines: &[&str]) -> PathBuf {
    let dir = day_dir(home, day);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

const EXITED: &str = r#"{"timestamp":"t","payload":{"type":"exited_review_mode","review_output":{"findings":[],"overall_correctness":"patch is correct","overall_explanation":"ok","overall_confidence_score":1.0}}}"#;

#[test]
fn finds_review_output_in_todays_rollout() {
    let home = TempDir::new().unwrap();
    let now = Utc::now();
    write_rollout(
        home.path(),
        now,
        "rollout-2026-03-14T09-00-00-abc.jsonl",
        &[r#"{"payload":{"type":"session_meta"}}"#, EXITED],
    );

    let locator = RolloutLocator::with_home(home.path().to_path_buf(), 2);
    let output = locator
        .find_review_output(now - Duration::minutes(5))
        .unwrap();
    assert!(output.contains("patch is correct"));
}

#[test]
fn latest_payload_in_the_file_wins() {
    let home = TempDir::new().unwrap();
    let now = Utc::now();
    let newer = r#"{"payload":{"type":"exited_review_mode","review_output":"second pass"}}"#;
    write_rollout(
        home.path(),
        now,
        "rollout-2026-03-14T09-00-00-abc.jsonl",
        &[EXITED, newer],
    );

    let locator = RolloutLocator::with_home(home.path().to_path_buf(), 2);
    let output = locator
        .find_review_output(now - Duration::minutes(5))
        .unwrap();
    assert_eq!(output, "second pass");
}

#[test]
fn stale_rollout_is_non_current() {
    let home = TempDir::new().unwrap();
    let now = Utc::now();
    write_rollout(
        home.path(),
        now,
        "rollout-2026-03-14T09-00-00-abc.jsonl",
        &[EXITED],
    );

    // The invocation started after the file was written, so the rollout
    // predates the session and must not be used.
    let locator = RolloutLocator::with_home(home.path().to_path_buf(), 2);
    assert_eq!(locator.find_review_output(now + Duration::minutes(5)), None);
}

#[test]
fn missing_sessions_dir_is_fine() {
    let home = TempDir::new().unwrap();
    let locator = RolloutLocator::with_home(home.path().to_path_buf(), 2);
    assert_eq!(locator.find_review_output(Utc::now()), None);
}

#[test]
fn non_rollout_files_are_ignored() {
    let home = TempDir::new().unwrap();
    let now = Utc::now();
    write_rollout(home.path(), now, "notes.jsonl", &[EXITED]);
    write_rollout(home.path(), now, "rollout-but-wrong.txt", &[EXITED]);

    let locator = RolloutLocator::with_home(home.path().to_path_buf(), 2);
    assert_eq!(locator.find_review_output(now - Duration::minutes(5)), None);
}

#[test]
fn msg_envelope_is_also_accepted() {
    let home = TempDir::new().unwrap();
    let now = Utc::now();
    let msg_form = r#"{"msg":{"type":"exited_review_mode","review_output":"from msg"}}"#;
    write_rollout(
        home.path(),
        now,
        "rollout-2026-03-14T09-00-00-abc.jsonl",
        &[msg_form],
    );

    let locator = RolloutLocator::with_home(home.path().to_path_buf(), 2);
    assert_eq!(
        locator.find_review_output(now - Duration::minutes(5)).as_deref(),
        Some("from msg")
    );
}

#[test]
fn unreadable_rollout_lines_are_skipped() {
    let home = TempDir::new().unwrap();
    let now = Utc::now();
    write_rollout(
        home.path(),
        now,
        "rollout-2026-03-14T09-00-00-abc.jsonl",
        &["garbage line", EXITED],
    );

    let locator = RolloutLocator::with_home(home.path().to_path_buf(), 2);
    assert!(locator.find_review_output(now - Duration::minutes(5)).is_some());
}
