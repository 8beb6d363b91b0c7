// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn deltas_accumulate_and_are_suppressed() {
    let mut d = CodexDecoder::new();
    let first = d
        .parse_line(r#"{"id":"1","msg":{"type":"agent_message_delta","delta":"Hel"}}"#)
        .unwrap();
    let second = d
        .parse_line(r#"{"id":"1","msg":{"type":"agent_message_delta","delta":"lo"}}"#)
        .unwrap();
    assert_eq!(d.format_event(&first), None);
    assert_eq!(d.format_event(&second), None);

    // task_complete without a last message surfaces the joined deltas.
    let done = d
        .parse_line(r#"{"id":"1","msg":{"type":"task_complete"}}"#)
        .unwrap();
    assert_eq!(d.format_event(&done).as_deref(), Some("Hello"));
}

#[test]
fn shell_wrapper_is_stripped() {
    let mut d = CodexDecoder::new();
    let event = d
        .parse_line(
            r#"{"id":"1","msg":{"type":"exec_command_begin","command":["/bin/sh","-c","git diff --stat"]}}"#,
        )
        .unwrap();
    assert_eq!(
        event,
        AgentEvent::ToolCall {
            name: "shell".to_string(),
            detail: Some("git diff --stat".to_string())
        }
    );
}

#[test]
fn non_shell_argv_is_joined_verbatim() {
    let mut d = CodexDecoder::new();
    let event = d
        .parse_line(r#"{"id":"1","msg":{"type":"exec_command_begin","command":["rg","TODO"]}}"#)
        .unwrap();
    assert_eq!(
        event,
        AgentEvent::ToolCall {
            name: "shell".to_string(),
            detail: Some("rg TODO".to_string())
        }
    );
}

#[test]
fn token_counts_are_metadata() {
    let mut d = CodexDecoder::new();
    let event = d
        .parse_line(r#"{"id":"1","msg":{"type":"token_count","input_tokens":100}}"#)
        .unwrap();
    assert_eq!(d.format_event(&event), None);
}

#[test]
fn task_complete_with_message_wins_over_deltas() {
    let mut d = CodexDecoder::new();
    d.parse_line(r#"{"id":"1","msg":{"type":"agent_message_delta","delta":"partial"}}"#);
    let done = d
        .parse_line(r#"{"id":"1","msg":{"type":"task_complete","last_agent_message":"final text"}}"#)
        .unwrap();
    assert_eq!(d.format_event(&done).as_deref(), Some("final text"));
}

#[test]
fn errors_are_displayed() {
    let mut d = CodexDecoder::new();
    let event = d
        .parse_line(r#"{"id":"1","msg":{"type":"error","message":"rate limited"}}"#)
        .unwrap();
    assert_eq!(d.format_event(&event).as_deref(), Some("error: rate limited"));
}

#[test]
fn extract_result_prefers_task_complete() {
    let output = concat!(
        r#"{"id":"1","msg":{"type":"agent_message_delta","delta":"a"}}"#,
        "\n",
        r#"{"id":"1","msg":{"type":"agent_message_delta","delta":"b"}}"#,
        "\n",
        r#"{"id":"1","msg":{"type":"task_complete","last_agent_message":"done"}}"#,
        "\n",
    );
    assert_eq!(extract_result(output).as_deref(), Some("done"));
}

#[test]
fn extract_result_falls_back_to_joined_deltas() {
    let output = concat!(
        r#"{"id":"1","msg":{"type":"agent_message_delta","delta":"Hel"}}"#,
        "\n",
        r#"{"id":"1","msg":{"type":"agent_message_delta","delta":"lo"}}"#,
        "\n",
    );
    assert_eq!(extract_result(output).as_deref(), Some("Hello"));
}

#[test]
fn extract_result_empty_stream_is_none() {
    assert_eq!(extract_result("noise, not json\n"), None);
}
