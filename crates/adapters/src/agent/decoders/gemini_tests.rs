// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn content_deltas_join_in_arrival_order() {
    let mut d = GeminiDecoder::new();
    let a = d
        .parse_line(r#"{"type":"content","delta":"one "}"#)
        .unwrap();
    let b = d.parse_line(r#"{"type":"content","delta":"two"}"#).unwrap();
    assert_eq!(d.format_event(&a), None);
    assert_eq!(d.format_event(&b), None);

    let finish = d.parse_line(r#"{"type":"finish"}"#).unwrap();
    assert_eq!(
        finish,
        AgentEvent::Final {
            text: "one two".to_string()
        }
    );
    assert_eq!(d.format_event(&finish).as_deref(), Some("one two"));
}

#[test]
fn init_is_suppressed() {
    let mut d = GeminiDecoder::new();
    let event = d.parse_line(r#"{"type":"init","model":"gemini"}"#).unwrap();
    assert_eq!(d.format_event(&event), None);
}

#[test]
fn tool_calls_include_args() {
    let mut d = GeminiDecoder::new();
    let event = d
        .parse_line(r#"{"type":"tool_call","name":"write_file","args":{"path":"a.rs"}}"#)
        .unwrap();
    let AgentEvent::ToolCall { name, detail } = event else {
        panic!("expected tool call");
    };
    assert_eq!(name, "write_file");
    assert!(detail.unwrap().contains("a.rs"));
}

#[test]
fn extract_result_joins_all_deltas() {
    let output = concat!(
        r#"{"type":"init"}"#,
        "\n",
        r#"{"type":"content","delta":"Hel"}"#,
        "\n",
        r#"{"type":"content","delta":"lo"}"#,
        "\n",
        r#"{"type":"finish"}"#,
        "\n",
    );
    assert_eq!(extract_result(output).as_deref(), Some("Hello"));
}

#[test]
fn extract_result_without_content_is_none() {
    assert_eq!(extract_result(r#"{"type":"finish"}"#), None);
}
