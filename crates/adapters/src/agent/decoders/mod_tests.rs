// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn structured_agents_get_decoders() {
    for kind in AgentKind::ALL {
        assert_eq!(decoder_for(kind).is_some(), kind.uses_structured_stream());
    }
}

#[yare::parameterized(
    single      = { "before <system-reminder>noise</system-reminder> after", "before  after" },
    multiple    = { "<system-reminder>a</system-reminder>x<system-reminder>b</system-reminder>y", "xy" },
    none        = { "plain text", "plain text" },
    unclosed    = { "keep <system-reminder>dropped to the end", "keep" },
    only_block  = { "<system-reminder>everything</system-reminder>", "" },
)]
fn system_reminder_stripping(input: &str, expected: &str) {
    assert_eq!(strip_system_reminders(input), expected.trim());
}

#[test]
fn plain_text_agents_return_trimmed_transcript() {
    let result = extract_stream_result(AgentKind::OpenCode, "  the answer\n");
    assert_eq!(result.as_deref(), Some("the answer"));
    assert_eq!(extract_stream_result(AgentKind::Pi, "   \n"), None);
}

#[test]
fn format_line_protocol() {
    let mut decoder = ClaudeDecoder::new();
    // Not JSON at all: not an event.
    assert_eq!(decoder.format_line("plain noise"), LineVerdict::NotEvent);
    // Valid but noisy: suppressed.
    assert_eq!(
        decoder.format_line(r#"{"type":"system","subtype":"init"}"#),
        LineVerdict::Suppressed
    );
    // Displayable.
    let verdict = decoder.format_line(
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hi"}]}}"#,
    );
    assert_eq!(verdict, LineVerdict::Display("hi".to_string()));
}
