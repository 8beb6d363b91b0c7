// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output observers for streaming agent transcripts.
//!
//! The runner tees everything an agent prints through an `OutputSink`
//! without ever blocking on it. The dashboard (out of scope here) is one
//! sink; the default forwards to tracing so `RUST_LOG` surfaces agent
//! chatter during a foreground run.

#[cfg(any(test, feature = "test-support"))]
use parking_lot::Mutex;
#[cfg(any(test, feature = "test-support"))]
use std::sync::Arc;

/// Observer of an agent's streams.
///
/// `stdout_line` receives one line at a time with the trailing newline
/// stripped; an empty string is a deliberate blank line. `stderr_chunk`
/// receives stderr text exactly as it arrived.
pub trait OutputSink: Send + Sync + 'static {
    fn stdout_line(&self, line: &str);
    fn stderr_chunk(&self, text: &str);
}

/// Default sink: forwards to tracing.
#[derive(Clone, Default)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn stdout_line(&self, line: &str) {
        if !line.is_empty() {
            tracing::info!(target: "rr::agent", "{line}");
        }
    }

    fn stderr_chunk(&self, text: &str) {
        let trimmed = text.trim_end();
        if !trimmed.is_empty() {
            tracing::warn!(target: "rr::agent", "{trimmed}");
        }
    }
}

/// Recording sink for tests: captures both streams in arrival order.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<RecordedStreams>>,
}

#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
struct RecordedStreams {
    stdout: Vec<String>,
    stderr: Vec<String>,
}

#[cfg(any(test, feature = "test-support"))]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines forwarded to the observer, in order.
    pub fn stdout_lines(&self) -> Vec<String> {
        self.inner.lock().stdout.clone()
    }

    /// Stderr chunks, concatenated.
    pub fn stderr_text(&self) -> String {
        self.inner.lock().stderr.concat()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl OutputSink for RecordingSink {
    fn stdout_line(&self, line: &str) {
        self.inner.lock().stdout.push(line.to_string());
    }

    fn stderr_chunk(&self, text: &str) {
        self.inner.lock().stderr.push(text.to_string());
    }
}
