// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The CLI agent runner: spawn, stream, kill on timeout.
//!
//! stdout is decoded with cross-chunk UTF-8 continuity and split on LF;
//! complete lines run through the agent's decoder under the formatter
//! protocol (not-an-event → raw line, suppressed → nothing, displayable →
//! text plus a blank line). A trailing partial line at EOF is flushed
//! through the same rule exactly once. stderr is forwarded unmodified.

use super::decoders::{decoder_for, extract_stream_result, EventDecoder, LineVerdict};
use super::rollout::RolloutLocator;
use super::spec::AgentSpec;
use super::{AgentRequest, AgentRunOutcome, AgentRunner};
use crate::sink::OutputSink;
use async_trait::async_trait;
use rr_core::agent::IterationResult;
use rr_core::cancel::CancelToken;
use rr_core::clock::Clock;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit code reported for any agent timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when cancellation killed the agent.
const INTERRUPT_EXIT_CODE: i32 = 130;

/// Production agent runner.
#[derive(Clone)]
pub struct CliAgentRunner<C: Clock> {
    clock: C,
    rollout: RolloutLocator,
}

impl<C: Clock> CliAgentRunner<C> {
    pub fn new(clock: C, rollout_window_days: u32) -> Self {
        Self {
            clock,
            rollout: RolloutLocator::new(rollout_window_days),
        }
    }

    /// Runner with a custom rollout locator (tests point it at a temp dir).
    pub fn with_rollout(clock: C, rollout: RolloutLocator) -> Self {
        Self { clock, rollout }
    }
}

#[async_trait]
impl<C: Clock> AgentRunner for CliAgentRunner<C> {
    async fn run_agent(
        &self,
        request: AgentRequest,
        sink: Arc<dyn OutputSink>,
        cancel: CancelToken,
    ) -> AgentRunOutcome {
        let started = self.clock.now();
        let started_utc = self.clock.now_utc();
        let kind = request.settings.agent;
        let spec = AgentSpec::for_kind(kind);
        let args = spec.build_args(
            request.role,
            &request.prompt,
            &request.settings,
            &request.review_options,
        );

        debug!(agent = %kind, role = %request.role, timeout_ms = request.timeout_ms, "launching agent");

        let mut cmd = Command::new(spec.command());
        cmd.args(&args).envs(spec.build_env());

        let decoder = if kind.uses_structured_stream() {
            decoder_for(kind)
        } else {
            None
        };

        let streamed = run_command(cmd, decoder, &sink, &cancel, request.timeout_ms).await;
        let duration = self.clock.now().duration_since(started).as_millis() as u64;

        let result = match streamed {
            Ok(streamed) => IterationResult {
                success: streamed.exit_code == 0,
                output: streamed.output,
                exit_code: streamed.exit_code,
                duration_ms: duration,
            },
            Err(e) => {
                warn!(agent = %kind, error = %e, "agent spawn failed");
                IterationResult::failed(format!("[Error: {e}]"), 1, duration)
            }
        };

        let final_text = if result.output.is_empty() {
            None
        } else if kind.has_session_rollout() {
            self.rollout
                .find_review_output(started_utc)
                .or_else(|| extract_stream_result(kind, &result.output))
        } else {
            extract_stream_result(kind, &result.output)
        };

        AgentRunOutcome { result, final_text }
    }
}

pub(crate) struct StreamOutcome {
    pub output: String,
    pub exit_code: i32,
    pub timed_out: bool,
    pub interrupted: bool,
}

/// Spawn `cmd` and stream it to completion.
///
/// stdin is closed; stdout/stderr are piped. `timeout_ms == 0` disables the
/// timer. On timer fire the child is killed, the exit code reads 124, and
/// `[Timeout after Nms]` is prepended to the transcript. Cancellation kills
/// the child the same way. The returned transcript is
/// `stdout + "\n[stderr]\n" + stderr` when stderr is non-empty.
pub(crate) async fn run_command(
    mut cmd: Command,
    mut decoder: Option<Box<dyn EventDecoder>>,
    sink: &Arc<dyn OutputSink>,
    cancel: &CancelToken,
    timeout_ms: u64,
) -> Result<StreamOutcome, std::io::Error> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let mut assembler = LineAssembler::default();
    let mut stderr_carry = Utf8Carry::default();
    let mut stdout_text = String::new();
    let mut stderr_text = String::new();

    let timeout_enabled = timeout_ms > 0;
    let timeout = tokio::time::sleep(Duration::from_millis(timeout_ms.max(1)));
    tokio::pin!(timeout);
    let mut timed_out = false;
    let mut interrupted = false;

    let mut stdout_buf = [0u8; 8192];
    let mut stderr_buf = [0u8; 8192];

    while stdout_pipe.is_some() || stderr_pipe.is_some() {
        tokio::select! {
            n = read_pipe(&mut stdout_pipe, &mut stdout_buf) => {
                if n == 0 {
                    if let Some(partial) = assembler.flush() {
                        stdout_text.push_str(&partial);
                        forward_line(&partial, &mut decoder, sink);
                    }
                    stdout_pipe = None;
                } else {
                    for line in assembler.push(&stdout_buf[..n]) {
                        stdout_text.push_str(&line);
                        stdout_text.push('\n');
                        forward_line(&line, &mut decoder, sink);
                    }
                }
            }
            n = read_pipe(&mut stderr_pipe, &mut stderr_buf) => {
                if n == 0 {
                    let rest = stderr_carry.flush();
                    if !rest.is_empty() {
                        stderr_text.push_str(&rest);
                        sink.stderr_chunk(&rest);
                    }
                    stderr_pipe = None;
                } else {
                    let chunk = stderr_carry.push(&stderr_buf[..n]);
                    if !chunk.is_empty() {
                        stderr_text.push_str(&chunk);
                        sink.stderr_chunk(&chunk);
                    }
                }
            }
            _ = &mut timeout, if timeout_enabled && !timed_out && !interrupted => {
                warn!(timeout_ms, "child timed out, killing");
                timed_out = true;
                let _ = child.start_kill();
            }
            _ = cancel.cancelled(), if !interrupted && !timed_out => {
                debug!("cancellation observed, killing child");
                interrupted = true;
                let _ = child.start_kill();
            }
        }
    }

    let status = child.wait().await;

    let mut output = stdout_text;
    if !stderr_text.is_empty() {
        output.push_str("\n[stderr]\n");
        output.push_str(&stderr_text);
    }

    let exit_code = if timed_out {
        output = format!("[Timeout after {timeout_ms}ms]\n{output}");
        TIMEOUT_EXIT_CODE
    } else if interrupted {
        output = format!("[Interrupted]\n{output}");
        INTERRUPT_EXIT_CODE
    } else {
        match status {
            Ok(status) => status.code().unwrap_or(1),
            Err(e) => {
                output = format!("[Error: {e}]\n{output}");
                1
            }
        }
    };

    Ok(StreamOutcome {
        output,
        exit_code,
        timed_out,
        interrupted,
    })
}

/// Read from an optional pipe; a pipe that is `None` never resolves, so the
/// surrounding select ignores it.
async fn read_pipe<R: AsyncRead + Unpin>(pipe: &mut Option<R>, buf: &mut [u8]) -> usize {
    match pipe {
        Some(reader) => reader.read(buf).await.unwrap_or(0),
        None => std::future::pending().await,
    }
}

/// Apply the formatter protocol to one complete (or final partial) line.
fn forward_line(
    line: &str,
    decoder: &mut Option<Box<dyn EventDecoder>>,
    sink: &Arc<dyn OutputSink>,
) {
    match decoder {
        Some(decoder) => match decoder.format_line(line) {
            LineVerdict::NotEvent => sink.stdout_line(line),
            LineVerdict::Suppressed => {}
            LineVerdict::Display(text) => {
                sink.stdout_line(&text);
                sink.stdout_line("");
            }
        },
        None => sink.stdout_line(line),
    }
}

/// Splits a byte stream on LF with cross-chunk continuity. Lines are
/// decoded only when complete; the trailing partial line is decoded once
/// at flush.
#[derive(Default)]
struct LineAssembler {
    pending: Vec<u8>,
}

impl LineAssembler {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let mut line = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

/// Incremental UTF-8 decoder that holds back an incomplete trailing
/// multibyte sequence between chunks.
#[derive(Default)]
struct Utf8Carry {
    carry: Vec<u8>,
}

impl Utf8Carry {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);
        match std::str::from_utf8(&self.carry) {
            Ok(s) => {
                let out = s.to_string();
                self.carry.clear();
                out
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let out = String::from_utf8_lossy(&self.carry[..valid]).into_owned();
                self.carry.drain(..valid);
                out
            }
            Err(_) => {
                let out = String::from_utf8_lossy(&self.carry).into_owned();
                self.carry.clear();
                out
            }
        }
    }

    fn flush(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry.clear();
        out
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
