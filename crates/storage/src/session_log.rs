// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only NDJSON session log with an incremental summary sidecar.
//!
//! One event per line, LF-terminated. Appends to a given log go through a
//! single-consumer write queue so no reader ever sees interleaved partial
//! records. After every append the in-memory summary is folded forward and
//! rewritten onto `<log>.summary.json` via a `tmp.<rand>` + rename, so the
//! sidecar's mtime is always at or past the log's, which is the consistency
//! witness readers check before trusting it.

use chrono::{DateTime, Utc};
use rr_core::log::{fold_summary, SessionEvent, SessionSummary};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::slug::project_slug;

/// Errors from session log operations
#[derive(Debug, Error)]
pub enum SessionLogError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("log writer is gone")]
    WriterGone,
}

/// Compute the log path for a new session.
///
/// `<logs_dir>/<project_slug>/<ts>[_<branch>].jsonl`, timestamp second
/// resolution, branch sanitized through the same slug rules.
pub fn session_log_path(
    logs_dir: &Path,
    project_path: &Path,
    now: DateTime<Utc>,
    branch: Option<&str>,
) -> PathBuf {
    let stamp = now.format("%Y%m%d-%H%M%S");
    let name = match branch {
        Some(branch) => format!("{stamp}_{}.jsonl", project_slug(Path::new(branch))),
        None => format!("{stamp}.jsonl"),
    };
    logs_dir.join(project_slug(project_path)).join(name)
}

/// Sidecar path for a log: same stem, `.summary.json` extension.
pub fn summary_path(log_path: &Path) -> PathBuf {
    log_path.with_extension("summary.json")
}

enum LogCommand {
    Append(
        Box<SessionEvent>,
        oneshot::Sender<Result<(), SessionLogError>>,
    ),
}

/// Writer handle for one session log.
///
/// Clones share the write queue, so all appends through any clone are
/// serialized in arrival order.
#[derive(Clone)]
pub struct SessionLog {
    path: PathBuf,
    tx: mpsc::Sender<LogCommand>,
}

impl SessionLog {
    /// Open (or create) a session log and start its writer task.
    ///
    /// Reopening an existing log replays it to seed the summary fold, so
    /// the sidecar stays a pure function of the whole log.
    pub fn open(path: &Path) -> Result<Self, SessionLogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let existing = if path.exists() {
            read_log(path)?
        } else {
            Vec::new()
        };
        let summary = fold_summary(&existing);

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let (tx, rx) = mpsc::channel(32);
        let writer = LogWriter {
            file,
            summary,
            summary_path: summary_path(path),
        };
        tokio::spawn(write_loop(writer, rx));

        Ok(Self {
            path: path.to_path_buf(),
            tx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event and wait until it is durable and the sidecar has
    /// been refreshed.
    pub async fn append(&self, event: SessionEvent) -> Result<(), SessionLogError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(LogCommand::Append(Box::new(event), ack_tx))
            .await
            .map_err(|_| SessionLogError::WriterGone)?;
        ack_rx.await.map_err(|_| SessionLogError::WriterGone)?
    }
}

struct LogWriter {
    file: File,
    summary: SessionSummary,
    summary_path: PathBuf,
}

async fn write_loop(mut writer: LogWriter, mut rx: mpsc::Receiver<LogCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            LogCommand::Append(event, ack) => {
                let result = writer.append(&event);
                let _ = ack.send(result);
            }
        }
    }
}

impl LogWriter {
    fn append(&mut self, event: &SessionEvent) -> Result<(), SessionLogError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.sync_all()?;

        self.summary.apply(event);
        if let Err(e) = write_summary(&self.summary_path, &self.summary) {
            // The sidecar is derived state; a failed rewrite is repaired by
            // the reader's rebuild path.
            warn!(path = %self.summary_path.display(), error = %e, "summary sidecar write failed");
        }
        Ok(())
    }
}

/// Write the sidecar via `tmp.<rand>` + rename. No `.tmp.*` files are left
/// behind on success.
fn write_summary(path: &Path, summary: &SessionSummary) -> Result<(), SessionLogError> {
    let rand = uuid::Uuid::new_v4().simple().to_string();
    let tmp = path.with_extension(format!("json.tmp.{}", &rand[..8]));
    let bytes = serde_json::to_vec_pretty(summary)?;
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read the full ordered event sequence.
///
/// Tolerates a trailing partial line (mid-append read) by stopping at the
/// last complete LF; unparseable complete lines are skipped with a warning.
pub fn read_log(path: &Path) -> Result<Vec<SessionEvent>, SessionLogError> {
    match read_from_offset(path, 0) {
        Ok((entries, _)) => Ok(entries),
        Err(e) => Err(e),
    }
}

/// Reader cursor: byte offset of the first unread record, plus the
/// identity of the file that offset belongs to. A state whose identity no
/// longer matches the file at the path is stale and forces a reset, so a
/// log deleted and recreated at the same path is never read as a
/// continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogReadState {
    pub offset: u64,
    /// Inode on Unix; best-effort creation time elsewhere. Zero when the
    /// file was absent.
    pub file_id: u64,
}

/// Result of an incremental read.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRead {
    /// First read, or the file was rotated, shrunk, or replaced: all
    /// entries.
    Reset {
        entries: Vec<SessionEvent>,
        state: LogReadState,
    },
    /// Only entries appended since the caller's previous state.
    Incremental {
        entries: Vec<SessionEvent>,
        state: LogReadState,
    },
}

/// Read entries appended since `state`, or everything on the first call,
/// after rotation (file shorter than the remembered offset), or when the
/// file at the path is no longer the one the state was built against.
pub fn read_log_incremental(
    path: &Path,
    state: Option<LogReadState>,
) -> Result<LogRead, SessionLogError> {
    let meta = std::fs::metadata(path).ok();
    let len = meta.as_ref().map(|m| m.len()).unwrap_or(0);
    let file_id = meta.as_ref().map(file_identity).unwrap_or(0);
    match state {
        Some(state) if state.file_id == file_id && state.offset <= len => {
            let (entries, offset) = read_from_offset(path, state.offset)?;
            Ok(LogRead::Incremental {
                entries,
                state: LogReadState { offset, file_id },
            })
        }
        _ => {
            let (entries, offset) = read_from_offset(path, 0)?;
            Ok(LogRead::Reset {
                entries,
                state: LogReadState { offset, file_id },
            })
        }
    }
}

/// Stable identity for a log file: the inode on Unix, a best-effort
/// creation timestamp elsewhere. Truncation keeps the identity (the shrink
/// check catches it); delete-and-recreate changes it.
fn file_identity(meta: &std::fs::Metadata) -> u64 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        meta.ino()
    }
    #[cfg(not(unix))]
    {
        meta.created()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

fn read_from_offset(path: &Path, offset: u64) -> Result<(Vec<SessionEvent>, u64), SessionLogError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e.into()),
    };
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(offset))?;

    let mut entries = Vec::new();
    let mut current_offset = offset;
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(n) => {
                if !line.ends_with('\n') {
                    // Mid-append: leave the cursor before the partial line.
                    break;
                }
                current_offset += n as u64;
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str::<SessionEvent>(trimmed) {
                    Ok(event) => entries.push(event),
                    Err(e) => {
                        warn!(path = %path.display(), offset = current_offset, error = %e, "skipping unparseable log line");
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok((entries, current_offset))
}

/// Read the summary sidecar, rebuilding it from the log when it is absent,
/// unparseable, or older (mtime) than the log.
pub fn read_summary(log_path: &Path) -> Result<SessionSummary, SessionLogError> {
    let sidecar = summary_path(log_path);

    if let Some(summary) = read_fresh_sidecar(log_path, &sidecar) {
        return Ok(summary);
    }

    let entries = read_log(log_path)?;
    let summary = fold_summary(&entries);
    if let Err(e) = write_summary(&sidecar, &summary) {
        warn!(path = %sidecar.display(), error = %e, "summary rebuild write failed");
    }
    Ok(summary)
}

fn read_fresh_sidecar(log_path: &Path, sidecar: &Path) -> Option<SessionSummary> {
    let sidecar_meta = std::fs::metadata(sidecar).ok()?;
    let log_meta = std::fs::metadata(log_path).ok()?;
    let sidecar_mtime = sidecar_meta.modified().ok()?;
    let log_mtime = log_meta.modified().ok()?;
    if sidecar_mtime < log_mtime {
        return None;
    }
    let text = std::fs::read_to_string(sidecar).ok()?;
    serde_json::from_str(&text).ok()
}

/// Remove a session's files: log, summary sidecar, and rendered report.
/// Missing files are fine; the first real I/O error is returned.
pub fn delete_session_files(log_path: &Path) -> Result<(), SessionLogError> {
    for path in [
        log_path.to_path_buf(),
        summary_path(log_path),
        log_path.with_extension("html"),
    ] {
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "session_log_tests.rs"]
mod tests;
