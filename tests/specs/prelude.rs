// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness: a cycle engine wired to real storage in a temp tree,
//! with scripted agents and a fake checkpoint adapter.

use rr_adapters::{FakeAgentRunner, FakeCheckpoint, RecordingSink};
use rr_core::cancel::CancelToken;
use rr_core::clock::{Clock, FakeClock};
use rr_core::config::Config;
use rr_core::lock::{LockMode, LockState, Lockfile, LOCK_SCHEMA_VERSION};
use rr_core::retry::RetryPolicy;
use rr_engine::{
    CycleContext, CycleEngine, CycleOptions, CycleResult, DefaultPromptBuilder, EngineDeps,
    StoreLockSink, StoreSessionSink,
};
use rr_storage::{session_log_path, FakeProbe, LockStore, SessionLog};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const REVIEW_JSON: &str = r#"{"findings":[],"overall_correctness":"patch is correct","overall_explanation":"looks fine","overall_confidence_score":0.9}"#;

pub const FIX_STOP_JSON: &str = r#"{"decision":"NO_CHANGES_NEEDED","stop_iteration":true,"fixes":[],"skipped":[]}"#;

pub const FIX_CONTINUE_JSON: &str = r#"{"decision":"APPLY_SELECTIVELY","stop_iteration":false,"fixes":[{"id":"1","title":"t","priority":"P1","file":null,"claim":"c","evidence":"e","fix":"f"}],"skipped":[]}"#;

pub struct SpecHarness {
    pub dir: TempDir,
    pub runner: FakeAgentRunner,
    pub checkpoints: FakeCheckpoint,
    pub locks: LockStore<FakeClock>,
    pub clock: FakeClock,
    pub cancel: CancelToken,
    pub session_id: String,
    pub log_path: PathBuf,
    pub lock_path: PathBuf,
}

impl SpecHarness {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let clock = FakeClock::new();
        clock.set_epoch_ms(1_750_000_000_000);
        let locks = LockStore::new(
            dir.path().join("logs"),
            Arc::new(FakeProbe::new()),
            clock.clone(),
        );
        let project = dir.path().join("project");
        std::fs::create_dir_all(&project).expect("project dir");
        let log_path = session_log_path(
            &dir.path().join("logs"),
            &project,
            clock.now_utc(),
            Some("main"),
        );
        let lock_path = locks.lock_path(&project);
        Self {
            dir,
            runner: FakeAgentRunner::new(),
            checkpoints: FakeCheckpoint::new(),
            locks,
            clock,
            cancel: CancelToken::new(),
            session_id: "spec-session-1".to_string(),
            log_path,
            lock_path,
        }
    }

    pub fn project_path(&self) -> PathBuf {
        self.dir.path().join("project")
    }

    pub fn config(max_iterations: u32, max_retries: u32) -> Config {
        let mut config = Config::default();
        config.max_iterations = max_iterations;
        config.retry = RetryPolicy {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 4,
        };
        config
    }

    /// Create the lock, open the log, run the engine, return the result.
    pub async fn run(&self, config: Config, options: CycleOptions) -> CycleResult {
        let now = self.clock.now_utc();
        let lock = Lockfile {
            schema_version: LOCK_SCHEMA_VERSION,
            session_id: self.session_id.clone(),
            session_name: "spec-session".to_string(),
            project_path: self.project_path().display().to_string(),
            branch: Some("main".to_string()),
            start_time: now,
            last_heartbeat: now,
            pid: std::process::id(),
            mode: LockMode::Foreground,
            state: LockState::Pending,
            session_path: Some(self.log_path.display().to_string()),
            end_time: None,
            reason: None,
            iteration: None,
            current_agent: None,
            review_summary: None,
            codex_review_text: None,
        };
        assert!(
            self.locks.create(&lock).await.expect("create lock"),
            "lock creation was rejected"
        );

        let log = SessionLog::open(&self.log_path).expect("open session log");
        let deps = EngineDeps {
            agents: Arc::new(self.runner.clone()),
            checkpoints: Arc::new(self.checkpoints.clone()),
            clock: self.clock.clone(),
            locks: Arc::new(StoreLockSink::new(
                self.locks.clone(),
                self.lock_path.clone(),
                self.session_id.clone(),
            )),
            log: Arc::new(StoreSessionSink::new(log)),
            prompts: Arc::new(DefaultPromptBuilder),
            sink: Arc::new(RecordingSink::new()),
        };
        let engine = CycleEngine::new(
            config,
            deps,
            CycleContext {
                project_path: self.project_path(),
                session_id: self.session_id.clone(),
                session_name: "spec-session".to_string(),
                branch: Some("main".to_string()),
            },
            options,
            self.cancel.clone(),
        );
        engine.run().await
    }

    pub async fn lock_on_disk(&self) -> Lockfile {
        self.locks
            .read(&self.lock_path)
            .await
            .expect("lock should exist")
    }
}
