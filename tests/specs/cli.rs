// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI surface smoke tests.

use assert_cmd::Command;
use tempfile::TempDir;

// `rr` lives in a separate workspace member, so `Command::cargo_bin` (which
// relies on `CARGO_BIN_EXE_rr`, only set for binaries of the package under
// test) can't find it here. `escargot` builds it and hands back the path.
fn rr_cmd() -> Command {
    let run = escargot::CargoBuild::new()
        .package("rr")
        .bin("rr")
        .run()
        .expect("build rr binary");
    Command::from_std(run.command())
}

#[test]
fn help_lists_the_subcommands() {
    let assert = rr_cmd().arg("--help").assert();
    let output = assert.get_output().stdout.clone();
    let help = String::from_utf8_lossy(&output);
    for subcommand in ["run", "doctor", "init", "sessions", "stop"] {
        assert!(help.contains(subcommand), "missing {subcommand} in help");
    }
}

#[test]
fn init_writes_a_config_and_reports() {
    let dir = TempDir::new().expect("tempdir");
    let assert = rr_cmd()
        .arg("-C")
        .arg(dir.path())
        .arg("init")
        .assert()
        .success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(output.contains("rr.toml"), "unexpected output: {output}");
    assert!(dir.path().join("rr.toml").exists());
}

#[test]
fn run_without_config_fails_preflight() {
    let dir = TempDir::new().expect("tempdir");
    rr_cmd()
        .arg("-C")
        .arg(dir.path())
        .arg("run")
        .assert()
        .failure();
}

#[test]
fn stop_without_a_session_fails_cleanly() {
    let dir = TempDir::new().expect("tempdir");
    rr_cmd()
        .arg("-C")
        .arg(dir.path())
        .arg("stop")
        .assert()
        .failure();
}
