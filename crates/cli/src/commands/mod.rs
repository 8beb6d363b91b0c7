// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod doctor;
pub mod init;
pub mod run;
pub mod sessions;
pub mod stop;

use rr_doctor::{DiagnosticsReport, Severity};

/// Print a report the way a human wants to scan it.
pub fn print_report(report: &DiagnosticsReport) {
    for item in &report.items {
        let tag = match item.severity {
            Severity::Ok => "ok",
            Severity::Warning => "warn",
            Severity::Error => "FAIL",
        };
        println!("{tag:>5}  {:<22} {}", item.check, item.message);
    }
}
