// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level specs: the end-to-end scenarios from the engine's
//! contract, driven over real storage with scripted agents.

#[path = "specs/cli.rs"]
mod cli;
#[path = "specs/cycle.rs"]
mod cycle;
#[path = "specs/prelude.rs"]
mod prelude;
