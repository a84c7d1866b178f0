// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error-to-exit-code mapping for the CLI.

use std::process::ExitCode;

/// Print the error chain and pick the exit code. Management commands use
/// 2 for anything unrecoverable (no scheduler, bad arguments, transport
/// failure); scheduler policy aborts surface through `gyred` itself.
pub fn report(error: anyhow::Error) -> ExitCode {
    eprintln!("gyre: {error:#}");
    ExitCode::from(2)
}
