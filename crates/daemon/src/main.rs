// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gyred`: the scheduler process for one workflow run directory.
//!
//! Invoked by `gyre play`; not normally run by hand. Usage:
//! `gyred <run-dir> [--no-detach-log]`.

use gyre_daemon::engine_loop;
use gyre_daemon::{startup, Config};
use std::path::PathBuf;
use std::process::ExitCode;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(run_dir) = args.next() else {
        eprintln!("usage: gyred <run-dir>");
        return ExitCode::from(2);
    };
    let config = Config::from_run_dir(&PathBuf::from(run_dir));

    // The scheduler log is the primary output; stderr only carries
    // pre-logging startup failures.
    let log_handle = match gyre_daemon::logging::init(&config.scheduler_log_dir) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("gyred: cannot open scheduler log: {e}");
            return ExitCode::from(2);
        }
    };

    let startup_result = match startup(config, VERSION) {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("startup refused: {e}");
            eprintln!("gyred: {e}");
            return ExitCode::from(2);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("gyred: cannot start runtime: {e}");
            return ExitCode::from(2);
        }
    };
    let exit = runtime.block_on(engine_loop::run(startup_result, log_handle));
    ExitCode::from(exit.code() as u8)
}
