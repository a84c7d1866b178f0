// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line surface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gyre", version, about = "Cycling workflow scheduler")]
pub struct Cli {
    /// Workflow run directory (defaults to the current directory).
    #[arg(long, global = true)]
    pub run_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install a definition and start its scheduler.
    Play {
        /// Path to the workflow definition (`flow.toml`) or a directory
        /// containing one.
        source: PathBuf,
        /// Run the scheduler in the foreground instead of detaching.
        #[arg(long)]
        no_detach: bool,
    },

    /// Stop the scheduler.
    Stop {
        /// Once: stop now, waiting for submitted jobs to be terminated.
        /// Twice: stop immediately, orphaning running jobs.
        #[arg(long, action = clap::ArgAction::Count)]
        now: u8,
        /// Kill active jobs, then stop.
        #[arg(long)]
        kill: bool,
    },

    /// Hold tasks, or the whole workflow.
    Hold {
        /// Task ids (`point/name`); empty means hold everything.
        tasks: Vec<String>,
        /// Hold every task after this cycle point.
        #[arg(long)]
        after: Option<String>,
    },

    /// Release held tasks, or the whole workflow.
    Release {
        tasks: Vec<String>,
        #[arg(long)]
        all: bool,
    },

    /// Force tasks to run regardless of prerequisites.
    Trigger { tasks: Vec<String> },

    /// Insert task proxies into the pool.
    Insert { tasks: Vec<String> },

    /// Remove task proxies from the pool.
    Remove { tasks: Vec<String> },

    /// Reset task statuses.
    Reset {
        tasks: Vec<String>,
        #[arg(long)]
        status: String,
    },

    /// Change the scheduler log verbosity.
    SetVerbosity { level: String },

    /// Reload the workflow definition.
    Reload,

    /// Override task runtime settings.
    Broadcast(BroadcastArgs),

    /// Pause the workflow (no new submissions).
    Pause,

    /// Resume a paused workflow.
    Resume,

    /// Workflow status summary.
    Status,

    /// List the task pool.
    List,

    /// Show one task's prerequisites, outputs, and xtriggers.
    Show { task: String },

    /// List stored checkpoints.
    LsCheckpoints,

    /// Send a task message to the scheduler (used by jobs).
    Message {
        task: String,
        message: String,
        #[arg(long, default_value = "NORMAL")]
        severity: String,
    },
}

#[derive(Args, Debug)]
pub struct BroadcastArgs {
    /// Cycle point to match (`*` for all).
    #[arg(long, default_value = "*")]
    pub point: String,
    /// Namespace to match (`*` for all).
    #[arg(long, default_value = "*")]
    pub namespace: String,
    /// Settings as `key=value` (dotted keys nest, e.g.
    /// `environment.NAME=bob`).
    pub settings: Vec<String>,
    /// Clear matching broadcasts instead of setting.
    #[arg(long)]
    pub clear: bool,
}
