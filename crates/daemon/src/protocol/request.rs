// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use gyre_core::event::MessageSeverity;
use gyre_core::TaskId;
use gyre_engine::OperatorCommand;
use serde::{Deserialize, Serialize};

/// Request from a client (CLI or job) to the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Operator command, applied at the top of the next tick.
    Command { command: OperatorCommand },

    /// Authenticated message from a running job.
    Message {
        id: TaskId,
        severity: MessageSeverity,
        message: String,
    },

    /// Query state
    Query { query: Query },
}

/// Read-only queries over the scheduler state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "query", rename_all = "kebab-case")]
pub enum Query {
    /// Workflow status summary.
    Status,
    /// The live task pool.
    Tasks,
    /// One task's prerequisites, outputs, and xtriggers.
    Show { task: TaskId },
    /// Stored checkpoints.
    Checkpoints,
}
