// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages into the engine loop.
//!
//! The queue is multi-producer/single-consumer: job message servers,
//! finished runner invocations, xtrigger calls, handler subprocesses, and
//! the command listener all enqueue; only the engine loop drains. Ordering
//! per producer is preserved; ordering between producers is unspecified.

use gyre_adapters::{KillOutcome, PollOutcome, PoolOutcome, RunnerError, SubmitOutcome};
use gyre_core::effect::JobSpec;
use gyre_core::event::MessageSeverity;
use gyre_core::point::CyclePoint;
use gyre_core::{TaskId, TaskStatus, TimerId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the workflow is being asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopMode {
    /// `stop`: stop after active tasks finish.
    Request,
    /// `stop --now`: stop accepting work; wait for submitted jobs to be
    /// terminated by their platform.
    Now,
    /// `stop --now --now`: do not wait; orphan running jobs.
    NowNow,
    /// `stop --kill`: kill active jobs, then stop.
    Kill,
}

impl std::fmt::Display for StopMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StopMode::Request => "REQUEST(CLEAN)",
            StopMode::Now => "REQUEST(NOW)",
            StopMode::NowNow => "REQUEST(NOW-NOW)",
            StopMode::Kill => "REQUEST(KILL)",
        })
    }
}

/// Operator commands accepted at the top of a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum OperatorCommand {
    Hold {
        /// Specific proxies; empty means apply `after` or hold all.
        #[serde(default)]
        tasks: Vec<TaskId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        after: Option<CyclePoint>,
    },
    Release {
        #[serde(default)]
        tasks: Vec<TaskId>,
        /// Release everything and clear the hold point.
        #[serde(default)]
        all: bool,
    },
    Trigger {
        tasks: Vec<TaskId>,
    },
    Insert {
        tasks: Vec<TaskId>,
    },
    Remove {
        tasks: Vec<TaskId>,
    },
    Reset {
        tasks: Vec<TaskId>,
        status: TaskStatus,
    },
    SetVerbosity {
        level: String,
    },
    Broadcast {
        point_expr: String,
        name_expr: String,
        overrides: Value,
    },
    ClearBroadcast {
        point_expr: String,
        name_expr: String,
    },
    Pause,
    Resume,
    Reload,
    Stop {
        mode: StopMode,
    },
}

/// Everything the engine loop can be woken with.
#[derive(Debug)]
pub enum EngineMsg {
    /// Authenticated message from a running job.
    TaskMessage {
        id: TaskId,
        severity: MessageSeverity,
        message: String,
    },
    /// A submit batch finished (or failed as a whole).
    SubmitResult {
        platform: String,
        jobs: Vec<JobSpec>,
        result: Result<Vec<SubmitOutcome>, RunnerError>,
    },
    /// A poll batch finished.
    PollResult {
        platform: String,
        result: Result<Vec<PollOutcome>, RunnerError>,
    },
    /// A kill batch finished.
    KillResult {
        platform: String,
        result: Result<Vec<KillOutcome>, RunnerError>,
    },
    /// An xtrigger call completed.
    XtriggerResult {
        label: String,
        signature: String,
        point: CyclePoint,
        satisfied: bool,
        results: Value,
    },
    /// An event-handler subprocess finished.
    HandlerResult {
        task: TaskId,
        handler: String,
        event: String,
        attempt: u32,
        outcome: PoolOutcome,
    },
    /// Operator command from the listener.
    Command(OperatorCommand),
    /// A scheduler timer fired.
    TimerFired(TimerId),
}
