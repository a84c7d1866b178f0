// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events that drive state transitions in the scheduler.
//!
//! Every event is appended to the WAL before it is applied; replaying the
//! log (on top of the latest snapshot) rebuilds the materialized state.
//!
//! Serializes with `{"type": "category:name", ...fields}` format.
//! Unknown type tags deserialize to `Custom`.

use crate::id::TaskId;
use crate::point::CyclePoint;
use crate::task::{ExitClass, TaskStatus};
use serde::{Deserialize, Serialize};

/// Severity attached to a task message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageSeverity {
    Normal,
    Warning,
    Critical,
}

crate::simple_display! {
    MessageSeverity {
        Normal => "NORMAL",
        Warning => "WARNING",
        Critical => "CRITICAL",
    }
}

/// How long a broadcast override stays in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastLifespan {
    Permanent,
    UntilTaskCompleted(TaskId),
    UntilCycleCompleted(CyclePoint),
}

/// Events that trigger state transitions in the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- task --
    #[serde(rename = "task:spawned")]
    TaskSpawned {
        id: TaskId,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_held: bool,
    },

    #[serde(rename = "task:status")]
    TaskStatusChanged { id: TaskId, status: TaskStatus, time: String },

    #[serde(rename = "task:held")]
    TaskHeld { id: TaskId },

    #[serde(rename = "task:released")]
    TaskReleased { id: TaskId },

    #[serde(rename = "task:removed")]
    TaskRemoved { id: TaskId, reason: String },

    /// An output of the task completed (standard or custom).
    #[serde(rename = "task:output")]
    OutputCompleted { id: TaskId, output: String, message: String, time: String },

    /// Free-form message from a running job, recorded for the event log.
    #[serde(rename = "task:message")]
    TaskMessage {
        id: TaskId,
        severity: MessageSeverity,
        message: String,
        time: String,
    },

    // -- job --
    #[serde(rename = "job:submitted")]
    JobSubmitted {
        id: TaskId,
        submit_num: u32,
        platform: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        runner_job_id: Option<String>,
        time: String,
    },

    #[serde(rename = "job:submit-failed")]
    JobSubmitFailed { id: TaskId, submit_num: u32, time: String },

    #[serde(rename = "job:started")]
    JobStarted { id: TaskId, submit_num: u32, time: String },

    /// The job exited (or was vacated) with the given classification.
    #[serde(rename = "job:exited")]
    JobExited {
        id: TaskId,
        submit_num: u32,
        exit: ExitClass,
        time: String,
    },

    // -- broadcast --
    #[serde(rename = "broadcast:set")]
    BroadcastSet {
        point_expr: String,
        name_expr: String,
        overrides: serde_json::Value,
        lifespan: BroadcastLifespan,
    },

    #[serde(rename = "broadcast:expired")]
    BroadcastExpired { point_expr: String, name_expr: String },

    // -- xtrigger --
    #[serde(rename = "xtrigger:satisfied")]
    XtriggerSatisfied { signature: String, results: serde_json::Value },

    // -- workflow --
    #[serde(rename = "workflow:param")]
    ParamSet { key: String, value: String },

    #[serde(rename = "workflow:paused")]
    Paused,

    #[serde(rename = "workflow:resumed")]
    Resumed,

    /// Hold every proxy after this point; `None` clears the hold point.
    #[serde(rename = "workflow:hold-point")]
    HoldPointSet {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        point: Option<CyclePoint>,
    },

    #[serde(rename = "workflow:verbosity")]
    VerbositySet { level: String },

    #[serde(rename = "workflow:reloaded")]
    Reloaded { hash: String },

    #[serde(rename = "workflow:checkpoint")]
    CheckpointCreated { id: u32, name: String, time: String },

    #[serde(rename = "workflow:shutdown")]
    Shutdown { reason: String },

    /// Catch-all for unknown event types (extensibility)
    #[serde(other, skip_serializing)]
    Custom,
}

impl Event {
    /// Terse one-line summary for effect/span logging.
    pub fn log_summary(&self) -> String {
        match self {
            Event::TaskSpawned { id, .. } => format!("task:spawned {id}"),
            Event::TaskStatusChanged { id, status, .. } => {
                format!("task:status {id} -> {status}")
            }
            Event::TaskHeld { id } => format!("task:held {id}"),
            Event::TaskReleased { id } => format!("task:released {id}"),
            Event::TaskRemoved { id, reason } => format!("task:removed {id} ({reason})"),
            Event::OutputCompleted { id, output, .. } => {
                format!("task:output {id}:{output}")
            }
            Event::TaskMessage { id, severity, .. } => {
                format!("task:message {id} {severity}")
            }
            Event::JobSubmitted { id, submit_num, .. } => {
                format!("job:submitted {}", id.job(*submit_num))
            }
            Event::JobSubmitFailed { id, submit_num, .. } => {
                format!("job:submit-failed {}", id.job(*submit_num))
            }
            Event::JobStarted { id, submit_num, .. } => {
                format!("job:started {}", id.job(*submit_num))
            }
            Event::JobExited { id, submit_num, exit, .. } => {
                format!("job:exited {} {exit}", id.job(*submit_num))
            }
            Event::BroadcastSet { point_expr, name_expr, .. } => {
                format!("broadcast:set [{point_expr}] {name_expr}")
            }
            Event::BroadcastExpired { point_expr, name_expr } => {
                format!("broadcast:expired [{point_expr}] {name_expr}")
            }
            Event::XtriggerSatisfied { signature, .. } => {
                format!("xtrigger:satisfied {signature}")
            }
            Event::ParamSet { key, .. } => format!("workflow:param {key}"),
            Event::Paused => "workflow:paused".to_string(),
            Event::Resumed => "workflow:resumed".to_string(),
            Event::HoldPointSet { point } => match point {
                Some(p) => format!("workflow:hold-point {p}"),
                None => "workflow:hold-point cleared".to_string(),
            },
            Event::VerbositySet { level } => format!("workflow:verbosity {level}"),
            Event::Reloaded { hash } => format!("workflow:reloaded {hash}"),
            Event::CheckpointCreated { id, name, .. } => {
                format!("workflow:checkpoint {id} {name}")
            }
            Event::Shutdown { reason } => format!("workflow:shutdown {reason}"),
            Event::Custom => "custom".to_string(),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
