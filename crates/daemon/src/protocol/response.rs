// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use gyre_core::{TaskId, TaskStatus};
use serde::{Deserialize, Serialize};

/// Response from the scheduler to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Request accepted.
    Ok,
    /// Request failed; human-readable reason.
    Error { message: String },
    Status { status: StatusInfo },
    Tasks { tasks: Vec<TaskEntry> },
    Show { detail: ShowDetail },
    Checkpoints { checkpoints: Vec<CheckpointEntry> },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error { message: message.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusInfo {
    pub workflow: String,
    pub paused: bool,
    pub stopping: bool,
    pub pool_size: usize,
    pub oldest_active_point: Option<String>,
    pub uuid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskEntry {
    pub id: TaskId,
    pub status: TaskStatus,
    pub is_held: bool,
    pub submit_num: u32,
}

/// `show` output: the labelled prerequisite rendering plus output and
/// xtrigger state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShowDetail {
    pub id: TaskId,
    pub status: TaskStatus,
    /// One rendered expression per prerequisite, e.g. `((0 | 1) & 2)`.
    pub prerequisites: Vec<String>,
    /// Atom lines: `+ 0 = 1/foo:succeeded`.
    pub atoms: Vec<String>,
    /// Output name -> completed.
    pub outputs: Vec<(String, bool)>,
    /// Xtrigger label -> satisfied.
    pub xtriggers: Vec<(String, bool)>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointEntry {
    pub id: u32,
    pub event: String,
    pub time: String,
}
