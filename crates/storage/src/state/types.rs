// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row types of the materialized state.
//!
//! Names capture the behavioral contract of the relational surface
//! (task_pool, task_states, task_jobs, task_events, broadcasts,
//! xtriggers, checkpoints); storage is JSON in the snapshot.

use gyre_core::event::BroadcastLifespan;
use gyre_core::{TaskId, TaskStatus};
use serde::{Deserialize, Serialize};

/// One live pool member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPoolRow {
    pub status: TaskStatus,
    #[serde(default)]
    pub is_held: bool,
    #[serde(default)]
    pub children_spawned: bool,
}

/// Latest known state of any task instance ever spawned (survives pool
/// removal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStateRow {
    pub status: TaskStatus,
    #[serde(default)]
    pub submit_num: u32,
}

/// One recorded task event (for `task_events` readers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEventRow {
    pub id: TaskId,
    pub event: String,
    pub message: String,
    pub time: String,
}

/// One live broadcast override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastRow {
    pub point_expr: String,
    pub name_expr: String,
    pub overrides: serde_json::Value,
    pub lifespan: BroadcastLifespan,
}

/// One named checkpoint (`id` 0 is reserved for "latest").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRow {
    pub id: u32,
    pub event: String,
    pub time: String,
}
