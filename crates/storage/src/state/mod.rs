// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state built from WAL replay.
//!
//! This is the restart and external-reader surface: the engine holds rich
//! task proxies in memory; every mutation is expressed as an [`Event`],
//! appended to the WAL, and folded into this state.

mod types;

pub use types::{BroadcastRow, CheckpointRow, TaskEventRow, TaskPoolRow, TaskStateRow};

use gyre_core::task::{ExitClass, JobRecord};
use gyre_core::{Event, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Workflow parameter key holding the persistent run uuid.
pub const PARAM_UUID: &str = "uuid_str";
/// Workflow parameter key for the paused flag.
pub const PARAM_PAUSED: &str = "paused";
/// Workflow parameter key for the hold-after point.
pub const PARAM_HOLD_POINT: &str = "hold_point";
/// Workflow parameter key for the log verbosity level.
pub const PARAM_VERBOSITY: &str = "verbosity";
/// Workflow parameter key for the current definition hash.
pub const PARAM_DEF_HASH: &str = "def_hash";

/// Materialized state from WAL replay.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedState {
    /// Live task pool: identity -> pool row.
    pub pool: BTreeMap<TaskId, TaskPoolRow>,
    /// Every instance ever spawned: identity -> latest state.
    pub states: BTreeMap<TaskId, TaskStateRow>,
    /// Job history per instance.
    pub jobs: BTreeMap<TaskId, Vec<JobRecord>>,
    /// Recorded task events, append-only.
    #[serde(default)]
    pub events: Vec<TaskEventRow>,
    /// Live broadcast overrides, in arrival order.
    #[serde(default)]
    pub broadcasts: Vec<BroadcastRow>,
    /// Xtrigger result cache: resolved signature -> results mapping.
    #[serde(default)]
    pub xtriggers: BTreeMap<String, serde_json::Value>,
    /// Workflow parameters (uuid_str, paused, hold_point, ...).
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Resolved namespace inheritance, for external readers.
    #[serde(default)]
    pub inheritance: BTreeMap<String, Vec<String>>,
    /// Named checkpoints.
    #[serde(default)]
    pub checkpoints: Vec<CheckpointRow>,
}

impl MaterializedState {
    /// Fold one event into the state.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::TaskSpawned { id, is_held } => {
                self.pool.entry(id.clone()).or_insert(TaskPoolRow {
                    status: TaskStatus::Waiting,
                    is_held: *is_held,
                    children_spawned: false,
                });
                self.states.entry(id.clone()).or_insert(TaskStateRow {
                    status: TaskStatus::Waiting,
                    submit_num: 0,
                });
                self.jobs.entry(id.clone()).or_default();
            }

            Event::TaskStatusChanged { id, status, .. } => {
                if let Some(row) = self.pool.get_mut(id) {
                    row.status = *status;
                }
                if let Some(row) = self.states.get_mut(id) {
                    row.status = *status;
                }
            }

            Event::TaskHeld { id } => {
                if let Some(row) = self.pool.get_mut(id) {
                    row.is_held = true;
                }
            }

            Event::TaskReleased { id } => {
                if let Some(row) = self.pool.get_mut(id) {
                    row.is_held = false;
                }
            }

            Event::TaskRemoved { id, .. } => {
                self.pool.remove(id);
            }

            Event::OutputCompleted { id, output, message, time } => {
                self.events.push(TaskEventRow {
                    id: id.clone(),
                    event: format!("output:{output}"),
                    message: message.clone(),
                    time: time.clone(),
                });
            }

            Event::TaskMessage { id, severity, message, time } => {
                self.events.push(TaskEventRow {
                    id: id.clone(),
                    event: format!("message:{severity}"),
                    message: message.clone(),
                    time: time.clone(),
                });
            }

            Event::JobSubmitted { id, submit_num, platform, runner_job_id, time } => {
                let record = self.job_record(id, *submit_num, platform);
                record.runner_job_id = runner_job_id.clone();
                record.submit_exit = Some(0);
                record.time_submit = Some(time.clone());
                record.time_submit_exit = Some(time.clone());
                if let Some(state) = self.states.get_mut(id) {
                    state.submit_num = (*submit_num).max(state.submit_num);
                }
                self.push_job_event(id, "submitted", "", time);
            }

            Event::JobSubmitFailed { id, submit_num, time } => {
                let record = self.job_record(id, *submit_num, "");
                record.submit_exit = Some(1);
                record.time_submit_exit = Some(time.clone());
                if let Some(state) = self.states.get_mut(id) {
                    state.submit_num = (*submit_num).max(state.submit_num);
                }
                self.push_job_event(id, "submission failed", "", time);
            }

            Event::JobStarted { id, submit_num, time } => {
                let record = self.job_record(id, *submit_num, "");
                record.time_run = Some(time.clone());
                self.push_job_event(id, "started", "", time);
            }

            Event::JobExited { id, submit_num, exit, time } => {
                let record = self.job_record(id, *submit_num, "");
                record.run_exit = Some(*exit);
                record.time_run_exit = Some(time.clone());
                if *exit == ExitClass::Vacated {
                    record.vacated = true;
                }
                self.push_job_event(id, "exited", &exit.to_string(), time);
            }

            Event::BroadcastSet { point_expr, name_expr, overrides, lifespan } => {
                self.broadcasts.push(BroadcastRow {
                    point_expr: point_expr.clone(),
                    name_expr: name_expr.clone(),
                    overrides: overrides.clone(),
                    lifespan: lifespan.clone(),
                });
            }

            Event::BroadcastExpired { point_expr, name_expr } => {
                self.broadcasts
                    .retain(|b| !(b.point_expr == *point_expr && b.name_expr == *name_expr));
            }

            Event::XtriggerSatisfied { signature, results } => {
                self.xtriggers.insert(signature.clone(), results.clone());
            }

            Event::ParamSet { key, value } => {
                self.params.insert(key.clone(), value.clone());
            }

            Event::Paused => {
                self.params.insert(PARAM_PAUSED.to_string(), "true".to_string());
            }

            Event::Resumed => {
                self.params.insert(PARAM_PAUSED.to_string(), "false".to_string());
            }

            Event::HoldPointSet { point } => match point {
                Some(p) => {
                    self.params.insert(PARAM_HOLD_POINT.to_string(), p.to_string());
                }
                None => {
                    self.params.remove(PARAM_HOLD_POINT);
                }
            },

            Event::VerbositySet { level } => {
                self.params.insert(PARAM_VERBOSITY.to_string(), level.clone());
            }

            Event::Reloaded { hash } => {
                self.params.insert(PARAM_DEF_HASH.to_string(), hash.clone());
            }

            Event::CheckpointCreated { id, name, time } => {
                self.checkpoints.push(CheckpointRow {
                    id: *id,
                    event: name.clone(),
                    time: time.clone(),
                });
            }

            // Recorded in the WAL for the run history; no state fold.
            Event::Shutdown { .. } | Event::Custom => {}
        }
    }

    /// Find-or-create the job record for a submit number.
    fn job_record(&mut self, id: &TaskId, submit_num: u32, platform: &str) -> &mut JobRecord {
        let records = self.jobs.entry(id.clone()).or_default();
        if let Some(idx) = records.iter().position(|r| r.submit_num == submit_num) {
            if !platform.is_empty() {
                records[idx].platform = platform.to_string();
            }
            &mut records[idx]
        } else {
            let try_num = records.len() as u32 + 1;
            records.push(JobRecord::new(submit_num, try_num, platform));
            let last = records.len() - 1;
            &mut records[last]
        }
    }

    fn push_job_event(&mut self, id: &TaskId, event: &str, message: &str, time: &str) {
        self.events.push(TaskEventRow {
            id: id.clone(),
            event: event.to_string(),
            message: message.to_string(),
            time: time.to_string(),
        });
    }

    /// Restart recovery: mark every open job record vacated and return the
    /// instances that need a poll to re-establish their status.
    pub fn vacate_open_jobs(&mut self) -> Vec<TaskId> {
        let mut repoll = Vec::new();
        for (id, records) in &mut self.jobs {
            if let Some(record) = records.last_mut() {
                if !record.is_terminal() && record.submit_exit.is_some() {
                    record.vacated = true;
                    repoll.push(id.clone());
                }
            }
        }
        repoll
    }

    pub fn is_paused(&self) -> bool {
        self.params.get(PARAM_PAUSED).map(|v| v == "true").unwrap_or(false)
    }

    pub fn uuid(&self) -> Option<&str> {
        self.params.get(PARAM_UUID).map(String::as_str)
    }

    /// Latest job records for one instance.
    pub fn jobs_for(&self, id: &TaskId) -> &[JobRecord] {
        self.jobs.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Next free checkpoint id (0 is reserved for "latest").
    pub fn next_checkpoint_id(&self) -> u32 {
        self.checkpoints.iter().map(|c| c.id).max().unwrap_or(0) + 1
    }
}

#[cfg(test)]
#[path = "../state_tests.rs"]
mod tests;
