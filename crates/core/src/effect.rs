// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects represent side effects the engine needs to perform.

use crate::event::Event;
use crate::id::TaskId;
use crate::point::CyclePoint;
use crate::timer::TimerId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A fully-prepared job ready for a runner's submit batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: TaskId,
    pub submit_num: u32,
    pub platform: String,
    /// Generated job script body.
    pub script: String,
    /// Job log directory: `log/job/<cycle>/<task>/<NN>`.
    pub job_dir: PathBuf,
}

/// Reference to a previously-submitted job for poll/kill batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRef {
    pub id: TaskId,
    pub submit_num: u32,
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_job_id: Option<String>,
    pub job_dir: PathBuf,
}

/// Effects that need to be executed by the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Emit an event into the system event bus
    Emit { event: Event },

    // === Runner batches ===
    /// Submit a batch of prepared jobs on one platform.
    SubmitJobs { platform: String, jobs: Vec<JobSpec> },

    /// Poll a batch of jobs on one platform.
    PollJobs { platform: String, jobs: Vec<JobRef> },

    /// Kill a batch of jobs on one platform.
    KillJobs { platform: String, jobs: Vec<JobRef> },

    // === Event handlers ===
    /// Run one event-handler subprocess with a timeout.
    RunHandler {
        task: TaskId,
        /// Handler key, e.g. `event-handler-00`.
        handler: String,
        event: String,
        attempt: u32,
        command: String,
        #[serde(with = "duration_serde")]
        timeout: Duration,
    },

    // === Xtriggers ===
    /// Call an xtrigger function on the xtrigger pool.
    CallXtrigger {
        label: String,
        /// Cache key: function name and arguments after cycle-point
        /// substitution.
        signature: String,
        function: String,
        /// Bound arguments, already substituted.
        args: indexmap::IndexMap<String, String>,
        point: CyclePoint,
    },

    // === Timers ===
    /// Set a timer
    SetTimer {
        id: TimerId,
        #[serde(with = "duration_serde")]
        duration: Duration,
    },

    /// Cancel a timer
    CancelTimer { id: TimerId },
}

impl Effect {
    /// Effect name for log spans (e.g., "submit_jobs", "run_handler")
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Emit { .. } => "emit",
            Effect::SubmitJobs { .. } => "submit_jobs",
            Effect::PollJobs { .. } => "poll_jobs",
            Effect::KillJobs { .. } => "kill_jobs",
            Effect::RunHandler { .. } => "run_handler",
            Effect::CallXtrigger { .. } => "call_xtrigger",
            Effect::SetTimer { .. } => "set_timer",
            Effect::CancelTimer { .. } => "cancel_timer",
        }
    }

    /// Key-value pairs for structured logging
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::Emit { event } => vec![("event", event.log_summary())],
            Effect::SubmitJobs { platform, jobs } => vec![
                ("platform", platform.clone()),
                ("jobs", jobs.len().to_string()),
            ],
            Effect::PollJobs { platform, jobs } => vec![
                ("platform", platform.clone()),
                ("jobs", jobs.len().to_string()),
            ],
            Effect::KillJobs { platform, jobs } => vec![
                ("platform", platform.clone()),
                ("jobs", jobs.len().to_string()),
            ],
            Effect::RunHandler { task, handler, event, attempt, .. } => vec![
                ("task", task.to_string()),
                ("handler", handler.clone()),
                ("event", event.clone()),
                ("attempt", attempt.to_string()),
            ],
            Effect::CallXtrigger { label, signature, .. } => {
                vec![("label", label.clone()), ("signature", signature.clone())]
            }
            Effect::SetTimer { id, duration } => vec![
                ("timer_id", id.to_string()),
                ("duration_ms", duration.as_millis().to_string()),
            ],
            Effect::CancelTimer { id } => vec![("timer_id", id.to_string())],
        }
    }

    /// Whether to show both 'started' and 'completed' or just 'executed',
    /// to control the verbosity for frequent effects.
    pub fn verbose(&self) -> bool {
        match self {
            Effect::Emit { .. } => false,
            Effect::SetTimer { .. } => false,
            Effect::CancelTimer { .. } => false,
            Effect::PollJobs { .. } => false,
            _ => true,
        }
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        duration.as_millis().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
#[path = "effect_tests.rs"]
mod tests;
