// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task proxy: one instance of a task definition at a cycle point, with its
//! state machine and per-attempt job history.

use crate::id::TaskId;
use crate::outputs::OutputSet;
use crate::prereq::Prerequisite;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Task proxy status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Waiting,
    Preparing,
    Submitted,
    Running,
    Succeeded,
    Failed,
    SubmitFailed,
    Expired,
}

crate::simple_display! {
    TaskStatus {
        Waiting => "waiting",
        Preparing => "preparing",
        Submitted => "submitted",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        SubmitFailed => "submit-failed",
        Expired => "expired",
    }
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded
                | TaskStatus::Failed
                | TaskStatus::SubmitFailed
                | TaskStatus::Expired
        )
    }

    /// Progression rank used to keep stale poll results from regressing a
    /// proxy past a newer message.
    pub fn rank(&self) -> u8 {
        match self {
            TaskStatus::Waiting => 0,
            TaskStatus::Preparing => 1,
            TaskStatus::Submitted => 2,
            TaskStatus::Running => 3,
            TaskStatus::Succeeded
            | TaskStatus::Failed
            | TaskStatus::SubmitFailed
            | TaskStatus::Expired => 4,
        }
    }

    /// Legal state-machine transitions. Retry re-entry goes through
    /// `Waiting` while the retry delay runs.
    pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
        use TaskStatus::*;
        if from == to {
            return false;
        }
        match (from, to) {
            (Waiting, Preparing) => true,
            (Preparing, Submitted) | (Preparing, SubmitFailed) => true,
            // Transport failure of the submit invocation: the batch is
            // retained and the proxy falls back to waiting.
            (Preparing, Waiting) => true,
            (Submitted, Running) | (Submitted, SubmitFailed) => true,
            // A single poll can jump straight to a terminal outcome.
            (Submitted, Succeeded) | (Submitted, Failed) => true,
            (Running, Succeeded) | (Running, Failed) => true,
            // Retry path back through waiting.
            (Failed, Waiting) | (SubmitFailed, Waiting) => true,
            // Expiry from any non-terminal state.
            (f, Expired) if !f.is_terminal() => true,
            _ => false,
        }
    }
}

/// Exit classification reported for a finished (or vacated) job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitClass {
    #[serde(rename = "SUCCEEDED")]
    Succeeded,
    #[serde(rename = "ERR")]
    Err,
    #[serde(rename = "TERM")]
    Term,
    #[serde(rename = "XCPU")]
    Xcpu,
    #[serde(rename = "vacated/USR1")]
    Vacated,
}

crate::simple_display! {
    ExitClass {
        Succeeded => "SUCCEEDED",
        Err => "ERR",
        Term => "TERM",
        Xcpu => "XCPU",
        Vacated => "vacated/USR1",
    }
}

impl ExitClass {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "SUCCEEDED" => Some(ExitClass::Succeeded),
            "ERR" => Some(ExitClass::Err),
            "TERM" => Some(ExitClass::Term),
            "XCPU" => Some(ExitClass::Xcpu),
            "vacated/USR1" => Some(ExitClass::Vacated),
            _ => None,
        }
    }
}

/// One submission attempt of a task proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub submit_num: u32,
    /// Execution try number (resets submit-retry counting).
    pub try_num: u32,
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_job_id: Option<String>,
    /// Exit code of the jobs-submit invocation, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_exit: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_exit: Option<ExitClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_submit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_submit_exit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_run: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_run_exit: Option<String>,
    /// Set when the job was vacated (checkpoint-resume) or orphaned by a
    /// scheduler restart; a resumed process may rejoin this record.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub vacated: bool,
}

impl JobRecord {
    pub fn new(submit_num: u32, try_num: u32, platform: impl Into<String>) -> Self {
        Self {
            submit_num,
            try_num,
            platform: platform.into(),
            runner_job_id: None,
            submit_exit: None,
            run_exit: None,
            time_submit: None,
            time_submit_exit: None,
            time_run: None,
            time_run_exit: None,
            vacated: false,
        }
    }

    /// A record is terminal once submission failed or the run exited with
    /// anything but a vacation. Vacated records stay open for rejoin.
    pub fn is_terminal(&self) -> bool {
        if self.submit_exit.map(|code| code != 0).unwrap_or(false) {
            return true;
        }
        matches!(self.run_exit, Some(exit) if exit != ExitClass::Vacated)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal status transition for {id}: {from} -> {to}")]
pub struct TransitionError {
    pub id: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Mutable instance of a task definition at a specific cycle point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProxy {
    pub id: TaskId,
    pub status: TaskStatus,
    #[serde(default)]
    pub is_held: bool,
    pub prereqs: Vec<Prerequisite>,
    pub outputs: OutputSet,
    #[serde(default)]
    pub jobs: Vec<JobRecord>,
    /// Xtrigger label -> satisfied.
    #[serde(default)]
    pub xtriggers: IndexMap<String, bool>,
    /// Wall-clock time after which the proxy expires, when the task
    /// declares an expiry offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<Utc>>,
    /// Submit-retry delays consumed so far.
    #[serde(default)]
    pub submit_tries: u32,
    /// Execution-retry delays consumed so far.
    #[serde(default)]
    pub exec_tries: u32,
    /// All downstream children this proxy's outputs can spawn have been
    /// spawned (or were blocked only by an explicit stop point).
    #[serde(default)]
    pub children_spawned: bool,
}

impl TaskProxy {
    pub fn new(id: TaskId, prereqs: Vec<Prerequisite>, outputs: OutputSet) -> Self {
        Self {
            id,
            status: TaskStatus::Waiting,
            is_held: false,
            prereqs,
            outputs,
            jobs: Vec::new(),
            xtriggers: IndexMap::new(),
            expire_at: None,
            submit_tries: 0,
            exec_tries: 0,
            children_spawned: false,
        }
    }

    /// 1-based submit number; equals the length of the job history.
    pub fn submit_num(&self) -> u32 {
        self.jobs.len() as u32
    }

    /// The latest job record, if any attempt has been made.
    pub fn current_job(&self) -> Option<&JobRecord> {
        self.jobs.last()
    }

    pub fn current_job_mut(&mut self) -> Option<&mut JobRecord> {
        self.jobs.last_mut()
    }

    /// Append a fresh job record for the next submission attempt.
    pub fn new_job(&mut self, platform: impl Into<String>) -> &mut JobRecord {
        let submit_num = self.submit_num() + 1;
        let try_num = self.exec_tries + 1;
        self.jobs.push(JobRecord::new(submit_num, try_num, platform));
        // Only the newest record may be non-terminal.
        debug_assert!(
            self.jobs[..self.jobs.len() - 1].iter().all(JobRecord::is_terminal),
            "{}: older job record still open",
            self.id
        );
        self.jobs.last_mut().unwrap_or_else(|| unreachable!("just pushed"))
    }

    /// Validated status transition.
    pub fn set_status(&mut self, to: TaskStatus) -> Result<(), TransitionError> {
        if !TaskStatus::can_transition(self.status, to) {
            return Err(TransitionError { id: self.id.clone(), from: self.status, to });
        }
        self.status = to;
        Ok(())
    }

    /// Operator reset: bypasses the transition table.
    pub fn force_status(&mut self, to: TaskStatus) {
        self.status = to;
    }

    pub fn prereqs_satisfied(&self) -> bool {
        self.prereqs.iter().filter(|p| !p.suicide).all(|p| p.is_satisfied())
    }

    pub fn xtriggers_satisfied(&self) -> bool {
        self.xtriggers.values().all(|sat| *sat)
    }

    /// Mark an xtrigger label satisfied. Returns true if it flipped.
    pub fn satisfy_xtrigger(&mut self, label: &str) -> bool {
        match self.xtriggers.get_mut(label) {
            Some(sat) if !*sat => {
                *sat = true;
                true
            }
            _ => false,
        }
    }

    /// Ready to hand to the job manager.
    pub fn is_runnable(&self) -> bool {
        self.status == TaskStatus::Waiting
            && !self.is_held
            && self.prereqs_satisfied()
            && self.xtriggers_satisfied()
    }

    /// Waiting on anything other than suicide prerequisites. Used by stall
    /// detection: a proxy only waiting on suicide conditions is not stuck.
    pub fn is_waiting_on_prereqs(&self) -> bool {
        self.status == TaskStatus::Waiting
            && (!self.prereqs_satisfied() || !self.xtriggers_satisfied())
    }

    /// Any satisfied suicide prerequisite means the proxy should be removed.
    pub fn suicide_due(&self) -> bool {
        self.prereqs.iter().any(|p| p.suicide && p.is_satisfied())
    }

    /// Candidate for removal: output-complete with all children spawned.
    pub fn is_removable(&self) -> bool {
        self.status.is_terminal() && self.outputs.is_complete() && self.children_spawned
    }
}

crate::builder! {
    pub struct TaskProxyBuilder => TaskProxy {
        set {
            id: TaskId = TaskId::new("foo", crate::point::CyclePoint::Integer(1)),
            status: TaskStatus = TaskStatus::Waiting,
            is_held: bool = false,
            prereqs: Vec<Prerequisite> = Vec::new(),
            outputs: OutputSet = OutputSet::default(),
            jobs: Vec<JobRecord> = Vec::new(),
            xtriggers: IndexMap<String, bool> = IndexMap::new(),
            submit_tries: u32 = 0,
            exec_tries: u32 = 0,
            children_spawned: bool = false,
        }
        option {
            expire_at: DateTime<Utc> = None,
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
