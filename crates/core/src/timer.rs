// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer identifier type for tracking scheduled deadlines.
//!
//! Timer ids are string-encoded so they can round-trip through effects and
//! logs; [`TimerKind`] gives typed parse/format for routing when one fires.

use crate::id::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a scheduled timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(String);

impl TimerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn submit_retry(task: &TaskId) -> Self {
        TimerKind::SubmitRetry(task.clone()).to_timer_id()
    }

    pub fn exec_retry(task: &TaskId) -> Self {
        TimerKind::ExecRetry(task.clone()).to_timer_id()
    }

    pub fn submission_poll(task: &TaskId) -> Self {
        TimerKind::SubmissionPoll(task.clone()).to_timer_id()
    }

    pub fn execution_poll(task: &TaskId) -> Self {
        TimerKind::ExecutionPoll(task.clone()).to_timer_id()
    }

    pub fn execution_timeout(task: &TaskId) -> Self {
        TimerKind::ExecutionTimeout(task.clone()).to_timer_id()
    }

    pub fn expiry(task: &TaskId) -> Self {
        TimerKind::Expiry(task.clone()).to_timer_id()
    }

    pub fn stall() -> Self {
        TimerKind::Stall.to_timer_id()
    }

    pub fn inactivity() -> Self {
        TimerKind::Inactivity.to_timer_id()
    }

    /// Parse this timer ID into a typed `TimerKind`.
    pub fn kind(&self) -> Option<TimerKind> {
        TimerKind::parse(&self.0)
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed representation of a timer ID for type-safe routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind {
    /// Submission retry delay elapsed for a task.
    SubmitRetry(TaskId),
    /// Execution retry delay elapsed for a task.
    ExecRetry(TaskId),
    /// Next submission poll is due.
    SubmissionPoll(TaskId),
    /// Next execution poll is due.
    ExecutionPoll(TaskId),
    /// Execution time limit deadline passed.
    ExecutionTimeout(TaskId),
    /// Expiry offset reached.
    Expiry(TaskId),
    /// Workflow stall timeout.
    Stall,
    /// Workflow inactivity timeout.
    Inactivity,
}

impl TimerKind {
    /// Parse a timer ID string into a typed `TimerKind`.
    ///
    /// Returns `None` for unrecognized timer ID formats.
    pub fn parse(id: &str) -> Option<TimerKind> {
        if id == "stall" {
            return Some(TimerKind::Stall);
        }
        if id == "inactivity" {
            return Some(TimerKind::Inactivity);
        }
        let (prefix, rest) = id.split_once(':')?;
        let task = TaskId::parse(rest)?;
        match prefix {
            "submit-retry" => Some(TimerKind::SubmitRetry(task)),
            "exec-retry" => Some(TimerKind::ExecRetry(task)),
            "submission-poll" => Some(TimerKind::SubmissionPoll(task)),
            "execution-poll" => Some(TimerKind::ExecutionPoll(task)),
            "execution-timeout" => Some(TimerKind::ExecutionTimeout(task)),
            "expiry" => Some(TimerKind::Expiry(task)),
            _ => None,
        }
    }

    /// Format this `TimerKind` back into a canonical `TimerId`.
    pub fn to_timer_id(&self) -> TimerId {
        match self {
            TimerKind::SubmitRetry(t) => TimerId::new(format!("submit-retry:{t}")),
            TimerKind::ExecRetry(t) => TimerId::new(format!("exec-retry:{t}")),
            TimerKind::SubmissionPoll(t) => TimerId::new(format!("submission-poll:{t}")),
            TimerKind::ExecutionPoll(t) => TimerId::new(format!("execution-poll:{t}")),
            TimerKind::ExecutionTimeout(t) => TimerId::new(format!("execution-timeout:{t}")),
            TimerKind::Expiry(t) => TimerId::new(format!("expiry:{t}")),
            TimerKind::Stall => TimerId::new("stall"),
            TimerKind::Inactivity => TimerId::new("inactivity"),
        }
    }

    /// The task this timer belongs to, for per-task timers.
    pub fn task(&self) -> Option<&TaskId> {
        match self {
            TimerKind::SubmitRetry(t)
            | TimerKind::ExecRetry(t)
            | TimerKind::SubmissionPoll(t)
            | TimerKind::ExecutionPoll(t)
            | TimerKind::ExecutionTimeout(t)
            | TimerKind::Expiry(t) => Some(t),
            TimerKind::Stall | TimerKind::Inactivity => None,
        }
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
