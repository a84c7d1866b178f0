// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job-runner capability trait and its structured outcomes.
//!
//! An `Err` from a batch operation is a transport-level failure of the
//! whole invocation (the batch is retained for the platform's retry
//! policy); per-job results ride inside `Ok`. Connection-refused on poll
//! must never be treated as job failure.

use async_trait::async_trait;
use gyre_core::effect::{JobRef, JobSpec};
use gyre_core::task::ExitClass;
use gyre_core::TaskId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Authentication refused")]
    AuthRefused,
    #[error("runner invocation failed with exit code {0}")]
    Transport(i32),
    #[error("runner io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-job result of a submit batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub id: TaskId,
    pub submit_num: u32,
    /// jobs-submit exit code for this job: 0 with a runner job id on
    /// success, nonzero on submission failure.
    pub ret_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_job_id: Option<String>,
}

/// What a poll learned about one job, read from its status file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_job_id: Option<String>,
    /// `CYLC_JOB_INIT_TIME`, present once the job has started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_time: Option<String>,
    /// Exit classification and `CYLC_JOB_EXIT_TIME`, present once done.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<(ExitClass, String)>,
}

impl JobSnapshot {
    pub fn started(&self) -> bool {
        self.init_time.is_some()
    }
}

/// Per-job result of a poll batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOutcome {
    pub id: TaskId,
    pub submit_num: u32,
    pub snapshot: JobSnapshot,
}

/// Per-job result of a kill batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillOutcome {
    pub id: TaskId,
    pub submit_num: u32,
    pub ret_code: i32,
}

/// Abstract execution platform: batch submit/poll/kill.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn submit(
        &self,
        platform: &str,
        jobs: &[JobSpec],
    ) -> Result<Vec<SubmitOutcome>, RunnerError>;

    async fn poll(
        &self,
        platform: &str,
        jobs: &[JobRef],
    ) -> Result<Vec<PollOutcome>, RunnerError>;

    async fn kill(
        &self,
        platform: &str,
        jobs: &[JobRef],
    ) -> Result<Vec<KillOutcome>, RunnerError>;
}
