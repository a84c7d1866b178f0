// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The built-in local execution platform: jobs run as detached background
//! processes, their status files are the source of truth on poll, and
//! kill is a SIGTERM to the recorded pid.

use crate::activity::ActivityLog;
use crate::runner::{
    JobRunner, KillOutcome, PollOutcome, RunnerError, SubmitOutcome,
};
use crate::status_file::StatusFile;
use async_trait::async_trait;
use gyre_core::effect::{JobRef, JobSpec};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use tokio::process::Command;

pub const JOB_SCRIPT_NAME: &str = "job";
pub const JOB_OUT_NAME: &str = "job.out";
pub const JOB_ERR_NAME: &str = "job.err";

/// Local background runner.
#[derive(Debug, Clone, Default)]
pub struct BackgroundRunner;

impl BackgroundRunner {
    pub fn new() -> Self {
        Self
    }

    fn submit_one(&self, job: &JobSpec) -> std::io::Result<SubmitOutcome> {
        std::fs::create_dir_all(&job.job_dir)?;
        let script_path = job.job_dir.join(JOB_SCRIPT_NAME);
        std::fs::write(&script_path, &job.script)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))?;
        }

        let stdout = std::fs::File::create(job.job_dir.join(JOB_OUT_NAME))?;
        let stderr = std::fs::File::create(job.job_dir.join(JOB_ERR_NAME))?;
        let child = Command::new("bash")
            .arg(&script_path)
            .current_dir(&job.job_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            // Own process group so a kill reaches the whole job tree
            // without touching the scheduler.
            .process_group(0)
            .kill_on_drop(false)
            .spawn()?;

        let pid = child.id().map(|p| p.to_string());
        let log = ActivityLog::new(&job.job_dir);
        log.ret_code("jobs-submit", 0);
        if let Some(pid) = &pid {
            log.out("jobs-submit", &format!("submitted pid={pid}"));
        }

        Ok(SubmitOutcome {
            id: job.id.clone(),
            submit_num: job.submit_num,
            ret_code: 0,
            runner_job_id: pid,
        })
    }
}

#[async_trait]
impl JobRunner for BackgroundRunner {
    async fn submit(
        &self,
        _platform: &str,
        jobs: &[JobSpec],
    ) -> Result<Vec<SubmitOutcome>, RunnerError> {
        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            match self.submit_one(job) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::warn!(job = %job.id.job(job.submit_num), error = %e, "jobs-submit failed");
                    ActivityLog::new(&job.job_dir).ret_code("jobs-submit", 1);
                    outcomes.push(SubmitOutcome {
                        id: job.id.clone(),
                        submit_num: job.submit_num,
                        ret_code: 1,
                        runner_job_id: None,
                    });
                }
            }
        }
        Ok(outcomes)
    }

    async fn poll(
        &self,
        _platform: &str,
        jobs: &[JobRef],
    ) -> Result<Vec<PollOutcome>, RunnerError> {
        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            let snapshot = StatusFile::read(&job.job_dir)?;
            outcomes.push(PollOutcome {
                id: job.id.clone(),
                submit_num: job.submit_num,
                snapshot,
            });
        }
        Ok(outcomes)
    }

    async fn kill(
        &self,
        _platform: &str,
        jobs: &[JobRef],
    ) -> Result<Vec<KillOutcome>, RunnerError> {
        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            let pid = job
                .runner_job_id
                .as_deref()
                .and_then(|p| p.parse::<i32>().ok());
            // Negative pid: signal the job's whole process group.
            let ret_code = match pid {
                Some(pid) if kill(Pid::from_raw(-pid), Signal::SIGTERM).is_ok() => 0,
                _ => 1,
            };
            ActivityLog::new(&job.job_dir).ret_code("jobs-kill", ret_code);
            outcomes.push(KillOutcome {
                id: job.id.clone(),
                submit_num: job.submit_num,
                ret_code,
            });
        }
        Ok(outcomes)
    }
}
