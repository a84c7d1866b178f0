// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job status file: `KEY=VALUE` lines next to the job script.
//!
//! Written incrementally by the job itself; the source of truth on poll.
//! Key order as produced by the job: `CYLC_JOB_PID`, `CYLC_BATCH_SYS_NAME`,
//! `CYLC_BATCH_SYS_JOB_ID`, `CYLC_JOB_INIT_TIME`, then on exit
//! `CYLC_JOB_EXIT`, `CYLC_JOB_EXIT_TIME`.

use crate::runner::JobSnapshot;
use gyre_core::task::ExitClass;
use std::path::Path;

pub const STATUS_FILE_NAME: &str = "job.status";

/// Reader/parser for one job's status file.
pub struct StatusFile;

impl StatusFile {
    /// Parse status-file text into a snapshot. Unknown keys are ignored;
    /// an unparseable `CYLC_JOB_EXIT` value is dropped (a poll must only
    /// act on affirmative results).
    pub fn parse(text: &str) -> JobSnapshot {
        let mut snapshot = JobSnapshot::default();
        let mut exit_class: Option<ExitClass> = None;
        let mut exit_time: Option<String> = None;
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key {
                "CYLC_JOB_PID" => snapshot.pid = Some(value.to_string()),
                "CYLC_BATCH_SYS_JOB_ID" => {
                    snapshot.runner_job_id = Some(value.to_string())
                }
                "CYLC_JOB_INIT_TIME" => snapshot.init_time = Some(value.to_string()),
                "CYLC_JOB_EXIT" => exit_class = ExitClass::parse(value),
                "CYLC_JOB_EXIT_TIME" => exit_time = Some(value.to_string()),
                _ => {}
            }
        }
        if let Some(class) = exit_class {
            snapshot.exit = Some((class, exit_time.unwrap_or_default()));
        }
        snapshot
    }

    /// Read and parse the status file in a job directory. A missing file
    /// yields an empty snapshot: the job has not initialized yet.
    pub fn read(job_dir: &Path) -> std::io::Result<JobSnapshot> {
        let path = job_dir.join(STATUS_FILE_NAME);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(JobSnapshot::default())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_running_job() {
        let text = "CYLC_JOB_PID=4242\n\
                    CYLC_BATCH_SYS_NAME=background\n\
                    CYLC_BATCH_SYS_JOB_ID=4242\n\
                    CYLC_JOB_INIT_TIME=2010-01-01T00:00:05Z\n";
        let snap = StatusFile::parse(text);
        assert_eq!(snap.pid.as_deref(), Some("4242"));
        assert_eq!(snap.runner_job_id.as_deref(), Some("4242"));
        assert!(snap.started());
        assert!(snap.exit.is_none());
    }

    #[test]
    fn parses_exited_job() {
        let text = "CYLC_JOB_PID=1\n\
                    CYLC_JOB_INIT_TIME=t1\n\
                    CYLC_JOB_EXIT=ERR\n\
                    CYLC_JOB_EXIT_TIME=t2\n";
        let snap = StatusFile::parse(text);
        assert_eq!(snap.exit, Some((ExitClass::Err, "t2".to_string())));
    }

    #[test]
    fn parses_vacated_job() {
        let snap = StatusFile::parse("CYLC_JOB_EXIT=vacated/USR1\nCYLC_JOB_EXIT_TIME=t\n");
        assert_eq!(snap.exit, Some((ExitClass::Vacated, "t".to_string())));
    }

    #[test]
    fn unrecognized_exit_value_is_ignored() {
        let snap = StatusFile::parse("CYLC_JOB_EXIT=BANANA\nCYLC_JOB_EXIT_TIME=t\n");
        assert!(snap.exit.is_none());
    }

    #[test]
    fn missing_file_is_an_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let snap = StatusFile::read(dir.path()).unwrap();
        assert_eq!(snap, JobSnapshot::default());
    }
}
