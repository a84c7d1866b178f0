// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job activity log: every runner invocation and event-handler result
//! for one job, appended beside its job script.
//!
//! Line shapes are part of the external contract:
//! `[jobs-submit ret_code] 0`, `[jobs-kill ret_code] 1`,
//! `[(('event-handler-00', 'failed'), 1) out] <body>`.

use std::io::Write as _;
use std::path::{Path, PathBuf};

pub const ACTIVITY_LOG_NAME: &str = "job-activity.log";

/// Appends activity lines under a job log directory.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    job_dir: PathBuf,
}

impl ActivityLog {
    pub fn new(job_dir: impl Into<PathBuf>) -> Self {
        Self { job_dir: job_dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.job_dir.join(ACTIVITY_LOG_NAME)
    }

    /// `[<ctx> ret_code] <code>`
    pub fn ret_code(&self, ctx: &str, code: i32) {
        self.append(&format!("[{ctx} ret_code] {code}"));
    }

    /// `[<ctx> out] <body>` (one line per body line).
    pub fn out(&self, ctx: &str, body: &str) {
        for line in body.lines() {
            self.append(&format!("[{ctx} out] {line}"));
        }
    }

    /// `[<ctx> err] <body>`
    pub fn err(&self, ctx: &str, body: &str) {
        for line in body.lines() {
            self.append(&format!("[{ctx} err] {line}"));
        }
    }

    /// Context string for an event-handler attempt:
    /// `(('event-handler-00', 'failed'), 1)`.
    pub fn handler_ctx(handler: &str, event: &str, attempt: u32) -> String {
        format!("(('{handler}', '{event}'), {attempt})")
    }

    fn append(&self, line: &str) {
        let write = || -> std::io::Result<()> {
            std::fs::create_dir_all(&self.job_dir)?;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path())?;
            writeln!(file, "{line}")?;
            Ok(())
        };
        if let Err(e) = write() {
            tracing::warn!(dir = %self.job_dir.display(), error = %e, "job-activity append failed");
        }
    }
}

/// `NN` symlink maintenance: point `<task dir>/NN` at the latest submit.
pub fn update_latest_symlink(task_dir: &Path, submit_num: u32) -> std::io::Result<()> {
    let link = task_dir.join("NN");
    let target = format!("{submit_num:02}");
    match std::fs::remove_file(&link) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    #[cfg(unix)]
    std::os::unix::fs::symlink(target, &link)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ret_code_and_out_lines() {
        let dir = tempdir().unwrap();
        let log = ActivityLog::new(dir.path().join("01"));
        log.ret_code("jobs-submit", 0);
        log.out("jobs-submit", "submitted ok");
        log.ret_code("jobs-kill", 1);

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "[jobs-submit ret_code] 0",
                "[jobs-submit out] submitted ok",
                "[jobs-kill ret_code] 1",
            ]
        );
    }

    #[test]
    fn handler_ctx_shape() {
        assert_eq!(
            ActivityLog::handler_ctx("event-handler-00", "failed", 1),
            "(('event-handler-00', 'failed'), 1)"
        );
    }

    #[test]
    fn latest_symlink_moves() {
        let dir = tempdir().unwrap();
        update_latest_symlink(dir.path(), 1).unwrap();
        update_latest_symlink(dir.path(), 2).unwrap();
        let target = std::fs::read_link(dir.path().join("NN")).unwrap();
        assert_eq!(target.to_str(), Some("02"));
    }
}
