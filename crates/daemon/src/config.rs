// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run-directory layout for one workflow.
//!
//! ```text
//! <run-dir>/<workflow>/
//!   .service/{contact, source, lock, socket, checkpoints/}
//!   flow.toml                    (the installed definition)
//!   log/scheduler/log            (append-only scheduler log)
//!   log/wal/events.wal           (the event log)
//!   log/job/<cycle>/<task>/<NN>/ (per-job logs; NN symlinks latest)
//!   share/                       (workflow-scoped scratch)
//!   work/<cycle>/<task>/         (per-job working directory)
//! ```

use std::path::{Path, PathBuf};

/// Paths for one workflow run directory.
#[derive(Debug, Clone)]
pub struct Config {
    /// The workflow's own run dir: `<run-root>/<workflow>`.
    pub run_dir: PathBuf,
    /// Root holding all workflow run dirs.
    pub run_root: PathBuf,
    pub contact_path: PathBuf,
    pub source_path: PathBuf,
    pub lock_path: PathBuf,
    pub socket_path: PathBuf,
    pub checkpoints_dir: PathBuf,
    pub flow_path: PathBuf,
    pub scheduler_log_dir: PathBuf,
    pub wal_path: PathBuf,
    pub job_log_root: PathBuf,
    pub share_dir: PathBuf,
    pub work_dir: PathBuf,
}

impl Config {
    pub fn from_run_dir(run_dir: &Path) -> Self {
        let service = run_dir.join(".service");
        let log = run_dir.join("log");
        Self {
            run_dir: run_dir.to_path_buf(),
            run_root: run_dir.parent().unwrap_or(run_dir).to_path_buf(),
            contact_path: service.join("contact"),
            source_path: service.join("source"),
            lock_path: service.join("lock"),
            socket_path: service.join("socket"),
            checkpoints_dir: service.join("checkpoints"),
            flow_path: run_dir.join("flow.toml"),
            scheduler_log_dir: log.join("scheduler"),
            wal_path: log.join("wal").join("events.wal"),
            job_log_root: log.join("job"),
            share_dir: run_dir.join("share"),
            work_dir: run_dir.join("work"),
        }
    }

    /// Create the run-dir skeleton.
    pub fn create_dirs(&self) -> std::io::Result<()> {
        for dir in [
            self.run_dir.as_path(),
            self.contact_path.parent().unwrap_or(&self.run_dir),
            self.checkpoints_dir.as_path(),
            self.scheduler_log_dir.as_path(),
            self.wal_path.parent().unwrap_or(&self.run_dir),
            self.job_log_root.as_path(),
            self.share_dir.as_path(),
            self.work_dir.as_path(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_contract() {
        let config = Config::from_run_dir(Path::new("/runs/demo"));
        assert_eq!(config.contact_path, Path::new("/runs/demo/.service/contact"));
        assert_eq!(config.scheduler_log_dir, Path::new("/runs/demo/log/scheduler"));
        assert_eq!(config.job_log_root, Path::new("/runs/demo/log/job"));
        assert_eq!(config.work_dir, Path::new("/runs/demo/work"));
        assert_eq!(config.run_root, Path::new("/runs"));
    }

    #[test]
    fn create_dirs_builds_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_run_dir(&dir.path().join("demo"));
        config.create_dirs().unwrap();
        assert!(config.checkpoints_dir.is_dir());
        assert!(config.share_dir.is_dir());
        assert!(config.scheduler_log_dir.is_dir());
    }
}
