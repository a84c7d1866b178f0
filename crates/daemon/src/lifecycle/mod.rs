// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

mod startup;

pub use startup::{startup, StartupResult};

use crate::config::Config;
use gyre_core::SystemClock;
use gyre_engine::Runtime;
use gyre_storage::{ContactError, ContactInfo, MaterializedState, SnapshotError, Wal, WalError};
use parking_lot::Mutex;
use std::fs::File;
use std::sync::Arc;
use thiserror::Error;

/// Scheduler runtime with the real clock.
pub type SchedulerRuntime = Runtime<SystemClock>;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("another scheduler is already running this workflow (pid {pid})")]
    AlreadyRunning { pid: u32 },
    #[error("stale contact file failed its health check; remove {0} to force")]
    StaleContact(String),
    #[error(transparent)]
    Contact(#[from] ContactError),
    #[error("definition error: {0}")]
    Definition(#[from] gyre_def::DefError),
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Live daemon state handed to the engine loop.
#[derive(Debug)]
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): held to maintain the exclusive run lock; released on drop
    #[allow(dead_code)]
    pub(crate) lock_file: File,
    pub contact: ContactInfo,
    pub runtime: SchedulerRuntime,
    pub state: Arc<Mutex<MaterializedState>>,
    pub wal: Wal,
    /// True when this start is a restart from persisted state.
    pub restarted: bool,
}

/// Remove the contact file on clean shutdown.
pub fn remove_contact(config: &Config) {
    if let Err(e) = ContactInfo::remove(&config.contact_path) {
        tracing::warn!(error = %e, "could not remove contact file");
    }
}
