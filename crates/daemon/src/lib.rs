// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gyre scheduler daemon library.
//!
//! This module exposes the IPC protocol types for use by CLI clients.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod engine_loop;
pub mod lifecycle;
pub mod listener;
pub mod logging;
pub mod protocol;

pub use config::Config;
pub use lifecycle::{startup, DaemonState, LifecycleError, StartupResult};
pub use protocol::{
    CheckpointEntry, Query, Request, Response, ShowDetail, StatusInfo, TaskEntry,
};
