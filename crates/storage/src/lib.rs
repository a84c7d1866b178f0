// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gyre-storage: durable state for one workflow run.
//!
//! Two persistence surfaces: an append-only WAL of [`gyre_core::Event`]
//! records, and a zstd-compressed snapshot of the materialized state for
//! restart and checkpoints. The contact file advertises the live scheduler
//! to clients.

mod checkpoint;
mod contact;
mod snapshot;
mod state;
mod wal;

pub use checkpoint::{Checkpointer, LATEST_CHECKPOINT_ID};
pub use contact::{ContactError, ContactInfo, CONTACT_KEYS};
pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::{
    BroadcastRow, CheckpointRow, MaterializedState, TaskEventRow, TaskPoolRow, TaskStateRow,
    PARAM_DEF_HASH, PARAM_HOLD_POINT, PARAM_PAUSED, PARAM_UUID, PARAM_VERBOSITY,
};
pub use wal::{Wal, WalEntry, WalError};
