// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for scheduler communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

mod request;
mod response;
mod wire;

pub use request::{Query, Request};
pub use response::{CheckpointEntry, Response, ShowDetail, StatusInfo, TaskEntry};
pub use wire::{decode, encode, read_message, write_message, ProtocolError};

#[cfg(test)]
mod property_tests;
