// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State snapshots: zstd-compressed JSON with an explicit version.
//!
//! A snapshot plus the WAL tail past `wal_seq` reconstructs the full
//! materialized state. Saves are atomic (tmp file + rename) so a crash
//! mid-save leaves the previous snapshot intact.

use crate::state::MaterializedState;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported snapshot version {0} (current {CURRENT_SNAPSHOT_VERSION})")]
    Version(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Highest WAL sequence folded into `state`.
    pub wal_seq: u64,
    pub taken_at: String,
    pub state: MaterializedState,
}

impl Snapshot {
    pub fn new(state: MaterializedState, wal_seq: u64) -> Self {
        Self {
            version: CURRENT_SNAPSHOT_VERSION,
            wal_seq,
            taken_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            state,
        }
    }

    /// Write atomically to `path`.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        {
            let file = File::create(&tmp)?;
            let mut encoder = zstd::Encoder::new(BufWriter::new(file), 0)?.auto_finish();
            serde_json::to_writer(&mut encoder, self)?;
            encoder.flush()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load and version-check a snapshot.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let file = File::open(path)?;
        let decoder = zstd::Decoder::new(BufReader::new(file))?;
        let snapshot: Snapshot = serde_json::from_reader(decoder)?;
        if snapshot.version != CURRENT_SNAPSHOT_VERSION {
            return Err(SnapshotError::Version(snapshot.version));
        }
        Ok(snapshot)
    }
}
