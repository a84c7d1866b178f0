// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named checkpoints: snapshot copies under a checkpoint directory.
//!
//! Id 0 is reserved for "latest", written every compaction cycle; explicit
//! checkpoints (pre-reload, pre-shutdown, operator-requested) take the
//! next free id. `ls-checkpoints` lists ids with their recorded event.

use crate::snapshot::{Snapshot, SnapshotError};
use std::path::{Path, PathBuf};

pub const LATEST_CHECKPOINT_ID: u32 = 0;

/// Writes and reads checkpoint snapshots in one directory.
pub struct Checkpointer {
    dir: PathBuf,
}

impl Checkpointer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, id: u32) -> PathBuf {
        self.dir.join(format!("{id}.snap"))
    }

    /// Write the rolling "latest" checkpoint.
    pub fn save_latest(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        self.write(LATEST_CHECKPOINT_ID, snapshot)
    }

    pub fn write(&self, id: u32, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        snapshot.save(&self.path_for(id))
    }

    pub fn read(&self, id: u32) -> Result<Snapshot, SnapshotError> {
        Snapshot::load(&self.path_for(id))
    }

    /// The latest checkpoint, if one has been written.
    pub fn load_latest(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let path = self.path_for(LATEST_CHECKPOINT_ID);
        if !path.exists() {
            return Ok(None);
        }
        Snapshot::load(&path).map(Some)
    }

    /// Ids present on disk, ascending.
    pub fn list_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = std::fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|entry| parse_id(&entry.path()))
            .collect();
        ids.sort_unstable();
        ids
    }
}

fn parse_id(path: &Path) -> Option<u32> {
    if path.extension()? != "snap" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}
