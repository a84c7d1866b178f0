// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only write-ahead log of events.
//!
//! One JSON record per line: `{"seq": N, "event": {...}}`. Sequence numbers
//! are monotone from 1. Events are appended before they are applied; on
//! reopen, entries past the snapshot's processed sequence are replayed.

use gyre_core::Event;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("wal io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wal serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One durable record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

/// The append-only event log.
#[derive(Debug)]
pub struct Wal {
    path: PathBuf,
    writer: BufWriter<File>,
    write_seq: u64,
    processed_seq: u64,
    /// Entries appended (or recovered) but not yet applied to state.
    unprocessed: VecDeque<WalEntry>,
}

impl Wal {
    /// Open (or create) the log. Entries with `seq > processed_seq` are
    /// queued for replay; corrupt trailing lines are dropped with a
    /// warning, recovering from a torn write on crash.
    pub fn open(path: impl AsRef<Path>, processed_seq: u64) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut write_seq = processed_seq;
        let mut unprocessed = VecDeque::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (lineno, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<WalEntry>(&line) {
                    Ok(entry) => {
                        write_seq = write_seq.max(entry.seq);
                        if entry.seq > processed_seq {
                            unprocessed.push_back(entry);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            line = lineno + 1,
                            error = %e,
                            "dropping corrupt wal line"
                        );
                    }
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            write_seq,
            processed_seq,
            unprocessed,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    /// Append an event; returns its sequence number. The entry is also
    /// queued for processing.
    pub fn append(&mut self, event: &Event) -> Result<u64, WalError> {
        self.write_seq += 1;
        let entry = WalEntry { seq: self.write_seq, event: event.clone() };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.unprocessed.push_back(entry);
        Ok(self.write_seq)
    }

    /// Flush buffered appends to disk. Called once per scheduler tick so
    /// all of a tick's mutations land together.
    pub fn flush(&mut self) -> Result<(), WalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Next entry awaiting application, in sequence order.
    pub fn next_unprocessed(&mut self) -> Result<Option<WalEntry>, WalError> {
        Ok(self.unprocessed.pop_front())
    }

    /// Record that every entry up to `seq` has been applied.
    pub fn mark_processed(&mut self, seq: u64) {
        self.processed_seq = self.processed_seq.max(seq);
    }

    /// Truncate the log after a snapshot has captured everything.
    pub fn compact(&mut self) -> Result<(), WalError> {
        self.writer.flush()?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.writer = BufWriter::new(file);
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
