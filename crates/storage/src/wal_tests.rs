// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gyre_core::{CyclePoint, TaskId};
use std::io::Write as _;
use tempfile::tempdir;

fn test_event(name: &str) -> Event {
    Event::TaskSpawned {
        id: TaskId::new(name, CyclePoint::Integer(1)),
        is_held: false,
    }
}

#[test]
fn open_creates_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal").join("events.wal");

    let wal = Wal::open(&path, 0).unwrap();

    assert!(path.exists());
    assert_eq!(wal.write_seq(), 0);
    assert_eq!(wal.processed_seq(), 0);
}

#[test]
fn append_and_flush() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal = Wal::open(&path, 0).unwrap();

    let seq1 = wal.append(&test_event("a")).unwrap();
    let seq2 = wal.append(&test_event("b")).unwrap();

    assert_eq!(seq1, 1);
    assert_eq!(seq2, 2);

    wal.flush().unwrap();

    let metadata = std::fs::metadata(&path).unwrap();
    assert!(metadata.len() > 0);
}

#[test]
fn next_unprocessed_in_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&test_event("a")).unwrap();
    wal.append(&test_event("b")).unwrap();

    let entry1 = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry1.seq, 1);
    assert_eq!(entry1.event, test_event("a"));

    let entry2 = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry2.seq, 2);

    assert!(wal.next_unprocessed().unwrap().is_none());
}

#[test]
fn mark_processed_advances() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&test_event("a")).unwrap();
    wal.flush().unwrap();

    let entry = wal.next_unprocessed().unwrap().unwrap();
    wal.mark_processed(entry.seq);
    assert_eq!(wal.processed_seq(), 1);

    // mark_processed never goes backwards.
    wal.mark_processed(0);
    assert_eq!(wal.processed_seq(), 1);
}

#[test]
fn reopen_replays_past_processed_seq() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        for name in ["a", "b", "c"] {
            wal.append(&test_event(name)).unwrap();
        }
        wal.flush().unwrap();
    }

    // Reopen as after a restart whose snapshot covered seq 1.
    let mut wal = Wal::open(&path, 1).unwrap();
    assert_eq!(wal.write_seq(), 3);

    let entry = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry.seq, 2);
    assert_eq!(entry.event, test_event("b"));
    let entry = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry.seq, 3);
    assert!(wal.next_unprocessed().unwrap().is_none());

    // New appends continue the sequence.
    assert_eq!(wal.append(&test_event("d")).unwrap(), 4);
}

#[test]
fn corrupt_trailing_line_is_dropped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&test_event("a")).unwrap();
        wal.flush().unwrap();
    }
    {
        // Simulate a torn write.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"seq\": 2, \"event\": {\"ty").unwrap();
    }

    let mut wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 1);
    let entry = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry.seq, 1);
    assert!(wal.next_unprocessed().unwrap().is_none());
}

#[test]
fn compact_truncates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&test_event("a")).unwrap();
    wal.flush().unwrap();
    assert!(std::fs::metadata(&path).unwrap().len() > 0);

    wal.compact().unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);

    // Sequence numbering continues after compaction.
    assert_eq!(wal.append(&test_event("b")).unwrap(), 2);
}
