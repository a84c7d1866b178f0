// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart via the real persistence surfaces: a half-finished run is
//! snapshotted to disk and resumed by a fresh runtime.

use super::prelude::Harness;
use gyre_adapters::FakeRunner;
use gyre_core::{CyclePoint, TaskId, TaskStatus};
use gyre_storage::{Checkpointer, Snapshot};
use std::sync::Arc;

const TWO_STEP: &str = r#"
    [workflow]
    name = "twostep"
    cycling = "integer"
    initial_cycle_point = "1"
    final_cycle_point = "1"

    [runtime.a]
    script = "true"
    submission_polling_intervals = "PT1S"
    [runtime.b]
    inherit = ["a"]
    [tasks.a]
    [tasks.b]

    [[graph]]
    sequence = { once = "^" }
    edges = [
        { target = "b", triggers = [{ trigger = { task = "a", output = "succeeded" } }] },
    ]
"#;

#[tokio::test(flavor = "multi_thread")]
async fn resumes_from_snapshot_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let a = TaskId::new("a", CyclePoint::Integer(1));
    let b = TaskId::new("b", CyclePoint::Integer(1));

    // First run: stop once `a` has succeeded.
    {
        let mut harness = Harness::new(TWO_STEP, Arc::new(FakeRunner::new()), dir.path());
        harness.bootstrap();
        let a = a.clone();
        harness
            .run_until(300, move |_, state| {
                state
                    .states
                    .get(&a)
                    .map(|row| row.status == TaskStatus::Succeeded)
                    .unwrap_or(false)
            })
            .await;

        let checkpoints = Checkpointer::new(dir.path().join("checkpoints"));
        checkpoints
            .save_latest(&Snapshot::new(harness.snapshot_state(), 0))
            .unwrap();
    }

    // Restart from the snapshot alone.
    let checkpoints = Checkpointer::new(dir.path().join("checkpoints"));
    let snapshot = checkpoints.load_latest().unwrap().unwrap();
    let mut state = snapshot.state;

    let mut restarted = Harness::new(TWO_STEP, Arc::new(FakeRunner::new()), dir.path());
    let repoll = state.vacate_open_jobs();
    let effects = restarted.runtime.restore(&state, &repoll);
    // Fold restore effects the way the loop's zeroth tick would.
    for effect in effects {
        if let Some(event) = restarted.executor.execute(effect) {
            restarted.state.apply_event(&event);
        }
    }
    // Seed the restarted harness's record keeping with the recovered rows.
    restarted.state = state;

    // b still runs to completion (its prerequisite was re-satisfied from
    // the recorded output of a).
    assert!(restarted.runtime.pool.get(&b).unwrap().prereqs_satisfied());
    restarted
        .run_until(300, |runtime, _| runtime.pool.is_empty())
        .await;
    assert_eq!(
        restarted.state.states.get(&b).unwrap().status,
        TaskStatus::Succeeded
    );
}
