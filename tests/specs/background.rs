// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Simple linear workflow on the real background platform: `a => b => c`,
//! all succeed. Three proxies, one job record each, pool empty at the end.

use super::prelude::Harness;
use gyre_adapters::BackgroundRunner;
use gyre_core::{CyclePoint, TaskId, TaskStatus};
use std::sync::Arc;

const LINEAR: &str = r#"
    [workflow]
    name = "linear"
    cycling = "integer"
    initial_cycle_point = "1"
    final_cycle_point = "1"

    [runtime.a]
    script = "echo a"
    execution_polling_intervals = "PT1S"
    submission_polling_intervals = "PT1S"
    [runtime.b]
    inherit = ["a"]
    script = "echo b"
    [runtime.c]
    inherit = ["a"]
    script = "echo c"
    [tasks.a]
    [tasks.b]
    [tasks.c]

    [[graph]]
    sequence = { once = "^" }
    edges = [
        { target = "b", triggers = [{ trigger = { task = "a", output = "succeeded" } }] },
        { target = "c", triggers = [{ trigger = { task = "b", output = "succeeded" } }] },
    ]
"#;

#[tokio::test(flavor = "multi_thread")]
async fn linear_chain_on_background_runner() {
    let dir = tempfile::tempdir().unwrap();
    let mut harness = Harness::new(LINEAR, Arc::new(BackgroundRunner::new()), dir.path());
    harness.bootstrap();

    // Jobs run for real; polling (PT1S cadence) discovers their exits.
    harness
        .run_until(600, |runtime, _| runtime.pool.is_empty())
        .await;

    let state = harness.snapshot_state();
    // task_pool is empty on shutdown...
    assert!(state.pool.is_empty());
    // ...and every instance succeeded with exactly one job record.
    for name in ["a", "b", "c"] {
        let id = TaskId::new(name, CyclePoint::Integer(1));
        let row = state.states.get(&id).unwrap_or_else(|| panic!("{name} missing"));
        assert_eq!(row.status, TaskStatus::Succeeded, "{name}");
        assert_eq!(row.submit_num, 1, "{name}");
        let jobs = state.jobs_for(&id);
        assert_eq!(jobs.len(), 1, "{name}");
        assert_eq!(jobs[0].submit_exit, Some(0));
        assert!(jobs[0].is_terminal());
    }

    // Job logs exist on disk with status files and activity logs.
    let job_dir = dir.path().join("log").join("job").join("1").join("a").join("01");
    assert!(job_dir.join("job.status").is_file());
    assert!(job_dir.join("job-activity.log").is_file());
}
