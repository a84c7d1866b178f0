// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cycling with retry: `foo` fails once then succeeds, leaving two job
//! records with submit numbers 1 and 2.

use super::prelude::Harness;
use gyre_adapters::FakeRunner;
use gyre_core::task::ExitClass;
use gyre_core::{CyclePoint, TaskId, TaskStatus};
use std::sync::Arc;

const RETRY: &str = r#"
    [workflow]
    name = "retrying"
    cycling = "integer"
    initial_cycle_point = "1"
    final_cycle_point = "1"

    [runtime.foo]
    script = "flaky"
    execution_retry_delays = "PT1S"
    submission_polling_intervals = "PT1S"
    [tasks.foo]
"#;

#[tokio::test(flavor = "multi_thread")]
async fn fails_once_then_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(FakeRunner::new());
    runner.fail_once("foo");

    let mut harness = Harness::new(RETRY, Arc::clone(&runner), dir.path());
    harness.bootstrap();

    let id = TaskId::new("foo", CyclePoint::Integer(1));
    harness
        .run_until(400, |runtime, _| {
            runtime
                .pool
                .get(&id)
                .map(|p| p.status == TaskStatus::Succeeded)
                .unwrap_or(true)
        })
        .await;

    let state = harness.snapshot_state();
    let jobs = state.jobs_for(&id);
    assert_eq!(jobs.len(), 2, "one failure, one success");
    assert_eq!(jobs[0].submit_num, 1);
    assert_eq!(jobs[0].run_exit, Some(ExitClass::Err));
    assert_eq!(jobs[1].submit_num, 2);
    assert_eq!(jobs[1].run_exit, Some(ExitClass::Succeeded));
    assert_eq!(state.states.get(&id).unwrap().status, TaskStatus::Succeeded);
}
