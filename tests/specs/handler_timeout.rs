// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-handler timeout: a handler that outlives `process pool timeout`
//! is killed with SIGKILL and recorded with ret_code -9.

use super::prelude::Harness;
use gyre_adapters::FakeRunner;
use std::sync::Arc;

const HANDLED: &str = r#"
    [workflow]
    name = "handled"
    cycling = "integer"
    initial_cycle_point = "1"
    final_cycle_point = "1"

    [scheduler]
    process_pool_timeout = "PT1S"

    [runtime.foo]
    script = "true"
    submission_polling_intervals = "PT1S"
    handlers = [{ events = ["started"], command = "sleep 30 #" }]
    [tasks.foo]
"#;

#[tokio::test(flavor = "multi_thread")]
async fn overrunning_handler_is_killed_with_sigkill() {
    let dir = tempfile::tempdir().unwrap();
    let mut harness = Harness::new(HANDLED, Arc::new(FakeRunner::new()), dir.path());
    harness.bootstrap();

    let activity = dir
        .path()
        .join("log")
        .join("job")
        .join("1")
        .join("foo")
        .join("01")
        .join("job-activity.log");

    harness
        .run_until(400, |_, _| {
            std::fs::read_to_string(&activity)
                .map(|text| text.contains("ret_code] -9"))
                .unwrap_or(false)
        })
        .await;

    let text = std::fs::read_to_string(&activity).unwrap();
    assert!(
        text.contains("[(('event-handler-00', 'started'), 1) ret_code] -9"),
        "activity log:\n{text}"
    );
}
