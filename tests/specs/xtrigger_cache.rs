// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart across an xtrigger: a non-cycle-point trigger satisfied before
//! the restart is not called again, and its results still reach dependent
//! job environments via broadcast.

use super::prelude::Harness;
use gyre_adapters::{FakeRunner, ScriptedOutcome};
use gyre_core::task::ExitClass;
use gyre_core::{CyclePoint, TaskId, TaskStatus};
use gyre_engine::XtriggerCall;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const XT: &str = r#"
    [workflow]
    name = "fakery"
    cycling = "date_time"
    initial_cycle_point = "2010"
    final_cycle_point = "2011"

    [xtriggers.faker]
    function = "faker"
    args = { name = "bob" }

    [runtime.foo]
    script = "true"
    xtriggers = ["faker"]
    submission_polling_intervals = "PT1S"
    [tasks.foo]
    sequences = [{ start = "^", stride = "P1Y" }]
"#;

/// Counts invocations so the at-most-once property is observable.
struct Faker {
    calls: Arc<AtomicUsize>,
}

impl XtriggerCall for Faker {
    fn call(&self, _args: &IndexMap<String, String>) -> (bool, serde_json::Value) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (true, serde_json::json!({"NAME": "bob"}))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn satisfied_xtrigger_survives_restart_uncalled() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    // First run: 2010 succeeds, 2011 is still running when we "stop".
    let runner = Arc::new(FakeRunner::new());
    runner.script("foo", ScriptedOutcome::Exit(ExitClass::Succeeded));
    runner.script("foo", ScriptedOutcome::RunForever);

    let faker_calls = Arc::clone(&calls);
    let mut harness = Harness::new_with(XT, Arc::clone(&runner), dir.path(), move |rt| {
        rt.xtriggers.register("faker", Arc::new(Faker { calls: faker_calls }));
    });
    harness.bootstrap();

    let p2010 = TaskId::new("foo", CyclePoint::parse_any("2010").unwrap());
    let p2011 = TaskId::new("foo", CyclePoint::parse_any("2011").unwrap());
    harness
        .run_until(300, |runtime, _| {
            let done_2010 = runtime
                .pool
                .get(&p2010)
                .map(|p| p.status == TaskStatus::Succeeded)
                .unwrap_or(true);
            let running_2011 = runtime
                .pool
                .get(&p2011)
                .map(|p| p.status == TaskStatus::Running)
                .unwrap_or(false);
            done_2010 && running_2011
        })
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1, "one call satisfies both points");

    let mut state = harness.snapshot_state();
    assert!(state.xtriggers.contains_key("faker(name=bob)"));

    // Restart: a fresh runtime restored from the persisted state.
    let faker_calls = Arc::clone(&calls);
    let mut restarted =
        Harness::new_with(XT, Arc::new(FakeRunner::new()), dir.path(), move |rt| {
            rt.xtriggers.register("faker", Arc::new(Faker { calls: faker_calls }));
        });
    let repoll = state.vacate_open_jobs();
    assert_eq!(repoll, vec![p2011.clone()]);
    restarted.runtime.restore(&state, &repoll);

    // 2011/foo is back, its faker label pre-satisfied from the cache.
    let proxy = restarted.runtime.pool.get(&p2011).unwrap();
    assert_eq!(proxy.status, TaskStatus::Running);
    assert!(proxy.xtriggers_satisfied());

    // A few ticks of normal running never call the function again.
    restarted.ticks(5).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1, "faker must not be called again");

    // The cached results flow into the dependent job environment.
    let def = restarted.runtime.def();
    let runtime_for = restarted
        .runtime
        .jobs
        .effective_runtime(&def, &restarted.runtime.broadcasts, &p2011)
        .unwrap();
    assert_eq!(runtime_for.environment.get("NAME").map(String::as_str), Some("bob"));
}
