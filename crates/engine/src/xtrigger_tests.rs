// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gyre_core::test_support::{dt_point, task_id};
use gyre_core::{Event, FakeClock, TaskId};
use gyre_def::parse_str;
use gyre_storage::{MaterializedState, Snapshot};

fn args(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn wall_clock_fires_at_point_plus_offset() {
    let clock = FakeClock::new();
    clock.set_utc(dt_point("2010-01-01").as_datetime().unwrap());
    let trigger = WallClock { clock: clock.clone() };

    let bound = args(&[("offset", "PT1H"), ("point", "20100101T0000Z")]);
    assert!(!trigger.call(&bound).0);

    clock.advance(std::time::Duration::from_secs(3600));
    assert!(trigger.call(&bound).0);
}

#[test]
fn wall_clock_ignores_integer_points() {
    let trigger = WallClock { clock: FakeClock::new() };
    assert!(!trigger.call(&args(&[("point", "5")])).0);
}

#[test]
fn xrandom_is_deterministic_per_signature() {
    let trigger = XRandom;
    let bound = args(&[("probability", "50"), ("point", "1")]);
    let first = trigger.call(&bound).0;
    for _ in 0..5 {
        assert_eq!(trigger.call(&bound).0, first);
    }
    // Degenerate probabilities are exact.
    assert!(trigger.call(&args(&[("probability", "100")])).0);
    assert!(!trigger.call(&args(&[("probability", "0")])).0);
}

#[test]
fn workflow_state_reads_other_run_dir() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoints = dir.path().join("other").join(".service").join("checkpoints");

    let mut state = MaterializedState::default();
    state.apply_event(&Event::TaskSpawned { id: task_id("foo", 3), is_held: false });
    state.apply_event(&Event::TaskStatusChanged {
        id: task_id("foo", 3),
        status: gyre_core::TaskStatus::Succeeded,
        time: "t".into(),
    });
    Checkpointer::new(&checkpoints)
        .save_latest(&Snapshot::new(state, 1))
        .unwrap();

    let trigger = WorkflowState { run_root: dir.path().to_path_buf() };
    let bound = args(&[("workflow", "other"), ("task", "foo"), ("point", "3")]);
    let (satisfied, results) = trigger.call(&bound);
    assert!(satisfied);
    assert_eq!(results["status"], "succeeded");

    // Wrong status wanted: unsatisfied.
    let bound = args(&[
        ("workflow", "other"),
        ("task", "foo"),
        ("point", "3"),
        ("status", "failed"),
    ]);
    assert!(!trigger.call(&bound).0);
}

fn xt_def() -> gyre_def::WorkflowDef {
    parse_str(
        r#"
        [workflow]
        name = "xt"
        cycling = "integer"
        initial_cycle_point = "1"

        [xtriggers.gate]
        function = "faker"
        args = { name = "bob" }

        [xtriggers.clock]
        function = "wall_clock"
        args = { point = "%(point)s" }

        [runtime.foo]
        script = "true"
        xtriggers = ["gate", "clock"]
        [tasks.foo]
        sequences = [{ start = "^", stride = "P1" }]
    "#,
    )
    .unwrap()
}

fn proxy_with_xtriggers(def: &gyre_def::WorkflowDef, point: i64) -> gyre_core::TaskProxy {
    let id = TaskId::new("foo", gyre_core::CyclePoint::Integer(point));
    let mut proxy = gyre_core::TaskProxy::new(id, Vec::new(), Default::default());
    for label in &def.task("foo").unwrap().xtriggers {
        proxy.xtriggers.insert(label.clone(), false);
    }
    proxy
}

#[test]
fn due_effects_skips_cached_and_in_flight() {
    let def = xt_def();
    let mut engine = XtriggerEngine::new();
    let proxy = proxy_with_xtriggers(&def, 1);

    let effects = engine.due_effects(&def, &proxy);
    assert_eq!(effects.len(), 2);

    // Same tick again: both are in flight now.
    assert!(engine.due_effects(&def, &proxy).is_empty());

    // One returns unsatisfied: eligible again next tick.
    engine.call_returned("faker(name=bob)");
    let effects = engine.due_effects(&def, &proxy);
    assert_eq!(effects.len(), 1);

    // Satisfied and cached: never called again.
    engine.record_satisfied("faker(name=bob)", serde_json::json!({"NAME": "bob"}));
    assert!(engine.due_effects(&def, &proxy).is_empty());
}

#[test]
fn non_point_specific_signature_is_shared_across_points() {
    let def = xt_def();
    let mut engine = XtriggerEngine::new();
    engine.record_satisfied("faker(name=bob)", serde_json::json!({}));

    // Point 2 resolves to the same signature for `gate`, so only the
    // point-specific clock trigger is due.
    let proxy = proxy_with_xtriggers(&def, 2);
    let effects = engine.due_effects(&def, &proxy);
    assert_eq!(effects.len(), 1);
    match &effects[0] {
        gyre_core::Effect::CallXtrigger { function, signature, .. } => {
            assert_eq!(function, "wall_clock");
            assert_eq!(signature, "wall_clock(point=2)");
        }
        other => panic!("unexpected effect {other:?}"),
    }
}

#[test]
fn restore_cache_survives_restart() {
    let mut engine = XtriggerEngine::new();
    engine.restore_cache(vec![(
        "faker(name=bob)".to_string(),
        serde_json::json!({"NAME": "bob"}),
    )]);
    assert_eq!(
        engine.cached("faker(name=bob)").and_then(|v| v["NAME"].as_str()),
        Some("bob")
    );
}
