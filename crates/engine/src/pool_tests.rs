// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gyre_core::outputs::OUTPUT_SUCCEEDED;
use gyre_core::test_support::task_id;
use gyre_def::parse_str;

fn cycling_def() -> WorkflowDef {
    parse_str(
        r#"
        [workflow]
        name = "pool"
        cycling = "integer"
        initial_cycle_point = "1"

        [scheduler]
        runahead_limit = "P1"

        [runtime.foo]
        script = "true"
        [tasks.foo]
        sequences = [{ start = "^", stride = "P1" }]

        [[graph]]
        sequence = { start = "^", stride = "P1" }
        edges = [
            { target = "foo", triggers = [{ trigger = { task = "foo", output = "succeeded", offset = "-P1" } }] },
        ]
    "#,
    )
    .unwrap()
}

#[test]
fn spawn_is_idempotent() {
    let def = cycling_def();
    let mut pool = TaskPool::new();
    let id = task_id("foo", 1);

    let event = pool.spawn(&def, id.clone());
    assert!(matches!(event, Some(Event::TaskSpawned { .. })));

    // Mutate, then respawn: state must survive.
    pool.get_mut(&id).unwrap().force_status(TaskStatus::Running);
    assert!(pool.spawn(&def, id.clone()).is_none());
    assert_eq!(pool.get(&id).unwrap().status, TaskStatus::Running);
    assert_eq!(pool.len(), 1);
}

#[test]
fn spawn_off_sequence_is_refused() {
    let def = cycling_def();
    let mut pool = TaskPool::new();
    assert!(pool.spawn(&def, task_id("foo", 0)).is_none());
    assert!(pool.spawn(&def, task_id("ghost", 1)).is_none());
}

#[test]
fn runahead_bound_tracks_oldest_active() {
    let def = cycling_def();
    let mut pool = TaskPool::new();
    pool.spawn(&def, task_id("foo", 1));
    pool.spawn(&def, task_id("foo", 2));

    // Oldest active is 1; limit P1 -> bound 2.
    assert_eq!(pool.runahead_bound(&def), Some(gyre_core::CyclePoint::Integer(2)));
    assert!(pool.within_runahead(&def, &gyre_core::CyclePoint::Integer(2)));
    assert!(!pool.within_runahead(&def, &gyre_core::CyclePoint::Integer(3)));

    // 1/foo done: the bound advances.
    pool.get_mut(&task_id("foo", 1)).unwrap().force_status(TaskStatus::Succeeded);
    assert_eq!(pool.runahead_bound(&def), Some(gyre_core::CyclePoint::Integer(3)));
}

#[test]
fn hold_after_point_holds_current_and_future() {
    let def = cycling_def();
    let mut pool = TaskPool::new();
    pool.spawn(&def, task_id("foo", 1));
    pool.spawn(&def, task_id("foo", 2));

    let events = pool.hold_after(gyre_core::CyclePoint::Integer(1));
    // Hold-point event plus one hold for 2/foo.
    assert_eq!(events.len(), 2);
    assert!(!pool.get(&task_id("foo", 1)).unwrap().is_held);
    assert!(pool.get(&task_id("foo", 2)).unwrap().is_held);

    // Newly-spawned proxies past the point are held at spawn time.
    if let Some(Event::TaskSpawned { is_held, .. }) = pool.spawn(&def, task_id("foo", 3)) {
        assert!(is_held);
    } else {
        panic!("expected spawn event");
    }
}

#[test]
fn release_clears_flag_without_running() {
    let def = cycling_def();
    let mut pool = TaskPool::new();
    pool.spawn(&def, task_id("foo", 1));
    pool.hold(&[task_id("foo", 1)]);
    assert!(pool.get(&task_id("foo", 1)).unwrap().is_held);

    let events = pool.release(&[task_id("foo", 1)], false);
    assert_eq!(events.len(), 1);
    let proxy = pool.get(&task_id("foo", 1)).unwrap();
    assert!(!proxy.is_held);
    // Still waiting; a later step decides whether it runs.
    assert_eq!(proxy.status, TaskStatus::Waiting);
}

#[test]
fn satisfy_output_flips_matching_atoms() {
    let def = cycling_def();
    let mut pool = TaskPool::new();
    pool.spawn(&def, task_id("foo", 1));
    pool.spawn(&def, task_id("foo", 2));

    // 2/foo waits on 1/foo:succeeded.
    assert!(!pool.get(&task_id("foo", 2)).unwrap().prereqs_satisfied());
    let changed = pool.satisfy_output(&task_id("foo", 1), OUTPUT_SUCCEEDED);
    assert_eq!(changed, vec![task_id("foo", 2)]);
    assert!(pool.get(&task_id("foo", 2)).unwrap().prereqs_satisfied());

    // 1/foo's own prerequisite on 0/foo was vacuously satisfied at spawn.
    assert!(pool.get(&task_id("foo", 1)).unwrap().prereqs_satisfied());
}

#[test]
fn removable_respects_hold() {
    let def = cycling_def();
    let mut pool = TaskPool::new();
    pool.spawn(&def, task_id("foo", 1));
    {
        let proxy = pool.get_mut(&task_id("foo", 1)).unwrap();
        proxy.force_status(TaskStatus::Succeeded);
        proxy.outputs.complete(OUTPUT_SUCCEEDED);
        proxy.children_spawned = true;
        proxy.is_held = true;
    }
    // Held and complete: retained until released.
    assert!(pool.removable().is_empty());

    pool.release(&[task_id("foo", 1)], false);
    assert_eq!(pool.removable(), vec![task_id("foo", 1)]);
}

#[test]
fn stuck_reports_incomplete_terminal_proxies() {
    let def = cycling_def();
    let mut pool = TaskPool::new();
    pool.spawn(&def, task_id("foo", 1));
    pool.get_mut(&task_id("foo", 1)).unwrap().force_status(TaskStatus::Failed);
    assert_eq!(pool.stuck(), vec![task_id("foo", 1)]);
}

#[test]
fn stall_detection() {
    let def = cycling_def();
    let mut pool = TaskPool::new();
    assert!(!pool.is_stalled(false), "empty pool never stalls");

    pool.spawn(&def, task_id("foo", 2));
    // 2/foo waits on 1/foo which is not in the pool: nothing can progress.
    assert!(pool.is_stalled(false));

    // A pending retry timer counts as progress.
    assert!(!pool.is_stalled(true));

    // A runnable proxy clears the stall.
    pool.spawn(&def, task_id("foo", 1));
    assert!(!pool.is_stalled(false));
}

#[test]
fn stall_ignores_xtrigger_waiters() {
    let def = cycling_def();
    let mut pool = TaskPool::new();
    pool.spawn(&def, task_id("foo", 1));
    let proxy = pool.get_mut(&task_id("foo", 1)).unwrap();
    proxy.xtriggers.insert("clock_0".to_string(), false);
    // Waiting on an xtrigger that may still fire: not a stall.
    assert!(!pool.is_stalled(false));
}

#[test]
fn ordered_ids_sorts_point_depth_name() {
    let def = parse_str(
        r#"
        [workflow]
        name = "order"
        cycling = "integer"
        initial_cycle_point = "1"

        [runtime.a]
        script = "true"
        [runtime.b]
        script = "true"
        [runtime.z]
        script = "true"
        [tasks.a]
        sequences = [{ start = "^", stride = "P1" }]
        [tasks.b]
        sequences = [{ start = "^", stride = "P1" }]
        [tasks.z]
        sequences = [{ start = "^", stride = "P1" }]

        [[graph]]
        sequence = { start = "^", stride = "P1" }
        edges = [
            { target = "a", triggers = [{ trigger = { task = "z", output = "succeeded" } }] },
        ]
    "#,
    )
    .unwrap();
    let mut pool = TaskPool::new();
    for point in [2, 1] {
        for name in ["a", "b", "z"] {
            pool.spawn(&def, task_id(name, point));
        }
    }
    let ids: Vec<String> = pool.ordered_ids(&def).iter().map(|i| i.to_string()).collect();
    // Depth: z and b are roots (depth 0), a depends on z (depth 1).
    assert_eq!(ids, vec!["1/b", "1/z", "1/a", "2/b", "2/z", "2/a"]);
}
