// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gyre_core::test_support::task_id;
use serde_json::json;

fn chain() -> Vec<String> {
    vec!["foo".to_string(), "MODELS".to_string(), "root".to_string()]
}

#[test]
fn deep_merge_objects_and_scalars() {
    let mut base = json!({"script": "a", "environment": {"X": "1", "Y": "2"}});
    deep_merge(&mut base, &json!({"environment": {"Y": "3", "Z": "4"}}));
    assert_eq!(
        base,
        json!({"script": "a", "environment": {"X": "1", "Y": "3", "Z": "4"}})
    );
}

#[test]
fn effective_runtime_layers_by_specificity() {
    let mut store = BroadcastStore::new();
    store.set(
        "*".into(),
        "*".into(),
        json!({"environment": {"WHO": "workflow"}}),
        BroadcastLifespan::Permanent,
    );
    store.set(
        "1".into(),
        "*".into(),
        json!({"environment": {"WHO": "cycle", "CYCLE": "yes"}}),
        BroadcastLifespan::Permanent,
    );
    store.set(
        "*".into(),
        "foo".into(),
        json!({"environment": {"WHO": "task"}}),
        BroadcastLifespan::Permanent,
    );

    let base = TaskRuntime::default();
    let rt = store
        .effective_runtime(&base, "foo", &gyre_core::CyclePoint::Integer(1), &chain())
        .unwrap();
    // Task-matched wins over cycle-matched wins over workflow-wide.
    assert_eq!(rt.environment.get("WHO").map(String::as_str), Some("task"));
    assert_eq!(rt.environment.get("CYCLE").map(String::as_str), Some("yes"));

    // A different cycle sees no cycle-matched entry.
    let rt2 = store
        .effective_runtime(&base, "bar", &gyre_core::CyclePoint::Integer(2), &["bar".to_string()])
        .unwrap();
    assert_eq!(rt2.environment.get("WHO").map(String::as_str), Some("workflow"));
    assert!(rt2.environment.get("CYCLE").is_none());
}

#[test]
fn family_pattern_applies_to_members_only() {
    let mut store = BroadcastStore::new();
    store.set(
        "*".into(),
        "MODELS".into(),
        json!({"environment": {"FAMILY": "models"}}),
        BroadcastLifespan::Permanent,
    );

    let base = TaskRuntime::default();
    let member = store
        .effective_runtime(&base, "foo", &gyre_core::CyclePoint::Integer(1), &chain())
        .unwrap();
    assert_eq!(member.environment.get("FAMILY").map(String::as_str), Some("models"));

    let outsider = store
        .effective_runtime(
            &base,
            "other",
            &gyre_core::CyclePoint::Integer(1),
            &["other".to_string(), "root".to_string()],
        )
        .unwrap();
    assert!(outsider.environment.get("FAMILY").is_none());
}

#[test]
fn scalar_override_replaces_script() {
    let mut store = BroadcastStore::new();
    store.set(
        "*".into(),
        "foo".into(),
        json!({"script": "echo overridden"}),
        BroadcastLifespan::Permanent,
    );
    let mut base = TaskRuntime::default();
    base.script = "echo base".into();
    let rt = store
        .effective_runtime(&base, "foo", &gyre_core::CyclePoint::Integer(1), &chain())
        .unwrap();
    assert_eq!(rt.script, "echo overridden");
}

#[test]
fn until_task_completed_expires() {
    let mut store = BroadcastStore::new();
    let id = task_id("foo", 1);
    store.set(
        "1".into(),
        "foo".into(),
        json!({"environment": {"A": "1"}}),
        BroadcastLifespan::UntilTaskCompleted(id.clone()),
    );
    assert_eq!(store.entries().len(), 1);

    let events = store.expire_for_task(&id);
    assert_eq!(events.len(), 1);
    assert!(store.entries().is_empty());

    // Expiring again is a no-op.
    assert!(store.expire_for_task(&id).is_empty());
}

#[test]
fn until_cycle_completed_expires_when_cycle_passes() {
    let mut store = BroadcastStore::new();
    store.set(
        "1".into(),
        "*".into(),
        json!({}),
        BroadcastLifespan::UntilCycleCompleted(gyre_core::CyclePoint::Integer(1)),
    );
    assert!(store.expire_for_cycle(&gyre_core::CyclePoint::Integer(1)).is_empty());
    let events = store.expire_for_cycle(&gyre_core::CyclePoint::Integer(2));
    assert_eq!(events.len(), 1);
    assert!(store.entries().is_empty());
}

#[test]
fn clear_removes_matching_entries() {
    let mut store = BroadcastStore::new();
    store.set("*".into(), "foo".into(), json!({}), BroadcastLifespan::Permanent);
    store.set("*".into(), "bar".into(), json!({}), BroadcastLifespan::Permanent);

    let events = store.clear("*", "foo");
    assert_eq!(events.len(), 1);
    assert_eq!(store.entries().len(), 1);
    assert_eq!(store.entries()[0].name_expr, "bar");
}
