// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::broadcast::BroadcastStore;
use gyre_core::event::BroadcastLifespan;
use gyre_core::task::TaskProxy;
use gyre_core::test_support::task_id;
use gyre_def::parse_str;
use serde_json::json;

fn def() -> WorkflowDef {
    parse_str(
        r#"
        [workflow]
        name = "jobs"
        cycling = "integer"
        initial_cycle_point = "1"

        [runtime.foo]
        script = "echo run"
        environment = { NAME = "base" }
        execution_time_limit = "PT5S"
        execution_time_limit_polling_intervals = "PT7S"
        submission_polling_intervals = "2*PT1S,PT6S"
        execution_polling_intervals = "PT2S"

        [tasks.foo]
        sequences = [{ start = "^", stride = "P1" }]
    "#,
    )
    .unwrap()
}

fn manager() -> JobManager {
    JobManager::new("log/job", 100)
}

#[test]
fn prepare_job_appends_record_and_renders_script() {
    let def = def();
    let mut mgr = manager();
    let mut proxy = TaskProxy::builder().id(task_id("foo", 1)).build();

    let spec = mgr
        .prepare_job(&def, &BroadcastStore::new(), &mut proxy)
        .unwrap();
    assert_eq!(spec.submit_num, 1);
    assert_eq!(spec.platform, "localhost");
    assert_eq!(spec.job_dir, PathBuf::from("log/job/1/foo/01"));
    assert!(spec.script.contains("echo run"));
    assert!(spec.script.contains("export NAME=\"base\""));
    assert_eq!(proxy.submit_num(), 1);

    // A second preparation bumps the submit number.
    let spec = mgr
        .prepare_job(&def, &BroadcastStore::new(), &mut proxy)
        .unwrap();
    assert_eq!(spec.submit_num, 2);
    assert!(spec.job_dir.ends_with("02"));
}

#[test]
fn broadcast_overlay_lands_in_job_environment() {
    let def = def();
    let mut mgr = manager();
    let mut broadcasts = BroadcastStore::new();
    broadcasts.set(
        "1".into(),
        "foo".into(),
        json!({"environment": {"NAME": "bob"}}),
        BroadcastLifespan::Permanent,
    );
    let mut proxy = TaskProxy::builder().id(task_id("foo", 1)).build();
    let spec = mgr.prepare_job(&def, &broadcasts, &mut proxy).unwrap();
    assert!(spec.script.contains("export NAME=\"bob\""));
}

#[test]
fn batches_group_by_platform_and_split() {
    let mgr = JobManager::new("log/job", 2);
    let jobs: Vec<(String, u32)> = vec![
        ("hpc".into(), 1),
        ("localhost".into(), 2),
        ("hpc".into(), 3),
        ("hpc".into(), 4),
        ("hpc".into(), 5),
    ];
    let batches = mgr.batches("jobs-submit", jobs, |(p, _)| p.as_str());
    let shape: Vec<(String, usize)> =
        batches.iter().map(|(p, b)| (p.clone(), b.len())).collect();
    assert_eq!(
        shape,
        vec![
            ("hpc".to_string(), 2),
            ("hpc".to_string(), 2),
            ("localhost".to_string(), 1),
        ]
    );
}

#[test]
fn poll_delays_follow_run_length_schedule() {
    let def = def();
    let runtime = &def.task("foo").unwrap().runtime;
    let mut mgr = manager();
    let id = task_id("foo", 1);

    // 2*PT1S,PT6S then the last repeats.
    let delays: Vec<u64> = (0..4)
        .filter_map(|_| mgr.next_poll_delay(runtime, &id, PollPhase::Submission))
        .map(|d| d.as_secs())
        .collect();
    assert_eq!(delays, vec![1, 1, 6, 6]);

    // Phase change resets counting.
    mgr.reset_poll_count(&id);
    assert_eq!(
        mgr.next_poll_delay(runtime, &id, PollPhase::Execution),
        Some(Duration::from_secs(2))
    );
}

#[test]
fn no_polling_without_configured_intervals() {
    let mut mgr = manager();
    let runtime = TaskRuntime::default();
    assert_eq!(
        mgr.next_poll_delay(&runtime, &task_id("foo", 1), PollPhase::Execution),
        None
    );
}

#[test]
fn time_limit_delay_adds_one_poll_interval() {
    let def = def();
    let runtime = &def.task("foo").unwrap().runtime;
    // PT5S limit + PT7S interval = 12s.
    assert_eq!(
        JobManager::time_limit_delay(runtime),
        Some(Duration::from_secs(12))
    );

    let bare = TaskRuntime::default();
    assert_eq!(JobManager::time_limit_delay(&bare), None);
}
