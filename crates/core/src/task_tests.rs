// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::outputs::OUTPUT_SUCCEEDED;
use crate::point::CyclePoint;
use crate::prereq::PrereqAtom;
use yare::parameterized;

fn proxy() -> TaskProxy {
    TaskProxy::builder().build()
}

#[parameterized(
    waiting_preparing = { TaskStatus::Waiting, TaskStatus::Preparing, true },
    preparing_submitted = { TaskStatus::Preparing, TaskStatus::Submitted, true },
    preparing_transport_revert = { TaskStatus::Preparing, TaskStatus::Waiting, true },
    preparing_submit_failed = { TaskStatus::Preparing, TaskStatus::SubmitFailed, true },
    submitted_running = { TaskStatus::Submitted, TaskStatus::Running, true },
    submitted_submit_failed = { TaskStatus::Submitted, TaskStatus::SubmitFailed, true },
    submitted_succeeded_late_poll = { TaskStatus::Submitted, TaskStatus::Succeeded, true },
    running_succeeded = { TaskStatus::Running, TaskStatus::Succeeded, true },
    running_failed = { TaskStatus::Running, TaskStatus::Failed, true },
    failed_retry = { TaskStatus::Failed, TaskStatus::Waiting, true },
    submit_failed_retry = { TaskStatus::SubmitFailed, TaskStatus::Waiting, true },
    running_expired = { TaskStatus::Running, TaskStatus::Expired, true },
    waiting_running = { TaskStatus::Waiting, TaskStatus::Running, false },
    succeeded_running = { TaskStatus::Succeeded, TaskStatus::Running, false },
    expired_waiting = { TaskStatus::Expired, TaskStatus::Waiting, false },
    succeeded_expired = { TaskStatus::Succeeded, TaskStatus::Expired, false },
)]
fn transition_table(from: TaskStatus, to: TaskStatus, allowed: bool) {
    assert_eq!(TaskStatus::can_transition(from, to), allowed);
}

#[test]
fn set_status_rejects_illegal_transition() {
    let mut p = proxy();
    let err = p.set_status(TaskStatus::Running).unwrap_err();
    assert_eq!(err.from, TaskStatus::Waiting);
    assert_eq!(err.to, TaskStatus::Running);
    assert_eq!(p.status, TaskStatus::Waiting);

    p.set_status(TaskStatus::Preparing).unwrap();
    assert_eq!(p.status, TaskStatus::Preparing);
}

#[test]
fn submit_num_tracks_job_history() {
    let mut p = proxy();
    assert_eq!(p.submit_num(), 0);

    let job = p.new_job("localhost");
    assert_eq!(job.submit_num, 1);
    assert_eq!(job.try_num, 1);

    if let Some(j) = p.current_job_mut() {
        j.submit_exit = Some(1);
    }
    let job = p.new_job("localhost");
    assert_eq!(job.submit_num, 2);
    assert_eq!(p.submit_num(), 2);
}

#[test]
fn at_most_one_open_job_record() {
    let mut p = proxy();
    p.new_job("localhost");
    if let Some(j) = p.current_job_mut() {
        j.run_exit = Some(ExitClass::Err);
    }
    p.new_job("localhost");
    let open = p.jobs.iter().filter(|j| !j.is_terminal()).count();
    assert_eq!(open, 1);
}

#[test]
fn vacated_record_stays_open() {
    let mut rec = JobRecord::new(1, 1, "hpc");
    rec.run_exit = Some(ExitClass::Vacated);
    rec.vacated = true;
    assert!(!rec.is_terminal());

    rec.run_exit = Some(ExitClass::Succeeded);
    assert!(rec.is_terminal());
}

#[test]
fn runnable_needs_prereqs_xtriggers_and_release() {
    let mut p = TaskProxy::builder()
        .prereqs(vec![Prerequisite::single(PrereqAtom::new(
            "up",
            CyclePoint::Integer(1),
            OUTPUT_SUCCEEDED,
        ))])
        .build();
    p.xtriggers.insert("clock_0".to_string(), false);

    assert!(!p.is_runnable());

    p.prereqs[0].satisfy("up", &CyclePoint::Integer(1), OUTPUT_SUCCEEDED);
    assert!(!p.is_runnable(), "xtrigger still unsatisfied");

    assert!(p.satisfy_xtrigger("clock_0"));
    assert!(p.is_runnable());

    p.is_held = true;
    assert!(!p.is_runnable());
    p.is_held = false;
    assert!(p.is_runnable());
}

#[test]
fn suicide_prereq_does_not_gate_running() {
    let mut p = TaskProxy::builder()
        .prereqs(vec![Prerequisite::single(PrereqAtom::new(
            "x",
            CyclePoint::Integer(1),
            "failed",
        ))
        .suicide()])
        .build();
    // Unsatisfied suicide prerequisite: proxy is runnable, not stalled.
    assert!(p.is_runnable());
    assert!(!p.is_waiting_on_prereqs());
    assert!(!p.suicide_due());

    p.prereqs[0].satisfy("x", &CyclePoint::Integer(1), "failed");
    assert!(p.suicide_due());
}

#[test]
fn removable_requires_outputs_and_children() {
    let mut p = proxy();
    p.force_status(TaskStatus::Succeeded);
    p.outputs.complete(OUTPUT_SUCCEEDED);
    assert!(!p.is_removable(), "children not yet spawned");

    p.children_spawned = true;
    assert!(p.is_removable());
}

#[test]
fn exit_class_text_forms() {
    assert_eq!(ExitClass::parse("SUCCEEDED"), Some(ExitClass::Succeeded));
    assert_eq!(ExitClass::parse("vacated/USR1"), Some(ExitClass::Vacated));
    assert_eq!(ExitClass::parse("nope"), None);
    assert_eq!(ExitClass::Xcpu.to_string(), "XCPU");
}

#[test]
fn proxy_serde_round_trip() {
    let mut p = proxy();
    p.new_job("localhost");
    if let Some(j) = p.current_job_mut() {
        j.runner_job_id = Some("4242".to_string());
        j.time_submit = Some("2010-01-01T00:00:00Z".to_string());
    }
    let json = serde_json::to_string(&p).unwrap();
    let back: TaskProxy = serde_json::from_str(&json).unwrap();
    assert_eq!(back, p);
}
