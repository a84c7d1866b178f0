// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::point::CyclePoint;
use yare::parameterized;

fn task() -> TaskId {
    TaskId::new("foo", CyclePoint::Integer(1))
}

#[parameterized(
    submit_retry = { TimerKind::SubmitRetry(task()), "submit-retry:1/foo" },
    exec_retry = { TimerKind::ExecRetry(task()), "exec-retry:1/foo" },
    submission_poll = { TimerKind::SubmissionPoll(task()), "submission-poll:1/foo" },
    execution_poll = { TimerKind::ExecutionPoll(task()), "execution-poll:1/foo" },
    execution_timeout = { TimerKind::ExecutionTimeout(task()), "execution-timeout:1/foo" },
    expiry = { TimerKind::Expiry(task()), "expiry:1/foo" },
    stall = { TimerKind::Stall, "stall" },
    inactivity = { TimerKind::Inactivity, "inactivity" },
)]
fn kind_round_trips(kind: TimerKind, text: &str) {
    let id = kind.to_timer_id();
    assert_eq!(id.as_str(), text);
    assert_eq!(id.kind(), Some(kind));
}

#[test]
fn task_accessor() {
    assert_eq!(TimerKind::Expiry(task()).task(), Some(&task()));
    assert_eq!(TimerKind::Stall.task(), None);
}

#[test]
fn unknown_formats_do_not_parse() {
    assert_eq!(TimerId::new("mystery:1/foo").kind(), None);
    assert_eq!(TimerId::new("submit-retry:garbage").kind(), None);
}

#[test]
fn constructors_match_kinds() {
    assert_eq!(TimerId::submit_retry(&task()).kind(), Some(TimerKind::SubmitRetry(task())));
    assert_eq!(TimerId::stall().kind(), Some(TimerKind::Stall));
}
