// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn settings_nest_on_dots() {
    let value = settings_to_value(&[
        "environment.NAME=bob".to_string(),
        "environment.SITE=hq".to_string(),
        "script=echo hi".to_string(),
    ])
    .unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "environment": {"NAME": "bob", "SITE": "hq"},
            "script": "echo hi",
        })
    );
}

#[test]
fn settings_without_equals_are_rejected() {
    assert!(settings_to_value(&["just-a-key".to_string()]).is_err());
}

#[parameterized(
    waiting = { "waiting", TaskStatus::Waiting },
    submit_failed = { "submit-failed", TaskStatus::SubmitFailed },
    succeeded = { "succeeded", TaskStatus::Succeeded },
)]
fn statuses_parse_kebab_case(text: &str, expect: TaskStatus) {
    assert_eq!(parse_status(text).unwrap(), expect);
}

#[test]
fn bad_status_is_an_error() {
    assert!(parse_status("sleeping").is_err());
}

#[test]
fn task_ids_parse_point_name() {
    let id = parse_task("20100101T0000Z/model").unwrap();
    assert_eq!(id.name, "model");
    assert!(parse_task("nope").is_err());
}

#[test]
fn severities_parse_uppercase() {
    assert_eq!(parse_severity("NORMAL").unwrap(), MessageSeverity::Normal);
    assert_eq!(parse_severity("CRITICAL").unwrap(), MessageSeverity::Critical);
    assert!(parse_severity("shouty").is_err());
}
