// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::duration::CycleDuration;
use proptest::prelude::*;
use yare::parameterized;

fn dt(text: &str) -> CyclePoint {
    CyclePoint::parse(text, PointMode::DateTime).unwrap()
}

#[parameterized(
    compact = { "20100101T0000Z", "20100101T0000Z" },
    with_seconds = { "20100101T000030Z", "20100101T000030Z" },
    extended = { "2010-01-01T00:00Z", "20100101T0000Z" },
    date_only = { "20100615", "20100615T0000Z" },
    hyphenated_date = { "2010-06-15", "20100615T0000Z" },
    year_only = { "2010", "20100101T0000Z" },
    year_month = { "2010-03", "20100301T0000Z" },
)]
fn datetime_parse_canonicalizes(input: &str, canonical: &str) {
    assert_eq!(dt(input).format().unwrap(), canonical);
}

#[test]
fn integer_parse_and_format() {
    let p = CyclePoint::parse("42", PointMode::Integer).unwrap();
    assert_eq!(p, CyclePoint::Integer(42));
    assert_eq!(p.format().unwrap(), "42");

    let neg = CyclePoint::parse("-3", PointMode::Integer).unwrap();
    assert_eq!(neg, CyclePoint::Integer(-3));
}

#[parameterized(
    garbage = { "banana" },
    bad_month = { "20101301T0000Z" },
    bad_length = { "201" },
)]
fn datetime_parse_rejects(input: &str) {
    assert!(CyclePoint::parse(input, PointMode::DateTime).is_err());
}

#[test]
fn year_past_bound_fails_to_format() {
    let p = dt("9999-12-31T23:00Z");
    let bumped = p.offset(&CycleDuration::parse("P1M").unwrap()).unwrap();
    assert!(matches!(bumped.format(), Err(PointError::YearOverflow(10000))));
    // Display still renders something for logs.
    assert!(!bumped.to_string().is_empty());
}

#[test]
fn ordering_is_chronological() {
    assert!(dt("2010") < dt("2011"));
    assert!(dt("20100101T0000Z") < dt("20100101T0001Z"));
    assert!(CyclePoint::Integer(1) < CyclePoint::Integer(2));
}

#[test]
fn offset_integer_steps() {
    let p = CyclePoint::Integer(5);
    assert_eq!(
        p.offset(&CycleDuration::Steps(3)).unwrap(),
        CyclePoint::Integer(8)
    );
    assert_eq!(
        p.offset(&CycleDuration::Steps(-5)).unwrap(),
        CyclePoint::Integer(0)
    );
}

#[test]
fn offset_months_applies_to_calendar_fields() {
    // Jan 31 + P1M clamps to end of February, not 31 days of seconds.
    let p = dt("2010-01-31");
    let q = p.offset(&CycleDuration::parse("P1M").unwrap()).unwrap();
    assert_eq!(q.format().unwrap(), "20100228T0000Z");

    let back = q.offset(&CycleDuration::parse("-P1M").unwrap()).unwrap();
    assert_eq!(back.format().unwrap(), "20100128T0000Z");
}

#[test]
fn offset_mixed_calendar_duration() {
    let p = dt("2010-01-01");
    let q = p.offset(&CycleDuration::parse("P1MT6H").unwrap()).unwrap();
    assert_eq!(q.format().unwrap(), "20100201T0600Z");
}

#[test]
fn offset_universe_mismatch() {
    let p = CyclePoint::Integer(1);
    assert!(matches!(
        p.offset(&CycleDuration::parse("PT1H").unwrap()),
        Err(PointError::UniverseMismatch { .. })
    ));
    let q = dt("2010");
    assert!(q.offset(&CycleDuration::Steps(1)).is_err());
}

#[test]
fn units_since_matches_universe() {
    assert_eq!(
        CyclePoint::Integer(7).units_since(&CyclePoint::Integer(3)),
        Some(4)
    );
    assert_eq!(dt("20100101T0100Z").units_since(&dt("20100101T0000Z")), Some(3600));
    assert_eq!(dt("2010").units_since(&CyclePoint::Integer(0)), None);
}

#[test]
fn months_since_counts_calendar_months() {
    assert_eq!(dt("2011-03").months_since(&dt("2010-01")), Some(14));
}

#[test]
fn serde_round_trips_both_universes() {
    for p in [CyclePoint::Integer(12), dt("20100101T0630Z")] {
        let json = serde_json::to_string(&p).unwrap();
        let back: CyclePoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}

proptest! {
    // P5: parse(format(p)) == p for in-bound points at minute precision.
    #[test]
    fn format_parse_round_trip_datetime(days in 0i64..3_000_000, minutes in 0i64..1440) {
        let base = dt("0001-01-01");
        let t = base.as_datetime().unwrap()
            + chrono::Duration::days(days)
            + chrono::Duration::minutes(minutes);
        let p = CyclePoint::DateTime(t);
        if let Ok(text) = p.format() {
            let back = CyclePoint::parse(&text, PointMode::DateTime).unwrap();
            prop_assert_eq!(back, p);
        }
    }

    #[test]
    fn format_parse_round_trip_integer(i in i64::MIN / 2..i64::MAX / 2) {
        let p = CyclePoint::Integer(i);
        let text = p.format().unwrap();
        prop_assert_eq!(CyclePoint::parse(&text, PointMode::Integer).unwrap(), p);
    }
}
