// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cycle points: positions on a workflow's recurrence.
//!
//! A point is drawn from one of two universes, integer or UTC date-time, and
//! the universe is fixed per workflow. Date-time points are bounded to year
//! 9999 at the formatting boundary; arithmetic past the bound is caught when
//! the point is rendered for the user.

use crate::duration::CycleDuration;
use chrono::{
    DateTime, Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Maximum representable year in the date-time universe.
pub const MAX_YEAR: i32 = 9999;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PointError {
    #[error("invalid cycle point: {0:?}")]
    Parse(String),
    #[error("cycle point year {0} exceeds {MAX_YEAR}")]
    YearOverflow(i32),
    #[error("cannot offset {point} by {duration}: universe mismatch")]
    UniverseMismatch { point: String, duration: String },
    #[error("cycle point arithmetic out of range")]
    OutOfRange,
}

/// Which point universe a workflow cycles in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointMode {
    Integer,
    DateTime,
}

/// A position on a recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CyclePoint {
    Integer(i64),
    DateTime(DateTime<Utc>),
}

impl CyclePoint {
    pub fn integer(i: i64) -> Self {
        CyclePoint::Integer(i)
    }

    pub fn datetime(t: DateTime<Utc>) -> Self {
        CyclePoint::DateTime(t)
    }

    pub fn mode(&self) -> PointMode {
        match self {
            CyclePoint::Integer(_) => PointMode::Integer,
            CyclePoint::DateTime(_) => PointMode::DateTime,
        }
    }

    /// Parse a point in the given universe.
    pub fn parse(text: &str, mode: PointMode) -> Result<Self, PointError> {
        let text = text.trim();
        match mode {
            PointMode::Integer => text
                .parse::<i64>()
                .map(CyclePoint::Integer)
                .map_err(|_| PointError::Parse(text.to_string())),
            PointMode::DateTime => parse_datetime(text).map(CyclePoint::DateTime),
        }
    }

    /// Parse without a mode hint: date-time if the text carries date-time
    /// structure, integer otherwise. Used for deserializing stored points,
    /// whose canonical forms are unambiguous.
    pub fn parse_any(text: &str) -> Result<Self, PointError> {
        let text = text.trim();
        if text.contains('T') || (text.contains('-') && !text.starts_with('-')) {
            parse_datetime(text).map(CyclePoint::DateTime)
        } else if let Ok(i) = text.parse::<i64>() {
            Ok(CyclePoint::Integer(i))
        } else {
            parse_datetime(text).map(CyclePoint::DateTime)
        }
    }

    /// Canonical text form. Fails for date-time points past year 9999;
    /// the failure must surface to the user rather than be swallowed.
    pub fn format(&self) -> Result<String, PointError> {
        match self {
            CyclePoint::Integer(i) => Ok(i.to_string()),
            CyclePoint::DateTime(t) => {
                if t.year() > MAX_YEAR {
                    return Err(PointError::YearOverflow(t.year()));
                }
                if t.second() != 0 {
                    Ok(t.format("%Y%m%dT%H%M%SZ").to_string())
                } else {
                    Ok(t.format("%Y%m%dT%H%MZ").to_string())
                }
            }
        }
    }

    /// Offset by a duration in the matching universe.
    pub fn offset(&self, duration: &CycleDuration) -> Result<Self, PointError> {
        let mismatch = || PointError::UniverseMismatch {
            point: self.to_string(),
            duration: duration.to_string(),
        };
        match (self, duration) {
            (CyclePoint::Integer(i), CycleDuration::Steps(n)) => i
                .checked_add(*n)
                .map(CyclePoint::Integer)
                .ok_or(PointError::OutOfRange),
            (CyclePoint::DateTime(t), CycleDuration::Calendar(c)) => {
                // Months and years move the calendar fields first; only the
                // exact remainder is seconds arithmetic.
                let months = c.total_months();
                let stepped = if c.negative {
                    t.checked_sub_months(Months::new(months))
                } else {
                    t.checked_add_months(Months::new(months))
                }
                .ok_or(PointError::OutOfRange)?;
                let exact = chrono::Duration::seconds(c.exact_seconds() as i64);
                let result = if c.negative { stepped - exact } else { stepped + exact };
                Ok(CyclePoint::DateTime(result))
            }
            _ => Err(mismatch()),
        }
    }

    /// Whole units between two points of the same universe: steps for
    /// integers, seconds for date-times.
    pub fn units_since(&self, earlier: &CyclePoint) -> Option<i64> {
        match (self, earlier) {
            (CyclePoint::Integer(a), CyclePoint::Integer(b)) => Some(a - b),
            (CyclePoint::DateTime(a), CyclePoint::DateTime(b)) => {
                Some(a.signed_duration_since(*b).num_seconds())
            }
            _ => None,
        }
    }

    /// Whole calendar months between two date-time points (integer pairs
    /// return `None`).
    pub fn months_since(&self, earlier: &CyclePoint) -> Option<i64> {
        match (self, earlier) {
            (CyclePoint::DateTime(a), CyclePoint::DateTime(b)) => {
                Some((a.year() as i64 - b.year() as i64) * 12
                    + (a.month() as i64 - b.month() as i64))
            }
            _ => None,
        }
    }

    /// Underlying UTC time, for the date-time universe.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            CyclePoint::DateTime(t) => Some(*t),
            CyclePoint::Integer(_) => None,
        }
    }
}

impl Ord for CyclePoint {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CyclePoint::Integer(a), CyclePoint::Integer(b)) => a.cmp(b),
            (CyclePoint::DateTime(a), CyclePoint::DateTime(b)) => a.cmp(b),
            // Universes are never mixed within one workflow; the arbitrary
            // cross-universe order only keeps Ord total.
            (CyclePoint::Integer(_), CyclePoint::DateTime(_)) => Ordering::Less,
            (CyclePoint::DateTime(_), CyclePoint::Integer(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for CyclePoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CyclePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format() {
            Ok(s) => f.write_str(&s),
            // Out-of-bound points still need a log rendering.
            Err(_) => match self {
                CyclePoint::DateTime(t) => write!(f, "{}", t.format("%+")),
                CyclePoint::Integer(i) => write!(f, "{i}"),
            },
        }
    }
}

impl Serialize for CyclePoint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CyclePoint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CyclePoint::parse_any(&s).map_err(serde::de::Error::custom)
    }
}

fn parse_datetime(text: &str) -> Result<DateTime<Utc>, PointError> {
    let err = || PointError::Parse(text.to_string());
    let body = text.strip_suffix('Z').unwrap_or(text);

    let naive = if let Some((date_part, time_part)) = body.split_once('T') {
        let date = parse_date(date_part).ok_or_else(err)?;
        let time = parse_time(time_part).ok_or_else(err)?;
        NaiveDateTime::new(date, time)
    } else {
        let date = parse_date(body).ok_or_else(err)?;
        date.and_hms_opt(0, 0, 0).ok_or_else(err)?
    };

    if naive.year() > MAX_YEAR || naive.year() < 0 {
        return Err(PointError::YearOverflow(naive.year()));
    }
    Ok(Utc.from_utc_datetime(&naive))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if s.contains('-') {
        let mut parts = s.splitn(3, '-');
        let year: i32 = parts.next()?.parse().ok()?;
        let month: u32 = match parts.next() {
            Some(m) => m.parse().ok()?,
            None => 1,
        };
        let day: u32 = match parts.next() {
            Some(d) => d.parse().ok()?,
            None => 1,
        };
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match s.len() {
        4 => NaiveDate::from_ymd_opt(s.parse().ok()?, 1, 1),
        6 => NaiveDate::from_ymd_opt(s[..4].parse().ok()?, s[4..].parse().ok()?, 1),
        8 => NaiveDate::from_ymd_opt(
            s[..4].parse().ok()?,
            s[4..6].parse().ok()?,
            s[6..].parse().ok()?,
        ),
        _ => None,
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    if s.contains(':') {
        let mut parts = s.splitn(3, ':');
        let hour: u32 = parts.next()?.parse().ok()?;
        let minute: u32 = match parts.next() {
            Some(m) => m.parse().ok()?,
            None => 0,
        };
        let second: u32 = match parts.next() {
            Some(sec) => sec.parse().ok()?,
            None => 0,
        };
        return NaiveTime::from_hms_opt(hour, minute, second);
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match s.len() {
        2 => NaiveTime::from_hms_opt(s.parse().ok()?, 0, 0),
        4 => NaiveTime::from_hms_opt(s[..2].parse().ok()?, s[2..].parse().ok()?, 0),
        6 => NaiveTime::from_hms_opt(
            s[..2].parse().ok()?,
            s[2..4].parse().ok()?,
            s[4..].parse().ok()?,
        ),
        _ => None,
    }
}

#[cfg(test)]
#[path = "point_tests.rs"]
mod tests;
