// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ISO-8601 durations and integer-cycling strides.
//!
//! Two universes mirror [`crate::point::CyclePoint`]: `Steps` offsets integer
//! points, `Calendar` offsets date-time points. Calendar durations keep their
//! nominal year/month fields separate because months and years must be applied
//! to the cycle point itself, never pre-converted to seconds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("invalid duration: {0:?}")]
    Parse(String),
    #[error("invalid interval list entry: {0:?}")]
    IntervalList(String),
}

/// Nominal calendar duration (date-time universe).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDuration {
    pub negative: bool,
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl CalendarDuration {
    /// Total nominal months (years folded in).
    pub fn total_months(&self) -> u32 {
        self.years * 12 + self.months
    }

    /// The exact sub-month part as whole seconds.
    pub fn exact_seconds(&self) -> u64 {
        self.days as u64 * 86_400
            + self.hours as u64 * 3_600
            + self.minutes as u64 * 60
            + self.seconds as u64
    }

    pub fn is_zero(&self) -> bool {
        self.total_months() == 0 && self.exact_seconds() == 0
    }
}

/// A duration in one of the two cycling universes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CycleDuration {
    /// Integer-cycling stride, e.g. `P1`, `P5`, `-P2`.
    Steps(i64),
    /// ISO-8601 nominal duration, e.g. `PT30M`, `P1DT6H`, `P1M`.
    Calendar(CalendarDuration),
}

impl CycleDuration {
    pub fn steps(n: i64) -> Self {
        CycleDuration::Steps(n)
    }

    pub fn seconds(secs: u64) -> Self {
        CycleDuration::Calendar(CalendarDuration {
            days: (secs / 86_400) as u32,
            hours: (secs % 86_400 / 3_600) as u32,
            minutes: (secs % 3_600 / 60) as u32,
            seconds: (secs % 60) as u32,
            ..CalendarDuration::default()
        })
    }

    /// Parse either form. `P<n>` with no designators is an integer stride;
    /// anything with date/time designators is a calendar duration.
    pub fn parse(text: &str) -> Result<Self, DurationError> {
        let text = text.trim();
        let err = || DurationError::Parse(text.to_string());

        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let body = body.strip_prefix('P').ok_or_else(err)?;
        if body.is_empty() {
            return Err(err());
        }

        // Integer stride: all digits, no designators.
        if body.bytes().all(|b| b.is_ascii_digit()) {
            let n: i64 = body.parse().map_err(|_| err())?;
            return Ok(CycleDuration::Steps(if negative { -n } else { n }));
        }

        let mut out = CalendarDuration { negative, ..CalendarDuration::default() };
        let (date_part, time_part) = match body.split_once('T') {
            Some((d, t)) => (d, Some(t)),
            None => (body, None),
        };

        let mut num = String::new();
        for c in date_part.chars() {
            if c.is_ascii_digit() {
                num.push(c);
                continue;
            }
            let value: u32 = num.parse().map_err(|_| err())?;
            num.clear();
            match c {
                'Y' => out.years = value,
                'M' => out.months = value,
                'W' => out.days += value * 7,
                'D' => out.days += value,
                _ => return Err(err()),
            }
        }
        if !num.is_empty() {
            return Err(err());
        }

        if let Some(time_part) = time_part {
            if time_part.is_empty() {
                return Err(err());
            }
            for c in time_part.chars() {
                if c.is_ascii_digit() {
                    num.push(c);
                    continue;
                }
                let value: u32 = num.parse().map_err(|_| err())?;
                num.clear();
                match c {
                    'H' => out.hours = value,
                    'M' => out.minutes = value,
                    'S' => out.seconds = value,
                    _ => return Err(err()),
                }
            }
            if !num.is_empty() {
                return Err(err());
            }
        }

        Ok(CycleDuration::Calendar(out))
    }

    /// Exact wall-clock equivalent, when one exists.
    ///
    /// Integer strides and calendar durations with year/month parts have no
    /// exact seconds form; those return `None`.
    pub fn as_std(&self) -> Option<Duration> {
        match self {
            CycleDuration::Steps(_) => None,
            CycleDuration::Calendar(c) => {
                if c.total_months() != 0 || c.negative {
                    None
                } else {
                    Some(Duration::from_secs(c.exact_seconds()))
                }
            }
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            CycleDuration::Steps(n) => *n < 0,
            CycleDuration::Calendar(c) => c.negative && !c.is_zero(),
        }
    }

    /// The same duration with the sign flipped.
    pub fn negated(&self) -> Self {
        match *self {
            CycleDuration::Steps(n) => CycleDuration::Steps(-n),
            CycleDuration::Calendar(c) => {
                CycleDuration::Calendar(CalendarDuration { negative: !c.negative, ..c })
            }
        }
    }
}

impl fmt::Display for CycleDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleDuration::Steps(n) => {
                if *n < 0 {
                    write!(f, "-P{}", -n)
                } else {
                    write!(f, "P{n}")
                }
            }
            CycleDuration::Calendar(c) => {
                if c.negative && !c.is_zero() {
                    f.write_str("-")?;
                }
                f.write_str("P")?;
                if c.years > 0 {
                    write!(f, "{}Y", c.years)?;
                }
                if c.months > 0 {
                    write!(f, "{}M", c.months)?;
                }
                if c.days > 0 {
                    write!(f, "{}D", c.days)?;
                }
                if c.hours > 0 || c.minutes > 0 || c.seconds > 0 {
                    f.write_str("T")?;
                    if c.hours > 0 {
                        write!(f, "{}H", c.hours)?;
                    }
                    if c.minutes > 0 {
                        write!(f, "{}M", c.minutes)?;
                    }
                    if c.seconds > 0 {
                        write!(f, "{}S", c.seconds)?;
                    }
                } else if c.total_months() == 0 && c.days == 0 {
                    // Zero duration canonical form
                    f.write_str("T0S")?;
                }
                Ok(())
            }
        }
    }
}

impl TryFrom<String> for CycleDuration {
    type Error = DurationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        CycleDuration::parse(&s)
    }
}

impl From<CycleDuration> for String {
    fn from(d: CycleDuration) -> String {
        d.to_string()
    }
}

/// A list of wall-clock intervals with run-length notation, e.g.
/// `2*PT1S,10*PT6S`. Indexing past the end repeats the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IntervalList {
    intervals: Vec<Duration>,
}

impl IntervalList {
    pub fn new(intervals: Vec<Duration>) -> Self {
        Self { intervals }
    }

    pub fn parse(text: &str) -> Result<Self, DurationError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::default());
        }
        let mut intervals = Vec::new();
        for entry in text.split(',') {
            let entry = entry.trim();
            let (count, spec) = match entry.split_once('*') {
                Some((n, spec)) => {
                    let n: usize = n
                        .trim()
                        .parse()
                        .map_err(|_| DurationError::IntervalList(entry.to_string()))?;
                    (n, spec.trim())
                }
                None => (1, entry),
            };
            let d = CycleDuration::parse(spec)?
                .as_std()
                .ok_or_else(|| DurationError::IntervalList(entry.to_string()))?;
            intervals.extend(std::iter::repeat(d).take(count));
        }
        Ok(Self { intervals })
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Interval for the given zero-based attempt; the last entry repeats.
    pub fn get(&self, index: usize) -> Option<Duration> {
        if self.intervals.is_empty() {
            return None;
        }
        Some(self.intervals[index.min(self.intervals.len() - 1)])
    }

    /// First configured interval, if any.
    pub fn first(&self) -> Option<Duration> {
        self.intervals.first().copied()
    }

    /// Finite interval for the given index: `None` once the list is consumed.
    /// Used for retry delays, which do not repeat.
    pub fn get_finite(&self, index: usize) -> Option<Duration> {
        self.intervals.get(index).copied()
    }
}

impl TryFrom<String> for IntervalList {
    type Error = DurationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        IntervalList::parse(&s)
    }
}

impl From<IntervalList> for String {
    fn from(list: IntervalList) -> String {
        list.intervals
            .iter()
            .map(|d| CycleDuration::seconds(d.as_secs()).to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod tests;
