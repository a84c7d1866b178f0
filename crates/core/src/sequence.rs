// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recurrence sequences: `(start, stride, optional end, exclusions)`.
//!
//! `next_after` / `prev_before` are O(1) arithmetic on the underlying
//! universe (steps, exact seconds, or whole calendar months), with a bounded
//! adjustment for month-length clamping and a skip over the finite exclusion
//! set.

use crate::duration::{CalendarDuration, CycleDuration};
use crate::point::{CyclePoint, PointError, PointMode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("sequence stride must be non-zero and positive")]
    BadStride,
    #[error("sequence stride mixes months with sub-month units")]
    MixedStride,
    #[error("sequence start and stride are from different universes")]
    UniverseMismatch,
    #[error("R{0}/start/stop needs distinct start and stop")]
    BadRepeat(u32),
    #[error(transparent)]
    Point(#[from] PointError),
}

/// A recurrence rule producing an ordered stream of cycle points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    start: CyclePoint,
    stride: CycleDuration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end: Option<CyclePoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    exclusions: Vec<CyclePoint>,
}

impl Sequence {
    pub fn new(start: CyclePoint, stride: CycleDuration) -> Result<Self, SequenceError> {
        Self::bounded(start, stride, None)
    }

    pub fn bounded(
        start: CyclePoint,
        stride: CycleDuration,
        end: Option<CyclePoint>,
    ) -> Result<Self, SequenceError> {
        match (&start, &stride) {
            (CyclePoint::Integer(_), CycleDuration::Steps(n)) => {
                if *n <= 0 {
                    return Err(SequenceError::BadStride);
                }
            }
            (CyclePoint::DateTime(_), CycleDuration::Calendar(c)) => {
                if c.negative || c.is_zero() {
                    return Err(SequenceError::BadStride);
                }
                if c.total_months() != 0 && c.exact_seconds() != 0 {
                    return Err(SequenceError::MixedStride);
                }
            }
            _ => return Err(SequenceError::UniverseMismatch),
        }
        Ok(Self { start, stride, end, exclusions: Vec::new() })
    }

    /// A one-off sequence: exactly one point.
    pub fn once(point: CyclePoint) -> Self {
        let stride = match point.mode() {
            PointMode::Integer => CycleDuration::Steps(1),
            PointMode::DateTime => CycleDuration::Calendar(CalendarDuration {
                days: 1,
                ..CalendarDuration::default()
            }),
        };
        Self { start: point, stride, end: Some(point), exclusions: Vec::new() }
    }

    /// The deprecated `Rn/start/stop` form with `n >= 2`: n points spread
    /// evenly from start to stop, both inclusive.
    ///
    /// Warns on use: the legacy engine treated the stop bound differently,
    /// so workflows relying on this form should migrate to explicit strides.
    pub fn from_repeat(
        n: u32,
        start: CyclePoint,
        stop: CyclePoint,
    ) -> Result<Self, SequenceError> {
        if n == 1 {
            return Ok(Self::once(start));
        }
        tracing::warn!(
            n,
            start = %start,
            stop = %stop,
            "deprecated Rn/start/stop recurrence: stop-inclusive semantics \
             differ from the legacy engine; use an explicit stride instead"
        );
        let span = stop.units_since(&start).ok_or(SequenceError::UniverseMismatch)?;
        if span <= 0 {
            return Err(SequenceError::BadRepeat(n));
        }
        let unit = span / (n as i64 - 1);
        if unit <= 0 {
            return Err(SequenceError::BadRepeat(n));
        }
        let stride = match start.mode() {
            PointMode::Integer => CycleDuration::Steps(unit),
            PointMode::DateTime => CycleDuration::seconds(unit as u64),
        };
        Self::bounded(start, stride, Some(stop))
    }

    pub fn with_exclusions(mut self, exclusions: Vec<CyclePoint>) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn start(&self) -> CyclePoint {
        self.start
    }

    pub fn stride(&self) -> CycleDuration {
        self.stride
    }

    pub fn end(&self) -> Option<CyclePoint> {
        self.end
    }

    fn excluded(&self, p: &CyclePoint) -> bool {
        self.exclusions.contains(p)
    }

    /// The on-sequence point at index k (k >= 0), ignoring exclusions.
    fn point_at(&self, k: i64) -> Result<CyclePoint, PointError> {
        match self.stride {
            CycleDuration::Steps(s) => self.start.offset(&CycleDuration::Steps(
                s.checked_mul(k).ok_or(PointError::OutOfRange)?,
            )),
            CycleDuration::Calendar(c) => {
                if c.total_months() != 0 {
                    let months = (c.total_months() as i64)
                        .checked_mul(k)
                        .ok_or(PointError::OutOfRange)?;
                    let magnitude = months.unsigned_abs();
                    self.start.offset(&CycleDuration::Calendar(CalendarDuration {
                        negative: months < 0,
                        years: (magnitude / 12) as u32,
                        months: (magnitude % 12) as u32,
                        ..CalendarDuration::default()
                    }))
                } else {
                    let secs = (c.exact_seconds() as i64)
                        .checked_mul(k)
                        .ok_or(PointError::OutOfRange)?;
                    let d = CycleDuration::seconds(secs.unsigned_abs());
                    self.start.offset(&if secs < 0 { d.negated() } else { d })
                }
            }
        }
    }

    /// Index of the last on-sequence point at or before p, or -1 if p is
    /// before the start.
    fn index_at_or_before(&self, p: &CyclePoint) -> i64 {
        if *p < self.start {
            return -1;
        }
        let mut k = match self.stride {
            CycleDuration::Steps(s) => self.start.units_since(p).map(|d| -d / s).unwrap_or(0),
            CycleDuration::Calendar(c) => {
                if c.total_months() != 0 {
                    p.months_since(&self.start).unwrap_or(0) / c.total_months() as i64
                } else {
                    p.units_since(&self.start).unwrap_or(0) / c.exact_seconds() as i64
                }
            }
        };
        // Month-length clamping can leave the arithmetic guess off by one.
        while self.point_at(k + 1).map(|q| q <= *p).unwrap_or(false) {
            k += 1;
        }
        while k >= 0 && self.point_at(k).map(|q| q > *p).unwrap_or(true) {
            k -= 1;
        }
        k
    }

    /// Whether p lies on the sequence (within bounds, not excluded).
    pub fn is_on_sequence(&self, p: &CyclePoint) -> bool {
        if *p < self.start || self.end.map(|e| *p > e).unwrap_or(false) || self.excluded(p) {
            return false;
        }
        let k = self.index_at_or_before(p);
        k >= 0 && self.point_at(k).map(|q| q == *p).unwrap_or(false)
    }

    /// First valid point of the sequence.
    pub fn first(&self) -> Option<CyclePoint> {
        if self.excluded(&self.start) {
            self.next_after(&self.start)
        } else {
            Some(self.start)
        }
    }

    /// Smallest on-sequence point strictly after p.
    pub fn next_after(&self, p: &CyclePoint) -> Option<CyclePoint> {
        let mut k = self.index_at_or_before(p) + 1;
        loop {
            let q = self.point_at(k).ok()?;
            if let Some(end) = self.end {
                if q > end {
                    return None;
                }
            }
            if !self.excluded(&q) {
                return Some(q);
            }
            k += 1;
        }
    }

    /// Largest on-sequence point strictly before p.
    pub fn prev_before(&self, p: &CyclePoint) -> Option<CyclePoint> {
        let mut k = self.index_at_or_before(p);
        if self.point_at(k).map(|q| q == *p).unwrap_or(false) {
            k -= 1;
        }
        loop {
            if k < 0 {
                return None;
            }
            let q = self.point_at(k).ok()?;
            if let Some(end) = self.end {
                if q > end {
                    k -= 1;
                    continue;
                }
            }
            if !self.excluded(&q) {
                return Some(q);
            }
            k -= 1;
        }
    }
}

#[cfg(test)]
#[path = "sequence_tests.rs"]
mod tests;
