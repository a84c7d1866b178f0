// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for tests in this crate and downstream crates
//! (enabled via the `test-support` feature).

use crate::id::TaskId;
use crate::point::{CyclePoint, PointMode};

/// Parse a date-time point, panicking on bad test input.
#[allow(clippy::unwrap_used)]
pub fn dt_point(text: &str) -> CyclePoint {
    CyclePoint::parse(text, PointMode::DateTime).unwrap()
}

/// Integer-point task id, the common test shape.
pub fn task_id(name: &str, point: i64) -> TaskId {
    TaskId::new(name, CyclePoint::Integer(point))
}
