// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task instance identity.
//!
//! A task proxy is identified by its `(cycle point, task name)` pair; there
//! are no generated ids. The canonical text form is `<point>/<name>`, e.g.
//! `1/foo` or `20100101T0000Z/model`.

use crate::point::CyclePoint;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Identity of one task instance: `(name, cycle point)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId {
    pub name: String,
    pub point: CyclePoint,
}

impl TaskId {
    pub fn new(name: impl Into<String>, point: CyclePoint) -> Self {
        Self { name: name.into(), point }
    }

    /// Parse the `<point>/<name>` form.
    pub fn parse(text: &str) -> Option<Self> {
        let (point, name) = text.split_once('/')?;
        if name.is_empty() {
            return None;
        }
        let point = CyclePoint::parse_any(point).ok()?;
        Some(Self { name: name.to_string(), point })
    }

    /// Job identity string for submit number `n`: `<point>/<name>/NN`.
    pub fn job(&self, submit_num: u32) -> String {
        format!("{}/{:02}", self, submit_num)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.point, self.name)
    }
}

impl Ord for TaskId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.point.cmp(&other.point).then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for TaskId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for TaskId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TaskId::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid task id: {s:?}")))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
