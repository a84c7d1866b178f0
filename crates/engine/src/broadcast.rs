// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcast store: operator-issued runtime overrides.
//!
//! Entries are keyed by (cycle-point pattern, namespace pattern) and
//! carry a lifespan. The effective runtime for a job is the deep merge,
//! in order of increasing specificity: flattened base -> workflow-wide
//! entries -> cycle-matched entries -> task-matched entries. Entries are
//! persisted through WAL events and restored on restart.

use crate::error::RuntimeError;
use gyre_core::event::{BroadcastLifespan, Event};
use gyre_core::point::CyclePoint;
use gyre_core::TaskId;
use gyre_def::TaskRuntime;
use gyre_storage::BroadcastRow;
use serde_json::Value;

/// Pattern matching everything.
const ANY: &str = "*";

/// Live broadcast entries, mirroring `MaterializedState::broadcasts`.
#[derive(Debug, Default, Clone)]
pub struct BroadcastStore {
    entries: Vec<BroadcastRow>,
}

impl BroadcastStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted rows on restart.
    pub fn restore(rows: Vec<BroadcastRow>) -> Self {
        Self { entries: rows }
    }

    pub fn entries(&self) -> &[BroadcastRow] {
        &self.entries
    }

    /// Record a new broadcast; returns the WAL event.
    pub fn set(
        &mut self,
        point_expr: String,
        name_expr: String,
        overrides: Value,
        lifespan: BroadcastLifespan,
    ) -> Event {
        self.entries.push(BroadcastRow {
            point_expr: point_expr.clone(),
            name_expr: name_expr.clone(),
            overrides: overrides.clone(),
            lifespan: lifespan.clone(),
        });
        Event::BroadcastSet { point_expr, name_expr, overrides, lifespan }
    }

    /// Remove entries matching the given patterns; returns WAL events.
    pub fn clear(&mut self, point_expr: &str, name_expr: &str) -> Vec<Event> {
        let mut events = Vec::new();
        self.entries.retain(|entry| {
            let matched = entry.point_expr == point_expr && entry.name_expr == name_expr;
            if matched {
                events.push(Event::BroadcastExpired {
                    point_expr: entry.point_expr.clone(),
                    name_expr: entry.name_expr.clone(),
                });
            }
            !matched
        });
        events
    }

    /// Expire until-task-completed entries for a finished proxy.
    pub fn expire_for_task(&mut self, id: &TaskId) -> Vec<Event> {
        let mut events = Vec::new();
        self.entries.retain(|entry| {
            let expired =
                matches!(&entry.lifespan, BroadcastLifespan::UntilTaskCompleted(t) if t == id);
            if expired {
                events.push(Event::BroadcastExpired {
                    point_expr: entry.point_expr.clone(),
                    name_expr: entry.name_expr.clone(),
                });
            }
            !expired
        });
        events
    }

    /// Expire until-cycle-completed entries once the oldest active point
    /// has passed their cycle.
    pub fn expire_for_cycle(&mut self, oldest_active: &CyclePoint) -> Vec<Event> {
        let mut events = Vec::new();
        self.entries.retain(|entry| {
            let expired =
                matches!(&entry.lifespan, BroadcastLifespan::UntilCycleCompleted(p) if p < oldest_active);
            if expired {
                events.push(Event::BroadcastExpired {
                    point_expr: entry.point_expr.clone(),
                    name_expr: entry.name_expr.clone(),
                });
            }
            !expired
        });
        events
    }

    /// The effective runtime for a job: base overlaid with matching
    /// entries in specificity order.
    ///
    /// `chain` is the task's inheritance chain (self first); a name
    /// pattern matching an ancestor family applies with family
    /// specificity, below an exact task match.
    pub fn effective_runtime(
        &self,
        base: &TaskRuntime,
        task: &str,
        point: &CyclePoint,
        chain: &[String],
    ) -> Result<TaskRuntime, RuntimeError> {
        let point_text = point.to_string();
        let mut merged =
            serde_json::to_value(base).map_err(|e| RuntimeError::Overlay(e.to_string()))?;

        // Specificity tiers: workflow-wide, cycle-matched, family-matched,
        // task-matched. Within a tier, arrival order.
        let tiers: [&dyn Fn(&BroadcastRow) -> bool; 4] = [
            &|e| e.point_expr == ANY && e.name_expr == ANY,
            &|e| e.point_expr == point_text && e.name_expr == ANY,
            &|e| {
                point_matches(e, &point_text)
                    && chain.iter().skip(1).any(|ns| *ns == e.name_expr)
            },
            &|e| point_matches(e, &point_text) && e.name_expr == task,
        ];
        for tier in tiers {
            for entry in self.entries.iter().filter(|e| tier(e)) {
                deep_merge(&mut merged, &entry.overrides);
            }
        }

        serde_json::from_value(merged).map_err(|e| RuntimeError::Overlay(e.to_string()))
    }
}

fn point_matches(entry: &BroadcastRow, point_text: &str) -> bool {
    entry.point_expr == ANY || entry.point_expr == point_text
}

/// Recursive JSON merge: objects merge key-wise, everything else replaces.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
