// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task pool: the live set of task proxies.
//!
//! Spawn is idempotent; removal waits for output-completeness with all
//! children spawned; the runahead boundary bounds how far ahead of the
//! oldest active cycle new proxies may appear; hold-after marks current
//! and future proxies held.

use gyre_core::event::Event;
use gyre_core::point::CyclePoint;
use gyre_core::prereq::Prerequisite;
use gyre_core::task::{TaskProxy, TaskStatus};
use gyre_core::TaskId;
use gyre_def::WorkflowDef;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct TaskPool {
    proxies: BTreeMap<TaskId, TaskProxy>,
    hold_point: Option<CyclePoint>,
    hold_all: bool,
}

impl TaskPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&TaskProxy> {
        self.proxies.get(id)
    }

    pub fn get_mut(&mut self, id: &TaskId) -> Option<&mut TaskProxy> {
        self.proxies.get_mut(id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.proxies.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskProxy> {
        self.proxies.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TaskProxy> {
        self.proxies.values_mut()
    }

    /// Identities in processing order: ascending cycle point, then
    /// topological depth within the cycle, then name.
    pub fn ordered_ids(&self, def: &WorkflowDef) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.proxies.keys().cloned().collect();
        ids.sort_by(|a, b| {
            a.point
                .cmp(&b.point)
                .then_with(|| {
                    let depth = |id: &TaskId| {
                        def.task(&id.name).map(|t| t.depth).unwrap_or(0)
                    };
                    depth(a).cmp(&depth(b))
                })
                .then_with(|| a.name.cmp(&b.name))
        });
        ids
    }

    /// Spawn a proxy. Idempotent: an existing proxy is left untouched and
    /// no event is produced (its status and history must not reset).
    pub fn spawn(&mut self, def: &WorkflowDef, id: TaskId) -> Option<Event> {
        if self.proxies.contains_key(&id) {
            return None;
        }
        if !def.is_on_any_sequence(&id.name, &id.point) {
            return None;
        }
        let prereqs: Vec<Prerequisite> = def.prereqs_for(&id.name, &id.point);
        let outputs = def.outputs_for(&id.name);
        let mut proxy = TaskProxy::new(id.clone(), prereqs, outputs);

        if let Some(task) = def.task(&id.name) {
            for label in &task.xtriggers {
                proxy.xtriggers.insert(label.clone(), false);
            }
            if let Some(offset) = &task.runtime.expire_offset {
                if let Ok(expiry) = id.point.offset(offset) {
                    proxy.expire_at = expiry.as_datetime();
                }
            }
        }

        let held = self.hold_all
            || self.hold_point.map(|p| id.point > p).unwrap_or(false);
        proxy.is_held = held;

        self.proxies.insert(id.clone(), proxy);
        Some(Event::TaskSpawned { id, is_held: held })
    }

    pub fn remove(&mut self, id: &TaskId, reason: &str) -> Option<Event> {
        self.proxies.remove(id).map(|_| Event::TaskRemoved {
            id: id.clone(),
            reason: reason.to_string(),
        })
    }

    /// Oldest cycle point among proxies still counted active (anything
    /// not succeeded or expired holds the runahead base).
    pub fn oldest_active_point(&self) -> Option<CyclePoint> {
        self.proxies
            .values()
            .filter(|p| !matches!(p.status, TaskStatus::Succeeded | TaskStatus::Expired))
            .map(|p| p.id.point)
            .min()
    }

    /// Runahead ceiling: `oldest_active + limit`, when a limit is set.
    pub fn runahead_bound(&self, def: &WorkflowDef) -> Option<CyclePoint> {
        let limit = def.scheduler.runahead_limit.as_ref()?;
        let base = self.oldest_active_point()?;
        base.offset(limit).ok()
    }

    /// May a proxy at this point be spawned under the runahead limit?
    pub fn within_runahead(&self, def: &WorkflowDef, point: &CyclePoint) -> bool {
        match self.runahead_bound(def) {
            Some(bound) => *point <= bound,
            None => true,
        }
    }

    /// Hold everything after the given point (and newly-spawned proxies
    /// past it, at spawn time).
    pub fn hold_after(&mut self, point: CyclePoint) -> Vec<Event> {
        self.hold_point = Some(point);
        let mut events = vec![Event::HoldPointSet { point: Some(point) }];
        for proxy in self.proxies.values_mut() {
            if proxy.id.point > point && !proxy.is_held {
                proxy.is_held = true;
                events.push(Event::TaskHeld { id: proxy.id.clone() });
            }
        }
        events
    }

    /// Hold the whole workflow (or specific proxies).
    pub fn hold(&mut self, tasks: &[TaskId]) -> Vec<Event> {
        let mut events = Vec::new();
        if tasks.is_empty() {
            self.hold_all = true;
            for proxy in self.proxies.values_mut() {
                if !proxy.is_held {
                    proxy.is_held = true;
                    events.push(Event::TaskHeld { id: proxy.id.clone() });
                }
            }
        } else {
            for id in tasks {
                if let Some(proxy) = self.proxies.get_mut(id) {
                    if !proxy.is_held {
                        proxy.is_held = true;
                        events.push(Event::TaskHeld { id: id.clone() });
                    }
                }
            }
        }
        events
    }

    /// Release held proxies. Releasing does not retroactively run
    /// anything; a later step may transition them.
    pub fn release(&mut self, tasks: &[TaskId], all: bool) -> Vec<Event> {
        let mut events = Vec::new();
        if all {
            self.hold_all = false;
            if self.hold_point.take().is_some() {
                events.push(Event::HoldPointSet { point: None });
            }
            for proxy in self.proxies.values_mut() {
                if proxy.is_held {
                    proxy.is_held = false;
                    events.push(Event::TaskReleased { id: proxy.id.clone() });
                }
            }
        } else {
            for id in tasks {
                if let Some(proxy) = self.proxies.get_mut(id) {
                    if proxy.is_held {
                        proxy.is_held = false;
                        events.push(Event::TaskReleased { id: id.clone() });
                    }
                }
            }
        }
        events
    }

    pub fn hold_point(&self) -> Option<CyclePoint> {
        self.hold_point
    }

    pub fn set_hold_point(&mut self, point: Option<CyclePoint>) {
        self.hold_point = point;
    }

    /// Satisfy matching prerequisite atoms across the pool. Returns the
    /// proxies whose prerequisites changed.
    pub fn satisfy_output(
        &mut self,
        upstream: &TaskId,
        output: &str,
    ) -> Vec<TaskId> {
        let mut changed = Vec::new();
        for proxy in self.proxies.values_mut() {
            let mut any = false;
            for prereq in &mut proxy.prereqs {
                if prereq.satisfy(&upstream.name, &upstream.point, output) {
                    any = true;
                }
            }
            if any {
                changed.push(proxy.id.clone());
            }
        }
        changed
    }

    /// Proxies whose satisfied suicide prerequisites call for removal.
    pub fn suicides(&self) -> Vec<TaskId> {
        self.proxies
            .values()
            .filter(|p| p.suicide_due())
            .map(|p| p.id.clone())
            .collect()
    }

    /// Output-complete proxies whose children are all spawned.
    ///
    /// A held proxy is retained even when complete; it is removed on the
    /// first step after explicit release.
    pub fn removable(&self) -> Vec<TaskId> {
        self.proxies
            .values()
            .filter(|p| p.is_removable() && !p.is_held)
            .map(|p| p.id.clone())
            .collect()
    }

    /// Incomplete terminal proxies: finished, but their completion
    /// expression is unmet. These hold the workflow and are reported.
    pub fn stuck(&self) -> Vec<TaskId> {
        self.proxies
            .values()
            .filter(|p| p.status.is_terminal() && !p.outputs.is_complete())
            .map(|p| p.id.clone())
            .collect()
    }

    /// Stall: pool non-empty but nothing can progress. A proxy waiting on
    /// an unsatisfied xtrigger is still progressable (the trigger may
    /// fire); one waiting only on suicide prerequisites is runnable and
    /// therefore progressable.
    pub fn is_stalled(&self, pending_task_timers: bool) -> bool {
        if self.proxies.is_empty() || pending_task_timers {
            return false;
        }
        !self.proxies.values().any(|p| {
            p.is_runnable()
                || matches!(
                    p.status,
                    TaskStatus::Preparing | TaskStatus::Submitted | TaskStatus::Running
                )
                || (p.status == TaskStatus::Waiting && !p.xtriggers_satisfied())
        })
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
