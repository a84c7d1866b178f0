// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer wheel for the engine loop.
//!
//! Holds every pending deadline (retry delays, poll cadences, expiry,
//! stall/inactivity). The loop sleeps until the earliest deadline and
//! folds fired timers back in as [`crate::EngineMsg::TimerFired`].

use gyre_core::TimerId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Pending timers keyed by id; re-setting an id replaces its deadline.
#[derive(Default)]
pub struct Scheduler {
    deadlines: HashMap<TimerId, Instant>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: TimerId, deadline: Instant) {
        self.deadlines.insert(id, deadline);
    }

    pub fn set_after(&mut self, id: TimerId, now: Instant, delay: Duration) {
        self.set(id, now + delay);
    }

    pub fn cancel(&mut self, id: &TimerId) {
        self.deadlines.remove(id);
    }

    pub fn contains(&self, id: &TimerId) -> bool {
        self.deadlines.contains_key(id)
    }

    /// Remove and return every timer due at `now`, soonest first.
    pub fn due(&mut self, now: Instant) -> Vec<TimerId> {
        let mut fired: Vec<(Instant, TimerId)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, deadline)| (*deadline, id.clone()))
            .collect();
        fired.sort_by_key(|(deadline, _)| *deadline);
        for (_, id) in &fired {
            self.deadlines.remove(id);
        }
        fired.into_iter().map(|(_, id)| id).collect()
    }

    /// Earliest pending deadline, for the loop's sleep.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    /// Any armed timer that belongs to a task (retry, poll, expiry)?
    /// Stall detection treats those as pending progress.
    pub fn has_task_timers(&self) -> bool {
        self.deadlines
            .keys()
            .any(|id| id.kind().map(|k| k.task().is_some()).unwrap_or(false))
    }

    /// Cancel every timer belonging to a task (on removal).
    pub fn cancel_task(&mut self, task: &gyre_core::TaskId) {
        self.deadlines
            .retain(|id, _| id.kind().and_then(|k| k.task().cloned()).as_ref() != Some(task));
    }
}
