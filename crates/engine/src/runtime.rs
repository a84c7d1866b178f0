// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runtime: single owner of all scheduling state.
//!
//! Exactly one engine loop drives a `Runtime`. Every mutation flows
//! through [`Runtime::step`], [`Runtime::handle_msg`] (router.rs), or
//! [`Runtime::handle_command`]; each returns effects, and every state
//! change is mirrored by an `Emit` effect for the WAL.

use crate::broadcast::BroadcastStore;
use crate::error::RuntimeError;
use crate::jobs::JobManager;
use crate::msg::{OperatorCommand, StopMode};
use crate::pool::TaskPool;
use crate::xtrigger::XtriggerEngine;
use gyre_core::effect::{Effect, JobSpec};
use gyre_core::event::Event;
use gyre_core::outputs::OUTPUT_SUCCEEDED;
use gyre_core::point::CyclePoint;
use gyre_core::task::TaskStatus;
use gyre_core::{Clock, TaskId, TimerId};
use gyre_def::WorkflowDef;
use gyre_storage::MaterializedState;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Cooldown applied to a platform after a transport-level failure before
/// its retained batch is retried.
const PLATFORM_COOLDOWN: Duration = Duration::from_secs(60);

/// Accepted verbosity levels for `set-verbosity`.
pub const VERBOSITY_LEVELS: [&str; 4] = ["DEBUG", "INFO", "WARNING", "ERROR"];

pub struct RuntimeConfig {
    /// Job log root: `log/job`.
    pub job_root: PathBuf,
    /// Root holding all workflow run dirs (for `workflow_state`).
    pub run_root: PathBuf,
}

/// Result of one pool step.
pub struct StepOutcome {
    pub effects: Vec<Effect>,
    /// Pool non-empty but nothing can progress.
    pub stalled: bool,
}

#[derive(Debug)]
pub struct Runtime<C: Clock> {
    def: Arc<WorkflowDef>,
    pub pool: TaskPool,
    pub broadcasts: BroadcastStore,
    pub xtriggers: XtriggerEngine,
    pub jobs: JobManager,
    pub(crate) clock: C,
    /// Highest point ever spawned per task; blocks respawn of removed
    /// proxies and drives parentless spawning.
    pub(crate) frontier: HashMap<String, CyclePoint>,
    /// Outputs completed by proxies (including removed ones), for
    /// satisfying prerequisites of late-spawned children. Pruned behind
    /// the oldest active point.
    pub(crate) completed_outputs: HashMap<TaskId, HashSet<String>>,
    /// Tasks whose execution-time-limit deadline poll has fired.
    pub(crate) overdue: HashSet<TaskId>,
    /// Platforms in transport-failure cooldown until the timer clears.
    pub(crate) platform_cooldown: HashSet<String>,
    pub(crate) paused: bool,
    pub(crate) stopping: Option<StopMode>,
}

impl<C: Clock + 'static> Runtime<C> {
    pub fn new(def: WorkflowDef, clock: C, config: RuntimeConfig) -> Self {
        let max_batch = def.scheduler.max_batch_size;
        let xtriggers =
            XtriggerEngine::with_builtins(clock.clone(), config.run_root.clone());
        Self {
            def: Arc::new(def),
            pool: TaskPool::new(),
            broadcasts: BroadcastStore::new(),
            xtriggers,
            jobs: JobManager::new(config.job_root, max_batch),
            clock,
            frontier: HashMap::new(),
            completed_outputs: HashMap::new(),
            overdue: HashSet::new(),
            platform_cooldown: HashSet::new(),
            paused: false,
            stopping: None,
        }
    }

    pub fn def(&self) -> Arc<WorkflowDef> {
        Arc::clone(&self.def)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn stopping(&self) -> Option<StopMode> {
        self.stopping
    }

    /// Swap in a reloaded definition at a tick boundary. Existing proxies
    /// keep their spawned prerequisites; already-submitted jobs embedded
    /// their runtime at submit time.
    pub fn swap_def(&mut self, def: WorkflowDef) {
        self.def = Arc::new(def);
    }

    /// Cold start: spawn the initial cycle.
    pub fn bootstrap(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        for id in self.def().initial_tasks() {
            self.spawn_proxy(&id, &mut effects);
        }
        effects
    }

    /// Restart: rebuild the pool from the materialized state. The caller
    /// has already vacated open job records; `repoll` lists instances
    /// needing a poll to re-establish their status.
    pub fn restore(&mut self, state: &MaterializedState, repoll: &[TaskId]) -> Vec<Effect> {
        let def = self.def();
        let mut effects = Vec::new();

        self.paused = state.is_paused();
        self.broadcasts = BroadcastStore::restore(state.broadcasts.clone());
        self.xtriggers
            .restore_cache(state.xtriggers.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(point) = state
            .params
            .get(gyre_storage::PARAM_HOLD_POINT)
            .and_then(|t| CyclePoint::parse_any(t).ok())
        {
            self.pool.set_hold_point(Some(point));
        }

        // Completed outputs survive pool removal through task_events.
        for row in &state.events {
            if let Some(output) = row.event.strip_prefix("output:") {
                self.completed_outputs
                    .entry(row.id.clone())
                    .or_default()
                    .insert(output.to_string());
            }
        }
        for (id, row) in &state.states {
            self.note_frontier(id);
            if row.status == TaskStatus::Succeeded {
                self.completed_outputs
                    .entry(id.clone())
                    .or_default()
                    .insert(OUTPUT_SUCCEEDED.to_string());
            }
        }

        for (id, row) in &state.pool {
            self.pool.spawn(&def, id.clone());
            self.note_frontier(id);
            if let Some(proxy) = self.pool.get_mut(id) {
                proxy.force_status(row.status);
                proxy.is_held = row.is_held;
                proxy.children_spawned = row.children_spawned;
                proxy.jobs = state.jobs_for(id).to_vec();
                proxy.submit_tries = proxy
                    .jobs
                    .iter()
                    .filter(|j| j.submit_exit.map(|c| c != 0).unwrap_or(false))
                    .count() as u32;
                proxy.exec_tries = proxy
                    .jobs
                    .iter()
                    .filter(|j| {
                        matches!(
                            j.run_exit,
                            Some(exit) if exit != gyre_core::ExitClass::Succeeded
                                && exit != gyre_core::ExitClass::Vacated
                        )
                    })
                    .count() as u32;
                for output in self.completed_outputs.get(id).into_iter().flatten() {
                    proxy.outputs.complete(output);
                }
            }
        }

        // Re-satisfy prerequisites from recorded outputs and the
        // xtrigger cache.
        let satisfied: Vec<(TaskId, Vec<String>)> = self
            .completed_outputs
            .iter()
            .map(|(id, outs)| (id.clone(), outs.iter().cloned().collect()))
            .collect();
        for (upstream, outputs) in satisfied {
            for output in outputs {
                self.pool.satisfy_output(&upstream, &output);
            }
        }
        self.resatisfy_xtriggers();

        for id in repoll {
            if let Some(proxy) = self.pool.get(id) {
                if let Some(job_ref) = self.jobs.job_ref(proxy) {
                    effects.push(Effect::PollJobs {
                        platform: job_ref.platform.clone(),
                        jobs: vec![job_ref],
                    });
                }
            }
        }
        effects
    }

    /// Mark xtrigger labels satisfied wherever the resolved signature is
    /// already in the result cache.
    pub(crate) fn resatisfy_xtriggers(&mut self) {
        let def = self.def();
        let mut hits: Vec<(TaskId, String)> = Vec::new();
        for proxy in self.pool.iter() {
            for (label, satisfied) in &proxy.xtriggers {
                if *satisfied {
                    continue;
                }
                if let Some(xdef) = def.xtriggers.get(label) {
                    if self.xtriggers.cached(&xdef.signature(&proxy.id.point)).is_some() {
                        hits.push((proxy.id.clone(), label.clone()));
                    }
                }
            }
        }
        for (id, label) in hits {
            if let Some(proxy) = self.pool.get_mut(&id) {
                proxy.satisfy_xtrigger(&label);
            }
        }
    }

    /// One pool step: evaluate due xtriggers, hand runnable proxies to
    /// the job manager, spawn ahead, remove the finished, detect stall.
    /// Operator commands are applied by the loop before calling this.
    /// `pending_task_timers` reports whether any per-task timer (retry,
    /// poll, expiry) is still armed.
    pub fn step(&mut self, pending_task_timers: bool) -> StepOutcome {
        let def = self.def();
        let mut effects = Vec::new();

        // Evaluate xtriggers due this tick.
        let waiting: Vec<TaskId> = self
            .pool
            .ordered_ids(&def)
            .into_iter()
            .filter(|id| {
                self.pool
                    .get(id)
                    .map(|p| p.status == TaskStatus::Waiting && !p.xtriggers_satisfied())
                    .unwrap_or(false)
            })
            .collect();
        for id in waiting {
            if let Some(proxy) = self.pool.get(&id) {
                effects.extend(self.xtriggers.due_effects(&def, proxy));
            }
        }

        // Hand newly-runnable proxies to the job manager.
        if !self.paused && self.stopping.is_none() {
            let mut specs: Vec<JobSpec> = Vec::new();
            for id in self.pool.ordered_ids(&def) {
                let runnable = self
                    .pool
                    .get(&id)
                    .map(|p| p.is_runnable())
                    .unwrap_or(false);
                if !runnable {
                    continue;
                }
                let platform_cooling = {
                    let runtime = self.jobs.effective_runtime(&def, &self.broadcasts, &id);
                    match &runtime {
                        Ok(rt) => self.platform_cooldown.contains(&rt.platform),
                        Err(_) => false,
                    }
                };
                if platform_cooling {
                    continue;
                }
                if let Some(proxy) = self.pool.get_mut(&id) {
                    if proxy.set_status(TaskStatus::Preparing).is_err() {
                        continue;
                    }
                }
                effects.push(self.status_event(&id, TaskStatus::Preparing));
                let spec = {
                    let Some(proxy) = self.pool.get_mut(&id) else { continue };
                    self.jobs.prepare_job(&def, &self.broadcasts, proxy)
                };
                match spec {
                    Ok(spec) => specs.push(spec),
                    Err(e) => {
                        tracing::warn!(task = %id, error = %e, "job preparation failed");
                        effects.extend(self.job_submit_failed(&id));
                    }
                }
            }
            for (platform, batch) in
                self.jobs.batches("jobs-submit", specs, |s| s.platform.as_str())
            {
                effects.push(Effect::SubmitJobs { platform, jobs: batch });
            }
        }

        // Spawn parentless instances ahead, subject to runahead.
        self.spawn_parentless(&mut effects);
        // Retry child spawning deferred by the runahead limit.
        self.retry_deferred_children(&mut effects);

        // Remove finished proxies (suicides first, then completed).
        for id in self.pool.suicides() {
            if let Some(event) = self.pool.remove(&id, "suicide") {
                effects.push(Effect::Emit { event });
            }
        }
        for id in self.pool.removable() {
            if let Some(event) = self.pool.remove(&id, "completed") {
                effects.push(Effect::Emit { event });
            }
        }

        // Housekeeping: cycle-scoped broadcast expiry, output-memory
        // pruning, stuck-task reporting.
        if let Some(oldest) = self.pool.oldest_active_point() {
            for event in self.broadcasts.expire_for_cycle(&oldest) {
                effects.push(Effect::Emit { event });
            }
        }
        // Output memory is only needed while something older could still
        // spawn a consumer: a finished proxy stays pooled until its
        // children exist, so the pool minimum bounds what to keep.
        if let Some(pool_min) = self.pool.iter().map(|p| p.id.point).min() {
            self.completed_outputs.retain(|id, _| id.point >= pool_min);
        }
        for id in self.pool.stuck() {
            if let Some(proxy) = self.pool.get(&id) {
                tracing::warn!(
                    task = %id,
                    missing = ?proxy.outputs.missing_for_completion(),
                    "incomplete task retained in pool"
                );
            }
        }

        let stalled = self.pool.is_stalled(pending_task_timers);
        StepOutcome { effects, stalled }
    }

    /// Apply an operator command at the top of a tick.
    pub fn handle_command(
        &mut self,
        command: OperatorCommand,
    ) -> Result<Vec<Effect>, RuntimeError> {
        let mut effects = Vec::new();
        match command {
            OperatorCommand::Hold { tasks, after } => {
                let events = match after {
                    Some(point) => self.pool.hold_after(point),
                    None => self.pool.hold(&tasks),
                };
                effects.extend(events.into_iter().map(|event| Effect::Emit { event }));
            }
            OperatorCommand::Release { tasks, all } => {
                let events = self.pool.release(&tasks, all);
                effects.extend(events.into_iter().map(|event| Effect::Emit { event }));
            }
            OperatorCommand::Trigger { tasks } => {
                for id in tasks {
                    self.spawn_proxy_unbounded(&id, &mut effects);
                    if let Some(proxy) = self.pool.get_mut(&id) {
                        for prereq in &mut proxy.prereqs {
                            prereq.force_satisfy();
                        }
                        for (_, satisfied) in proxy.xtriggers.iter_mut() {
                            *satisfied = true;
                        }
                    }
                }
            }
            OperatorCommand::Insert { tasks } => {
                for id in tasks {
                    self.spawn_proxy_unbounded(&id, &mut effects);
                }
            }
            OperatorCommand::Remove { tasks } => {
                for id in tasks {
                    if let Some(event) = self.pool.remove(&id, "removed by operator") {
                        effects.push(Effect::Emit { event });
                    }
                }
            }
            OperatorCommand::Reset { tasks, status } => {
                for id in tasks {
                    let Some(proxy) = self.pool.get_mut(&id) else {
                        return Err(RuntimeError::TaskNotFound(id));
                    };
                    proxy.force_status(status);
                    if status == TaskStatus::Waiting {
                        for prereq in &mut proxy.prereqs {
                            prereq.reset();
                        }
                    }
                    effects.push(self.status_event(&id, status));
                }
            }
            OperatorCommand::SetVerbosity { level } => {
                if !VERBOSITY_LEVELS.contains(&level.as_str()) {
                    return Err(RuntimeError::IllegalVerbosity(level));
                }
                effects.push(Effect::Emit { event: Event::VerbositySet { level } });
            }
            OperatorCommand::Broadcast { point_expr, name_expr, overrides } => {
                let event = self.broadcasts.set(
                    point_expr,
                    name_expr,
                    overrides,
                    gyre_core::event::BroadcastLifespan::Permanent,
                );
                effects.push(Effect::Emit { event });
            }
            OperatorCommand::ClearBroadcast { point_expr, name_expr } => {
                for event in self.broadcasts.clear(&point_expr, &name_expr) {
                    effects.push(Effect::Emit { event });
                }
            }
            OperatorCommand::Pause => {
                if !self.paused {
                    self.paused = true;
                    effects.push(Effect::Emit { event: Event::Paused });
                }
            }
            OperatorCommand::Resume => {
                if self.paused {
                    self.paused = false;
                    effects.push(Effect::Emit { event: Event::Resumed });
                }
            }
            OperatorCommand::Stop { mode } => {
                self.stopping = Some(mode);
                if mode == StopMode::Kill {
                    effects.extend(self.kill_active_jobs());
                }
            }
            // Reload is coordinated by the daemon (validate, checkpoint,
            // swap); nothing to do at this layer.
            OperatorCommand::Reload => {}
        }
        Ok(effects)
    }

    /// Kill batches for every job currently submitted or running.
    pub fn kill_active_jobs(&mut self) -> Vec<Effect> {
        let refs: Vec<_> = self
            .pool
            .iter()
            .filter(|p| {
                matches!(p.status, TaskStatus::Submitted | TaskStatus::Running)
            })
            .filter_map(|p| self.jobs.job_ref(p))
            .collect();
        self.jobs
            .batches("jobs-kill", refs, |r| r.platform.as_str())
            .into_iter()
            .map(|(platform, jobs)| Effect::KillJobs { platform, jobs })
            .collect()
    }

    /// Jobs that would be orphaned by an immediate shutdown.
    pub fn active_jobs(&self) -> Vec<TaskId> {
        self.pool
            .iter()
            .filter(|p| {
                matches!(p.status, TaskStatus::Submitted | TaskStatus::Running)
            })
            .map(|p| p.id.clone())
            .collect()
    }

    // ---- spawning ----

    pub(crate) fn note_frontier(&mut self, id: &TaskId) {
        let entry = self
            .frontier
            .entry(id.name.clone())
            .or_insert(id.point);
        if id.point > *entry {
            *entry = id.point;
        }
    }

    pub(crate) fn spawned_ever(&self, id: &TaskId) -> bool {
        self.pool.contains(id)
            || self
                .frontier
                .get(&id.name)
                .map(|max| id.point <= *max)
                .unwrap_or(false)
    }

    /// Spawn within the runahead limit. Idempotent.
    pub(crate) fn spawn_proxy(&mut self, id: &TaskId, effects: &mut Vec<Effect>) -> bool {
        if self.pool.contains(id) {
            return true;
        }
        let def = self.def();
        if !self.pool.within_runahead(&def, &id.point) {
            return false;
        }
        self.spawn_proxy_unbounded(id, effects)
    }

    /// Spawn bypassing runahead (operator insert/trigger).
    pub(crate) fn spawn_proxy_unbounded(
        &mut self,
        id: &TaskId,
        effects: &mut Vec<Effect>,
    ) -> bool {
        let def = self.def();
        let Some(event) = self.pool.spawn(&def, id.clone()) else {
            return self.pool.contains(id);
        };
        self.note_frontier(id);
        effects.push(Effect::Emit { event });

        // Backfill satisfaction from already-completed upstream outputs
        // and cached xtrigger results.
        let completed = self.completed_outputs.clone();
        if let Some(proxy) = self.pool.get_mut(id) {
            for prereq in &mut proxy.prereqs {
                let atoms: Vec<_> = prereq
                    .atoms()
                    .iter()
                    .map(|a| (a.upstream_id(), a.output.clone()))
                    .collect();
                for (upstream, output) in atoms {
                    if completed
                        .get(&upstream)
                        .map(|outs| outs.contains(&output))
                        .unwrap_or(false)
                    {
                        prereq.satisfy(&upstream.name, &upstream.point, &output);
                    }
                }
            }
        }
        self.resatisfy_xtriggers();

        // Arm the expiry timer when the task declares an offset.
        if let Some(expire_at) = self.pool.get(id).and_then(|p| p.expire_at) {
            let now = self.clock.utc_now();
            let delay = (expire_at - now).to_std().unwrap_or(Duration::ZERO);
            effects.push(Effect::SetTimer { id: TimerId::expiry(id), duration: delay });
        }
        true
    }

    /// Spawn parentless instances ahead: an instance with no prerequisites
    /// at its point is not waiting on anything and runs on its own
    /// sequence, bounded by the runahead limit (or a default ahead window
    /// when none is configured). A task gated by a sequential xtrigger
    /// only spawns its next instance once the previous one has succeeded
    /// (or is gone, i.e. completed).
    pub(crate) fn spawn_parentless(&mut self, effects: &mut Vec<Effect>) {
        // Ahead window applied when no explicit runahead limit is set.
        const DEFAULT_AHEAD: usize = 5;

        let def = self.def();
        let names: Vec<String> = def.tasks.keys().cloned().collect();
        for name in names {
            let sequential = def
                .task(&name)
                .map(|t| t.xtriggers.iter().any(|l| def.xtrigger_sequential(l)))
                .unwrap_or(false);
            loop {
                let next = match self.frontier.get(&name) {
                    Some(point) => def.next_point(&name, point),
                    None => def
                        .task(&name)
                        .and_then(|t| t.sequences.iter().filter_map(|s| s.first()).min()),
                };
                let Some(point) = next else { break };
                if !def.prereqs_for(&name, &point).is_empty() {
                    break; // spawned on demand by its upstreams
                }
                if def.scheduler.runahead_limit.is_none() {
                    let ahead = self
                        .pool
                        .iter()
                        .filter(|p| p.id.name == name && !p.status.is_terminal())
                        .count();
                    if ahead >= DEFAULT_AHEAD {
                        break;
                    }
                }
                let id = TaskId::new(name.clone(), point);
                if sequential {
                    // Gate on the previous instance's fate.
                    let prev_open = self.pool.iter().any(|p| {
                        p.id.name == name
                            && p.id.point < point
                            && p.status != TaskStatus::Succeeded
                    });
                    if prev_open {
                        break;
                    }
                }
                if !self.spawn_proxy(&id, effects) {
                    break; // runahead bound
                }
            }
        }
    }

    /// Proxies done-but-blocked: their children could not spawn under the
    /// runahead limit at completion time. Retry now.
    pub(crate) fn retry_deferred_children(&mut self, effects: &mut Vec<Effect>) {
        let def = self.def();
        let deferred: Vec<TaskId> = self
            .pool
            .iter()
            .filter(|p| p.status.is_terminal() && !p.children_spawned)
            .map(|p| p.id.clone())
            .collect();
        for id in deferred {
            let outputs: Vec<String> = self
                .pool
                .get(&id)
                .map(|p| p.outputs.completed().map(str::to_string).collect())
                .unwrap_or_default();
            let mut all = true;
            for output in &outputs {
                for child in def.children_of(&id.name, &id.point, output) {
                    if self.spawned_ever(&child) {
                        continue;
                    }
                    if !self.spawn_proxy(&child, effects) {
                        all = false;
                    }
                }
            }
            if all {
                if let Some(proxy) = self.pool.get_mut(&id) {
                    proxy.children_spawned = true;
                }
            }
        }
    }

    pub(crate) fn status_event(&self, id: &TaskId, status: TaskStatus) -> Effect {
        Effect::Emit {
            event: Event::TaskStatusChanged {
                id: id.clone(),
                status,
                time: self.clock.timestamp(),
            },
        }
    }

    pub(crate) fn platform_cooldown_timer(&mut self, platform: &str) -> Vec<Effect> {
        self.platform_cooldown.insert(platform.to_string());
        vec![Effect::SetTimer {
            id: TimerId::new(format!("platform-cooldown:{platform}")),
            duration: PLATFORM_COOLDOWN,
        }]
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
