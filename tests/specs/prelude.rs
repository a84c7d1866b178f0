// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness: a runtime + executor + queue wired like the daemon's
//! engine loop, ticked manually.

use gyre_adapters::JobRunner;
use gyre_core::SystemClock;
use gyre_engine::{EngineMsg, Executor, Runtime, RuntimeConfig, Scheduler};
use gyre_storage::MaterializedState;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub struct Harness<R> {
    pub runtime: Runtime<SystemClock>,
    pub executor: Executor<R>,
    pub rx: mpsc::Receiver<EngineMsg>,
    pub scheduler: Arc<Mutex<Scheduler>>,
    pub state: MaterializedState,
}

impl<R: JobRunner + 'static> Harness<R> {
    pub fn new(def_text: &str, runner: Arc<R>, root: &Path) -> Self {
        Self::new_with(def_text, runner, root, |_| {})
    }

    /// Build with a customization hook (extra xtrigger registrations and
    /// the like) applied before the executor snapshots the registry.
    pub fn new_with(
        def_text: &str,
        runner: Arc<R>,
        root: &Path,
        customize: impl FnOnce(&mut Runtime<SystemClock>),
    ) -> Self {
        let def = gyre_def::parse_str(def_text).unwrap_or_else(|e| panic!("bad def: {e}"));
        let mut runtime = Runtime::new(
            def,
            SystemClock,
            RuntimeConfig {
                job_root: root.join("log").join("job"),
                run_root: root.to_path_buf(),
            },
        );
        customize(&mut runtime);
        let scheduler = Arc::new(Mutex::new(Scheduler::new()));
        let (tx, rx) = mpsc::channel(256);
        let executor = Executor::new(
            runner,
            gyre_adapters::SubprocessPool::new(4),
            4,
            runtime.xtriggers.registry(),
            Arc::clone(&scheduler),
            tx,
        );
        Self {
            runtime,
            executor,
            rx,
            scheduler,
            state: MaterializedState::default(),
        }
    }

    fn apply(&mut self, effects: Vec<gyre_core::Effect>) {
        for effect in effects {
            if let Some(event) = self.executor.execute(effect) {
                self.state.apply_event(&event);
            }
        }
    }

    pub fn bootstrap(&mut self) {
        let effects = self.runtime.bootstrap();
        self.apply(effects);
    }

    /// One engine tick: drain the queue, fire due timers, step the pool.
    pub async fn tick(&mut self) {
        // Give spawned producers a moment to finish.
        tokio::time::sleep(Duration::from_millis(20)).await;
        while let Ok(msg) = self.rx.try_recv() {
            let effects = self.runtime.handle_msg(msg);
            self.apply(effects);
        }
        let due = self.scheduler.lock().due(Instant::now());
        for timer in due {
            let effects = self.runtime.handle_msg(EngineMsg::TimerFired(timer));
            self.apply(effects);
        }
        let pending = self.scheduler.lock().has_task_timers();
        let outcome = self.runtime.step(pending);
        self.apply(outcome.effects);
    }

    /// Run a fixed number of ticks.
    pub async fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick().await;
        }
    }

    /// Tick until the predicate holds (or panic after `max` ticks).
    pub async fn run_until(
        &mut self,
        max: usize,
        mut done: impl FnMut(&Runtime<SystemClock>, &MaterializedState) -> bool,
    ) {
        for _ in 0..max {
            self.tick().await;
            if done(&self.runtime, &self.state) {
                return;
            }
        }
        panic!(
            "condition not reached after {max} ticks; pool: {:?}",
            self.runtime
                .pool
                .iter()
                .map(|p| format!("{}={}", p.id, p.status))
                .collect::<Vec<_>>()
        );
    }

    /// The materialized state folded from everything emitted so far.
    pub fn snapshot_state(&self) -> MaterializedState {
        self.state.clone()
    }
}
