// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler main loop.
//!
//! One cooperative loop owns all state mutation. Each tick: drain the
//! message queue, run the pool step, fire due timers, flush persistence,
//! then sleep until the next deadline — interruptible by a message or a
//! signal. Two bounded worker pools (subprocesses and xtriggers, inside
//! the executor) run beside the loop and feed results back through the
//! queue.

use crate::config::Config;
use crate::lifecycle::{remove_contact, DaemonState, StartupResult};
use crate::listener::{self, QueryView};
use crate::logging::LogHandle;
use gyre_adapters::{BackgroundRunner, SubprocessPool};
use gyre_core::{Effect, Event, TimerId, TimerKind};
use gyre_engine::{EngineMsg, Executor, OperatorCommand, Scheduler, StopMode};
use gyre_storage::{Checkpointer, MaterializedState, Snapshot, Wal};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UnixListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Ticks between rolling "latest" checkpoints.
const CHECKPOINT_EVERY: u64 = 30;
/// Queue depth for the multi-producer/single-consumer message queue.
const QUEUE_DEPTH: usize = 1024;

/// Why the loop ended, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Clean shutdown (workflow finished or operator stop): exit 0.
    Clean,
    /// Aborted on stall/inactivity policy: exit 1.
    Aborted,
    /// Unrecoverable internal error: exit 2.
    Fatal,
}

impl LoopExit {
    pub fn code(&self) -> i32 {
        match self {
            LoopExit::Clean => 0,
            LoopExit::Aborted => 1,
            LoopExit::Fatal => 2,
        }
    }
}

struct Tick {
    wal: Wal,
    state: Arc<Mutex<MaterializedState>>,
    progressed: bool,
    fatal: bool,
}

impl Tick {
    /// Append one event and fold it into the materialized state. All of
    /// a tick's appends commit together at the tick's flush.
    fn persist(&mut self, event: &Event) {
        match self.wal.append(event) {
            Ok(seq) => {
                self.wal.mark_processed(seq);
                self.state.lock().apply_event(event);
                self.progressed = true;
            }
            Err(e) => {
                error!(error = %e, "wal append failed");
                self.fatal = true;
            }
        }
    }
}

pub async fn run(startup: StartupResult, log_handle: Option<LogHandle>) -> LoopExit {
    let StartupResult { daemon, initial_effects } = startup;
    let DaemonState { config, lock_file, contact, mut runtime, state, wal, restarted } =
        daemon;
    let _lock = lock_file;
    let def = runtime.def();

    let pool_size = def.scheduler.process_pool_size.unwrap_or_else(|| {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
    });
    let subprocesses = SubprocessPool::new(pool_size);
    let scheduler = Arc::new(Mutex::new(Scheduler::new()));
    let (tx, mut rx) = mpsc::channel::<EngineMsg>(QUEUE_DEPTH);
    let executor = Executor::new(
        Arc::new(BackgroundRunner::new()),
        subprocesses.clone(),
        pool_size,
        runtime.xtriggers.registry(),
        Arc::clone(&scheduler),
        tx.clone(),
    );

    // Listener task: queries answered from the shared view, commands and
    // job messages enqueued for the loop.
    let view = Arc::new(Mutex::new(QueryView::default()));
    let _ = std::fs::remove_file(&config.socket_path);
    let listener = match UnixListener::bind(&config.socket_path) {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "cannot bind command socket");
            remove_contact(&config);
            return LoopExit::Fatal;
        }
    };
    let listener_task =
        tokio::spawn(listener::serve(listener, tx.clone(), Arc::clone(&view)));

    let (mut sigint, mut sigterm, mut sighup) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) {
        (Ok(a), Ok(b), Ok(c)) => (a, b, c),
        _ => {
            error!("cannot install signal handlers");
            remove_contact(&config);
            return LoopExit::Fatal;
        }
    };

    let checkpoints = Checkpointer::new(&config.checkpoints_dir);
    let mut tick = Tick { wal, state, progressed: false, fatal: false };
    let mut tick_count: u64 = 0;
    let mut stall_armed = false;
    let mut exit = LoopExit::Clean;

    info!(
        workflow = def.name.as_str(),
        restarted,
        host = contact.host.as_str(),
        "scheduler running"
    );
    run_workflow_handlers(&def, &subprocesses, "startup");
    if let Some(timeout) = def.scheduler.inactivity_timeout {
        scheduler.lock().set_after(TimerId::inactivity(), Instant::now(), timeout);
    }

    // Effects from bootstrap/restore run as the zeroth tick; messages
    // arriving mid-sleep carry over to the next drain.
    let mut pending_effects: Vec<Effect> = initial_effects;
    let mut pending_msgs: Vec<EngineMsg> = Vec::new();

    'main: loop {
        tick.progressed = false;

        // Apply carried-over effects.
        for effect in pending_effects.drain(..) {
            if let Some(event) = executor.execute(effect) {
                tick.persist(&event);
            }
        }

        // Drain the queue: operator commands and producer results.
        let mut msgs = std::mem::take(&mut pending_msgs);
        while let Ok(msg) = rx.try_recv() {
            msgs.push(msg);
        }
        for msg in msgs {
            let effects = match msg {
                EngineMsg::Command(OperatorCommand::Reload) => handle_reload(
                    &config,
                    &mut runtime,
                    &checkpoints,
                    &tick.state,
                    &tick.wal,
                ),
                EngineMsg::Command(OperatorCommand::SetVerbosity { level }) => {
                    if let Some(handle) = &log_handle {
                        if let Err(e) = handle.set_verbosity(&level) {
                            warn!("{e}");
                            continue;
                        }
                    }
                    runtime.handle_msg(EngineMsg::Command(
                        OperatorCommand::SetVerbosity { level },
                    ))
                }
                other => runtime.handle_msg(other),
            };
            for effect in effects {
                if let Some(event) = executor.execute(effect) {
                    tick.persist(&event);
                }
            }
        }

        // Fire due timers. Workflow timers are decided here; task timers
        // route back through the runtime.
        let due = scheduler.lock().due(Instant::now());
        for timer in due {
            match timer.kind() {
                Some(TimerKind::Stall) => {
                    run_workflow_handlers(&def, &subprocesses, "stall");
                    if def.scheduler.abort_on_stall {
                        error!("Workflow shutting down - AUTOMATIC(ON-STALL)");
                        run_workflow_handlers(&def, &subprocesses, "abort");
                        exit = LoopExit::Aborted;
                        break 'main;
                    }
                    warn!("workflow stalled");
                }
                Some(TimerKind::Inactivity) => {
                    run_workflow_handlers(&def, &subprocesses, "inactivity");
                    if def.scheduler.abort_on_inactivity {
                        error!("Workflow shutting down - AUTOMATIC(ON-INACTIVITY)");
                        run_workflow_handlers(&def, &subprocesses, "abort");
                        exit = LoopExit::Aborted;
                        break 'main;
                    }
                    warn!("workflow inactive");
                }
                _ => {
                    for effect in runtime.handle_msg(EngineMsg::TimerFired(timer)) {
                        if let Some(event) = executor.execute(effect) {
                            tick.persist(&event);
                        }
                    }
                }
            }
        }

        // The pool step.
        let pending_task_timers = scheduler.lock().has_task_timers();
        let outcome = runtime.step(pending_task_timers);
        for effect in outcome.effects {
            if let Some(event) = executor.execute(effect) {
                tick.persist(&event);
            }
        }
        if tick.fatal {
            exit = LoopExit::Fatal;
            break 'main;
        }

        // Stall timer management.
        if outcome.stalled && !stall_armed {
            warn!("no further progress possible: stall timer armed");
            stall_armed = true;
            let delay = def.scheduler.stall_timeout.unwrap_or(Duration::ZERO);
            scheduler.lock().set_after(TimerId::stall(), Instant::now(), delay);
        } else if !outcome.stalled && stall_armed {
            stall_armed = false;
            scheduler.lock().cancel(&TimerId::stall());
        }

        // Inactivity timer resets on any state change.
        if tick.progressed {
            if let Some(timeout) = def.scheduler.inactivity_timeout {
                scheduler
                    .lock()
                    .set_after(TimerId::inactivity(), Instant::now(), timeout);
            }
        }

        // Stop handling.
        if let Some(mode) = runtime.stopping() {
            let active = runtime.active_jobs();
            match mode {
                StopMode::NowNow => {
                    if !active.is_empty() {
                        let list: Vec<String> =
                            active.iter().map(ToString::to_string).collect();
                        warn!("Orphaned tasks: {}", list.join(", "));
                    }
                    break 'main;
                }
                StopMode::Request | StopMode::Now | StopMode::Kill => {
                    if active.is_empty() {
                        break 'main;
                    }
                }
            }
        }

        // Workflow complete: the pool drained itself.
        if runtime.pool.is_empty() && runtime.stopping().is_none() {
            info!("workflow complete");
            break 'main;
        }

        // Persistence: one flush per tick commits the tick's mutations.
        if let Err(e) = tick.wal.flush() {
            error!(error = %e, "wal flush failed");
            exit = LoopExit::Fatal;
            break 'main;
        }
        tick_count += 1;
        if tick_count % CHECKPOINT_EVERY == 0 {
            let snapshot =
                Snapshot::new(tick.state.lock().clone(), tick.wal.processed_seq());
            if let Err(e) = checkpoints.save_latest(&snapshot) {
                warn!(error = %e, "checkpoint save failed");
            }
        }

        // Refresh the listener's read view.
        listener::refresh_view(&view, &runtime, &contact, &tick.state);

        // Sleep until the next deadline, a message, or a signal.
        let next_timer = scheduler.lock().next_deadline();
        let tick_deadline = Instant::now() + Duration::from_secs(1);
        let deadline = next_timer.map_or(tick_deadline, |t| t.min(tick_deadline));
        tokio::select! {
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {}
            msg = rx.recv() => {
                if let Some(msg) = msg {
                    pending_msgs.push(msg);
                }
            }
            _ = sigint.recv() => {
                info!("caught SIGINT: shutdown by REQUEST(NOW)");
                pending_msgs.push(EngineMsg::Command(OperatorCommand::Stop {
                    mode: StopMode::Now,
                }));
            }
            _ = sigterm.recv() => {
                info!("caught SIGTERM: shutdown by REQUEST(NOW)");
                pending_msgs.push(EngineMsg::Command(OperatorCommand::Stop {
                    mode: StopMode::Now,
                }));
            }
            _ = sighup.recv() => {
                info!("caught SIGHUP: shutdown by REQUEST(NOW-NOW)");
                pending_msgs.push(EngineMsg::Command(OperatorCommand::Stop {
                    mode: StopMode::NowNow,
                }));
            }
        }
    }

    // Shutdown: persist the reason, final checkpoint, handlers, contact.
    let reason = runtime
        .stopping()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "AUTOMATIC".to_string());
    for effect in checkpoint_now(&checkpoints, &tick.state, &tick.wal, "shutdown") {
        if let Some(event) = executor.execute(effect) {
            tick.persist(&event);
        }
    }
    tick.persist(&Event::Shutdown { reason: reason.clone() });
    let _ = tick.wal.flush();
    let snapshot = Snapshot::new(tick.state.lock().clone(), tick.wal.processed_seq());
    if let Err(e) = checkpoints.save_latest(&snapshot) {
        warn!(error = %e, "final checkpoint failed");
    }
    run_workflow_handlers(&def, &subprocesses, "shutdown");
    listener_task.abort();
    let _ = std::fs::remove_file(&config.socket_path);
    remove_contact(&config);
    info!(reason = reason.as_str(), code = exit.code(), "scheduler stopped");
    exit
}

/// Launch workflow-level event handlers (startup, shutdown, stall,
/// inactivity, abort) on the subprocess pool, detached.
fn run_workflow_handlers(
    def: &gyre_def::WorkflowDef,
    pool: &SubprocessPool,
    event: &str,
) {
    let timeout = def.scheduler.process_pool_timeout;
    for (index, handler) in def.scheduler.handlers.iter().enumerate() {
        if !handler.events.iter().any(|e| e == event) {
            continue;
        }
        let command = format!("{} {} {}", handler.command, event, def.name);
        let pool = pool.clone();
        let key = format!("workflow-handler-{index:02}");
        let event = event.to_string();
        tokio::spawn(async move {
            let outcome = pool.run(&command, timeout).await;
            if outcome.ret_code == 0 {
                info!("[('{key}', '{event}') ret_code] 0");
            } else {
                error!("[('{key}', '{event}') ret_code] {}", outcome.ret_code);
            }
        });
    }
}

/// Reload: re-read and validate the definition, checkpoint, then swap at
/// this tick boundary. Failure changes nothing.
fn handle_reload(
    config: &Config,
    runtime: &mut crate::lifecycle::SchedulerRuntime,
    checkpoints: &Checkpointer,
    state: &Arc<Mutex<MaterializedState>>,
    wal: &Wal,
) -> Vec<Effect> {
    match gyre_def::load_file(&config.flow_path) {
        Ok(def) => {
            let checkpoint = checkpoint_now(checkpoints, state, wal, "reload-init");
            let hash = gyre_def::definition_hash(&def).unwrap_or_default();
            runtime.swap_def(def);
            info!("Command succeeded: reload_suite");
            let mut effects = vec![Effect::Emit { event: Event::Reloaded { hash } }];
            effects.extend(checkpoint);
            effects
        }
        Err(e) => {
            error!(error = %e, "Command failed: reload_suite");
            Vec::new()
        }
    }
}

/// Write a numbered checkpoint of the current state; returns the event
/// recording it (id 0 stays reserved for the rolling "latest").
fn checkpoint_now(
    checkpoints: &Checkpointer,
    state: &Arc<Mutex<MaterializedState>>,
    wal: &Wal,
    name: &str,
) -> Vec<Effect> {
    let (snapshot, id) = {
        let guard = state.lock();
        (Snapshot::new(guard.clone(), wal.processed_seq()), guard.next_checkpoint_id())
    };
    if let Err(e) = checkpoints.write(id, &snapshot) {
        warn!(error = %e, "checkpoint {name} failed");
        return Vec::new();
    }
    vec![Effect::Emit {
        event: Event::CheckpointCreated {
            id,
            name: name.to_string(),
            time: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        },
    }]
}
