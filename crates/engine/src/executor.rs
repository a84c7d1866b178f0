// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effect executor.
//!
//! Applies [`Effect`]s produced by the [`crate::Runtime`]: runner batches
//! and handler subprocesses are spawned off-loop and report back through
//! the engine queue; timers go to the shared [`Scheduler`]; `Emit` effects
//! hand their event back to the caller for WAL append and state fold.

use crate::msg::EngineMsg;
use crate::scheduler::Scheduler;
use crate::xtrigger::XtriggerCall;
use gyre_adapters::{JobRunner, SubprocessPool};
use gyre_core::{Effect, Event};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};

pub struct Executor<R> {
    runner: Arc<R>,
    subprocesses: SubprocessPool,
    xtrigger_permits: Arc<Semaphore>,
    xtrigger_registry: HashMap<String, Arc<dyn XtriggerCall>>,
    scheduler: Arc<Mutex<Scheduler>>,
    event_tx: mpsc::Sender<EngineMsg>,
}

impl<R: JobRunner + 'static> Executor<R> {
    pub fn new(
        runner: Arc<R>,
        subprocesses: SubprocessPool,
        xtrigger_pool_size: usize,
        xtrigger_registry: HashMap<String, Arc<dyn XtriggerCall>>,
        scheduler: Arc<Mutex<Scheduler>>,
        event_tx: mpsc::Sender<EngineMsg>,
    ) -> Self {
        Self {
            runner,
            subprocesses,
            xtrigger_permits: Arc::new(Semaphore::new(xtrigger_pool_size.max(1))),
            xtrigger_registry,
            scheduler,
            event_tx,
        }
    }

    /// Execute a single effect with tracing.
    ///
    /// Returns the event for `Emit` effects so the caller can persist it;
    /// all other effects run asynchronously and feed the engine queue.
    pub fn execute(&self, effect: Effect) -> Option<Event> {
        let info = {
            let fields = effect.fields();
            let cap = fields.iter().map(|(a, b)| a.len() + b.len() + 2).sum();
            let mut fmt = String::with_capacity(cap);
            for (key, val) in fields {
                fmt.push_str(key);
                fmt.push('=');
                fmt.push_str(&val);
                fmt.push(' ');
            }
            fmt.pop();
            fmt
        };
        let op = effect.name();
        if effect.verbose() {
            tracing::info!("executing effect={op} {info}");
        } else {
            tracing::debug!("executing effect={op} {info}");
        }
        self.execute_inner(effect)
    }

    fn execute_inner(&self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::Emit { event } => Some(event),

            Effect::SubmitJobs { platform, jobs } => {
                let runner = Arc::clone(&self.runner);
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let result = runner.submit(&platform, &jobs).await;
                    let _ = tx
                        .send(EngineMsg::SubmitResult { platform, jobs, result })
                        .await;
                });
                None
            }

            Effect::PollJobs { platform, jobs } => {
                let runner = Arc::clone(&self.runner);
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let result = runner.poll(&platform, &jobs).await;
                    let _ = tx.send(EngineMsg::PollResult { platform, result }).await;
                });
                None
            }

            Effect::KillJobs { platform, jobs } => {
                let runner = Arc::clone(&self.runner);
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let result = runner.kill(&platform, &jobs).await;
                    let _ = tx.send(EngineMsg::KillResult { platform, result }).await;
                });
                None
            }

            Effect::RunHandler { task, handler, event, attempt, command, timeout } => {
                let pool = self.subprocesses.clone();
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let outcome = pool.run(&command, timeout).await;
                    let _ = tx
                        .send(EngineMsg::HandlerResult {
                            task,
                            handler,
                            event,
                            attempt,
                            outcome,
                        })
                        .await;
                });
                None
            }

            Effect::CallXtrigger { label, signature, function, args, point } => {
                let Some(call) = self.xtrigger_registry.get(&function).cloned() else {
                    tracing::warn!(function = function.as_str(), "unknown xtrigger function");
                    return None;
                };
                let permits = Arc::clone(&self.xtrigger_permits);
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let Ok(_permit) = permits.acquire().await else {
                        return;
                    };
                    // Trigger functions may block (file IO, remote state).
                    let handle =
                        tokio::task::spawn_blocking(move || call.call(&args));
                    let (satisfied, results) =
                        handle.await.unwrap_or((false, serde_json::Value::Null));
                    let _ = tx
                        .send(EngineMsg::XtriggerResult {
                            label,
                            signature,
                            point,
                            satisfied,
                            results,
                        })
                        .await;
                });
                None
            }

            Effect::SetTimer { id, duration } => {
                self.scheduler.lock().set_after(id, Instant::now(), duration);
                None
            }

            Effect::CancelTimer { id } => {
                self.scheduler.lock().cancel(&id);
                None
            }
        }
    }
}
