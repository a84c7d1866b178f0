// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task event handlers.
//!
//! Handlers fire on every entry into submitted, started, succeeded,
//! failed, submit-failed, expired, plus declared custom events. They run
//! as detached subprocesses on the bounded worker pool; each has the
//! configured `process pool timeout` and is SIGKILLed on expiry.

use crate::runtime::Runtime;
use gyre_adapters::{ActivityLog, PoolOutcome, HANDLER_KILL_RET_CODE};
use gyre_core::effect::Effect;
use gyre_core::{Clock, TaskId};

impl<C: Clock + 'static> Runtime<C> {
    /// Handler subprocess effects for one task event.
    ///
    /// Handlers are launched in declaration order; when several events
    /// land on one proxy in a single poll, the state machine applies them
    /// in order (submitted before started before the terminal event), so
    /// handlers fire in that same order.
    pub(crate) fn handler_effects(&self, id: &TaskId, event: &str) -> Vec<Effect> {
        let def = self.def();
        let Some(task) = def.task(&id.name) else {
            return Vec::new();
        };
        let submit_num = self.pool.get(id).map(|p| p.submit_num()).unwrap_or(0);
        let timeout = def.scheduler.process_pool_timeout;
        let mut effects = Vec::new();
        for (index, handler) in task.runtime.handlers.iter().enumerate() {
            if !handler.events.iter().any(|e| e == event) {
                continue;
            }
            let key = format!("event-handler-{index:02}");
            // Handlers receive the event name and job identity as args.
            let command = format!("{} {} {}", handler.command, event, id.job(submit_num));
            effects.push(Effect::RunHandler {
                task: id.clone(),
                handler: key,
                event: event.to_string(),
                attempt: 1,
                command,
                timeout,
            });
        }
        effects
    }

    /// Record a finished handler subprocess in the job-activity log and
    /// the scheduler log.
    pub(crate) fn handle_handler_result(
        &self,
        id: &TaskId,
        handler: &str,
        event: &str,
        attempt: u32,
        outcome: &PoolOutcome,
    ) {
        let submit_num = self.pool.get(id).map(|p| p.submit_num()).unwrap_or(1).max(1);
        let job = id.job(submit_num);
        let ctx = ActivityLog::handler_ctx(handler, event, attempt);
        let activity = ActivityLog::new(self.jobs.job_dir(id, submit_num));
        activity.ret_code(&ctx, outcome.ret_code);
        if !outcome.stdout.is_empty() {
            activity.out(&ctx, &outcome.stdout);
        }
        if !outcome.stderr.is_empty() {
            activity.err(&ctx, &outcome.stderr);
        }

        if outcome.ret_code == 0 {
            tracing::info!("[{ctx} ret_code] 0");
        } else {
            if outcome.timed_out {
                tracing::warn!(
                    "handler timed out and was killed: {job} ('{handler}', '{event}')"
                );
                debug_assert_eq!(outcome.ret_code, HANDLER_KILL_RET_CODE);
            }
            tracing::error!("[{ctx} ret_code] {}", outcome.ret_code);
            tracing::warn!("{job} ('{handler}', '{event}') failed");
        }
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
