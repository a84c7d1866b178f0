// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event & message router.
//!
//! Job messages and poll results arrive through the engine queue and are
//! applied here, in arrival order per proxy. A poll result can never
//! regress a proxy past what a newer message already established: every
//! transition goes through the state machine's legality check and stale
//! results are dropped.

use crate::jobs::{JobManager, PollPhase};
use crate::msg::EngineMsg;
use crate::runtime::Runtime;
use gyre_adapters::{JobSnapshot, PollOutcome, RunnerError, SubmitOutcome};
use gyre_core::effect::{Effect, JobSpec};
use gyre_core::event::{Event, MessageSeverity};
use gyre_core::outputs::{
    OUTPUT_FAILED, OUTPUT_STARTED, OUTPUT_SUBMITTED, OUTPUT_SUBMIT_FAILED, OUTPUT_SUCCEEDED,
};
use gyre_core::task::{ExitClass, TaskStatus};
use gyre_core::{Clock, TaskId, TimerId};

impl<C: Clock + 'static> Runtime<C> {
    /// Fold one queue message into the pool; returns follow-up effects.
    pub fn handle_msg(&mut self, msg: EngineMsg) -> Vec<Effect> {
        match msg {
            EngineMsg::TaskMessage { id, severity, message } => {
                self.handle_task_message(&id, severity, &message)
            }
            EngineMsg::SubmitResult { platform, jobs, result } => {
                self.handle_submit_result(&platform, jobs, result)
            }
            EngineMsg::PollResult { platform, result } => {
                self.handle_poll_result(&platform, result)
            }
            EngineMsg::KillResult { platform, result } => match result {
                Ok(outcomes) => {
                    // Observe the kill promptly rather than waiting for
                    // the normal poll cadence.
                    let refs: Vec<_> = outcomes
                        .iter()
                        .filter(|o| o.ret_code == 0)
                        .filter_map(|o| {
                            self.pool.get(&o.id).and_then(|p| self.jobs.job_ref(p))
                        })
                        .collect();
                    if refs.is_empty() {
                        Vec::new()
                    } else {
                        vec![Effect::PollJobs { platform, jobs: refs }]
                    }
                }
                Err(e) => {
                    tracing::warn!("[jobs-kill err] {e}");
                    Vec::new()
                }
            },
            EngineMsg::XtriggerResult { label, signature, point, satisfied, results } => {
                self.handle_xtrigger_result(&label, &signature, point, satisfied, results)
            }
            EngineMsg::HandlerResult { task, handler, event, attempt, outcome } => {
                self.handle_handler_result(&task, &handler, &event, attempt, &outcome);
                Vec::new()
            }
            EngineMsg::TimerFired(id) => self.handle_timer(&id),
            EngineMsg::Command(command) => match self.handle_command(command) {
                Ok(effects) => effects,
                Err(e) => {
                    tracing::warn!(error = %e, "operator command failed");
                    Vec::new()
                }
            },
        }
    }

    /// Messages from running jobs: the head of the body names the event.
    fn handle_task_message(
        &mut self,
        id: &TaskId,
        severity: MessageSeverity,
        message: &str,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(status) = self.pool.get(id).map(|p| p.status) else {
            // Late arrivals for an already-removed (succeeded) proxy are
            // expected and quietly dropped.
            if self
                .completed_outputs
                .get(id)
                .map(|outs| outs.contains(OUTPUT_SUCCEEDED))
                .unwrap_or(false)
            {
                tracing::debug!(task = %id, "message for completed task dropped");
            } else {
                tracing::warn!(task = %id, message, "message for unknown task dropped");
            }
            return effects;
        };

        let submit_num = self.pool.get(id).map(|p| p.submit_num()).unwrap_or(0);
        match message {
            "started" => effects.extend(self.job_started(id, submit_num, None)),
            "succeeded" => effects.extend(self.job_succeeded(id, submit_num)),
            "failed" => effects.extend(self.job_failed(id, submit_num, ExitClass::Err)),
            _ => {
                // Custom outputs satisfy by message equality.
                let custom = self
                    .def()
                    .task(&id.name)
                    .and_then(|t| t.runtime.output_for_message(message))
                    .map(str::to_string);
                if let Some(output) = custom {
                    self.complete_output(id, &output, message, &mut effects);
                } else {
                    if severity == MessageSeverity::Critical
                        && status == TaskStatus::Running
                    {
                        // A critical message is treated as job failure.
                        effects.extend(self.job_failed(id, submit_num, ExitClass::Err));
                    }
                    effects.push(Effect::Emit {
                        event: Event::TaskMessage {
                            id: id.clone(),
                            severity,
                            message: message.to_string(),
                            time: self.clock.timestamp(),
                        },
                    });
                }
            }
        }
        effects
    }

    fn handle_submit_result(
        &mut self,
        platform: &str,
        jobs: Vec<JobSpec>,
        result: Result<Vec<SubmitOutcome>, RunnerError>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        match result {
            Err(e) => {
                // Transport failure of the whole invocation: the batch is
                // retained (tasks fall back to waiting) and the platform
                // cools down. Not a per-task submit failure.
                tracing::warn!("[jobs-submit err] {e}");
                for spec in jobs {
                    if let Some(proxy) = self.pool.get_mut(&spec.id) {
                        proxy.jobs.pop();
                        if proxy.set_status(TaskStatus::Waiting).is_ok() {
                            effects.push(self.status_event(&spec.id, TaskStatus::Waiting));
                        }
                    }
                }
                effects.extend(self.platform_cooldown_timer(platform));
            }
            Ok(outcomes) => {
                for outcome in outcomes {
                    if outcome.ret_code == 0 {
                        effects.extend(self.job_submitted(&outcome));
                    } else {
                        effects.extend(self.job_submit_failed(&outcome.id));
                    }
                }
            }
        }
        effects
    }

    pub(crate) fn job_submitted(&mut self, outcome: &SubmitOutcome) -> Vec<Effect> {
        let mut effects = Vec::new();
        let id = &outcome.id;
        let time = self.clock.timestamp();
        let Some(proxy) = self.pool.get_mut(id) else {
            return effects;
        };
        if proxy.set_status(TaskStatus::Submitted).is_err() {
            // A faster message already moved the proxy on.
            return effects;
        }
        if let Some(record) = proxy.current_job_mut() {
            record.runner_job_id = outcome.runner_job_id.clone();
            record.submit_exit = Some(0);
            record.time_submit = Some(time.clone());
            record.time_submit_exit = Some(time.clone());
        }
        let platform = proxy
            .current_job()
            .map(|r| r.platform.clone())
            .unwrap_or_default();

        effects.push(Effect::Emit {
            event: Event::JobSubmitted {
                id: id.clone(),
                submit_num: outcome.submit_num,
                platform,
                runner_job_id: outcome.runner_job_id.clone(),
                time: time.clone(),
            },
        });
        effects.push(self.status_event(id, TaskStatus::Submitted));
        let id = id.clone();
        self.complete_output(&id, OUTPUT_SUBMITTED, OUTPUT_SUBMITTED, &mut effects);
        effects.extend(self.handler_effects(&id, OUTPUT_SUBMITTED));
        self.maintain_latest_symlink(&id, outcome.submit_num);

        // Arm submission polling and the execution-time-limit deadline.
        let def = self.def();
        if let Ok(runtime) = self.jobs.effective_runtime(&def, &self.broadcasts, &id) {
            if let Some(delay) =
                self.jobs.next_poll_delay(&runtime, &id, PollPhase::Submission)
            {
                effects.push(Effect::SetTimer {
                    id: TimerId::submission_poll(&id),
                    duration: delay,
                });
            }
            if let Some(delay) = JobManager::time_limit_delay(&runtime) {
                effects.push(Effect::SetTimer {
                    id: TimerId::execution_timeout(&id),
                    duration: delay,
                });
            }
        }
        effects
    }

    pub(crate) fn job_submit_failed(&mut self, id: &TaskId) -> Vec<Effect> {
        let mut effects = Vec::new();
        let time = self.clock.timestamp();
        let submit_num = {
            let Some(proxy) = self.pool.get_mut(id) else { return effects };
            if let Some(record) = proxy.current_job_mut() {
                if !record.is_terminal() {
                    record.submit_exit = Some(1);
                    record.time_submit_exit = Some(time.clone());
                }
            }
            if proxy.set_status(TaskStatus::SubmitFailed).is_err() {
                return effects;
            }
            proxy.submit_num()
        };
        effects.push(Effect::Emit {
            event: Event::JobSubmitFailed { id: id.clone(), submit_num, time },
        });
        effects.push(self.status_event(id, TaskStatus::SubmitFailed));
        effects.extend(self.handler_effects(id, OUTPUT_SUBMIT_FAILED));

        // Submission retries re-enter preparing after the delay.
        let def = self.def();
        let retry = self
            .jobs
            .effective_runtime(&def, &self.broadcasts, id)
            .ok()
            .and_then(|rt| {
                let tries = self.pool.get(id).map(|p| p.submit_tries).unwrap_or(0);
                rt.submission_retry_delays.get_finite(tries as usize)
            });
        match retry {
            Some(delay) => {
                if let Some(proxy) = self.pool.get_mut(id) {
                    proxy.submit_tries += 1;
                }
                effects.push(Effect::SetTimer {
                    id: TimerId::submit_retry(id),
                    duration: delay,
                });
            }
            None => {
                let id = id.clone();
                self.complete_output(&id, OUTPUT_SUBMIT_FAILED, OUTPUT_SUBMIT_FAILED, &mut effects);
            }
        }
        effects
    }

    pub(crate) fn job_started(
        &mut self,
        id: &TaskId,
        submit_num: u32,
        time: Option<String>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        let time = time.unwrap_or_else(|| self.clock.timestamp());
        {
            let Some(proxy) = self.pool.get_mut(id) else { return effects };
            if proxy.set_status(TaskStatus::Running).is_err() {
                return effects;
            }
            if let Some(record) = proxy.current_job_mut() {
                record.time_run = Some(time.clone());
            }
        }
        effects.push(Effect::Emit {
            event: Event::JobStarted { id: id.clone(), submit_num, time },
        });
        effects.push(self.status_event(id, TaskStatus::Running));
        let id_owned = id.clone();
        self.complete_output(&id_owned, OUTPUT_STARTED, OUTPUT_STARTED, &mut effects);
        effects.extend(self.handler_effects(id, OUTPUT_STARTED));

        // Switch from submission polling to execution polling.
        self.jobs.reset_poll_count(id);
        effects.push(Effect::CancelTimer { id: TimerId::submission_poll(id) });
        let def = self.def();
        if let Ok(runtime) = self.jobs.effective_runtime(&def, &self.broadcasts, id) {
            if let Some(delay) =
                self.jobs.next_poll_delay(&runtime, id, PollPhase::Execution)
            {
                effects.push(Effect::SetTimer {
                    id: TimerId::execution_poll(id),
                    duration: delay,
                });
            }
        }
        effects
    }

    pub(crate) fn job_succeeded(&mut self, id: &TaskId, submit_num: u32) -> Vec<Effect> {
        let mut effects = Vec::new();
        let time = self.clock.timestamp();
        {
            let Some(proxy) = self.pool.get_mut(id) else { return effects };
            if proxy.set_status(TaskStatus::Succeeded).is_err() {
                return effects;
            }
            if let Some(record) = proxy.current_job_mut() {
                record.run_exit = Some(ExitClass::Succeeded);
                record.time_run_exit = Some(time.clone());
            }
        }
        effects.push(Effect::Emit {
            event: Event::JobExited {
                id: id.clone(),
                submit_num,
                exit: ExitClass::Succeeded,
                time,
            },
        });
        effects.push(self.status_event(id, TaskStatus::Succeeded));
        let id_owned = id.clone();
        self.complete_output(&id_owned, OUTPUT_SUCCEEDED, OUTPUT_SUCCEEDED, &mut effects);
        effects.extend(self.handler_effects(id, OUTPUT_SUCCEEDED));
        for event in self.broadcasts.expire_for_task(id) {
            effects.push(Effect::Emit { event });
        }
        effects.extend(self.cancel_task_timers(id));
        self.overdue.remove(id);
        effects
    }

    pub(crate) fn job_failed(
        &mut self,
        id: &TaskId,
        submit_num: u32,
        class: ExitClass,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        let time = self.clock.timestamp();
        {
            let Some(proxy) = self.pool.get_mut(id) else { return effects };
            if proxy.set_status(TaskStatus::Failed).is_err() {
                return effects;
            }
            if let Some(record) = proxy.current_job_mut() {
                record.run_exit = Some(class);
                record.time_run_exit = Some(time.clone());
            }
        }
        effects.push(Effect::Emit {
            event: Event::JobExited { id: id.clone(), submit_num, exit: class, time },
        });
        effects.push(self.status_event(id, TaskStatus::Failed));
        effects.extend(self.handler_effects(id, OUTPUT_FAILED));
        effects.extend(self.cancel_task_timers(id));
        self.overdue.remove(id);

        // Execution retries re-enter preparing after the delay; the
        // failed output only completes once retries are exhausted.
        let def = self.def();
        let retry = self
            .jobs
            .effective_runtime(&def, &self.broadcasts, id)
            .ok()
            .and_then(|rt| {
                let tries = self.pool.get(id).map(|p| p.exec_tries).unwrap_or(0);
                rt.execution_retry_delays.get_finite(tries as usize)
            });
        match retry {
            Some(delay) => {
                if let Some(proxy) = self.pool.get_mut(id) {
                    proxy.exec_tries += 1;
                }
                effects.push(Effect::SetTimer { id: TimerId::exec_retry(id), duration: delay });
            }
            None => {
                let id = id.clone();
                self.complete_output(&id, OUTPUT_FAILED, OUTPUT_FAILED, &mut effects);
            }
        }
        effects
    }

    pub(crate) fn job_vacated(&mut self, id: &TaskId, submit_num: u32) -> Vec<Effect> {
        let mut effects = Vec::new();
        let time = self.clock.timestamp();
        let Some(proxy) = self.pool.get_mut(id) else { return effects };
        // The proxy stays running; the record is kept open but marked so
        // a resumed process can rejoin.
        if let Some(record) = proxy.current_job_mut() {
            record.run_exit = Some(ExitClass::Vacated);
            record.vacated = true;
        }
        effects.push(Effect::Emit {
            event: Event::JobExited {
                id: id.clone(),
                submit_num,
                exit: ExitClass::Vacated,
                time,
            },
        });
        effects
    }

    fn handle_poll_result(
        &mut self,
        _platform: &str,
        result: Result<Vec<PollOutcome>, RunnerError>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        let outcomes = match result {
            Err(RunnerError::ConnectionRefused) => {
                // Never job failure: state unchanged, poll again later.
                tracing::warn!("[jobs-poll err] Connection refused");
                return effects;
            }
            Err(e) => {
                tracing::warn!("[jobs-poll err] {e}");
                return effects;
            }
            Ok(outcomes) => outcomes,
        };

        for outcome in outcomes {
            let id = outcome.id.clone();
            let Some((status, current_submit)) = self
                .pool
                .get(&id)
                .map(|p| (p.status, p.submit_num()))
            else {
                continue;
            };
            if outcome.submit_num != current_submit {
                continue; // poll of a superseded submission
            }
            effects.extend(self.apply_poll_snapshot(&id, status, &outcome.snapshot));
        }
        effects
    }

    /// Fold an affirmative poll snapshot into the proxy. Only forward
    /// transitions apply; a stale poll is dropped by the legality check.
    fn apply_poll_snapshot(
        &mut self,
        id: &TaskId,
        status: TaskStatus,
        snapshot: &JobSnapshot,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        let submit_num = self.pool.get(id).map(|p| p.submit_num()).unwrap_or(0);

        if let Some((class, _exit_time)) = &snapshot.exit {
            // A started message may have been lost; recover it first.
            if status == TaskStatus::Submitted && snapshot.started() {
                effects.extend(self.job_started(id, submit_num, snapshot.init_time.clone()));
            }
            match class {
                ExitClass::Succeeded => {
                    effects.extend(self.job_succeeded(id, submit_num))
                }
                ExitClass::Err | ExitClass::Term | ExitClass::Xcpu => {
                    effects.extend(self.job_failed(id, submit_num, *class))
                }
                ExitClass::Vacated => effects.extend(self.job_vacated(id, submit_num)),
            }
            return effects;
        }

        if snapshot.started() && status == TaskStatus::Submitted {
            effects.extend(self.job_started(id, submit_num, snapshot.init_time.clone()));
            // Past the execution time limit already?
            if self.overdue.contains(id) {
                effects.extend(self.kill_overdue(id));
            }
            return effects;
        }

        // Still running (or not yet initialized).
        if self.overdue.contains(id) && status == TaskStatus::Running {
            effects.extend(self.kill_overdue(id));
            return effects;
        }

        // Keep polling on the phase cadence.
        let def = self.def();
        let phase = match status {
            TaskStatus::Submitted => Some(PollPhase::Submission),
            TaskStatus::Running => Some(PollPhase::Execution),
            _ => None,
        };
        if let Some(phase) = phase {
            if let Ok(runtime) = self.jobs.effective_runtime(&def, &self.broadcasts, id) {
                if let Some(delay) = self.jobs.next_poll_delay(&runtime, id, phase) {
                    let timer = match phase {
                        PollPhase::Submission => TimerId::submission_poll(id),
                        PollPhase::Execution => TimerId::execution_poll(id),
                    };
                    effects.push(Effect::SetTimer { id: timer, duration: delay });
                }
            }
        }
        effects
    }

    /// The forced deadline poll found the job still alive: kill it and
    /// record the overrun.
    fn kill_overdue(&mut self, id: &TaskId) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.overdue.remove(id);
        let time = self.clock.timestamp();
        tracing::warn!(task = %id, "execution time limit exceeded, killing job");
        effects.push(Effect::Emit {
            event: Event::TaskMessage {
                id: id.clone(),
                severity: MessageSeverity::Critical,
                message: format!("(polled)failed at {time}"),
                time,
            },
        });
        if let Some(job_ref) = self.pool.get(id).and_then(|p| self.jobs.job_ref(p)) {
            effects.push(Effect::KillJobs {
                platform: job_ref.platform.clone(),
                jobs: vec![job_ref],
            });
        }
        effects
    }

    fn handle_xtrigger_result(
        &mut self,
        label: &str,
        signature: &str,
        point: gyre_core::CyclePoint,
        satisfied: bool,
        results: serde_json::Value,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.xtriggers.call_returned(signature);
        if !satisfied {
            return effects;
        }
        self.xtriggers.record_satisfied(signature, results.clone());
        effects.push(Effect::Emit {
            event: Event::XtriggerSatisfied {
                signature: signature.to_string(),
                results: results.clone(),
            },
        });

        // Results inject as dependent-task environment via broadcast.
        let def = self.def();
        if let Some(map) = results.as_object().filter(|m| !m.is_empty()) {
            let env: serde_json::Value = serde_json::json!({ "environment": map });
            let point_expr = match def.xtriggers.get(label) {
                Some(x) if x.is_point_specific() => point.to_string(),
                _ => "*".to_string(),
            };
            let dependents: Vec<String> = def
                .tasks
                .values()
                .filter(|t| t.xtriggers.iter().any(|l| l == label))
                .map(|t| t.name.clone())
                .collect();
            for name in dependents {
                let event = self.broadcasts.set(
                    point_expr.clone(),
                    name,
                    env.clone(),
                    gyre_core::event::BroadcastLifespan::Permanent,
                );
                effects.push(Effect::Emit { event });
            }
        }

        self.resatisfy_xtriggers();
        effects
    }

    /// Route a fired timer by its typed kind.
    pub fn handle_timer(&mut self, timer: &TimerId) -> Vec<Effect> {
        use gyre_core::TimerKind;

        if let Some(platform) = timer.as_str().strip_prefix("platform-cooldown:") {
            self.platform_cooldown.remove(platform);
            return Vec::new();
        }

        let Some(kind) = timer.kind() else {
            tracing::warn!(timer = %timer, "unrecognized timer fired");
            return Vec::new();
        };
        match kind {
            TimerKind::SubmitRetry(id) | TimerKind::ExecRetry(id) => {
                let mut effects = Vec::new();
                // Only a pending retry re-enters waiting: once the failed
                // output has completed, retries were exhausted.
                let retry_pending = self
                    .pool
                    .get(&id)
                    .map(|p| {
                        matches!(p.status, TaskStatus::Failed | TaskStatus::SubmitFailed)
                            && !p.outputs.is_completed(OUTPUT_FAILED)
                            && !p.outputs.is_completed(OUTPUT_SUBMIT_FAILED)
                    })
                    .unwrap_or(false);
                if retry_pending {
                    if let Some(proxy) = self.pool.get_mut(&id) {
                        if proxy.set_status(TaskStatus::Waiting).is_ok() {
                            effects.push(self.status_event(&id, TaskStatus::Waiting));
                        }
                    }
                }
                effects
            }
            TimerKind::SubmissionPoll(id) => self.poll_now(&id, TaskStatus::Submitted),
            TimerKind::ExecutionPoll(id) => self.poll_now(&id, TaskStatus::Running),
            TimerKind::ExecutionTimeout(id) => {
                let status = self.pool.get(&id).map(|p| p.status);
                if matches!(status, Some(TaskStatus::Submitted | TaskStatus::Running)) {
                    self.overdue.insert(id.clone());
                    let mut effects = self.poll_now(&id, TaskStatus::Running);
                    if effects.is_empty() {
                        effects = self.poll_now(&id, TaskStatus::Submitted);
                    }
                    effects
                } else {
                    Vec::new()
                }
            }
            TimerKind::Expiry(id) => self.expire_task(&id),
            // Workflow-level timers are owned by the daemon loop.
            TimerKind::Stall | TimerKind::Inactivity => Vec::new(),
        }
    }

    fn poll_now(&mut self, id: &TaskId, expected: TaskStatus) -> Vec<Effect> {
        let Some(proxy) = self.pool.get(id) else { return Vec::new() };
        if proxy.status != expected {
            return Vec::new();
        }
        match self.jobs.job_ref(proxy) {
            Some(job_ref) => vec![Effect::PollJobs {
                platform: job_ref.platform.clone(),
                jobs: vec![job_ref],
            }],
            None => Vec::new(),
        }
    }

    fn expire_task(&mut self, id: &TaskId) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(status) = self.pool.get(id).map(|p| p.status) else {
            return effects;
        };
        if status.is_terminal() {
            return effects;
        }
        // Kill anything in flight before expiring.
        if matches!(status, TaskStatus::Submitted | TaskStatus::Running) {
            if let Some(job_ref) = self.pool.get(id).and_then(|p| self.jobs.job_ref(p)) {
                effects.push(Effect::KillJobs {
                    platform: job_ref.platform.clone(),
                    jobs: vec![job_ref],
                });
            }
        }
        if let Some(proxy) = self.pool.get_mut(id) {
            if proxy.set_status(TaskStatus::Expired).is_err() {
                return effects;
            }
        }
        effects.push(self.status_event(id, TaskStatus::Expired));
        let id_owned = id.clone();
        self.complete_output(&id_owned, "expired", "expired", &mut effects);
        effects.extend(self.handler_effects(id, "expired"));
        effects.extend(self.cancel_task_timers(id));
        effects
    }

    /// Complete an output on a proxy: record it, spawn the children that
    /// reference it (idempotently, within runahead), and satisfy matching
    /// prerequisite atoms across the pool.
    pub(crate) fn complete_output(
        &mut self,
        id: &TaskId,
        output: &str,
        message: &str,
        effects: &mut Vec<Effect>,
    ) {
        let newly = self
            .pool
            .get_mut(id)
            .map(|p| p.outputs.complete(output))
            .unwrap_or(false);
        if !newly {
            return;
        }
        effects.push(Effect::Emit {
            event: Event::OutputCompleted {
                id: id.clone(),
                output: output.to_string(),
                message: message.to_string(),
                time: self.clock.timestamp(),
            },
        });
        self.completed_outputs
            .entry(id.clone())
            .or_default()
            .insert(output.to_string());

        // Spawn downstream children first, then satisfy, so freshly
        // spawned proxies see this output too.
        let def = self.def();
        let children = def.children_of(&id.name, &id.point, output);
        let mut all = true;
        for child in &children {
            if self.spawned_ever(child) {
                continue;
            }
            if !self.spawn_proxy(child, effects) {
                all = false; // deferred by runahead; retried each step
            }
        }
        // The flag only clears here; the step's deferred-children pass
        // settles it to true once every completed output's children exist.
        if !all {
            if let Some(proxy) = self.pool.get_mut(id) {
                proxy.children_spawned = false;
            }
        }

        self.pool.satisfy_output(id, output);
    }

    pub(crate) fn cancel_task_timers(&self, id: &TaskId) -> Vec<Effect> {
        [
            TimerId::submission_poll(id),
            TimerId::execution_poll(id),
            TimerId::execution_timeout(id),
            TimerId::expiry(id),
        ]
        .into_iter()
        .map(|timer| Effect::CancelTimer { id: timer })
        .collect()
    }

    fn maintain_latest_symlink(&self, id: &TaskId, submit_num: u32) {
        let task_dir = self.jobs.task_dir(id);
        if task_dir.exists() {
            if let Err(e) = gyre_adapters::update_latest_symlink(&task_dir, submit_num) {
                tracing::debug!(task = %id, error = %e, "NN symlink update failed");
            }
        }
    }
}
