// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job manager: job construction, per-platform batching, and poll
//! scheduling.
//!
//! Jobs are prepared from the flattened runtime plus matching broadcasts
//! at submit time (the script embeds that snapshot). Batches group by
//! platform and split at `max_batch_size`; transport failures are
//! per-invocation, never per-task.

use crate::broadcast::BroadcastStore;
use crate::error::RuntimeError;
use gyre_adapters::{job_script, JobScriptParams, STATUS_FILE_NAME};
use gyre_core::duration::IntervalList;
use gyre_core::effect::{JobRef, JobSpec};
use gyre_core::task::TaskProxy;
use gyre_core::TaskId;
use gyre_def::{TaskRuntime, WorkflowDef};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Poll interval applied when a time limit is declared but no
/// time-limit polling intervals are configured.
const DEFAULT_TIME_LIMIT_POLL: Duration = Duration::from_secs(60);

/// Which polling schedule a job is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Submission,
    Execution,
}

#[derive(Debug)]
pub struct JobManager {
    job_root: PathBuf,
    max_batch_size: usize,
    /// Poll attempts consumed per task for the current phase.
    poll_counts: HashMap<TaskId, u32>,
}

impl JobManager {
    pub fn new(job_root: impl Into<PathBuf>, max_batch_size: usize) -> Self {
        Self {
            job_root: job_root.into(),
            max_batch_size: max_batch_size.max(1),
            poll_counts: HashMap::new(),
        }
    }

    /// Job log directory for one submission: `log/job/<cycle>/<task>/<NN>`.
    pub fn job_dir(&self, id: &TaskId, submit_num: u32) -> PathBuf {
        self.job_root
            .join(id.point.to_string())
            .join(&id.name)
            .join(format!("{submit_num:02}"))
    }

    /// Task log directory holding the `NN` latest symlink.
    pub fn task_dir(&self, id: &TaskId) -> PathBuf {
        self.job_root.join(id.point.to_string()).join(&id.name)
    }

    /// The effective runtime for a proxy right now (base + broadcasts).
    pub fn effective_runtime(
        &self,
        def: &WorkflowDef,
        broadcasts: &BroadcastStore,
        id: &TaskId,
    ) -> Result<TaskRuntime, RuntimeError> {
        let task = def
            .task(&id.name)
            .ok_or_else(|| RuntimeError::UnknownTask(id.name.clone()))?;
        let chain = def
            .inheritance
            .get(&id.name)
            .cloned()
            .unwrap_or_else(|| vec![id.name.clone()]);
        broadcasts.effective_runtime(&task.runtime, &id.name, &id.point, &chain)
    }

    /// Prepare the next submission of a proxy: append a fresh job record
    /// and render the job script from the effective runtime.
    pub fn prepare_job(
        &mut self,
        def: &WorkflowDef,
        broadcasts: &BroadcastStore,
        proxy: &mut TaskProxy,
    ) -> Result<JobSpec, RuntimeError> {
        let runtime = self.effective_runtime(def, broadcasts, &proxy.id)?;
        let platform = runtime.platform.clone();
        let submit_num = proxy.submit_num() + 1;
        let job_dir = self.job_dir(&proxy.id, submit_num);

        let script = job_script(&JobScriptParams {
            job_id: proxy.id.job(submit_num),
            task_name: proxy.id.name.clone(),
            cycle_point: proxy.id.point.to_string(),
            submit_num,
            platform: platform.clone(),
            environment: runtime
                .environment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            script: runtime.script.clone(),
            status_file: job_dir.join(STATUS_FILE_NAME).display().to_string(),
            vacation_signals: vec!["USR1".to_string()],
        });

        proxy.new_job(platform.clone());
        self.poll_counts.remove(&proxy.id);

        Ok(JobSpec {
            id: proxy.id.clone(),
            submit_num,
            platform,
            script,
            job_dir,
        })
    }

    /// Reference to a proxy's current job for poll/kill batches.
    pub fn job_ref(&self, proxy: &TaskProxy) -> Option<JobRef> {
        let record = proxy.current_job()?;
        Some(JobRef {
            id: proxy.id.clone(),
            submit_num: record.submit_num,
            platform: record.platform.clone(),
            runner_job_id: record.runner_job_id.clone(),
            job_dir: self.job_dir(&proxy.id, record.submit_num),
        })
    }

    /// Group by platform and split at `max_batch_size`. Oversized sets
    /// log the split, matching the runner contract.
    pub fn batches<T>(
        &self,
        kind: &str,
        items: Vec<T>,
        platform_of: impl Fn(&T) -> &str,
    ) -> Vec<(String, Vec<T>)> {
        let mut by_platform: Vec<(String, Vec<T>)> = Vec::new();
        for item in items {
            let platform = platform_of(&item).to_string();
            match by_platform.iter_mut().find(|(p, _)| *p == platform) {
                Some((_, bucket)) => bucket.push(item),
                None => by_platform.push((platform, vec![item])),
            }
        }

        let mut batches = Vec::new();
        for (platform, bucket) in by_platform {
            if bucket.len() > self.max_batch_size {
                let sizes: Vec<usize> = bucket
                    .chunks(self.max_batch_size)
                    .map(<[T]>::len)
                    .collect();
                tracing::info!(
                    platform = platform.as_str(),
                    "{kind}: will invoke in batches, sizes={sizes:?}"
                );
                let mut rest = bucket;
                while !rest.is_empty() {
                    let tail = rest.split_off(rest.len().min(self.max_batch_size));
                    batches.push((platform.clone(), rest));
                    rest = tail;
                }
            } else {
                batches.push((platform, bucket));
            }
        }
        batches
    }

    /// Next poll delay for a task on the given schedule; the last
    /// configured interval repeats once the list is consumed.
    pub fn next_poll_delay(
        &mut self,
        runtime: &TaskRuntime,
        id: &TaskId,
        phase: PollPhase,
    ) -> Option<Duration> {
        let list: &IntervalList = match phase {
            PollPhase::Submission => &runtime.submission_polling_intervals,
            PollPhase::Execution => &runtime.execution_polling_intervals,
        };
        if list.is_empty() {
            return None;
        }
        let count = self.poll_counts.entry(id.clone()).or_insert(0);
        let delay = list.get(*count as usize);
        *count += 1;
        delay
    }

    /// A phase change (submitted -> running) restarts poll counting.
    pub fn reset_poll_count(&mut self, id: &TaskId) {
        self.poll_counts.remove(id);
    }

    /// Deadline-poll delay from submit time: limit plus one configured
    /// time-limit poll interval. After this a poll is forced and a job
    /// still running is killed.
    pub fn time_limit_delay(runtime: &TaskRuntime) -> Option<Duration> {
        let limit = runtime.execution_time_limit?;
        let interval = runtime
            .execution_time_limit_polling_intervals
            .first()
            .or_else(|| runtime.execution_polling_intervals.first())
            .unwrap_or(DEFAULT_TIME_LIMIT_POLL);
        Some(limit + interval)
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
