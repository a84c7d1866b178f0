// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted in-memory runner for engine and workspace tests.
//!
//! Submissions succeed by default; per-task outcomes can be scripted, and
//! every batch is recorded so tests can assert on batching behavior.

use crate::runner::{
    JobRunner, JobSnapshot, KillOutcome, PollOutcome, RunnerError, SubmitOutcome,
};
use async_trait::async_trait;
use gyre_core::effect::{JobRef, JobSpec};
use gyre_core::task::ExitClass;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// What the fake should report for one submission of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    /// jobs-submit returns nonzero for this job.
    SubmitFail,
    /// Submits, starts, and exits with the given classification.
    Exit(ExitClass),
    /// Submits and starts, then stays running until killed.
    RunForever,
    /// The whole batch invocation fails with a transport error.
    TransportError,
}

#[derive(Default)]
struct FakeState {
    /// Per task name: outcomes consumed in submission order. Empty means
    /// `Exit(Succeeded)`.
    scripted: HashMap<String, VecDeque<ScriptedOutcome>>,
    /// Live jobs: job identity -> (started, exit class when done).
    jobs: HashMap<String, JobSnapshot>,
    submit_batches: Vec<(String, Vec<String>)>,
    poll_batches: Vec<(String, Vec<String>)>,
    kill_batches: Vec<(String, Vec<String>)>,
    next_job_id: u64,
}

/// In-memory [`JobRunner`] with scripted outcomes.
#[derive(Clone, Default)]
pub struct FakeRunner {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next submission outcome for a task name.
    pub fn script(&self, task: &str, outcome: ScriptedOutcome) {
        self.state
            .lock()
            .scripted
            .entry(task.to_string())
            .or_default()
            .push_back(outcome);
    }

    /// Shorthand: fail once, then use the default success.
    pub fn fail_once(&self, task: &str) {
        self.script(task, ScriptedOutcome::Exit(ExitClass::Err));
    }

    /// Recorded submit batches: (platform, job identities).
    pub fn submit_batches(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().submit_batches.clone()
    }

    pub fn kill_batches(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().kill_batches.clone()
    }

    pub fn poll_batches(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().poll_batches.clone()
    }

    fn job_key(id: &gyre_core::TaskId, submit_num: u32) -> String {
        id.job(submit_num)
    }
}

#[async_trait]
impl JobRunner for FakeRunner {
    async fn submit(
        &self,
        platform: &str,
        jobs: &[JobSpec],
    ) -> Result<Vec<SubmitOutcome>, RunnerError> {
        let mut state = self.state.lock();
        state.submit_batches.push((
            platform.to_string(),
            jobs.iter().map(|j| Self::job_key(&j.id, j.submit_num)).collect(),
        ));

        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            let scripted = state
                .scripted
                .get_mut(&job.id.name)
                .and_then(VecDeque::pop_front)
                .unwrap_or(ScriptedOutcome::Exit(ExitClass::Succeeded));
            match scripted {
                ScriptedOutcome::TransportError => {
                    return Err(RunnerError::ConnectionRefused);
                }
                ScriptedOutcome::SubmitFail => {
                    outcomes.push(SubmitOutcome {
                        id: job.id.clone(),
                        submit_num: job.submit_num,
                        ret_code: 1,
                        runner_job_id: None,
                    });
                }
                ScriptedOutcome::Exit(class) => {
                    state.next_job_id += 1;
                    let runner_job_id = state.next_job_id.to_string();
                    state.jobs.insert(
                        Self::job_key(&job.id, job.submit_num),
                        JobSnapshot {
                            pid: Some(runner_job_id.clone()),
                            runner_job_id: Some(runner_job_id.clone()),
                            init_time: Some("t-start".to_string()),
                            exit: Some((class, "t-exit".to_string())),
                        },
                    );
                    outcomes.push(SubmitOutcome {
                        id: job.id.clone(),
                        submit_num: job.submit_num,
                        ret_code: 0,
                        runner_job_id: Some(runner_job_id),
                    });
                }
                ScriptedOutcome::RunForever => {
                    state.next_job_id += 1;
                    let runner_job_id = state.next_job_id.to_string();
                    state.jobs.insert(
                        Self::job_key(&job.id, job.submit_num),
                        JobSnapshot {
                            pid: Some(runner_job_id.clone()),
                            runner_job_id: Some(runner_job_id.clone()),
                            init_time: Some("t-start".to_string()),
                            exit: None,
                        },
                    );
                    outcomes.push(SubmitOutcome {
                        id: job.id.clone(),
                        submit_num: job.submit_num,
                        ret_code: 0,
                        runner_job_id: Some(runner_job_id),
                    });
                }
            }
        }
        Ok(outcomes)
    }

    async fn poll(
        &self,
        platform: &str,
        jobs: &[JobRef],
    ) -> Result<Vec<PollOutcome>, RunnerError> {
        let mut state = self.state.lock();
        state.poll_batches.push((
            platform.to_string(),
            jobs.iter().map(|j| Self::job_key(&j.id, j.submit_num)).collect(),
        ));
        Ok(jobs
            .iter()
            .map(|job| PollOutcome {
                id: job.id.clone(),
                submit_num: job.submit_num,
                snapshot: state
                    .jobs
                    .get(&Self::job_key(&job.id, job.submit_num))
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn kill(
        &self,
        platform: &str,
        jobs: &[JobRef],
    ) -> Result<Vec<KillOutcome>, RunnerError> {
        let mut state = self.state.lock();
        state.kill_batches.push((
            platform.to_string(),
            jobs.iter().map(|j| Self::job_key(&j.id, j.submit_num)).collect(),
        ));
        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            let key = Self::job_key(&job.id, job.submit_num);
            let ret_code = match state.jobs.get_mut(&key) {
                Some(snapshot) => {
                    if snapshot.exit.is_none() {
                        snapshot.exit = Some((ExitClass::Term, "t-kill".to_string()));
                    }
                    0
                }
                None => 1,
            };
            outcomes.push(KillOutcome { id: job.id.clone(), submit_num: job.submit_num, ret_code });
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyre_core::{CyclePoint, TaskId};
    use std::path::PathBuf;

    fn spec(name: &str, submit_num: u32) -> JobSpec {
        JobSpec {
            id: TaskId::new(name, CyclePoint::Integer(1)),
            submit_num,
            platform: "localhost".to_string(),
            script: String::new(),
            job_dir: PathBuf::new(),
        }
    }

    fn job_ref(spec: &JobSpec) -> JobRef {
        JobRef {
            id: spec.id.clone(),
            submit_num: spec.submit_num,
            platform: spec.platform.clone(),
            runner_job_id: None,
            job_dir: PathBuf::new(),
        }
    }

    #[tokio::test]
    async fn default_outcome_is_success() {
        let runner = FakeRunner::new();
        let spec = spec("foo", 1);
        let submits = runner.submit("localhost", &[spec.clone()]).await.unwrap();
        assert_eq!(submits[0].ret_code, 0);

        let polls = runner.poll("localhost", &[job_ref(&spec)]).await.unwrap();
        assert_eq!(
            polls[0].snapshot.exit.as_ref().map(|(c, _)| *c),
            Some(ExitClass::Succeeded)
        );
    }

    #[tokio::test]
    async fn scripted_failure_then_success() {
        let runner = FakeRunner::new();
        runner.fail_once("foo");

        let first = spec("foo", 1);
        let outcome = runner.submit("localhost", &[first.clone()]).await.unwrap();
        assert_eq!(outcome[0].ret_code, 0);
        let polls = runner.poll("localhost", &[job_ref(&first)]).await.unwrap();
        assert_eq!(polls[0].snapshot.exit.as_ref().map(|(c, _)| *c), Some(ExitClass::Err));

        let second = spec("foo", 2);
        runner.submit("localhost", &[second.clone()]).await.unwrap();
        let polls = runner.poll("localhost", &[job_ref(&second)]).await.unwrap();
        assert_eq!(
            polls[0].snapshot.exit.as_ref().map(|(c, _)| *c),
            Some(ExitClass::Succeeded)
        );
    }

    #[tokio::test]
    async fn transport_error_fails_whole_batch() {
        let runner = FakeRunner::new();
        runner.script("foo", ScriptedOutcome::TransportError);
        let result = runner.submit("hpc", &[spec("foo", 1)]).await;
        assert!(matches!(result, Err(RunnerError::ConnectionRefused)));
    }

    #[tokio::test]
    async fn kill_marks_running_job_term() {
        let runner = FakeRunner::new();
        runner.script("foo", ScriptedOutcome::RunForever);
        let spec = spec("foo", 1);
        runner.submit("localhost", &[spec.clone()]).await.unwrap();

        let kills = runner.kill("localhost", &[job_ref(&spec)]).await.unwrap();
        assert_eq!(kills[0].ret_code, 0);
        let polls = runner.poll("localhost", &[job_ref(&spec)]).await.unwrap();
        assert_eq!(polls[0].snapshot.exit.as_ref().map(|(c, _)| *c), Some(ExitClass::Term));
    }

    #[tokio::test]
    async fn batches_are_recorded() {
        let runner = FakeRunner::new();
        runner.submit("localhost", &[spec("a", 1), spec("b", 1)]).await.unwrap();
        let batches = runner.submit_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, "localhost");
        assert_eq!(batches[0].1, vec!["1/a/01", "1/b/01"]);
    }
}
