// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded subprocess pool.
//!
//! Runner invocations and event handlers run here, off the engine loop.
//! Each task has a timeout; on expiry the subprocess is killed with
//! SIGKILL and reported with ret_code -9. Results flow back to the engine
//! loop through its multi-producer/single-consumer queue.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Semaphore;

/// Ret code reported for a handler killed on timeout (SIGKILL).
pub const HANDLER_KILL_RET_CODE: i32 = -9;

/// Result of one pooled subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOutcome {
    pub ret_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// Bounded worker pool for subprocesses.
#[derive(Clone)]
pub struct SubprocessPool {
    permits: Arc<Semaphore>,
}

impl SubprocessPool {
    /// `size` concurrent subprocesses; defaults to the CPU count at the
    /// call sites that own configuration.
    pub fn new(size: usize) -> Self {
        Self { permits: Arc::new(Semaphore::new(size.max(1))) }
    }

    /// Run `bash -c <command>` with a timeout. Waits for a pool permit
    /// first, so at most `size` subprocesses are alive at once.
    pub async fn run(&self, command: &str, timeout: Duration) -> PoolOutcome {
        // Semaphore is never closed; acquire can only fail after close.
        let Ok(_permit) = self.permits.acquire().await else {
            return PoolOutcome {
                ret_code: -1,
                stdout: String::new(),
                stderr: "worker pool closed".to_string(),
                timed_out: false,
            };
        };

        let spawned = Command::new("bash")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                return PoolOutcome {
                    ret_code: -1,
                    stdout: String::new(),
                    stderr: format!("spawn failed: {e}"),
                    timed_out: false,
                }
            }
        };

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let mut stdout = String::new();
        let mut stderr = String::new();

        let read_all = async {
            if let Some(pipe) = &mut stdout_pipe {
                let _ = pipe.read_to_string(&mut stdout).await;
            }
            if let Some(pipe) = &mut stderr_pipe {
                let _ = pipe.read_to_string(&mut stderr).await;
            }
            child.wait().await
        };

        match tokio::time::timeout(timeout, read_all).await {
            Ok(Ok(status)) => PoolOutcome {
                ret_code: status.code().unwrap_or_else(|| {
                    // Killed by signal: report the negated signal number,
                    // matching the shell convention.
                    use std::os::unix::process::ExitStatusExt;
                    status.signal().map(|s| -s).unwrap_or(-1)
                }),
                stdout,
                stderr,
                timed_out: false,
            },
            Ok(Err(e)) => PoolOutcome {
                ret_code: -1,
                stdout,
                stderr: format!("wait failed: {e}"),
                timed_out: false,
            },
            Err(_elapsed) => {
                // SIGKILL the whole process; -9 is the contract ret code.
                let _ = child.kill().await;
                PoolOutcome {
                    ret_code: HANDLER_KILL_RET_CODE,
                    stdout,
                    stderr,
                    timed_out: true,
                }
            }
        }
    }
}
