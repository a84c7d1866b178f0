// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler startup: lock the run dir, health-check any stale contact
//! file, recover state from snapshot + WAL, and advertise the contact.

use super::{DaemonState, LifecycleError, SchedulerRuntime};
use crate::config::Config;
use fs2::FileExt;
use gyre_core::{Event, SystemClock, TaskId};
use gyre_engine::RuntimeConfig;
use gyre_storage::{Checkpointer, ContactError, ContactInfo, MaterializedState, Wal, PARAM_UUID};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::fs::OpenOptions;
use tracing::{info, warn};

/// Result of daemon startup: the state plus the effects the first tick
/// must execute (re-polls for vacated jobs, initial spawns).
#[derive(Debug)]
pub struct StartupResult {
    pub daemon: DaemonState,
    pub initial_effects: Vec<gyre_core::Effect>,
}

pub fn startup(config: Config, version: &str) -> Result<StartupResult, LifecycleError> {
    config.create_dirs()?;

    // Refuse to run while a live scheduler holds the workflow; a stale
    // contact file (SIGKILL, power loss) passes the health check and is
    // cleared.
    match ContactInfo::read(&config.contact_path) {
        Ok(contact) => {
            if process_alive(contact.pid) {
                return Err(LifecycleError::AlreadyRunning { pid: contact.pid });
            }
            warn!(pid = contact.pid, "clearing stale contact file");
            ContactInfo::remove(&config.contact_path)?;
        }
        Err(ContactError::NotRunning) => {}
        Err(ContactError::Corrupt(reason)) => {
            warn!(reason, "corrupt contact file");
            return Err(LifecycleError::StaleContact(
                config.contact_path.display().to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&config.lock_path)?;
    if lock_file.try_lock_exclusive().is_err() {
        return Err(LifecycleError::AlreadyRunning { pid: 0 });
    }

    // Parse and validate the installed definition; configuration errors
    // refuse startup here.
    let def = gyre_def::load_file(&config.flow_path)?;

    // Recover: latest checkpoint snapshot plus the WAL tail.
    let checkpoints = Checkpointer::new(&config.checkpoints_dir);
    let (mut state, snapshot_seq) = match checkpoints.load_latest()? {
        Some(snapshot) => (snapshot.state, snapshot.wal_seq),
        None => (MaterializedState::default(), 0),
    };
    let mut wal = Wal::open(&config.wal_path, snapshot_seq)?;
    let mut replayed = 0u64;
    while let Some(entry) = wal.next_unprocessed()? {
        state.apply_event(&entry.event);
        wal.mark_processed(entry.seq);
        replayed += 1;
    }
    if replayed > 0 {
        info!(replayed, "replayed wal events past snapshot");
    }

    // A restart means resuming task state; a persisted uuid alone (e.g. a
    // run that never spawned) still cold-starts but keeps its identity.
    let restarted = !state.states.is_empty();
    let uuid = match state.uuid() {
        Some(uuid) => uuid.to_string(),
        None => uuid::Uuid::new_v4().to_string(),
    };

    let mut runtime = SchedulerRuntime::new(
        def.clone(),
        SystemClock,
        RuntimeConfig {
            job_root: config.job_log_root.clone(),
            run_root: config.run_root.clone(),
        },
    );

    let mut initial_effects = Vec::new();
    if restarted {
        let repoll: Vec<TaskId> = state.vacate_open_jobs();
        if !repoll.is_empty() {
            info!(count = repoll.len(), "re-polling jobs orphaned by restart");
        }
        initial_effects.extend(runtime.restore(&state, &repoll));
        info!(workflow = def.name.as_str(), "restart from persisted state");
    } else {
        initial_effects.extend(runtime.bootstrap());
        info!(workflow = def.name.as_str(), "cold start");
    }

    // Persist identity parameters through the normal event path.
    let uuid_event = Event::ParamSet { key: PARAM_UUID.to_string(), value: uuid.clone() };
    wal.append(&uuid_event)?;
    state.apply_event(&uuid_event);
    let hash = gyre_def::definition_hash(&def)
        .map_err(|e| LifecycleError::Definition(gyre_def::DefError::Toml(e.to_string())))?;
    let hash_event = Event::Reloaded { hash };
    wal.append(&hash_event)?;
    state.apply_event(&hash_event);
    wal.flush()?;

    let contact = ContactInfo {
        host: hostname(),
        port: 0,
        pid: std::process::id(),
        uuid,
        version: version.to_string(),
        socket: config.socket_path.display().to_string(),
    };
    contact.write(&config.contact_path)?;

    Ok(StartupResult {
        daemon: DaemonState {
            config,
            lock_file,
            contact,
            runtime,
            state: std::sync::Arc::new(parking_lot::Mutex::new(state)),
            wal,
            restarted,
        },
        initial_effects,
    })
}

fn process_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

fn hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|h| h.trim().to_string())
        .unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
