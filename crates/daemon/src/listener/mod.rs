// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix-socket command listener.
//!
//! Connections are concurrent, but all mutation funnels through the
//! engine queue: commands and job messages are enqueued for the loop to
//! apply at the top of a tick; queries are answered from a read view the
//! loop refreshes each tick (observers may see a one-tick-stale snapshot).

use crate::lifecycle::SchedulerRuntime;
use crate::protocol::{
    read_message, write_message, CheckpointEntry, ProtocolError, Query, Request, Response,
    ShowDetail, StatusInfo, TaskEntry,
};
use gyre_core::TaskId;
use gyre_engine::{EngineMsg, OperatorCommand, VERBOSITY_LEVELS};
use gyre_storage::ContactInfo;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Read-only view of the scheduler, refreshed by the loop each tick.
pub struct QueryView {
    pub status: StatusInfo,
    pub tasks: Vec<TaskEntry>,
    pub show: HashMap<TaskId, ShowDetail>,
    pub checkpoints: Vec<CheckpointEntry>,
}

impl Default for QueryView {
    fn default() -> Self {
        Self {
            status: StatusInfo {
                workflow: String::new(),
                paused: false,
                stopping: false,
                pool_size: 0,
                oldest_active_point: None,
                uuid: String::new(),
            },
            tasks: Vec::new(),
            show: HashMap::new(),
            checkpoints: Vec::new(),
        }
    }
}

/// Rebuild the read view from the live runtime.
pub fn refresh_view(
    view: &Arc<Mutex<QueryView>>,
    runtime: &SchedulerRuntime,
    contact: &ContactInfo,
    state: &Arc<Mutex<gyre_storage::MaterializedState>>,
) {
    let def = runtime.def();
    let mut tasks = Vec::new();
    let mut show = HashMap::new();
    for proxy in runtime.pool.iter() {
        tasks.push(TaskEntry {
            id: proxy.id.clone(),
            status: proxy.status,
            is_held: proxy.is_held,
            submit_num: proxy.submit_num(),
        });
        let mut prerequisites = Vec::new();
        let mut atoms = Vec::new();
        for prereq in &proxy.prereqs {
            prerequisites.push(prereq.render_expr());
            atoms.extend(prereq.render_atoms());
        }
        show.insert(
            proxy.id.clone(),
            ShowDetail {
                id: proxy.id.clone(),
                status: proxy.status,
                prerequisites,
                atoms,
                outputs: proxy
                    .outputs
                    .iter()
                    .map(|(name, done)| (name.to_string(), done))
                    .collect(),
                xtriggers: proxy
                    .xtriggers
                    .iter()
                    .map(|(label, satisfied)| (label.clone(), *satisfied))
                    .collect(),
            },
        );
    }

    let checkpoints = state
        .lock()
        .checkpoints
        .iter()
        .map(|row| CheckpointEntry {
            id: row.id,
            event: row.event.clone(),
            time: row.time.clone(),
        })
        .collect();

    let mut guard = view.lock();
    guard.status = StatusInfo {
        workflow: def.name.clone(),
        paused: runtime.is_paused(),
        stopping: runtime.stopping().is_some(),
        pool_size: runtime.pool.len(),
        oldest_active_point: runtime.pool.oldest_active_point().map(|p| p.to_string()),
        uuid: contact.uuid.clone(),
    };
    guard.tasks = tasks;
    guard.show = show;
    guard.checkpoints = checkpoints;
}

/// Accept loop; one task per connection.
pub async fn serve(
    listener: UnixListener,
    tx: mpsc::Sender<EngineMsg>,
    view: Arc<Mutex<QueryView>>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let tx = tx.clone();
                let view = Arc::clone(&view);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, tx, view).await {
                        match e {
                            ProtocolError::Closed => {}
                            other => debug!(error = %other, "connection error"),
                        }
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                return;
            }
        }
    }
}

async fn handle_connection(
    mut stream: UnixStream,
    tx: mpsc::Sender<EngineMsg>,
    view: Arc<Mutex<QueryView>>,
) -> Result<(), ProtocolError> {
    loop {
        let request: Request = read_message(&mut stream).await?;
        let response = respond(request, &tx, &view).await;
        write_message(&mut stream, &response).await?;
    }
}

async fn respond(
    request: Request,
    tx: &mpsc::Sender<EngineMsg>,
    view: &Arc<Mutex<QueryView>>,
) -> Response {
    match request {
        Request::Ping => Response::Ok,

        Request::Command { command } => {
            // Validate what can be validated synchronously so the client
            // gets a real error instead of a fire-and-forget Ok.
            if let OperatorCommand::SetVerbosity { level } = &command {
                if !VERBOSITY_LEVELS.contains(&level.as_str()) {
                    return Response::error(format!("illegal verbosity level: {level:?}"));
                }
            }
            match tx.send(EngineMsg::Command(command)).await {
                Ok(()) => Response::Ok,
                Err(_) => Response::error("scheduler is shutting down"),
            }
        }

        Request::Message { id, severity, message } => {
            match tx.send(EngineMsg::TaskMessage { id, severity, message }).await {
                Ok(()) => Response::Ok,
                Err(_) => Response::error("scheduler is shutting down"),
            }
        }

        Request::Query { query } => {
            let view = view.lock();
            match query {
                Query::Status => Response::Status { status: view.status.clone() },
                Query::Tasks => Response::Tasks { tasks: view.tasks.clone() },
                Query::Show { task } => match view.show.get(&task) {
                    Some(detail) => Response::Show { detail: detail.clone() },
                    None => Response::error(format!("no such task: {task}")),
                },
                Query::Checkpoints => {
                    Response::Checkpoints { checkpoints: view.checkpoints.clone() }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
