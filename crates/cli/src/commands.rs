// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations.

use crate::cli::{BroadcastArgs, Cli, Command};
use crate::client;
use anyhow::{bail, Context};
use gyre_core::event::MessageSeverity;
use gyre_core::{TaskId, TaskStatus};
use gyre_daemon::protocol::{Query, Request, Response};
use gyre_daemon::Config;
use gyre_engine::{OperatorCommand, StopMode};
use gyre_storage::ContactInfo;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub fn dispatch(args: Cli) -> anyhow::Result<()> {
    let run_dir = args
        .run_dir
        .clone()
        .map_or_else(std::env::current_dir, Ok)
        .context("resolving run directory")?;

    match args.command {
        Command::Play { source, no_detach } => play(&run_dir, &source, no_detach),
        Command::Stop { now, kill } => {
            let mode = if kill {
                StopMode::Kill
            } else {
                match now {
                    0 => StopMode::Request,
                    1 => StopMode::Now,
                    _ => StopMode::NowNow,
                }
            };
            command(&run_dir, OperatorCommand::Stop { mode })
        }
        Command::Hold { tasks, after } => {
            let after = after.map(|t| parse_point(&t)).transpose()?;
            command(&run_dir, OperatorCommand::Hold { tasks: parse_tasks(&tasks)?, after })
        }
        Command::Release { tasks, all } => {
            let all = all || tasks.is_empty();
            command(&run_dir, OperatorCommand::Release { tasks: parse_tasks(&tasks)?, all })
        }
        Command::Trigger { tasks } => {
            command(&run_dir, OperatorCommand::Trigger { tasks: parse_tasks(&tasks)? })
        }
        Command::Insert { tasks } => {
            command(&run_dir, OperatorCommand::Insert { tasks: parse_tasks(&tasks)? })
        }
        Command::Remove { tasks } => {
            command(&run_dir, OperatorCommand::Remove { tasks: parse_tasks(&tasks)? })
        }
        Command::Reset { tasks, status } => {
            let status = parse_status(&status)?;
            command(&run_dir, OperatorCommand::Reset { tasks: parse_tasks(&tasks)?, status })
        }
        Command::SetVerbosity { level } => {
            command(&run_dir, OperatorCommand::SetVerbosity { level })
        }
        Command::Reload => command(&run_dir, OperatorCommand::Reload),
        Command::Broadcast(args) => broadcast(&run_dir, args),
        Command::Pause => command(&run_dir, OperatorCommand::Pause),
        Command::Resume => command(&run_dir, OperatorCommand::Resume),
        Command::Status => status(&run_dir),
        Command::List => list(&run_dir),
        Command::Show { task } => show(&run_dir, &task),
        Command::LsCheckpoints => ls_checkpoints(&run_dir),
        Command::Message { task, message, severity } => {
            let id = parse_task(&task)?;
            let severity = parse_severity(&severity)?;
            client::expect_ok(client::request(
                &run_dir,
                Request::Message { id, severity, message },
            )?)
        }
    }
}

fn command(run_dir: &Path, command: OperatorCommand) -> anyhow::Result<()> {
    client::expect_ok(client::request(run_dir, Request::Command { command })?)
}

/// Install the definition into the run dir and launch `gyred`.
fn play(run_dir: &Path, source: &Path, no_detach: bool) -> anyhow::Result<()> {
    let flow_source = if source.is_dir() { source.join("flow.toml") } else { source.to_path_buf() };
    if !flow_source.is_file() {
        bail!("no workflow definition at {}", flow_source.display());
    }

    let config = Config::from_run_dir(run_dir);
    config.create_dirs().context("creating run directory")?;
    std::fs::copy(&flow_source, &config.flow_path).context("installing flow.toml")?;
    std::fs::write(&config.source_path, flow_source.display().to_string())
        .context("recording source path")?;

    let gyred = gyred_path()?;
    if no_detach {
        let status = std::process::Command::new(gyred)
            .arg(run_dir)
            .status()
            .context("running gyred")?;
        if !status.success() {
            bail!("scheduler exited with {status}");
        }
        return Ok(());
    }

    std::process::Command::new(gyred)
        .arg(run_dir)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("spawning gyred")?;

    // Wait for the contact file to appear.
    let deadline = Instant::now() + Duration::from_secs(30);
    let contact_path = config.contact_path;
    loop {
        if let Ok(contact) = ContactInfo::read(&contact_path) {
            println!("scheduler running: pid {} on {}", contact.pid, contact.host);
            return Ok(());
        }
        if Instant::now() > deadline {
            bail!(
                "scheduler did not come up; see {}",
                config.scheduler_log_dir.join("log").display()
            );
        }
        std::thread::sleep(Duration::from_millis(200));
    }
}

/// `gyred` is installed beside the `gyre` binary.
fn gyred_path() -> anyhow::Result<PathBuf> {
    let me = std::env::current_exe().context("locating gyre binary")?;
    let dir = me.parent().context("locating gyre binary directory")?;
    let gyred = dir.join("gyred");
    if gyred.is_file() {
        Ok(gyred)
    } else {
        // Fall back to PATH lookup.
        Ok(PathBuf::from("gyred"))
    }
}

fn broadcast(run_dir: &Path, args: BroadcastArgs) -> anyhow::Result<()> {
    if args.clear {
        return command(
            run_dir,
            OperatorCommand::ClearBroadcast {
                point_expr: args.point,
                name_expr: args.namespace,
            },
        );
    }
    if args.settings.is_empty() {
        bail!("broadcast needs at least one key=value setting");
    }
    let overrides = settings_to_value(&args.settings)?;
    command(
        run_dir,
        OperatorCommand::Broadcast {
            point_expr: args.point,
            name_expr: args.namespace,
            overrides,
        },
    )
}

/// `environment.NAME=bob` -> `{"environment": {"NAME": "bob"}}`.
fn settings_to_value(settings: &[String]) -> anyhow::Result<Value> {
    let mut root = Value::Object(serde_json::Map::new());
    for setting in settings {
        let (key, value) = setting
            .split_once('=')
            .with_context(|| format!("setting {setting:?} is not key=value"))?;
        let parts: Vec<&str> = key.split('.').collect();
        insert_dotted(&mut root, &parts, value, setting)?;
    }
    Ok(root)
}

fn insert_dotted(
    slot: &mut Value,
    parts: &[&str],
    value: &str,
    setting: &str,
) -> anyhow::Result<()> {
    let map = slot
        .as_object_mut()
        .with_context(|| format!("setting {setting:?} conflicts with a scalar"))?;
    if parts.len() == 1 {
        map.insert(parts[0].to_string(), Value::String(value.to_string()));
        Ok(())
    } else {
        let next = map
            .entry(parts[0].to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        insert_dotted(next, &parts[1..], value, setting)
    }
}

fn status(run_dir: &Path) -> anyhow::Result<()> {
    match client::request(run_dir, Request::Query { query: Query::Status })? {
        Response::Status { status } => {
            println!("workflow: {}", status.workflow);
            println!("uuid: {}", status.uuid);
            println!("paused: {}", status.paused);
            println!("stopping: {}", status.stopping);
            println!("pool size: {}", status.pool_size);
            if let Some(point) = status.oldest_active_point {
                println!("oldest active point: {point}");
            }
            Ok(())
        }
        Response::Error { message } => bail!("{message}"),
        other => bail!("unexpected response: {other:?}"),
    }
}

fn list(run_dir: &Path) -> anyhow::Result<()> {
    match client::request(run_dir, Request::Query { query: Query::Tasks })? {
        Response::Tasks { tasks } => {
            for task in tasks {
                let held = if task.is_held { " (held)" } else { "" };
                println!("{} {}{held} submits={}", task.id, task.status, task.submit_num);
            }
            Ok(())
        }
        Response::Error { message } => bail!("{message}"),
        other => bail!("unexpected response: {other:?}"),
    }
}

fn show(run_dir: &Path, task: &str) -> anyhow::Result<()> {
    let task = parse_task(task)?;
    match client::request(run_dir, Request::Query { query: Query::Show { task } })? {
        Response::Show { detail } => {
            println!("{} {}", detail.id, detail.status);
            if !detail.prerequisites.is_empty() {
                println!("prerequisites:");
                for expr in &detail.prerequisites {
                    println!("  {expr}");
                }
                for atom in &detail.atoms {
                    println!("    {atom}");
                }
            }
            if !detail.outputs.is_empty() {
                println!("outputs:");
                for (name, done) in &detail.outputs {
                    let mark = if *done { '+' } else { '-' };
                    println!("  {mark} {name}");
                }
            }
            if !detail.xtriggers.is_empty() {
                println!("xtriggers:");
                for (label, satisfied) in &detail.xtriggers {
                    let mark = if *satisfied { '+' } else { '-' };
                    println!("  {mark} {label}");
                }
            }
            Ok(())
        }
        Response::Error { message } => bail!("{message}"),
        other => bail!("unexpected response: {other:?}"),
    }
}

fn ls_checkpoints(run_dir: &Path) -> anyhow::Result<()> {
    match client::request(run_dir, Request::Query { query: Query::Checkpoints })? {
        Response::Checkpoints { checkpoints } => {
            println!("id  time                  event");
            for entry in checkpoints {
                println!("{:<3} {:<21} {}", entry.id, entry.time, entry.event);
            }
            Ok(())
        }
        Response::Error { message } => bail!("{message}"),
        other => bail!("unexpected response: {other:?}"),
    }
}

fn parse_tasks(texts: &[String]) -> anyhow::Result<Vec<TaskId>> {
    texts.iter().map(|t| parse_task(t)).collect()
}

fn parse_task(text: &str) -> anyhow::Result<TaskId> {
    TaskId::parse(text).with_context(|| format!("invalid task id {text:?} (want point/name)"))
}

fn parse_point(text: &str) -> anyhow::Result<gyre_core::CyclePoint> {
    gyre_core::CyclePoint::parse_any(text)
        .with_context(|| format!("invalid cycle point {text:?}"))
}

fn parse_status(text: &str) -> anyhow::Result<TaskStatus> {
    serde_json::from_value(Value::String(text.to_string()))
        .with_context(|| format!("invalid status {text:?}"))
}

fn parse_severity(text: &str) -> anyhow::Result<MessageSeverity> {
    serde_json::from_value(Value::String(text.to_string()))
        .with_context(|| format!("invalid severity {text:?}"))
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
