// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inheritance flattening.
//!
//! Runtime namespaces inherit from families (and ultimately `root`). The
//! scheduler only ever sees the flattened, immutable [`TaskRuntime`] per
//! task; broadcasts overlay on that flattened record at job-construction
//! time.

use crate::config::{self, RawRuntime};
use crate::types::{TaskDef, TaskRuntime, TriggerExpr};
use crate::validate::DefError;
use indexmap::IndexMap;

/// Flatten every namespace. Returns the flattened runtimes and the resolved
/// inheritance chains (self first, root-most last).
pub fn flatten_runtimes(
    raw: &IndexMap<String, RawRuntime>,
) -> Result<(IndexMap<String, TaskRuntime>, IndexMap<String, Vec<String>>), DefError> {
    let mut flattened = IndexMap::new();
    let mut inheritance = IndexMap::new();

    for name in raw.keys() {
        let chain = resolve_chain(name, raw)?;
        // Merge from the root-most ancestor down to the namespace itself.
        let mut merged = RawRuntime::default();
        for ancestor in chain.iter().rev() {
            if let Some(layer) = raw.get(ancestor) {
                merge(&mut merged, layer);
            }
        }
        flattened.insert(name.clone(), to_task_runtime(&merged)?);
        inheritance.insert(name.clone(), chain);
    }

    Ok((flattened, inheritance))
}

/// Inheritance chain for one namespace: `[self, parents.., root]`.
/// Duplicate ancestors keep their first (most specific) position.
fn resolve_chain(
    name: &str,
    raw: &IndexMap<String, RawRuntime>,
) -> Result<Vec<String>, DefError> {
    let mut chain = Vec::new();
    let mut visiting = Vec::new();
    walk_chain(name, raw, &mut chain, &mut visiting)?;
    if name != "root" && raw.contains_key("root") && !chain.iter().any(|n| n == "root") {
        chain.push("root".to_string());
    }
    Ok(chain)
}

fn walk_chain(
    name: &str,
    raw: &IndexMap<String, RawRuntime>,
    chain: &mut Vec<String>,
    visiting: &mut Vec<String>,
) -> Result<(), DefError> {
    if visiting.iter().any(|n| n == name) {
        return Err(DefError::InheritCycle(name.to_string()));
    }
    if chain.iter().any(|n| n == name) {
        return Ok(());
    }
    let runtime = raw
        .get(name)
        .ok_or_else(|| DefError::UnknownNamespace(name.to_string()))?;
    chain.push(name.to_string());
    visiting.push(name.to_string());
    for parent in &runtime.inherit {
        walk_chain(parent, raw, chain, visiting)?;
    }
    visiting.pop();
    Ok(())
}

/// Overlay `layer` onto `base`: scalars replace when set, maps merge with
/// the layer winning, lists replace when non-empty.
fn merge(base: &mut RawRuntime, layer: &RawRuntime) {
    macro_rules! take_scalar {
        ($($field:ident),+) => {
            $( if layer.$field.is_some() { base.$field = layer.$field.clone(); } )+
        };
    }
    take_scalar!(
        script,
        platform,
        execution_time_limit,
        submission_retry_delays,
        execution_retry_delays,
        submission_polling_intervals,
        execution_polling_intervals,
        execution_time_limit_polling_intervals,
        expire_offset,
        completion
    );
    for (k, v) in &layer.environment {
        base.environment.insert(k.clone(), v.clone());
    }
    for (k, v) in &layer.outputs {
        base.outputs.insert(k.clone(), v.clone());
    }
    if !layer.handlers.is_empty() {
        base.handlers = layer.handlers.clone();
    }
    if !layer.xtriggers.is_empty() {
        base.xtriggers = layer.xtriggers.clone();
    }
}

fn to_task_runtime(merged: &RawRuntime) -> Result<TaskRuntime, DefError> {
    let defaults = TaskRuntime::default();
    Ok(TaskRuntime {
        script: merged.script.clone().unwrap_or_default(),
        platform: merged.platform.clone().unwrap_or(defaults.platform),
        environment: merged.environment.clone(),
        execution_time_limit: merged
            .execution_time_limit
            .as_deref()
            .map(config::parse_exact)
            .transpose()?,
        submission_retry_delays: merged
            .submission_retry_delays
            .as_deref()
            .map(config::parse_intervals)
            .transpose()?
            .unwrap_or_default(),
        execution_retry_delays: merged
            .execution_retry_delays
            .as_deref()
            .map(config::parse_intervals)
            .transpose()?
            .unwrap_or_default(),
        submission_polling_intervals: merged
            .submission_polling_intervals
            .as_deref()
            .map(config::parse_intervals)
            .transpose()?
            .unwrap_or_default(),
        execution_polling_intervals: merged
            .execution_polling_intervals
            .as_deref()
            .map(config::parse_intervals)
            .transpose()?
            .unwrap_or_default(),
        execution_time_limit_polling_intervals: merged
            .execution_time_limit_polling_intervals
            .as_deref()
            .map(config::parse_intervals)
            .transpose()?
            .unwrap_or_default(),
        handlers: merged.handlers.clone(),
        expire_offset: merged
            .expire_offset
            .as_deref()
            .map(config::parse_duration)
            .transpose()?,
        custom_outputs: merged.outputs.clone(),
        completion: merged.completion.clone(),
    })
}

/// Family name -> member task names (tasks whose inheritance chain passes
/// through the family).
pub fn family_members(
    inheritance: &IndexMap<String, Vec<String>>,
    tasks: &IndexMap<String, TaskDef>,
) -> IndexMap<String, Vec<String>> {
    let mut members: IndexMap<String, Vec<String>> = IndexMap::new();
    for task_name in tasks.keys() {
        if let Some(chain) = inheritance.get(task_name) {
            for ancestor in chain.iter().skip(1) {
                members.entry(ancestor.clone()).or_default().push(task_name.clone());
            }
        }
    }
    members
}

/// Replace `Family` nodes with `Any`/`All` over the family's member
/// triggers at the same offset.
pub fn expand_families(
    trigger: TriggerExpr,
    members: &IndexMap<String, Vec<String>>,
) -> Result<TriggerExpr, DefError> {
    match trigger {
        TriggerExpr::Family { family, output, offset, any } => {
            let tasks = members
                .get(&family)
                .filter(|m| !m.is_empty())
                .ok_or_else(|| DefError::EmptyFamily(family.clone()))?;
            let parts: Vec<TriggerExpr> = tasks
                .iter()
                .map(|task| TriggerExpr::Trigger {
                    task: task.clone(),
                    output: output.clone(),
                    offset,
                })
                .collect();
            Ok(if any { TriggerExpr::Any(parts) } else { TriggerExpr::All(parts) })
        }
        TriggerExpr::All(parts) => Ok(TriggerExpr::All(
            parts
                .into_iter()
                .map(|p| expand_families(p, members))
                .collect::<Result<_, _>>()?,
        )),
        TriggerExpr::Any(parts) => Ok(TriggerExpr::Any(
            parts
                .into_iter()
                .map(|p| expand_families(p, members))
                .collect::<Result<_, _>>()?,
        )),
        leaf @ TriggerExpr::Trigger { .. } => Ok(leaf),
    }
}

#[cfg(test)]
#[path = "flatten_tests.rs"]
mod tests;
