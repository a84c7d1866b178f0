// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Definition validation. Configuration errors are reported here, before
//! the scheduler starts; a definition that resolves is safe to run.

use crate::types::{TriggerExpr, WorkflowDef};
use gyre_core::outputs::STANDARD_OUTPUTS;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DefError {
    #[error("cannot read {0}: {1}")]
    Io(String, String),
    #[error("definition parse error: {0}")]
    Toml(String),
    #[error("workflow needs an initial cycle point")]
    MissingInitialPoint,
    #[error("invalid cycle point {0:?}: {1}")]
    Point(String, String),
    #[error("invalid duration {0:?}: {1}")]
    Duration(String, String),
    #[error("invalid recurrence: {0}")]
    Sequence(String),
    #[error("inheritance cycle through namespace {0:?}")]
    InheritCycle(String),
    #[error("unknown namespace {0:?} in inherit")]
    UnknownNamespace(String),
    #[error("family {0:?} has no member tasks")]
    EmptyFamily(String),
    #[error("graph references unknown task {0:?}")]
    UnknownTask(String),
    #[error("task {task:?} references unknown xtrigger {label:?}")]
    UnknownXtrigger { task: String, label: String },
    #[error("task {task:?} completion references undeclared output {output:?}")]
    UnknownOutput { task: String, output: String },
}

pub fn validate(def: &WorkflowDef) -> Result<(), DefError> {
    for edge in &def.edges {
        if !def.tasks.contains_key(&edge.target) {
            return Err(DefError::UnknownTask(edge.target.clone()));
        }
        check_trigger_tasks(&edge.trigger, def)?;
    }

    for task in def.tasks.values() {
        for label in &task.xtriggers {
            if !def.xtriggers.contains_key(label) {
                return Err(DefError::UnknownXtrigger {
                    task: task.name.clone(),
                    label: label.clone(),
                });
            }
        }
        if let Some(completion) = &task.runtime.completion {
            for output in completion.outputs() {
                let declared = STANDARD_OUTPUTS.contains(&output)
                    || task.runtime.custom_outputs.contains_key(output);
                if !declared {
                    return Err(DefError::UnknownOutput {
                        task: task.name.clone(),
                        output: output.to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}

fn check_trigger_tasks(trigger: &TriggerExpr, def: &WorkflowDef) -> Result<(), DefError> {
    match trigger {
        TriggerExpr::Trigger { task, .. } => {
            if !def.tasks.contains_key(task) {
                return Err(DefError::UnknownTask(task.clone()));
            }
        }
        // Families are expanded before validation; a survivor means the
        // expansion failed and resolution already errored.
        TriggerExpr::Family { family, .. } => {
            return Err(DefError::EmptyFamily(family.clone()));
        }
        TriggerExpr::All(parts) | TriggerExpr::Any(parts) => {
            for part in parts {
                check_trigger_tasks(part, def)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
