// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw definition-file form (`flow.toml`) and its resolution into a
//! [`WorkflowDef`].
//!
//! The file is structured data throughout; string leaves (points,
//! durations, interval lists) are parsed by gyre-core.

use crate::flatten;
use crate::types::{
    GraphEdge, HandlerDef, SchedulerConfig, TaskDef, TriggerExpr, WorkflowDef, XtriggerDef,
};
use crate::validate::{self, DefError};
use gyre_core::duration::IntervalList;
use gyre_core::outputs::CompletionExpr;
use gyre_core::point::{CyclePoint, PointMode};
use gyre_core::sequence::Sequence;
use gyre_core::CycleDuration;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Load and resolve a definition file.
pub fn load_file(path: &Path) -> Result<WorkflowDef, DefError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| DefError::Io(path.display().to_string(), e.to_string()))?;
    parse_str(&text)
}

/// Parse and resolve definition text.
pub fn parse_str(text: &str) -> Result<WorkflowDef, DefError> {
    let raw: RawWorkflow = toml::from_str(text).map_err(|e| DefError::Toml(e.to_string()))?;
    raw.resolve()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawWorkflow {
    pub workflow: RawMeta,
    #[serde(default)]
    pub scheduler: RawScheduler,
    #[serde(default)]
    pub runtime: IndexMap<String, RawRuntime>,
    #[serde(default)]
    pub tasks: IndexMap<String, RawTask>,
    #[serde(default)]
    pub graph: Vec<RawGraphSection>,
    #[serde(default)]
    pub xtriggers: IndexMap<String, RawXtrigger>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMeta {
    pub name: String,
    pub cycling: PointMode,
    pub initial_cycle_point: Option<String>,
    #[serde(default)]
    pub final_cycle_point: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawScheduler {
    #[serde(default)]
    pub runahead_limit: Option<String>,
    #[serde(default)]
    pub max_batch_size: Option<usize>,
    #[serde(default)]
    pub process_pool_size: Option<usize>,
    #[serde(default)]
    pub process_pool_timeout: Option<String>,
    #[serde(default)]
    pub stall_timeout: Option<String>,
    #[serde(default)]
    pub abort_on_stall: Option<bool>,
    #[serde(default)]
    pub inactivity_timeout: Option<String>,
    #[serde(default)]
    pub abort_on_inactivity: Option<bool>,
    #[serde(default)]
    pub sequential_xtriggers: Option<bool>,
    #[serde(default)]
    pub handlers: Vec<HandlerDef>,
}

/// One `[runtime.<namespace>]` block. A namespace is a task when a matching
/// `[tasks.<name>]` block exists; otherwise it is a family.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRuntime {
    #[serde(default)]
    pub inherit: Vec<String>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub environment: IndexMap<String, String>,
    #[serde(default)]
    pub execution_time_limit: Option<String>,
    #[serde(default)]
    pub submission_retry_delays: Option<String>,
    #[serde(default)]
    pub execution_retry_delays: Option<String>,
    #[serde(default)]
    pub submission_polling_intervals: Option<String>,
    #[serde(default)]
    pub execution_polling_intervals: Option<String>,
    #[serde(default)]
    pub execution_time_limit_polling_intervals: Option<String>,
    #[serde(default)]
    pub handlers: Vec<HandlerDef>,
    #[serde(default)]
    pub expire_offset: Option<String>,
    /// Custom output name -> trigger message.
    #[serde(default)]
    pub outputs: IndexMap<String, String>,
    #[serde(default)]
    pub completion: Option<CompletionExpr>,
    #[serde(default)]
    pub xtriggers: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTask {
    #[serde(default)]
    pub sequences: Vec<RawSequence>,
}

/// A recurrence in raw form: exactly one of `once`, `repeat`, or a stride.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSequence {
    #[serde(default)]
    pub once: Option<String>,
    #[serde(default)]
    pub repeat: Option<RawRepeat>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub stride: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
}

/// Deprecated `Rn/start/stop` recurrence form.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRepeat {
    pub count: u32,
    pub start: String,
    pub stop: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawGraphSection {
    pub sequence: RawSequence,
    pub edges: Vec<RawEdge>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawEdge {
    pub target: String,
    #[serde(default)]
    pub suicide: bool,
    /// ANDed together; a single entry is the common case.
    pub triggers: Vec<TriggerExpr>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawXtrigger {
    pub function: String,
    #[serde(default)]
    pub args: IndexMap<String, String>,
    #[serde(default)]
    pub sequential: Option<bool>,
}

impl RawWorkflow {
    /// Flatten, validate, and resolve into the form the scheduler consumes.
    pub fn resolve(self) -> Result<WorkflowDef, DefError> {
        let mode = self.workflow.cycling;
        let initial_point = match &self.workflow.initial_cycle_point {
            Some(text) => CyclePoint::parse(text, mode)
                .map_err(|e| DefError::Point(text.clone(), e.to_string()))?,
            None => return Err(DefError::MissingInitialPoint),
        };
        let final_point = self
            .workflow
            .final_cycle_point
            .as_ref()
            .map(|text| {
                CyclePoint::parse(text, mode)
                    .map_err(|e| DefError::Point(text.clone(), e.to_string()))
            })
            .transpose()?;

        let scheduler = resolve_scheduler(&self.scheduler)?;
        let (runtimes, inheritance) = flatten::flatten_runtimes(&self.runtime)?;

        let mut tasks = IndexMap::new();
        for (name, raw_task) in &self.tasks {
            let runtime = runtimes.get(name).cloned().unwrap_or_default();
            let raw_runtime = self.runtime.get(name);
            let mut sequences = Vec::new();
            for raw_seq in &raw_task.sequences {
                sequences.push(resolve_sequence(raw_seq, mode, &initial_point)?);
            }
            if sequences.is_empty() {
                // A task with no explicit recurrence runs once at the
                // initial point.
                sequences.push(Sequence::once(initial_point));
            }
            tasks.insert(
                name.clone(),
                TaskDef {
                    name: name.clone(),
                    runtime,
                    sequences,
                    xtriggers: raw_runtime.map(|r| r.xtriggers.clone()).unwrap_or_default(),
                    depth: 0,
                },
            );
        }

        let members = flatten::family_members(&inheritance, &tasks);

        let mut edges = Vec::new();
        for section in &self.graph {
            let sequence = resolve_sequence(&section.sequence, mode, &initial_point)?;
            for raw_edge in &section.edges {
                let trigger = if raw_edge.triggers.len() == 1 {
                    raw_edge.triggers[0].clone()
                } else {
                    TriggerExpr::All(raw_edge.triggers.clone())
                };
                let trigger = flatten::expand_families(trigger, &members)?;
                edges.push(GraphEdge {
                    sequence: sequence.clone(),
                    trigger,
                    target: raw_edge.target.clone(),
                    suicide: raw_edge.suicide,
                });
            }
        }

        let xtriggers = self
            .xtriggers
            .iter()
            .map(|(label, raw)| {
                (
                    label.clone(),
                    XtriggerDef {
                        function: raw.function.clone(),
                        args: raw.args.clone(),
                        sequential: raw.sequential,
                    },
                )
            })
            .collect();

        let mut def = WorkflowDef {
            name: self.workflow.name.clone(),
            cycling: mode,
            initial_point,
            final_point,
            scheduler,
            tasks,
            edges,
            xtriggers,
            inheritance,
        };
        compute_depths(&mut def);
        validate::validate(&def)?;
        Ok(def)
    }
}

/// Topological depth within one cycle: longest same-cycle upstream chain.
/// Cross-cycle edges (non-zero offsets) do not contribute.
fn compute_depths(def: &mut WorkflowDef) {
    let mut same_cycle: Vec<(String, String)> = Vec::new();
    for edge in &def.edges {
        edge.trigger.visit_atoms(&mut |task, _, offset| {
            if offset.is_none() {
                same_cycle.push((task.to_string(), edge.target.clone()));
            }
        });
    }
    // Fixed point; bounded by task count, cycles cannot deepen forever.
    let task_count = def.tasks.len();
    for _ in 0..task_count {
        let mut changed = false;
        for (upstream, target) in &same_cycle {
            let up_depth = def.tasks.get(upstream).map(|t| t.depth).unwrap_or(0);
            if let Some(task) = def.tasks.get_mut(target) {
                if task.depth < up_depth + 1 {
                    task.depth = up_depth + 1;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
}

fn resolve_scheduler(raw: &RawScheduler) -> Result<SchedulerConfig, DefError> {
    let defaults = SchedulerConfig::default();
    Ok(SchedulerConfig {
        runahead_limit: raw
            .runahead_limit
            .as_ref()
            .map(|t| parse_duration(t))
            .transpose()?,
        max_batch_size: raw.max_batch_size.unwrap_or(defaults.max_batch_size),
        process_pool_size: raw.process_pool_size,
        process_pool_timeout: raw
            .process_pool_timeout
            .as_ref()
            .map(|t| parse_exact(t))
            .transpose()?
            .unwrap_or(defaults.process_pool_timeout),
        stall_timeout: raw.stall_timeout.as_ref().map(|t| parse_exact(t)).transpose()?,
        abort_on_stall: raw.abort_on_stall.unwrap_or(false),
        inactivity_timeout: raw
            .inactivity_timeout
            .as_ref()
            .map(|t| parse_exact(t))
            .transpose()?,
        abort_on_inactivity: raw.abort_on_inactivity.unwrap_or(false),
        sequential_xtriggers: raw.sequential_xtriggers.unwrap_or(false),
        handlers: raw.handlers.clone(),
    })
}

pub(crate) fn parse_duration(text: &str) -> Result<CycleDuration, DefError> {
    CycleDuration::parse(text).map_err(|e| DefError::Duration(text.to_string(), e.to_string()))
}

/// A duration with an exact wall-clock value (no months/years/steps).
pub(crate) fn parse_exact(text: &str) -> Result<Duration, DefError> {
    parse_duration(text)?
        .as_std()
        .ok_or_else(|| DefError::Duration(text.to_string(), "not an exact duration".to_string()))
}

pub(crate) fn parse_intervals(text: &str) -> Result<IntervalList, DefError> {
    IntervalList::parse(text).map_err(|e| DefError::Duration(text.to_string(), e.to_string()))
}

fn resolve_sequence(
    raw: &RawSequence,
    mode: PointMode,
    initial: &CyclePoint,
) -> Result<Sequence, DefError> {
    let parse_point = |text: &str| {
        CyclePoint::parse(text, mode).map_err(|e| DefError::Point(text.to_string(), e.to_string()))
    };

    if let Some(once) = &raw.once {
        let point = if once == "^" { *initial } else { parse_point(once)? };
        return Ok(Sequence::once(point));
    }
    if let Some(repeat) = &raw.repeat {
        let start = parse_point(&repeat.start)?;
        let stop = parse_point(&repeat.stop)?;
        return Sequence::from_repeat(repeat.count, start, stop)
            .map_err(|e| DefError::Sequence(e.to_string()));
    }

    let start = match &raw.start {
        Some(text) if text == "^" => *initial,
        Some(text) => parse_point(text)?,
        None => *initial,
    };
    let stride = match &raw.stride {
        Some(text) => parse_duration(text)?,
        None => return Err(DefError::Sequence("recurrence needs a stride".to_string())),
    };
    let end = raw.end.as_ref().map(|t| parse_point(t)).transpose()?;
    let exclusions = raw
        .exclusions
        .iter()
        .map(|t| parse_point(t))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Sequence::bounded(start, stride, end)
        .map_err(|e| DefError::Sequence(e.to_string()))?
        .with_exclusions(exclusions))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
