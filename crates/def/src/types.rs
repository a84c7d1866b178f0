// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolved definition types consumed by the scheduler.

use gyre_core::duration::IntervalList;
use gyre_core::outputs::{CompletionExpr, OutputSet};
use gyre_core::point::{CyclePoint, PointMode};
use gyre_core::prereq::{Condition, PrereqAtom, Prerequisite};
use gyre_core::sequence::Sequence;
use gyre_core::{CycleDuration, TaskId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder substituted with the target cycle point in xtrigger
/// arguments. An xtrigger with no placeholder anywhere in its arguments is
/// not cycle-point-specific and is called at most once per run.
pub const POINT_PLACEHOLDER: &str = "%(point)s";

/// Scheduler tunables from the `[scheduler]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub runahead_limit: Option<CycleDuration>,
    pub max_batch_size: usize,
    /// Worker pool size; `None` means the CPU count.
    pub process_pool_size: Option<usize>,
    /// Per-handler subprocess timeout.
    pub process_pool_timeout: Duration,
    pub stall_timeout: Option<Duration>,
    pub abort_on_stall: bool,
    pub inactivity_timeout: Option<Duration>,
    pub abort_on_inactivity: bool,
    /// Default for xtriggers that do not set `sequential` themselves.
    pub sequential_xtriggers: bool,
    /// Workflow-level event handlers (startup, shutdown, stall, ...).
    pub handlers: Vec<HandlerDef>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            runahead_limit: None,
            max_batch_size: 100,
            process_pool_size: None,
            process_pool_timeout: Duration::from_secs(10),
            stall_timeout: None,
            abort_on_stall: false,
            inactivity_timeout: None,
            abort_on_inactivity: false,
            sequential_xtriggers: false,
            handlers: Vec::new(),
        }
    }
}

/// One event-handler command bound to a set of event names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerDef {
    pub events: Vec<String>,
    pub command: String,
}

/// Inheritance-flattened runtime settings for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRuntime {
    pub script: String,
    pub platform: String,
    pub environment: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_limit: Option<Duration>,
    #[serde(default)]
    pub submission_retry_delays: IntervalList,
    #[serde(default)]
    pub execution_retry_delays: IntervalList,
    #[serde(default)]
    pub submission_polling_intervals: IntervalList,
    #[serde(default)]
    pub execution_polling_intervals: IntervalList,
    /// Forced-poll cadence once a declared execution time limit has passed.
    #[serde(default)]
    pub execution_time_limit_polling_intervals: IntervalList,
    #[serde(default)]
    pub handlers: Vec<HandlerDef>,
    /// Declares the task expirable at `cycle point + offset`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_offset: Option<CycleDuration>,
    /// Custom output name -> trigger message (matched by equality).
    #[serde(default)]
    pub custom_outputs: IndexMap<String, String>,
    /// Completion expression; defaults to `succeeded`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionExpr>,
}

impl Default for TaskRuntime {
    fn default() -> Self {
        Self {
            script: String::new(),
            platform: "localhost".to_string(),
            environment: IndexMap::new(),
            execution_time_limit: None,
            submission_retry_delays: IntervalList::default(),
            execution_retry_delays: IntervalList::default(),
            submission_polling_intervals: IntervalList::default(),
            execution_polling_intervals: IntervalList::default(),
            execution_time_limit_polling_intervals: IntervalList::default(),
            handlers: Vec::new(),
            expire_offset: None,
            custom_outputs: IndexMap::new(),
            completion: None,
        }
    }
}

impl TaskRuntime {
    /// The output name a job message satisfies, by message equality.
    pub fn output_for_message(&self, message: &str) -> Option<&str> {
        self.custom_outputs
            .iter()
            .find(|(_, trigger)| trigger.as_str() == message)
            .map(|(name, _)| name.as_str())
    }
}

/// An xtrigger declaration: function name and bound arguments, before
/// cycle-point substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XtriggerDef {
    pub function: String,
    #[serde(default)]
    pub args: IndexMap<String, String>,
    /// Overrides the workflow-wide sequential default when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequential: Option<bool>,
}

impl XtriggerDef {
    /// Whether any argument depends on the cycle point.
    pub fn is_point_specific(&self) -> bool {
        self.args.values().any(|v| v.contains(POINT_PLACEHOLDER))
    }

    /// Arguments after cycle-point substitution.
    pub fn resolved_args(&self, point: &CyclePoint) -> IndexMap<String, String> {
        let point_text = point.to_string();
        self.args
            .iter()
            .map(|(k, v)| (k.clone(), v.replace(POINT_PLACEHOLDER, &point_text)))
            .collect()
    }

    /// Cache key after cycle-point substitution:
    /// `func(k1=v1, k2=v2)`.
    pub fn signature(&self, point: &CyclePoint) -> String {
        let point_text = point.to_string();
        let args = self
            .args
            .iter()
            .map(|(k, v)| format!("{}={}", k, v.replace(POINT_PLACEHOLDER, &point_text)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.function, args)
    }
}

/// Trigger expression carried by a graph edge.
///
/// After flattening, `Family` nodes have been expanded into `All`/`Any`
/// over member triggers; the scheduler only ever sees plain atoms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerExpr {
    Trigger {
        task: String,
        output: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset: Option<CycleDuration>,
    },
    Family {
        family: String,
        output: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset: Option<CycleDuration>,
        /// true: OR over members (`:fail-any` style); false: AND.
        #[serde(default)]
        any: bool,
    },
    All(Vec<TriggerExpr>),
    Any(Vec<TriggerExpr>),
}

impl TriggerExpr {
    /// Visit every `(task, output, offset)` atom in the expression.
    pub fn visit_atoms<'a>(&'a self, f: &mut impl FnMut(&'a str, &'a str, Option<&'a CycleDuration>)) {
        match self {
            TriggerExpr::Trigger { task, output, offset } => {
                f(task, output, offset.as_ref())
            }
            TriggerExpr::Family { .. } => {}
            TriggerExpr::All(parts) | TriggerExpr::Any(parts) => {
                for part in parts {
                    part.visit_atoms(f);
                }
            }
        }
    }
}

/// One dependency edge of the graph, scoped to a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub sequence: Sequence,
    pub trigger: TriggerExpr,
    pub target: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub suicide: bool,
}

/// One task of the flattened definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
    pub name: String,
    pub runtime: TaskRuntime,
    /// Sequences this task recurs on.
    pub sequences: Vec<Sequence>,
    /// Labels into [`WorkflowDef::xtriggers`].
    #[serde(default)]
    pub xtriggers: Vec<String>,
    /// Topological depth within one cycle (0 for graph roots). Drives the
    /// pool's deterministic processing order.
    #[serde(default)]
    pub depth: usize,
}

/// The complete, resolved workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
    pub name: String,
    pub cycling: PointMode,
    pub initial_point: CyclePoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_point: Option<CyclePoint>,
    pub scheduler: SchedulerConfig,
    pub tasks: IndexMap<String, TaskDef>,
    pub edges: Vec<GraphEdge>,
    #[serde(default)]
    pub xtriggers: IndexMap<String, XtriggerDef>,
    /// Resolved namespace -> inheritance chain (root last), persisted for
    /// external readers.
    #[serde(default)]
    pub inheritance: IndexMap<String, Vec<String>>,
}

impl WorkflowDef {
    pub fn task(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.get(name)
    }

    /// Build the prerequisites of a proxy at a concrete cycle point.
    ///
    /// Offsets in edge triggers are evaluated against the proxy's point;
    /// references earlier than the initial point are vacuously satisfied.
    pub fn prereqs_for(&self, name: &str, point: &CyclePoint) -> Vec<Prerequisite> {
        let mut prereqs = Vec::new();
        for edge in self.edges.iter().filter(|e| e.target == name) {
            if !edge.sequence.is_on_sequence(point) {
                continue;
            }
            let mut atoms = Vec::new();
            if let Some(expr) = self.build_condition(&edge.trigger, point, &mut atoms) {
                let mut prereq = Prerequisite::new(atoms, expr);
                if edge.suicide {
                    prereq = prereq.suicide();
                }
                prereqs.push(prereq);
            }
        }
        prereqs
    }

    fn build_condition(
        &self,
        expr: &TriggerExpr,
        point: &CyclePoint,
        atoms: &mut Vec<PrereqAtom>,
    ) -> Option<Condition> {
        match expr {
            TriggerExpr::Trigger { task, output, offset } => {
                let upstream_point = match offset {
                    Some(d) => point.offset(d).ok()?,
                    None => *point,
                };
                let atom = if upstream_point < self.initial_point {
                    PrereqAtom::satisfied(task.clone(), upstream_point, output.clone())
                } else {
                    PrereqAtom::new(task.clone(), upstream_point, output.clone())
                };
                atoms.push(atom);
                Some(Condition::Atom(atoms.len() - 1))
            }
            // Families are expanded at flatten time; an unexpanded node is
            // a definition bug caught by validation.
            TriggerExpr::Family { .. } => None,
            TriggerExpr::All(parts) => {
                let conds: Vec<_> = parts
                    .iter()
                    .filter_map(|p| self.build_condition(p, point, atoms))
                    .collect();
                (!conds.is_empty()).then_some(Condition::All(conds))
            }
            TriggerExpr::Any(parts) => {
                let conds: Vec<_> = parts
                    .iter()
                    .filter_map(|p| self.build_condition(p, point, atoms))
                    .collect();
                (!conds.is_empty()).then_some(Condition::Any(conds))
            }
        }
    }

    /// Downstream proxies that an output completion can spawn: every edge
    /// whose trigger references `(upstream, output)` at some offset, with
    /// the child point back-resolved from the completion point.
    pub fn children_of(
        &self,
        upstream: &str,
        point: &CyclePoint,
        output: &str,
    ) -> Vec<TaskId> {
        let mut children = Vec::new();
        for edge in &self.edges {
            let mut offsets: Vec<Option<CycleDuration>> = Vec::new();
            edge.trigger.visit_atoms(&mut |task, out, offset| {
                if task == upstream && out == output {
                    offsets.push(offset.copied());
                }
            });
            for offset in offsets {
                let child_point = match offset {
                    // The upstream sits at `child + offset`, so the child
                    // is at `completion point - offset`.
                    Some(d) => match point.offset(&d.negated()) {
                        Ok(p) => p,
                        Err(_) => continue,
                    },
                    None => *point,
                };
                if !edge.sequence.is_on_sequence(&child_point) {
                    continue;
                }
                if self.past_final(&child_point) {
                    continue;
                }
                let id = TaskId::new(edge.target.clone(), child_point);
                if !children.contains(&id) {
                    children.push(id);
                }
            }
        }
        children
    }

    /// The output set for a new proxy of this task.
    pub fn outputs_for(&self, name: &str) -> OutputSet {
        match self.tasks.get(name) {
            Some(task) => OutputSet::new(
                task.runtime.custom_outputs.keys().cloned(),
                task.runtime.completion.clone().unwrap_or_default(),
            ),
            None => OutputSet::default(),
        }
    }

    /// First point of each task at or after the initial point: the
    /// proxies spawned at cold start.
    pub fn initial_tasks(&self) -> Vec<TaskId> {
        let mut out = Vec::new();
        for task in self.tasks.values() {
            let mut first: Option<CyclePoint> = None;
            for seq in &task.sequences {
                if let Some(p) = seq.first() {
                    if !self.past_final(&p) {
                        first = Some(match first {
                            Some(existing) if existing <= p => existing,
                            _ => p,
                        });
                    }
                }
            }
            if let Some(p) = first {
                out.push(TaskId::new(task.name.clone(), p));
            }
        }
        out.sort();
        out
    }

    /// Next point of a task strictly after the given point, over all its
    /// sequences, bounded by the final point.
    pub fn next_point(&self, name: &str, after: &CyclePoint) -> Option<CyclePoint> {
        let task = self.tasks.get(name)?;
        task.sequences
            .iter()
            .filter_map(|seq| seq.next_after(after))
            .filter(|p| !self.past_final(p))
            .min()
    }

    pub fn is_on_any_sequence(&self, name: &str, point: &CyclePoint) -> bool {
        self.tasks
            .get(name)
            .map(|t| t.sequences.iter().any(|s| s.is_on_sequence(point)))
            .unwrap_or(false)
    }

    fn past_final(&self, point: &CyclePoint) -> bool {
        self.final_point.map(|f| *point > f).unwrap_or(false)
    }

    /// Effective sequential flag for one of this workflow's xtriggers.
    pub fn xtrigger_sequential(&self, label: &str) -> bool {
        self.xtriggers
            .get(label)
            .and_then(|x| x.sequential)
            .unwrap_or(self.scheduler.sequential_xtriggers)
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
