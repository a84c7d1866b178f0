// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Xtrigger engine: external condition gates.
//!
//! An xtrigger is any value implementing [`XtriggerCall`]: call with bound
//! arguments, get `(satisfied, results)`. Dispatch is by function name
//! through a registry resolved at startup, never re-resolved per call.
//! Calls run on the xtrigger worker pool; the engine loop only folds in
//! completed results. A positive result is cached under the resolved
//! signature and reused for any proxy whose signature matches — across
//! restarts too, so trigger functions must be side-effect-free.

use gyre_core::duration::CycleDuration;
use gyre_core::effect::Effect;
use gyre_core::point::CyclePoint;
use gyre_core::task::TaskProxy;
use gyre_core::Clock;
use gyre_def::WorkflowDef;
use gyre_storage::Checkpointer;
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// Capability contract for one xtrigger function.
pub trait XtriggerCall: Send + Sync {
    fn call(&self, args: &IndexMap<String, String>) -> (bool, Value);
}

/// Registry plus result cache and in-flight tracking.
pub struct XtriggerEngine {
    registry: HashMap<String, Arc<dyn XtriggerCall>>,
    /// Signature -> results of satisfied calls. Survives restart.
    cache: HashMap<String, Value>,
    in_flight: HashSet<String>,
}

impl std::fmt::Debug for XtriggerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XtriggerEngine")
            .field("registry", &self.registry.keys().collect::<Vec<_>>())
            .field("cache", &self.cache)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl XtriggerEngine {
    pub fn new() -> Self {
        Self {
            registry: HashMap::new(),
            cache: HashMap::new(),
            in_flight: HashSet::new(),
        }
    }

    /// Registry with the built-in triggers installed.
    pub fn with_builtins(clock: impl Clock + 'static, run_root: PathBuf) -> Self {
        let mut engine = Self::new();
        engine.register("wall_clock", Arc::new(WallClock { clock }));
        engine.register("xrandom", Arc::new(XRandom));
        engine.register("workflow_state", Arc::new(WorkflowState { run_root }));
        engine
    }

    pub fn register(&mut self, name: &str, call: Arc<dyn XtriggerCall>) {
        self.registry.insert(name.to_string(), call);
    }

    pub fn lookup(&self, function: &str) -> Option<Arc<dyn XtriggerCall>> {
        self.registry.get(function).cloned()
    }

    /// Clone of the dispatch table for the executor's worker pool.
    pub fn registry(&self) -> HashMap<String, Arc<dyn XtriggerCall>> {
        self.registry.clone()
    }

    /// Reload the persisted result cache on restart.
    pub fn restore_cache(&mut self, cache: impl IntoIterator<Item = (String, Value)>) {
        self.cache.extend(cache);
    }

    pub fn cached(&self, signature: &str) -> Option<&Value> {
        self.cache.get(signature)
    }

    pub fn record_satisfied(&mut self, signature: &str, results: Value) {
        self.in_flight.remove(signature);
        self.cache.insert(signature.to_string(), results);
    }

    pub fn call_returned(&mut self, signature: &str) {
        self.in_flight.remove(signature);
    }

    /// Effects for a proxy's unsatisfied xtriggers that are neither cached
    /// nor already in flight.
    ///
    /// A trigger with no cycle-point substitution anywhere in its
    /// arguments has one signature for the whole run; the cache therefore
    /// guarantees it is called at most once, restarts included.
    pub fn due_effects(&mut self, def: &WorkflowDef, proxy: &TaskProxy) -> Vec<Effect> {
        let mut effects = Vec::new();
        for (label, satisfied) in &proxy.xtriggers {
            if *satisfied {
                continue;
            }
            let Some(xdef) = def.xtriggers.get(label) else {
                continue;
            };
            let signature = xdef.signature(&proxy.id.point);
            if self.cache.contains_key(&signature) || self.in_flight.contains(&signature) {
                continue;
            }
            self.in_flight.insert(signature.clone());
            effects.push(Effect::CallXtrigger {
                label: label.clone(),
                signature,
                function: xdef.function.clone(),
                args: xdef.resolved_args(&proxy.id.point),
                point: proxy.id.point,
            });
        }
        effects
    }
}

impl Default for XtriggerEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// `wall_clock(offset=D, point=...)`: satisfied once real time reaches
/// `cycle point + offset`.
pub struct WallClock<C: Clock> {
    pub clock: C,
}

impl<C: Clock> XtriggerCall for WallClock<C> {
    fn call(&self, args: &IndexMap<String, String>) -> (bool, Value) {
        let offset = args
            .get("offset")
            .and_then(|text| CycleDuration::parse(text).ok())
            .unwrap_or(CycleDuration::seconds(0));
        let Some(point) = args.get("point").and_then(|t| CyclePoint::parse_any(t).ok())
        else {
            return (false, json!({}));
        };
        let Ok(target) = point.offset(&offset) else {
            return (false, json!({}));
        };
        match target.as_datetime() {
            Some(when) => (self.clock.utc_now() >= when, json!({})),
            // Integer points have no wall-clock meaning.
            None => (false, json!({})),
        }
    }
}

/// `xrandom(probability)`: satisfied for a stable pseudo-random fraction
/// of the signature population. Deterministic per signature so repeated
/// evaluation cannot flap.
pub struct XRandom;

impl XtriggerCall for XRandom {
    fn call(&self, args: &IndexMap<String, String>) -> (bool, Value) {
        let probability: u64 = args
            .get("probability")
            .and_then(|p| p.parse().ok())
            .unwrap_or(50);
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for (key, value) in args {
            for byte in key.bytes().chain(value.bytes()) {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x1000_0000_01b3);
            }
        }
        let satisfied = hash % 100 < probability;
        (satisfied, json!({}))
    }
}

/// `workflow_state(workflow, task, point, status)`: polls another run
/// directory's persisted state for a task status.
pub struct WorkflowState {
    pub run_root: PathBuf,
}

impl XtriggerCall for WorkflowState {
    fn call(&self, args: &IndexMap<String, String>) -> (bool, Value) {
        let (Some(workflow), Some(task), Some(point)) =
            (args.get("workflow"), args.get("task"), args.get("point"))
        else {
            return (false, json!({}));
        };
        let wanted = args.map_or_default("status", "succeeded");
        let checkpoints = Checkpointer::new(
            self.run_root.join(workflow).join(".service").join("checkpoints"),
        );
        let Ok(Some(snapshot)) = checkpoints.load_latest() else {
            return (false, json!({}));
        };
        let Ok(point) = CyclePoint::parse_any(point) else {
            return (false, json!({}));
        };
        let id = gyre_core::TaskId::new(task.clone(), point);
        match snapshot.state.states.get(&id) {
            Some(row) if row.status.to_string() == wanted => {
                (true, json!({ "status": wanted }))
            }
            _ => (false, json!({})),
        }
    }
}

trait ArgsExt {
    fn map_or_default(&self, key: &str, default: &str) -> String;
}

impl ArgsExt for IndexMap<String, String> {
    fn map_or_default(&self, key: &str, default: &str) -> String {
        self.get(key).cloned().unwrap_or_else(|| default.to_string())
    }
}

#[cfg(test)]
#[path = "xtrigger_tests.rs"]
mod tests;
