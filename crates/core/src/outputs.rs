// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task outputs and completion expressions.
//!
//! Every proxy carries the standard outputs plus any custom outputs its
//! definition declares. A completion expression over output names decides
//! when the proxy is output-complete and eligible for removal.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const OUTPUT_SUBMITTED: &str = "submitted";
pub const OUTPUT_STARTED: &str = "started";
pub const OUTPUT_SUCCEEDED: &str = "succeeded";
pub const OUTPUT_FAILED: &str = "failed";
pub const OUTPUT_SUBMIT_FAILED: &str = "submit-failed";
pub const OUTPUT_EXPIRED: &str = "expired";

/// Standard outputs every task carries.
pub const STANDARD_OUTPUTS: [&str; 6] = [
    OUTPUT_SUBMITTED,
    OUTPUT_STARTED,
    OUTPUT_SUCCEEDED,
    OUTPUT_FAILED,
    OUTPUT_SUBMIT_FAILED,
    OUTPUT_EXPIRED,
];

/// Boolean expression over output names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionExpr {
    Output(String),
    All(Vec<CompletionExpr>),
    Any(Vec<CompletionExpr>),
}

impl CompletionExpr {
    /// The default completion requirement: the task succeeded.
    pub fn succeeded() -> Self {
        CompletionExpr::Output(OUTPUT_SUCCEEDED.to_string())
    }

    pub fn eval(&self, completed: &impl Fn(&str) -> bool) -> bool {
        match self {
            CompletionExpr::Output(name) => completed(name),
            CompletionExpr::All(parts) => parts.iter().all(|p| p.eval(completed)),
            CompletionExpr::Any(parts) => parts.iter().any(|p| p.eval(completed)),
        }
    }

    /// All output names the expression references.
    pub fn outputs(&self) -> Vec<&str> {
        match self {
            CompletionExpr::Output(name) => vec![name.as_str()],
            CompletionExpr::All(parts) | CompletionExpr::Any(parts) => {
                parts.iter().flat_map(|p| p.outputs()).collect()
            }
        }
    }
}

impl Default for CompletionExpr {
    fn default() -> Self {
        Self::succeeded()
    }
}

/// Per-proxy output state: name -> completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSet {
    outputs: IndexMap<String, bool>,
    completion: CompletionExpr,
}

impl OutputSet {
    /// Build with the standard outputs plus the given custom output names.
    pub fn new<I, S>(custom: I, completion: CompletionExpr) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut outputs: IndexMap<String, bool> =
            STANDARD_OUTPUTS.iter().map(|o| (o.to_string(), false)).collect();
        for name in custom {
            outputs.entry(name.into()).or_insert(false);
        }
        Self { outputs, completion }
    }

    /// Mark an output completed. Returns true when this call newly completed
    /// it, false if it was already complete or is not a declared output.
    pub fn complete(&mut self, name: &str) -> bool {
        match self.outputs.get_mut(name) {
            Some(done) if !*done => {
                *done = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    pub fn is_completed(&self, name: &str) -> bool {
        self.outputs.get(name).copied().unwrap_or(false)
    }

    /// Whether the completion expression is satisfied.
    pub fn is_complete(&self) -> bool {
        self.completion.eval(&|name| self.is_completed(name))
    }

    /// Completed output names, in declaration order.
    pub fn completed(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().filter(|(_, done)| **done).map(|(name, _)| name.as_str())
    }

    /// All declared outputs with their completion state.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.outputs.iter().map(|(name, done)| (name.as_str(), *done))
    }

    /// Declared-but-incomplete outputs the completion expression needs,
    /// for stuck-task reporting.
    pub fn missing_for_completion(&self) -> Vec<&str> {
        self.completion
            .outputs()
            .into_iter()
            .filter(|name| !self.is_completed(name))
            .collect()
    }
}

impl Default for OutputSet {
    fn default() -> Self {
        Self::new(Vec::<String>::new(), CompletionExpr::succeeded())
    }
}

#[cfg(test)]
#[path = "outputs_tests.rs"]
mod tests;
