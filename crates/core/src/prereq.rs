// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prerequisites: boolean expressions over output-satisfaction atoms.
//!
//! Structure is fixed at spawn time; atom bits are monotone
//! (unsatisfied -> satisfied) except for an explicit operator reset.

use crate::id::TaskId;
use crate::point::CyclePoint;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Satisfaction state of one atom, with provenance for manual overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SatisfiedState {
    Unsatisfied,
    Satisfied,
    /// Marked satisfied by operator command rather than an upstream output.
    ForceSatisfied,
}

impl SatisfiedState {
    pub fn is_satisfied(&self) -> bool {
        !matches!(self, SatisfiedState::Unsatisfied)
    }
}

crate::simple_display! {
    SatisfiedState {
        Unsatisfied => "unsatisfied",
        Satisfied => "satisfied",
        ForceSatisfied => "force-satisfied",
    }
}

/// One satisfaction atom: upstream task instance and the output required
/// of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrereqAtom {
    pub task: String,
    pub point: CyclePoint,
    pub output: String,
    pub state: SatisfiedState,
}

impl PrereqAtom {
    pub fn new(task: impl Into<String>, point: CyclePoint, output: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            point,
            output: output.into(),
            state: SatisfiedState::Unsatisfied,
        }
    }

    /// Pre-satisfied atom, used for references earlier than the initial
    /// cycle point (vacuous satisfaction).
    pub fn satisfied(
        task: impl Into<String>,
        point: CyclePoint,
        output: impl Into<String>,
    ) -> Self {
        Self { state: SatisfiedState::Satisfied, ..Self::new(task, point, output) }
    }

    pub fn upstream_id(&self) -> TaskId {
        TaskId::new(self.task.clone(), self.point)
    }
}

/// Expression tree over atom indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Atom(usize),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    fn eval(&self, atoms: &[PrereqAtom]) -> bool {
        match self {
            Condition::Atom(i) => atoms.get(*i).map(|a| a.state.is_satisfied()).unwrap_or(false),
            Condition::All(parts) => parts.iter().all(|p| p.eval(atoms)),
            Condition::Any(parts) => parts.iter().any(|p| p.eval(atoms)),
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Condition::Atom(i) => {
                let _ = write!(out, "{i}");
            }
            Condition::All(parts) => Self::render_group(parts, " & ", out),
            Condition::Any(parts) => Self::render_group(parts, " | ", out),
        }
    }

    fn render_group(parts: &[Condition], sep: &str, out: &mut String) {
        out.push('(');
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                out.push_str(sep);
            }
            part.render(out);
        }
        out.push(')');
    }
}

/// A prerequisite of one task proxy: an expression over satisfaction atoms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisite {
    atoms: Vec<PrereqAtom>,
    expr: Condition,
    /// Suicide prerequisites remove the proxy when satisfied and never
    /// count toward stall detection.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub suicide: bool,
}

impl Prerequisite {
    pub fn new(atoms: Vec<PrereqAtom>, expr: Condition) -> Self {
        Self { atoms, expr, suicide: false }
    }

    /// Single-atom conjunction, the common case.
    pub fn single(atom: PrereqAtom) -> Self {
        Self::new(vec![atom], Condition::Atom(0))
    }

    /// AND of all the given atoms.
    pub fn all(atoms: Vec<PrereqAtom>) -> Self {
        let expr = Condition::All((0..atoms.len()).map(Condition::Atom).collect());
        Self::new(atoms, expr)
    }

    /// OR of all the given atoms (family `fail-any` style expansion).
    pub fn any(atoms: Vec<PrereqAtom>) -> Self {
        let expr = Condition::Any((0..atoms.len()).map(Condition::Atom).collect());
        Self::new(atoms, expr)
    }

    pub fn suicide(mut self) -> Self {
        self.suicide = true;
        self
    }

    pub fn atoms(&self) -> &[PrereqAtom] {
        &self.atoms
    }

    pub fn is_satisfied(&self) -> bool {
        self.expr.eval(&self.atoms)
    }

    /// Mark the atom for `(task, point, output)` satisfied, by message
    /// equality on the output name. Returns true if any atom flipped.
    pub fn satisfy(&mut self, task: &str, point: &CyclePoint, output: &str) -> bool {
        let mut changed = false;
        for atom in &mut self.atoms {
            if atom.task == task
                && atom.point == *point
                && atom.output == output
                && atom.state == SatisfiedState::Unsatisfied
            {
                atom.state = SatisfiedState::Satisfied;
                changed = true;
            }
        }
        changed
    }

    /// Operator override: force every atom satisfied.
    pub fn force_satisfy(&mut self) {
        for atom in &mut self.atoms {
            if atom.state == SatisfiedState::Unsatisfied {
                atom.state = SatisfiedState::ForceSatisfied;
            }
        }
    }

    /// Operator override: reset every atom to unsatisfied.
    pub fn reset(&mut self) {
        for atom in &mut self.atoms {
            atom.state = SatisfiedState::Unsatisfied;
        }
    }

    /// Does any atom reference this upstream output?
    pub fn references(&self, task: &str, point: &CyclePoint, output: &str) -> bool {
        self.atoms
            .iter()
            .any(|a| a.task == task && a.point == *point && a.output == output)
    }

    /// The labelled expression form, e.g. `((0 | 1) & 2)`.
    pub fn render_expr(&self) -> String {
        let mut out = String::new();
        self.expr.render(&mut out);
        out
    }

    /// One line per atom: `+ 0 = 1/foo:succeeded` (`+` satisfied, `-` not).
    pub fn render_atoms(&self) -> Vec<String> {
        self.atoms
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let mark = if a.state.is_satisfied() { '+' } else { '-' };
                format!("{mark} {i} = {}/{}:{}", a.point, a.task, a.output)
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "prereq_tests.rs"]
mod tests;
