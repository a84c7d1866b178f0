// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn atom(task: &str, point: i64, output: &str) -> PrereqAtom {
    PrereqAtom::new(task, CyclePoint::Integer(point), output)
}

#[test]
fn single_atom_satisfaction() {
    let mut p = Prerequisite::single(atom("foo", 1, "succeeded"));
    assert!(!p.is_satisfied());

    // Message equality, not substring: "succeeded-ish" must not match.
    assert!(!p.satisfy("foo", &CyclePoint::Integer(1), "succeeded-ish"));
    assert!(!p.is_satisfied());

    assert!(p.satisfy("foo", &CyclePoint::Integer(1), "succeeded"));
    assert!(p.is_satisfied());

    // Second delivery is a no-op.
    assert!(!p.satisfy("foo", &CyclePoint::Integer(1), "succeeded"));
}

#[test]
fn conjunction_needs_all_atoms() {
    let mut p = Prerequisite::all(vec![
        atom("a", 1, "succeeded"),
        atom("b", 1, "succeeded"),
    ]);
    p.satisfy("a", &CyclePoint::Integer(1), "succeeded");
    assert!(!p.is_satisfied());
    p.satisfy("b", &CyclePoint::Integer(1), "succeeded");
    assert!(p.is_satisfied());
}

#[test]
fn disjunction_needs_one_atom() {
    let mut p = Prerequisite::any(vec![
        atom("m1", 2, "failed"),
        atom("m2", 2, "failed"),
    ]);
    assert!(p.satisfy("m2", &CyclePoint::Integer(2), "failed"));
    assert!(p.is_satisfied());
}

#[test]
fn wrong_point_does_not_satisfy() {
    let mut p = Prerequisite::single(atom("foo", 2, "succeeded"));
    assert!(!p.satisfy("foo", &CyclePoint::Integer(1), "succeeded"));
    assert!(!p.is_satisfied());
}

#[test]
fn force_satisfy_records_provenance() {
    let mut p = Prerequisite::single(atom("foo", 1, "succeeded"));
    p.force_satisfy();
    assert!(p.is_satisfied());
    assert_eq!(p.atoms()[0].state, SatisfiedState::ForceSatisfied);

    p.reset();
    assert!(!p.is_satisfied());
    assert_eq!(p.atoms()[0].state, SatisfiedState::Unsatisfied);
}

#[test]
fn vacuous_atom_is_born_satisfied() {
    let p = Prerequisite::single(PrereqAtom::satisfied(
        "foo",
        CyclePoint::Integer(0),
        "succeeded",
    ));
    assert!(p.is_satisfied());
}

#[test]
fn render_expr_nested() {
    let p = Prerequisite::new(
        vec![
            atom("a", 1, "succeeded"),
            atom("b", 1, "succeeded"),
            atom("c", 1, "started"),
        ],
        Condition::All(vec![
            Condition::Any(vec![Condition::Atom(0), Condition::Atom(1)]),
            Condition::Atom(2),
        ]),
    );
    assert_eq!(p.render_expr(), "((0 | 1) & 2)");
}

#[test]
fn render_atoms_marks_state() {
    let mut p = Prerequisite::all(vec![
        atom("a", 1, "succeeded"),
        atom("b", 1, "started"),
    ]);
    p.satisfy("a", &CyclePoint::Integer(1), "succeeded");
    assert_eq!(
        p.render_atoms(),
        vec!["+ 0 = 1/a:succeeded".to_string(), "- 1 = 1/b:started".to_string()]
    );
}

#[test]
fn references_matches_exactly() {
    let p = Prerequisite::single(atom("foo", 3, "out1"));
    assert!(p.references("foo", &CyclePoint::Integer(3), "out1"));
    assert!(!p.references("foo", &CyclePoint::Integer(3), "out2"));
    assert!(!p.references("bar", &CyclePoint::Integer(3), "out1"));
}

#[test]
fn suicide_flag_round_trips_serde() {
    let p = Prerequisite::single(atom("killer", 1, "succeeded")).suicide();
    let json = serde_json::to_string(&p).unwrap();
    let back: Prerequisite = serde_json::from_str(&json).unwrap();
    assert!(back.suicide);
}
