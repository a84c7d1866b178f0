// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn standard_outputs_are_seeded() {
    let set = OutputSet::default();
    for name in STANDARD_OUTPUTS {
        assert!(set.is_declared(name), "{name} missing");
        assert!(!set.is_completed(name));
    }
}

#[test]
fn complete_is_monotone_and_idempotent() {
    let mut set = OutputSet::default();
    assert!(set.complete(OUTPUT_STARTED));
    assert!(!set.complete(OUTPUT_STARTED));
    assert!(set.is_completed(OUTPUT_STARTED));
}

#[test]
fn undeclared_output_is_rejected() {
    let mut set = OutputSet::default();
    assert!(!set.complete("mystery"));
    assert!(!set.is_declared("mystery"));
}

#[test]
fn custom_outputs_participate() {
    let mut set = OutputSet::new(
        ["products_ready"],
        CompletionExpr::All(vec![
            CompletionExpr::Output(OUTPUT_SUCCEEDED.into()),
            CompletionExpr::Output("products_ready".into()),
        ]),
    );
    set.complete(OUTPUT_SUCCEEDED);
    assert!(!set.is_complete());
    assert_eq!(set.missing_for_completion(), vec!["products_ready"]);

    set.complete("products_ready");
    assert!(set.is_complete());
    assert!(set.missing_for_completion().is_empty());
}

#[test]
fn any_expression_completes_on_either_branch() {
    let mut set = OutputSet::new(
        Vec::<String>::new(),
        CompletionExpr::Any(vec![
            CompletionExpr::Output(OUTPUT_SUCCEEDED.into()),
            CompletionExpr::Output(OUTPUT_FAILED.into()),
        ]),
    );
    assert!(!set.is_complete());
    set.complete(OUTPUT_FAILED);
    assert!(set.is_complete());
}

#[test]
fn completed_preserves_declaration_order() {
    let mut set = OutputSet::new(["a", "b"], CompletionExpr::succeeded());
    set.complete("b");
    set.complete(OUTPUT_SUBMITTED);
    set.complete("a");
    let done: Vec<_> = set.completed().collect();
    assert_eq!(done, vec![OUTPUT_SUBMITTED, "a", "b"]);
}
