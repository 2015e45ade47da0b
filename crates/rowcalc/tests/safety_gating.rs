//! Expressions outside the capability whitelist never reach the interpreter

use pretty_assertions::assert_eq;
use rowcalc::prelude::*;

fn add(doc: &mut Document, expression: &str) -> CellId {
    doc.add_cell(CellOptions::new("cell").expression(expression))
        .unwrap()
}

#[test]
fn test_whitelisted_call_is_accepted() {
    let mut doc = Document::default();
    let id = add(&mut doc, "Math.max(1,2)");
    let cell = doc.cell(&id).unwrap();
    assert!(cell.is_safe());
    assert_eq!(cell.value(), &Value::from(2.0));
}

#[test]
fn test_dangerous_names_are_rejected() {
    for expression in [
        "eval('1 + 1')",
        "fetch('https://example.com')",
        "new Function('return 1')",
        "setTimeout(x, 10)",
        "localStorage",
        "process.env",
        "globalThis['eval']('1')",
    ] {
        let mut doc = Document::default();
        let id = match doc.add_cell(CellOptions::new("c").expression(expression)) {
            Ok(id) => id,
            Err(err) => panic!("{}: {}", expression, err),
        };
        let cell = doc.cell(&id).unwrap();
        assert!(cell.value().is_absent(), "{}", expression);
        assert_eq!(cell.value_kind(), ValueKind::Error, "{}", expression);
        let kind = cell.error().map(FormulaError::kind);
        // `new` is not part of the language at all
        if expression.starts_with("new ") {
            assert_eq!(kind, Some(ErrorKind::Syntax));
        } else {
            assert_eq!(kind, Some(ErrorKind::Disallowed), "{}", expression);
            assert!(!cell.is_safe());
        }
    }
}

#[test]
fn test_non_whitelisted_members_are_rejected() {
    let mut doc = Document::default();
    let id = add(&mut doc, "Math.constructor + Date.setTime");
    let cell = doc.cell(&id).unwrap();
    assert_eq!(
        cell.error().unwrap().to_string(),
        "You are not allowed to use these functions: Math.constructor, Date.setTime"
    );
    let names: Vec<_> = cell.offenses().iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["Math.constructor", "Date.setTime"]);
}

#[test]
fn test_unsafe_cell_keeps_value_absent_when_inputs_change() {
    let mut doc = Document::default();
    let a = doc.add_cell(CellOptions::new("a").expression("1")).unwrap();
    let b = doc
        .add_cell(CellOptions::new("b").expression("eval(a)"))
        .unwrap();

    doc.update_expression(&a, "2").unwrap();
    let b = doc.cell(&b).unwrap();
    assert!(b.value().is_absent());
    assert_eq!(b.error().unwrap().kind(), ErrorKind::Disallowed);
}

#[test]
fn test_downstream_of_unsafe_cell_is_absent() {
    let mut doc = Document::default();
    doc.add_cell(CellOptions::new("a").expression("fetch"))
        .unwrap();
    let b = doc.add_cell(CellOptions::new("b").expression("a")).unwrap();
    let b = doc.cell(&b).unwrap();
    assert!(b.value().is_absent());
    assert!(b.error().is_none());
}

#[test]
fn test_custom_policy() {
    let policy = CapabilityPolicy::empty().allow("Math", ["abs"]);
    let mut doc = Document::new(DocumentOptions {
        policy,
        ..Default::default()
    });

    let ok = add(&mut doc, "Math.abs(-3)");
    let rejected = add(&mut doc, "Math.max(1, 2)");
    // Not on this policy's deny-list
    let allowed = add(&mut doc, "typeof eval");

    assert_eq!(doc.cell(&ok).unwrap().value(), &Value::from(3.0));
    assert_eq!(
        doc.cell(&rejected).unwrap().error().unwrap().kind(),
        ErrorKind::Disallowed
    );
    assert_eq!(doc.cell(&allowed).unwrap().error(), None);
}

#[test]
fn test_step_budget_stops_runaway_expressions() {
    let mut doc = Document::new(DocumentOptions {
        limits: EvalLimits {
            max_depth: 64,
            max_steps: 50,
        },
        ..Default::default()
    });
    let terms = vec!["1"; 200].join(" + ");
    let id = add(&mut doc, &terms);
    let cell = doc.cell(&id).unwrap();
    assert!(matches!(
        cell.error(),
        Some(FormulaError::StepBudgetExceeded(_))
    ));
    assert!(cell.value().is_absent());
}
