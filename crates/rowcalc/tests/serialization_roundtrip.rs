//! Serialize → deserialize reproduces identities, content and values

use pretty_assertions::assert_eq;
use rowcalc::prelude::*;

fn sample() -> (Document, CellId, CellId) {
    let mut doc = Document::default();
    let a = doc
        .add_cell(CellOptions::new("A").expression("2").tags(["input", "base"]))
        .unwrap();
    let b = doc
        .add_cell(CellOptions::new("B").expression("$A + 3").tags(["derived"]))
        .unwrap();
    (doc, a, b)
}

#[test]
fn test_round_trip_preserves_cells_and_values() {
    let (doc, a, b) = sample();
    let record = doc.serialize();

    let mut copy = Document::deserialize(&record, DocumentOptions::default()).unwrap();
    copy.recompute_all();

    assert_eq!(copy.cell(&a).unwrap().value(), &Value::from(2.0));
    assert_eq!(copy.cell(&b).unwrap().value(), &Value::from(5.0));
    for (original, restored) in doc.cells().into_iter().zip(copy.cells()) {
        assert_eq!(restored.id(), original.id());
        assert_eq!(restored.name(), original.name());
        assert_eq!(restored.expression(), original.expression());
        assert_eq!(restored.tags(), original.tags());
        assert_eq!(restored.input(), original.input());
    }
    assert_eq!(copy.serialize(), record);
}

#[test]
fn test_record_json_shape() {
    let (doc, a, b) = sample();
    let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"rows": [
            {
                "id": a.as_str(),
                "name": "A",
                "expr": "2",
                "value": 2,
                "dependencies": [],
                "tags": ["input", "base"]
            },
            {
                "id": b.as_str(),
                "name": "B",
                "expr": "$A + 3",
                "value": 5,
                "dependencies": [a.as_str()],
                "tags": ["derived"]
            }
        ]})
    );
}

#[test]
fn test_input_resumes_at_last_value() {
    let mut doc = Document::default();
    let n = doc
        .add_cell(CellOptions::new("n").input(InputDescriptor::number(0.0, 10.0, 1.0, 1.0)))
        .unwrap();
    doc.add_cell(CellOptions::new("double").expression("n * 2"))
        .unwrap();
    doc.set_input_value(&n, 6.0).unwrap();

    let copy = Document::from_json(&doc.to_json().unwrap(), DocumentOptions::default()).unwrap();
    let restored = copy.cell(&n).unwrap();
    assert_eq!(restored.value(), &Value::from(6.0));
    assert_eq!(restored.input().unwrap().kind, "number");
    assert_eq!(
        copy.cell_by_name("double").unwrap().value(),
        &Value::from(12.0)
    );
}

#[test]
fn test_errors_are_recomputed_not_restored() {
    let mut doc = Document::default();
    doc.add_cell(CellOptions::new("bad").expression("fetch('x')"))
        .unwrap();
    doc.add_cell(CellOptions::new("broken").expression("1 +"))
        .unwrap();

    let mut record = doc.serialize();
    for row in &mut record.rows {
        row.error = Some("stale".into());
    }
    let copy = Document::deserialize(&record, DocumentOptions::default()).unwrap();
    let errors: Vec<ErrorKind> = copy
        .cells()
        .into_iter()
        .filter_map(|cell| cell.error().map(FormulaError::kind))
        .collect();
    assert_eq!(errors, vec![ErrorKind::Disallowed, ErrorKind::Syntax]);
}

#[test]
fn test_deserialize_with_context() {
    let record: DocumentRecord = serde_json::from_str(
        r#"{"rows": [{"id": "t", "name": "total", "expr": "base * 2"}]}"#,
    )
    .unwrap();
    let options = DocumentOptions::default().with_context("base", 21.0);
    let doc = Document::deserialize(&record, options).unwrap();
    assert_eq!(
        doc.cell(&CellId::new("t")).unwrap().value(),
        &Value::from(42.0)
    );
}
