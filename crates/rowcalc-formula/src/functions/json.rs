//! JSON functions

use super::arg;
use crate::error::{FormulaError, FormulaResult};
use rowcalc_core::Value;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

/// PARSE: JSON text to a value
pub fn fn_parse(args: &[Value]) -> FormulaResult<Value> {
    let text = arg(args, 0).to_text();
    serde_json::from_str::<serde_json::Value>(&text)
        .map(Value::from)
        .map_err(|e| FormulaError::Argument(format!("Invalid JSON: {}", e)))
}

/// STRINGIFY(value, replacer, indent)
///
/// The replacer is ignored. Values JSON cannot represent (absent,
/// functions) produce absent, the same as an `undefined` result.
pub fn fn_stringify(args: &[Value]) -> FormulaResult<Value> {
    let json = match arg(args, 0).to_json() {
        Some(json) => json,
        None => return Ok(Value::Absent),
    };

    let indent = match arg(args, 2) {
        Value::Number(n) if *n >= 1.0 => " ".repeat(n.min(10.0) as usize),
        Value::Text(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };

    let text = if indent.is_empty() {
        serde_json::to_string(&json)
    } else {
        to_string_indented(&json, &indent)
    }
    .map_err(|e| FormulaError::Evaluation(e.to_string()))?;

    Ok(Value::Text(text))
}

fn to_string_indented(json: &serde_json::Value, indent: &str) -> serde_json::Result<String> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = Serializer::with_formatter(&mut out, formatter);
    json.serialize(&mut serializer)?;
    // serde_json only ever writes UTF-8
    Ok(String::from_utf8_lossy(&out).into_owned())
}
