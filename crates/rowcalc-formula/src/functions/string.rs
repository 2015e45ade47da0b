//! String functions

use crate::error::{FormulaError, FormulaResult};
use rowcalc_core::Value;

/// FROMCHARCODE: each argument is truncated to a UTF-16 code unit
pub fn fn_from_char_code(args: &[Value]) -> FormulaResult<Value> {
    let units: Vec<u16> = args.iter().map(|v| to_uint16(v.to_number())).collect();
    Ok(Value::Text(String::from_utf16_lossy(&units)))
}

/// FROMCODEPOINT: each argument must be an integral code point
pub fn fn_from_code_point(args: &[Value]) -> FormulaResult<Value> {
    let mut s = String::with_capacity(args.len());
    for value in args {
        let n = value.to_number();
        if n.fract() != 0.0 || !(0.0..=0x10FFFF as f64).contains(&n) {
            return Err(FormulaError::Argument(format!(
                "Invalid code point {}",
                value.to_text()
            )));
        }
        s.push(char::from_u32(n as u32).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    Ok(Value::Text(s))
}

fn to_uint16(n: f64) -> u16 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(65536.0) as u16
}
