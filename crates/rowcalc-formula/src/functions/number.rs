//! Number functions
//!
//! The `is*` predicates never coerce: only number values can pass.

use super::arg;
use crate::error::FormulaResult;
use rowcalc_core::Value;

pub fn fn_is_finite(args: &[Value]) -> FormulaResult<Value> {
    let result = arg(args, 0).as_number().map_or(false, f64::is_finite);
    Ok(Value::Boolean(result))
}

pub fn fn_is_integer(args: &[Value]) -> FormulaResult<Value> {
    let result = arg(args, 0)
        .as_number()
        .map_or(false, |n| n.is_finite() && n.fract() == 0.0);
    Ok(Value::Boolean(result))
}

pub fn fn_is_nan(args: &[Value]) -> FormulaResult<Value> {
    let result = arg(args, 0).as_number().map_or(false, f64::is_nan);
    Ok(Value::Boolean(result))
}

/// PARSEFLOAT: longest leading decimal literal of the text, NaN when none
pub fn fn_parse_float(args: &[Value]) -> FormulaResult<Value> {
    let text = arg(args, 0).to_text();
    Ok(Value::Number(parse_float_prefix(text.trim_start())))
}

/// PARSEINT: leading integer in `radix` (2-36, default 10, `0x` means 16)
pub fn fn_parse_int(args: &[Value]) -> FormulaResult<Value> {
    let text = arg(args, 0).to_text();
    let mut rest = text.trim_start();

    let mut sign = 1.0;
    if let Some(stripped) = rest.strip_prefix('-') {
        sign = -1.0;
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    }

    let requested = arg(args, 1).to_number();
    let mut radix = if requested.is_finite() {
        requested.trunc() as i64
    } else {
        0
    };
    if radix != 0 && !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    if radix == 0 || radix == 16 {
        if let Some(hex) = rest
            .strip_prefix("0x")
            .or_else(|| rest.strip_prefix("0X"))
        {
            rest = hex;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }

    let radix = radix as u32;
    let mut result: Option<f64> = None;
    for c in rest.chars() {
        match c.to_digit(radix) {
            Some(d) => result = Some(result.unwrap_or(0.0) * radix as f64 + d as f64),
            None => break,
        }
    }

    Ok(Value::Number(result.map_or(f64::NAN, |n| sign * n)))
}

fn parse_float_prefix(s: &str) -> f64 {
    let unsigned = s.trim_start_matches(['+', '-']);
    if unsigned.starts_with("Infinity") && s.len() - unsigned.len() <= 1 {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let digits_start = end;
    while bytes.get(end).map_or(false, u8::is_ascii_digit) {
        end += 1;
    }
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).map_or(false, u8::is_ascii_digit) {
            end += 1;
        }
    }
    if end == digits_start || &s[digits_start..end] == "." {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        if bytes.get(exp_end).map_or(false, u8::is_ascii_digit) {
            while bytes.get(exp_end).map_or(false, u8::is_ascii_digit) {
                exp_end += 1;
            }
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}
