//! Math functions

use super::number_arg;
use crate::error::FormulaResult;
use rand::Rng;
use rowcalc_core::Value;

fn unary(args: &[Value], f: fn(f64) -> f64) -> FormulaResult<Value> {
    Ok(Value::Number(f(number_arg(args, 0))))
}

pub fn fn_abs(args: &[Value]) -> FormulaResult<Value> {
    unary(args, f64::abs)
}

pub fn fn_acos(args: &[Value]) -> FormulaResult<Value> {
    unary(args, f64::acos)
}

pub fn fn_asin(args: &[Value]) -> FormulaResult<Value> {
    unary(args, f64::asin)
}

pub fn fn_atan(args: &[Value]) -> FormulaResult<Value> {
    unary(args, f64::atan)
}

pub fn fn_atan2(args: &[Value]) -> FormulaResult<Value> {
    let y = number_arg(args, 0);
    let x = number_arg(args, 1);
    Ok(Value::Number(y.atan2(x)))
}

pub fn fn_ceil(args: &[Value]) -> FormulaResult<Value> {
    unary(args, f64::ceil)
}

pub fn fn_cos(args: &[Value]) -> FormulaResult<Value> {
    unary(args, f64::cos)
}

pub fn fn_exp(args: &[Value]) -> FormulaResult<Value> {
    unary(args, f64::exp)
}

pub fn fn_floor(args: &[Value]) -> FormulaResult<Value> {
    unary(args, f64::floor)
}

/// Natural logarithm
pub fn fn_log(args: &[Value]) -> FormulaResult<Value> {
    unary(args, f64::ln)
}

/// MAX; no arguments gives -Infinity, any NaN argument gives NaN
pub fn fn_max(args: &[Value]) -> FormulaResult<Value> {
    let mut max = f64::NEG_INFINITY;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        if n > max {
            max = n;
        }
    }
    Ok(Value::Number(max))
}

/// MIN; no arguments gives Infinity, any NaN argument gives NaN
pub fn fn_min(args: &[Value]) -> FormulaResult<Value> {
    let mut min = f64::INFINITY;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        if n < min {
            min = n;
        }
    }
    Ok(Value::Number(min))
}

pub fn fn_pow(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::Number(power(number_arg(args, 0), number_arg(args, 1))))
}

/// Exponentiation shared with the `**` operator.
///
/// Differs from `f64::powf` where the two disagree: a NaN exponent always
/// yields NaN and `(±1) ** ±Infinity` is NaN.
pub fn power(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

/// RANDOM (volatile)
pub fn fn_random(_args: &[Value]) -> FormulaResult<Value> {
    let mut rng = rand::thread_rng();
    Ok(Value::Number(rng.gen::<f64>()))
}

/// ROUND; halves round towards +Infinity
pub fn fn_round(args: &[Value]) -> FormulaResult<Value> {
    let n = number_arg(args, 0);
    if !n.is_finite() || n.fract() == 0.0 {
        return Ok(Value::Number(n));
    }
    let floor = n.floor();
    let rounded = if n - floor >= 0.5 { floor + 1.0 } else { floor };
    Ok(Value::Number(rounded))
}

pub fn fn_sin(args: &[Value]) -> FormulaResult<Value> {
    unary(args, f64::sin)
}

pub fn fn_sqrt(args: &[Value]) -> FormulaResult<Value> {
    unary(args, f64::sqrt)
}

pub fn fn_tan(args: &[Value]) -> FormulaResult<Value> {
    unary(args, f64::tan)
}
