//! Array functions

use super::arg;
use crate::error::FormulaResult;
use rowcalc_core::Value;

pub fn fn_is_array(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::Boolean(matches!(arg(args, 0), Value::Array(_))))
}
