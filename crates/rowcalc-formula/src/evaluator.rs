//! Expression evaluator
//!
//! Evaluates expression ASTs against a flat scope of named values. Free
//! names resolve from the scope first, then from the function registry's
//! namespaces; nothing else is reachable.

use crate::ast::{BinaryOperator, Expr, LogicalOperator, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{math, FunctionRegistry};
use indexmap::IndexMap;
use rowcalc_core::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Names visible to an expression
pub type Scope = HashMap<String, Value>;

/// Bounds on the work a single parse or evaluation may do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalLimits {
    /// Maximum nesting depth, for both parsing and evaluation. A run of
    /// same-precedence operators counts as one level.
    pub max_depth: usize,
    /// Maximum number of nodes visited by one evaluation; bounds the
    /// length of operator runs
    pub max_steps: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self {
            max_depth: 256,
            max_steps: 100_000,
        }
    }
}

/// Evaluate an expression with the built-in functions and default limits
pub fn evaluate(expr: &Expr, scope: &Scope) -> FormulaResult<Value> {
    Interpreter::new(FunctionRegistry::builtins(), EvalLimits::default()).evaluate(expr, scope)
}

/// Evaluates ASTs against an explicit function registry.
///
/// The interpreter does not check safety; callers run the
/// [`SafetyAnalyzer`](crate::safety::SafetyAnalyzer) first and refuse to
/// evaluate flagged expressions.
pub struct Interpreter<'a> {
    registry: &'a FunctionRegistry,
    limits: EvalLimits,
}

impl<'a> Interpreter<'a> {
    pub fn new(registry: &'a FunctionRegistry, limits: EvalLimits) -> Self {
        Self { registry, limits }
    }

    pub fn evaluate(&self, expr: &Expr, scope: &Scope) -> FormulaResult<Value> {
        let mut run = Evaluation {
            registry: self.registry,
            limits: self.limits,
            scope,
            depth: 0,
            steps: 0,
        };
        run.eval(expr)
    }
}

/// State of one evaluation
struct Evaluation<'a> {
    registry: &'a FunctionRegistry,
    limits: EvalLimits,
    scope: &'a Scope,
    depth: usize,
    steps: usize,
}

impl Evaluation<'_> {
    fn eval(&mut self, expr: &Expr) -> FormulaResult<Value> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(FormulaError::StepBudgetExceeded(self.limits.max_steps));
        }
        if self.depth >= self.limits.max_depth {
            return Err(FormulaError::DepthExceeded(self.limits.max_depth));
        }

        self.depth += 1;
        let result = self.eval_node(expr);
        self.depth -= 1;
        result
    }

    fn eval_node(&mut self, expr: &Expr) -> FormulaResult<Value> {
        match expr {
            // === Literals ===
            Expr::Empty | Expr::Undefined => Ok(Value::Absent),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Text(s) => Ok(Value::Text(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Null => Ok(Value::Null),

            Expr::Ident { name, .. } => self.resolve(name),

            // === Operators ===
            Expr::Unary { op, operand } => self.eval_unary(*op, operand),

            Expr::Binary { first, rest } => {
                let mut acc = self.eval(first)?;
                for (op, operand) in rest {
                    let right = self.eval(operand)?;
                    acc = binary_op(*op, &acc, &right);
                }
                Ok(acc)
            }

            Expr::Logical { op, operands } => {
                let mut acc = Value::Absent;
                for operand in operands {
                    acc = self.eval(operand)?;
                    let short_circuit = match op {
                        LogicalOperator::And => !acc.is_truthy(),
                        LogicalOperator::Or => acc.is_truthy(),
                        LogicalOperator::Nullish => !acc.is_nullish(),
                    };
                    if short_circuit {
                        break;
                    }
                }
                Ok(acc)
            }

            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.is_truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }

            // === Postfix ===
            Expr::Member {
                object, property, ..
            } => {
                let target = self.eval(object)?;
                get_property(&target, property)
            }

            Expr::Index { object, index } => {
                let target = self.eval(object)?;
                let key = self.eval(index)?;
                get_index(&target, &key)
            }

            Expr::Call { callee, args } => self.eval_call(callee, args),

            // === Compound literals ===
            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<FormulaResult<Vec<_>>>()
                .map(Value::Array),

            Expr::Object(props) => {
                let mut map = IndexMap::with_capacity(props.len());
                for prop in props {
                    let value = self.eval(&prop.value)?;
                    map.insert(prop.key.clone(), value);
                }
                Ok(Value::Object(map))
            }
        }
    }

    fn resolve(&self, name: &str) -> FormulaResult<Value> {
        if let Some(value) = self.scope.get(name) {
            return Ok(value.clone());
        }
        self.registry
            .namespace_value(name)
            .ok_or_else(|| FormulaError::UndefinedName(name.to_string()))
    }

    fn eval_unary(&mut self, op: UnaryOperator, operand: &Expr) -> FormulaResult<Value> {
        // typeof tolerates names that are not defined
        if let (UnaryOperator::TypeOf, Expr::Ident { name, .. }) = (op, operand) {
            if !self.scope.contains_key(name) && !self.registry.has_namespace(name) {
                return Ok(Value::text("undefined"));
            }
        }

        let value = self.eval(operand)?;
        Ok(match op {
            UnaryOperator::Negate => Value::Number(-value.to_number()),
            UnaryOperator::Plus => Value::Number(value.to_number()),
            UnaryOperator::Not => Value::Boolean(!value.is_truthy()),
            UnaryOperator::TypeOf => Value::text(value.type_of()),
        })
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> FormulaResult<Value> {
        let callable = match self.eval(callee)? {
            Value::Callable(callable) => callable,
            _ => return Err(FormulaError::NotCallable(callee_name(callee))),
        };

        let func = self
            .registry
            .get(callable.namespace(), callable.name())
            .ok_or_else(|| FormulaError::NotCallable(callable.qualified_name()))?;

        // Check argument count
        if args.len() < func.min_args {
            return Err(FormulaError::ArgumentCount {
                function: callable.qualified_name(),
                expected: format!("at least {}", func.min_args),
                actual: args.len(),
            });
        }

        if let Some(max) = func.max_args {
            if args.len() > max {
                return Err(FormulaError::ArgumentCount {
                    function: callable.qualified_name(),
                    expected: format!("at most {}", max),
                    actual: args.len(),
                });
            }
        }

        // Evaluate arguments
        let mut evaluated_args = Vec::with_capacity(args.len());
        for arg in args {
            evaluated_args.push(self.eval(arg)?);
        }

        // Call the function
        (func.implementation)(&evaluated_args)
    }
}

/// How a call target is named in error messages
fn callee_name(expr: &Expr) -> String {
    match expr {
        Expr::Ident { name, .. } => name.clone(),
        Expr::Member {
            object, property, ..
        } => format!("{}.{}", callee_name(object), property),
        Expr::Index { object, .. } => format!("{}[...]", callee_name(object)),
        _ => "(intermediate value)".to_string(),
    }
}

fn nothing_error(target: &Value, property: String) -> FormulaError {
    let target = if matches!(target, Value::Null) {
        "null"
    } else {
        "undefined"
    };
    FormulaError::PropertyOfNothing {
        target: target.to_string(),
        property,
    }
}

fn get_property(target: &Value, property: &str) -> FormulaResult<Value> {
    match target {
        Value::Absent | Value::Null => Err(nothing_error(target, property.to_string())),
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or_default()),
        Value::Array(items) if property == "length" => Ok(Value::Number(items.len() as f64)),
        Value::Text(s) if property == "length" => {
            Ok(Value::Number(s.encode_utf16().count() as f64))
        }
        Value::Callable(callable) if property == "name" => Ok(Value::text(callable.name())),
        _ => Ok(Value::Absent),
    }
}

fn get_index(target: &Value, key: &Value) -> FormulaResult<Value> {
    match target {
        Value::Absent | Value::Null => Err(nothing_error(target, key.to_text())),
        Value::Array(items) => match array_index(key) {
            Some(i) => Ok(items.get(i).cloned().unwrap_or_default()),
            None => get_property(target, &key.to_text()),
        },
        Value::Text(s) => match array_index(key) {
            Some(i) => Ok(s
                .encode_utf16()
                .nth(i)
                .map(|unit| Value::Text(String::from_utf16_lossy(&[unit])))
                .unwrap_or_default()),
            None => get_property(target, &key.to_text()),
        },
        _ => get_property(target, &key.to_text()),
    }
}

/// A key that addresses an element: a non-negative integer or its canonical text
fn array_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < usize::MAX as f64 => {
            Some(*n as usize)
        }
        Value::Text(s) => s.parse::<usize>().ok().filter(|i| i.to_string() == *s),
        _ => None,
    }
}

/// Evaluate a binary operation
fn binary_op(op: BinaryOperator, left: &Value, right: &Value) -> Value {
    match op {
        // Arithmetic operators
        BinaryOperator::Add => add(left, right),
        BinaryOperator::Subtract => Value::Number(left.to_number() - right.to_number()),
        BinaryOperator::Multiply => Value::Number(left.to_number() * right.to_number()),
        BinaryOperator::Divide => Value::Number(left.to_number() / right.to_number()),
        BinaryOperator::Remainder => Value::Number(left.to_number() % right.to_number()),
        BinaryOperator::Power => Value::Number(math::power(left.to_number(), right.to_number())),

        // Comparison operators
        BinaryOperator::Equal => Value::Boolean(loose_equals(left, right)),
        BinaryOperator::NotEqual => Value::Boolean(!loose_equals(left, right)),
        BinaryOperator::StrictEqual => Value::Boolean(strict_equals(left, right)),
        BinaryOperator::StrictNotEqual => Value::Boolean(!strict_equals(left, right)),
        BinaryOperator::LessThan => {
            Value::Boolean(compare_values(left, right) == Some(Ordering::Less))
        }
        BinaryOperator::LessEqual => Value::Boolean(matches!(
            compare_values(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOperator::GreaterThan => {
            Value::Boolean(compare_values(left, right) == Some(Ordering::Greater))
        }
        BinaryOperator::GreaterEqual => Value::Boolean(matches!(
            compare_values(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
    }
}

/// Arrays, objects and functions take part in `+` and comparisons as text
fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) | Value::Callable(_) => Value::Text(value.to_text()),
        other => other.clone(),
    }
}

/// `+` concatenates when either side is text, otherwise adds numerically
fn add(left: &Value, right: &Value) -> Value {
    let left = to_primitive(left);
    let right = to_primitive(right);
    if matches!(left, Value::Text(_)) || matches!(right, Value::Text(_)) {
        return Value::Text(left.to_text() + &right.to_text());
    }
    Value::Number(left.to_number() + right.to_number())
}

/// Relational comparison: text against text by UTF-16 code units,
/// anything else numerically. `None` when either side is NaN.
fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    let left = to_primitive(left);
    let right = to_primitive(right);
    if let (Value::Text(l), Value::Text(r)) = (&left, &right) {
        return Some(l.encode_utf16().cmp(r.encode_utf16()));
    }
    left.to_number().partial_cmp(&right.to_number())
}

/// `==`: null and absent equal each other only; mixed types coerce
fn loose_equals(left: &Value, right: &Value) -> bool {
    use Value::*;

    if left.is_nullish() || right.is_nullish() {
        return left.is_nullish() && right.is_nullish();
    }

    match (left, right) {
        (Number(_), Number(_)) | (Text(_), Text(_)) | (Boolean(_), Boolean(_)) => {
            strict_equals(left, right)
        }
        (Boolean(_), _) => loose_equals(&Number(left.to_number()), right),
        (_, Boolean(_)) => loose_equals(left, &Number(right.to_number())),
        (Number(l), Text(_)) => *l == right.to_number(),
        (Text(_), Number(r)) => left.to_number() == *r,
        (Array(_) | Object(_) | Callable(_), Number(_) | Text(_)) => {
            loose_equals(&to_primitive(left), right)
        }
        (Number(_) | Text(_), Array(_) | Object(_) | Callable(_)) => {
            loose_equals(left, &to_primitive(right))
        }
        _ => strict_equals(left, right),
    }
}

/// `===`: same kind and same contents; containers compare structurally
fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(a, b)| strict_equals(a, b))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l
                    .iter()
                    .all(|(k, v)| r.get(k).map_or(false, |w| strict_equals(v, w)))
        }
        // f64 equality already treats NaN as unequal and +0 as -0
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn eval_with(text: &str, scope: &Scope) -> FormulaResult<Value> {
        let ast = parse(text)?;
        evaluate(&ast, scope)
    }

    fn eval(text: &str) -> FormulaResult<Value> {
        eval_with(text, &Scope::new())
    }

    fn scope(entries: &[(&str, Value)]) -> Scope {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_evaluate_literals() {
        assert_eq!(eval("42").unwrap(), Value::from(42.0));
        assert_eq!(eval("'hi'").unwrap(), Value::from("hi"));
        assert_eq!(eval("null").unwrap(), Value::Null);
        assert_eq!(eval("undefined").unwrap(), Value::Absent);
        assert_eq!(eval("").unwrap(), Value::Absent);
    }

    #[test]
    fn test_evaluate_arithmetic() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::from(7.0));
        assert_eq!(eval("(1 + 2) * 3").unwrap(), Value::from(9.0));
        assert_eq!(eval("7 % 3").unwrap(), Value::from(1.0));
        assert_eq!(eval("-7 % 3").unwrap(), Value::from(-1.0));
        assert_eq!(eval("2 ** 3 ** 2").unwrap(), Value::from(512.0));
        assert_eq!(eval("1 / 0").unwrap(), Value::Number(f64::INFINITY));
        assert!(eval("0 / 0").unwrap().to_number().is_nan());
    }

    #[test]
    fn test_evaluate_coercions() {
        assert_eq!(eval("'1' + 2").unwrap(), Value::from("12"));
        assert_eq!(eval("'3' * '4'").unwrap(), Value::from(12.0));
        assert_eq!(eval("true + 1").unwrap(), Value::from(2.0));
        assert_eq!(eval("null + 1").unwrap(), Value::from(1.0));
        assert!(eval("undefined + 1").unwrap().to_number().is_nan());
        assert_eq!(eval("[1, 2] + ''").unwrap(), Value::from("1,2"));
        assert_eq!(eval("+'  5 '").unwrap(), Value::from(5.0));
    }

    #[test]
    fn test_evaluate_comparison() {
        assert_eq!(eval("2 < 10").unwrap(), Value::Boolean(true));
        assert_eq!(eval("'2' < '10'").unwrap(), Value::Boolean(false));
        assert_eq!(eval("'2' < 10").unwrap(), Value::Boolean(true));
        assert_eq!(eval("NaN <= NaN").unwrap(), Value::Boolean(false));
        assert_eq!(eval("null == undefined").unwrap(), Value::Boolean(true));
        assert_eq!(eval("null === undefined").unwrap(), Value::Boolean(false));
        assert_eq!(eval("null == 0").unwrap(), Value::Boolean(false));
        assert_eq!(eval("'1' == 1").unwrap(), Value::Boolean(true));
        assert_eq!(eval("'1' === 1").unwrap(), Value::Boolean(false));
        assert_eq!(eval("true == '1'").unwrap(), Value::Boolean(true));
        assert_eq!(eval("[1,2] === [1,2]").unwrap(), Value::Boolean(true));
        assert_eq!(eval("NaN == NaN").unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_evaluate_logical() {
        assert_eq!(eval("0 || 'x'").unwrap(), Value::from("x"));
        assert_eq!(eval("1 && 'y'").unwrap(), Value::from("y"));
        assert_eq!(eval("'' && boom").unwrap(), Value::from(""));
        assert_eq!(eval("0 ?? 5").unwrap(), Value::from(0.0));
        assert_eq!(eval("null ?? 5").unwrap(), Value::from(5.0));
        assert_eq!(eval("!0").unwrap(), Value::Boolean(true));
        assert_eq!(eval("1 > 0 ? 'pos' : 'neg'").unwrap(), Value::from("pos"));
    }

    #[test]
    fn test_evaluate_typeof() {
        assert_eq!(eval("typeof 1").unwrap(), Value::from("number"));
        assert_eq!(eval("typeof null").unwrap(), Value::from("object"));
        assert_eq!(eval("typeof missing").unwrap(), Value::from("undefined"));
        assert_eq!(eval("typeof Math.max").unwrap(), Value::from("function"));
    }

    #[test]
    fn test_evaluate_scope_names() {
        let s = scope(&[("$a", Value::from(2.0)), ("b", Value::from(3.0))]);
        assert_eq!(eval_with("$a * b", &s).unwrap(), Value::from(6.0));
        assert_eq!(
            eval_with("c", &s).unwrap_err(),
            FormulaError::UndefinedName("c".into())
        );
    }

    #[test]
    fn test_scope_shadows_namespaces() {
        let s = scope(&[("Math", Value::from(1.0))]);
        assert_eq!(eval_with("Math + 1", &s).unwrap(), Value::from(2.0));
    }

    #[test]
    fn test_evaluate_namespace_calls() {
        assert_eq!(eval("Math.max(1, 2)").unwrap(), Value::from(2.0));
        assert_eq!(eval("Math.round(Math.sqrt(16) + 0.5)").unwrap(), Value::from(5.0));
        assert_eq!(eval("JSON.stringify([1, 'a'])").unwrap(), Value::from("[1,\"a\"]"));
        assert_eq!(eval("Number.parseInt('12px')").unwrap(), Value::from(12.0));
        assert_eq!(eval("Array.isArray([])").unwrap(), Value::Boolean(true));
        assert_eq!(eval("String.fromCharCode(104, 105)").unwrap(), Value::from("hi"));
    }

    #[test]
    fn test_evaluate_call_errors() {
        assert_eq!(
            eval("Math.nope(1)").unwrap_err(),
            FormulaError::NotCallable("Math.nope".into())
        );
        let s = scope(&[("x", Value::from(1.0))]);
        assert_eq!(
            eval_with("x(1)", &s).unwrap_err(),
            FormulaError::NotCallable("x".into())
        );
        assert!(matches!(
            eval("JSON.parse()").unwrap_err(),
            FormulaError::ArgumentCount { .. }
        ));
    }

    #[test]
    fn test_evaluate_member_and_index() {
        let mut obj = IndexMap::new();
        obj.insert("k".to_string(), Value::from(1.0));
        let s = scope(&[
            ("o", Value::Object(obj)),
            ("arr", Value::Array(vec![Value::from(10.0), Value::from(20.0)])),
            ("n", Value::Null),
        ]);
        assert_eq!(eval_with("o['k']", &s).unwrap(), Value::from(1.0));
        assert_eq!(eval_with("o.k", &s).unwrap(), Value::from(1.0));
        assert_eq!(eval_with("o.missing", &s).unwrap(), Value::Absent);
        assert_eq!(eval_with("arr[1]", &s).unwrap(), Value::from(20.0));
        assert_eq!(eval_with("arr[5]", &s).unwrap(), Value::Absent);
        assert_eq!(eval_with("arr.length", &s).unwrap(), Value::from(2.0));
        assert_eq!(eval_with("'abc'[1]", &s).unwrap(), Value::from("b"));
        assert_eq!(
            eval_with("n.x", &s).unwrap_err().to_string(),
            "Cannot read properties of null (reading 'x')"
        );
        assert_eq!(
            eval_with("undefined[0]", &s).unwrap_err().to_string(),
            "Cannot read properties of undefined (reading '0')"
        );
    }

    #[test]
    fn test_evaluate_compound_literals() {
        let value = eval("{ a: 1, b: [true, null], 'c d': 'x' }").unwrap();
        let mut expected = IndexMap::new();
        expected.insert("a".to_string(), Value::from(1.0));
        expected.insert(
            "b".to_string(),
            Value::Array(vec![Value::Boolean(true), Value::Null]),
        );
        expected.insert("c d".to_string(), Value::from("x"));
        assert_eq!(value, Value::Object(expected));
    }

    #[test]
    fn test_step_budget() {
        let registry = FunctionRegistry::new();
        let limits = EvalLimits {
            max_depth: 256,
            max_steps: 10,
        };
        let ast = parse("[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]").unwrap();
        let err = Interpreter::new(&registry, limits)
            .evaluate(&ast, &Scope::new())
            .unwrap_err();
        assert_eq!(err, FormulaError::StepBudgetExceeded(10));
    }

    #[test]
    fn test_depth_limit() {
        let registry = FunctionRegistry::new();
        let limits = EvalLimits {
            max_depth: 5,
            max_steps: 1_000,
        };
        let ast = parse("-(-(-(-(-(-1)))))").unwrap();
        let err = Interpreter::new(&registry, limits)
            .evaluate(&ast, &Scope::new())
            .unwrap_err();
        assert_eq!(err, FormulaError::DepthExceeded(5));
    }

    #[test]
    fn test_flat_chain_is_not_nesting() {
        let registry = FunctionRegistry::new();
        let limits = EvalLimits {
            max_depth: 5,
            max_steps: 1_000,
        };
        let ast = parse(&vec!["1"; 300].join(" + ")).unwrap();
        let value = Interpreter::new(&registry, limits)
            .evaluate(&ast, &Scope::new())
            .unwrap();
        assert_eq!(value, Value::from(300.0));

        let ast = parse("0 || '' || 'x' || missing").unwrap();
        let value = Interpreter::new(&registry, limits)
            .evaluate(&ast, &Scope::new())
            .unwrap();
        assert_eq!(value, Value::from("x"));
    }
}
