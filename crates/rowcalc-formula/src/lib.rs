//! # rowcalc-formula
//!
//! Expression language for rowcalc.
//!
//! This crate provides:
//! - Expression parsing (text → AST)
//! - A static safety analyzer over a capability whitelist
//! - Expression evaluation (AST + scope → value)
//! - Built-in `Math`, `Number`, `String`, `Array`, `Date` and `JSON` functions
//! - Dependency tracking and ordering for recomputation
//! - Rename-aware source rewriting
//!
//! ## Example
//!
//! ```rust
//! use rowcalc_formula::{FormulaEngine, Scope};
//! use rowcalc_core::Value;
//!
//! let engine = FormulaEngine::default();
//! let mut scope = Scope::new();
//! scope.insert("$price".to_string(), Value::from(4.0));
//!
//! let value = engine.eval_expression("Math.max($price * 2, 5)", &scope).unwrap();
//! assert_eq!(value, Value::from(8.0));
//! ```

pub mod ast;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod rewrite;
pub mod safety;

pub use ast::{BinaryOperator, Expr, LogicalOperator, Property, Span, UnaryOperator};
pub use dependency::{DependencyGraph, EvaluationOrder};
pub use engine::{Compiled, FormulaEngine};
pub use error::{ErrorKind, FormulaError, FormulaResult};
pub use evaluator::{evaluate, EvalLimits, Interpreter, Scope};
pub use functions::{FunctionDef, FunctionRegistry};
pub use parser::{is_identifier, parse, parse_with_max_depth};
pub use rewrite::{rename_references, renamed_reference, rewrite_identifiers};
pub use safety::{CapabilityPolicy, Offense, SafetyAnalyzer};
