//! # rowcalc
//!
//! A reactive computation engine for sheets of named rows.
//!
//! Each cell holds either an expression or an externally driven input
//! value. Whenever anything changes, the document rebuilds its dependency
//! graph and recomputes every cell in dependency order.
//!
//! ## Features
//!
//! - A small JavaScript-like expression language
//! - Static capability filtering: expressions may only reach whitelisted
//!   `Math`, `Number`, `String`, `Array`, `Date` and `JSON` functions
//! - Fail-soft recomputation: errors stay on the failing cell, absence
//!   propagates downstream
//! - Rename-aware reference rewriting
//! - Portable JSON records and pluggable stores
//!
//! ## Example
//!
//! ```rust
//! use rowcalc::prelude::*;
//!
//! let mut doc = Document::default();
//! let price = doc
//!     .add_cell(CellOptions::new("price").input(InputDescriptor::number(0.0, 100.0, 1.0, 10.0)))
//!     .unwrap();
//! let total = doc
//!     .add_cell(CellOptions::new("total").expression("Math.round($price * 1.2)"))
//!     .unwrap();
//! assert_eq!(doc.cell(&total).unwrap().value(), &Value::from(12.0));
//!
//! doc.set_input_value(&price, 20.0).unwrap();
//! assert_eq!(doc.cell(&total).unwrap().value(), &Value::from(24.0));
//!
//! // Capabilities outside the whitelist are rejected before evaluation
//! doc.update_expression(&total, "fetch('https://example.com')").unwrap();
//! assert_eq!(doc.cell(&total).unwrap().value_kind(), ValueKind::Error);
//! ```

pub mod calculation;
pub mod cell;
pub mod document;
pub mod observer;
pub mod prelude;
pub mod serialize;
pub mod store;

pub use calculation::RecalcStats;
pub use cell::{Cell, CellOptions};
pub use document::{Document, DocumentOptions};
pub use observer::{CellEvent, ListenerId, Listeners};
pub use store::{validate_doc_id, DocumentStore, JsonFileStore, MemoryStore};

// Re-export core types
pub use rowcalc_core::{
    format_number, Callable, CellId, DocumentRecord, Error, IndexMap, IndexSet, InputDescriptor,
    Result, RowRecord, Value, ValueKind,
};

// Re-export formula types
pub use rowcalc_formula::{
    evaluate, parse, CapabilityPolicy, ErrorKind, EvalLimits, Expr, FormulaEngine, FormulaError,
    FormulaResult, Offense, SafetyAnalyzer, Scope,
};
