//! # rowcalc-core
//!
//! Core data types shared by the rowcalc crates:
//! - [`Value`] and [`ValueKind`] - the runtime values carried through scopes and cells
//! - [`CellId`] - stable cell identity
//! - [`InputDescriptor`] - configuration of an externally driven cell
//! - [`DocumentRecord`] - the flat, storage-ready form of a document
//!
//! ## Example
//!
//! ```rust
//! use rowcalc_core::{Value, ValueKind};
//!
//! let v = Value::from(42.0);
//! assert_eq!(v.kind(), ValueKind::Number);
//! assert_eq!(v.to_text(), "42");
//! ```

pub mod error;
pub mod id;
pub mod input;
pub mod record;
pub mod value;

pub use error::{Error, Result};
pub use id::CellId;
pub use input::InputDescriptor;
pub use record::{DocumentRecord, RowRecord};
pub use value::{format_number, Callable, Value, ValueKind};

/// Re-exported so callers can build object values and input props without
/// depending on `indexmap` directly.
pub use indexmap::{IndexMap, IndexSet};
