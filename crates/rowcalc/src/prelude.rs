//! Prelude module - common imports for rowcalc users
//!
//! ```rust
//! use rowcalc::prelude::*;
//! ```

pub use crate::{
    // Formula types
    CapabilityPolicy,
    // Main types
    Cell,
    CellEvent,
    CellId,
    CellOptions,
    Document,
    DocumentOptions,
    DocumentRecord,
    // Persistence
    DocumentStore,
    // Error types
    Error,
    ErrorKind,
    EvalLimits,
    FormulaError,
    InputDescriptor,
    JsonFileStore,
    MemoryStore,
    RecalcStats,
    Result,
    // Values
    Value,
    ValueKind,
};
