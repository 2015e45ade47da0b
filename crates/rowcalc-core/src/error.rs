//! Error types for rowcalc-core

use crate::CellId;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by document-level operations
#[derive(Debug, Error)]
pub enum Error {
    /// No cell with this id exists in the document
    #[error("Cell not found: {0}")]
    CellNotFound(CellId),

    /// A cell with this id already exists in the document
    #[error("Duplicate cell id: {0}")]
    DuplicateId(CellId),

    /// Another cell already uses this name
    #[error("Cell name already in use: {0}")]
    NameTaken(String),

    /// The name cannot be referenced from an expression
    #[error("Invalid cell name: {0}")]
    InvalidName(String),

    /// A value was rejected by an input descriptor
    #[error("Invalid input value: {0}")]
    InvalidInputValue(String),

    /// A document id contains characters a store cannot key on
    #[error("Invalid document id: {0}")]
    InvalidDocumentId(String),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }
}
