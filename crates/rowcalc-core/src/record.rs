//! Flat, storage-ready document records

use crate::{CellId, InputDescriptor, Value};
use serde::{Deserialize, Serialize};

/// Serialized form of a whole document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub rows: Vec<RowRecord>,
}

/// Serialized form of one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRecord {
    pub id: CellId,
    pub name: String,
    /// Raw expression text; empty for input-driven cells
    #[serde(default)]
    pub expr: String,
    #[serde(default, skip_serializing_if = "Value::is_absent")]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputDescriptor>,
    /// Ids (not names) of the cells this row reads
    #[serde(default)]
    pub dependencies: Vec<CellId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentRecord {
    /// Find a row by id
    pub fn row(&self, id: &str) -> Option<&RowRecord> {
        self.rows.iter().find(|r| r.id.as_str() == id)
    }
}
