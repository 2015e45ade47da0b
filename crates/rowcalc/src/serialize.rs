//! Document ⇄ [`DocumentRecord`] conversion

use crate::cell::{Cell, CellOptions};
use crate::document::{Document, DocumentOptions};
use rowcalc_core::{DocumentRecord, IndexSet, Result, RowRecord};

impl Document {
    /// Flatten the document into a storage-ready record.
    ///
    /// Dependencies are written as cell ids so references survive renames.
    /// An input's default value is refreshed to the cell's current value.
    pub fn serialize(&self) -> DocumentRecord {
        DocumentRecord {
            rows: self.cells.values().map(|cell| self.row(cell)).collect(),
        }
    }

    /// Rebuild a document from a record and recompute it once
    pub fn deserialize(record: &DocumentRecord, options: DocumentOptions) -> Result<Document> {
        let mut doc = Document::new(options);
        for row in &record.rows {
            let mut cell = CellOptions::new(row.name.clone())
                .id(row.id.clone())
                .tags(row.tags.iter().cloned());
            match &row.input {
                Some(input) => cell = cell.input(input.clone()),
                None => cell = cell.expression(row.expr.clone()),
            }
            doc.insert_cell(cell)?;
        }
        doc.recompute_all();
        Ok(doc)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.serialize())?)
    }

    /// Parse JSON produced by [`Document::to_json`]
    pub fn from_json(json: &str, options: DocumentOptions) -> Result<Document> {
        let record: DocumentRecord = serde_json::from_str(json)?;
        Document::deserialize(&record, options)
    }

    fn row(&self, cell: &Cell) -> RowRecord {
        let input = cell.input().map(|input| {
            let mut input = input.clone();
            input.set_default_value(cell.value().clone());
            input
        });

        RowRecord {
            id: cell.id().clone(),
            name: cell.name().to_string(),
            expr: cell.expression().to_string(),
            value: cell.value().clone(),
            input,
            dependencies: cell
                .dependencies()
                .iter()
                .filter_map(|name| self.resolve_name(name))
                .cloned()
                .collect::<IndexSet<_>>()
                .into_iter()
                .collect(),
            tags: cell.tags().iter().cloned().collect(),
            error: cell.error().map(ToString::to_string),
        }
    }
}
