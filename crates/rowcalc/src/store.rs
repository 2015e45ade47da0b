//! Persistence of document records
//!
//! A store keeps one [`DocumentRecord`] per document id with
//! full-replace semantics: every save overwrites all rows.

use crate::document::{Document, DocumentOptions};
use rowcalc_core::{DocumentRecord, Error, Result};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Storage keyed by document id
pub trait DocumentStore {
    /// Load the record for `doc_id`, or `None` if nothing was saved
    fn load(&self, doc_id: &str) -> Result<Option<DocumentRecord>>;

    /// Replace every row stored for `doc_id`
    fn replace(&mut self, doc_id: &str, record: &DocumentRecord) -> Result<()>;
}

/// Check that a document id is usable as a storage key
pub fn validate_doc_id(doc_id: &str) -> Result<()> {
    let valid = !doc_id.is_empty()
        && doc_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidDocumentId(doc_id.to_string()))
    }
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: HashMap<String, DocumentRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self, doc_id: &str) -> Result<Option<DocumentRecord>> {
        validate_doc_id(doc_id)?;
        Ok(self.documents.get(doc_id).cloned())
    }

    fn replace(&mut self, doc_id: &str, record: &DocumentRecord) -> Result<()> {
        validate_doc_id(doc_id)?;
        self.documents.insert(doc_id.to_string(), record.clone());
        Ok(())
    }
}

/// One `<doc_id>.json` file per document in a directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Use `dir`, creating it if needed
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, doc_id: &str) -> Result<PathBuf> {
        validate_doc_id(doc_id)?;
        Ok(self.dir.join(format!("{}.json", doc_id)))
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self, doc_id: &str) -> Result<Option<DocumentRecord>> {
        let path = self.path(doc_id)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        log::debug!("loaded document '{}' from {}", doc_id, path.display());
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn replace(&mut self, doc_id: &str, record: &DocumentRecord) -> Result<()> {
        let path = self.path(doc_id)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        fs::rename(&tmp, &path)?;
        log::debug!(
            "saved document '{}' ({} rows) to {}",
            doc_id,
            record.rows.len(),
            path.display()
        );
        Ok(())
    }
}

impl Document {
    /// Load and recompute a stored document
    pub fn load<S: DocumentStore + ?Sized>(
        store: &S,
        doc_id: &str,
        options: DocumentOptions,
    ) -> Result<Option<Document>> {
        store
            .load(doc_id)?
            .map(|record| Document::deserialize(&record, options))
            .transpose()
    }

    /// Replace the stored rows of `doc_id` with this document
    pub fn save<S: DocumentStore + ?Sized>(&self, store: &mut S, doc_id: &str) -> Result<()> {
        store.replace(doc_id, &self.serialize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellOptions;
    use pretty_assertions::assert_eq;
    use rowcalc_core::Value;

    fn sample() -> Document {
        let mut doc = Document::default();
        doc.add_cell(CellOptions::new("a").id("a").expression("20"))
            .unwrap();
        doc.add_cell(CellOptions::new("b").id("b").expression("a + 1"))
            .unwrap();
        doc
    }

    #[test]
    fn test_validate_doc_id() {
        assert!(validate_doc_id("budget_2024-q1").is_ok());
        assert!(validate_doc_id("").is_err());
        assert!(validate_doc_id("../etc").is_err());
        assert!(validate_doc_id("a b").is_err());
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert!(Document::load(&store, "doc", DocumentOptions::default())
            .unwrap()
            .is_none());

        sample().save(&mut store, "doc").unwrap();
        let doc = Document::load(&store, "doc", DocumentOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(
            doc.cell(&"b".into()).unwrap().value(),
            &Value::from(21.0)
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_replace_overwrites_all_rows() {
        let mut store = MemoryStore::new();
        sample().save(&mut store, "doc").unwrap();
        store.replace("doc", &DocumentRecord::default()).unwrap();
        assert!(store.load("doc").unwrap().unwrap().rows.is_empty());
    }

    #[test]
    fn test_json_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::open(dir.path().join("docs")).unwrap();
        assert!(store.load("doc").unwrap().is_none());

        let doc = sample();
        doc.save(&mut store, "doc").unwrap();
        assert!(store.dir().join("doc.json").exists());
        assert!(!store.dir().join("doc.json.tmp").exists());

        let loaded = store.load("doc").unwrap().unwrap();
        assert_eq!(loaded, doc.serialize());
        assert!(matches!(
            store.load("../doc"),
            Err(Error::InvalidDocumentId(_))
        ));
    }
}
