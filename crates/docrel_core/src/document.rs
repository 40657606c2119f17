//! Document record and typed property access.
//!
//! # Responsibility
//! - Define the persisted document shape shared by all model types.
//! - Provide typed accessor/mutator pairs over the JSON property bag.
//!
//! # Invariants
//! - `id` is stable for the lifetime of the document.
//! - `rev` is maintained by the store; `0` means never persisted.
//! - Relation arrays are ordered JSON arrays of string ids.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Stable identifier of a persisted document.
///
/// Kept as a string alias: ids may be caller-assigned or generated.
pub type DocumentId = String;

/// A persisted record: id, type tag, revision, and a JSON property bag.
///
/// Documents are owned by the store. Application code reads and writes
/// properties through the typed accessors instead of raw key/value
/// reflection, so property names are fixed at the call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable document id.
    pub id: DocumentId,
    /// Type discriminator. Empty until the first save backfills it.
    #[serde(rename = "type")]
    pub doc_type: String,
    /// Store-maintained revision counter. `0` = never persisted.
    #[serde(default)]
    pub rev: u64,
    /// Named property values.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Document {
    /// Creates a document with a generated UUID v4 id.
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), doc_type)
    }

    /// Creates a document with a caller-provided id.
    ///
    /// Used by import paths and tests where identity already exists.
    pub fn with_id(id: impl Into<DocumentId>, doc_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            doc_type: doc_type.into(),
            rev: 0,
            properties: Map::new(),
        }
    }

    /// Returns the raw JSON value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Stores a raw JSON value under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    /// Removes the property stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    /// Returns the string property stored under `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    /// Stores a string property under `key`.
    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), Value::String(value.into()));
    }

    /// Returns the ordered id-list property stored under `key`.
    ///
    /// A value that is not an array of strings reads as absent.
    pub fn get_id_list(&self, key: &str) -> Option<Vec<DocumentId>> {
        let items = self.properties.get(key)?.as_array()?;
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            ids.push(item.as_str()?.to_string());
        }
        Some(ids)
    }

    /// Stores an ordered id-list property under `key`.
    pub fn set_id_list(&mut self, key: impl Into<String>, ids: &[DocumentId]) {
        let items = ids
            .iter()
            .map(|id| Value::String(id.clone()))
            .collect::<Vec<Value>>();
        self.properties.insert(key.into(), Value::Array(items));
    }
}
