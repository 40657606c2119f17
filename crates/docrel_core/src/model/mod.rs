//! Typed model view over a stored document.
//!
//! # Responsibility
//! - Pair one document with its registered type declaration.
//! - Expose relation-aware accessors (parent pointer, child id lists).
//!
//! # Invariants
//! - A model and its document share identity for their whole lifetime.
//! - The paired declaration always comes from a sealed registry.

use crate::document::{Document, DocumentId};
use crate::schema::{ModelType, SchemaError, SchemaRegistry};
use std::sync::Arc;

/// One document plus the declaration registered for its type.
#[derive(Debug)]
pub struct Model {
    document: Document,
    kind: Arc<ModelType>,
}

impl Model {
    /// Creates a fresh model of a registered type with a generated id.
    pub fn create(registry: &SchemaRegistry, type_name: &str) -> Result<Self, SchemaError> {
        let kind = registry.require(type_name)?;
        Ok(Self {
            document: Document::new(type_name),
            kind: Arc::clone(kind),
        })
    }

    /// Creates a fresh model with a caller-assigned document id.
    pub fn create_with_id(
        registry: &SchemaRegistry,
        type_name: &str,
        id: impl Into<DocumentId>,
    ) -> Result<Self, SchemaError> {
        let kind = registry.require(type_name)?;
        Ok(Self {
            document: Document::with_id(id, type_name),
            kind: Arc::clone(kind),
        })
    }

    /// Wraps a loaded document, resolving its declaration by type tag.
    pub fn from_document(
        registry: &SchemaRegistry,
        document: Document,
    ) -> Result<Self, SchemaError> {
        let kind = registry.require(document.doc_type.as_str())?;
        Ok(Self {
            document,
            kind: Arc::clone(kind),
        })
    }

    pub fn id(&self) -> &str {
        &self.document.id
    }

    /// Declared type name. May differ from the document's type tag only
    /// before the first save backfills the tag.
    pub fn type_name(&self) -> &str {
        self.kind.name()
    }

    pub fn kind(&self) -> &Arc<ModelType> {
        &self.kind
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// Returns the stored parent document id, when declared and set.
    pub fn parent_id(&self) -> Option<&str> {
        let key = self.kind.parent_id_key()?;
        self.document.get_str(key)
    }

    /// Sets the parent pointer property for the declared parent type.
    pub fn set_parent_id(&mut self, parent_id: impl Into<DocumentId>) -> Result<(), SchemaError> {
        let key = self
            .kind
            .parent_id_key()
            .ok_or_else(|| SchemaError::NoDeclaredParent(self.kind.name().to_string()))?
            .to_string();
        self.document.set_str(key, parent_id.into());
        Ok(())
    }

    /// Returns the relation array for one declared child type.
    ///
    /// An absent or malformed property reads as an empty list.
    pub fn child_ids(&self, child_type: &str) -> Result<Vec<DocumentId>, SchemaError> {
        let key = self.kind.children_key_for(child_type)?;
        Ok(self.document.get_id_list(key).unwrap_or_default())
    }
}
