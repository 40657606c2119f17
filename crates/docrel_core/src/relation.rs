//! Relation management over the document store.
//!
//! # Responsibility
//! - Maintain one-to-many relations expressed as a parent-side id array
//!   and a child-side parent pointer, both with derived keys.
//! - Cascade deletes through declared child types and break the parent
//!   back-reference when a child goes away.
//!
//! # Invariants
//! - Linking is idempotent: a relation array holds a child id at most once.
//! - Declared children are fully deleted before their parent's own
//!   document is removed.
//! - Child lookup is best-effort: query failures yield an empty result.
//!   Cascade lookups and deletions are hard failures.

use crate::document::Document;
use crate::model::Model;
use crate::schema::{children_key, parent_key, SchemaError, SchemaRegistry};
use crate::store::{ConflictCallback, DocumentStore, SortSpec, StoreError};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Errors from relation operations.
#[derive(Debug)]
pub enum RelationError {
    /// Persistence-layer failure.
    Store(StoreError),
    /// Relation or type declaration misuse.
    Schema(SchemaError),
}

impl Display for RelationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RelationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Schema(err) => Some(err),
        }
    }
}

impl From<StoreError> for RelationError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<SchemaError> for RelationError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

/// Facade maintaining referential integrity of declared relations.
///
/// Holds the injected store and the sealed registry; otherwise stateless.
/// All calls are synchronous and run to completion. Concurrent `link`
/// calls on the same parent race on the read-modify-write of the relation
/// array; callers must serialize writes to one parent externally.
pub struct RelationManager<S: DocumentStore> {
    store: S,
    registry: Arc<SchemaRegistry>,
}

impl<S: DocumentStore> RelationManager<S> {
    /// Wires the store's conflict callback to the registry and returns
    /// the manager.
    pub fn new(mut store: S, registry: Arc<SchemaRegistry>) -> Self {
        store.set_conflict_callback(conflict_dispatcher(Arc::clone(&registry)));
        Self { store, registry }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persists one model, backfilling an empty type tag first.
    pub fn save(&self, model: &mut Model) -> Result<(), RelationError> {
        if model.document().doc_type.is_empty() {
            let type_name = model.type_name().to_string();
            model.document_mut().doc_type = type_name;
        }

        self.store.put(model.document_mut())?;
        Ok(())
    }

    /// Loads one model by type and id.
    ///
    /// A document stored under the id with a different type tag reads
    /// as absent.
    pub fn get(&self, type_name: &str, id: &str) -> Result<Option<Model>, RelationError> {
        let kind = self.registry.require(type_name)?;
        let Some(document) = self.store.get(id)? else {
            return Ok(None);
        };
        if document.doc_type != kind.name() {
            return Ok(None);
        }

        Ok(Some(Model::from_document(&self.registry, document)?))
    }

    /// Appends the child to the parent's relation array, de-duplicated.
    ///
    /// The child must be a declared child type of the parent. Either side
    /// is persisted on request; persistence failures are hard errors.
    pub fn link(
        &self,
        parent: &mut Model,
        child: &mut Model,
        save_parent: bool,
        save_child: bool,
    ) -> Result<(), RelationError> {
        let key = parent
            .kind()
            .children_key_for(child.type_name())?
            .to_string();

        let mut ids = parent.document().get_id_list(&key).unwrap_or_default();
        if !ids.iter().any(|id| id == child.id()) {
            ids.push(child.id().to_string());
            parent.document_mut().set_id_list(&key, &ids);
        }

        if save_parent {
            self.save(parent)?;
        }
        if save_child {
            self.save(child)?;
        }

        Ok(())
    }

    /// Returns all stored children of one declared child type.
    ///
    /// The lookup filters documents of `child_type` whose parent pointer
    /// equals the parent's id, in a finite snapshot taken at call time.
    /// Failures are logged and read as an empty result.
    pub fn query_children(
        &self,
        parent: &Model,
        child_type: &str,
        sort: Option<&SortSpec>,
    ) -> Vec<Model> {
        match self.query_children_strict(parent, child_type, sort) {
            Ok(children) => children,
            Err(err) => {
                warn!(
                    "event=child_query module=relation status=error parent_type={} parent_id={} child_type={child_type} error={err}",
                    parent.type_name(),
                    parent.id()
                );
                Vec::new()
            }
        }
    }

    fn query_children_strict(
        &self,
        parent: &Model,
        child_type: &str,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<Model>, RelationError> {
        parent.kind().children_key_for(child_type)?;

        let filter_key = parent_key(parent.type_name());
        let documents = self
            .store
            .query(child_type, &filter_key, parent.id(), sort)?;

        let mut children = Vec::with_capacity(documents.len());
        for document in documents {
            children.push(Model::from_document(&self.registry, document)?);
        }
        Ok(children)
    }

    /// Deletes the model's document after resolving its relations.
    ///
    /// Declared children are deleted first, recursively; any failure
    /// there aborts the whole operation before the model's own document
    /// is touched. The parent's relation array entry is then removed
    /// best-effort, and finally the document itself is deleted.
    pub fn delete_cascade(&self, model: &Model) -> Result<(), RelationError> {
        self.cascade(model, true)?;
        info!(
            "event=model_delete module=relation status=ok type={} id={}",
            model.type_name(),
            model.id()
        );
        Ok(())
    }

    fn cascade(&self, model: &Model, break_parent: bool) -> Result<(), RelationError> {
        let filter_key = parent_key(model.type_name());
        for child_type in model.kind().child_types() {
            let children = self
                .store
                .query(child_type, &filter_key, model.id(), None)?;
            for document in children {
                let child = Model::from_document(&self.registry, document)?;
                // The dying parent's relation array is not rewritten per child.
                self.cascade(&child, false)?;
            }
        }

        if break_parent {
            self.break_parent_link(model);
        }

        self.store.delete(model.id())?;
        Ok(())
    }

    /// Removes this model's id from its parent's relation array.
    ///
    /// A missing parent document, relation array, or array entry means
    /// the relation is already absent; nothing happens. A failed parent
    /// save is logged and not propagated.
    fn break_parent_link(&self, model: &Model) {
        let Some(parent_id) = model.parent_id() else {
            return;
        };

        let mut parent_document = match self.store.get(parent_id) {
            Ok(Some(document)) => document,
            Ok(None) => return,
            Err(err) => {
                warn!(
                    "event=parent_unlink module=relation status=error child_id={} parent_id={parent_id} error={err}",
                    model.id()
                );
                return;
            }
        };

        let key = children_key(model.type_name());
        let Some(mut ids) = parent_document.get_id_list(&key) else {
            return;
        };
        let Some(position) = ids.iter().position(|id| id == model.id()) else {
            return;
        };

        ids.remove(position);
        parent_document.set_id_list(&key, &ids);

        if let Err(err) = self.store.put(&mut parent_document) {
            warn!(
                "event=parent_unlink module=relation status=error child_id={} parent_id={parent_id} error={err}",
                model.id()
            );
        }
    }
}

/// Routes store conflicts to the per-type handler, or logs them.
fn conflict_dispatcher(registry: Arc<SchemaRegistry>) -> ConflictCallback {
    Arc::new(move |revisions: &[Document]| {
        let Some(first) = revisions.first() else {
            return;
        };

        let handler = registry
            .get(first.doc_type.as_str())
            .and_then(|kind| kind.conflict_handler().cloned());
        match handler {
            Some(handler) => handler(revisions),
            None => debug!(
                "event=doc_conflict module=relation status=ignored type={} id={} revisions={}",
                first.doc_type,
                first.id,
                revisions.len()
            ),
        }
    })
}
