//! Convention-based relation management over a document store.
//!
//! Model types declare their parent and child types once; relation
//! property keys are derived from the type names (`Note` children live
//! in `noteIds`, a `Notebook` parent pointer in `notebookId`). The
//! relation manager keeps both sides consistent on link, query, save,
//! and cascading delete. Persistence, filtering, and conflict detection
//! are delegated to the document store.

pub mod db;
pub mod document;
pub mod logging;
pub mod model;
pub mod relation;
pub mod schema;
pub mod store;

pub use document::{Document, DocumentId};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::Model;
pub use relation::{RelationError, RelationManager};
pub use schema::{
    children_key, parent_key, ModelType, SchemaBuilder, SchemaError, SchemaRegistry,
};
pub use store::{
    ConflictCallback, DocumentStore, SortOrder, SortSpec, SqliteDocumentStore, StoreError,
    StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
