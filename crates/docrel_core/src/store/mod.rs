//! Document store contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the persistence surface the relation layer depends on.
//! - Keep storage transport errors distinct from semantic errors.
//!
//! # Invariants
//! - `put` bumps the document revision; stale revisions trigger the
//!   conflict callback before last-write-wins is applied.
//! - `query` returns an eager, finite snapshot in deterministic order.

use crate::db::DbError;
use crate::document::{Document, DocumentId};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod sqlite;

pub use sqlite::SqliteDocumentStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Callback invoked with the competing revisions of a conflicted document.
///
/// The slice holds the incoming revision first, then the stored one.
pub type ConflictCallback = Arc<dyn Fn(&[Document]) + Send + Sync>;

/// Errors raised by document store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Store write/delete failed.
    Persistence(DbError),
    /// Referenced document does not exist.
    NotFound(DocumentId),
    /// Store query failed.
    Query(DbError),
    /// Filter/sort property key is not a plain identifier.
    InvalidFilterKey(String),
    /// Persisted row cannot be decoded into a document.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persistence(err) => write!(f, "store write failed: {err}"),
            Self::NotFound(id) => write!(f, "document not found: {id}"),
            Self::Query(err) => write!(f, "store query failed: {err}"),
            Self::InvalidFilterKey(key) => write!(f, "invalid filter key: `{key}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted document: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) | Self::Query(err) => Some(err),
            Self::NotFound(_) | Self::InvalidFilterKey(_) | Self::InvalidData(_) => None,
        }
    }
}

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Sort specification applied by `DocumentStore::query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// Property key to sort by.
    pub key: String,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn ascending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            order: SortOrder::Ascending,
        }
    }

    pub fn descending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            order: SortOrder::Descending,
        }
    }
}

/// Persistence surface required by the relation layer.
///
/// Implementations own durability, filtering, and conflict detection.
/// The relation layer never assumes more than this contract.
pub trait DocumentStore {
    /// Loads one document by id. Absence is not an error.
    fn get(&self, id: &str) -> StoreResult<Option<Document>>;

    /// Persists one document, updating `document.rev` in place.
    ///
    /// A `rev` older than the stored one notifies the conflict callback
    /// with both revisions, then the write proceeds last-write-wins.
    fn put(&self, document: &mut Document) -> StoreResult<()>;

    /// Deletes one document by id. Deleting an absent id is `NotFound`.
    fn delete(&self, id: &str) -> StoreResult<()>;

    /// Returns all documents of `doc_type` whose `filter_key` property
    /// equals `filter_value`, sorted by `sort` (id order when `None`).
    fn query(
        &self,
        doc_type: &str,
        filter_key: &str,
        filter_value: &str,
        sort: Option<&SortSpec>,
    ) -> StoreResult<Vec<Document>>;

    /// Installs the callback notified on concurrent-revision conflicts.
    fn set_conflict_callback(&mut self, callback: ConflictCallback);
}
