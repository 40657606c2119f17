//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist documents as JSON rows and delegate filtering to SQLite.
//! - Detect stale-revision writes and notify the conflict callback.
//!
//! # Invariants
//! - Property filters run through `json_extract` with bound paths only.
//! - Result order is deterministic: sort key (when given), then id.

use crate::db::{DbError, DbResult};
use crate::document::Document;
use crate::store::{ConflictCallback, DocumentStore, SortOrder, SortSpec, StoreError, StoreResult};
use log::warn;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::Map;
use std::path::Path;

const DOCUMENT_SELECT_SQL: &str = "SELECT id, type, rev, properties FROM documents";

/// Document store persisting to a migrated SQLite connection.
pub struct SqliteDocumentStore {
    conn: Connection,
    on_conflict: Option<ConflictCallback>,
}

impl SqliteDocumentStore {
    /// Opens a file-backed store, running migrations as needed.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::new(crate::db::open_db(path)?))
    }

    /// Opens an in-memory store, mainly for tests and probes.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(crate::db::open_db_in_memory()?))
    }

    /// Wraps an already-migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            on_conflict: None,
        }
    }

    fn load(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!("{DOCUMENT_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_document_row,
            )
            .optional()
            .map_err(|err| StoreError::Query(DbError::Sqlite(err)))?;

        match row {
            Some(parsed) => Ok(Some(parsed?)),
            None => Ok(None),
        }
    }

    fn notify_conflict(&self, revisions: &[Document]) {
        match &self.on_conflict {
            Some(callback) => callback(revisions),
            None => {
                if let Some(first) = revisions.first() {
                    warn!(
                        "event=doc_conflict module=store status=unhandled type={} id={}",
                        first.doc_type, first.id
                    );
                }
            }
        }
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn get(&self, id: &str) -> StoreResult<Option<Document>> {
        self.load(id)
    }

    fn put(&self, document: &mut Document) -> StoreResult<()> {
        let stored = self.load(document.id.as_str())?;
        let body = serde_json::to_string(&document.properties).map_err(|err| {
            StoreError::InvalidData(format!(
                "cannot encode properties of `{}`: {err}",
                document.id
            ))
        })?;

        match stored {
            None => {
                self.conn
                    .execute(
                        "INSERT INTO documents (id, type, rev, properties) VALUES (?1, ?2, 1, ?3);",
                        params![document.id, document.doc_type, body],
                    )
                    .map_err(persistence)?;
                document.rev = 1;
            }
            Some(existing) => {
                if existing.rev != document.rev {
                    self.notify_conflict(&[document.clone(), existing.clone()]);
                }
                let next_rev = existing.rev + 1;
                self.conn
                    .execute(
                        "UPDATE documents
                         SET
                            type = ?2,
                            rev = ?3,
                            properties = ?4,
                            updated_at = (strftime('%s', 'now') * 1000)
                         WHERE id = ?1;",
                        params![document.id, document.doc_type, next_rev as i64, body],
                    )
                    .map_err(persistence)?;
                document.rev = next_rev;
            }
        }

        Ok(())
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1;", [id])
            .map_err(persistence)?;

        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        Ok(())
    }

    fn query(
        &self,
        doc_type: &str,
        filter_key: &str,
        filter_value: &str,
        sort: Option<&SortSpec>,
    ) -> StoreResult<Vec<Document>> {
        ensure_property_key(filter_key)?;

        let mut sql = format!(
            "{DOCUMENT_SELECT_SQL} WHERE type = ? AND json_extract(properties, ?) = ?"
        );
        let mut bind_values: Vec<Value> = vec![
            Value::Text(doc_type.to_string()),
            Value::Text(json_path(filter_key)),
            Value::Text(filter_value.to_string()),
        ];

        match sort {
            Some(spec) => {
                ensure_property_key(&spec.key)?;
                let direction = match spec.order {
                    SortOrder::Ascending => "ASC",
                    SortOrder::Descending => "DESC",
                };
                sql.push_str(&format!(
                    " ORDER BY json_extract(properties, ?) {direction}, id ASC"
                ));
                bind_values.push(Value::Text(json_path(&spec.key)));
            }
            None => sql.push_str(" ORDER BY id ASC"),
        }

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|err| StoreError::Query(DbError::Sqlite(err)))?;
        let mut rows = stmt
            .query(params_from_iter(bind_values))
            .map_err(|err| StoreError::Query(DbError::Sqlite(err)))?;

        let mut documents = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|err| StoreError::Query(DbError::Sqlite(err)))?
        {
            documents.push(parse_document_row(row).map_err(|err| {
                StoreError::Query(DbError::Sqlite(err))
            })??);
        }

        Ok(documents)
    }

    fn set_conflict_callback(&mut self, callback: ConflictCallback) {
        self.on_conflict = Some(callback);
    }
}

fn persistence(err: rusqlite::Error) -> StoreError {
    StoreError::Persistence(DbError::Sqlite(err))
}

fn json_path(key: &str) -> String {
    format!("$.{key}")
}

fn ensure_property_key(key: &str) -> StoreResult<()> {
    let mut chars = key.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidFilterKey(key.to_string()))
    }
}

/// Parses one `documents` row.
///
/// The outer error is the row access failure surface required by
/// `query_row`; the inner one reports undecodable persisted JSON.
fn parse_document_row(row: &Row<'_>) -> rusqlite::Result<StoreResult<Document>> {
    let id: String = row.get("id")?;
    let doc_type: String = row.get("type")?;
    let rev: i64 = row.get("rev")?;
    let body: String = row.get("properties")?;

    let properties = match serde_json::from_str::<Map<String, serde_json::Value>>(&body) {
        Ok(properties) => properties,
        Err(err) => {
            return Ok(Err(StoreError::InvalidData(format!(
                "cannot decode properties of `{id}`: {err}"
            ))))
        }
    };

    Ok(Ok(Document {
        id,
        doc_type,
        rev: rev as u64,
        properties,
    }))
}
