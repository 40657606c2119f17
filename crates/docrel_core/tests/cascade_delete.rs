use docrel_core::{
    ConflictCallback, Document, DocumentStore, Model, ModelType, RelationManager, SchemaBuilder,
    SchemaRegistry, SortSpec, SqliteDocumentStore, StoreError, StoreResult,
};
use std::sync::Arc;

fn registry() -> Arc<SchemaRegistry> {
    let mut builder = SchemaBuilder::new();
    builder
        .register(ModelType::new("Notebook").with_child("Note"))
        .unwrap();
    builder
        .register(
            ModelType::new("Note")
                .with_parent("Notebook")
                .with_child("Attachment"),
        )
        .unwrap();
    builder
        .register(ModelType::new("Attachment").with_parent("Note"))
        .unwrap();
    Arc::new(builder.finish().unwrap())
}

fn manager(registry: &Arc<SchemaRegistry>) -> RelationManager<SqliteDocumentStore> {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    RelationManager::new(store, Arc::clone(registry))
}

fn linked_note(
    manager: &RelationManager<SqliteDocumentStore>,
    registry: &SchemaRegistry,
    notebook: &mut Model,
    id: &str,
) -> Model {
    let mut note = Model::create_with_id(registry, "Note", id).unwrap();
    note.set_parent_id(notebook.id().to_string()).unwrap();
    manager.link(notebook, &mut note, true, true).unwrap();
    note
}

#[test]
fn deleting_a_child_clears_the_parent_relation_entry() {
    let registry = registry();
    let manager = manager(&registry);

    let mut notebook = Model::create_with_id(&registry, "Notebook", "n1").unwrap();
    let note = linked_note(&manager, &registry, &mut notebook, "a1");
    assert_eq!(notebook.child_ids("Note").unwrap(), vec!["a1".to_string()]);

    manager.delete_cascade(&note).unwrap();

    let reloaded = manager.get("Notebook", "n1").unwrap().unwrap();
    assert!(reloaded.child_ids("Note").unwrap().is_empty());
    assert!(manager.get("Note", "a1").unwrap().is_none());
}

#[test]
fn cascade_removes_every_linked_child() {
    let registry = registry();
    let manager = manager(&registry);

    let mut notebook = Model::create_with_id(&registry, "Notebook", "n1").unwrap();
    linked_note(&manager, &registry, &mut notebook, "a1");
    linked_note(&manager, &registry, &mut notebook, "a2");

    manager.delete_cascade(&notebook).unwrap();

    assert!(manager.get("Notebook", "n1").unwrap().is_none());
    assert!(manager.get("Note", "a1").unwrap().is_none());
    assert!(manager.get("Note", "a2").unwrap().is_none());
}

#[test]
fn cascade_descends_through_grandchildren() {
    let registry = registry();
    let manager = manager(&registry);

    let mut notebook = Model::create_with_id(&registry, "Notebook", "n1").unwrap();
    let mut note = linked_note(&manager, &registry, &mut notebook, "a1");

    let mut attachment = Model::create_with_id(&registry, "Attachment", "f1").unwrap();
    attachment.set_parent_id("a1").unwrap();
    manager
        .link(&mut note, &mut attachment, true, true)
        .unwrap();

    manager.delete_cascade(&notebook).unwrap();

    assert!(manager.get("Notebook", "n1").unwrap().is_none());
    assert!(manager.get("Note", "a1").unwrap().is_none());
    assert!(manager.get("Attachment", "f1").unwrap().is_none());
}

#[test]
fn deleting_with_a_dangling_parent_pointer_is_a_noop_unlink() {
    let registry = registry();
    let manager = manager(&registry);

    let mut note = Model::create_with_id(&registry, "Note", "a1").unwrap();
    note.set_parent_id("gone").unwrap();
    manager.save(&mut note).unwrap();

    manager.delete_cascade(&note).unwrap();
    assert!(manager.get("Note", "a1").unwrap().is_none());
}

#[test]
fn unlink_tolerates_a_parent_without_relation_array() {
    let registry = registry();
    let manager = manager(&registry);

    let mut notebook = Model::create_with_id(&registry, "Notebook", "n1").unwrap();
    manager.save(&mut notebook).unwrap();

    let mut note = Model::create_with_id(&registry, "Note", "a1").unwrap();
    note.set_parent_id("n1").unwrap();
    manager.save(&mut note).unwrap();

    manager.delete_cascade(&note).unwrap();

    assert!(manager.get("Note", "a1").unwrap().is_none());
    assert!(manager.get("Notebook", "n1").unwrap().is_some());
}

/// Store wrapper that refuses to delete one poisoned id.
struct PoisonedDeleteStore {
    inner: SqliteDocumentStore,
    poisoned_id: String,
}

impl DocumentStore for PoisonedDeleteStore {
    fn get(&self, id: &str) -> StoreResult<Option<Document>> {
        self.inner.get(id)
    }

    fn put(&self, document: &mut Document) -> StoreResult<()> {
        self.inner.put(document)
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        if id == self.poisoned_id {
            return Err(StoreError::InvalidData("injected delete failure".to_string()));
        }
        self.inner.delete(id)
    }

    fn query(
        &self,
        doc_type: &str,
        filter_key: &str,
        filter_value: &str,
        sort: Option<&SortSpec>,
    ) -> StoreResult<Vec<Document>> {
        self.inner.query(doc_type, filter_key, filter_value, sort)
    }

    fn set_conflict_callback(&mut self, callback: ConflictCallback) {
        self.inner.set_conflict_callback(callback);
    }
}

#[test]
fn failed_child_deletion_aborts_before_the_parent_is_removed() {
    let registry = registry();
    let store = PoisonedDeleteStore {
        inner: SqliteDocumentStore::open_in_memory().unwrap(),
        poisoned_id: "a2".to_string(),
    };
    let manager = RelationManager::new(store, Arc::clone(&registry));

    let mut notebook = Model::create_with_id(&registry, "Notebook", "n1").unwrap();
    for id in ["a1", "a2"] {
        let mut note = Model::create_with_id(&registry, "Note", id).unwrap();
        note.set_parent_id("n1").unwrap();
        manager.link(&mut notebook, &mut note, true, true).unwrap();
    }

    manager
        .delete_cascade(&notebook)
        .expect_err("poisoned child deletion must abort the cascade");

    assert!(manager.store().get("n1").unwrap().is_some());
    assert!(manager.store().get("a2").unwrap().is_some());
}
