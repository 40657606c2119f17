use docrel_core::{
    DocumentStore, Model, ModelType, RelationError, RelationManager, SchemaBuilder, SchemaError,
    SchemaRegistry, SortSpec, SqliteDocumentStore,
};
use std::sync::Arc;

fn registry() -> Arc<SchemaRegistry> {
    let mut builder = SchemaBuilder::new();
    builder
        .register(ModelType::new("Notebook").with_child("Note"))
        .unwrap();
    builder
        .register(ModelType::new("Note").with_parent("Notebook"))
        .unwrap();
    Arc::new(builder.finish().unwrap())
}

fn manager(registry: &Arc<SchemaRegistry>) -> RelationManager<SqliteDocumentStore> {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    RelationManager::new(store, Arc::clone(registry))
}

#[test]
fn link_appends_child_id_and_query_returns_it() {
    let registry = registry();
    let manager = manager(&registry);

    let mut notebook = Model::create_with_id(&registry, "Notebook", "n1").unwrap();
    let mut note = Model::create_with_id(&registry, "Note", "a1").unwrap();
    note.set_parent_id("n1").unwrap();

    manager.link(&mut notebook, &mut note, true, true).unwrap();

    assert_eq!(notebook.child_ids("Note").unwrap(), vec!["a1".to_string()]);

    let children = manager.query_children(&notebook, "Note", None);
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id(), "a1");
}

#[test]
fn linking_twice_keeps_one_relation_entry() {
    let registry = registry();
    let manager = manager(&registry);

    let mut notebook = Model::create_with_id(&registry, "Notebook", "n1").unwrap();
    let mut note = Model::create_with_id(&registry, "Note", "a1").unwrap();
    note.set_parent_id("n1").unwrap();

    manager.link(&mut notebook, &mut note, false, false).unwrap();
    manager.link(&mut notebook, &mut note, true, true).unwrap();

    assert_eq!(notebook.child_ids("Note").unwrap(), vec!["a1".to_string()]);

    let reloaded = manager.get("Notebook", "n1").unwrap().unwrap();
    assert_eq!(reloaded.child_ids("Note").unwrap(), vec!["a1".to_string()]);
}

#[test]
fn linking_an_undeclared_child_type_fails() {
    let registry = registry();
    let manager = manager(&registry);

    let mut note = Model::create_with_id(&registry, "Note", "a1").unwrap();
    let mut notebook = Model::create_with_id(&registry, "Notebook", "n1").unwrap();

    let error = manager
        .link(&mut note, &mut notebook, false, false)
        .expect_err("Note declares no children");
    match error {
        RelationError::Schema(SchemaError::UndeclaredChild { model, child }) => {
            assert_eq!(model, "Note");
            assert_eq!(child, "Notebook");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn query_children_applies_sort_spec() {
    let registry = registry();
    let manager = manager(&registry);

    let mut notebook = Model::create_with_id(&registry, "Notebook", "n1").unwrap();
    manager.save(&mut notebook).unwrap();

    for (id, title) in [("a1", "beta"), ("a2", "alpha"), ("a3", "gamma")] {
        let mut note = Model::create_with_id(&registry, "Note", id).unwrap();
        note.set_parent_id("n1").unwrap();
        note.document_mut().set_str("title", title);
        manager.link(&mut notebook, &mut note, false, true).unwrap();
    }

    let ascending = manager.query_children(&notebook, "Note", Some(&SortSpec::ascending("title")));
    let titles = ascending
        .iter()
        .map(|note| note.document().get_str("title").unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["alpha", "beta", "gamma"]);

    let descending =
        manager.query_children(&notebook, "Note", Some(&SortSpec::descending("title")));
    assert_eq!(descending[0].document().get_str("title"), Some("gamma"));
}

#[test]
fn query_children_of_undeclared_type_reads_empty() {
    let registry = registry();
    let manager = manager(&registry);

    let mut notebook = Model::create_with_id(&registry, "Notebook", "n1").unwrap();
    manager.save(&mut notebook).unwrap();

    assert!(manager.query_children(&notebook, "Attachment", None).is_empty());
}

#[test]
fn save_backfills_an_empty_type_tag() {
    let registry = registry();
    let manager = manager(&registry);

    let mut notebook = Model::create_with_id(&registry, "Notebook", "n1").unwrap();
    notebook.document_mut().doc_type.clear();

    manager.save(&mut notebook).unwrap();
    assert_eq!(notebook.document().doc_type, "Notebook");

    let stored = manager.store().get("n1").unwrap().unwrap();
    assert_eq!(stored.doc_type, "Notebook");
}

#[test]
fn get_with_mismatched_type_reads_absent() {
    let registry = registry();
    let manager = manager(&registry);

    let mut notebook = Model::create_with_id(&registry, "Notebook", "n1").unwrap();
    manager.save(&mut notebook).unwrap();

    assert!(manager.get("Note", "n1").unwrap().is_none());
    assert!(manager.get("Notebook", "n1").unwrap().is_some());
}
