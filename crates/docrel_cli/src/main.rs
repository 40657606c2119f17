//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `docrel_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use docrel_core::{Model, ModelType, RelationManager, SchemaBuilder, SqliteDocumentStore};

fn main() {
    println!("docrel_core version={}", docrel_core::core_version());

    match smoke_probe() {
        Ok(summary) => println!("docrel_core probe=ok {summary}"),
        Err(err) => {
            eprintln!("docrel_core probe=error {err}");
            std::process::exit(1);
        }
    }
}

/// Exercises the link/query/delete round trip on an in-memory store.
fn smoke_probe() -> Result<String, Box<dyn std::error::Error>> {
    let mut builder = SchemaBuilder::new();
    builder.register(ModelType::new("Notebook").with_child("Note"))?;
    builder.register(ModelType::new("Note").with_parent("Notebook"))?;
    let registry = std::sync::Arc::new(builder.finish()?);

    let store = SqliteDocumentStore::open_in_memory()?;
    let manager = RelationManager::new(store, std::sync::Arc::clone(&registry));

    let mut notebook = Model::create(&registry, "Notebook")?;
    manager.save(&mut notebook)?;

    let mut note = Model::create(&registry, "Note")?;
    note.set_parent_id(notebook.id().to_string())?;
    manager.link(&mut notebook, &mut note, true, true)?;

    let children = manager.query_children(&notebook, "Note", None);
    let linked = children.len();

    manager.delete_cascade(&notebook)?;
    let remaining = manager.get("Note", note.id())?.is_some() as usize;

    Ok(format!("linked={linked} remaining_after_cascade={remaining}"))
}
