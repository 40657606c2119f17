//! Relation key derivation and the declared model-type registry.
//!
//! # Responsibility
//! - Derive relation property keys from type names by naming convention.
//! - Hold one validated declaration per model type: parent, children,
//!   conflict handler.
//!
//! # Invariants
//! - Relation keys are derived once at declaration time, never per call.
//! - A sealed registry is immutable; all cross-type references resolve.
//! - Parent/child declarations are reciprocal.

use crate::store::ConflictCallback;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

static TYPE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9]*$").expect("valid type name regex"));

/// Derives the parent-side relation array key for a child type name.
///
/// `children_key("Note")` is `"noteIds"`.
pub fn children_key(child_type_name: &str) -> String {
    let mut key = lower_first(child_type_name);
    key.push_str("Ids");
    key
}

/// Derives the child-side parent pointer key for a parent type name.
///
/// `parent_key("Notebook")` is `"notebookId"`.
pub fn parent_key(parent_type_name: &str) -> String {
    let mut key = lower_first(parent_type_name);
    key.push_str("Id");
    key
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Errors from model-type declaration and registry validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Type name is not a non-empty UpperCamelCase identifier.
    InvalidTypeName(String),
    /// Type name registered more than once.
    DuplicateType(String),
    /// Declared parent type is not registered.
    UnknownParentType { model: String, parent: String },
    /// Declared child type is not registered.
    UnknownChildType { model: String, child: String },
    /// A type declares itself as its own parent or child.
    SelfRelation(String),
    /// Parent declarations loop back on themselves.
    ParentCycle(String),
    /// Parent declares the child, but the child does not declare the parent.
    MissingParentDeclaration { parent: String, child: String },
    /// Child declares the parent, but the parent does not declare the child.
    MissingChildDeclaration { parent: String, child: String },
    /// Lookup of a type name that was never registered.
    UnknownType(String),
    /// Relation access for a child type the model does not declare.
    UndeclaredChild { model: String, child: String },
    /// Parent-pointer access on a model with no declared parent.
    NoDeclaredParent(String),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTypeName(name) => {
                write!(f, "model type name is invalid: `{name}`")
            }
            Self::DuplicateType(name) => {
                write!(f, "model type already registered: `{name}`")
            }
            Self::UnknownParentType { model, parent } => {
                write!(f, "`{model}` declares unregistered parent type `{parent}`")
            }
            Self::UnknownChildType { model, child } => {
                write!(f, "`{model}` declares unregistered child type `{child}`")
            }
            Self::SelfRelation(name) => {
                write!(f, "`{name}` declares a relation to itself")
            }
            Self::ParentCycle(name) => {
                write!(f, "parent declarations starting at `{name}` form a cycle")
            }
            Self::MissingParentDeclaration { parent, child } => write!(
                f,
                "`{parent}` declares child `{child}`, but `{child}` does not declare parent `{parent}`"
            ),
            Self::MissingChildDeclaration { parent, child } => write!(
                f,
                "`{child}` declares parent `{parent}`, but `{parent}` does not declare child `{child}`"
            ),
            Self::UnknownType(name) => write!(f, "unknown model type: `{name}`"),
            Self::UndeclaredChild { model, child } => {
                write!(f, "`{model}` does not declare child type `{child}`")
            }
            Self::NoDeclaredParent(name) => {
                write!(f, "`{name}` does not declare a parent type")
            }
        }
    }
}

impl Error for SchemaError {}

/// Static declaration of one model type and its relations.
///
/// Relation property keys are derived from the declared names at build
/// time and stored here, so no string construction happens per call.
pub struct ModelType {
    name: String,
    parent_type: Option<String>,
    parent_id_key: Option<String>,
    child_types: Vec<String>,
    children_keys: BTreeMap<String, String>,
    conflict_handler: Option<ConflictCallback>,
}

impl ModelType {
    /// Starts a declaration for the given type name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_type: None,
            parent_id_key: None,
            child_types: Vec::new(),
            children_keys: BTreeMap::new(),
            conflict_handler: None,
        }
    }

    /// Declares the (at most one) parent type.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        let parent = parent.into();
        self.parent_id_key = Some(parent_key(&parent));
        self.parent_type = Some(parent);
        self
    }

    /// Declares one child type. May be called multiple times.
    pub fn with_child(mut self, child: impl Into<String>) -> Self {
        let child = child.into();
        self.children_keys
            .insert(child.clone(), children_key(&child));
        if !self.child_types.contains(&child) {
            self.child_types.push(child);
        }
        self
    }

    /// Installs a type-specific conflict handler.
    ///
    /// Without one, conflicts on documents of this type are logged and
    /// left unresolved.
    pub fn with_conflict_handler(mut self, handler: ConflictCallback) -> Self {
        self.conflict_handler = Some(handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_type(&self) -> Option<&str> {
        self.parent_type.as_deref()
    }

    /// Derived key of the parent pointer property on documents of this type.
    pub fn parent_id_key(&self) -> Option<&str> {
        self.parent_id_key.as_deref()
    }

    /// Declared child type names, in declaration order.
    pub fn child_types(&self) -> &[String] {
        &self.child_types
    }

    /// Derived relation array key for one declared child type.
    pub fn children_key_for(&self, child_type: &str) -> Result<&str, SchemaError> {
        self.children_keys
            .get(child_type)
            .map(String::as_str)
            .ok_or_else(|| SchemaError::UndeclaredChild {
                model: self.name.clone(),
                child: child_type.to_string(),
            })
    }

    pub fn conflict_handler(&self) -> Option<&ConflictCallback> {
        self.conflict_handler.as_ref()
    }
}

impl std::fmt::Debug for ModelType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelType")
            .field("name", &self.name)
            .field("parent_type", &self.parent_type)
            .field("child_types", &self.child_types)
            .field("has_conflict_handler", &self.conflict_handler.is_some())
            .finish()
    }
}

/// Mutable collection phase of the registry.
///
/// `register` checks each declaration in isolation; `finish` validates
/// the whole graph and seals it.
#[derive(Default)]
pub struct SchemaBuilder {
    types: BTreeMap<String, ModelType>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one model type declaration.
    pub fn register(&mut self, model: ModelType) -> Result<(), SchemaError> {
        if !is_valid_type_name(&model.name) {
            return Err(SchemaError::InvalidTypeName(model.name.clone()));
        }
        if model.parent_type.as_deref() == Some(model.name.as_str())
            || model.child_types.iter().any(|child| *child == model.name)
        {
            return Err(SchemaError::SelfRelation(model.name.clone()));
        }
        if self.types.contains_key(model.name.as_str()) {
            return Err(SchemaError::DuplicateType(model.name.clone()));
        }

        self.types.insert(model.name.clone(), model);
        Ok(())
    }

    /// Validates cross-type references and seals the registry.
    pub fn finish(self) -> Result<SchemaRegistry, SchemaError> {
        for model in self.types.values() {
            if let Some(parent) = model.parent_type() {
                let parent_model = self.types.get(parent).ok_or_else(|| {
                    SchemaError::UnknownParentType {
                        model: model.name.clone(),
                        parent: parent.to_string(),
                    }
                })?;
                if !parent_model.child_types.iter().any(|c| c == &model.name) {
                    return Err(SchemaError::MissingChildDeclaration {
                        parent: parent.to_string(),
                        child: model.name.clone(),
                    });
                }
            }

            for child in model.child_types() {
                let child_model =
                    self.types
                        .get(child)
                        .ok_or_else(|| SchemaError::UnknownChildType {
                            model: model.name.clone(),
                            child: child.clone(),
                        })?;
                if child_model.parent_type() != Some(model.name.as_str()) {
                    return Err(SchemaError::MissingParentDeclaration {
                        parent: model.name.clone(),
                        child: child.clone(),
                    });
                }
            }
        }

        // A cyclic parent chain would make cascading deletion diverge.
        for start in self.types.keys() {
            let mut steps = 0;
            let mut current = self.types.get(start);
            while let Some(model) = current {
                if steps > self.types.len() {
                    return Err(SchemaError::ParentCycle(start.clone()));
                }
                steps += 1;
                current = model.parent_type().and_then(|parent| self.types.get(parent));
            }
        }

        let types = self
            .types
            .into_iter()
            .map(|(name, model)| (name, Arc::new(model)))
            .collect();
        Ok(SchemaRegistry { types })
    }
}

/// Sealed, validated registry of model type declarations.
pub struct SchemaRegistry {
    types: BTreeMap<String, Arc<ModelType>>,
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SchemaRegistry {
    pub fn get(&self, name: &str) -> Option<&Arc<ModelType>> {
        self.types.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Arc<ModelType>, SchemaError> {
        self.types
            .get(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    /// Returns sorted registered type names.
    pub fn type_names(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn is_valid_type_name(value: &str) -> bool {
    TYPE_NAME_RE.is_match(value)
}
