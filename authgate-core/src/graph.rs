//! Read-only entity/relationship graph
//!
//! Consumed from the schema registration host. The auditor uses it to
//! resolve what a selection or filter key "touches"; the planner uses the
//! relation key names to synthesize correlation joins.

use crate::error::{CoreError, Result};
use std::collections::HashMap;

/// A relationship field's join metadata.
///
/// `local_key` names the field on the *current* entity's records and
/// `remote_key` the field on the related entity's records that correlation
/// joins on. For a to-one relation the foreign key typically lives locally
/// (`assignee_id` / `id`); for a to-many relation it lives remotely
/// (`id` / `task_id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Name of the related entity
    pub entity: String,
    /// Join field on the current entity's records
    pub local_key: String,
    /// Join field on the related entity's records
    pub remote_key: String,
}

impl Relation {
    pub fn new(
        entity: impl Into<String>,
        local_key: impl Into<String>,
        remote_key: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            local_key: local_key.into(),
            remote_key: remote_key.into(),
        }
    }
}

/// What kind of field a selection or filter key addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain value field on the entity itself
    Scalar,
    /// Traversal into a related entity
    Relation(Relation),
}

/// One entity's declared fields
#[derive(Debug, Clone)]
pub struct EntitySchema {
    name: String,
    fields: HashMap<String, FieldKind>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: HashMap::new(),
        }
    }

    /// Declare a scalar field
    pub fn scalar(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), FieldKind::Scalar);
        self
    }

    /// Declare a relationship field
    pub fn relation(mut self, field: impl Into<String>, relation: Relation) -> Self {
        self.fields.insert(field.into(), FieldKind::Relation(relation));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self, name: &str) -> Option<&FieldKind> {
        self.fields.get(name)
    }
}

/// The full entity graph: entity name -> declared fields.
///
/// Built once at startup from the schema host and shared immutably.
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    entities: HashMap<String, EntitySchema>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity's schema (builder style, startup only)
    pub fn entity(mut self, schema: EntitySchema) -> Self {
        self.entities.insert(schema.name.clone(), schema);
        self
    }

    /// Look up an entity's schema
    pub fn schema(&self, entity: &str) -> Option<&EntitySchema> {
        self.entities.get(entity)
    }

    /// Look up an entity's schema, erroring on absence
    pub fn require(&self, entity: &str) -> Result<&EntitySchema> {
        self.schema(entity)
            .ok_or_else(|| CoreError::UnknownEntity(entity.to_string()))
    }

    /// The relation behind `entity.field`, if that field is a relationship
    pub fn relation(&self, entity: &str, field: &str) -> Option<&Relation> {
        match self.schema(entity)?.field(field)? {
            FieldKind::Relation(rel) => Some(rel),
            FieldKind::Scalar => None,
        }
    }

    /// True if the entity is declared in the graph
    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }
}
