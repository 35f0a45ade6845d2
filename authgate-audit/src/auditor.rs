//! Touch-set discovery over a parsed operation document

use crate::document::{
    FieldSelection, Fragment, OperationDocument, RootField, Selection,
};
use crate::error::{AuditError, Result};
use crate::touch::TouchSet;
use authgate_core::{Action, EntityGraph, FieldKind, Filter};
use std::collections::HashMap;
use tracing::debug;

/// Static auditor: walks a document and produces its [`TouchSet`].
///
/// The walk resolves fragment spreads and inline fragments to their
/// concrete fields, follows relationship selections, and descends into
/// filter arguments (a filter key addressing a relationship touches the
/// related entity even if none of its fields are returned). Depth is
/// checked first: a too-deep document is rejected before anything else
/// happens.
pub struct Auditor<'a> {
    graph: &'a EntityGraph,
    max_depth: usize,
}

impl<'a> Auditor<'a> {
    pub fn new(graph: &'a EntityGraph, max_depth: usize) -> Self {
        Self { graph, max_depth }
    }

    /// Discover everything the document touches.
    ///
    /// Errors with [`AuditError::DepthLimitExceeded`] or
    /// [`AuditError::InvalidDocument`]; the caller consolidates the
    /// returned triples against the ACL registry.
    pub fn audit(&self, document: &OperationDocument) -> Result<TouchSet> {
        let mut walk = Walk {
            graph: self.graph,
            max_depth: self.max_depth,
            fragments: &document.fragments,
            touches: TouchSet::new(),
            fragment_stack: Vec::new(),
        };

        for operation in &document.operations {
            for root in &operation.roots {
                walk.root(root)?;
            }
        }

        debug!(touches = walk.touches.len(), "audit walk complete");
        Ok(walk.touches)
    }
}

struct Walk<'a> {
    graph: &'a EntityGraph,
    max_depth: usize,
    fragments: &'a HashMap<String, Fragment>,
    touches: TouchSet,
    fragment_stack: Vec<&'a str>,
}

impl<'a> Walk<'a> {
    fn root(&mut self, root: &'a RootField) -> Result<()> {
        if !self.graph.contains(&root.entity) {
            return Err(AuditError::invalid(format!(
                "root field addresses unknown entity '{}'",
                root.entity
            )));
        }
        self.check_depth(1)?;
        self.touches.insert(&root.entity, root.action, 1);
        if let Some(filter) = &root.arguments.filter {
            self.filter(&root.entity, filter, 1)?;
        }
        self.selections(&root.entity, &root.selections, 1)
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(AuditError::DepthLimitExceeded {
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn selections(
        &mut self,
        entity: &str,
        selections: &'a [Selection],
        depth: usize,
    ) -> Result<()> {
        for selection in selections {
            match selection {
                Selection::Field(field) => self.field(entity, field, depth)?,
                Selection::FragmentSpread(name) => self.spread(entity, name, depth)?,
                Selection::InlineFragment(inline) => {
                    let target = match &inline.type_condition {
                        Some(condition) => self.fragment_entity(entity, condition, depth)?,
                        None => entity.to_string(),
                    };
                    self.selections(&target, &inline.selections, depth)?;
                }
            }
        }
        Ok(())
    }

    fn field(&mut self, entity: &str, field: &'a FieldSelection, depth: usize) -> Result<()> {
        match self
            .graph
            .schema(entity)
            .and_then(|schema| schema.field(&field.name))
        {
            Some(FieldKind::Relation(relation)) => {
                let child_depth = depth + 1;
                self.check_depth(child_depth)?;
                // Selecting a relationship reads the related entity
                self.touches.insert(&relation.entity, Action::Read, child_depth);
                let target = relation.entity.clone();
                if let Some(filter) = &field.arguments.filter {
                    self.filter(&target, filter, child_depth)?;
                }
                self.selections(&target, &field.selections, child_depth)
            }
            _ if field.selections.is_empty() && field.arguments.filter.is_none() => {
                // Scalar leaf (declared or not); nothing to touch
                Ok(())
            }
            _ => {
                // A sub-selection or filter under a non-relationship field
                // cannot be resolved to touches; fail closed.
                Err(AuditError::invalid(format!(
                    "field '{}' on '{entity}' is not a relationship",
                    field.name
                )))
            }
        }
    }

    /// Resolve a fragment spread into the current selection.
    ///
    /// The fragment's fields are checked against its own type condition, so
    /// a spread can never reach fields (or entities) the direct selection
    /// could not.
    fn spread(&mut self, entity: &str, name: &'a str, depth: usize) -> Result<()> {
        if self.fragment_stack.contains(&name) {
            return Err(AuditError::invalid(format!(
                "fragment cycle through '{name}'"
            )));
        }
        let fragment = self
            .fragments
            .get(name)
            .ok_or_else(|| AuditError::invalid(format!("unknown fragment '{name}'")))?;

        let target = self.fragment_entity(entity, &fragment.type_condition, depth)?;

        self.fragment_stack.push(name);
        let walked = self.selections(&target, &fragment.selections, depth);
        self.fragment_stack.pop();
        walked
    }

    /// A fragment narrowing to a different entity still touches it
    fn fragment_entity(&mut self, entity: &str, condition: &str, depth: usize) -> Result<String> {
        if condition == entity {
            return Ok(entity.to_string());
        }
        if !self.graph.contains(condition) {
            return Err(AuditError::invalid(format!(
                "fragment on unknown entity '{condition}'"
            )));
        }
        self.touches.insert(condition, Action::Read, depth);
        Ok(condition.to_string())
    }

    /// Walk a filter argument: every relationship hop in a condition path
    /// touches the related entity one level deeper.
    fn filter(&mut self, entity: &str, filter: &Filter, depth: usize) -> Result<()> {
        match filter {
            Filter::And(branches) | Filter::Or(branches) => {
                for branch in branches {
                    self.filter(entity, branch, depth)?;
                }
                Ok(())
            }
            Filter::Cond(cond) => {
                let mut current = entity.to_string();
                let mut current_depth = depth;
                let segments = cond.path.segments();
                if segments.is_empty() {
                    return Err(AuditError::invalid(
                        "filter condition with an empty field path",
                    ));
                }
                for (i, segment) in segments.iter().enumerate() {
                    let last = i + 1 == segments.len();
                    match self.graph.relation(&current, segment) {
                        Some(relation) => {
                            current_depth += 1;
                            self.check_depth(current_depth)?;
                            // The filter must be evaluated against the
                            // related entity even if nothing of it is
                            // returned.
                            self.touches
                                .insert(&relation.entity, Action::Read, current_depth);
                            current = relation.entity.clone();
                        }
                        None if last => {}
                        None => {
                            return Err(AuditError::invalid(format!(
                                "filter path segment '{segment}' on '{current}' is not a relationship"
                            )));
                        }
                    }
                }
                Ok(())
            }
        }
    }
}
