//! Parsed operation document model
//!
//! The wire transport and query-language parser are external collaborators:
//! this crate consumes an already-parsed document. The model keeps exactly
//! what the auditor needs - selection structure, fragment definitions, and
//! per-field arguments (filter, pagination, ordering).

use authgate_core::{Action, Filter, OrderBy, Page};
use std::collections::HashMap;

/// Whether an operation reads or mutates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

/// A complete parsed document: operations plus named fragment definitions
#[derive(Debug, Clone, Default)]
pub struct OperationDocument {
    pub operations: Vec<Operation>,
    pub fragments: HashMap<String, Fragment>,
}

impl OperationDocument {
    /// Single-operation query shorthand
    pub fn query(roots: Vec<RootField>) -> Self {
        Self {
            operations: vec![Operation {
                kind: OperationKind::Query,
                name: None,
                roots,
            }],
            fragments: HashMap::new(),
        }
    }

    /// Single-operation mutation shorthand
    pub fn mutation(roots: Vec<RootField>) -> Self {
        Self {
            operations: vec![Operation {
                kind: OperationKind::Mutation,
                name: None,
                roots,
            }],
            fragments: HashMap::new(),
        }
    }

    /// Attach a named fragment definition
    pub fn fragment(mut self, fragment: Fragment) -> Self {
        self.fragments.insert(fragment.name.clone(), fragment);
        self
    }
}

/// One operation within a document
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub roots: Vec<RootField>,
}

/// A root field of an operation.
///
/// Root fields address entities directly; a mutation root carries the
/// action it performs, everything reached below it is a read.
#[derive(Debug, Clone)]
pub struct RootField {
    pub entity: String,
    pub action: Action,
    pub arguments: Arguments,
    pub selections: Vec<Selection>,
}

impl RootField {
    /// Read root for an entity
    pub fn read(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            action: Action::Read,
            arguments: Arguments::default(),
            selections: Vec::new(),
        }
    }

    /// Mutation root for an entity
    pub fn mutate(entity: impl Into<String>, action: Action) -> Self {
        Self {
            entity: entity.into(),
            action,
            arguments: Arguments::default(),
            selections: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.arguments.filter = Some(filter);
        self
    }

    pub fn select(mut self, selections: Vec<Selection>) -> Self {
        self.selections = selections;
        self
    }
}

/// Arguments supplied at a selection level
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    pub filter: Option<Filter>,
    pub page: Option<Page>,
    pub order_by: Option<OrderBy>,
}

/// A member of a selection set
#[derive(Debug, Clone)]
pub enum Selection {
    Field(FieldSelection),
    /// Reference to a named fragment defined on the document
    FragmentSpread(String),
    InlineFragment(InlineFragment),
}

impl Selection {
    /// Leaf field shorthand
    pub fn field(name: impl Into<String>) -> Self {
        Selection::Field(FieldSelection::new(name))
    }

    /// Fragment spread shorthand
    pub fn spread(name: impl Into<String>) -> Self {
        Selection::FragmentSpread(name.into())
    }
}

/// A field selection with optional arguments and a nested selection set
#[derive(Debug, Clone)]
pub struct FieldSelection {
    pub name: String,
    pub arguments: Arguments,
    pub selections: Vec<Selection>,
}

impl FieldSelection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Arguments::default(),
            selections: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.arguments.filter = Some(filter);
        self
    }

    pub fn select(mut self, selections: Vec<Selection>) -> Self {
        self.selections = selections;
        self
    }
}

/// An inline fragment (`... on Type { ... }`)
#[derive(Debug, Clone)]
pub struct InlineFragment {
    /// Entity the fragment narrows to; `None` keeps the enclosing entity
    pub type_condition: Option<String>,
    pub selections: Vec<Selection>,
}

/// A named fragment definition
#[derive(Debug, Clone)]
pub struct Fragment {
    pub name: String,
    /// Entity the fragment's fields are resolved against
    pub type_condition: String,
    pub selections: Vec<Selection>,
}

impl Fragment {
    pub fn new(
        name: impl Into<String>,
        type_condition: impl Into<String>,
        selections: Vec<Selection>,
    ) -> Self {
        Self {
            name: name.into(),
            type_condition: type_condition.into(),
            selections,
        }
    }
}
