//! Touch-set: everything an operation will access

use authgate_core::Action;
use std::collections::HashSet;

/// One discovered access: the entity, the action against it, and the
/// nesting depth at which it was first reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Touch {
    pub entity: String,
    pub action: Action,
    pub depth: usize,
}

/// Ordered set of [`Touch`] triples, computed once per operation.
///
/// Distinctness is by (entity, action); the first discovery's depth is
/// kept. Discovery order is preserved so denial checks and logs are
/// deterministic.
#[derive(Debug, Default)]
pub struct TouchSet {
    entries: Vec<Touch>,
    seen: HashSet<(String, Action)>,
}

impl TouchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an access; repeat (entity, action) pairs are ignored
    pub fn insert(&mut self, entity: &str, action: Action, depth: usize) {
        if self.seen.insert((entity.to_string(), action)) {
            self.entries.push(Touch {
                entity: entity.to_string(),
                action,
                depth,
            });
        }
    }

    /// True if the pair was discovered anywhere in the operation
    pub fn contains(&self, entity: &str, action: Action) -> bool {
        self.seen.contains(&(entity.to_string(), action))
    }

    /// Triples in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &Touch> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a TouchSet {
    type Item = &'a Touch;
    type IntoIter = std::slice::Iter<'a, Touch>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
