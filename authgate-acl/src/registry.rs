//! Append-once ACL registry
//!
//! One access-control declaration per entity. Registration happens at
//! startup; after that the table is only read, concurrently, by every
//! request. Absence of an ACL for an entity is a valid state meaning "no
//! role is ever granted access" - the fail-closed default, not an error.

use crate::error::{AclError, Result};
use crate::permission::Acl;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry mapping entity name -> [`Acl`]
#[derive(Debug, Default)]
pub struct AclRegistry {
    entries: RwLock<HashMap<String, Arc<Acl>>>,
}

impl AclRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity's ACL.
    ///
    /// Append-once: registering the same entity twice is a configuration
    /// error caught at startup.
    pub fn register(&self, entity: impl Into<String>, acl: Acl) -> Result<()> {
        let entity = entity.into();
        let mut entries = self.entries.write().map_err(|_| AclError::LockPoisoned)?;
        if entries.contains_key(&entity) {
            return Err(AclError::config(format!(
                "duplicate ACL registration for entity '{entity}'"
            )));
        }
        entries.insert(entity, Arc::new(acl));
        Ok(())
    }

    /// Replace an entity's ACL in place.
    ///
    /// Test-only escape hatch for fixtures that delete and re-add a
    /// declaration; production registration is append-once via
    /// [`AclRegistry::register`].
    pub fn replace(&self, entity: impl Into<String>, acl: Acl) -> Result<Option<Arc<Acl>>> {
        let mut entries = self.entries.write().map_err(|_| AclError::LockPoisoned)?;
        Ok(entries.insert(entity.into(), Arc::new(acl)))
    }

    /// Look up an entity's ACL. `None` means fail-closed denial.
    pub fn lookup(&self, entity: &str) -> Option<Arc<Acl>> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(entity).cloned())
    }

    /// Number of registered entities
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// True when nothing has been registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
