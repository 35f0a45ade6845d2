//! Entity -> provider wiring

use crate::error::{Result, SourceError};
use crate::provider::DataProvider;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps each entity to the backend provider that serves it.
///
/// Bindings are established at startup and read-only afterwards. Two
/// entities bound to different providers is what makes a relationship
/// between them a cross-provider correlation.
#[derive(Default)]
pub struct SourceRegistry {
    by_entity: HashMap<String, Arc<dyn DataProvider>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an entity to its provider (append-once)
    pub fn bind(&mut self, entity: impl Into<String>, provider: Arc<dyn DataProvider>) -> Result<()> {
        let entity = entity.into();
        if self.by_entity.contains_key(&entity) {
            return Err(SourceError::config(format!(
                "entity '{entity}' is already bound to a provider"
            )));
        }
        self.by_entity.insert(entity, provider);
        Ok(())
    }

    /// The provider serving an entity
    pub fn provider_for(&self, entity: &str) -> Result<&Arc<dyn DataProvider>> {
        self.by_entity.get(entity).ok_or_else(|| {
            SourceError::config(format!("no provider bound for entity '{entity}'"))
        })
    }

    /// True when both entities are served by the same provider instance
    pub fn same_provider(&self, a: &str, b: &str) -> bool {
        match (self.by_entity.get(a), self.by_entity.get(b)) {
            (Some(x), Some(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (entity, provider) in &self.by_entity {
            map.entry(entity, &provider.name());
        }
        map.finish()
    }
}
