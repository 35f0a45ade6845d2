//! Before/after hook pipeline
//!
//! Hooks run only after audit approval, per (entity, action). A
//! before-hook may contribute an additional row filter; contributions are
//! always ANDed with the consolidated filter, never substituted for it,
//! so a hook can narrow access but not widen it. After-hooks may reshape
//! the returned records (redaction, annotation).

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use authgate_core::{and_all, Action, AuthorizationContext, Filter};
use authgate_datasource::Record;
use std::collections::HashMap;
use std::sync::Arc;

/// Hook outcome; errors are opaque to the engine
pub type HookResult<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// A per-(entity, action) hook.
///
/// Both methods have pass-through defaults so a hook can implement only
/// the side it cares about.
#[async_trait]
pub trait EntityHook: Send + Sync {
    /// Runs before the provider call; may contribute a narrowing filter
    async fn before(&self, _ctx: &AuthorizationContext) -> HookResult<Option<Filter>> {
        Ok(None)
    }

    /// Runs after the provider call; may reshape the returned records
    async fn after(
        &self,
        _ctx: &AuthorizationContext,
        records: Vec<Record>,
    ) -> HookResult<Vec<Record>> {
        Ok(records)
    }
}

/// Registered hooks, keyed by (entity, action)
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<(String, Action), Vec<Arc<dyn EntityHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a hook to an (entity, action) pair; multiple hooks run in
    /// registration order
    pub fn register(
        &mut self,
        entity: impl Into<String>,
        action: Action,
        hook: Arc<dyn EntityHook>,
    ) {
        self.hooks
            .entry((entity.into(), action))
            .or_default()
            .push(hook);
    }

    /// Run every before-hook for the pair and AND their contributed
    /// filters into one
    pub async fn run_before(
        &self,
        entity: &str,
        action: Action,
        ctx: &AuthorizationContext,
    ) -> Result<Option<Filter>> {
        let Some(hooks) = self.hooks.get(&(entity.to_string(), action)) else {
            return Ok(None);
        };
        let mut contributed = Vec::new();
        for hook in hooks {
            contributed.push(hook.before(ctx).await.map_err(EngineError::Hook)?);
        }
        Ok(and_all(contributed))
    }

    /// Thread the records through every after-hook for the pair, in
    /// registration order
    pub async fn run_after(
        &self,
        entity: &str,
        action: Action,
        ctx: &AuthorizationContext,
        mut records: Vec<Record>,
    ) -> Result<Vec<Record>> {
        let Some(hooks) = self.hooks.get(&(entity.to_string(), action)) else {
            return Ok(records);
        };
        for hook in hooks {
            records = hook.after(ctx, records).await.map_err(EngineError::Hook)?;
        }
        Ok(records)
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for ((entity, action), hooks) in &self.hooks {
            map.entry(&format!("{entity}/{action}"), &hooks.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OwnerOnly;

    #[async_trait]
    impl EntityHook for OwnerOnly {
        async fn before(&self, ctx: &AuthorizationContext) -> HookResult<Option<Filter>> {
            Ok(Some(Filter::eq("owner", ctx.user_id.clone())))
        }
    }

    struct Redact(&'static str);

    #[async_trait]
    impl EntityHook for Redact {
        async fn after(
            &self,
            _ctx: &AuthorizationContext,
            mut records: Vec<Record>,
        ) -> HookResult<Vec<Record>> {
            for record in &mut records {
                record.remove(self.0);
            }
            Ok(records)
        }
    }

    fn ctx() -> AuthorizationContext {
        AuthorizationContext::new("u1", vec![])
    }

    #[tokio::test]
    async fn test_before_hooks_and_together() {
        let mut registry = HookRegistry::new();
        registry.register("Task", Action::Read, Arc::new(OwnerOnly));

        let filter = registry
            .run_before("Task", Action::Read, &ctx())
            .await
            .expect("hooks ran");
        assert_eq!(filter, Some(Filter::eq("owner", "u1")));

        // No hooks registered for the pair: no contribution
        let none = registry
            .run_before("Task", Action::Delete, &ctx())
            .await
            .expect("hooks ran");
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_after_hooks_reshape_records() {
        let mut registry = HookRegistry::new();
        registry.register("Task", Action::Read, Arc::new(Redact("secret")));

        let rows = vec![serde_json::json!({"id": 1, "secret": "x"})
            .as_object()
            .cloned()
            .expect("object literal")];
        let out = registry
            .run_after("Task", Action::Read, &ctx(), rows)
            .await
            .expect("hooks ran");
        assert!(out[0].get("secret").is_none());
        assert_eq!(out[0].get("id"), Some(&serde_json::json!(1)));
    }
}
