//! The access engine: audit, consolidation, and authorized data access

use crate::error::{EngineError, Result};
use crate::hooks::{EntityHook, HookRegistry};
use authgate_acl::{consolidate, Acl, AclRegistry, ConsolidatedAccess};
use authgate_audit::{Auditor, OperationDocument, TouchSet};
use authgate_core::{
    and_all, matches, Action, AuthorizationContext, CoreError, EngineConfig, EntityGraph, Filter,
    OrderBy, Page,
};
use authgate_datasource::{
    DataProvider, QueryPlanner, Record, SourceRegistry,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// The result of a successful audit: every (entity, action, depth) triple
/// the operation touches, each resolved to an allowed decision.
///
/// Ephemeral; valid only for the request that produced it.
#[derive(Debug)]
pub struct ApprovedOperation {
    touches: TouchSet,
    decisions: HashMap<(String, Action), ConsolidatedAccess>,
}

impl ApprovedOperation {
    /// Everything the operation touches, in discovery order
    pub fn touches(&self) -> &TouchSet {
        &self.touches
    }

    /// The consolidated decision for one touched pair
    pub fn decision(&self, entity: &str, action: Action) -> Option<&ConsolidatedAccess> {
        self.decisions.get(&(entity.to_string(), action))
    }
}

/// Builder for [`AccessEngine`]; all wiring happens at startup
pub struct EngineBuilder {
    graph: EntityGraph,
    config: EngineConfig,
    acls: AclRegistry,
    sources: SourceRegistry,
    hooks: HookRegistry,
}

impl EngineBuilder {
    pub fn new(graph: EntityGraph) -> Self {
        Self {
            graph,
            config: EngineConfig::default(),
            acls: AclRegistry::new(),
            sources: SourceRegistry::new(),
            hooks: HookRegistry::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an entity's ACL (append-once)
    pub fn acl(self, entity: impl Into<String>, acl: Acl) -> Result<Self> {
        self.acls.register(entity, acl)?;
        Ok(self)
    }

    /// Bind an entity to its backend provider (append-once)
    pub fn source(
        mut self,
        entity: impl Into<String>,
        provider: Arc<dyn DataProvider>,
    ) -> Result<Self> {
        self.sources.bind(entity, provider)?;
        Ok(self)
    }

    /// Attach a before/after hook to an (entity, action) pair
    pub fn hook(
        mut self,
        entity: impl Into<String>,
        action: Action,
        hook: Arc<dyn EntityHook>,
    ) -> Self {
        self.hooks.register(entity, action, hook);
        self
    }

    pub fn build(self) -> Result<AccessEngine> {
        self.config.validate()?;
        Ok(AccessEngine {
            graph: self.graph,
            config: self.config,
            acls: self.acls,
            sources: self.sources,
            hooks: self.hooks,
        })
    }
}

/// Orchestrates the full request path: static audit, role consolidation,
/// hook pipeline, capability-aware planning, and provider I/O.
///
/// No provider method is ever called for an operation until every touched
/// (entity, action) pair has consolidated to an allowed decision.
pub struct AccessEngine {
    graph: EntityGraph,
    config: EngineConfig,
    acls: AclRegistry,
    sources: SourceRegistry,
    hooks: HookRegistry,
}

impl AccessEngine {
    pub fn builder(graph: EntityGraph) -> EngineBuilder {
        EngineBuilder::new(graph)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The single generic denial; identical for every denial cause
    fn forbidden(&self) -> EngineError {
        EngineError::Forbidden(self.config.denial_message.clone())
    }

    /// Statically audit a parsed operation document.
    ///
    /// Discovers the touch-set (depth-checked first), then consolidates
    /// every triple concurrently and awaits all of them before deciding.
    /// Any denied triple fails the whole operation with the generic
    /// denial; nothing reaches a provider.
    pub async fn audit(
        &self,
        document: &OperationDocument,
        ctx: &AuthorizationContext,
    ) -> Result<ApprovedOperation> {
        let span = tracing::debug_span!("audit", request_id = %ctx.request_id);
        let _guard = span.enter();

        let touches = Auditor::new(&self.graph, self.config.max_query_depth).audit(document)?;

        // Consolidation barrier: every triple resolves before any decision
        // is acted on.
        let resolutions = futures::future::join_all(touches.iter().map(|touch| async move {
            let decision = consolidate(&self.acls, &touch.entity, touch.action, ctx).await;
            ((touch.entity.clone(), touch.action), decision)
        }))
        .await;

        let mut decisions = HashMap::new();
        let mut denied = false;
        for ((entity, action), decision) in resolutions {
            if !decision.allowed {
                // Atomic all-or-nothing: one denial fails the whole
                // operation, but keep resolving so logs are complete.
                debug!(entity, action = %action, "touched pair denied");
                denied = true;
            }
            decisions.insert((entity, action), decision);
        }
        if denied {
            return Err(self.forbidden());
        }

        debug!(touches = touches.len(), "operation approved");
        Ok(ApprovedOperation { touches, decisions })
    }

    /// The provider-ready filter for one entity/action: the consolidated
    /// ACL filter ANDed with the caller's own filter.
    ///
    /// `Ok(None)` means allowed and unconstrained; denial is the generic
    /// `Forbidden`.
    pub async fn filter_for(
        &self,
        entity: &str,
        action: Action,
        ctx: &AuthorizationContext,
        caller_filter: Option<Filter>,
    ) -> Result<Option<Filter>> {
        let decision = consolidate(&self.acls, entity, action, ctx).await;
        if !decision.allowed {
            return Err(self.forbidden());
        }
        Ok(and_all([decision.filter, caller_filter]))
    }

    /// Consolidated + caller + before-hook filters for one entity/action
    async fn effective_filter(
        &self,
        entity: &str,
        action: Action,
        ctx: &AuthorizationContext,
        caller_filter: Option<Filter>,
    ) -> Result<Option<Filter>> {
        let authorized = self.filter_for(entity, action, ctx, caller_filter).await?;
        let hook = self.hooks.run_before(entity, action, ctx).await?;
        // Hook contributions narrow: ANDed, never substituted
        Ok(and_all([authorized, hook]))
    }

    /// Authorized find over an entity's provider
    pub async fn find(
        &self,
        entity: &str,
        ctx: &AuthorizationContext,
        caller_filter: Option<Filter>,
        page: Option<Page>,
        order_by: Option<OrderBy>,
    ) -> Result<Vec<Record>> {
        let effective = self
            .effective_filter(entity, Action::Read, ctx, caller_filter)
            .await?;
        let planner = QueryPlanner::new(&self.graph, &self.sources);
        let rows = planner.execute_find(entity, effective, page, order_by).await?;
        self.hooks.run_after(entity, Action::Read, ctx, rows).await
    }

    /// Authorized single-record lookup
    pub async fn find_one(
        &self,
        entity: &str,
        ctx: &AuthorizationContext,
        caller_filter: Option<Filter>,
    ) -> Result<Option<Record>> {
        let effective = self
            .effective_filter(entity, Action::Read, ctx, caller_filter)
            .await?;
        let planner = QueryPlanner::new(&self.graph, &self.sources);
        let rewritten = match effective {
            Some(f) => Some(planner.rewrite(entity, f).await?),
            None => None,
        };

        let provider = self.sources.provider_for(entity)?;
        let rows = if rewritten.is_none() || provider.capability().filter_root {
            match provider.find_one(entity, rewritten.as_ref()).await? {
                Some(row) => vec![row],
                None => Vec::new(),
            }
        } else {
            // Residual path: scan, filter in-memory, keep the first match
            planner
                .execute_find(entity, rewritten, Some(Page::limit(1)), None)
                .await?
        };
        let rows = self.hooks.run_after(entity, Action::Read, ctx, rows).await?;
        Ok(rows.into_iter().next())
    }

    /// Authorized batch load of a relationship's records for a set of
    /// already-fetched parents (one provider call per relationship, not
    /// per parent).
    pub async fn find_related(
        &self,
        entity: &str,
        field: &str,
        parents: &[Record],
        ctx: &AuthorizationContext,
        caller_filter: Option<Filter>,
    ) -> Result<Vec<Record>> {
        let relation = self.graph.relation(entity, field).ok_or_else(|| {
            CoreError::UnknownField {
                entity: entity.to_string(),
                field: field.to_string(),
            }
        })?;
        let target = relation.entity.clone();

        let effective = self
            .effective_filter(&target, Action::Read, ctx, caller_filter)
            .await?;
        let planner = QueryPlanner::new(&self.graph, &self.sources);
        let rewritten = match effective {
            Some(f) => Some(planner.rewrite(&target, f).await?),
            None => None,
        };

        let mut ids: Vec<serde_json::Value> = Vec::new();
        for parent in parents {
            if let Some(key) = parent.get(&relation.local_key) {
                if !key.is_null() && !ids.contains(key) {
                    ids.push(key.clone());
                }
            }
        }

        let provider = self.sources.provider_for(&target)?;
        let mut rows = if rewritten.is_none() || provider.capability().filter_root {
            provider
                .find_by_related_id(&target, &relation.remote_key, &ids, rewritten.as_ref())
                .await?
        } else {
            warn!(
                entity = target.as_str(),
                provider = provider.name(),
                "provider cannot filter natively; applying filter in-memory"
            );
            let mut kept = provider
                .find_by_related_id(&target, &relation.remote_key, &ids, None)
                .await?;
            if let Some(filter) = &rewritten {
                kept.retain(|row| matches(row, filter));
            }
            kept
        };

        rows = self.hooks.run_after(&target, Action::Read, ctx, rows).await?;
        Ok(rows)
    }

    /// Authorized create.
    ///
    /// The record itself must satisfy the consolidated row constraint:
    /// creating a row the requester is not entitled to is the same denial
    /// as reading one.
    pub async fn create_one(
        &self,
        entity: &str,
        ctx: &AuthorizationContext,
        record: Record,
    ) -> Result<Record> {
        let effective = self
            .effective_filter(entity, Action::Create, ctx, None)
            .await?;
        if let Some(filter) = &effective {
            if !matches(&record, filter) {
                return Err(self.forbidden());
            }
        }

        let provider = self.sources.provider_for(entity)?;
        let created = self
            .bracketed(provider.as_ref(), provider.create_one(entity, record))
            .await?;
        let mut rows = self
            .hooks
            .run_after(entity, Action::Create, ctx, vec![created])
            .await?;
        // After-hooks only reshape; the created record is always present
        rows.pop().ok_or_else(|| {
            EngineError::Hook("after-hook discarded the created record".into())
        })
    }

    /// Authorized single-record update; the selector is ANDed with the
    /// consolidated constraint, so a requester can never reach rows the
    /// ACL hides from them.
    pub async fn update_one(
        &self,
        entity: &str,
        ctx: &AuthorizationContext,
        selector: Filter,
        changes: Record,
    ) -> Result<Option<Record>> {
        let effective = self
            .effective_filter(entity, Action::Update, ctx, Some(selector))
            .await?;
        let filter = self.mutation_filter(entity, effective).await?;

        let provider = self.sources.provider_for(entity)?;
        let updated = self
            .bracketed(
                provider.as_ref(),
                provider.update_one(entity, &filter, changes),
            )
            .await?;
        self.reshape_one(entity, Action::Update, ctx, updated).await
    }

    /// Authorized single-record delete
    pub async fn delete_one(
        &self,
        entity: &str,
        ctx: &AuthorizationContext,
        selector: Filter,
    ) -> Result<Option<Record>> {
        let effective = self
            .effective_filter(entity, Action::Delete, ctx, Some(selector))
            .await?;
        let filter = self.mutation_filter(entity, effective).await?;

        let provider = self.sources.provider_for(entity)?;
        let deleted = self
            .bracketed(provider.as_ref(), provider.delete_one(entity, &filter))
            .await?;
        self.reshape_one(entity, Action::Delete, ctx, deleted).await
    }

    /// Rewrite a mutation's effective filter to provider-local clauses.
    ///
    /// A mutation always carries a selector, so the effective filter is
    /// never absent here.
    async fn mutation_filter(&self, entity: &str, effective: Option<Filter>) -> Result<Filter> {
        let planner = QueryPlanner::new(&self.graph, &self.sources);
        match effective {
            Some(f) => Ok(planner.rewrite(entity, f).await?),
            None => Err(EngineError::Core(CoreError::config(
                "mutation requires a selector filter",
            ))),
        }
    }

    /// Run a mutation inside the provider's transaction bracket when it
    /// offers one. The consolidation decision was made strictly before
    /// this point, so a denial never opens a transaction.
    async fn bracketed<T, Fut>(&self, provider: &dyn DataProvider, work: Fut) -> Result<T>
    where
        Fut: Future<Output = authgate_datasource::Result<T>>,
    {
        let transaction = provider.begin().await?;
        match work.await {
            Ok(out) => {
                if let Some(transaction) = transaction {
                    transaction.commit().await?;
                }
                Ok(out)
            }
            Err(err) => {
                if let Some(transaction) = transaction {
                    transaction.rollback().await?;
                }
                Err(err.into())
            }
        }
    }

    async fn reshape_one(
        &self,
        entity: &str,
        action: Action,
        ctx: &AuthorizationContext,
        record: Option<Record>,
    ) -> Result<Option<Record>> {
        match record {
            Some(record) => {
                let rows = self.hooks.run_after(entity, action, ctx, vec![record]).await?;
                Ok(rows.into_iter().next())
            }
            None => Ok(None),
        }
    }
}
