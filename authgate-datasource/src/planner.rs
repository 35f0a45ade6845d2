//! Capability-aware plan synthesis
//!
//! Turns an approved, consolidated filter into concrete provider requests.
//! The planner never makes authorization decisions; it only decides *how*
//! an already-authorized constraint gets executed.

use crate::error::{Result, SourceError};
use crate::provider::{Capability, ProviderQuery, Record};
use crate::sources::SourceRegistry;
use authgate_core::{
    matches, CompareOp, Condition, Direction, EntityGraph, FieldPath, Filter, OrderBy, Page,
};
use futures::future::{try_join_all, BoxFuture};
use serde_json::Value;
use tracing::{debug, warn};

/// The concrete execution recipe for one provider call.
///
/// `query` is what the provider executes natively; `residual`,
/// `post_order`, and `post_page` are applied in-memory afterwards, in that
/// order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub query: ProviderQuery,
    pub residual: Option<Filter>,
    pub post_order: Option<OrderBy>,
    pub post_page: Option<Page>,
}

/// Synthesizes and executes provider requests for one entity at a time
pub struct QueryPlanner<'a> {
    graph: &'a EntityGraph,
    sources: &'a SourceRegistry,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(graph: &'a EntityGraph, sources: &'a SourceRegistry) -> Self {
        Self { graph, sources }
    }

    /// Build the execution plan for one entity.
    ///
    /// The filter is first rewritten so that every relationship clause the
    /// target provider cannot serve natively becomes a local
    /// `local_key IN (keys)` clause (running the correlation look-ups as
    /// needed); what remains is split between native pushdown and
    /// in-memory residual according to the capability flags.
    pub async fn plan(
        &self,
        entity: &str,
        filter: Option<Filter>,
        page: Option<Page>,
        order_by: Option<OrderBy>,
    ) -> Result<ExecutionPlan> {
        let provider = self.sources.provider_for(entity)?;
        let capability: Capability = provider.capability();

        let filter = match filter {
            Some(f) => Some(self.rewrite(entity, f).await?),
            None => None,
        };

        let (pushed, residual) = match filter {
            Some(f) if capability.filter_root => (Some(f), None),
            Some(f) => {
                // Correctness fallback, not a silent capability gap
                warn!(
                    entity,
                    provider = provider.name(),
                    "provider cannot filter natively; applying filter in-memory"
                );
                (None, Some(f))
            }
            None => (None, None),
        };

        // A residual filter forces pagination and ordering to run after it,
        // or rows matching the constraint would be cut off by the window.
        let can_push_page = capability.pagination && residual.is_none();
        let (page_pushed, post_page) = match page {
            Some(p) if can_push_page => (Some(p), None),
            Some(p) => (None, Some(p)),
            None => (None, None),
        };

        let can_push_order =
            (capability.order_by_root || capability.sort_root) && residual.is_none();
        let (order_pushed, post_order) = match order_by {
            Some(o) if can_push_order => (Some(o), None),
            Some(o) => (None, Some(o)),
            None => (None, None),
        };

        Ok(ExecutionPlan {
            query: ProviderQuery {
                filter: pushed,
                page: page_pushed,
                order_by: order_pushed,
            },
            residual,
            post_order,
            post_page,
        })
    }

    /// Plan and run a find against the entity's provider, applying any
    /// in-memory residual, ordering, and pagination.
    pub async fn execute_find(
        &self,
        entity: &str,
        filter: Option<Filter>,
        page: Option<Page>,
        order_by: Option<OrderBy>,
    ) -> Result<Vec<Record>> {
        let plan = self.plan(entity, filter, page, order_by).await?;
        let provider = self.sources.provider_for(entity)?;
        let mut rows = provider.find(entity, &plan.query).await?;
        if let Some(residual) = &plan.residual {
            rows.retain(|row| matches(row, residual));
        }
        if let Some(order) = &plan.post_order {
            sort_records(&mut rows, order);
        }
        if let Some(page) = plan.post_page {
            rows = page.apply(rows);
        }
        Ok(rows)
    }

    /// Rewrite a filter so every clause is executable against the entity's
    /// own provider. Relationship clauses the provider can serve natively
    /// are kept; the rest become correlation joins. Independent branches
    /// are rewritten concurrently.
    pub fn rewrite<'b>(&'b self, entity: &'b str, filter: Filter) -> BoxFuture<'b, Result<Filter>> {
        Box::pin(async move {
            match filter {
                Filter::And(branches) => {
                    let rewritten =
                        try_join_all(branches.into_iter().map(|b| self.rewrite(entity, b)))
                            .await?;
                    Ok(Filter::And(rewritten))
                }
                Filter::Or(branches) => {
                    let rewritten =
                        try_join_all(branches.into_iter().map(|b| self.rewrite(entity, b)))
                            .await?;
                    Ok(Filter::Or(rewritten))
                }
                Filter::Cond(cond) if cond.path.segments().is_empty() => Err(
                    SourceError::Unplannable("condition with an empty field path".to_string()),
                ),
                Filter::Cond(cond) if cond.path.is_local() => Ok(Filter::Cond(cond)),
                Filter::Cond(cond) => {
                    if self.native_pushable(entity, &cond)? {
                        Ok(Filter::Cond(cond))
                    } else {
                        self.correlate(entity, cond).await
                    }
                }
            }
        })
    }

    /// A relationship clause stays native only when every entity on its
    /// path is served by the same provider instance and the provider
    /// declares the matching join capability.
    fn native_pushable(&self, entity: &str, cond: &Condition) -> Result<bool> {
        let capability = self.sources.provider_for(entity)?.capability();
        let supported = match cond.path.hops() {
            0 => true,
            1 => capability.filter_parent_by_child,
            _ => capability.filter_child_by_child,
        };
        if !supported {
            return Ok(false);
        }

        let mut current = entity.to_string();
        let segments = cond.path.segments();
        for segment in &segments[..segments.len() - 1] {
            let relation = self.graph.relation(&current, segment).ok_or_else(|| {
                SourceError::Unplannable(format!(
                    "'{segment}' is not a relationship field of '{current}'"
                ))
            })?;
            if !self.sources.same_provider(entity, &relation.entity) {
                return Ok(false);
            }
            current = relation.entity.clone();
        }
        Ok(true)
    }

    /// Two-phase correlation join: resolve the matching keys in the
    /// related entity's store, then constrain the local side to them.
    ///
    /// The remainder of the path is planned recursively against the
    /// related entity, so a child-by-child clause resolves innermost
    /// first, and the foreign look-up itself honors the foreign provider's
    /// capabilities.
    async fn correlate(&self, entity: &str, cond: Condition) -> Result<Filter> {
        let head = cond.path.head().to_string();
        let relation = self.graph.relation(entity, &head).ok_or_else(|| {
            SourceError::Unplannable(format!(
                "'{head}' is not a relationship field of '{entity}'"
            ))
        })?;
        let target = relation.entity.clone();
        let local_key = relation.local_key.clone();
        let remote_key = relation.remote_key.clone();

        let remainder = Filter::Cond(Condition::new(cond.path.tail(), cond.op, cond.value));
        let rows = self.execute_find(&target, Some(remainder), None, None).await?;

        let mut keys: Vec<Value> = Vec::new();
        for row in rows {
            if let Some(key) = row.get(&remote_key) {
                if !key.is_null() && !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        debug!(
            entity,
            target = target.as_str(),
            keys = keys.len(),
            "correlated relationship clause"
        );

        Ok(Filter::Cond(Condition::new(
            FieldPath::new(vec![local_key]),
            CompareOp::In,
            Value::Array(keys),
        )))
    }
}

/// In-memory ordering over JSON fields; records missing the field sort
/// first on ascending order.
pub(crate) fn sort_records(rows: &mut [Record], order: &OrderBy) {
    rows.sort_by(|a, b| {
        let ord = compare_values(a.get(&order.field), b.get(&order.field));
        match order.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    });
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => match (x, y) {
            (Value::Number(m), Value::Number(n)) => m
                .as_f64()
                .partial_cmp(&n.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(m), Value::String(n)) => m.cmp(n),
            (Value::Bool(m), Value::Bool(n)) => m.cmp(n),
            _ => Ordering::Equal,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryProvider;
    use authgate_core::{EntitySchema, Relation};
    use serde_json::json;
    use std::sync::Arc;

    fn record(v: Value) -> Record {
        v.as_object().cloned().expect("object literal")
    }

    fn graph() -> EntityGraph {
        EntityGraph::new()
            .entity(
                EntitySchema::new("Task")
                    .scalar("id")
                    .scalar("title")
                    .scalar("status")
                    .scalar("assignee_id")
                    .relation("assignee", Relation::new("User", "assignee_id", "id")),
            )
            .entity(
                EntitySchema::new("User")
                    .scalar("id")
                    .scalar("username")
                    .scalar("team_id")
                    .relation("team", Relation::new("Team", "team_id", "id")),
            )
            .entity(EntitySchema::new("Team").scalar("id").scalar("name"))
    }

    fn seed_users(provider: &MemoryProvider) {
        provider.load(
            "User",
            vec![
                record(json!({"id": "u1", "username": "alice", "team_id": "t1"})),
                record(json!({"id": "u2", "username": "bob", "team_id": "t2"})),
            ],
        );
    }

    fn seed_tasks(provider: &MemoryProvider) {
        provider.load(
            "Task",
            vec![
                record(json!({"id": 1, "title": "write docs", "status": "open", "assignee_id": "u1"})),
                record(json!({"id": 2, "title": "review docs", "status": "open", "assignee_id": "u2"})),
                record(json!({"id": 3, "title": "ship", "status": "closed", "assignee_id": "u1"})),
            ],
        );
    }

    #[tokio::test]
    async fn test_root_filter_pushed_when_supported() {
        let graph = graph();
        let provider = Arc::new(MemoryProvider::new("store"));
        seed_tasks(&provider);
        let mut sources = SourceRegistry::new();
        sources.bind("Task", provider.clone()).expect("bind");

        let planner = QueryPlanner::new(&graph, &sources);
        let rows = planner
            .execute_find("Task", Some(Filter::eq("status", "open")), None, None)
            .await
            .expect("find");

        assert_eq!(rows.len(), 2);
        // The filter went to the provider, not the residual path
        let queries = provider.recorded_queries();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].filter.is_some());
    }

    #[tokio::test]
    async fn test_in_memory_fallback_matches_native_result() {
        let graph = graph();
        let native = Arc::new(MemoryProvider::new("native"));
        let limited = Arc::new(MemoryProvider::with_capability(
            "limited",
            Capability::minimal(),
        ));
        seed_tasks(&native);
        seed_tasks(&limited);

        let mut native_sources = SourceRegistry::new();
        native_sources.bind("Task", native.clone()).expect("bind");
        let mut limited_sources = SourceRegistry::new();
        limited_sources.bind("Task", limited.clone()).expect("bind");

        let filter = Filter::eq("status", "open");
        let native_rows = QueryPlanner::new(&graph, &native_sources)
            .execute_find("Task", Some(filter.clone()), None, None)
            .await
            .expect("native");
        let fallback_rows = QueryPlanner::new(&graph, &limited_sources)
            .execute_find("Task", Some(filter), None, None)
            .await
            .expect("fallback");

        assert_eq!(native_rows, fallback_rows);
        // The limited provider saw no filter at all
        let queries = limited.recorded_queries();
        assert!(queries[0].filter.is_none());
    }

    #[tokio::test]
    async fn test_cross_provider_correlation_is_inner_join() {
        let graph = graph();
        let users = Arc::new(MemoryProvider::new("user-store"));
        let tasks = Arc::new(MemoryProvider::new("task-store"));
        seed_users(&users);
        seed_tasks(&tasks);

        let mut sources = SourceRegistry::new();
        sources.bind("User", users.clone()).expect("bind users");
        sources.bind("Task", tasks.clone()).expect("bind tasks");

        let planner = QueryPlanner::new(&graph, &sources);
        let rows = planner
            .execute_find(
                "Task",
                Some(Filter::eq("assignee.username", "alice")),
                None,
                None,
            )
            .await
            .expect("correlated find");

        // Exactly the tasks whose foreign key matches an id from the user
        // store: tasks 1 and 3
        let ids: Vec<_> = rows.iter().map(|r| r.get("id").cloned()).collect();
        assert_eq!(ids, vec![Some(json!(1)), Some(json!(3))]);
        assert_eq!(users.find_calls(), 1);
        assert_eq!(tasks.find_calls(), 1);
    }

    #[tokio::test]
    async fn test_child_by_child_recurses_innermost_first() {
        let graph = graph();
        let users = Arc::new(MemoryProvider::new("user-store"));
        let tasks = Arc::new(MemoryProvider::new("task-store"));
        let teams = Arc::new(MemoryProvider::new("team-store"));
        seed_users(&users);
        seed_tasks(&tasks);
        teams.load(
            "Team",
            vec![
                record(json!({"id": "t1", "name": "core"})),
                record(json!({"id": "t2", "name": "infra"})),
            ],
        );

        let mut sources = SourceRegistry::new();
        sources.bind("User", users.clone()).expect("bind");
        sources.bind("Task", tasks.clone()).expect("bind");
        sources.bind("Team", teams.clone()).expect("bind");

        let planner = QueryPlanner::new(&graph, &sources);
        let rows = planner
            .execute_find(
                "Task",
                Some(Filter::eq("assignee.team.name", "core")),
                None,
                None,
            )
            .await
            .expect("two-hop correlated find");

        // team "core" -> user u1 -> tasks 1 and 3
        let ids: Vec<_> = rows.iter().map(|r| r.get("id").cloned()).collect();
        assert_eq!(ids, vec![Some(json!(1)), Some(json!(3))]);
        assert_eq!(teams.find_calls(), 1);
        assert_eq!(users.find_calls(), 1);
    }

    #[tokio::test]
    async fn test_same_provider_relationship_pushed_natively() {
        let graph = graph();
        // A store that really can join through relationships declares the
        // flags explicitly; the planner then leaves the clause untouched
        let store = Arc::new(MemoryProvider::with_capability(
            "one-store",
            Capability::full(),
        ));
        seed_users(&store);
        seed_tasks(&store);

        let mut sources = SourceRegistry::new();
        sources.bind("User", store.clone()).expect("bind");
        sources.bind("Task", store.clone()).expect("bind");

        let planner = QueryPlanner::new(&graph, &sources);
        let plan = planner
            .plan(
                "Task",
                Some(Filter::eq("assignee.username", "alice")),
                None,
                None,
            )
            .await
            .expect("plan");

        // Full capability on a single store: the relationship clause stays
        // in the pushed filter, untouched
        let pushed = plan.query.filter.expect("pushed filter");
        assert_eq!(pushed, Filter::eq("assignee.username", "alice"));
        assert!(plan.residual.is_none());
    }

    #[tokio::test]
    async fn test_residual_forces_post_pagination() {
        let graph = graph();
        let limited = Arc::new(MemoryProvider::with_capability(
            "limited",
            Capability {
                pagination: true,
                ..Capability::minimal()
            },
        ));
        seed_tasks(&limited);
        let mut sources = SourceRegistry::new();
        sources.bind("Task", limited.clone()).expect("bind");

        let planner = QueryPlanner::new(&graph, &sources);
        let rows = planner
            .execute_find(
                "Task",
                Some(Filter::eq("status", "open")),
                Some(Page::limit(1)),
                None,
            )
            .await
            .expect("find");

        // Pagination ran after the residual filter, not before it
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&json!(1)));
        assert!(limited.recorded_queries()[0].page.is_none());
    }

    #[tokio::test]
    async fn test_single_store_relationship_filter_resolves() {
        let graph = graph();
        // Default capability: both entities in one store, but no native
        // join support; the clause must correlate, not silently miss
        let store = Arc::new(MemoryProvider::new("one-store"));
        seed_users(&store);
        seed_tasks(&store);

        let mut sources = SourceRegistry::new();
        sources.bind("User", store.clone()).expect("bind");
        sources.bind("Task", store.clone()).expect("bind");

        let planner = QueryPlanner::new(&graph, &sources);
        let rows = planner
            .execute_find(
                "Task",
                Some(Filter::eq("assignee.username", "alice")),
                None,
                None,
            )
            .await
            .expect("single-store join");

        let ids: Vec<_> = rows.iter().map(|r| r.get("id").cloned()).collect();
        assert_eq!(ids, vec![Some(json!(1)), Some(json!(3))]);
        // One look-up for the users, one rewritten look-up for the tasks
        assert_eq!(store.find_calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_field_path_is_unplannable() {
        let graph = graph();
        let provider = Arc::new(MemoryProvider::new("store"));
        seed_tasks(&provider);
        let mut sources = SourceRegistry::new();
        sources.bind("Task", provider).expect("bind");

        let filter = Filter::Cond(Condition::new(
            FieldPath::new(Vec::new()),
            CompareOp::Eq,
            json!("open"),
        ));
        let err = QueryPlanner::new(&graph, &sources)
            .execute_find("Task", Some(filter), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Unplannable(_)));
    }

    #[tokio::test]
    async fn test_unplannable_path_errors() {
        let graph = graph();
        let provider = Arc::new(MemoryProvider::new("store"));
        let mut sources = SourceRegistry::new();
        sources.bind("Task", provider).expect("bind");

        let planner = QueryPlanner::new(&graph, &sources);
        let err = planner
            .execute_find("Task", Some(Filter::eq("title.oops", "x")), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Unplannable(_)));
    }
}
