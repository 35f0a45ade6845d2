//! In-memory provider
//!
//! A table-per-entity store over JSON records. Used as the reference
//! provider in tests: its capability descriptor is configurable, it counts
//! every call it receives, and it records the queries it was asked to run,
//! so tests can assert not just what came back but what was pushed down
//! and whether a denied request reached the backend at all.

use crate::error::Result;
use crate::planner::sort_records;
use crate::provider::{Capability, DataProvider, ProviderQuery, ProviderTransaction, Record};
use async_trait::async_trait;
use authgate_core::{matches, Filter};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

pub struct MemoryProvider {
    name: String,
    capability: Capability,
    transactional: bool,
    tables: RwLock<HashMap<String, Vec<Record>>>,
    queries: Mutex<Vec<ProviderQuery>>,
    find_calls: AtomicUsize,
    mutation_calls: AtomicUsize,
    begin_calls: AtomicUsize,
    commits: Arc<AtomicUsize>,
    rollbacks: Arc<AtomicUsize>,
}

impl MemoryProvider {
    /// A store that filters, orders, and pages its own rows natively.
    ///
    /// Records are flat, so relationship clauses cannot be evaluated
    /// here: the join flags stay off and the planner correlates instead,
    /// even when both entities live in the same store.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capability(
            name,
            Capability {
                filter_parent_by_child: false,
                filter_child_by_child: false,
                ..Capability::full()
            },
        )
    }

    /// A store advertising only the given capabilities; anything missing
    /// gets emulated by the planner
    pub fn with_capability(name: impl Into<String>, capability: Capability) -> Self {
        Self {
            name: name.into(),
            capability,
            transactional: false,
            tables: RwLock::new(HashMap::new()),
            queries: Mutex::new(Vec::new()),
            find_calls: AtomicUsize::new(0),
            mutation_calls: AtomicUsize::new(0),
            begin_calls: AtomicUsize::new(0),
            commits: Arc::new(AtomicUsize::new(0)),
            rollbacks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Hand out no-op transactions from [`DataProvider::begin`] instead of
    /// `None`, so tests can observe bracket behavior
    pub fn with_transactions(mut self) -> Self {
        self.transactional = true;
        self
    }

    /// Replace an entity's table wholesale
    pub fn load(&self, entity: impl Into<String>, rows: Vec<Record>) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity.into(), rows);
    }

    /// Every query this provider was asked to run, in call order
    pub fn recorded_queries(&self) -> Vec<ProviderQuery> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    pub fn begin_calls(&self) -> usize {
        self.begin_calls.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    fn rows(&self, entity: &str) -> Vec<Record> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl DataProvider for MemoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        self.capability
    }

    async fn find(&self, entity: &str, query: &ProviderQuery) -> Result<Vec<Record>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.clone());

        let mut rows = self.rows(entity);
        if let Some(filter) = &query.filter {
            rows.retain(|row| matches(row, filter));
        }
        if let Some(order) = &query.order_by {
            sort_records(&mut rows, order);
        }
        if let Some(page) = query.page {
            rows = page.apply(rows);
        }
        Ok(rows)
    }

    async fn find_one(&self, entity: &str, filter: Option<&Filter>) -> Result<Option<Record>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows(entity);
        Ok(rows
            .into_iter()
            .find(|row| filter.map_or(true, |f| matches(row, f))))
    }

    async fn find_by_related_id(
        &self,
        entity: &str,
        related_field: &str,
        ids: &[Value],
        filter: Option<&Filter>,
    ) -> Result<Vec<Record>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows(entity);
        rows.retain(|row| {
            row.get(related_field).map_or(false, |v| ids.contains(v))
                && filter.map_or(true, |f| matches(row, f))
        });
        Ok(rows)
    }

    async fn create_one(&self, entity: &str, record: Record) -> Result<Record> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(entity.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update_one(
        &self,
        entity: &str,
        filter: &Filter,
        changes: Record,
    ) -> Result<Option<Record>> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let Some(rows) = tables.get_mut(entity) else {
            return Ok(None);
        };
        for row in rows.iter_mut() {
            if matches(row, filter) {
                for (field, value) in changes {
                    row.insert(field, value);
                }
                return Ok(Some(row.clone()));
            }
        }
        Ok(None)
    }

    async fn delete_one(&self, entity: &str, filter: &Filter) -> Result<Option<Record>> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let Some(rows) = tables.get_mut(entity) else {
            return Ok(None);
        };
        match rows.iter().position(|row| matches(row, filter)) {
            Some(index) => Ok(Some(rows.remove(index))),
            None => Ok(None),
        }
    }

    async fn begin(&self) -> Result<Option<Box<dyn ProviderTransaction>>> {
        self.begin_calls.fetch_add(1, Ordering::SeqCst);
        if !self.transactional {
            return Ok(None);
        }
        Ok(Some(Box::new(MemoryTransaction {
            commits: Arc::clone(&self.commits),
            rollbacks: Arc::clone(&self.rollbacks),
        })))
    }
}

/// No-op transaction that only counts its outcome
struct MemoryTransaction {
    commits: Arc<AtomicUsize>,
    rollbacks: Arc<AtomicUsize>,
}

#[async_trait]
impl ProviderTransaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> Record {
        v.as_object().cloned().expect("object literal")
    }

    fn seeded() -> MemoryProvider {
        let provider = MemoryProvider::new("store");
        provider.load(
            "Task",
            vec![
                record(json!({"id": 1, "status": "open"})),
                record(json!({"id": 2, "status": "closed"})),
                record(json!({"id": 3, "status": "open"})),
            ],
        );
        provider
    }

    #[tokio::test]
    async fn test_find_applies_query() {
        let provider = seeded();
        let query = ProviderQuery {
            filter: Some(Filter::eq("status", "open")),
            page: Some(authgate_core::Page::limit(1)),
            order_by: Some(authgate_core::OrderBy::desc("id")),
        };
        let rows = provider.find("Task", &query).await.expect("find");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&json!(3)));
        assert_eq!(provider.find_calls(), 1);
        assert_eq!(provider.recorded_queries(), vec![query]);
    }

    #[tokio::test]
    async fn test_find_by_related_id() {
        let provider = MemoryProvider::new("store");
        provider.load(
            "Comment",
            vec![
                record(json!({"id": "c1", "task_id": 1, "spam": false})),
                record(json!({"id": "c2", "task_id": 2, "spam": false})),
                record(json!({"id": "c3", "task_id": 1, "spam": true})),
            ],
        );
        let ids = vec![json!(1)];
        let rows = provider
            .find_by_related_id("Comment", "task_id", &ids, Some(&Filter::eq("spam", false)))
            .await
            .expect("find related");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&json!("c1")));
    }

    #[tokio::test]
    async fn test_update_one_merges_changes() {
        let provider = seeded();
        let updated = provider
            .update_one(
                "Task",
                &Filter::eq("id", 2),
                record(json!({"status": "reopened"})),
            )
            .await
            .expect("update")
            .expect("matched");
        assert_eq!(updated.get("status"), Some(&json!("reopened")));
        assert_eq!(updated.get("id"), Some(&json!(2)));

        let missing = provider
            .update_one("Task", &Filter::eq("id", 99), Record::new())
            .await
            .expect("update");
        assert!(missing.is_none());
        assert_eq!(provider.mutation_calls(), 2);
    }

    #[tokio::test]
    async fn test_delete_one_removes_row() {
        let provider = seeded();
        let deleted = provider
            .delete_one("Task", &Filter::eq("id", 1))
            .await
            .expect("delete")
            .expect("matched");
        assert_eq!(deleted.get("id"), Some(&json!(1)));

        let remaining = provider
            .find("Task", &ProviderQuery::default())
            .await
            .expect("find");
        assert_eq!(remaining.len(), 2);
    }

    #[tokio::test]
    async fn test_transaction_counters() {
        let provider = MemoryProvider::new("store").with_transactions();
        let tx = provider.begin().await.expect("begin").expect("transactional");
        tx.commit().await.expect("commit");
        let tx = provider.begin().await.expect("begin").expect("transactional");
        tx.rollback().await.expect("rollback");
        assert_eq!(provider.begin_calls(), 2);
        assert_eq!(provider.commits(), 1);
        assert_eq!(provider.rollbacks(), 1);

        let plain = MemoryProvider::new("plain");
        assert!(plain.begin().await.expect("begin").is_none());
    }
}
