//! The uniform backend provider contract

use crate::error::Result;
use authgate_core::{Filter, OrderBy, Page};
use async_trait::async_trait;
use serde_json::Value;

/// A backend record, as loosely-typed JSON fields
pub type Record = serde_json::Map<String, Value>;

/// What a provider can execute natively.
///
/// Six independent flags; anything a provider cannot do natively the
/// planner emulates in-memory or via correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capability {
    /// Filter clauses over the entity's own fields
    pub filter_root: bool,
    /// Filter a parent by a directly-related child's fields (one hop)
    pub filter_parent_by_child: bool,
    /// Filter through two relationship levels (child of child)
    pub filter_child_by_child: bool,
    /// Offset/limit pagination
    pub pagination: bool,
    /// Server-side ordering of root results
    pub order_by_root: bool,
    /// Server-side sort of root results
    pub sort_root: bool,
}

impl Capability {
    /// Everything supported natively
    pub fn full() -> Self {
        Self {
            filter_root: true,
            filter_parent_by_child: true,
            filter_child_by_child: true,
            pagination: true,
            order_by_root: true,
            sort_root: true,
        }
    }

    /// Nothing supported natively; everything is emulated
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// A concrete, provider-native request: the part of a synthesized query
/// the target provider executes itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderQuery {
    pub filter: Option<Filter>,
    pub page: Option<Page>,
    pub order_by: Option<OrderBy>,
}

/// Uniform contract every backend data source implements.
///
/// Providers are I/O adapters only: authorization decisions are always
/// made before any of these methods is called.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Provider name, used in logs and source wiring
    fn name(&self) -> &str;

    /// Static descriptor of native abilities
    fn capability(&self) -> Capability;

    /// Fetch records matching the (already capability-checked) query
    async fn find(&self, entity: &str, query: &ProviderQuery) -> Result<Vec<Record>>;

    /// Fetch at most one record matching the filter
    async fn find_one(&self, entity: &str, filter: Option<&Filter>) -> Result<Option<Record>>;

    /// Fetch records whose `related_field` value is one of `ids`,
    /// optionally further constrained by `filter`. This is the only
    /// primitive a provider pair needs for correlation joins.
    async fn find_by_related_id(
        &self,
        entity: &str,
        related_field: &str,
        ids: &[Value],
        filter: Option<&Filter>,
    ) -> Result<Vec<Record>>;

    /// Persist a new record, returning it as stored
    async fn create_one(&self, entity: &str, record: Record) -> Result<Record>;

    /// Update the first record matching the filter, returning the updated
    /// record (`None` when nothing matched)
    async fn update_one(
        &self,
        entity: &str,
        filter: &Filter,
        changes: Record,
    ) -> Result<Option<Record>>;

    /// Delete the first record matching the filter, returning the deleted
    /// record (`None` when nothing matched)
    async fn delete_one(&self, entity: &str, filter: &Filter) -> Result<Option<Record>>;

    /// Open a transaction bracket for a multi-step mutation.
    ///
    /// `None` means the provider has no transaction support and mutations
    /// run unbracketed. The authorization decision for a mutation is made
    /// strictly before this is called, so a denial never opens one.
    async fn begin(&self) -> Result<Option<Box<dyn ProviderTransaction>>> {
        Ok(None)
    }
}

/// An open provider transaction
#[async_trait]
pub trait ProviderTransaction: Send {
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}
