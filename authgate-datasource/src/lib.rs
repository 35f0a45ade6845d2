//! Backend data providers and capability-aware filter pushdown
//!
//! Backend stores are external collaborators behind the [`DataProvider`]
//! contract: `find` / `find_one` / `find_by_related_id` / `create_one` /
//! `update_one` / `delete_one`, plus a static [`Capability`] descriptor of
//! what the store can execute natively.
//!
//! The [`QueryPlanner`] maps a synthesized filter onto those capabilities:
//!
//! - clauses over the entity's own fields are pushed as a root filter when
//!   `filter_root` is supported, and otherwise applied in-memory as a
//!   warn-logged residual (a correctness fallback, not a silent gap);
//! - clauses addressing a relationship served by a *different* provider
//!   (or one the local provider cannot filter through) are realized as a
//!   two-phase correlation join: resolve the matching keys in the foreign
//!   store, then rewrite the local clause to `local_key IN (keys)`;
//! - child-by-child clauses recurse through the same machinery, innermost
//!   first.
//!
//! Independent correlation branches run concurrently; pagination and
//! ordering are forwarded only when the capability flags allow and applied
//! in-memory otherwise.

mod error;
mod memory;
mod planner;
mod provider;
mod sources;

pub use error::{Result, SourceError};
pub use memory::MemoryProvider;
pub use planner::{ExecutionPlan, QueryPlanner};
pub use provider::{Capability, DataProvider, ProviderQuery, ProviderTransaction, Record};
pub use sources::SourceRegistry;
