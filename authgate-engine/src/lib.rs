//! Orchestration layer for authgate
//!
//! Ties the other crates into the full request path:
//!
//! 1. [`AccessEngine::audit`] statically walks the parsed operation
//!    document (depth-checked first), consolidates every touched
//!    (entity, action) pair concurrently, and fails the whole operation
//!    with one generic `Forbidden` if any pair is denied - before any
//!    provider call.
//! 2. [`AccessEngine::filter_for`] turns an approved pair into the
//!    provider-ready filter: consolidated ACL filter ANDed with the
//!    caller's own filter.
//! 3. `find` / `find_one` / `find_related` / `create_one` / `update_one` /
//!    `delete_one` run the data path: consolidate, AND filters,
//!    before-hooks, capability-aware planning, provider I/O, residual
//!    filtering, after-hooks. Mutations consolidate strictly before a
//!    provider transaction is opened.
//!
//! The per-request [`AuthorizationContext`] is threaded explicitly;
//! [`with_authorization_context`] is the scoped way to hold one for the
//! duration of a request.

mod engine;
mod error;
mod hooks;

pub use engine::{AccessEngine, ApprovedOperation, EngineBuilder};
pub use error::{EngineError, Result};
pub use hooks::{EntityHook, HookRegistry, HookResult};

pub use authgate_core::{with_authorization_context, AuthorizationContext, EngineConfig};
