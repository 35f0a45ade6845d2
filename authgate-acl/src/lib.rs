//! ACL declarations and role consolidation for authgate
//!
//! This crate provides the declarative side of authorization:
//!
//! - [`Permission`]: tagged variant over allow / deny / row-filter /
//!   dynamic (context function), matched exhaustively
//! - [`Acl`] / [`RolePermissions`]: per-entity role -> action -> permission
//!   tables, with the wildcard `Everyone` role and the `All` action fallback
//! - [`AclRegistry`]: append-once store of one ACL per entity, immutable
//!   after registration (absence means fail-closed denial)
//! - [`consolidate`]: combines every held role's permission for one
//!   entity/action into a single [`ConsolidatedAccess`] decision
//!
//! # Consolidation Semantics
//!
//! 1. No ACL registered: denied (fail-closed, not an error)
//! 2. Per role: `acl[role]` falling back to `acl["Everyone"]`, then
//!    `entry[action]` falling back to `entry[All]`
//! 3. Dynamic permissions resolve against the request's context;
//!    independent roles resolve concurrently; a resolution error is an
//!    explicit deny for that role's contribution, never silently ignored
//! 4. **Deny-overrides**: any literal deny beats every grant - revocation
//!    roles cannot be bypassed by broader roles
//! 5. No contribution from any role: denied (fail-closed)
//! 6. Otherwise allowed, with the OR of all row filters; an unconditional
//!    grant collapses the OR to "unconstrained"

mod consolidate;
mod error;
mod permission;
mod registry;

pub use consolidate::{consolidate, ConsolidatedAccess};
pub use error::{AclError, Result};
pub use permission::{
    Acl, ActionScope, DynamicFn, DynamicPermission, Permission, PermissionFut, PermissionValue,
    RolePermissions,
};
pub use registry::AclRegistry;
