//! Role consolidation
//!
//! Combines every held role's permission for one entity/action into a
//! single decision, with deny-overrides semantics and an OR over row
//! filters. See the crate docs for the full algorithm.

use crate::permission::{Permission, PermissionValue};
use crate::registry::AclRegistry;
use authgate_core::{or_all, Action, AuthorizationContext, Filter, EVERYONE_ROLE};
use futures::future::join_all;
use tracing::{debug, warn};

/// The ephemeral outcome of consolidating one (entity, action, context)
/// triple. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedAccess {
    pub allowed: bool,
    /// Row constraint to AND into the query; `None` means unconstrained
    pub filter: Option<Filter>,
}

impl ConsolidatedAccess {
    /// Denied outright
    pub fn denied() -> Self {
        Self {
            allowed: false,
            filter: None,
        }
    }

    /// Allowed with no row constraint
    pub fn unconstrained() -> Self {
        Self {
            allowed: true,
            filter: None,
        }
    }

    /// Allowed, constrained to matching rows
    pub fn filtered(filter: Filter) -> Self {
        Self {
            allowed: true,
            filter: Some(filter),
        }
    }
}

/// Consolidate all of the context's roles into one decision for
/// `entity`/`action`.
///
/// Independent roles' dynamic permissions are resolved concurrently; the
/// result is not reported until every resolution has completed. A dynamic
/// resolution error is logged and treated as that role's explicit deny.
pub async fn consolidate(
    registry: &AclRegistry,
    entity: &str,
    action: Action,
    ctx: &AuthorizationContext,
) -> ConsolidatedAccess {
    let span = tracing::debug_span!("consolidate", entity, action = %action);
    let _guard = span.enter();

    let acl = match registry.lookup(entity) {
        Some(acl) => acl,
        None => {
            debug!(entity, "no ACL registered, denying");
            return ConsolidatedAccess::denied();
        }
    };

    // Held roles plus the implicit wildcard, each resolved at most once
    let mut role_names: Vec<&str> = ctx.roles.iter().map(String::as_str).collect();
    if !role_names.contains(&EVERYONE_ROLE) {
        role_names.push(EVERYONE_ROLE);
    }
    role_names.dedup();

    let mut contributions: Vec<PermissionValue> = Vec::new();
    let mut pending = Vec::new();

    for role in role_names {
        // A named role with no entry falls back to the wildcard entry
        let entry = match acl
            .role_entry(role)
            .or_else(|| acl.role_entry(EVERYONE_ROLE))
        {
            Some(entry) => entry,
            None => continue,
        };
        let permission = match entry.for_action(action) {
            Some(permission) => permission,
            None => continue,
        };
        match permission {
            Permission::Allow => contributions.push(PermissionValue::Allow),
            Permission::Deny => contributions.push(PermissionValue::Deny),
            Permission::Filtered(filter) => {
                contributions.push(PermissionValue::Filtered(filter.clone()))
            }
            Permission::Dynamic(dynamic) => {
                let role = role.to_string();
                pending.push(async move { (role, dynamic.resolve(ctx).await) });
            }
        }
    }

    // Synchronization barrier: every dynamic resolution completes before a
    // decision is reported.
    for (role, resolved) in join_all(pending).await {
        match resolved {
            Ok(value) => contributions.push(value),
            Err(err) => {
                // An evaluation error is an explicit deny for this role,
                // never silently ignored.
                warn!(role, error = %err, "dynamic permission failed, treating as deny");
                contributions.push(PermissionValue::Deny);
            }
        }
    }

    if contributions.is_empty() {
        debug!(entity, "no role contributed a permission, denying");
        return ConsolidatedAccess::denied();
    }

    // Deny-overrides: a revocation role beats every grant
    if contributions
        .iter()
        .any(|c| matches!(c, PermissionValue::Deny))
    {
        debug!(entity, "explicit deny contribution, denying");
        return ConsolidatedAccess::denied();
    }

    // An unconditional grant makes the whole disjunction unconstrained
    if contributions
        .iter()
        .any(|c| matches!(c, PermissionValue::Allow))
    {
        return ConsolidatedAccess::unconstrained();
    }

    let filters: Vec<Filter> = contributions
        .into_iter()
        .map(|c| match c {
            PermissionValue::Filtered(filter) => filter,
            // Allow and Deny are handled above
            PermissionValue::Allow | PermissionValue::Deny => unreachable!(),
        })
        .collect();

    match or_all(filters) {
        Some(filter) => ConsolidatedAccess::filtered(filter),
        None => ConsolidatedAccess::unconstrained(),
    }
}
