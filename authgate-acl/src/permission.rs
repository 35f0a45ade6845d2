//! Permission variants and ACL tables
//!
//! A [`Permission`] is a tagged variant rather than a loosely-typed value:
//! the consolidator matches it exhaustively, so adding a variant is a
//! compile error everywhere it matters.

use crate::error::Result;
use authgate_core::{Action, AuthorizationContext, Filter};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future type for dynamic permission resolution
pub type PermissionFut<'a> = Pin<Box<dyn Future<Output = Result<PermissionValue>> + Send + 'a>>;

/// A permission that must be resolved against the request's context.
///
/// Implementations may consult the context's user id, roles, or
/// token-derived claims, and may perform async work. Resolution errors are
/// treated as an explicit deny for the contributing role.
pub trait DynamicPermission: Send + Sync {
    fn resolve<'a>(&'a self, ctx: &'a AuthorizationContext) -> PermissionFut<'a>;
}

/// Adapter turning a plain closure into a [`DynamicPermission`].
///
/// Handy for declarations like "owners only":
/// `DynamicFn(|ctx| Ok(PermissionValue::Filtered(Filter::eq("owner", ctx.user_id.clone()))))`
pub struct DynamicFn<F>(pub F);

impl<F> DynamicPermission for DynamicFn<F>
where
    F: Fn(&AuthorizationContext) -> Result<PermissionValue> + Send + Sync,
{
    fn resolve<'a>(&'a self, ctx: &'a AuthorizationContext) -> PermissionFut<'a> {
        let value = (self.0)(ctx);
        Box::pin(async move { value })
    }
}

/// A declared permission for one role/action pair
#[derive(Clone)]
pub enum Permission {
    /// Unconditional allow
    Allow,
    /// Unconditional, explicit deny (beats any other role's grant)
    Deny,
    /// Allow, constrained to rows matching the filter
    Filtered(Filter),
    /// Resolved per request from the authorization context
    Dynamic(Arc<dyn DynamicPermission>),
}

impl Permission {
    /// Wrap a closure as a dynamic permission
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&AuthorizationContext) -> Result<PermissionValue> + Send + Sync + 'static,
    {
        Permission::Dynamic(Arc::new(DynamicFn(f)))
    }
}

impl From<bool> for Permission {
    fn from(allowed: bool) -> Self {
        if allowed {
            Permission::Allow
        } else {
            Permission::Deny
        }
    }
}

impl From<Filter> for Permission {
    fn from(filter: Filter) -> Self {
        Permission::Filtered(filter)
    }
}

impl fmt::Debug for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Allow => f.write_str("Allow"),
            Permission::Deny => f.write_str("Deny"),
            Permission::Filtered(filter) => f.debug_tuple("Filtered").field(filter).finish(),
            Permission::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// What a dynamic permission resolves to.
///
/// Deliberately non-recursive: a dynamic permission yields a concrete
/// value, not another function.
#[derive(Debug, Clone, PartialEq)]
pub enum PermissionValue {
    Allow,
    Deny,
    Filtered(Filter),
}

impl From<bool> for PermissionValue {
    fn from(allowed: bool) -> Self {
        if allowed {
            PermissionValue::Allow
        } else {
            PermissionValue::Deny
        }
    }
}

/// Key into a role's permission table: a specific action or the catch-all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionScope {
    One(Action),
    /// Fallback used when the specific action key is absent
    All,
}

/// One role's declared permissions
#[derive(Debug, Clone, Default)]
pub struct RolePermissions {
    by_scope: HashMap<ActionScope, Permission>,
}

impl RolePermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a permission for one action (builder style)
    pub fn action(mut self, action: Action, permission: impl Into<Permission>) -> Self {
        self.by_scope
            .insert(ActionScope::One(action), permission.into());
        self
    }

    /// Declare the catch-all permission (builder style)
    pub fn all(mut self, permission: impl Into<Permission>) -> Self {
        self.by_scope.insert(ActionScope::All, permission.into());
        self
    }

    /// The permission governing `action`: the specific key, falling back
    /// to `All`; `None` if neither is declared (contributes nothing).
    pub fn for_action(&self, action: Action) -> Option<&Permission> {
        self.by_scope
            .get(&ActionScope::One(action))
            .or_else(|| self.by_scope.get(&ActionScope::All))
    }

    /// True if no permission is declared at all
    pub fn is_empty(&self) -> bool {
        self.by_scope.is_empty()
    }
}

/// One entity's access-control declaration: role name -> permissions.
///
/// Immutable after registration; read concurrently by every request.
#[derive(Debug, Clone, Default)]
pub struct Acl {
    roles: HashMap<String, RolePermissions>,
}

impl Acl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a role's permissions (builder style)
    pub fn role(mut self, name: impl Into<String>, permissions: RolePermissions) -> Self {
        self.roles.insert(name.into(), permissions);
        self
    }

    /// The permissions declared for a role name, with no fallback applied
    pub fn role_entry(&self, role: &str) -> Option<&RolePermissions> {
        self.roles.get(role)
    }

    /// Declared role names (unordered)
    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }
}
