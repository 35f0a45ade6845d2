//! Request-scoped authorization context
//!
//! The context is created fresh at the start of each inbound request from
//! the verified identity and threaded explicitly through the call chain.
//! It must never be stored in process-global state or cached across
//! requests: a singleton context is a correctness and security bug under
//! concurrent requests.

use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// The implicit wildcard role held by every requester
pub const EVERYONE_ROLE: &str = "Everyone";

/// Per-request identity: user id, held roles, and token-derived claims.
///
/// The engine treats the pair as opaque - how roles were assigned and how
/// the token was verified are the authentication layer's concern.
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    /// Unique id for this request, attached to log spans
    pub request_id: Uuid,
    /// Verified user identifier
    pub user_id: String,
    /// Roles held by the user (the `Everyone` role is implicit and need
    /// not be listed)
    pub roles: Vec<String>,
    /// Additional token-derived data, available to dynamic permissions
    pub claims: Map<String, Value>,
}

impl AuthorizationContext {
    /// Create a context for a verified `(user, roles)` pair
    pub fn new(user_id: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user_id: user_id.into(),
            roles,
            claims: Map::new(),
        }
    }

    /// Attach token-derived claims
    pub fn with_claims(mut self, claims: Map<String, Value>) -> Self {
        self.claims = claims;
        self
    }

    /// True if the user holds the named role (always true for `Everyone`)
    pub fn has_role(&self, role: &str) -> bool {
        role == EVERYONE_ROLE || self.roles.iter().any(|r| r == role)
    }

    /// A claim value by key
    pub fn claim(&self, key: &str) -> Option<&Value> {
        self.claims.get(key)
    }
}

/// Run `f` with a freshly-scoped authorization context.
///
/// The context is shared into the closure as an `Arc` and dropped when the
/// closure's future completes, whether it succeeds or fails. This is the
/// only sanctioned way for the query-execution layer to hold a context:
/// ownership ends with the request.
pub async fn with_authorization_context<T, F, Fut>(ctx: AuthorizationContext, f: F) -> T
where
    F: FnOnce(Arc<AuthorizationContext>) -> Fut,
    Fut: Future<Output = T>,
{
    let span = tracing::debug_span!(
        "request",
        request_id = %ctx.request_id,
        user = %ctx.user_id,
    );
    let _guard = span.enter();

    let ctx = Arc::new(ctx);
    let out = f(Arc::clone(&ctx)).await;
    drop(ctx);
    out
}
