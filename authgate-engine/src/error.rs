//! Engine error types

use authgate_acl::AclError;
use authgate_audit::AuditError;
use authgate_core::CoreError;
use authgate_datasource::SourceError;
use thiserror::Error;

/// Errors surfaced by the access engine.
///
/// Every authorization denial is rendered as [`EngineError::Forbidden`]
/// with the single configured message: a missing ACL, an explicit deny,
/// and an unapproved touch-set member are byte-identical to the caller.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Access denied. The message is the configured generic denial
    /// message, never entity- or reason-specific.
    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Acl(#[from] AclError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// A before/after hook failed; passed through, never reinterpreted as
    /// an authorization failure
    #[error("Hook error: {0}")]
    Hook(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
