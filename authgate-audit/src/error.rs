//! Audit error types

use thiserror::Error;

/// Errors raised while statically auditing an operation document
#[derive(Error, Debug)]
pub enum AuditError {
    /// Nesting depth exceeded the configured maximum.
    ///
    /// States only the limit, never what was being accessed.
    #[error("Query depth limit of {limit} exceeded")]
    DepthLimitExceeded { limit: usize },

    /// The document is structurally unsound (unknown fragment, fragment
    /// cycle, root field that maps to no entity)
    #[error("Invalid operation document: {0}")]
    InvalidDocument(String),
}

impl AuditError {
    /// Create an invalid-document error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidDocument(message.into())
    }
}

/// Result type alias for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;
