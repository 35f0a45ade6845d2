//! ACL error types

use thiserror::Error;

/// ACL registration and evaluation errors
#[derive(Error, Debug)]
pub enum AclError {
    /// Invalid registration (duplicate entity, unknown role/action).
    /// Startup-time and fatal, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A dynamic permission failed to resolve
    #[error("Permission evaluation failed: {0}")]
    Evaluation(String),

    /// The registry lock was poisoned by a panicking writer
    #[error("ACL registry lock poisoned")]
    LockPoisoned,
}

impl AclError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an evaluation error
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }
}

/// Result type alias for ACL operations
pub type Result<T> = std::result::Result<T, AclError>;
