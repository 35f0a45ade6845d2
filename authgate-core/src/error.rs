//! Core error types

use thiserror::Error;

/// Errors shared across the authgate crates
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration (registration-time, fatal, never retried)
    #[error("Configuration error: {0}")]
    Config(String),

    /// An entity name that is not present in the entity graph
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// A field name that is not declared on its entity
    #[error("Unknown field: {entity}.{field}")]
    UnknownField { entity: String, field: String },
}

impl CoreError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
