//! Data-source error types

use thiserror::Error;

/// Errors from providers and plan synthesis
#[derive(Error, Debug)]
pub enum SourceError {
    /// Invalid source wiring (no provider bound for an entity, duplicate
    /// binding). Startup-time and fatal.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Passed through unmodified from a backend provider; logged by the
    /// caller and never reinterpreted as an authorization failure.
    #[error("Provider error: {0}")]
    Provider(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A filter clause that cannot be planned (unknown relationship,
    /// malformed path)
    #[error("Unplannable filter: {0}")]
    Unplannable(String),
}

impl SourceError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Wrap a backend error without reinterpreting it
    pub fn provider(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Provider(Box::new(err))
    }
}

/// Result type alias for data-source operations
pub type Result<T> = std::result::Result<T, SourceError>;
