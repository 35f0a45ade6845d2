//! Engine configuration

use crate::error::{CoreError, Result};

/// Default maximum query/filter nesting depth
pub const DEFAULT_MAX_QUERY_DEPTH: usize = 6;

/// The single generic message used for every authorization failure.
///
/// Denials are never entity- or reason-specific: a variant message would
/// leak which entities and roles exist.
pub const DEFAULT_DENIAL_MESSAGE: &str = "Not authorized";

/// Engine-wide configuration.
///
/// Deliberately small: one numeric depth limit and one denial message.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum nesting depth, counting both selection nesting and
    /// filter-argument nesting. Exceeding it aborts the operation before
    /// any consolidation or provider call.
    pub max_query_depth: usize,
    /// Generic message rendered for all authorization failures
    pub denial_message: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_query_depth: DEFAULT_MAX_QUERY_DEPTH,
            denial_message: DEFAULT_DENIAL_MESSAGE.to_string(),
        }
    }
}

impl EngineConfig {
    /// Validate configuration at startup
    pub fn validate(&self) -> Result<()> {
        if self.max_query_depth == 0 {
            return Err(CoreError::config("max_query_depth must be at least 1"));
        }
        if self.denial_message.is_empty() {
            return Err(CoreError::config("denial_message must not be empty"));
        }
        Ok(())
    }
}
