//! Build error types.

use thiserror::Error;

use crate::EngineError;

/// Errors that can occur while configuring a build or emitting a unit.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The path is not in the working set, or its content is unavailable.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Compiler engine error.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Cache error.
    #[error("Cache error: {0}")]
    Cache(#[from] emitcache_cache::CacheError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BuildError {
    /// Creates a not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
