//! Cache error types.

use thiserror::Error;

/// Errors that can occur in the cache system.
///
/// Read-side failures never reach callers of [`ArtifactCache::get`]: they are
/// logged and the lookup proceeds as a miss.
///
/// [`ArtifactCache::get`]: crate::ArtifactCache::get
#[derive(Debug, Error)]
pub enum CacheError {
    /// Cache entry is corrupted.
    #[error("Corrupted cache entry: {0}")]
    Corrupted(String),

    /// The entry stored under a key was written for a different fingerprint.
    #[error("Cache key mismatch: expected {expected}, found {found}")]
    KeyMismatch {
        /// The key that was looked up.
        expected: String,
        /// The fingerprint recorded in the entry.
        found: String,
    },

    /// A validation callback answered in a way the lookup cannot honor.
    #[error("Invalid validation result: {0}")]
    Protocol(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CacheError {
    /// Creates a corrupted entry error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}
