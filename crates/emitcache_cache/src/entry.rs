//! Cache entry types.

use emitcache_unit::CompiledUnit;
use serde::{Deserialize, Serialize};

use crate::Fingerprint;

/// A compiled unit stored under a fingerprint, with the fingerprint's inputs.
///
/// Entries are immutable: a changed unit is stored as a new entry that
/// supersedes the old one under the same key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
pub struct CacheEntry {
    /// The cache key this entry was written under.
    pub fingerprint: String,

    /// Hash of the unit content.
    pub content_hash: String,

    /// Canonical JSON of the emission options.
    pub options: String,

    /// Module-name override the unit was compiled with.
    #[serde(default)]
    pub module_name: Option<String>,

    /// The cached result.
    pub unit: CompiledUnit,

    /// Timestamp when this entry was created.
    pub created_at: u64,
}

impl CacheEntry {
    /// Creates a new cache entry.
    pub fn new(fingerprint: &Fingerprint, unit: CompiledUnit) -> Self {
        Self {
            fingerprint: fingerprint.key().to_string(),
            content_hash: fingerprint.content_hash().to_string(),
            options: fingerprint.options().to_string(),
            module_name: fingerprint.module_name().map(str::to_string),
            unit,
            created_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    /// Checks that this entry was written for `fingerprint`.
    pub fn is_valid(&self, fingerprint: &Fingerprint) -> bool {
        self.fingerprint == fingerprint.key()
            && self.content_hash == fingerprint.content_hash()
            && self.options == fingerprint.options()
            && self.module_name.as_deref() == fingerprint.module_name()
    }
}
