//! # emitcache_cache
//!
//! Artifact cache for compiled units.
//!
//! Entries are keyed by a [`Fingerprint`] over the unit's content, the
//! emission-relevant options and an optional module-name override. Lookups go
//! through a validation callback that answers with a [`Validation`]: reuse the
//! stored unit, patch its diagnostics, or replace it.
//!
//! ## Storage
//!
//! Entries live in memory and, when a cache directory is bound, are written
//! through to `<dir>/entries/<fingerprint>.rkyv` using `rkyv`. Unreadable or
//! corrupted entry files are treated as misses.

pub mod entry;
mod error;
mod fingerprint;
mod manager;

pub use entry::CacheEntry;
pub use error::CacheError;
pub use fingerprint::{Fingerprint, hash_content};
pub use manager::{ArtifactCache, Validation};
