//! Fingerprint-keyed artifact cache.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use emitcache_unit::{CompiledUnit, Dependencies, Diagnostics};
use tracing::{debug, info, warn};

use crate::{CacheEntry, CacheError, Fingerprint};

/// Subdirectory of the cache directory holding entry files.
const ENTRIES_SUBDIR: &str = "entries";

/// File extension for entry files.
const ENTRY_EXT: &str = "rkyv";

/// The answer of a validation callback passed to [`ArtifactCache::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The stored unit is returned as-is; nothing is written.
    Reuse,
    /// The stored unit is returned with these diagnostics, and the
    /// dependency stamps they were computed against, and written back.
    Patch {
        diagnostics: Diagnostics,
        dependencies: Dependencies,
    },
    /// This unit replaces whatever was stored.
    Replace(CompiledUnit),
}

/// Stores compiled units by fingerprint.
///
/// Without a cache directory the store is purely in memory. With one, every
/// write goes through to disk and lookups that miss in memory fall back to
/// the entry file.
pub struct ArtifactCache {
    /// Directory where entry files are stored.
    cache_dir: Option<PathBuf>,
    /// In-memory cache entries.
    entries: HashMap<String, CacheEntry>,
}

impl ArtifactCache {
    /// Creates a cache persisted under `cache_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: Some(cache_dir.into()),
            entries: HashMap::new(),
        }
    }

    /// Creates a cache that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            cache_dir: None,
            entries: HashMap::new(),
        }
    }

    /// Returns the bound cache directory.
    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// Rebinds the cache to another directory.
    ///
    /// Returns `false` and does nothing when `dir` is already bound. Otherwise
    /// in-memory entries are dropped, since they belong to the old directory.
    pub fn set_cache_dir(&mut self, dir: impl Into<PathBuf>) -> bool {
        let dir = dir.into();
        if self.cache_dir.as_deref() == Some(dir.as_path()) {
            return false;
        }

        info!("Binding artifact cache to {}", dir.display());
        self.cache_dir = Some(dir);
        self.entries.clear();
        true
    }

    /// Looks up `fingerprint` and lets `validate` decide what to return.
    ///
    /// `validate` receives the stored unit, or `None` on a miss, in which case
    /// it must answer [`Validation::Replace`]. Errors from `validate` are
    /// returned unchanged and leave the cache untouched.
    pub fn get<E, F>(&mut self, fingerprint: &Fingerprint, validate: F) -> Result<CompiledUnit, E>
    where
        F: FnOnce(Option<&CompiledUnit>) -> Result<Validation, E>,
        E: From<CacheError>,
    {
        let key = fingerprint.key();
        if !self.entries.contains_key(key)
            && let Some(entry) = self.load_entry(fingerprint)
        {
            self.entries.insert(key.to_string(), entry);
        }

        let cached = self.entries.get(key).map(|entry| &entry.unit);
        let hit = cached.is_some();

        match validate(cached)? {
            Validation::Reuse => match self.entries.get(key) {
                Some(entry) => {
                    debug!("Reusing cached unit {} ({})", entry.unit.path, key);
                    Ok(entry.unit.clone())
                }
                None => Err(CacheError::protocol("cannot reuse on a cache miss").into()),
            },
            Validation::Patch {
                diagnostics,
                dependencies,
            } => {
                let patched = match self.entries.get(key) {
                    Some(entry) => entry.unit.patched(diagnostics, dependencies),
                    None => {
                        return Err(CacheError::protocol("cannot patch on a cache miss").into());
                    }
                };
                debug!("Patched diagnostics of {} ({})", patched.path, key);
                self.store(fingerprint, patched.clone());
                Ok(patched)
            }
            Validation::Replace(unit) => {
                debug!(
                    "{} cached unit {} ({})",
                    if hit { "Replacing" } else { "Storing" },
                    unit.path,
                    key
                );
                self.store(fingerprint, unit.clone());
                Ok(unit)
            }
        }
    }

    /// Stores `unit` under `fingerprint` without looking anything up.
    pub fn save(&mut self, fingerprint: &Fingerprint, unit: CompiledUnit) {
        self.store(fingerprint, unit);
    }

    /// Returns true if an entry for `fingerprint` is in memory or on disk.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint.key())
            || self
                .entry_path(fingerprint.key())
                .is_some_and(|path| path.is_file())
    }

    /// Drops all in-memory entries. Entry files are left alone.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the number of in-memory entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entry is held in memory.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| {
            dir.join(ENTRIES_SUBDIR)
                .join(format!("{}.{}", key, ENTRY_EXT))
        })
    }

    fn store(&mut self, fingerprint: &Fingerprint, unit: CompiledUnit) {
        let entry = CacheEntry::new(fingerprint, unit);
        if let Err(e) = self.write_entry(&entry) {
            warn!("Failed to write cache entry {}: {}", entry.fingerprint, e);
        }
        self.entries.insert(entry.fingerprint.clone(), entry);
    }

    fn write_entry(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let Some(path) = self.entry_path(&entry.fingerprint) else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(entry)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        fs::write(&path, bytes.as_slice())?;
        Ok(())
    }

    /// Loads an entry file. Any failure is logged and reported as a miss.
    fn load_entry(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let path = self.entry_path(fingerprint.key())?;
        if !path.is_file() {
            return None;
        }

        match Self::read_entry(&path, fingerprint) {
            Ok(entry) => {
                debug!("Loaded cache entry from {}", path.display());
                Some(entry)
            }
            Err(e) => {
                warn!("Ignoring cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    fn read_entry(path: &Path, fingerprint: &Fingerprint) -> Result<CacheEntry, CacheError> {
        let content = fs::read(path)?;
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(content.len());
        aligned.extend_from_slice(&content);

        let entry = rkyv::from_bytes::<CacheEntry, rkyv::rancor::Error>(&aligned)
            .map_err(|e| CacheError::corrupted(e.to_string()))?;

        if !entry.is_valid(fingerprint) {
            return Err(CacheError::KeyMismatch {
                expected: fingerprint.key().to_string(),
                found: entry.fingerprint,
            });
        }
        Ok(entry)
    }
}

impl Default for ArtifactCache {
    fn default() -> Self {
        Self::in_memory()
    }
}
