//! Per-path content versions.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use emitcache_cache::hash_content;
use emitcache_unit::Stamp;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Last observed content hash of a path and the version assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub content_hash: String,
    pub version: u64,
}

/// Assigns monotonically increasing versions to paths.
///
/// A path's version starts at 1 and increases by one each time its content
/// hash differs from the last observed hash.
#[derive(Debug, Default)]
pub struct VersionTracker {
    records: BTreeMap<String, VersionRecord>,
    dirty: bool,
}

#[derive(Serialize, Deserialize)]
struct VersionTable {
    records: BTreeMap<String, VersionRecord>,
}

impl VersionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the version of `path` for `content`, bumping it if the
    /// content changed since it was last observed.
    pub fn version(&mut self, path: &str, content: &str) -> u64 {
        self.stamp(path, content).version
    }

    /// Same as [`version`](Self::version), returning the content hash too.
    pub fn stamp(&mut self, path: &str, content: &str) -> Stamp {
        let hash = hash_content(content);

        match self.records.get_mut(path) {
            Some(record) if record.content_hash == hash => {}
            Some(record) => {
                record.version += 1;
                record.content_hash = hash;
                self.dirty = true;
            }
            None => {
                self.records.insert(
                    path.to_string(),
                    VersionRecord {
                        content_hash: hash,
                        version: 1,
                    },
                );
                self.dirty = true;
            }
        }

        let record = &self.records[path];
        Stamp::new(record.version, record.content_hash.clone())
    }

    /// Returns the last recorded stamp of `path` without observing content.
    pub fn current(&self, path: &str) -> Option<Stamp> {
        self.records
            .get(path)
            .map(|r| Stamp::new(r.version, r.content_hash.clone()))
    }

    /// Returns true if records changed since the last load or save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of tracked paths.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Loads a version table, starting empty if it is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::new();
        }

        let table = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                serde_json::from_str::<VersionTable>(&json).map_err(|e| e.to_string())
            });

        match table {
            Ok(table) => {
                info!(
                    "Loaded {} version records from {}",
                    table.records.len(),
                    path.display()
                );
                Self {
                    records: table.records,
                    dirty: false,
                }
            }
            Err(e) => {
                warn!("Ignoring version table {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    /// Writes the version table to `path`.
    pub fn save(&mut self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let table = VersionTable {
            records: self.records.clone(),
        };
        let json = serde_json::to_string_pretty(&table).map_err(std::io::Error::other)?;
        fs::write(path, json)?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_first_sight_is_version_one() {
        let mut tracker = VersionTracker::new();
        assert_eq!(tracker.version("a.ts", "x"), 1);
        assert_eq!(tracker.version("b.ts", "x"), 1);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_same_content_keeps_version() {
        let mut tracker = VersionTracker::new();
        assert_eq!(tracker.version("a.ts", "x"), 1);
        assert_eq!(tracker.version("a.ts", "x"), 1);
    }

    #[test]
    fn test_changed_content_bumps_version() {
        let mut tracker = VersionTracker::new();
        assert_eq!(tracker.version("a.ts", "x"), 1);
        assert_eq!(tracker.version("a.ts", "y"), 2);
        assert_eq!(tracker.version("a.ts", "y"), 2);
        // Reverting is still a change.
        assert_eq!(tracker.version("a.ts", "x"), 3);
    }

    #[test]
    fn test_current() {
        let mut tracker = VersionTracker::new();
        assert_eq!(tracker.current("a.ts"), None);

        let stamp = tracker.stamp("a.ts", "x");
        assert_eq!(tracker.current("a.ts"), Some(stamp.clone()));
        assert_eq!(stamp.content_hash, hash_content("x"));
    }

    #[test]
    fn test_dirty_flag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("versions/os.json");

        let mut tracker = VersionTracker::new();
        assert!(!tracker.is_dirty());
        tracker.version("a.ts", "x");
        assert!(tracker.is_dirty());

        tracker.save(&path).unwrap();
        assert!(!tracker.is_dirty());

        tracker.version("a.ts", "x");
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("versions/os.json");

        let mut tracker = VersionTracker::new();
        tracker.version("a.ts", "x");
        tracker.version("a.ts", "y");
        tracker.save(&path).unwrap();

        let mut loaded = VersionTracker::load(&path);
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.version("a.ts", "y"), 2);
        assert_eq!(loaded.version("a.ts", "z"), 3);
    }

    #[test]
    fn test_load_missing_or_corrupted() {
        let dir = tempdir().unwrap();
        assert!(VersionTracker::load(&dir.path().join("missing.json")).is_empty());

        let path = dir.path().join("bad.json");
        fs::write(&path, "not json").unwrap();
        assert!(VersionTracker::load(&path).is_empty());
    }
}
