//! Dependency bookkeeping for compiled units.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use emitcache_unit::{Dependencies, Stamp};

use crate::{References, SourceProvider, VersionTracker};

/// Stamp given to a dependency that has no content.
pub fn missing_stamp() -> Stamp {
    Stamp::new(0, "")
}

/// Observes the current stamp of `path`.
///
/// Observing goes through the tracker, so a changed dependency gets its
/// version bumped here.
pub fn observe(path: &str, tracker: &mut VersionTracker, source: &dyn SourceProvider) -> Stamp {
    match source.content(path) {
        Some(content) => tracker.stamp(path, &content),
        None => missing_stamp(),
    }
}

/// Returns the recorded paths whose content differs from what was recorded.
///
/// Stamps are compared by content hash; versions from different trackers are
/// not comparable.
pub fn stale_paths(
    recorded: &BTreeMap<String, Stamp>,
    tracker: &mut VersionTracker,
    source: &dyn SourceProvider,
) -> Vec<String> {
    recorded
        .iter()
        .filter(|(path, stamp)| observe(path, tracker, source).content_hash != stamp.content_hash)
        .map(|(path, _)| path.clone())
        .collect()
}

/// Returns true if the ambient typings in effect differ from `recorded`.
///
/// A unit compiled without typings is stale once any root is configured. A
/// unit compiled with typings is stale if a root is not among its recorded
/// files or any recorded file changed.
pub fn typings_changed(
    recorded: Option<&BTreeMap<String, Stamp>>,
    roots: &[String],
    tracker: &mut VersionTracker,
    source: &dyn SourceProvider,
) -> bool {
    match recorded {
        None => !roots.is_empty(),
        Some(files) => {
            roots.iter().any(|root| !files.contains_key(root))
                || !stale_paths(files, tracker, source).is_empty()
        }
    }
}

/// Tracks which paths each compiled unit depends on.
///
/// The graph trusts the engine's module sets, which are already flattened
/// through re-exports, and computes no transitivity of its own.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Latest dependencies per unit path.
    by_unit: HashMap<String, Dependencies>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps every path the engine reported.
    pub fn stamp(
        references: &References,
        tracker: &mut VersionTracker,
        source: &dyn SourceProvider,
    ) -> Dependencies {
        let mut stamp_all = |paths: &BTreeSet<String>| -> BTreeMap<String, Stamp> {
            paths
                .iter()
                .map(|path| (path.clone(), observe(path, tracker, source)))
                .collect()
        };

        Dependencies {
            ref_files: stamp_all(&references.ref_files),
            modules: stamp_all(&references.modules),
            typings: references.typings.as_ref().map(&mut stamp_all),
        }
    }

    /// Records the latest dependencies of `path`, replacing any earlier record.
    pub fn record(&mut self, path: &str, dependencies: Dependencies) {
        self.by_unit.insert(path.to_string(), dependencies);
    }

    /// Returns the latest dependencies recorded for `path`.
    pub fn dependencies_of(&self, path: &str) -> Option<&Dependencies> {
        self.by_unit.get(path)
    }

    /// Returns the units whose latest record mentions `path`, sorted.
    pub fn dependents_of(&self, path: &str) -> Vec<String> {
        let mut dependents: Vec<String> = self
            .by_unit
            .iter()
            .filter(|(_, deps)| deps.paths().any(|p| p == path))
            .map(|(unit, _)| unit.clone())
            .collect();
        dependents.sort();
        dependents
    }

    /// Number of units with a record.
    pub fn len(&self) -> usize {
        self.by_unit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_unit.is_empty()
    }
}
