//! Staleness classification of cached units.

use emitcache_unit::{CompiledUnit, Dependencies};
use tracing::debug;

use crate::deps::{stale_paths, typings_changed};
use crate::{SourceProvider, VersionTracker};

/// How much of a cached unit is invalidated, from least to most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Staleness {
    /// Nothing the unit depends on changed.
    None,
    /// An imported module changed; only diagnostics can differ.
    Modules,
    /// A structurally referenced file changed; emitted code can differ.
    Files,
    /// The ambient typings changed; the whole type environment can differ.
    Typings,
}

/// What to do with a cached unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Return the cached unit unchanged.
    Reuse,
    /// Re-run diagnostics and return the cached unit with them.
    RefreshDiagnostics,
    /// Compile from scratch.
    Recompile,
}

/// Decides the action for `unit` given its staleness.
///
/// A unit whose diagnostics flagged an unresolved module is refreshed even
/// when nothing changed, since the module may exist now.
pub fn decide(staleness: Staleness, unit: &CompiledUnit) -> Action {
    match staleness {
        Staleness::Typings | Staleness::Files => Action::Recompile,
        Staleness::Modules => Action::RefreshDiagnostics,
        Staleness::None if unit.diagnostics.has_unresolved_module() => Action::RefreshDiagnostics,
        Staleness::None => Action::Reuse,
    }
}

/// Classifies dependency records against the live source.
pub struct StalenessClassifier<'a> {
    tracker: &'a mut VersionTracker,
    source: &'a dyn SourceProvider,
    typings_roots: &'a [String],
}

impl<'a> StalenessClassifier<'a> {
    pub fn new(
        tracker: &'a mut VersionTracker,
        source: &'a dyn SourceProvider,
        typings_roots: &'a [String],
    ) -> Self {
        Self {
            tracker,
            source,
            typings_roots,
        }
    }

    /// Returns the highest-priority staleness of `dependencies`.
    ///
    /// Checks run in the order typings, files, modules; the first hit wins
    /// and later checks are skipped.
    pub fn classify(&mut self, dependencies: &Dependencies) -> Staleness {
        if typings_changed(
            dependencies.typings.as_ref(),
            self.typings_roots,
            self.tracker,
            self.source,
        ) {
            debug!("Ambient typings changed");
            return Staleness::Typings;
        }

        let files = stale_paths(&dependencies.ref_files, self.tracker, self.source);
        if !files.is_empty() {
            debug!("Referenced files changed: {:?}", files);
            return Staleness::Files;
        }

        let modules = stale_paths(&dependencies.modules, self.tracker, self.source);
        if !modules.is_empty() {
            debug!("Imported modules changed: {:?}", modules);
            return Staleness::Modules;
        }

        Staleness::None
    }
}
