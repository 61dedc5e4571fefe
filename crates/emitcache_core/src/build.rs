//! Emitting units of a registered working set.

use std::sync::Arc;

use emitcache_cache::{ArtifactCache, Fingerprint, Validation};
use emitcache_unit::CompiledUnit;
use parking_lot::Mutex;
use tracing::debug;

use crate::session::ArchSlot;
use crate::staleness::{Action, StalenessClassifier, decide};
use crate::{
    BuildError, CompileOptions, CompilerEngine, DependencyGraph, EmitOptions, SourceProvider,
};

/// How an emitted unit was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Caching is disabled; compiled and saved unconditionally.
    Uncached,
    /// Nothing was cached; compiled and stored.
    Miss,
    /// The cached unit was returned as-is.
    Reuse,
    /// The cached unit was returned with refreshed diagnostics.
    Patched,
    /// The cached unit was stale and has been recompiled.
    Recompiled,
}

/// An emitted unit together with how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub unit: CompiledUnit,
    pub outcome: Outcome,
}

/// A registered working set.
///
/// Created by [`Session::build`](crate::Session::build). Emits are expected
/// to be issued sequentially.
pub struct Build<E> {
    files: Vec<String>,
    source: Arc<dyn SourceProvider>,
    options: CompileOptions,
    emit_options: EmitOptions,
    cache: Arc<Mutex<ArtifactCache>>,
    slot: Arc<Mutex<ArchSlot<E>>>,
    registration: u64,
}

impl<E: CompilerEngine> Build<E> {
    pub(crate) fn new(
        files: Vec<String>,
        source: Arc<dyn SourceProvider>,
        options: CompileOptions,
        cache: Arc<Mutex<ArtifactCache>>,
        slot: Arc<Mutex<ArchSlot<E>>>,
        registration: u64,
    ) -> Self {
        let emit_options = options.emit_options();
        Self {
            files,
            source,
            options,
            emit_options,
            cache,
            slot,
            registration,
        }
    }

    /// The registered paths, sorted.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Returns true if `path` is in the working set.
    pub fn contains(&self, path: &str) -> bool {
        self.files
            .binary_search_by(|file| file.as_str().cmp(path))
            .is_ok()
    }

    /// Emits `path`, reusing cached work where it is still valid.
    pub fn emit(&self, path: &str, module_name: Option<&str>) -> Result<CompiledUnit, BuildError> {
        self.emit_traced(path, module_name).map(|emission| emission.unit)
    }

    /// Same as [`emit`](Self::emit), also reporting how the unit was obtained.
    pub fn emit_traced(
        &self,
        path: &str,
        module_name: Option<&str>,
    ) -> Result<Emission, BuildError> {
        if !self.contains(path) {
            return Err(BuildError::not_found(path));
        }
        let content = self
            .source
            .content(path)
            .ok_or_else(|| BuildError::not_found(path))?;
        let fingerprint = Fingerprint::compute(&content, &self.emit_options, module_name)?;

        let mut guard = self.slot.lock();
        let slot = &mut *guard;
        slot.activate(self.registration, &self.files, &self.source, &self.options);
        let version = slot.versions.version(path, &content);

        let mut emission = if self.options.use_cache {
            self.emit_cached(slot, path, version, module_name, &fingerprint)?
        } else {
            let unit = self.compile(slot, path, version, module_name)?;
            self.cache.lock().save(&fingerprint, unit.clone());
            Emission {
                unit,
                outcome: Outcome::Uncached,
            }
        };

        // Entries are shared across architectures and survive restarts, so
        // the stored version may come from another tracker.
        emission.unit.version = version;
        slot.persist();

        debug!("Emitted {} v{} ({:?}, {})", path, version, emission.outcome, fingerprint);
        Ok(emission)
    }

    fn emit_cached(
        &self,
        slot: &mut ArchSlot<E>,
        path: &str,
        version: u64,
        module_name: Option<&str>,
        fingerprint: &Fingerprint,
    ) -> Result<Emission, BuildError> {
        let mut outcome = Outcome::Reuse;
        let mut cache = self.cache.lock();

        let unit = cache.get(
            fingerprint,
            |cached: Option<&CompiledUnit>| -> Result<Validation, BuildError> {
                let Some(cached) = cached else {
                    outcome = Outcome::Miss;
                    let unit = self.compile(slot, path, version, module_name)?;
                    return Ok(Validation::Replace(unit));
                };

                let staleness = StalenessClassifier::new(
                    &mut slot.versions,
                    &*self.source,
                    &self.options.types,
                )
                .classify(&cached.dependencies);

                match decide(staleness, cached) {
                    Action::Reuse => Ok(Validation::Reuse),
                    Action::RefreshDiagnostics => {
                        debug!("Refreshing diagnostics of {} ({:?})", path, staleness);
                        outcome = Outcome::Patched;
                        let report = slot.engine.diagnostics(path)?;
                        let dependencies = DependencyGraph::stamp(
                            &report.references,
                            &mut slot.versions,
                            &*self.source,
                        );
                        slot.graph.record(path, dependencies.clone());
                        Ok(Validation::Patch {
                            diagnostics: report.diagnostics,
                            dependencies,
                        })
                    }
                    Action::Recompile => {
                        debug!("Recompiling {} ({:?})", path, staleness);
                        outcome = Outcome::Recompiled;
                        let unit = self.compile(slot, path, version, module_name)?;
                        Ok(Validation::Replace(unit))
                    }
                }
            },
        )?;

        Ok(Emission { unit, outcome })
    }

    /// Runs a full compile and records what the unit depended on.
    fn compile(
        &self,
        slot: &mut ArchSlot<E>,
        path: &str,
        version: u64,
        module_name: Option<&str>,
    ) -> Result<CompiledUnit, BuildError> {
        let output = slot.engine.compile(path, module_name)?;
        let dependencies =
            DependencyGraph::stamp(&output.references, &mut slot.versions, &*self.source);
        slot.graph.record(path, dependencies.clone());

        let mut unit = CompiledUnit::new(path, version)
            .with_diagnostics(output.diagnostics)
            .with_dependencies(dependencies);
        unit.emitted_code = output.code;
        Ok(unit)
    }
}
