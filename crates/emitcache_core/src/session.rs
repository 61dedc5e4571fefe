//! Per-architecture engine registry and the shared artifact cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use emitcache_cache::ArtifactCache;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    Build, BuildError, CompileOptions, CompilerEngine, DependencyGraph, EngineFactory,
    SourceProvider, VersionTracker, default_cache_dir,
};

/// Subdirectory of the cache directory holding version tables.
const VERSIONS_SUBDIR: &str = "versions";

/// The engine and bookkeeping of one architecture.
pub(crate) struct ArchSlot<E> {
    pub(crate) engine: E,
    pub(crate) versions: VersionTracker,
    pub(crate) graph: DependencyGraph,
    versions_file: Option<PathBuf>,
    /// Registration currently loaded into the engine.
    pub(crate) active: u64,
    /// Last registration handed out.
    issued: u64,
}

impl<E> ArchSlot<E> {
    fn new(engine: E, cache_dir: Option<&Path>, arch: &str) -> Self {
        let versions_file =
            cache_dir.map(|dir| dir.join(VERSIONS_SUBDIR).join(format!("{}.json", arch)));
        let versions = versions_file
            .as_deref()
            .map(VersionTracker::load)
            .unwrap_or_default();

        Self {
            engine,
            versions,
            graph: DependencyGraph::new(),
            versions_file,
            active: 0,
            issued: 0,
        }
    }

    /// Writes the version table if it changed. Failures are logged.
    pub(crate) fn persist(&mut self) {
        if !self.versions.is_dirty() {
            return;
        }
        if let Some(path) = &self.versions_file
            && let Err(e) = self.versions.save(path)
        {
            warn!("Failed to save version table {}: {}", path.display(), e);
        }
    }
}

/// Owns one compiler engine per architecture and the artifact cache they
/// share.
///
/// Builds for different architectures never share engines or version
/// tables; they do share cache entries, since fingerprints do not depend on
/// the architecture.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use emitcache_core::{CompileOptions, MemorySource, Session};
///
/// let mut session = Session::with_cache_dir(MyEngine::new, ".emitcache");
/// let source = MemorySource::new().with_file("a.ts", "export const a = 1;");
/// let build = session.build(&source.paths(), Arc::new(source), CompileOptions::new())?;
/// let unit = build.emit("a.ts", None)?;
/// ```
pub struct Session<F: EngineFactory> {
    factory: F,
    cache: Arc<Mutex<ArtifactCache>>,
    slots: HashMap<String, Arc<Mutex<ArchSlot<F::Engine>>>>,
}

impl<F: EngineFactory> Session<F> {
    /// Creates a session whose cache lives in memory only.
    pub fn new(factory: F) -> Self {
        Self::from_cache(factory, ArtifactCache::in_memory())
    }

    /// Creates a session persisting entries and version tables under `dir`.
    pub fn with_cache_dir(factory: F, dir: impl Into<PathBuf>) -> Self {
        Self::from_cache(factory, ArtifactCache::new(dir))
    }

    /// Creates a session persisting under [`default_cache_dir`].
    pub fn with_default_cache_dir(factory: F) -> Self {
        Self::with_cache_dir(factory, default_cache_dir())
    }

    fn from_cache(factory: F, cache: ArtifactCache) -> Self {
        Self {
            factory,
            cache: Arc::new(Mutex::new(cache)),
            slots: HashMap::new(),
        }
    }

    /// Returns the bound cache directory.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache.lock().cache_dir().map(Path::to_path_buf)
    }

    /// Rebinds the persistent store to `dir`.
    ///
    /// Returns `false` and changes nothing if `dir` is already bound.
    /// Otherwise engines and version tables are dropped and recreated on the
    /// next build; builds created before keep working with their old state.
    pub fn set_cache_directory(&mut self, dir: impl Into<PathBuf>) -> bool {
        if !self.cache.lock().set_cache_dir(dir) {
            return false;
        }
        debug!("Dropping {} architecture slots", self.slots.len());
        self.slots.clear();
        true
    }

    /// Registers a working set and returns the build that emits from it.
    ///
    /// Options are validated before anything is registered. Paths matching
    /// an `exclude` pattern are left out of the working set.
    pub fn build(
        &mut self,
        paths: &[String],
        source: Arc<dyn SourceProvider>,
        options: CompileOptions,
    ) -> Result<Build<F::Engine>, BuildError> {
        options.validate()?;
        let excluded = options.exclude_globs()?;

        let mut files: Vec<String> = paths
            .iter()
            .filter(|path| {
                excluded
                    .as_ref()
                    .is_none_or(|globs| !globs.is_match(path.as_str()))
            })
            .cloned()
            .collect();
        files.sort();
        files.dedup();

        if files.len() < paths.len() {
            debug!("Excluded {} paths from the build", paths.len() - files.len());
        }

        let slot = self.slot(&options.arch);
        let registration = {
            let mut guard = slot.lock();
            guard.issued += 1;
            guard.active = guard.issued;
            guard.engine.set_files(&files, Arc::clone(&source), &options);
            guard.active
        };

        info!(
            "Registered {} files for architecture '{}'",
            files.len(),
            options.arch
        );

        Ok(Build::new(
            files,
            source,
            options,
            Arc::clone(&self.cache),
            slot,
            registration,
        ))
    }

    fn slot(&mut self, arch: &str) -> Arc<Mutex<ArchSlot<F::Engine>>> {
        if let Some(slot) = self.slots.get(arch) {
            return Arc::clone(slot);
        }

        debug!("Creating engine for architecture '{}'", arch);
        let cache_dir = self.cache_dir();
        let slot = Arc::new(Mutex::new(ArchSlot::new(
            self.factory.create(arch),
            cache_dir.as_deref(),
            arch,
        )));
        self.slots.insert(arch.to_string(), Arc::clone(&slot));
        slot
    }

    /// Architectures with a live engine, sorted.
    pub fn architectures(&self) -> Vec<String> {
        let mut archs: Vec<String> = self.slots.keys().cloned().collect();
        archs.sort();
        archs
    }

    /// Runs `f` against the engine of `arch`, if one exists.
    pub fn with_engine<R>(&self, arch: &str, f: impl FnOnce(&F::Engine) -> R) -> Option<R> {
        self.slots.get(arch).map(|slot| f(&slot.lock().engine))
    }

    /// Runs `f` against the artifact cache.
    pub fn with_cache<R>(&self, f: impl FnOnce(&mut ArtifactCache) -> R) -> R {
        f(&mut self.cache.lock())
    }
}

impl<E: CompilerEngine> ArchSlot<E> {
    /// Loads a build's working set into the engine unless it is already there.
    pub(crate) fn activate(
        &mut self,
        registration: u64,
        files: &[String],
        source: &Arc<dyn SourceProvider>,
        options: &CompileOptions,
    ) {
        if self.active != registration {
            debug!("Re-registering {} files", files.len());
            self.engine.set_files(files, Arc::clone(source), options);
            self.active = registration;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySource;
    use crate::test_utils::ToyEngine;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn source() -> Arc<dyn SourceProvider> {
        Arc::new(
            MemorySource::new()
                .with_file("a.ts", "export const a = 1;")
                .with_file("a.spec.ts", "export const t = 1;"),
        )
    }

    fn paths() -> Vec<String> {
        vec!["a.ts".to_string(), "a.spec.ts".to_string()]
    }

    #[test]
    fn test_one_engine_per_architecture() {
        let mut session = Session::new(ToyEngine::new);
        session
            .build(&paths(), source(), CompileOptions::new())
            .unwrap();
        session
            .build(&paths(), source(), CompileOptions::new().with_arch("web.browser"))
            .unwrap();
        session
            .build(&paths(), source(), CompileOptions::new())
            .unwrap();

        assert_eq!(session.architectures(), vec!["os", "web.browser"]);
        assert_eq!(
            session.with_engine("web.browser", |e| e.arch().to_string()),
            Some("web.browser".to_string())
        );
        assert_eq!(session.with_engine("legacy", |e| e.compile_calls()), None);
    }

    #[test]
    fn test_invalid_options_register_nothing() {
        let mut session = Session::new(ToyEngine::new);
        let result = session.build(&paths(), source(), CompileOptions::new().with_arch("a/b"));

        assert!(matches!(result, Err(BuildError::Config(_))));
        assert!(session.architectures().is_empty());
    }

    #[test]
    fn test_excluded_paths_are_not_registered() {
        let mut session = Session::new(ToyEngine::new);
        let mut options = CompileOptions::new();
        options.exclude = vec!["**/*.spec.ts".to_string()];

        let build = session.build(&paths(), source(), options).unwrap();
        assert!(build.contains("a.ts"));
        assert!(!build.contains("a.spec.ts"));
        assert!(matches!(
            build.emit("a.spec.ts", None),
            Err(BuildError::NotFound(_))
        ));
        assert_eq!(session.with_engine("os", |e| e.has_file("a.spec.ts")), Some(false));
    }

    #[test]
    fn test_set_cache_directory() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(ToyEngine::new);
        assert_eq!(session.cache_dir(), None);

        session
            .build(&paths(), source(), CompileOptions::new())
            .unwrap();
        assert!(session.set_cache_directory(dir.path()));
        assert_eq!(session.cache_dir().as_deref(), Some(dir.path()));
        assert!(session.architectures().is_empty());

        session
            .build(&paths(), source(), CompileOptions::new())
            .unwrap();
        assert!(!session.set_cache_directory(dir.path()));
        assert_eq!(session.architectures(), vec!["os"]);
    }

    #[test]
    fn test_builds_share_an_engine() {
        let mut session = Session::new(ToyEngine::new);
        let first = session
            .build(&["a.ts".to_string()], source(), CompileOptions::new())
            .unwrap();
        let second = session
            .build(&["a.spec.ts".to_string()], source(), CompileOptions::new())
            .unwrap();

        // The first build re-registers its files with the shared engine.
        assert!(first.emit("a.ts", None).is_ok());
        assert!(second.emit("a.spec.ts", None).is_ok());
        assert_eq!(session.with_engine("os", |e| e.compile_calls()), Some(2));
    }

    #[test]
    fn test_version_table_persisted_per_architecture() {
        let dir = tempdir().unwrap();
        let mut session = Session::with_cache_dir(ToyEngine::new, dir.path());
        let build = session
            .build(&paths(), source(), CompileOptions::new().with_arch("web.browser"))
            .unwrap();
        build.emit("a.ts", None).unwrap();

        let table = dir.path().join("versions").join("web.browser.json");
        assert!(table.is_file());
        assert!(!dir.path().join("versions").join("os.json").exists());
    }
}
