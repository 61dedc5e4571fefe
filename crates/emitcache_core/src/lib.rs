//! # emitcache_core
//!
//! Incremental compile orchestration.
//!
//! This crate provides:
//! - The [`Session`] registry of per-architecture compiler engines
//! - [`Build`], which emits units and decides between reusing a cached unit,
//!   refreshing its diagnostics, or recompiling it
//! - Content versioning and dependency bookkeeping
//! - Option loading and validation
//!
//! The compiler itself sits behind [`CompilerEngine`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use emitcache_core::{CompileOptions, FsSource, Session};
//!
//! let source = FsSource::new("app");
//! let paths = source.discover(&["ts", "tsx"]);
//!
//! let mut session = Session::with_default_cache_dir(MyEngine::new);
//! let build = session.build(&paths, Arc::new(source), CompileOptions::from_file("emitcache.json")?)?;
//! for path in build.files() {
//!     let unit = build.emit(path, None)?;
//!     println!("{}: {} errors", unit.path, unit.diagnostics.error_count());
//! }
//! ```

mod build;
mod config;
pub mod deps;
mod engine;
mod error;
mod session;
mod snippet;
mod source;
pub mod staleness;
mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use build::{Build, Emission, Outcome};
pub use config::{
    CACHE_DIR_ENV, CompileOptions, EmitOptions, Jsx, ModuleKind, Target, default_cache_dir,
};
pub use deps::DependencyGraph;
pub use engine::{
    CompilerEngine, DiagnosticsReport, EngineError, EngineFactory, EngineOutput, References,
};
pub use error::BuildError;
pub use session::Session;
pub use snippet::{SyntaxFlavor, snippet_path};
pub use source::{FsSource, MAX_FILE_SIZE, MemorySource, SourceProvider};
pub use staleness::{Staleness, StalenessClassifier};
pub use version::{VersionRecord, VersionTracker};

pub use emitcache_cache::{ArtifactCache, Fingerprint, Validation};
pub use emitcache_unit::{CompiledUnit, Dependencies, Diagnostic, Diagnostics, Severity, Stamp};
