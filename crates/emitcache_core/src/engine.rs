//! The compiler engine boundary.
//!
//! Parsing, type checking, module resolution and emission live behind
//! [`CompilerEngine`]. The core only asks an engine to compile a unit or to
//! re-evaluate its diagnostics, and reads back which paths it touched.

use std::collections::BTreeSet;
use std::sync::Arc;

use emitcache_unit::Diagnostics;
use thiserror::Error;

use crate::{CompileOptions, SourceProvider};

/// Errors raised by a compiler engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine failed while processing a unit.
    #[error("Failed to compile {path}: {message}")]
    Failed {
        /// The unit being processed.
        path: String,
        /// Engine-provided description.
        message: String,
    },

    /// The unit is not part of the engine's working set.
    #[error("Unknown file: {0}")]
    UnknownFile(String),
}

impl EngineError {
    /// Creates a failure for `path`.
    pub fn failed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Paths an engine consulted while processing one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    /// Direct structural references.
    pub ref_files: BTreeSet<String>,

    /// Imported modules, already flattened through re-exports.
    pub modules: BTreeSet<String>,

    /// Ambient typings files reachable from the typings roots, or `None` if
    /// the unit was checked without ambient typings.
    pub typings: Option<BTreeSet<String>>,
}

/// Result of a full compile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    /// Emitted code, if the unit produces any.
    pub code: Option<String>,
    pub diagnostics: Diagnostics,
    pub references: References,
}

/// Result of a diagnostics-only pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticsReport {
    pub diagnostics: Diagnostics,
    pub references: References,
}

/// A full type-checking and emitting compiler.
///
/// One engine serves one architecture. Calls are sequential.
pub trait CompilerEngine {
    /// Registers the working set and the source it is read from.
    fn set_files(
        &mut self,
        paths: &[String],
        source: Arc<dyn SourceProvider>,
        options: &CompileOptions,
    );

    /// Returns true if `path` is in the working set.
    fn has_file(&self, path: &str) -> bool;

    /// Type-checks and emits `path` against the current source.
    fn compile(
        &mut self,
        path: &str,
        module_name: Option<&str>,
    ) -> Result<EngineOutput, EngineError>;

    /// Re-evaluates the diagnostics of `path` against the current source.
    fn diagnostics(&mut self, path: &str) -> Result<DiagnosticsReport, EngineError>;
}

/// Creates one engine per architecture.
pub trait EngineFactory {
    type Engine: CompilerEngine;

    fn create(&self, arch: &str) -> Self::Engine;
}

impl<F, E> EngineFactory for F
where
    F: Fn(&str) -> E,
    E: CompilerEngine,
{
    type Engine = E;

    fn create(&self, arch: &str) -> E {
        self(arch)
    }
}
