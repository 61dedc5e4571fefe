//! The compiled unit and its dependency record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Diagnostics;

/// Version and content hash of a path at the moment it was observed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(
    feature = "rkyv",
    derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)
)]
pub struct Stamp {
    /// Version assigned by the version tracker.
    pub version: u64,

    /// Hash of the content the version was assigned for.
    pub content_hash: String,
}

impl Stamp {
    /// Creates a new stamp.
    pub fn new(version: u64, content_hash: impl Into<String>) -> Self {
        Self {
            version,
            content_hash: content_hash.into(),
        }
    }
}

/// The paths a compiled unit depended on, stamped at compile time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "rkyv",
    derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)
)]
pub struct Dependencies {
    /// Structural references (`/// <reference path>`), part of the same compilation.
    #[serde(default)]
    pub ref_files: BTreeMap<String, Stamp>,

    /// Imported modules, transitively flattened by the engine.
    #[serde(default)]
    pub modules: BTreeMap<String, Stamp>,

    /// Ambient typings files in effect, or `None` if typings were not consulted.
    #[serde(default)]
    pub typings: Option<BTreeMap<String, Stamp>>,
}

impl Dependencies {
    /// Returns true if ambient typings were consulted.
    pub fn uses_typings(&self) -> bool {
        self.typings.is_some()
    }

    /// Iterates over every recorded path, typings first.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.typings
            .iter()
            .flat_map(|t| t.keys())
            .chain(self.ref_files.keys())
            .chain(self.modules.keys())
            .map(String::as_str)
    }

    /// Returns true if no dependency of any kind was recorded.
    pub fn is_empty(&self) -> bool {
        self.ref_files.is_empty() && self.modules.is_empty() && self.typings.is_none()
    }
}

/// The cached artifact for one source path at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "rkyv",
    derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)
)]
pub struct CompiledUnit {
    /// Identifier of the source unit.
    pub path: String,

    /// Version of the source content this unit was compiled from.
    pub version: u64,

    /// Emitted code; absent for declaration-only or empty input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emitted_code: Option<String>,

    /// Syntactic and semantic diagnostics.
    #[serde(default)]
    pub diagnostics: Diagnostics,

    /// What the unit depended on when it was compiled.
    #[serde(default)]
    pub dependencies: Dependencies,
}

impl CompiledUnit {
    /// Creates an empty unit for `path` at `version`.
    pub fn new(path: impl Into<String>, version: u64) -> Self {
        Self {
            path: path.into(),
            version,
            emitted_code: None,
            diagnostics: Diagnostics::default(),
            dependencies: Dependencies::default(),
        }
    }

    /// Sets the emitted code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.emitted_code = Some(code.into());
        self
    }

    /// Sets the diagnostics.
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Sets the dependency record.
    pub fn with_dependencies(mut self, dependencies: Dependencies) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Returns a copy with refreshed diagnostics and the dependency stamps
    /// they were computed against. Code, path and version are kept.
    pub fn patched(&self, diagnostics: Diagnostics, dependencies: Dependencies) -> Self {
        Self {
            diagnostics,
            dependencies,
            ..self.clone()
        }
    }
}
