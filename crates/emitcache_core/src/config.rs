//! Compile options.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use globset::{Glob, GlobSet, GlobSetBuilder};
use jsonschema::Validator;
use serde::{Deserialize, Serialize};

use crate::BuildError;

// Embed the schema
const SCHEMA_JSON: &str = include_str!("../../../schemas/v1/options.json");
static OPTIONS_SCHEMA: OnceLock<Result<Validator, String>> = OnceLock::new();

/// Environment variable overriding the default cache directory.
pub const CACHE_DIR_ENV: &str = "EMITCACHE_DIR";

/// Language level of the emitted code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Es5,
    Es2015,
    #[default]
    Es2017,
    Es2020,
    EsNext,
}

/// Module system of the emitted code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    #[default]
    CommonJs,
    EsNext,
    None,
}

/// JSX handling. Enabling it switches snippets to the `.tsx` flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Jsx {
    Preserve,
    React,
}

/// Options of one build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Language level of the emitted code.
    #[serde(default)]
    pub target: Target,

    /// Module system of the emitted code.
    #[serde(default)]
    pub module: ModuleKind,

    /// JSX handling, if enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsx: Option<Jsx>,

    /// Whether strict checks are on.
    #[serde(default)]
    pub strict: bool,

    /// Whether declaration output is requested.
    #[serde(default)]
    pub declaration: bool,

    /// Whether source maps are requested.
    #[serde(default)]
    pub source_map: bool,

    /// Root ambient typings files.
    #[serde(default)]
    pub types: Vec<String>,

    /// Glob patterns removed from the working set.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Target architecture. Each architecture gets its own engine and
    /// version table.
    #[serde(default = "default_arch")]
    pub arch: String,

    /// Whether cached results may be reused.
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

fn default_arch() -> String {
    "os".to_string()
}

fn default_use_cache() -> bool {
    true
}

/// The options that affect emitted code and diagnostics.
///
/// This is the options input of a unit's fingerprint; architecture, caching
/// and exclusion patterns are left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmitOptions {
    pub target: Target,
    pub module: ModuleKind,
    pub jsx: Option<Jsx>,
    pub strict: bool,
    pub declaration: bool,
    pub source_map: bool,
    pub types: Vec<String>,
}

impl CompileOptions {
    /// Creates options with every default.
    pub fn new() -> Self {
        Self {
            target: Target::default(),
            module: ModuleKind::default(),
            jsx: None,
            strict: false,
            declaration: false,
            source_map: false,
            types: Vec::new(),
            exclude: Vec::new(),
            arch: default_arch(),
            use_cache: default_use_cache(),
        }
    }

    /// Sets the architecture.
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = arch.into();
        self
    }

    /// Enables or disables cache reuse.
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Sets the root typings files.
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Loads options from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| BuildError::config(format!("Failed to read options: {}", e)))?;
        Self::from_json(&content)
    }

    /// Parses options from a JSON string with schema validation.
    pub fn from_json(json: &str) -> Result<Self, BuildError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| BuildError::config(format!("Invalid JSON: {}", e)))?;

        let schema = OPTIONS_SCHEMA
            .get_or_init(|| {
                let schema_json: serde_json::Value = serde_json::from_str(SCHEMA_JSON)
                    .map_err(|e| format!("Invalid embedded options schema: {}", e))?;
                Validator::new(&schema_json)
                    .map_err(|e| format!("Invalid options schema compilation: {}", e))
            })
            .as_ref()
            .map_err(|e| BuildError::Internal(e.clone()))?;

        if let Err(e) = schema.validate(&value) {
            let error_msg = format!("{} at {}", e, e.instance_path());
            return Err(BuildError::config(format!(
                "Options validation failed: {}",
                error_msg
            )));
        }

        let options: Self = serde_json::from_value(value)
            .map_err(|e| BuildError::config(format!("Invalid options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Checks invariants the type system does not enforce.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.arch.is_empty()
            || !self
                .arch
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(BuildError::config(format!(
                "Invalid architecture name: '{}'",
                self.arch
            )));
        }
        if let Some(empty) = self.types.iter().position(String::is_empty) {
            return Err(BuildError::config(format!(
                "Empty typings path at types[{}]",
                empty
            )));
        }
        self.exclude_globs()?;
        Ok(())
    }

    /// Projects the emission-relevant subset.
    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            target: self.target,
            module: self.module,
            jsx: self.jsx,
            strict: self.strict,
            declaration: self.declaration,
            source_map: self.source_map,
            types: self.types.clone(),
        }
    }

    /// Builds the exclusion matcher, or `None` when nothing is excluded.
    pub fn exclude_globs(&self) -> Result<Option<GlobSet>, BuildError> {
        if self.exclude.is_empty() {
            return Ok(None);
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            let glob = Glob::new(pattern)
                .map_err(|e| BuildError::config(format!("Invalid glob pattern: {}", e)))?;
            builder.add(glob);
        }

        let globset = builder
            .build()
            .map_err(|e| BuildError::config(format!("Failed to build globset: {}", e)))?;

        Ok(Some(globset))
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// The cache directory used when none is configured.
///
/// `$EMITCACHE_DIR` wins; otherwise the platform cache directory joined with
/// `emitcache`, falling back to `.emitcache` in the working directory.
pub fn default_cache_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CACHE_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .map(|dir| dir.join("emitcache"))
        .unwrap_or_else(|| PathBuf::from(".emitcache"))
}
