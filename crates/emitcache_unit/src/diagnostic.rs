//! Diagnostic types produced by the compiler engine.

use serde::{Deserialize, Serialize};

use crate::{Location, Span};

/// Severity level for diagnostics.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[cfg_attr(
    feature = "rkyv",
    derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error - the program is invalid.
    #[default]
    Error,
    /// Warning - should be reviewed.
    Warning,
}

/// A single error or warning reported for a source unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(
    feature = "rkyv",
    derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)
)]
pub struct Diagnostic {
    /// Numeric diagnostic code assigned by the engine.
    pub code: u32,

    /// The diagnostic message.
    pub message: String,

    /// Byte span in the source.
    pub span: Span,

    /// Line/column location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,

    /// Severity level.
    #[serde(default)]
    pub severity: Severity,

    /// Set when the diagnostic reports an import that could not be resolved.
    ///
    /// Such a condition may clear up without the unit itself changing, so a
    /// cached unit carrying it always gets its diagnostics refreshed.
    #[serde(default)]
    pub unresolved_module: bool,
}

impl Diagnostic {
    /// Creates a new error diagnostic.
    pub fn new(code: u32, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            span,
            loc: None,
            severity: Severity::Error,
            unresolved_module: false,
        }
    }

    /// Sets the severity level.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the location.
    pub fn with_location(mut self, loc: Location) -> Self {
        self.loc = Some(loc);
        self
    }

    /// Marks this diagnostic as an unresolved module import.
    pub fn unresolved_module(mut self) -> Self {
        self.unresolved_module = true;
        self
    }

    /// Returns true if this is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Syntactic and semantic diagnostics of one unit, in engine order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "rkyv",
    derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)
)]
pub struct Diagnostics {
    /// Parse-level diagnostics.
    #[serde(default)]
    pub syntactic: Vec<Diagnostic>,

    /// Type-level diagnostics.
    #[serde(default)]
    pub semantic: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates a diagnostics pair.
    pub fn new(syntactic: Vec<Diagnostic>, semantic: Vec<Diagnostic>) -> Self {
        Self {
            syntactic,
            semantic,
        }
    }

    /// Returns true if any semantic diagnostic flags an unresolved module.
    pub fn has_unresolved_module(&self) -> bool {
        self.semantic.iter().any(|d| d.unresolved_module)
    }

    /// Number of error-level diagnostics across both lists.
    pub fn error_count(&self) -> usize {
        self.syntactic
            .iter()
            .chain(&self.semantic)
            .filter(|d| d.is_error())
            .count()
    }

    /// Returns true if both lists are empty.
    pub fn is_empty(&self) -> bool {
        self.syntactic.is_empty() && self.semantic.is_empty()
    }
}
