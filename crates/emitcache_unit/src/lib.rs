//! # emitcache_unit
//!
//! Data model shared by the emitcache crates.
//!
//! A [`CompiledUnit`] is the artifact produced by the compiler engine for one
//! source path: emitted code, syntactic and semantic [`Diagnostics`], and the
//! [`Dependencies`] that decide when the artifact goes stale.
//!
//! ## Example
//!
//! ```rust
//! use emitcache_unit::{CompiledUnit, Dependencies, Diagnostics};
//!
//! let unit = CompiledUnit::new("a.ts", 1)
//!     .with_code("exports.foo = 'foo';")
//!     .with_diagnostics(Diagnostics::default())
//!     .with_dependencies(Dependencies::default());
//!
//! assert_eq!(unit.version, 1);
//! assert!(!unit.diagnostics.has_unresolved_module());
//! ```

mod diagnostic;
mod span;
mod unit;

pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use span::{Location, Position, Span};
pub use unit::{CompiledUnit, Dependencies, Stamp};
