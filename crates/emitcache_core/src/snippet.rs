//! One-shot compiles of standalone snippets.

use std::sync::Arc;

use emitcache_cache::hash_content;
use emitcache_unit::CompiledUnit;

use crate::{BuildError, CompileOptions, EngineFactory, MemorySource, Session};

/// Source syntax of a snippet, chosen from the JSX setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxFlavor {
    Ts,
    Tsx,
}

impl SyntaxFlavor {
    pub fn for_options(options: &CompileOptions) -> Self {
        if options.jsx.is_some() {
            Self::Tsx
        } else {
            Self::Ts
        }
    }

    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Ts => "ts",
            Self::Tsx => "tsx",
        }
    }
}

/// Derives a stable path for a snippet from its content hash.
pub fn snippet_path(content: &str, options: &CompileOptions) -> String {
    format!(
        "{}.{}",
        hash_content(content),
        SyntaxFlavor::for_options(options).extension()
    )
}

impl<F: EngineFactory> Session<F> {
    /// Compiles a single piece of source as a one-file build.
    ///
    /// Without `path` the unit is named by [`snippet_path`]. Fingerprinting
    /// and staleness rules are the same as for any other build.
    pub fn compile_snippet(
        &mut self,
        content: &str,
        path: Option<&str>,
        module_name: Option<&str>,
        options: CompileOptions,
    ) -> Result<CompiledUnit, BuildError> {
        let path = match path {
            Some(path) => path.to_string(),
            None => snippet_path(content, &options),
        };
        let source = MemorySource::new().with_file(path.clone(), content);

        let build = self.build(std::slice::from_ref(&path), Arc::new(source), options)?;
        build.emit(&path, module_name)
    }
}
