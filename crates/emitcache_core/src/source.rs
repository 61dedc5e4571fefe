//! Source providers.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Maximum file size read by [`FsSource`] (10 MB).
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Supplies the current content of a path.
///
/// A provider is handed to a build once and never mutated through it.
/// Returning `None` means the path has no content right now.
pub trait SourceProvider: Send + Sync {
    fn content(&self, path: &str) -> Option<String>;
}

impl<F> SourceProvider for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn content(&self, path: &str) -> Option<String> {
        self(path)
    }
}

/// An in-memory source keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file.
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    /// Adds or replaces a file.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    /// Removes a file.
    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.files.remove(path)
    }

    /// Lists every path, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl SourceProvider for MemorySource {
    fn content(&self, path: &str) -> Option<String> {
        self.files.get(path).cloned()
    }
}

/// Reads sources from a directory. Paths are relative to the root.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists files under the root with one of `extensions`, relative to the
    /// root with `/` separators, sorted.
    ///
    /// Extensions are matched against the full file name, so `d.ts` matches
    /// declaration files.
    pub fn discover(&self, extensions: &[&str]) -> Vec<String> {
        let mut paths = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if !extensions
                .iter()
                .any(|ext| name.ends_with(&format!(".{}", ext)))
            {
                continue;
            }

            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                let relative: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                paths.push(relative.join("/"));
            }
        }

        paths.sort();
        debug!("Discovered {} files under {}", paths.len(), self.root.display());
        paths
    }
}

impl SourceProvider for FsSource {
    fn content(&self, path: &str) -> Option<String> {
        let full = self.root.join(path);
        let metadata = fs::metadata(&full).ok()?;
        if !metadata.is_file() {
            return None;
        }
        if metadata.len() > MAX_FILE_SIZE {
            warn!(
                "Skipping {}: file size {} exceeds limit of {} bytes",
                full.display(),
                metadata.len(),
                MAX_FILE_SIZE
            );
            return None;
        }

        match fs::read_to_string(&full) {
            Ok(content) => Some(content),
            Err(e) => {
                warn!("Failed to read {}: {}", full.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_memory_source() {
        let mut source = MemorySource::new().with_file("a.ts", "export const a = 1;");
        assert_eq!(source.content("a.ts").as_deref(), Some("export const a = 1;"));
        assert_eq!(source.content("b.ts"), None);

        source.insert("b.ts", "const b = 2;");
        assert_eq!(source.paths(), vec!["a.ts", "b.ts"]);

        source.remove("a.ts");
        assert_eq!(source.content("a.ts"), None);
    }

    #[test]
    fn test_closure_source() {
        let source = |path: &str| (path == "a.ts").then(|| "x".to_string());
        assert_eq!(SourceProvider::content(&source, "a.ts").as_deref(), Some("x"));
        assert_eq!(SourceProvider::content(&source, "b.ts"), None);
    }

    #[test]
    fn test_fs_source_reads_relative_paths() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.ts"), "export const a = 1;").unwrap();

        let source = FsSource::new(dir.path());
        assert_eq!(
            source.content("src/a.ts").as_deref(),
            Some("export const a = 1;")
        );
        assert_eq!(source.content("src/missing.ts"), None);
        assert_eq!(source.content("src"), None);
    }

    #[test]
    fn test_fs_source_discover() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::create_dir_all(dir.path().join("typings")).unwrap();
        fs::write(dir.path().join("src/b.ts"), "").unwrap();
        fs::write(dir.path().join("src/nested/a.tsx"), "").unwrap();
        fs::write(dir.path().join("typings/globals.d.ts"), "").unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();

        let source = FsSource::new(dir.path());
        assert_eq!(
            source.discover(&["ts", "tsx"]),
            vec!["src/b.ts", "src/nested/a.tsx", "typings/globals.d.ts"]
        );
        assert_eq!(source.discover(&["d.ts"]), vec!["typings/globals.d.ts"]);
        assert!(source.discover(&["js"]).is_empty());
    }
}
