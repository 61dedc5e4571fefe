//! Cache keys derived from unit content and emission options.

use std::fmt;

use serde::Serialize;

use crate::CacheError;

/// Computes the BLAKE3 hash of content as lowercase hex.
pub fn hash_content(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// Cache key for one compile request, together with its inputs.
///
/// The key covers the unit content, the canonical JSON of the
/// emission-relevant options and the module-name override. Anything not
/// passed in (target architecture, whether caching is on) does not affect it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    key: String,
    content_hash: String,
    options: String,
    module_name: Option<String>,
}

impl Fingerprint {
    /// Computes the fingerprint for `content` compiled with `options`.
    pub fn compute<O: Serialize + ?Sized>(
        content: &str,
        options: &O,
        module_name: Option<&str>,
    ) -> Result<Self, CacheError> {
        let options =
            serde_json::to_string(options).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let content_hash = hash_content(content);

        let mut hasher = blake3::Hasher::new();
        // Length prefixes keep field boundaries unambiguous.
        for field in [content_hash.as_str(), options.as_str()] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        match module_name {
            Some(name) => {
                hasher.update(&[1]);
                hasher.update(&(name.len() as u64).to_le_bytes());
                hasher.update(name.as_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }

        Ok(Self {
            key: hasher.finalize().to_hex().to_string(),
            content_hash,
            options,
            module_name: module_name.map(str::to_string),
        })
    }

    /// The cache key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Hash of the unit content.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Canonical JSON of the emission options.
    pub fn options(&self) -> &str {
        &self.options
    }

    /// Module-name override, if any.
    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}
