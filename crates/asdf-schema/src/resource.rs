//! URI-to-bytes resolution, chained across mapping plugins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{SchemaError, SchemaResult};

/// A plugin that may be able to produce the bytes behind a URI. Any number
/// of mappings chain together in [`ResourceMappingChain`]; the first one
/// that claims a URI wins.
pub trait ResourceMapping: Send + Sync {
    /// Attempt to resolve `uri`, returning `None` if this mapping does not
    /// claim it (as opposed to claiming it and failing, which is an error).
    fn resolve(&self, uri: &str) -> SchemaResult<Option<Vec<u8>>>;
}

/// Maps a URI prefix to a filesystem directory, glob-matching the
/// remainder of the URI against files under it — the same
/// convention-over-configuration approach the teacher's client storage uses
/// for locating installation-relative files by pattern.
pub struct DirectoryMapping {
    prefix: String,
    root: PathBuf,
}

impl DirectoryMapping {
    /// `prefix` is stripped from a claimed URI; the remainder is resolved
    /// relative to `root` and must exist under it (no glob wildcard
    /// expansion is needed for a single-file lookup — [`glob`] is used by
    /// callers that need to enumerate a whole schema directory up front).
    pub fn new(prefix: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self { prefix: prefix.into(), root: root.into() }
    }

    /// Enumerate every file under `root` matching `pattern` (e.g.
    /// `"**/*.yaml"`), returning their URIs under this mapping's prefix.
    pub fn list(&self, pattern: &str) -> SchemaResult<Vec<String>> {
        let full_pattern = self.root.join(pattern);
        let mut uris = Vec::new();
        for entry in glob::glob(&full_pattern.to_string_lossy()).map_err(|e| SchemaError::Malformed { uri: full_pattern.display().to_string(), message: e.to_string() })? {
            let path = entry.map_err(|e| SchemaError::Io(e.into_error()))?;
            if let Ok(relative) = path.strip_prefix(&self.root) {
                uris.push(format!("{}{}", self.prefix, relative.to_string_lossy()));
            }
        }
        Ok(uris)
    }
}

impl ResourceMapping for DirectoryMapping {
    fn resolve(&self, uri: &str) -> SchemaResult<Option<Vec<u8>>> {
        let Some(relative) = uri.strip_prefix(self.prefix.as_str()) else { return Ok(None) };
        let path: &Path = relative.as_ref();
        if path.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            return Ok(None);
        }
        let full = self.root.join(path);
        match std::fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// An in-memory URI-to-bytes table, used for tests and for schemas bundled
/// into the binary at compile time.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMapping {
    entries: HashMap<String, Vec<u8>>,
}

impl InMemoryMapping {
    /// An empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `uri` to resolve to `bytes`.
    pub fn insert(&mut self, uri: impl Into<String>, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.entries.insert(uri.into(), bytes.into());
        self
    }
}

impl ResourceMapping for InMemoryMapping {
    fn resolve(&self, uri: &str) -> SchemaResult<Option<Vec<u8>>> {
        Ok(self.entries.get(uri).cloned())
    }
}

/// An ordered chain of [`ResourceMapping`]s, tried in registration order.
#[derive(Default)]
pub struct ResourceMappingChain {
    mappings: Vec<Box<dyn ResourceMapping>>,
}

impl ResourceMappingChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mapping, tried after every mapping already registered.
    pub fn push(&mut self, mapping: impl ResourceMapping + 'static) -> &mut Self {
        self.mappings.push(Box::new(mapping));
        self
    }

    /// Resolve `uri` against each mapping in order, returning the first
    /// claim.
    pub fn resolve(&self, uri: &str) -> SchemaResult<Vec<u8>> {
        for mapping in &self.mappings {
            if let Some(bytes) = mapping.resolve(uri)? {
                return Ok(bytes);
            }
        }
        Err(SchemaError::UnresolvedUri(uri.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_mapping_resolves_registered_uri() {
        let mut mapping = InMemoryMapping::new();
        mapping.insert("urn:x-asdf:schema", b"type: object\n".to_vec());
        assert_eq!(mapping.resolve("urn:x-asdf:schema").unwrap(), Some(b"type: object\n".to_vec()));
        assert_eq!(mapping.resolve("urn:x-asdf:other").unwrap(), None);
    }

    #[test]
    fn directory_mapping_reads_files_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("core.yaml"), b"type: object\n").unwrap();
        let mapping = DirectoryMapping::new("http://example.com/schemas/", dir.path());
        let bytes = mapping.resolve("http://example.com/schemas/core.yaml").unwrap().unwrap();
        assert_eq!(bytes, b"type: object\n");
        assert!(mapping.resolve("http://example.com/other/core.yaml").unwrap().is_none());
    }

    #[test]
    fn directory_mapping_rejects_parent_dir_escape() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = DirectoryMapping::new("urn:x:", dir.path());
        assert!(mapping.resolve("urn:x:../../etc/passwd").unwrap().is_none());
    }

    #[test]
    fn chain_tries_mappings_in_order() {
        let mut first = InMemoryMapping::new();
        first.insert("urn:x:a", b"a".to_vec());
        let mut second = InMemoryMapping::new();
        second.insert("urn:x:b", b"b".to_vec());
        let mut chain = ResourceMappingChain::new();
        chain.push(first).push(second);
        assert_eq!(chain.resolve("urn:x:a").unwrap(), b"a");
        assert_eq!(chain.resolve("urn:x:b").unwrap(), b"b");
        assert!(chain.resolve("urn:x:c").is_err());
    }
}
