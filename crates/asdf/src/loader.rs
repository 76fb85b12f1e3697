//! The document engine's [`DocumentLoader`](asdf_resolver::DocumentLoader)
//! implementation: resolves a `$ref` target URI relative to the document
//! that referenced it, using `url` for the relative-resolution arithmetic,
//! and parses whatever it fetches through `asdf-tree`.

use std::path::PathBuf;
use std::sync::Arc;

use asdf_resolver::{DocumentLoader, ResolverError, ResolverResult};
use asdf_tree::NodeRef;
use tracing::debug;
use url::Url;

/// Resolves `$ref` URIs against the local filesystem, relative to the
/// opening document's own location. Reference URIs are resolved through
/// [`Url::join`] so `../sibling.asdf`-style relative paths behave the same
/// way a browser resolves a relative link, per §6's "companion files"
/// convention for exploded-form documents.
pub struct FilesystemLoader {
    base: Option<Url>,
}

impl FilesystemLoader {
    /// A loader with no base document — only absolute `file://` URIs (or
    /// bare absolute paths) resolve.
    pub fn new() -> Self {
        Self { base: None }
    }

    /// A loader anchored at `path`, the file currently being opened, so
    /// sibling references resolve relative to it.
    pub fn relative_to(path: impl AsRef<std::path::Path>) -> Self {
        let base = Url::from_file_path(std::fs::canonicalize(path.as_ref()).unwrap_or_else(|_| path.as_ref().to_path_buf())).ok();
        Self { base }
    }

    fn resolve_url(&self, uri: &str) -> ResolverResult<Url> {
        if let Ok(absolute) = Url::parse(uri) {
            return Ok(absolute);
        }
        let base = self.base.as_ref().ok_or_else(|| ResolverError::DocumentNotFound(uri.to_string()))?;
        base.join(uri).map_err(|_| ResolverError::DocumentNotFound(uri.to_string()))
    }
}

impl Default for FilesystemLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for FilesystemLoader {
    fn load(&self, uri: &str) -> ResolverResult<NodeRef> {
        let url = self.resolve_url(uri)?;
        let path: PathBuf = url.to_file_path().map_err(|()| ResolverError::DocumentNotFound(uri.to_string()))?;
        debug!(uri, path = %path.display(), "loading referenced document");
        let text = std::fs::read_to_string(&path).map_err(|_| ResolverError::DocumentNotFound(uri.to_string()))?;
        let body = crate::document::extract_yaml_body(&text).ok_or_else(|| ResolverError::DocumentNotFound(uri.to_string()))?;
        asdf_tree::parse_document(&body)?.ok_or_else(|| ResolverError::DocumentNotFound(uri.to_string()))
    }
}

/// Build a [`asdf_resolver::Resolver`] whose loader is anchored at `path`.
pub fn resolver_for(path: impl AsRef<std::path::Path>) -> asdf_resolver::Resolver<FilesystemLoader> {
    asdf_resolver::Resolver::new(Arc::new(FilesystemLoader::relative_to(path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_uri_parses_without_a_base() {
        let loader = FilesystemLoader::new();
        assert!(loader.resolve_url("file:///tmp/x.asdf").is_ok());
        assert!(loader.resolve_url("relative.asdf").is_err());
    }

    #[test]
    fn relative_uri_resolves_against_base() {
        let dir = tempfile::tempdir().unwrap();
        let base_path = dir.path().join("main.asdf");
        std::fs::write(&base_path, "#ASDF 1.0.0\n").unwrap();
        let loader = FilesystemLoader::relative_to(&base_path);
        let resolved = loader.resolve_url("sibling.asdf").unwrap();
        assert!(resolved.path().ends_with("sibling.asdf"));
    }
}
