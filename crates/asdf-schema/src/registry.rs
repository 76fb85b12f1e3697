//! LRU-cached schema loading, backed by a [`ResourceMappingChain`].

use std::str;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::error::{SchemaError, SchemaResult};
use crate::resource::ResourceMappingChain;
use crate::schema::{parse_schema, Schema};

const DEFAULT_CACHE_SIZE: usize = 256;

/// Resolves schema URIs to parsed, cached [`Schema`]s.
pub struct SchemaRegistry {
    mappings: ResourceMappingChain,
    cache: Mutex<LruCache<String, Arc<Schema>>>,
}

impl SchemaRegistry {
    /// Build a registry over `mappings`, caching up to [`DEFAULT_CACHE_SIZE`]
    /// parsed schemas.
    pub fn new(mappings: ResourceMappingChain) -> Self {
        Self::with_capacity(mappings, DEFAULT_CACHE_SIZE)
    }

    /// Build a registry with an explicit cache capacity.
    pub fn with_capacity(mappings: ResourceMappingChain, capacity: usize) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity).unwrap_or(std::num::NonZeroUsize::new(DEFAULT_CACHE_SIZE).unwrap());
        Self { mappings, cache: Mutex::new(LruCache::new(capacity)) }
    }

    /// Load and parse the schema at `uri`, serving it from cache on a
    /// repeat lookup.
    pub fn load(&self, uri: &str) -> SchemaResult<Arc<Schema>> {
        if let Some(cached) = self.cache.lock().get(uri) {
            return Ok(Arc::clone(cached));
        }

        let bytes = self.mappings.resolve(uri)?;
        let text = str::from_utf8(&bytes).map_err(|source| SchemaError::InvalidEncoding { uri: uri.to_string(), source })?;
        let tree = asdf_tree::parse_document(text)?.ok_or_else(|| SchemaError::Malformed { uri: uri.to_string(), message: "schema document is empty".into() })?;
        let schema = Arc::new(parse_schema(&tree, uri)?);

        self.cache.lock().put(uri.to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Evict every cached schema, forcing the next `load` of any URI to
    /// re-read and re-parse it.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::InMemoryMapping;

    #[test]
    fn loads_and_caches_schema() {
        let mut mapping = InMemoryMapping::new();
        mapping.insert("urn:x:a", b"type: object\n".to_vec());
        let mut chain = ResourceMappingChain::new();
        chain.push(mapping);
        let registry = SchemaRegistry::new(chain);

        let first = registry.load("urn:x:a").unwrap();
        let second = registry.load("urn:x:a").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn missing_uri_is_an_error() {
        let registry = SchemaRegistry::new(ResourceMappingChain::new());
        assert!(registry.load("urn:x:missing").is_err());
    }

    #[test]
    fn clear_forces_reparse() {
        let mut mapping = InMemoryMapping::new();
        mapping.insert("urn:x:a", b"type: object\n".to_vec());
        let mut chain = ResourceMappingChain::new();
        chain.push(mapping);
        let registry = SchemaRegistry::new(chain);

        let first = registry.load("urn:x:a").unwrap();
        registry.clear();
        let second = registry.load("urn:x:a").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
