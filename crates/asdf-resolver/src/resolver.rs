//! `$ref` discovery and resolution, lazy and eager.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use asdf_tree::{NodeKind, NodeRef};

use crate::error::{ResolverError, ResolverResult};
use crate::pointer::{self, Pointer};

/// A parsed `{"$ref": "<uri>#<pointer>"}` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSpec {
    /// `None` for a same-document (fragment-only) reference.
    pub uri: Option<String>,
    /// Pointer within the target document.
    pub pointer: Pointer,
}

impl RefSpec {
    /// Parse a raw `$ref` value.
    pub fn parse(raw: &str) -> ResolverResult<Self> {
        match raw.split_once('#') {
            Some((uri, pointer)) => {
                let uri = if uri.is_empty() { None } else { Some(uri.to_string()) };
                Ok(Self { uri, pointer: Pointer::parse(pointer) })
            }
            None => {
                if raw.is_empty() {
                    return Err(ResolverError::InvalidRef(raw.to_string()));
                }
                Ok(Self { uri: Some(raw.to_string()), pointer: Pointer::default() })
            }
        }
    }

    fn cache_key(&self) -> String {
        format!("{}#{}", self.uri.as_deref().unwrap_or(""), self.pointer)
    }
}

/// A lazily-dereferenced handle produced by [`Resolver::find_references`].
/// Holding one does not mutate the source tree: the `$ref` node it points
/// at is untouched, so a document carrying only undereferenced proxies
/// re-writes byte-for-byte as the original reference.
pub struct RefProxy {
    /// The parsed reference this proxy was built from.
    pub spec: RefSpec,
    /// The `$ref` mapping node itself, in the original tree.
    pub node: NodeRef,
    /// Root of the document `node` was found in, used to resolve
    /// fragment-only references on dereference.
    pub doc_root: NodeRef,
}

impl RefProxy {
    /// Dereference this proxy against `resolver`, consulting (and
    /// populating) its memoization cache. Does not mutate the source tree.
    pub fn get<L: DocumentLoader>(&self, resolver: &Resolver<L>) -> ResolverResult<NodeRef> {
        resolver.inline_ref(&self.spec, &self.doc_root)
    }
}

/// Loads the root tree of a document identified by URI. The resolver never
/// touches a byte source itself; the document engine supplies this.
pub trait DocumentLoader {
    /// Load and parse the document at `uri`, returning its tree root.
    fn load(&self, uri: &str) -> ResolverResult<NodeRef>;
}

enum CacheEntry {
    InProgress,
    Resolved(NodeRef),
}

/// Resolves `$ref` nodes against a document tree, memoizing by
/// `uri#pointer` the way the teacher's content resolver memoizes
/// path/content-key lookups in a `DashMap`.
pub struct Resolver<L: DocumentLoader> {
    loader: Arc<L>,
    cache: DashMap<String, CacheEntry>,
    doc_cache: DashMap<String, NodeRef>,
}

impl<L: DocumentLoader> Resolver<L> {
    /// Build a resolver around a document loader.
    pub fn new(loader: Arc<L>) -> Self {
        Self { loader, cache: DashMap::new(), doc_cache: DashMap::new() }
    }

    /// Walk `root` and return a lazy [`RefProxy`] for every `$ref` node
    /// found, without mutating the tree or following any reference.
    pub fn find_references(&self, root: &NodeRef) -> Vec<RefProxy> {
        let mut found = Vec::new();
        collect_refs(root, root, &mut found);
        found
    }

    /// Walk `root` and eagerly replace every `$ref` node (recursively,
    /// including refs found inside resolved content) with the referenced
    /// subtree, so the result is self-contained.
    pub fn resolve_references(&self, root: &NodeRef) -> ResolverResult<()> {
        self.inline_all(root, root)
    }

    fn load_doc(&self, uri: &str) -> ResolverResult<NodeRef> {
        if let Some(cached) = self.doc_cache.get(uri) {
            return Ok(cached.clone());
        }
        debug!(uri, "loading external document for $ref");
        let root = self.loader.load(uri)?;
        self.doc_cache.insert(uri.to_string(), root.clone());
        Ok(root)
    }

    /// Resolve one reference to its (fully inlined) target node. The
    /// `InProgress` marker stays set for the duration of resolving the
    /// target's own nested references, so a reference that loops back
    /// through an ancestor still being resolved is caught here rather than
    /// recursing forever.
    fn inline_ref(&self, spec: &RefSpec, doc_root: &NodeRef) -> ResolverResult<NodeRef> {
        let key = spec.cache_key();
        if let Some(entry) = self.cache.get(&key) {
            return match &*entry {
                CacheEntry::Resolved(node) => Ok(node.clone()),
                CacheEntry::InProgress => Err(ResolverError::ReferenceCycle {
                    uri: spec.uri.clone().unwrap_or_default(),
                    pointer: spec.pointer.to_string(),
                }),
            };
        }
        self.cache.insert(key.clone(), CacheEntry::InProgress);

        let target_root = match &spec.uri {
            Some(uri) => self.load_doc(uri)?,
            None => doc_root.clone(),
        };
        let resolved = pointer::resolve(&target_root, &spec.pointer).ok_or_else(|| ResolverError::PointerNotFound {
            uri: spec.uri.clone().unwrap_or_default(),
            pointer: spec.pointer.to_string(),
        })?;

        self.inline_all(&resolved, &target_root)?;
        self.cache.insert(key, CacheEntry::Resolved(resolved.clone()));
        Ok(resolved)
    }

    /// Find and splice every `$ref` directly or transitively under `node`,
    /// using `doc_root` to resolve fragment-only references.
    fn inline_all(&self, node: &NodeRef, doc_root: &NodeRef) -> ResolverResult<()> {
        for proxy in self.find_references_in(node, doc_root) {
            let resolved = self.inline_ref(&proxy.spec, doc_root)?;
            splice(&proxy.node, &resolved);
        }
        Ok(())
    }

    fn find_references_in(&self, node: &NodeRef, doc_root: &NodeRef) -> Vec<RefProxy> {
        let mut found = Vec::new();
        collect_refs(node, doc_root, &mut found);
        found
    }
}

/// True if `node` is a `{"$ref": "..."}` mapping, and if so its raw value.
fn ref_value(node: &NodeRef) -> Option<String> {
    let n = node.borrow();
    let NodeKind::Mapping { entries, .. } = &n.kind else { return None };
    if entries.len() != 1 {
        return None;
    }
    let (key, value) = &entries[0];
    if key.borrow().as_str() != Some("$ref") {
        return None;
    }
    value.borrow().as_str().map(str::to_string)
}

fn collect_refs(node: &NodeRef, doc_root: &NodeRef, out: &mut Vec<RefProxy>) {
    if let Some(raw) = ref_value(node) {
        match RefSpec::parse(&raw) {
            Ok(spec) => out.push(RefProxy { spec, node: node.clone(), doc_root: doc_root.clone() }),
            Err(err) => warn!(%err, raw, "skipping malformed $ref"),
        }
        return;
    }
    let n = node.borrow();
    match &n.kind {
        NodeKind::Mapping { entries, .. } => {
            for (_, value) in entries {
                collect_refs(value, doc_root, out);
            }
        }
        NodeKind::Sequence { items, .. } => {
            for item in items {
                collect_refs(item, doc_root, out);
            }
        }
        NodeKind::Scalar { .. } | NodeKind::Alias { .. } => {}
    }
}

/// Replace `target`'s content in place with a copy of `replacement`'s,
/// preserving `target`'s own identity (anything else still holding an
/// `Rc` to it sees the resolved content too) and its own tag if it had an
/// explicit one.
fn splice(target: &NodeRef, replacement: &NodeRef) {
    let replacement_kind = clone_kind(&replacement.borrow().kind);
    let replacement_tag = replacement.borrow().tag.clone();
    let mut target_mut = target.borrow_mut();
    if target_mut.tag.is_none() {
        target_mut.tag = replacement_tag;
    }
    target_mut.kind = replacement_kind;
}

fn clone_kind(kind: &NodeKind) -> NodeKind {
    match kind {
        NodeKind::Scalar { value, style } => NodeKind::Scalar { value: value.clone(), style: *style },
        NodeKind::Sequence { items, style } => NodeKind::Sequence { items: items.clone(), style: *style },
        NodeKind::Mapping { entries, style } => NodeKind::Mapping { entries: entries.clone(), style: *style },
        NodeKind::Alias { name, target } => NodeKind::Alias { name: name.clone(), target: target.clone() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asdf_tree::parse_document;
    use std::collections::HashMap;

    struct MapLoader(HashMap<String, String>);

    impl DocumentLoader for MapLoader {
        fn load(&self, uri: &str) -> ResolverResult<NodeRef> {
            let text = self.0.get(uri).ok_or_else(|| ResolverError::DocumentNotFound(uri.to_string()))?;
            Ok(parse_document(text).unwrap().unwrap())
        }
    }

    #[test]
    fn parses_fragment_only_ref() {
        let spec = RefSpec::parse("#/a/b").unwrap();
        assert!(spec.uri.is_none());
        assert_eq!(spec.pointer.to_string(), "/a/b");
    }

    #[test]
    fn finds_intra_document_ref() {
        let doc = parse_document("a:\n  value: 1\nb:\n  $ref: '#/a'\n").unwrap().unwrap();
        let resolver = Resolver::new(Arc::new(MapLoader(HashMap::new())));
        let refs = resolver.find_references(&doc);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].spec.pointer.to_string(), "/a");
    }

    #[test]
    fn lazy_proxy_does_not_mutate_tree() {
        let doc = parse_document("a:\n  value: 1\nb:\n  $ref: '#/a'\n").unwrap().unwrap();
        let resolver = Resolver::new(Arc::new(MapLoader(HashMap::new())));
        let refs = resolver.find_references(&doc);
        let resolved = refs[0].get(&resolver).unwrap();
        assert_eq!(pointer::resolve(&resolved, &Pointer::parse("/value")).unwrap().borrow().as_str(), Some("1"));
        // The original $ref node is untouched.
        assert_eq!(ref_value(&refs[0].node).as_deref(), Some("#/a"));
    }

    #[test]
    fn resolves_references_inlines_target() {
        let doc = parse_document("a:\n  value: 1\nb:\n  $ref: '#/a'\n").unwrap().unwrap();
        let resolver = Resolver::new(Arc::new(MapLoader(HashMap::new())));
        resolver.resolve_references(&doc).unwrap();
        let found = pointer::resolve(&doc, &Pointer::parse("/b/value")).unwrap();
        assert_eq!(found.borrow().as_str(), Some("1"));
    }

    #[test]
    fn detects_reference_cycle() {
        let doc = parse_document("a:\n  $ref: '#/b'\nb:\n  $ref: '#/a'\n").unwrap().unwrap();
        let resolver = Resolver::new(Arc::new(MapLoader(HashMap::new())));
        let err = resolver.resolve_references(&doc).unwrap_err();
        assert!(matches!(err, ResolverError::ReferenceCycle { .. }));
    }

    #[test]
    fn loads_external_document() {
        let mut docs = HashMap::new();
        docs.insert("other.asdf".to_string(), "shared:\n  value: 42\n".to_string());
        let doc = parse_document("b:\n  $ref: 'other.asdf#/shared'\n").unwrap().unwrap();
        let resolver = Resolver::new(Arc::new(MapLoader(docs)));
        resolver.resolve_references(&doc).unwrap();
        let found = pointer::resolve(&doc, &Pointer::parse("/b/value")).unwrap();
        assert_eq!(found.borrow().as_str(), Some("42"));
    }
}
