//! An installed extension: a named, versioned bundle of converters, tag
//! definitions, compressors, and tag-handle shortcuts.

use std::sync::Arc;

use asdf_block::Compressor;

use crate::converter::Converter;

/// One tag an extension defines: its URI, the schema(s) that validate
/// nodes carrying it, and an optional human title (from a manifest).
#[derive(Debug, Clone, Default)]
pub struct TagDefinition {
    /// The tag URI (or glob pattern, for a family of versions).
    pub tag_uri: String,
    /// Schema URIs that apply to nodes carrying this tag (combined with
    /// implicit `allOf` when more than one).
    pub schema_uris: Vec<String>,
    /// Optional human-readable title, carried through from a manifest.
    pub title: Option<String>,
}

/// A `!handle!` shorthand this extension registers, expanding to a URI
/// prefix (the `%TAG` mechanism's runtime counterpart).
#[derive(Debug, Clone)]
pub struct TagHandle {
    /// The handle as written in a document (e.g. `!core!`).
    pub handle: String,
    /// The URI prefix it expands to.
    pub prefix: String,
}

/// A named, versioned bundle of converters, tag definitions, and
/// supporting plugins, as tracked by an [`crate::registry::ExtensionRegistry`].
pub struct Extension {
    /// Extension name (e.g. `asdf.extensions.core`).
    pub name: String,
    /// Extension version (`M.m.p`).
    pub version: (u64, u64, u64),
    /// Minimum standard version this extension requires.
    pub standard_requirement: (u64, u64, u64),
    /// Tags this extension defines, independent of whether a converter is
    /// registered for them (schema-only extensions are legal).
    pub tags: Vec<TagDefinition>,
    /// Converters this extension contributes.
    pub converters: Vec<Arc<dyn Converter>>,
    /// Compressors this extension contributes.
    pub compressors: Vec<Arc<dyn Compressor>>,
    /// Tag-handle shortcuts this extension registers.
    pub tag_handles: Vec<TagHandle>,
    /// Legacy (pre-rename) class names this extension still answers to,
    /// for reading files written by older library versions.
    pub legacy_class_names: Vec<String>,
}

impl Extension {
    /// An extension with just a name and version, nothing else — callers
    /// add tags/converters/compressors via the builder methods.
    pub fn new(name: impl Into<String>, version: (u64, u64, u64)) -> Self {
        Self {
            name: name.into(),
            version,
            standard_requirement: (1, 0, 0),
            tags: Vec::new(),
            converters: Vec::new(),
            compressors: Vec::new(),
            tag_handles: Vec::new(),
            legacy_class_names: Vec::new(),
        }
    }

    /// Set the minimum standard version this extension requires.
    pub fn requires_standard(mut self, version: (u64, u64, u64)) -> Self {
        self.standard_requirement = version;
        self
    }

    /// Register a tag definition.
    pub fn with_tag(mut self, tag: TagDefinition) -> Self {
        self.tags.push(tag);
        self
    }

    /// Register a converter.
    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converters.push(converter);
        self
    }

    /// Register a compressor.
    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressors.push(compressor);
        self
    }

    /// Register a tag-handle shortcut.
    pub fn with_tag_handle(mut self, handle: TagHandle) -> Self {
        self.tag_handles.push(handle);
        self
    }

    /// Register a legacy class name this extension also answers to.
    pub fn with_legacy_class_name(mut self, name: impl Into<String>) -> Self {
        self.legacy_class_names.push(name.into());
        self
    }
}
