//! Engine-wide policy: how strictly to validate, whether to resolve `$ref`s
//! eagerly, and the knobs `write`/`update` need.

use asdf_block::CompressionCode;

/// How to react to a condition that is an error under strict reading but
/// merely a [`crate::error::Warning`] under lenient reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationPolicy {
    /// Ignore the condition entirely (not recommended; still records
    /// nothing, not even a warning).
    Off,
    /// Collect a [`crate::error::Warning`] and continue.
    #[default]
    Warn,
    /// Treat the condition as a fatal [`crate::error::AsdfError`].
    Raise,
}

/// Options governing [`crate::document::Document::open`].
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Eagerly resolve every `$ref` node into its target subtree before
    /// converting to native objects. When `false`, refs are left as lazy
    /// proxies the caller can dereference later via `asdf-resolver`.
    pub resolve_refs: bool,
    /// How strictly to apply component E's validation pipeline on open.
    pub validate: ValidationPolicy,
    /// Honor a trailing block index if present and sane; always falls back
    /// to a linear scan otherwise, but a `false` here skips even
    /// attempting to read one.
    pub use_block_index: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self { resolve_refs: false, validate: ValidationPolicy::Warn, use_block_index: true }
    }
}

/// Options governing [`crate::document::Document::write`] and
/// [`crate::document::Document::update`].
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// ASDF Standard version to declare in the header and validate against.
    pub standard_version: (u64, u64, u64),
    /// File format version to declare in the `#ASDF` magic line.
    pub file_format_version: (u64, u64, u64),
    /// Default compression applied to newly-allocated blocks that don't
    /// specify their own.
    pub default_compression: CompressionCode,
    /// Mark the final internal block as streamed (appendable,
    /// size-in-header-is-zero) rather than length-prefixed.
    pub stream_last_block: bool,
    /// Bytes of NUL padding appended after the block index (or after the
    /// body, if there are no blocks). Purely a file-size reservation; it
    /// does not sit between the YAML body and the blocks, so it gives
    /// `update()` no extra room to grow the body in place — `update()`'s
    /// in-place path is only ever as large as the body's own original span.
    pub padding: u64,
    /// How strictly to apply validation before committing the write.
    pub validate: ValidationPolicy,
    /// Reuse a single block for multiple array descriptors that share the
    /// same backing buffer (by pointer identity) instead of duplicating it.
    pub default_array_save_base: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            standard_version: (1, 6, 0),
            file_format_version: (1, 0, 0),
            default_compression: asdf_block::COMPRESSION_NONE,
            stream_last_block: false,
            padding: 0,
            validate: ValidationPolicy::Raise,
            default_array_save_base: true,
        }
    }
}

/// Engine-wide configuration shared across every `Document` a caller opens:
/// the registries for extensions and schemas, plus a few cross-cutting
/// thresholds. Analogous to the teacher's `StorageConfig`, but covering
/// format-engine policy rather than filesystem layout.
pub struct AsdfContext {
    /// Installed extensions (converters, tag definitions, compressors).
    pub extensions: asdf_ext::ExtensionRegistry,
    /// Inline-vs-block threshold: scalar sequences of plain numbers with
    /// fewer than this many elements are written as an inline YAML
    /// sequence instead of allocating a binary block.
    pub array_inline_threshold: usize,
    /// When `true`, an `ndarray` subclass with no exact converter match
    /// falls back to the nearest registered base-type converter instead of
    /// becoming [`crate::error::AsdfError::UnknownType`].
    pub convert_unknown_ndarray_subclasses: bool,
}

impl AsdfContext {
    /// A context around a pre-built extension registry.
    pub fn new(extensions: asdf_ext::ExtensionRegistry) -> Self {
        Self { extensions, array_inline_threshold: 8, convert_unknown_ndarray_subclasses: false }
    }

    /// Set the inline-array element threshold.
    #[must_use]
    pub fn with_array_inline_threshold(mut self, threshold: usize) -> Self {
        self.array_inline_threshold = threshold;
        self
    }

    /// Enable falling back to a base-type converter for unrecognized
    /// `ndarray` subclasses.
    #[must_use]
    pub fn with_ndarray_subclass_fallback(mut self, enable: bool) -> Self {
        self.convert_unknown_ndarray_subclasses = enable;
        self
    }

    /// Register the built-in `core` extension (`ndarray`, `software`,
    /// `history_entry`, `constant`, `integer`), so a caller gets a working
    /// document engine without writing a converter first.
    #[must_use]
    pub fn with_core_extension(mut self) -> Self {
        self.extensions.register(crate::core_ext::core_extension());
        self
    }
}
