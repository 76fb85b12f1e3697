//! Extension registration and manifest-loading errors.

use thiserror::Error;

/// Errors raised while registering extensions or resolving converters.
#[derive(Debug, Error)]
pub enum ExtError {
    /// An extension manifest document had an unexpected shape.
    #[error("manifest '{uri}' malformed: {message}")]
    MalformedManifest {
        /// URI of the offending manifest
        uri: String,
        /// Description of the problem
        message: String,
    },

    /// A tag URI pattern failed to compile as a glob.
    #[error("invalid tag pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Underlying glob compile error
        #[source]
        source: glob::PatternError,
    },

    /// Underlying tree parse error (manifest documents are YAML).
    #[error(transparent)]
    Tree(#[from] asdf_tree::TreeError),

    /// Underlying schema error, surfaced when an extension's tag
    /// definitions reference a schema URI that fails to resolve.
    #[error(transparent)]
    Schema(#[from] asdf_schema::SchemaError),

    /// Underlying block store error, surfaced by converters (e.g.
    /// `core/ndarray`) that read or allocate binary blocks through a
    /// [`crate::block_access::BlockReader`]/[`crate::block_access::BlockAllocator`].
    #[error(transparent)]
    Block(#[from] asdf_block::BlockError),

    /// A converter was asked to read or allocate a block, but the caller
    /// (the document engine) never wired up block access for this
    /// conversion direction.
    #[error("no block access is available for this conversion")]
    NoBlockAccess,

    /// An `ndarray` descriptor's offset/shape/strides reach past its
    /// block's decoded length.
    #[error("ndarray view [offset {offset}, len {len}] exceeds block length {available}")]
    NdArrayOutOfBounds {
        /// Byte offset the view starts at.
        offset: u64,
        /// Total bytes the view spans.
        len: u64,
        /// Bytes actually available in the block.
        available: u64,
    },

    /// A tagged node this crate's own converters expect to be a mapping
    /// (or to carry a specific field) had the wrong shape.
    #[error("malformed '{tag}' node: {message}")]
    MalformedNode {
        /// The tag whose converter rejected the node.
        tag: String,
        /// Description of the problem.
        message: String,
    },
}

/// Result type for extension-registry operations.
pub type ExtResult<T> = Result<T, ExtError>;
