//! Reference resolution errors.

use thiserror::Error;

/// Errors raised while resolving a `$ref`.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// A `$ref` value was not a valid `<uri>#<pointer>` string.
    #[error("invalid $ref value: {0:?}")]
    InvalidRef(String),

    /// The JSON pointer did not resolve to any node in the target document.
    #[error("pointer '{pointer}' not found in '{uri}'")]
    PointerNotFound {
        /// The document the pointer was evaluated against.
        uri: String,
        /// The pointer that failed to resolve.
        pointer: String,
    },

    /// A pointer walked through a mapping key that was not a scalar, or a
    /// sequence index that was not a valid integer.
    #[error("pointer '{pointer}' in '{uri}' traverses a non-indexable node")]
    NotIndexable {
        /// The document being traversed.
        uri: String,
        /// The pointer being walked.
        pointer: String,
    },

    /// Eager resolution revisited a `$ref` it had not finished resolving.
    #[error("reference cycle detected resolving '{uri}#{pointer}'")]
    ReferenceCycle {
        /// The document containing the cyclic reference.
        uri: String,
        /// The pointer forming the cycle.
        pointer: String,
    },

    /// No loader was able to produce the referenced document.
    #[error("could not load referenced document '{0}'")]
    DocumentNotFound(String),

    /// Underlying tree error.
    #[error(transparent)]
    Tree(#[from] asdf_tree::TreeError),
}

/// Result type for resolver operations.
pub type ResolverResult<T> = Result<T, ResolverError>;
