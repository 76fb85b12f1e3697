//! Schema loading and validation errors.

use thiserror::Error;

/// Errors raised while loading or parsing a schema document.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// No registered [`crate::resource::ResourceMapping`] claimed the URI.
    #[error("no resource mapping claims URI '{0}'")]
    UnresolvedUri(String),

    /// The resolved bytes were not valid UTF-8 YAML/JSON.
    #[error("schema '{uri}' is not valid UTF-8: {source}")]
    InvalidEncoding {
        /// URI of the offending schema
        uri: String,
        /// Underlying UTF-8 error
        #[source]
        source: std::str::Utf8Error,
    },

    /// A schema keyword had an unexpected shape (e.g. `properties` was not
    /// a mapping).
    #[error("schema '{uri}' malformed: {message}")]
    Malformed {
        /// URI of the offending schema
        uri: String,
        /// Description of the problem
        message: String,
    },

    /// Underlying tree parse error.
    #[error(transparent)]
    Tree(#[from] asdf_tree::TreeError),

    /// Underlying filesystem error from a [`crate::resource::DirectoryMapping`].
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// One validation failure, carrying the JSON-pointer path of the offending
/// node so every `?`-propagated caller can report exactly where it went
/// wrong without re-deriving the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaValidationError {
    /// JSON-pointer path of the node that failed validation.
    pub path: String,
    /// Human-readable description of the failure.
    pub message: String,
}

impl std::fmt::Display for SchemaValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
