//! Tree parsing and emission errors.

use thiserror::Error;

/// Errors raised while parsing or emitting a tagged document tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// A line's indentation did not align with any enclosing block.
    #[error("line {line}: inconsistent indentation ({found} spaces)")]
    InvalidIndentation {
        /// 1-based line number
        line: usize,
        /// Indentation actually found
        found: usize,
    },

    /// A quoted scalar was never closed before end of input.
    #[error("line {line}: unterminated quoted scalar")]
    UnterminatedQuotedScalar {
        /// 1-based line number the scalar started on
        line: usize,
    },

    /// A flow collection (`[...]` or `{...}`) was never closed.
    #[error("line {line}: unterminated flow collection")]
    UnterminatedFlowCollection {
        /// 1-based line number the collection started on
        line: usize,
    },

    /// The same anchor name was defined more than once.
    #[error("line {line}: duplicate anchor '{name}'")]
    DuplicateAnchor {
        /// 1-based line number
        line: usize,
        /// Anchor name
        name: String,
    },

    /// The same key text appeared more than once in one mapping.
    #[error("line {line}: duplicate mapping key '{key}'")]
    DuplicateMappingKey {
        /// 1-based line number
        line: usize,
        /// The repeated key's text
        key: String,
    },

    /// An alias referenced an anchor that was never (yet) defined.
    #[error("line {line}: undefined alias '*{name}'")]
    UndefinedAlias {
        /// 1-based line number
        line: usize,
        /// Anchor name referenced
        name: String,
    },

    /// A mapping key was not a plain scalar (string/int/bool), which
    /// standard-1.6 and later restricts to those three scalar kinds. This
    /// is checked at validation time, not parse time: the parser itself
    /// accepts any node as a key.
    #[error("line {line}: mapping key is not a string, int, or bool scalar")]
    MappingKeyNotScalar {
        /// 1-based line number
        line: usize,
    },

    /// Unexpected token or malformed construct.
    #[error("line {line}: {message}")]
    Syntax {
        /// 1-based line number
        line: usize,
        /// Description of the problem
        message: String,
    },

    /// Underlying I/O failure while reading or writing the document text.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
