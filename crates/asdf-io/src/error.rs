//! Byte I/O façade error types

use thiserror::Error;

/// Errors raised by a [`crate::ByteSource`] implementation
#[derive(Debug, Error)]
pub enum IoError {
    /// The operation requires random access but the source is forward-only
    #[error("operation requires seeking but the source is not seekable")]
    NotSeekable,

    /// The operation requires a writable sink
    #[error("source is not writable")]
    NotWritable,

    /// Memory-mapping was requested but is unavailable for this source/range
    #[error("memory mapping unavailable: {0}")]
    MmapUnavailable(String),

    /// The requested range is outside the bounds of the source
    #[error("range {offset}..{} is out of bounds (size {size})", offset + len, offset = offset, len = len)]
    OutOfBounds {
        /// Starting byte offset of the attempted range
        offset: u64,
        /// Length in bytes of the attempted range
        len: u64,
        /// Total size of the source, if known
        size: u64,
    },

    /// A delimiter was not found before the source was exhausted
    #[error("delimiter not found before end of source")]
    DelimiterNotFound,

    /// Fewer bytes were available than `read` requested before the source
    /// was exhausted
    #[error("unexpected end of source: requested {requested} bytes, got {got}")]
    UnexpectedEof {
        /// Number of bytes requested
        requested: usize,
        /// Number of bytes actually available
        got: usize,
    },

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for byte I/O operations
pub type IoResult<T> = Result<T, IoError>;
