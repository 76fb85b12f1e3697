//! Block store error types

use thiserror::Error;

/// Errors raised while reading, writing, or materializing blocks
#[derive(Debug, Error)]
pub enum BlockError {
    /// Block header magic did not match `\xd3BLK`
    #[error("invalid block header magic at offset {offset}: {found:02X?}")]
    InvalidMagic {
        /// Byte offset of the offending header
        offset: u64,
        /// The bytes actually found
        found: [u8; 4],
    },

    /// A block header claims an `allocated_size` smaller than `used_size`
    #[error("block {index} has used_size {used} larger than allocated_size {allocated}")]
    InvalidHeaderSizes {
        /// Index of the offending block
        index: usize,
        /// `used_size` field
        used: u64,
        /// `allocated_size` field
        allocated: u64,
    },

    /// Compression code is not registered with the compressor registry
    #[error("unknown compression code {code:?} on block {index}")]
    UnknownCompression {
        /// Index of the block referencing the unknown code
        index: usize,
        /// The 4-byte compression code
        code: [u8; 4],
    },

    /// Decompression produced a different length than the block's `data_size`
    #[error("decompressed block {index} is {actual} bytes, expected {expected}")]
    DataSizeMismatch {
        /// Index of the offending block
        index: usize,
        /// Expected decompressed size (`data_size` header field)
        expected: u64,
        /// Actual decompressed size
        actual: u64,
    },

    /// Checksum recorded in the header did not match the compressed bytes
    #[error("checksum mismatch on block {index}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Index of the offending block
        index: usize,
        /// Expected checksum, hex-encoded
        expected: String,
        /// Actual checksum, hex-encoded
        actual: String,
    },

    /// A block index entry referenced an offset past end-of-file
    #[error("block index entry {index} (offset {offset}) is out of bounds (file size {size})")]
    BlockIndexInvalid {
        /// Position within the block index
        index: usize,
        /// Offset recorded in the index
        offset: u64,
        /// Actual file size
        size: u64,
    },

    /// More than one streamed block was present, or it was not last
    #[error("at most one streamed block is allowed, and it must be the last block")]
    InvalidStreamedBlock,

    /// A compressor's `compress`/`decompress` implementation failed
    #[error("compression error: {0}")]
    CompressionFailed(String),

    /// An `ndarray` descriptor referenced a block index outside `[0, n)`
    #[error("block index {requested} out of range (file has {available} blocks)")]
    BlockIndexOutOfRange {
        /// Index that was requested
        requested: usize,
        /// Number of blocks actually present
        available: usize,
    },

    /// A fixed-width header field came back short from the byte source
    #[error("truncated block header at offset {offset}: expected {expected} bytes, got {got}")]
    TruncatedHeader {
        /// Byte offset of the header being parsed
        offset: u64,
        /// Bytes expected for this field
        expected: usize,
        /// Bytes actually returned
        got: usize,
    },

    /// The underlying byte source does not support the requested operation
    #[error(transparent)]
    Io(#[from] asdf_io::IoError),

    /// Binary layout (de)serialization failure
    #[error("block header binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for block store operations
pub type BlockResult<T> = Result<T, BlockError>;
