//! ASDF block store: encode/decode, index, compress, and address the raw
//! binary blocks that back `ndarray` descriptors.
//!
//! A block is a contiguous binary payload plus a fixed header (magic,
//! sizes, compression code, checksum). Blocks may live inside the ASDF
//! file (internal), in a sibling `<stem>NNNN.asdf` file (external), or be
//! encoded inline as a YAML scalar sequence (no block at all). At most one
//! block per file may be streamed, and it must be last.

mod block;
mod compression;
mod error;
mod header;
mod store;

pub use block::{BlockBuffer, BlockSlot, StorageClass};
pub use compression::{Compressor, CompressorRegistry, Lz4Compressor, NoneCompressor, ZlibCompressor};
pub use error::{BlockError, BlockResult};
pub use header::{BlockHeader, CompressionCode, BLOCK_MAGIC, COMPRESSION_NONE, FLAG_STREAMED};
pub use store::{BlockIndex, BlockStore, BlockWriter, ExternalBlockSource};
