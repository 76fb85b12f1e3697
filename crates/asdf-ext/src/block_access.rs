//! Block read/write access as seen by converters.
//!
//! This crate never touches a byte source or a `BlockStore` directly — it
//! only defines the seam. The document engine implements these traits
//! around its own `BlockStore`/`BlockWriter` and wires a concrete instance
//! into the [`crate::ConversionContext`] before running a traversal, so
//! converters like `core/ndarray` can read or allocate blocks without this
//! crate depending on `asdf` itself.

use std::sync::Arc;

use asdf_block::CompressionCode;

use crate::error::ExtResult;

/// Read-direction block access, backed by an open document's `BlockStore`
/// and its byte source.
pub trait BlockReader {
    /// Materialize block `index`'s decoded payload.
    fn read_block(&mut self, index: usize) -> ExtResult<Arc<[u8]>>;

    /// Number of blocks available to read.
    fn block_count(&self) -> usize;
}

/// Write-direction counterpart to [`BlockReader`], backed by a
/// `BlockWriter` collecting blocks for a document about to be serialized.
pub trait BlockAllocator {
    /// Allocate a block for `data`, or reuse a prior allocation for the
    /// same underlying allocation if `share_base` and one already exists.
    /// Returns the block's index.
    fn write_block(&mut self, data: Arc<[u8]>, compression: CompressionCode, share_base: bool) -> usize;
}
