//! A single block's storage class and materialized payload.

use std::sync::Arc;

use asdf_io::MappedRegion;

use crate::header::BlockHeader;

/// Where a block's bytes physically live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageClass {
    /// Binary payload lives in the same file as the YAML document.
    Internal,
    /// Binary payload lives in a sibling file, `<stem>NNNN.asdf`.
    External {
        /// URI (or bare filename) of the companion file.
        uri: String,
    },
    /// Binary payload is encoded inline as a YAML sequence of scalars —
    /// there is no block header at all for this storage class.
    Inline,
}

/// A materialized block payload: either owned bytes (decompressed, or read
/// directly) or a live memory mapping shared with the document's byte
/// source.
#[derive(Clone)]
pub enum BlockBuffer {
    /// Owned, heap-allocated bytes (decompressed blocks, in-memory sources).
    Owned(Arc<[u8]>),
    /// A live memory mapping over an uncompressed internal block.
    Mapped(MappedRegion),
}

impl BlockBuffer {
    /// Borrow the payload bytes regardless of backing storage.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Owned(buf) => buf,
            Self::Mapped(region) => region,
        }
    }

    /// Number of bytes in the payload.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// True if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for BlockBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockBuffer").field("len", &self.len()).finish()
    }
}

/// A block's on-disk location plus enough metadata to materialize it.
#[derive(Debug, Clone)]
pub struct BlockSlot {
    /// Header as read from (or to be written to) disk. `None` for inline
    /// blocks, which carry no header.
    pub header: Option<BlockHeader>,
    /// Storage class.
    pub storage: StorageClass,
    /// Byte offset of the header's first byte within the file, if internal
    /// and already laid out.
    pub file_offset: Option<u64>,
    /// Cached materialized payload, populated on first access so repeated
    /// lookups of the same block index return the same buffer (the
    /// at-most-one-materialization guarantee).
    pub cached: Option<BlockBuffer>,
}

impl BlockSlot {
    /// A not-yet-materialized internal block at a known file offset.
    pub fn internal(header: BlockHeader, file_offset: u64) -> Self {
        Self { header: Some(header), storage: StorageClass::Internal, file_offset: Some(file_offset), cached: None }
    }

    /// An external block, not yet loaded.
    pub fn external(header: BlockHeader, uri: impl Into<String>) -> Self {
        Self { header: Some(header), storage: StorageClass::External { uri: uri.into() }, file_offset: None, cached: None }
    }

    /// An inline block, materialized already (inline blocks are decoded
    /// directly from their YAML scalar sequence, never lazily).
    pub fn inline(data: Vec<u8>) -> Self {
        Self {
            header: None,
            storage: StorageClass::Inline,
            file_offset: None,
            cached: Some(BlockBuffer::Owned(Arc::from(data.into_boxed_slice()))),
        }
    }

    /// True if this is the (at most one) streamed block.
    pub fn is_streamed(&self) -> bool {
        self.header.as_ref().is_some_and(BlockHeader::is_streamed)
    }
}
