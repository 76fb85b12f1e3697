//! Block index bookkeeping, reading, writing, and view-sharing.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::sync::Arc;

use asdf_io::ByteSource;
use tracing::{debug, warn};

use crate::block::{BlockBuffer, BlockSlot, StorageClass};
use crate::compression::CompressorRegistry;
use crate::error::{BlockError, BlockResult};
use crate::header::{BlockHeader, CompressionCode};

/// A trailing sequence of byte offsets, one per internal block, permitting
/// `O(1)` block lookup without scanning. Presence is advisory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockIndex {
    /// File offsets of every internal block's header, in block order.
    pub offsets: Vec<u64>,
}

impl BlockIndex {
    /// Validate the index against a known file size: offsets must be
    /// strictly monotonic and the final entry plus a header must fit.
    pub fn sanity_check(&self, file_size: u64) -> bool {
        if self.offsets.is_empty() {
            return true;
        }
        for pair in self.offsets.windows(2) {
            if pair[1] <= pair[0] {
                return false;
            }
        }
        match self.offsets.last() {
            Some(&last) => last < file_size,
            None => true,
        }
    }
}

/// Where to materialize blocks from when resolving an external storage
/// class. The document engine implements this against its own byte-source
/// factory; the block store never opens files itself.
pub trait ExternalBlockSource {
    /// Fetch the raw (still-compressed, still-headered) bytes of the
    /// external block referenced by `uri`.
    fn fetch(&mut self, uri: &str) -> BlockResult<Vec<u8>>;
}

/// Owns every block's header, storage class, and (once accessed) decoded
/// payload for one open document.
#[derive(Debug, Default)]
pub struct BlockStore {
    slots: Vec<BlockSlot>,
}

impl BlockStore {
    /// An empty block store (a document with no `ndarray` blocks).
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Number of blocks known to this store.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if there are no blocks.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Read every internal block's header starting at `yaml_end`, honoring
    /// a previously-parsed block index when it passes [`BlockIndex::sanity_check`],
    /// else falling back to a linear scan. `file_size` is required to
    /// validate the index and to size the final streamed block, if any.
    pub fn read(
        source: &mut dyn ByteSource,
        yaml_end: u64,
        file_size: u64,
        block_index: Option<&BlockIndex>,
    ) -> BlockResult<Self> {
        let offsets = match block_index {
            Some(index) if index.sanity_check(file_size) => {
                debug!(count = index.offsets.len(), "using trailing block index");
                index.offsets.clone()
            }
            Some(_) => {
                warn!("block index failed sanity check, falling back to linear scan");
                Self::scan_offsets(source, yaml_end, file_size)?
            }
            None => Self::scan_offsets(source, yaml_end, file_size)?,
        };

        let mut slots = Vec::with_capacity(offsets.len());
        let mut seen_streamed = false;
        for (i, &offset) in offsets.iter().enumerate() {
            if offset >= file_size {
                return Err(BlockError::BlockIndexInvalid { index: i, offset, size: file_size });
            }
            source.seek(SeekFrom::Start(offset))?;
            let header = BlockHeader::read_from(source)?;
            if header.is_streamed() {
                if seen_streamed || i != offsets.len() - 1 {
                    return Err(BlockError::InvalidStreamedBlock);
                }
                seen_streamed = true;
            }
            slots.push(BlockSlot::internal(header, offset));
        }

        Ok(Self { slots })
    }

    /// Scan forward from the end of the YAML document, honoring each
    /// header's `allocated_size` to find the next block, until `file_size`
    /// is reached (or a streamed block, with `data_size == 0`, is found —
    /// which by definition extends to end-of-file and ends the scan).
    fn scan_offsets(source: &mut dyn ByteSource, yaml_end: u64, file_size: u64) -> BlockResult<Vec<u64>> {
        let mut offsets = Vec::new();
        let mut pos = yaml_end;
        while pos < file_size {
            source.seek(SeekFrom::Start(pos))?;
            let header = BlockHeader::read_from(source)?;
            offsets.push(pos);
            if header.is_streamed() {
                break;
            }
            pos += header.total_size();
        }
        Ok(offsets)
    }

    /// Materialize block `index`: memory-map it if uncompressed and the
    /// source is random-access, otherwise decompress into an owned buffer.
    /// Subsequent calls for the same index return the cached buffer.
    pub fn materialize(
        &mut self,
        index: usize,
        source: &mut dyn ByteSource,
        compressors: &CompressorRegistry,
    ) -> BlockResult<BlockBuffer> {
        let available = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(BlockError::BlockIndexOutOfRange { requested: index, available })?;

        if let Some(cached) = &slot.cached {
            return Ok(cached.clone());
        }

        let header = slot.header.clone().expect("non-inline slot always has a header");
        let file_offset = slot.file_offset.expect("internal slot always has a file offset");
        let payload_start = file_offset + u64::from(4 + 2 + header.header_size);

        let payload_len = if header.is_streamed() {
            source.size()?.map(|size| size.saturating_sub(payload_start)).unwrap_or(0)
        } else {
            header.used_size
        };

        let buffer = if header.compression == crate::header::COMPRESSION_NONE && source.is_random() {
            match source.memmap(payload_start..payload_start + payload_len)? {
                Some(region) => BlockBuffer::Mapped(region),
                None => {
                    source.seek(SeekFrom::Start(payload_start))?;
                    let raw = source.read(payload_len as usize)?;
                    BlockBuffer::Owned(Arc::from(raw.into_boxed_slice()))
                }
            }
        } else {
            source.seek(SeekFrom::Start(payload_start))?;
            let raw = source.read(payload_len as usize)?;
            let expected = if header.is_streamed() { payload_len } else { header.data_size };
            let compressor = compressors
                .get(header.compression)
                .ok_or(BlockError::UnknownCompression { index, code: header.compression })?;
            let decompressed = compressor.decompress(&raw, expected)?;
            BlockBuffer::Owned(Arc::from(decompressed.into_boxed_slice()))
        };

        slot.cached = Some(buffer.clone());
        Ok(buffer)
    }

    /// Iterate over every slot's storage class, in block order.
    pub fn storage_classes(&self) -> impl Iterator<Item = &StorageClass> {
        self.slots.iter().map(|s| &s.storage)
    }

    /// Push a pre-built slot (used when assembling a store from a writer's
    /// output, or from inline-decoded blocks).
    pub fn push(&mut self, slot: BlockSlot) -> usize {
        self.slots.push(slot);
        self.slots.len() - 1
    }
}

/// Builder-side view of a block awaiting compression + layout, used by the
/// document engine's writer. Multiple array descriptors may point at the
/// same `base` buffer (identified by pointer identity) to get view-sharing:
/// see [`BlockWriter::allocate_or_reuse`].
pub struct BlockWriter {
    compressors: CompressorRegistry,
    pending: Vec<(Arc<[u8]>, CompressionCode)>,
    by_identity: HashMap<usize, usize>,
}

impl BlockWriter {
    /// Start a new writer using the given compressor registry.
    pub fn new(compressors: CompressorRegistry) -> Self {
        Self { compressors, pending: Vec::new(), by_identity: HashMap::new() }
    }

    /// Allocate a new internal block for `base`, or reuse the block already
    /// allocated for this exact buffer (by pointer identity) when
    /// `share_base` is true — this is the `default_array_save_base`
    /// view-sharing behavior: two array descriptors over the same backing
    /// buffer produce exactly one block.
    pub fn allocate_or_reuse(&mut self, base: Arc<[u8]>, compression: CompressionCode, share_base: bool) -> usize {
        let identity = Arc::as_ptr(&base) as *const u8 as usize;
        if share_base {
            if let Some(&index) = self.by_identity.get(&identity) {
                return index;
            }
        }
        let index = self.pending.len();
        self.pending.push((base, compression));
        if share_base {
            self.by_identity.insert(identity, index);
        }
        index
    }

    /// Number of distinct blocks allocated so far.
    pub fn block_count(&self) -> usize {
        self.pending.len()
    }

    /// Compress and write every allocated block to `sink` in allocation
    /// (first-use) order, optionally marking the last block as streamed.
    /// Returns the [`BlockIndex`] of internal-block offsets, built only if
    /// `sink` is seekable and more than one internal block was written.
    pub fn write_all(&self, sink: &mut dyn ByteSource, stream_last: bool) -> BlockResult<BlockIndex> {
        let mut offsets = Vec::with_capacity(self.pending.len());
        for (i, (data, compression)) in self.pending.iter().enumerate() {
            let offset = sink.tell()?;
            let is_last_streamed = stream_last && i == self.pending.len() - 1;

            if is_last_streamed {
                let header = BlockHeader::streamed(*compression);
                header.write_to(sink)?;
                sink.write(data)?;
            } else {
                let compressor = self
                    .compressors
                    .get(*compression)
                    .ok_or(BlockError::UnknownCompression { index: i, code: *compression })?;
                let compressed = compressor.compress(data)?;
                let checksum = md5::compute(&compressed).0;
                let header = BlockHeader::new(
                    *compression,
                    compressed.len() as u64,
                    compressed.len() as u64,
                    data.len() as u64,
                    checksum,
                );
                header.write_to(sink)?;
                sink.write(&compressed)?;
            }
            offsets.push(offset);
        }

        if sink.is_seekable() && offsets.len() > 1 {
            Ok(BlockIndex { offsets })
        } else {
            Ok(BlockIndex::default())
        }
    }
}
