//! Uniform byte I/O façade for the ASDF core engine.
//!
//! Presents a single capability set over regular files, in-memory buffers,
//! and forward-only streams, so the block store and document engine never
//! need to know which concrete source backs a given [`ByteSource`]. Sources
//! that cannot seek report that honestly via [`ByteSource::is_seekable`]
//! rather than emulating random access; callers that need it get
//! [`IoError::NotSeekable`] and fall back to linear-scan / full-rewrite
//! paths in the higher layers.

mod error;
mod file;
mod memory;
mod stream;

pub use error::{IoError, IoResult};
pub use file::FileSource;
pub use memory::MemorySource;
pub use stream::StreamSource;

use std::io::SeekFrom;
use std::ops::Deref;
use std::sync::Arc;

/// A memory-mapped (or otherwise zero-copy) byte range, kept alive as long
/// as any descriptor referencing it is alive — see the concurrency model's
/// notes on block buffer ownership.
#[derive(Clone)]
pub struct MappedRegion {
    backing: Arc<memmap2::Mmap>,
    start: usize,
    end: usize,
}

impl MappedRegion {
    pub(crate) fn new(backing: Arc<memmap2::Mmap>, start: usize, end: usize) -> Self {
        Self { backing, start, end }
    }
}

impl Deref for MappedRegion {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.backing[self.start..self.end]
    }
}

impl std::fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("len", &(self.end - self.start))
            .finish()
    }
}

/// Uniform capability set over a byte-addressable source.
///
/// Implementations are not required to be thread-safe; a `Document` owns
/// exactly one `ByteSource` at a time (see the concurrency model in
/// `SPEC_FULL.md` §5).
pub trait ByteSource {
    /// Read exactly `n` bytes, advancing the cursor.
    fn read(&mut self, n: usize) -> IoResult<Vec<u8>>;

    /// Read bytes up to and including `delim`, or until the source is
    /// exhausted. Returns [`IoError::DelimiterNotFound`] if `delim` never
    /// appears and the source is forward-only (so the caller cannot retry
    /// from the start).
    fn read_until(&mut self, delim: u8) -> IoResult<Vec<u8>>;

    /// Reposition the cursor. Fails with [`IoError::NotSeekable`] on
    /// forward-only sources.
    fn seek(&mut self, pos: SeekFrom) -> IoResult<u64>;

    /// Current cursor position.
    fn tell(&mut self) -> IoResult<u64>;

    /// Write `buf` at the current cursor position, extending the source if
    /// necessary.
    fn write(&mut self, buf: &[u8]) -> IoResult<usize>;

    /// Total size in bytes, if known ahead of time.
    fn size(&mut self) -> IoResult<Option<u64>>;

    /// Truncate (or extend with zeroes) to exactly `size` bytes.
    fn truncate(&mut self, size: u64) -> IoResult<()>;

    /// Memory-map `range` if the source supports it (random-access,
    /// uncompressed, file-backed). Returns `Ok(None)` rather than an error
    /// when mapping simply isn't applicable for this source.
    fn memmap(&self, range: std::ops::Range<u64>) -> IoResult<Option<MappedRegion>>;

    /// Whether [`ByteSource::seek`] is supported.
    fn is_seekable(&self) -> bool;

    /// Whether the source supports efficient random access (as opposed to
    /// only sequential forward reads, even if technically seekable).
    fn is_random(&self) -> bool;

    /// Release any held resources (file handles, mappings). Implementations
    /// must make this safe to call more than once.
    fn close(&mut self) -> IoResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_region_derefs_to_slice() {
        let data = vec![1u8, 2, 3, 4, 5];
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("region.bin");
        std::fs::write(&path, &data).expect("write fixture");

        let mut src = FileSource::open(&path).expect("open");
        let region = src.memmap(0..5).expect("memmap call").expect("mapped");
        assert_eq!(&*region, &data[..]);
    }
}
