//! Regular-file byte source, with on-demand memory mapping.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::{ByteSource, IoError, IoResult, MappedRegion};

/// A regular file on disk: fully random-access, seekable, and mappable.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    writable: bool,
}

impl FileSource {
    /// Open an existing file read-only.
    pub fn open(path: impl AsRef<Path>) -> IoResult<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self { file, writable: false })
    }

    /// Open or create a file for read/write access.
    pub fn create(path: impl AsRef<Path>) -> IoResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        Ok(Self { file, writable: true })
    }

    /// Open an existing file for read/write access without truncating it
    /// (used by in-place update).
    pub fn open_read_write(path: impl AsRef<Path>) -> IoResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        Ok(Self { file, writable: true })
    }
}

impl ByteSource for FileSource {
    fn read(&mut self, n: usize) -> IoResult<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let mut read = 0;
        while read < n {
            let got = self.file.read(&mut buf[read..])?;
            if got == 0 {
                break;
            }
            read += got;
        }
        if read < n {
            return Err(IoError::UnexpectedEof { requested: n, got: read });
        }
        Ok(buf)
    }

    fn read_until(&mut self, delim: u8) -> IoResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let read = self.file.read(&mut byte)?;
            if read == 0 {
                return Err(IoError::DelimiterNotFound);
            }
            out.push(byte[0]);
            if byte[0] == delim {
                return Ok(out);
            }
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> IoResult<u64> {
        Ok(self.file.seek(pos)?)
    }

    fn tell(&mut self) -> IoResult<u64> {
        Ok(self.file.stream_position()?)
    }

    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        if !self.writable {
            return Err(IoError::NotWritable);
        }
        Ok(self.file.write(buf)?)
    }

    fn size(&mut self) -> IoResult<Option<u64>> {
        Ok(Some(self.file.metadata()?.len()))
    }

    fn truncate(&mut self, size: u64) -> IoResult<()> {
        if !self.writable {
            return Err(IoError::NotWritable);
        }
        self.file.set_len(size)?;
        Ok(())
    }

    fn memmap(&self, range: std::ops::Range<u64>) -> IoResult<Option<MappedRegion>> {
        let len = self.file.metadata()?.len();
        if range.end > len {
            return Err(IoError::OutOfBounds {
                offset: range.start,
                len: range.end - range.start,
                size: len,
            });
        }
        debug!(start = range.start, end = range.end, "memory-mapping file range");
        // SAFETY: the file is not truncated or modified by another process
        // for the lifetime of the Document that owns this source; callers
        // are required (per the concurrency model) not to hold mappings
        // across an `update()` that changes block layout.
        let mmap = unsafe { memmap2::Mmap::map(&self.file)? };
        Ok(Some(MappedRegion::new(
            Arc::new(mmap),
            range.start as usize,
            range.end as usize,
        )))
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn is_random(&self) -> bool {
        true
    }

    fn close(&mut self) -> IoResult<()> {
        Ok(())
    }
}
