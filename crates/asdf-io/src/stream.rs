//! Forward-only stream byte source: no seek, no mmap.

use std::io::Read;

use crate::{ByteSource, IoError, IoResult, MappedRegion};

/// Wraps any [`Read`] implementation as a forward-only [`ByteSource`].
///
/// Operations that require seeking (block index lookups, in-place update)
/// fail with [`IoError::NotSeekable`], forcing the caller onto a
/// linear-scan or full-rewrite path, per the byte-I/O façade contract.
pub struct StreamSource<R> {
    reader: R,
    pos: u64,
}

impl<R: Read> StreamSource<R> {
    /// Wrap `reader` as a forward-only source starting at position 0.
    pub fn new(reader: R) -> Self {
        Self { reader, pos: 0 }
    }
}

impl<R> std::fmt::Debug for StreamSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSource").field("pos", &self.pos).finish()
    }
}

impl<R: Read> ByteSource for StreamSource<R> {
    fn read(&mut self, n: usize) -> IoResult<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let mut read = 0;
        while read < n {
            let got = self.reader.read(&mut buf[read..])?;
            if got == 0 {
                break;
            }
            read += got;
        }
        self.pos += read as u64;
        if read < n {
            return Err(IoError::UnexpectedEof { requested: n, got: read });
        }
        Ok(buf)
    }

    fn read_until(&mut self, delim: u8) -> IoResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let got = self.reader.read(&mut byte)?;
            if got == 0 {
                return Err(IoError::DelimiterNotFound);
            }
            self.pos += 1;
            out.push(byte[0]);
            if byte[0] == delim {
                return Ok(out);
            }
        }
    }

    fn seek(&mut self, _pos: std::io::SeekFrom) -> IoResult<u64> {
        Err(IoError::NotSeekable)
    }

    fn tell(&mut self) -> IoResult<u64> {
        Ok(self.pos)
    }

    fn write(&mut self, _buf: &[u8]) -> IoResult<usize> {
        Err(IoError::NotWritable)
    }

    fn size(&mut self) -> IoResult<Option<u64>> {
        Ok(None)
    }

    fn truncate(&mut self, _size: u64) -> IoResult<()> {
        Err(IoError::NotSeekable)
    }

    fn memmap(&self, _range: std::ops::Range<u64>) -> IoResult<Option<MappedRegion>> {
        Ok(None)
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn is_random(&self) -> bool {
        false
    }

    fn close(&mut self) -> IoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn seek_fails_on_stream_source() {
        let mut src = StreamSource::new(Cursor::new(b"abc".to_vec()));
        assert!(matches!(
            src.seek(std::io::SeekFrom::Start(0)),
            Err(IoError::NotSeekable)
        ));
    }

    #[test]
    fn read_advances_position() {
        let mut src = StreamSource::new(Cursor::new(b"hello".to_vec()));
        let got = src.read(3).expect("read");
        assert_eq!(got, b"hel");
        assert_eq!(src.tell().expect("tell"), 3);
    }
}
