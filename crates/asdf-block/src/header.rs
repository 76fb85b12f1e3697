//! Fixed-layout block header, bit-exact across implementations.
//!
//! ```text
//! 4 bytes  magic "\xd3BLK"
//! 2 bytes  header-size (big-endian u16, measured from after magic)
//! 4 bytes  flags         (bit 0 = streamed; other bits reserved = 0)
//! 4 bytes  compression   (ASCII, NUL-padded; "" = none)
//! 8 bytes  allocated_size (u64 BE)
//! 8 bytes  used_size      (u64 BE)
//! 8 bytes  data_size      (u64 BE, size after decompression)
//! 16 bytes checksum       (MD5 of compressed bytes, or all zero)
//! ```

use binrw::io::{Read, Seek, Write};
use binrw::{BinRead, BinResult, BinWrite};

use asdf_io::ByteSource;

use crate::error::{BlockError, BlockResult};

/// Block header magic bytes
pub const BLOCK_MAGIC: [u8; 4] = [0xd3, b'B', b'L', b'K'];

/// Size of the fixed part of the header after the magic and header-size
/// fields: flags(4) + compression(4) + allocated(8) + used(8) + data(8) +
/// checksum(16).
pub const FIXED_HEADER_TAIL: u16 = 48;

/// Flag bit indicating this is the (at most one, trailing) streamed block.
pub const FLAG_STREAMED: u32 = 0x1;

/// 4-byte ASCII compression code, NUL-padded. Empty (`[0,0,0,0]`) means
/// uncompressed.
pub type CompressionCode = [u8; 4];

/// No-compression code: four NUL bytes.
pub const COMPRESSION_NONE: CompressionCode = [0, 0, 0, 0];

/// Fixed-layout block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Header size field as read from disk (normally [`FIXED_HEADER_TAIL`]).
    pub header_size: u16,
    /// Bit flags; only bit 0 (streamed) is currently defined.
    pub flags: u32,
    /// 4-byte compression code.
    pub compression: CompressionCode,
    /// Bytes reserved on disk for this block (payload + padding).
    pub allocated_size: u64,
    /// Bytes actually occupied by the (possibly compressed) payload.
    pub used_size: u64,
    /// Size of the payload after decompression.
    pub data_size: u64,
    /// MD5 checksum of the compressed bytes, or all-zero if unset.
    pub checksum: [u8; 16],
}

/// Read exactly `N` bytes for a fixed-width header field, turning a short
/// read into an explicit [`BlockError::TruncatedHeader`] rather than
/// silently defaulting the field to zero.
fn read_array<const N: usize>(source: &mut dyn ByteSource, offset: u64) -> BlockResult<[u8; N]> {
    let bytes = source.read(N)?;
    let got = bytes.len();
    bytes.try_into().map_err(|_| BlockError::TruncatedHeader { offset, expected: N, got })
}

impl BlockHeader {
    /// True if bit 0 of `flags` is set.
    pub fn is_streamed(&self) -> bool {
        self.flags & FLAG_STREAMED != 0
    }

    /// Total on-disk size of header + allocation.
    pub fn total_size(&self) -> u64 {
        u64::from(4 + 2 + self.header_size) + self.allocated_size
    }

    /// Build a header for an uncompressed or compressed, non-streamed block.
    pub fn new(
        compression: CompressionCode,
        allocated_size: u64,
        used_size: u64,
        data_size: u64,
        checksum: [u8; 16],
    ) -> Self {
        Self {
            header_size: FIXED_HEADER_TAIL,
            flags: 0,
            compression,
            allocated_size,
            used_size,
            data_size,
            checksum,
        }
    }

    /// Build a header for the (at most one) trailing streamed block: its
    /// size fields read as zero and the decoder extends to end-of-file.
    pub fn streamed(compression: CompressionCode) -> Self {
        Self {
            header_size: FIXED_HEADER_TAIL,
            flags: FLAG_STREAMED,
            compression,
            allocated_size: 0,
            used_size: 0,
            data_size: 0,
            checksum: [0; 16],
        }
    }

    /// Parse a header directly from a [`ByteSource`] at its current
    /// position, advancing the cursor past it. This is the path used by
    /// the block store, which only ever sees sources as trait objects;
    /// [`BinRead`]/[`BinWrite`] above exist for the fixed-layout byte
    /// contract itself and for tests driven over an in-memory `Cursor`.
    pub fn read_from(source: &mut dyn ByteSource) -> BlockResult<Self> {
        let offset = source.tell()?;

        let magic = source.read(4)?;
        if magic.as_slice() != BLOCK_MAGIC {
            let mut found = [0u8; 4];
            found[..magic.len()].copy_from_slice(&magic);
            return Err(BlockError::InvalidMagic { offset, found });
        }

        let header_size = u16::from_be_bytes(read_array::<2>(source, offset)?);
        let flags = u32::from_be_bytes(read_array::<4>(source, offset)?);
        let compression: CompressionCode = read_array::<4>(source, offset)?;
        let allocated_size = u64::from_be_bytes(read_array::<8>(source, offset)?);
        let used_size = u64::from_be_bytes(read_array::<8>(source, offset)?);
        let data_size = u64::from_be_bytes(read_array::<8>(source, offset)?);
        let checksum = read_array::<16>(source, offset)?;

        if header_size > FIXED_HEADER_TAIL {
            let skip = (header_size - FIXED_HEADER_TAIL) as usize;
            source.read(skip)?;
        }

        Ok(Self { header_size, flags, compression, allocated_size, used_size, data_size, checksum })
    }

    /// Serialize a header directly to a [`ByteSource`] at its current
    /// position.
    pub fn write_to(&self, sink: &mut dyn ByteSource) -> BlockResult<()> {
        sink.write(&BLOCK_MAGIC)?;
        sink.write(&self.header_size.to_be_bytes())?;
        sink.write(&self.flags.to_be_bytes())?;
        sink.write(&self.compression)?;
        sink.write(&self.allocated_size.to_be_bytes())?;
        sink.write(&self.used_size.to_be_bytes())?;
        sink.write(&self.data_size.to_be_bytes())?;
        sink.write(&self.checksum)?;
        Ok(())
    }
}

impl BinRead for BlockHeader {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != BLOCK_MAGIC {
            return Err(binrw::Error::Custom {
                pos,
                err: Box::new(BlockError::InvalidMagic { offset: pos, found: magic }),
            });
        }

        let header_size = u16::read_options(reader, binrw::Endian::Big, ())?;
        let flags = u32::read_options(reader, binrw::Endian::Big, ())?;
        let mut compression = [0u8; 4];
        reader.read_exact(&mut compression)?;
        let allocated_size = u64::read_options(reader, binrw::Endian::Big, ())?;
        let used_size = u64::read_options(reader, binrw::Endian::Big, ())?;
        let data_size = u64::read_options(reader, binrw::Endian::Big, ())?;
        let mut checksum = [0u8; 16];
        reader.read_exact(&mut checksum)?;

        // Forward compatibility: if a future writer grew the header, skip
        // whatever trailing bytes we don't understand.
        if header_size > FIXED_HEADER_TAIL {
            let skip = i64::from(header_size - FIXED_HEADER_TAIL);
            reader.seek(std::io::SeekFrom::Current(skip))?;
        }

        Ok(Self {
            header_size,
            flags,
            compression,
            allocated_size,
            used_size,
            data_size,
            checksum,
        })
    }
}

impl BinWrite for BlockHeader {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        writer.write_all(&BLOCK_MAGIC)?;
        self.header_size.write_options(writer, binrw::Endian::Big, ())?;
        self.flags.write_options(writer, binrw::Endian::Big, ())?;
        writer.write_all(&self.compression)?;
        self.allocated_size.write_options(writer, binrw::Endian::Big, ())?;
        self.used_size.write_options(writer, binrw::Endian::Big, ())?;
        self.data_size.write_options(writer, binrw::Endian::Big, ())?;
        writer.write_all(&self.checksum)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::io::Cursor;

    #[test]
    fn round_trips_through_bytes() {
        let header = BlockHeader::new(COMPRESSION_NONE, 128, 64, 64, [7u8; 16]);
        let mut buf = Vec::new();
        let mut cursor = Cursor::new(&mut buf);
        header.write_options(&mut cursor, binrw::Endian::Big, ()).expect("write");

        let mut read_cursor = Cursor::new(&buf);
        let parsed =
            BlockHeader::read_options(&mut read_cursor, binrw::Endian::Big, ()).expect("read");
        assert_eq!(parsed, header);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; 52];
        buf[0..4].copy_from_slice(b"XXXX");
        let mut cursor = Cursor::new(&buf);
        let err = BlockHeader::read_options(&mut cursor, binrw::Endian::Big, ()).unwrap_err();
        assert!(matches!(err, binrw::Error::Custom { .. }));
    }

    #[test]
    fn streamed_header_has_zero_sizes() {
        let header = BlockHeader::streamed(COMPRESSION_NONE);
        assert!(header.is_streamed());
        assert_eq!(header.data_size, 0);
        assert_eq!(header.used_size, 0);
    }
}
