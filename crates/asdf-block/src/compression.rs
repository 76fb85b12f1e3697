//! Pluggable block compression.
//!
//! A [`Compressor`] is keyed by its 4-byte [`CompressionCode`]; the
//! extension registry (component F) registers additional codes at runtime,
//! so the block store itself only knows the three built-ins that ship with
//! the core engine plus whatever a [`CompressorRegistry`] is handed at call
//! time.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use crate::error::{BlockError, BlockResult};
use crate::header::{CompressionCode, COMPRESSION_NONE};

/// Maximum allowed decompressed size (1 GiB), guarding against
/// decompression-bomb blocks with an implausible `data_size`.
pub const MAX_DECOMPRESSED_SIZE: u64 = 1024 * 1024 * 1024;

/// A chunked compressor/decompressor for one compression code.
pub trait Compressor: Send + Sync {
    /// The 4-byte code this compressor handles.
    fn code(&self) -> CompressionCode;

    /// Compress `data`, returning the compressed bytes.
    fn compress(&self, data: &[u8]) -> BlockResult<Vec<u8>>;

    /// Decompress `data` into a buffer of exactly `expected_len` bytes.
    fn decompress(&self, data: &[u8], expected_len: u64) -> BlockResult<Vec<u8>>;
}

/// The identity compressor: `compress`/`decompress` are no-ops.
#[derive(Debug, Default)]
pub struct NoneCompressor;

impl Compressor for NoneCompressor {
    fn code(&self) -> CompressionCode {
        COMPRESSION_NONE
    }

    fn compress(&self, data: &[u8]) -> BlockResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], expected_len: u64) -> BlockResult<Vec<u8>> {
        if data.len() as u64 != expected_len {
            return Err(BlockError::DataSizeMismatch {
                index: usize::MAX,
                expected: expected_len,
                actual: data.len() as u64,
            });
        }
        Ok(data.to_vec())
    }
}

/// `zlib`-coded compressor, backed by `flate2`.
#[derive(Debug, Default)]
pub struct ZlibCompressor;

impl Compressor for ZlibCompressor {
    fn code(&self) -> CompressionCode {
        *b"zlib"
    }

    fn compress(&self, data: &[u8]) -> BlockResult<Vec<u8>> {
        use flate2::Compression;
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(data)
            .map_err(|e| BlockError::CompressionFailed(format!("zlib compress: {e}")))?;
        encoder
            .finish()
            .map_err(|e| BlockError::CompressionFailed(format!("zlib compress: {e}")))
    }

    fn decompress(&self, data: &[u8], expected_len: u64) -> BlockResult<Vec<u8>> {
        if expected_len > MAX_DECOMPRESSED_SIZE {
            return Err(BlockError::DataSizeMismatch {
                index: usize::MAX,
                expected: expected_len,
                actual: 0,
            });
        }
        use flate2::read::ZlibDecoder;
        let mut decoder = ZlibDecoder::new(data);
        let mut out = Vec::with_capacity(expected_len as usize);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| BlockError::CompressionFailed(format!("zlib decompress: {e}")))?;
        if out.len() as u64 != expected_len {
            return Err(BlockError::DataSizeMismatch {
                index: usize::MAX,
                expected: expected_len,
                actual: out.len() as u64,
            });
        }
        Ok(out)
    }
}

/// `lz4 `-coded compressor (space-padded per the on-disk code table), backed
/// by `lz4_flex`'s block format with an explicit decompressed-size prefix.
#[derive(Debug, Default)]
pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn code(&self) -> CompressionCode {
        *b"lz4 "
    }

    fn compress(&self, data: &[u8]) -> BlockResult<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(data))
    }

    fn decompress(&self, data: &[u8], expected_len: u64) -> BlockResult<Vec<u8>> {
        if expected_len > MAX_DECOMPRESSED_SIZE {
            return Err(BlockError::DataSizeMismatch {
                index: usize::MAX,
                expected: expected_len,
                actual: 0,
            });
        }
        let out = lz4_flex::decompress_size_prepended(data)
            .map_err(|e| BlockError::CompressionFailed(format!("lz4 decompress: {e}")))?;
        if out.len() as u64 != expected_len {
            return Err(BlockError::DataSizeMismatch {
                index: usize::MAX,
                expected: expected_len,
                actual: out.len() as u64,
            });
        }
        Ok(out)
    }
}

/// Registry of compressors keyed by 4-byte code, consulted by the block
/// store on read and write. Starts with the three built-in codes; the
/// extension registry adds more via [`CompressorRegistry::register`].
#[derive(Clone)]
pub struct CompressorRegistry {
    by_code: HashMap<CompressionCode, Arc<dyn Compressor>>,
}

impl Default for CompressorRegistry {
    fn default() -> Self {
        let mut registry = Self { by_code: HashMap::new() };
        registry.register(Arc::new(NoneCompressor));
        registry.register(Arc::new(ZlibCompressor));
        registry.register(Arc::new(Lz4Compressor));
        registry
    }
}

impl CompressorRegistry {
    /// Create a registry with no compressors registered at all (not even
    /// the built-ins) — useful for exercising [`BlockError::UnknownCompression`].
    pub fn empty() -> Self {
        Self { by_code: HashMap::new() }
    }

    /// Register (or override) a compressor for its code.
    pub fn register(&mut self, compressor: Arc<dyn Compressor>) {
        self.by_code.insert(compressor.code(), compressor);
    }

    /// Look up a compressor by code.
    pub fn get(&self, code: CompressionCode) -> Option<Arc<dyn Compressor>> {
        self.by_code.get(&code).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_round_trips() {
        let c = NoneCompressor;
        let data = b"hello block store";
        let compressed = c.compress(data).expect("compress");
        let decompressed = c.decompress(&compressed, data.len() as u64).expect("decompress");
        assert_eq!(decompressed, data);
    }

    #[test]
    fn zlib_round_trips() {
        let c = ZlibCompressor;
        let data = vec![42u8; 4096];
        let compressed = c.compress(&data).expect("compress");
        assert!(compressed.len() < data.len());
        let decompressed = c.decompress(&compressed, data.len() as u64).expect("decompress");
        assert_eq!(decompressed, data);
    }

    #[test]
    fn lz4_round_trips() {
        let c = Lz4Compressor;
        let data = b"lz4 lz4 lz4 lz4 lz4 lz4 lz4 lz4".repeat(64);
        let compressed = c.compress(&data).expect("compress");
        let decompressed = c.decompress(&compressed, data.len() as u64).expect("decompress");
        assert_eq!(decompressed, data);
    }

    #[test]
    fn registry_default_has_built_ins() {
        let registry = CompressorRegistry::default();
        assert!(registry.get(COMPRESSION_NONE).is_some());
        assert!(registry.get(*b"zlib").is_some());
        assert!(registry.get(*b"lz4 ").is_some());
        assert!(registry.get(*b"bzp2").is_none());
    }

    #[test]
    fn empty_registry_has_nothing() {
        let registry = CompressorRegistry::empty();
        assert!(registry.get(COMPRESSION_NONE).is_none());
    }
}
