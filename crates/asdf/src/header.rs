//! The ASDF file header (`#ASDF`/`#ASDF_STANDARD` magic lines) and the
//! optional trailing block index, both of which live outside the YAML
//! document body proper and so are this crate's responsibility rather than
//! `asdf-tree`'s.

use std::io::SeekFrom;

use asdf_block::BlockIndex;
use asdf_io::ByteSource;

use crate::error::{AsdfError, AsdfResult};

/// A file's declared format and standard versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// `#ASDF <M.m.p>`: the on-disk container format version.
    pub file_format_version: (u64, u64, u64),
    /// `#ASDF_STANDARD <M.m.p>`: the ASDF Standard this document conforms
    /// to, defaulted to `file_format_version` when the line is absent.
    pub standard_version: (u64, u64, u64),
}

/// Result of [`parse_header`]: the parsed version lines, plus the first
/// line of the YAML body itself. Forward-only sources cannot be rewound
/// once that line is read off the wire, so it is handed back rather than
/// pushed back onto `source`.
pub struct ParsedHeader {
    /// The parsed header.
    pub header: FileHeader,
    /// The `---` line (or whatever followed the last header/comment line),
    /// already consumed from `source`.
    pub first_body_line: String,
}

const MAGIC_PREFIX: &str = "#ASDF ";
const STANDARD_PREFIX: &str = "#ASDF_STANDARD ";

/// Highest file-format version this engine was validated against.
pub const SUPPORTED_FILE_FORMAT_VERSION: (u64, u64, u64) = (1, 1, 0);

/// Parse the version + comment lines at the start of `source`, leaving the
/// cursor positioned immediately after the line returned in
/// [`ParsedHeader::first_body_line`].
pub fn parse_header(source: &mut dyn ByteSource) -> AsdfResult<ParsedHeader> {
    let first = read_line(source)?;
    let version_str = first.trim_end().strip_prefix(MAGIC_PREFIX).ok_or(AsdfError::MissingMagic)?;
    let file_format_version = parse_version(version_str).ok_or(AsdfError::MissingMagic)?;
    if file_format_version.0 > SUPPORTED_FILE_FORMAT_VERSION.0 {
        return Err(AsdfError::UnsupportedFileFormatVersion {
            found: format_version(file_format_version),
            supported: format_version(SUPPORTED_FILE_FORMAT_VERSION),
        });
    }

    let mut standard_version = file_format_version;
    loop {
        let line = read_line(source)?;
        let trimmed = line.trim_end();
        if let Some(rest) = trimmed.strip_prefix(STANDARD_PREFIX) {
            if let Some(v) = parse_version(rest) {
                standard_version = v;
            }
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with('%') {
            // Plain comment or a %TAG / %YAML directive line; neither
            // changes the header's recorded versions.
            continue;
        }
        return Ok(ParsedHeader { header: FileHeader { file_format_version, standard_version }, first_body_line: line });
    }
}

/// Render the header lines (magic + standard version), ready to be
/// followed directly by the YAML document's `---` line.
pub fn render_header(header: &FileHeader) -> String {
    let mut out = format!("#ASDF {}\n", format_version(header.file_format_version));
    if header.standard_version != header.file_format_version {
        out.push_str(&format!("#ASDF_STANDARD {}\n", format_version(header.standard_version)));
    }
    out
}

fn parse_version(s: &str) -> Option<(u64, u64, u64)> {
    let mut parts = s.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next().unwrap_or("0").parse().ok()?;
    Some((major, minor, patch))
}

fn format_version(v: (u64, u64, u64)) -> String {
    format!("{}.{}.{}", v.0, v.1, v.2)
}

fn read_line(source: &mut dyn ByteSource) -> AsdfResult<String> {
    let bytes = source.read_until(b'\n')?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Magic comment line that opens the (optional) trailing block index
/// document.
pub const BLOCK_INDEX_MAGIC: &str = "#ASDF BLOCK INDEX";

/// Bytes from the end of the file searched for [`BLOCK_INDEX_MAGIC`] before
/// concluding none is present.
const BLOCK_INDEX_SEARCH_WINDOW: u64 = 16 * 1024;

/// Look for a trailing block index by scanning the last
/// [`BLOCK_INDEX_SEARCH_WINDOW`] bytes of the file for its magic comment,
/// parsing the flow-sequence of offsets that follows. Returns `None` (not
/// an error) when no index is present, which is the common case for a
/// freshly-streamed file.
pub fn find_block_index(source: &mut dyn ByteSource, file_size: u64) -> AsdfResult<Option<BlockIndex>> {
    if !source.is_seekable() || file_size == 0 {
        return Ok(None);
    }
    let window_start = file_size.saturating_sub(BLOCK_INDEX_SEARCH_WINDOW);
    source.seek(SeekFrom::Start(window_start))?;
    let tail = source.read((file_size - window_start) as usize)?;
    let text = String::from_utf8_lossy(&tail);
    let Some(magic_at) = text.find(BLOCK_INDEX_MAGIC) else { return Ok(None) };
    let Some(open) = text[magic_at..].find('[') else { return Ok(None) };
    let Some(close_rel) = text[magic_at + open..].find(']') else { return Ok(None) };
    let seq = &text[magic_at + open + 1..magic_at + open + close_rel];
    let offsets = seq
        .split(',')
        .filter_map(|s| s.trim().parse::<u64>().ok())
        .collect();
    Ok(Some(BlockIndex { offsets }))
}

/// Render the trailing block index document for `index`, ready to be
/// appended after the last block's bytes.
pub fn render_block_index(index: &BlockIndex) -> String {
    if index.offsets.is_empty() {
        return String::new();
    }
    let offsets = index.offsets.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    format!("{BLOCK_INDEX_MAGIC}\n%YAML 1.1\n--- [{offsets}]\n...\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use asdf_io::MemorySource;

    #[test]
    fn parses_magic_and_standard_lines() {
        let mut source = MemorySource::new(b"#ASDF 1.0.0\n#ASDF_STANDARD 1.6.0\n---\n".to_vec());
        let parsed = parse_header(&mut source).unwrap();
        assert_eq!(parsed.header.file_format_version, (1, 0, 0));
        assert_eq!(parsed.header.standard_version, (1, 6, 0));
        assert_eq!(parsed.first_body_line, "---\n");
    }

    #[test]
    fn standard_defaults_to_file_format_version_when_absent() {
        let mut source = MemorySource::new(b"#ASDF 1.1.0\n---\n".to_vec());
        let parsed = parse_header(&mut source).unwrap();
        assert_eq!(parsed.header.standard_version, (1, 1, 0));
    }

    #[test]
    fn skips_comment_and_tag_handle_lines() {
        let mut source = MemorySource::new(b"#ASDF 1.0.0\n# a comment\n%TAG !core! tag:stsci.edu:asdf/core/\n---\n".to_vec());
        let parsed = parse_header(&mut source).unwrap();
        assert_eq!(parsed.first_body_line, "---\n");
    }

    #[test]
    fn rejects_missing_magic() {
        let mut source = MemorySource::new(b"not-asdf\n".to_vec());
        assert!(matches!(parse_header(&mut source), Err(AsdfError::MissingMagic)));
    }

    #[test]
    fn block_index_round_trips_through_rendering() {
        let index = BlockIndex { offsets: vec![128, 4096] };
        let rendered = render_block_index(&index);
        let mut source = MemorySource::new(rendered.clone().into_bytes());
        let size = rendered.len() as u64;
        let found = find_block_index(&mut source, size).unwrap().unwrap();
        assert_eq!(found.offsets, vec![128, 4096]);
    }

    #[test]
    fn missing_block_index_returns_none() {
        let mut source = MemorySource::new(b"no index here\n".to_vec());
        assert!(find_block_index(&mut source, 14).unwrap().is_none());
    }
}
