//! The document engine proper: `Document::open`/`write`/`update` orchestrate
//! components A (`asdf-io`) through F (`asdf-ext`) against one in-memory
//! tagged tree, per the open/write procedures.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::rc::Rc;
use std::sync::Arc;

use asdf_block::{BlockBuffer, BlockStore, BlockWriter, CompressorRegistry};
use asdf_ext::{BlockAllocator, BlockReader, ConversionContext, ConversionOutcome, ConverterMatch, NativeValue};
use asdf_io::ByteSource;
use asdf_schema::Schema;
use asdf_tree::{walk, CollectionStyle, Node, NodeKind, NodeRef, ScalarStyle};
use tracing::{debug, warn};

use crate::config::{AsdfContext, OpenOptions, ValidationPolicy, WriteOptions};
use crate::error::{AsdfError, AsdfResult, Warning};
use crate::header::{self, FileHeader};
use crate::history::History;

/// Read-direction block access for a [`Document::to_native`] call: every
/// block was materialized up front (the at-most-one-materialization
/// guarantee still holds — each block's bytes are decoded exactly once,
/// here, rather than lazily per converter), so this adapter owns plain
/// bytes and carries no borrow back into the document or its source.
struct MaterializedBlocks(Vec<Arc<[u8]>>);

impl BlockReader for MaterializedBlocks {
    fn read_block(&mut self, index: usize) -> asdf_ext::ExtResult<Arc<[u8]>> {
        self.0.get(index).cloned().ok_or(asdf_ext::ExtError::NoBlockAccess)
    }

    fn block_count(&self) -> usize {
        self.0.len()
    }
}

/// Write-direction block access for a [`Document::from_native`] call,
/// wrapping the [`BlockWriter`] the caller shares across `from_native` and
/// the later [`Document::write`].
struct WriterAllocator(Rc<RefCell<BlockWriter>>);

impl BlockAllocator for WriterAllocator {
    fn write_block(&mut self, data: Arc<[u8]>, compression: asdf_block::CompressionCode, share_base: bool) -> usize {
        self.0.borrow_mut().allocate_or_reuse(data, compression, share_base)
    }
}

/// One open ASDF document: its declared versions, its tagged tree, the
/// blocks backing any `ndarray` descriptors, and the extension-usage
/// bookkeeping a write records.
pub struct Document {
    /// Parsed `#ASDF`/`#ASDF_STANDARD` header.
    pub header: FileHeader,
    /// The tagged tree (component C), still addressable after `open`.
    pub tree: NodeRef,
    /// Binary blocks backing this document's `ndarray` descriptors.
    pub blocks: BlockStore,
    /// Extensions recorded as having produced this document's content.
    pub history: History,
    /// Byte span of the YAML body in the source this document was opened
    /// from, if it was opened from a seekable source — lets `update` decide
    /// whether the new body fits in the old span without a full rewrite.
    yaml_span: Option<(u64, u64)>,
}

/// A language-neutral stand-in for a tagged node with no registered
/// converter (or no tag at all): mappings and sequences become nested
/// containers, scalars become their literal text, so that a document with
/// unrecognized tags still round-trips through `to_native`/`from_native`.
/// Carries the original tag (if any) separately from the node structure,
/// since [`NodeRef`]'s `Rc`/`RefCell` internals are not `Send`/`Sync` and so
/// cannot be stored inside a [`NativeValue`] directly.
pub struct NativeContainer {
    /// The node's original tag, preserved for round-tripping even when no
    /// converter claimed it.
    pub tag: Option<String>,
    /// The node's structural content.
    pub kind: NativeContainerKind,
}

/// See [`NativeContainer`].
pub enum NativeContainerKind {
    /// A mapping, by field name.
    Mapping(Vec<(String, Arc<NativeValue>)>),
    /// A sequence.
    Sequence(Vec<Arc<NativeValue>>),
    /// A scalar leaf.
    Scalar(String),
}

/// A summary of the tree's shape, for introspection without touching
/// blocks or extensions.
#[derive(Debug, Default, Clone)]
pub struct TreeSummary {
    /// Number of mapping nodes.
    pub mapping_count: usize,
    /// Number of sequence nodes.
    pub sequence_count: usize,
    /// Number of scalar leaves.
    pub scalar_count: usize,
    /// Every distinct tag URI encountered, in first-seen order.
    pub tags: Vec<String>,
}

/// Locate the YAML document body within `text`, already past the header
/// lines consumed by [`header::parse_header`]: everything from
/// `first_body_line` through (and including) the closing `...` marker.
/// `asdf_tree::parse_document` tolerates the leading `---` and trailing
/// `...` itself, so this only needs to find where the body ends.
pub(crate) fn extract_yaml_body(text: &str) -> Option<String> {
    let mut body = String::new();
    let mut terminated = false;
    for line in text.lines() {
        if line.trim_end() == "...\n" || line.trim_end() == "..." {
            terminated = true;
            break;
        }
        // A trailing block index magic line marks the end of the YAML part
        // too, for callers that hand this function the whole remainder of
        // the file rather than a pre-sliced body.
        if line.trim_end() == header::BLOCK_INDEX_MAGIC {
            terminated = true;
            break;
        }
        body.push_str(line);
        body.push('\n');
    }
    if !terminated && body.is_empty() {
        return None;
    }
    Some(body)
}

impl Document {
    /// Open a document from `source`, per the six-step read procedure:
    /// parse the header, slice out the YAML body, parse it (C), optionally
    /// resolve `$ref`s (D) and validate (E), then locate its blocks (B).
    /// Native conversion is a separate step ([`Self::to_native`]) since a
    /// caller may only want read-only tree introspection.
    pub fn open(source: &mut dyn ByteSource, ctx: &AsdfContext, options: &OpenOptions) -> AsdfResult<(Self, Vec<Warning>)> {
        let mut warnings = Vec::new();

        let parsed = header::parse_header(source)?;
        if parsed.header.standard_version.0 > header::SUPPORTED_FILE_FORMAT_VERSION.0 {
            warnings.push(Warning::VersionMismatch { found: parsed.header.standard_version, supported: header::SUPPORTED_FILE_FORMAT_VERSION });
        }

        let body_start = source.is_seekable().then(|| source.tell()).transpose()?.map(|after_first_line| after_first_line.saturating_sub(parsed.first_body_line.len() as u64));

        let mut body = parsed.first_body_line;
        loop {
            let trimmed = body.trim_end();
            if trimmed.ends_with("...") || trimmed == "..." {
                break;
            }
            let line = match source.read_until(b'\n') {
                Ok(bytes) if !bytes.is_empty() => String::from_utf8_lossy(&bytes).into_owned(),
                Ok(_) | Err(asdf_io::IoError::DelimiterNotFound) => return Err(AsdfError::UnterminatedDocument),
                Err(other) => return Err(other.into()),
            };
            body.push_str(&line);
        }

        let tree = asdf_tree::parse_document(&body)?.unwrap_or_else(|| Node::mapping(Vec::new(), CollectionStyle::Block));

        let file_size = source.size()?;
        let yaml_end = source.is_seekable().then(|| source.tell()).transpose()?;
        let blocks = match file_size {
            Some(size) => {
                let yaml_end = yaml_end.unwrap_or(size);
                let block_index = if options.use_block_index {
                    match header::find_block_index(source, size) {
                        Ok(found) => found,
                        Err(_) => {
                            warnings.push(Warning::BlockIndexInvalid);
                            None
                        }
                    }
                } else {
                    None
                };
                if let Some(index) = &block_index {
                    if !index.sanity_check(size) {
                        warnings.push(Warning::BlockIndexInvalid);
                    }
                }
                BlockStore::read(source, yaml_end, size, block_index.as_ref())?
            }
            None => {
                debug!("forward-only source: skipping block discovery");
                BlockStore::new()
            }
        };

        if options.resolve_refs {
            let loader = crate::loader::FilesystemLoader::new();
            let resolver = asdf_resolver::Resolver::new(Arc::new(loader));
            resolver.resolve_references(&tree)?;
        }

        match options.validate {
            ValidationPolicy::Off => {}
            ValidationPolicy::Warn | ValidationPolicy::Raise => {
                let errors = asdf_schema::validate_document(&tree, None, &ctx.extensions, parsed.header.standard_version);
                if !errors.is_empty() {
                    if options.validate == ValidationPolicy::Raise {
                        return Err(AsdfError::ValidationFailed { errors });
                    }
                    warn!(count = errors.len(), "document failed validation");
                }
            }
        }

        let yaml_span = body_start.zip(yaml_end);
        let document = Self { header: parsed.header, tree, blocks, history: History::new(), yaml_span };
        Ok((document, warnings))
    }

    /// Convert the tagged tree to native objects via component F,
    /// traversing post-order and draining pending (cyclic) conversions to a
    /// fixpoint. Returns `AsdfError::UnresolvedReferenceCycle` if any
    /// conversion never unblocks.
    ///
    /// `source` is the byte source this document (or an equivalent copy of
    /// it) was opened from — a block-backed converter (`core/ndarray`)
    /// needs it to materialize the blocks its descriptors reference.
    /// `compressors` mirrors the registry a caller hands to [`BlockWriter::new`]
    /// on the write side; this crate has no way to derive one from
    /// `ctx.extensions` alone (see `DESIGN.md`).
    pub fn to_native(&mut self, ctx: &AsdfContext, conv: &mut ConversionContext, source: &mut dyn ByteSource, compressors: &CompressorRegistry) -> AsdfResult<(Arc<NativeValue>, Vec<Warning>)> {
        let mut warnings = Vec::new();
        let mut seen = HashMap::new();

        let mut materialized = Vec::with_capacity(self.blocks.len());
        for index in 0..self.blocks.len() {
            let buf = self.blocks.materialize(index, source, compressors)?;
            materialized.push(match buf {
                BlockBuffer::Owned(bytes) => bytes,
                BlockBuffer::Mapped(region) => Arc::from(region.as_slice().to_vec().into_boxed_slice()),
            });
        }
        conv.set_block_reader(Rc::new(RefCell::new(MaterializedBlocks(materialized))));

        let root = convert_node(&self.tree, ctx, conv, self.header.standard_version, &mut seen, &mut warnings)?;
        loop {
            let finished = conv.drain_reads()?;
            if finished.is_empty() {
                break;
            }
        }
        if conv.has_pending_reads() {
            return Err(AsdfError::UnresolvedReferenceCycle(conv.pending_read_count()));
        }
        Ok((root, warnings))
    }

    /// Build a document from a native object graph via component F,
    /// draining pending conversions, ready to be passed to [`Self::write`].
    /// `blocks` is shared with the caller so a block-backed converter
    /// (`core/ndarray`) can allocate into the same writer the caller later
    /// passes to [`Self::write`].
    pub fn from_native(value: &NativeValue, ctx: &AsdfContext, conv: &mut ConversionContext, options: &WriteOptions, history: &mut History, blocks: &Rc<RefCell<BlockWriter>>) -> AsdfResult<Self> {
        conv.set_block_allocator(Rc::new(RefCell::new(WriterAllocator(Rc::clone(blocks)))));
        let mut seen = HashMap::new();
        let tree = native_to_node(value, ctx, conv, &mut seen, history)?;
        loop {
            let finished = conv.drain_writes()?;
            if finished.is_empty() {
                break;
            }
        }
        if conv.has_pending_writes() {
            return Err(AsdfError::UnresolvedReferenceCycle(conv.pending_write_count()));
        }
        Ok(Self {
            header: FileHeader { file_format_version: options.file_format_version, standard_version: options.standard_version },
            tree,
            blocks: BlockStore::new(),
            history: std::mem::take(history),
            yaml_span: None,
        })
    }

    /// Serialize this document to `sink`: validate (E), emit the header and
    /// YAML body (C), then every block and (if the sink is seekable and
    /// more than one block was written) the trailing block index.
    /// `blocks` holds whatever binary payloads were allocated while
    /// building the tree (e.g. by an `ndarray` converter); this engine only
    /// lays them out, it does not decide which buffers back which node.
    pub fn write(&self, sink: &mut dyn ByteSource, ctx: &AsdfContext, blocks: &BlockWriter, document_schema: Option<&Schema>, options: &WriteOptions) -> AsdfResult<Vec<Warning>> {
        let mut warnings = Vec::new();

        match options.validate {
            ValidationPolicy::Off => {}
            ValidationPolicy::Warn | ValidationPolicy::Raise => {
                let errors = asdf_schema::validate_document(&self.tree, document_schema, &ctx.extensions, options.standard_version);
                if !errors.is_empty() {
                    if options.validate == ValidationPolicy::Raise {
                        return Err(AsdfError::ValidationFailed { errors });
                    }
                    warn!(count = errors.len(), "document failed validation before write");
                }
            }
        }

        self.write_history_into_tree();

        sink.write(header::render_header(&self.header).as_bytes())?;
        sink.write(b"---\n")?;
        sink.write(asdf_tree::emit_document(&self.tree).as_bytes())?;
        sink.write(b"...\n")?;

        let index = blocks.write_all(sink, options.stream_last_block)?;
        if sink.is_seekable() && !index.offsets.is_empty() {
            sink.write(header::render_block_index(&index).as_bytes())?;
        }
        if options.padding > 0 {
            sink.write(&vec![0u8; options.padding as usize])?;
        }

        Ok(warnings)
    }

    /// In-place update: only legal against a seekable source this document
    /// was `open`ed from. Recomputes the YAML body and, if it fits within
    /// the original body's byte span (padding with spaces, never larger
    /// than the span `open` recorded — [`crate::config::WriteOptions::padding`]
    /// does not enlarge this span, see its docs), overwrites it and leaves
    /// the blocks untouched; otherwise falls back to [`Self::write`]
    /// against a fresh sink positioned at the start, which is simpler than
    /// splicing a larger body into the middle of the file but costs a full
    /// rewrite.
    pub fn update(&self, sink: &mut dyn ByteSource, ctx: &AsdfContext, blocks: &BlockWriter, document_schema: Option<&Schema>, options: &WriteOptions) -> AsdfResult<Vec<Warning>> {
        let Some((start, end)) = self.yaml_span else {
            return self.write(sink, ctx, blocks, document_schema, options);
        };
        let mut rendered = header::render_header(&self.header);
        rendered.push_str("---\n");
        rendered.push_str(&asdf_tree::emit_document(&self.tree));
        rendered.push_str("...\n");

        if (rendered.len() as u64) > end.saturating_sub(start) || !sink.is_seekable() {
            return self.write(sink, ctx, blocks, document_schema, options);
        }

        sink.seek(SeekFrom::Start(start))?;
        sink.write(rendered.as_bytes())?;
        let padding = (end - start) - rendered.len() as u64;
        if padding > 0 {
            sink.write(&vec![b' '; padding as usize])?;
        }
        Ok(Vec::new())
    }

    /// Summarize the tree's shape without touching blocks or extensions.
    pub fn info(&self) -> TreeSummary {
        let mut summary = TreeSummary::default();
        walk(&self.tree, &mut |node| {
            let n = node.borrow();
            match &n.kind {
                NodeKind::Mapping { .. } => summary.mapping_count += 1,
                NodeKind::Sequence { .. } => summary.sequence_count += 1,
                NodeKind::Scalar { .. } => summary.scalar_count += 1,
                NodeKind::Alias { .. } => {}
            }
            if let Some(tag) = &n.tag {
                if !summary.tags.contains(tag) {
                    summary.tags.push(tag.clone());
                }
            }
        });
        summary
    }

    /// Collect every node for which `predicate` returns `true`.
    pub fn search(&self, predicate: impl Fn(&NodeRef) -> bool) -> Vec<NodeRef> {
        let mut out = Vec::new();
        walk(&self.tree, &mut |node| {
            if predicate(node) {
                out.push(node.clone());
            }
        });
        out
    }

    /// Splice this document's `history.entries()` into a top-level
    /// `asdf_library`/`history` mapping entry, creating it if absent. A
    /// simplification of the real format's richer history-entry schema
    /// (which also records a free-text description and timestamp); this
    /// engine only tracks which extensions fired.
    fn write_history_into_tree(&self) {
        if self.history.entries().is_empty() {
            return;
        }
        let mut root = self.tree.borrow_mut();
        let NodeKind::Mapping { entries, .. } = &mut root.kind else { return };
        let extensions_seq = Node::sequence(
            self.history
                .entries()
                .iter()
                .map(|record| {
                    Node::mapping(
                        vec![
                            (Node::scalar("extension_class", ScalarStyle::Plain), Node::scalar(record.name.clone(), ScalarStyle::Plain)),
                            (
                                Node::scalar("software", ScalarStyle::Plain),
                                Node::scalar(format!("{} {}.{}.{}", record.software, record.version.0, record.version.1, record.version.2), ScalarStyle::Plain),
                            ),
                        ],
                        CollectionStyle::Block,
                    )
                })
                .collect(),
            CollectionStyle::Block,
        );
        let history_key = "history";
        if let Some((_, value)) = entries.iter().find(|(k, _)| k.borrow().as_str() == Some(history_key)) {
            let mut history_mapping = value.borrow_mut();
            match &mut history_mapping.kind {
                NodeKind::Mapping { entries, .. } => {
                    entries.retain(|(k, _)| k.borrow().as_str() != Some("extensions"));
                    entries.push((Node::scalar("extensions", ScalarStyle::Plain), extensions_seq));
                }
                _ => {}
            }
        } else {
            entries.push((
                Node::scalar(history_key, ScalarStyle::Plain),
                Node::mapping(vec![(Node::scalar("extensions", ScalarStyle::Plain), extensions_seq)], CollectionStyle::Block),
            ));
        }
    }
}

fn convert_node(
    node: &NodeRef,
    ctx: &AsdfContext,
    conv: &mut ConversionContext,
    standard: (u64, u64, u64),
    seen: &mut HashMap<usize, Arc<NativeValue>>,
    warnings: &mut Vec<Warning>,
) -> AsdfResult<Arc<NativeValue>> {
    let identity = Rc::as_ptr(node) as usize;
    if let Some(existing) = seen.get(&identity) {
        return Ok(Arc::clone(existing));
    }

    let (tag, alias_target) = {
        let borrowed = node.borrow();
        match &borrowed.kind {
            NodeKind::Alias { target, .. } => (None, Some(target.clone())),
            _ => (borrowed.tag.clone(), None),
        }
    };

    if let Some(target) = alias_target {
        return match target.upgrade() {
            Some(target) => convert_node(&target, ctx, conv, standard, seen, warnings),
            None => Ok(Arc::new(NativeValue::new(NativeContainer { tag: None, kind: NativeContainerKind::Scalar(String::new()) }))),
        };
    }

    let value = if let Some(tag) = tag.as_deref() {
        match ctx.extensions.select_converter(tag, standard) {
            ConverterMatch::Exact(converter) => match converter.from_yaml_tree(node, tag, conv)? {
                ConversionOutcome::Done(v) => v,
                ConversionOutcome::Pending(mut pending) => {
                    let shell = pending.shell();
                    conv.defer_read(pending);
                    shell
                }
            },
            ConverterMatch::MajorMismatch => {
                warnings.push(Warning::UnknownTag { tag: tag.to_string() });
                build_container(node, Some(tag.to_string()), ctx, conv, standard, seen, warnings)?
            }
            ConverterMatch::None => {
                warnings.push(Warning::MissingExtension { tag: tag.to_string() });
                build_container(node, Some(tag.to_string()), ctx, conv, standard, seen, warnings)?
            }
        }
    } else {
        build_container(node, None, ctx, conv, standard, seen, warnings)?
    };

    let arc = Arc::new(value);
    seen.insert(identity, Arc::clone(&arc));
    Ok(arc)
}

fn build_container(
    node: &NodeRef,
    tag: Option<String>,
    ctx: &AsdfContext,
    conv: &mut ConversionContext,
    standard: (u64, u64, u64),
    seen: &mut HashMap<usize, Arc<NativeValue>>,
    warnings: &mut Vec<Warning>,
) -> AsdfResult<NativeValue> {
    let kind = node.borrow().kind.clone();
    let container_kind = match kind {
        NodeKind::Scalar { value, .. } => NativeContainerKind::Scalar(value),
        NodeKind::Mapping { entries, .. } => {
            let mut out = Vec::with_capacity(entries.len());
            for (key, value) in &entries {
                let key_text = key.borrow().as_str().unwrap_or_default().to_string();
                let converted = convert_node(value, ctx, conv, standard, seen, warnings)?;
                out.push((key_text, converted));
            }
            NativeContainerKind::Mapping(out)
        }
        NodeKind::Sequence { items, .. } => {
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                out.push(convert_node(item, ctx, conv, standard, seen, warnings)?);
            }
            NativeContainerKind::Sequence(out)
        }
        NodeKind::Alias { .. } => unreachable!("handled by convert_node before calling build_container"),
    };
    Ok(NativeValue::new(NativeContainer { tag, kind: container_kind }))
}

/// A converter sets a node's tag to the bare URI it advertises (e.g.
/// `tag:stsci.edu:asdf/core/ndarray-1.0.0`), the same string the extension
/// registry matches against. The parser/emitter pair only recognizes a tag
/// when it carries a YAML sigil, so a bare URI is wrapped in `!<...>`
/// verbatim-tag syntax before it ever reaches `asdf_tree::emit_document` —
/// otherwise the tag would be silently dropped on the next `open`.
fn ensure_verbatim_tag_syntax(node: &NodeRef) {
    let mut borrowed = node.borrow_mut();
    if let Some(tag) = &borrowed.tag {
        if !tag.starts_with('!') {
            borrowed.tag = Some(format!("!<{tag}>"));
        }
    }
}

fn native_to_node(value: &NativeValue, ctx: &AsdfContext, conv: &mut ConversionContext, seen: &mut HashMap<usize, NodeRef>, history: &mut History) -> AsdfResult<NodeRef> {
    let identity = value.identity();
    if let Some(existing) = seen.get(&identity) {
        return Ok(existing.clone());
    }

    if let Some(container) = value.downcast_ref::<NativeContainer>() {
        let node = match &container.kind {
            NativeContainerKind::Scalar(text) => Node::scalar(text.clone(), ScalarStyle::Plain),
            NativeContainerKind::Mapping(entries) => {
                let mut mapped = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let child = native_to_node(value, ctx, conv, seen, history)?;
                    mapped.push((Node::scalar(key.clone(), ScalarStyle::Plain), child));
                }
                Node::mapping(mapped, CollectionStyle::Block)
            }
            NativeContainerKind::Sequence(items) => {
                let mut mapped = Vec::with_capacity(items.len());
                for item in items {
                    mapped.push(native_to_node(item, ctx, conv, seen, history)?);
                }
                Node::sequence(mapped, CollectionStyle::Block)
            }
        };
        if container.tag.is_some() {
            node.borrow_mut().tag = container.tag.clone();
        }
        seen.insert(identity, node.clone());
        return Ok(node);
    }

    let type_name = value.type_name();
    let converter = ctx.extensions.select_converter_for_type(type_name).ok_or_else(|| AsdfError::UnknownType(type_name.to_string()))?;
    let candidates = converter.tags().to_vec();
    let tag = converter.select_tag(value, &candidates, conv).ok_or_else(|| AsdfError::UnknownType(type_name.to_string()))?;
    let node = match converter.to_yaml_tree(value, &tag, conv)? {
        ConversionOutcome::Done(node) => node,
        ConversionOutcome::Pending(mut pending) => {
            let shell = pending.shell();
            conv.defer_write(pending);
            shell
        }
    };
    ensure_verbatim_tag_syntax(&node);
    if let Some((name, version)) = ctx.extensions.extension_for_converter_type(type_name) {
        history.record(name, version);
    }
    conv.remember_node(identity, node.clone());
    seen.insert(identity, node.clone());
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use asdf_io::MemorySource;

    fn default_ctx() -> AsdfContext {
        AsdfContext::new(asdf_ext::ExtensionRegistry::new())
    }

    #[test]
    fn extract_yaml_body_stops_at_terminator() {
        let body = extract_yaml_body("---\na: 1\n...\ntrailing\n").unwrap();
        assert!(body.contains("a: 1"));
        assert!(!body.contains("trailing"));
    }

    #[test]
    fn opens_a_minimal_document() {
        let bytes = b"#ASDF 1.0.0\n#ASDF_STANDARD 1.6.0\n---\nfoo: bar\n...\n".to_vec();
        let mut source = MemorySource::new(bytes);
        let ctx = default_ctx();
        let (doc, warnings) = Document::open(&mut source, &ctx, &OpenOptions::default()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(doc.header.standard_version, (1, 6, 0));
        let found = doc.search(|n| n.borrow().as_str() == Some("bar"));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn rejects_unterminated_document() {
        let bytes = b"#ASDF 1.0.0\n---\nfoo: bar\n".to_vec();
        let mut source = MemorySource::new(bytes);
        let ctx = default_ctx();
        let err = Document::open(&mut source, &ctx, &OpenOptions::default()).unwrap_err();
        assert!(matches!(err, AsdfError::UnterminatedDocument));
    }

    #[test]
    fn untagged_round_trips_through_native_conversion() {
        let bytes = b"#ASDF 1.0.0\n---\nfoo: bar\nnums:\n  - 1\n  - 2\n...\n".to_vec();
        let mut source = MemorySource::new(bytes);
        let ctx = default_ctx();
        let (mut doc, _) = Document::open(&mut source, &ctx, &OpenOptions::default()).unwrap();
        let mut conv = ConversionContext::new();
        let compressors = asdf_block::CompressorRegistry::default();
        let (native, warnings) = doc.to_native(&ctx, &mut conv, &mut source, &compressors).unwrap();
        assert!(warnings.is_empty());
        assert!(native.downcast_ref::<NativeContainer>().is_some());

        let mut write_conv = ConversionContext::new();
        let mut history = History::new();
        let options = WriteOptions::default();
        let blocks = Rc::new(RefCell::new(BlockWriter::new(asdf_block::CompressorRegistry::default())));
        let rebuilt = Document::from_native(&native, &ctx, &mut write_conv, &options, &mut history, &blocks).unwrap();
        let found = rebuilt.search(|n| n.borrow().as_str() == Some("bar"));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn writes_header_and_body_and_terminator() {
        let bytes = b"#ASDF 1.0.0\n---\nfoo: bar\n...\n".to_vec();
        let mut source = MemorySource::new(bytes);
        let ctx = default_ctx();
        let (doc, _) = Document::open(&mut source, &ctx, &OpenOptions::default()).unwrap();

        let mut sink = MemorySource::new(Vec::new());
        let compressors = asdf_block::CompressorRegistry::default();
        let writer = BlockWriter::new(compressors);
        let options = WriteOptions { validate: ValidationPolicy::Off, ..WriteOptions::default() };
        doc.write(&mut sink, &ctx, &writer, None, &options).unwrap();
        let written = String::from_utf8(sink.into_inner()).unwrap();
        assert!(written.starts_with("#ASDF 1.0.0\n"));
        assert!(written.contains("foo: bar"));
        assert!(written.trim_end().ends_with("..."));
    }

    #[test]
    fn unknown_native_type_fails_to_convert() {
        let ctx = default_ctx();
        let mut conv = ConversionContext::new();
        let mut history = History::new();
        let options = WriteOptions::default();
        let value = NativeValue::new(42u32);
        let blocks = Rc::new(RefCell::new(BlockWriter::new(asdf_block::CompressorRegistry::default())));
        let err = Document::from_native(&value, &ctx, &mut conv, &options, &mut history, &blocks).unwrap_err();
        assert!(matches!(err, AsdfError::UnknownType(_)));
    }
}
