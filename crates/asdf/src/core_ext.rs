//! The `core` extension: the small family of tags (`ndarray`, `software`,
//! `history_entry`, `constant`, `integer`) carried by nearly every real
//! ASDF file, so a caller can exercise the document engine end to end
//! without writing a converter of their own first.
//!
//! Tag URIs follow the `tag:stsci.edu:asdf/core/<name>-<version>` shape
//! `asdf-schema`'s validator and `asdf-ext`'s registry tests already assume
//! (see `INTEGER_TAG` and the `core/ndarray-*` glob fixture).

use std::sync::Arc;

use asdf_block::{CompressionCode, COMPRESSION_NONE};
use asdf_ext::{BlockAllocator, BlockReader, ConversionContext, ConversionOutcome, Converter, Extension, ExtError, ExtResult, NativeValue};
use asdf_tree::{CollectionStyle, Node, NodeKind, NodeRef, ScalarStyle};

const NDARRAY_TAG: &str = "tag:stsci.edu:asdf/core/ndarray-1.0.0";
const SOFTWARE_TAG: &str = "tag:stsci.edu:asdf/core/software-1.0.0";
const HISTORY_ENTRY_TAG: &str = "tag:stsci.edu:asdf/core/history_entry-1.0.0";
const CONSTANT_TAG: &str = "tag:stsci.edu:asdf/core/constant-1.0.0";
const INTEGER_TAG: &str = "tag:stsci.edu:asdf/core/integer-1.0.0";

/// Byte order of an [`NdArray`]'s elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Most-significant byte first.
    Big,
    /// Least-significant byte first.
    Little,
}

impl ByteOrder {
    fn as_str(self) -> &'static str {
        match self {
            Self::Big => "big",
            Self::Little => "little",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "big" => Some(Self::Big),
            "little" => Some(Self::Little),
            _ => None,
        }
    }
}

/// An array view over a block's bytes: the block owns the data, this
/// descriptor only interprets a (possibly overlapping) slice of it.
/// Two `NdArray`s built from the same backing `Arc<[u8]>` and handed to
/// the same write (with `share_base`) land in the same block, the
/// "view sharing" case the format's block store is built around.
#[derive(Clone)]
pub struct NdArray {
    /// The block's full decoded payload; `offset`/`strides`/`shape`
    /// describe this array's view into it.
    pub data: Arc<[u8]>,
    /// Element count along each axis, outermost first.
    pub shape: Vec<u64>,
    /// Element type name (`int64`, `float32`, `uint8`, `bool8`, ...), not
    /// otherwise constrained by this converter.
    pub datatype: String,
    /// Byte order of multi-byte elements.
    pub byteorder: ByteOrder,
    /// Byte offset of the first element within `data`.
    pub offset: u64,
    /// Byte stride along each axis; `None` means C-contiguous.
    pub strides: Option<Vec<u64>>,
    /// Scalar fill value marking masked-out elements, if any. A real
    /// `ndarray` mask may also be a nested array; that case is not
    /// supported here.
    pub mask: Option<String>,
}

fn itemsize(datatype: &str) -> Option<u64> {
    match datatype {
        "int8" | "uint8" | "bool8" => Some(1),
        "int16" | "uint16" | "float16" => Some(2),
        "int32" | "uint32" | "float32" => Some(4),
        "int64" | "uint64" | "float64" | "complex64" => Some(8),
        "complex128" => Some(16),
        _ => None,
    }
}

impl NdArray {
    /// Total bytes this view spans, used to bound-check it against its
    /// backing block.
    fn extent(&self) -> u64 {
        let item = itemsize(&self.datatype).unwrap_or(1);
        match &self.strides {
            Some(strides) => {
                let span: u64 = self.shape.iter().zip(strides).map(|(count, stride)| count.saturating_sub(1) * stride).sum();
                self.offset + span + item
            }
            None => {
                let elements: u64 = self.shape.iter().product();
                self.offset + elements * item
            }
        }
    }

    fn check_bounds(&self) -> ExtResult<()> {
        let extent = self.extent();
        if extent > self.data.len() as u64 {
            return Err(ExtError::NdArrayOutOfBounds { offset: self.offset, len: extent - self.offset, available: self.data.len() as u64 });
        }
        Ok(())
    }
}

fn parse_u64_seq(node: &NodeRef, tag: &str, field: &str) -> ExtResult<Vec<u64>> {
    let borrowed = node.borrow();
    let NodeKind::Sequence { items, .. } = &borrowed.kind else {
        return Err(ExtError::MalformedNode { tag: tag.to_string(), message: format!("'{field}' must be a sequence") });
    };
    items
        .iter()
        .map(|item| {
            item.borrow().as_str().and_then(|s| s.parse().ok()).ok_or_else(|| ExtError::MalformedNode { tag: tag.to_string(), message: format!("'{field}' element is not an unsigned integer") })
        })
        .collect()
}

fn u64_seq_node(values: &[u64]) -> NodeRef {
    Node::sequence(values.iter().map(|v| Node::scalar(v.to_string(), ScalarStyle::Plain)).collect(), CollectionStyle::Flow)
}

fn mapping_field<'a>(entries: &'a [(NodeRef, NodeRef)], key: &str) -> Option<&'a NodeRef> {
    entries.iter().find(|(k, _)| k.borrow().as_str() == Some(key)).map(|(_, v)| v)
}

/// Converter for `core/ndarray`: the only core converter that touches
/// binary blocks, via whatever [`BlockReader`]/[`BlockAllocator`] the
/// document engine wired into the [`ConversionContext`].
pub struct NdArrayConverter;

impl Converter for NdArrayConverter {
    fn tags(&self) -> &[String] {
        static TAGS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        TAGS.get_or_init(|| vec![NDARRAY_TAG.to_string()])
    }

    fn types(&self) -> &[&'static str] {
        &["asdf::core_ext::NdArray"]
    }

    fn select_tag(&self, _value: &NativeValue, candidates: &[String], _ctx: &ConversionContext) -> Option<String> {
        candidates.first().cloned()
    }

    fn to_yaml_tree(&self, value: &NativeValue, tag: &str, ctx: &mut ConversionContext) -> ExtResult<ConversionOutcome<NodeRef>> {
        let array = value.downcast_ref::<NdArray>().expect("NdArrayConverter only ever sees NdArray");
        array.check_bounds()?;

        let allocator = ctx.block_allocator().ok_or(ExtError::NoBlockAccess)?.clone();
        let index = allocator.borrow_mut().write_block(Arc::clone(&array.data), COMPRESSION_NONE, true);

        let mut entries = vec![
            (Node::scalar("source", ScalarStyle::Plain), Node::scalar(index.to_string(), ScalarStyle::Plain)),
            (Node::scalar("datatype", ScalarStyle::Plain), Node::scalar(array.datatype.clone(), ScalarStyle::Plain)),
            (Node::scalar("byteorder", ScalarStyle::Plain), Node::scalar(array.byteorder.as_str(), ScalarStyle::Plain)),
            (Node::scalar("shape", ScalarStyle::Plain), u64_seq_node(&array.shape)),
            (Node::scalar("offset", ScalarStyle::Plain), Node::scalar(array.offset.to_string(), ScalarStyle::Plain)),
        ];
        if let Some(strides) = &array.strides {
            entries.push((Node::scalar("strides", ScalarStyle::Plain), u64_seq_node(strides)));
        }
        if let Some(mask) = &array.mask {
            entries.push((Node::scalar("mask", ScalarStyle::Plain), Node::scalar(mask.clone(), ScalarStyle::Plain)));
        }
        let node = Node::mapping(entries, CollectionStyle::Block);
        node.borrow_mut().tag = Some(tag.to_string());
        Ok(ConversionOutcome::Done(node))
    }

    fn from_yaml_tree(&self, node: &NodeRef, tag: &str, ctx: &mut ConversionContext) -> ExtResult<ConversionOutcome<NativeValue>> {
        let borrowed = node.borrow();
        let NodeKind::Mapping { entries, .. } = &borrowed.kind else {
            return Err(ExtError::MalformedNode { tag: tag.to_string(), message: "ndarray node must be a mapping".to_string() });
        };

        let source = mapping_field(entries, "source").and_then(|n| n.borrow().as_str().and_then(|s| s.parse::<usize>().ok())).ok_or_else(|| ExtError::MalformedNode { tag: tag.to_string(), message: "missing or non-integer 'source'".to_string() })?;
        let datatype = mapping_field(entries, "datatype").and_then(|n| n.borrow().as_str().map(str::to_string)).ok_or_else(|| ExtError::MalformedNode { tag: tag.to_string(), message: "missing 'datatype'".to_string() })?;
        let byteorder = mapping_field(entries, "byteorder").and_then(|n| n.borrow().as_str().and_then(ByteOrder::parse)).ok_or_else(|| ExtError::MalformedNode { tag: tag.to_string(), message: "missing or invalid 'byteorder'".to_string() })?;
        let shape = mapping_field(entries, "shape").map(|n| parse_u64_seq(n, tag, "shape")).transpose()?.unwrap_or_default();
        let offset = mapping_field(entries, "offset").and_then(|n| n.borrow().as_str().and_then(|s| s.parse().ok())).unwrap_or(0);
        let strides = mapping_field(entries, "strides").map(|n| parse_u64_seq(n, tag, "strides")).transpose()?;
        let mask = mapping_field(entries, "mask").and_then(|n| n.borrow().as_str().map(str::to_string));
        drop(borrowed);

        let reader = ctx.block_reader().ok_or(ExtError::NoBlockAccess)?.clone();
        let data = reader.borrow_mut().read_block(source)?;

        let array = NdArray { data, shape, datatype, byteorder, offset, strides, mask };
        array.check_bounds()?;
        Ok(ConversionOutcome::Done(NativeValue::new(array)))
    }
}

/// A software package/library reference (`core/software`): used standalone
/// and embedded in [`HistoryEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareEntry {
    /// Package or library name.
    pub name: String,
    /// Package author, if recorded.
    pub author: Option<String>,
    /// Project homepage, if recorded.
    pub homepage: Option<String>,
    /// Version string, if recorded.
    pub version: Option<String>,
}

fn software_to_node(entry: &SoftwareEntry, tag: Option<&str>) -> NodeRef {
    let mut fields = vec![(Node::scalar("name", ScalarStyle::Plain), Node::scalar(entry.name.clone(), ScalarStyle::Plain))];
    if let Some(author) = &entry.author {
        fields.push((Node::scalar("author", ScalarStyle::Plain), Node::scalar(author.clone(), ScalarStyle::Plain)));
    }
    if let Some(homepage) = &entry.homepage {
        fields.push((Node::scalar("homepage", ScalarStyle::Plain), Node::scalar(homepage.clone(), ScalarStyle::Plain)));
    }
    if let Some(version) = &entry.version {
        fields.push((Node::scalar("version", ScalarStyle::Plain), Node::scalar(version.clone(), ScalarStyle::Plain)));
    }
    let node = Node::mapping(fields, CollectionStyle::Block);
    if let Some(tag) = tag {
        node.borrow_mut().tag = Some(tag.to_string());
    }
    node
}

fn software_from_node(node: &NodeRef, tag: &str) -> ExtResult<SoftwareEntry> {
    let borrowed = node.borrow();
    let NodeKind::Mapping { entries, .. } = &borrowed.kind else {
        return Err(ExtError::MalformedNode { tag: tag.to_string(), message: "software node must be a mapping".to_string() });
    };
    let name = mapping_field(entries, "name").and_then(|n| n.borrow().as_str().map(str::to_string)).ok_or_else(|| ExtError::MalformedNode { tag: tag.to_string(), message: "missing 'name'".to_string() })?;
    let author = mapping_field(entries, "author").and_then(|n| n.borrow().as_str().map(str::to_string));
    let homepage = mapping_field(entries, "homepage").and_then(|n| n.borrow().as_str().map(str::to_string));
    let version = mapping_field(entries, "version").and_then(|n| n.borrow().as_str().map(str::to_string));
    Ok(SoftwareEntry { name, author, homepage, version })
}

/// Converter for `core/software`.
pub struct SoftwareConverter;

impl Converter for SoftwareConverter {
    fn tags(&self) -> &[String] {
        static TAGS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        TAGS.get_or_init(|| vec![SOFTWARE_TAG.to_string()])
    }

    fn types(&self) -> &[&'static str] {
        &["asdf::core_ext::SoftwareEntry"]
    }

    fn select_tag(&self, _value: &NativeValue, candidates: &[String], _ctx: &ConversionContext) -> Option<String> {
        candidates.first().cloned()
    }

    fn to_yaml_tree(&self, value: &NativeValue, tag: &str, _ctx: &mut ConversionContext) -> ExtResult<ConversionOutcome<NodeRef>> {
        let entry = value.downcast_ref::<SoftwareEntry>().expect("SoftwareConverter only ever sees SoftwareEntry");
        Ok(ConversionOutcome::Done(software_to_node(entry, Some(tag))))
    }

    fn from_yaml_tree(&self, node: &NodeRef, tag: &str, _ctx: &mut ConversionContext) -> ExtResult<ConversionOutcome<NativeValue>> {
        Ok(ConversionOutcome::Done(NativeValue::new(software_from_node(node, tag)?)))
    }
}

/// One `history/entries` record (`core/history_entry`): a free-text
/// description, optional timestamp, and optional software attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Free-text description of the change.
    pub description: String,
    /// ISO-8601 timestamp, if recorded.
    pub time: Option<String>,
    /// Software that made the change, if recorded.
    pub software: Option<SoftwareEntry>,
}

/// Converter for `core/history_entry`.
pub struct HistoryEntryConverter;

impl Converter for HistoryEntryConverter {
    fn tags(&self) -> &[String] {
        static TAGS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        TAGS.get_or_init(|| vec![HISTORY_ENTRY_TAG.to_string()])
    }

    fn types(&self) -> &[&'static str] {
        &["asdf::core_ext::HistoryEntry"]
    }

    fn select_tag(&self, _value: &NativeValue, candidates: &[String], _ctx: &ConversionContext) -> Option<String> {
        candidates.first().cloned()
    }

    fn to_yaml_tree(&self, value: &NativeValue, tag: &str, _ctx: &mut ConversionContext) -> ExtResult<ConversionOutcome<NodeRef>> {
        let entry = value.downcast_ref::<HistoryEntry>().expect("HistoryEntryConverter only ever sees HistoryEntry");
        let mut fields = vec![(Node::scalar("description", ScalarStyle::Plain), Node::scalar(entry.description.clone(), ScalarStyle::Plain))];
        if let Some(time) = &entry.time {
            fields.push((Node::scalar("time", ScalarStyle::Plain), Node::scalar(time.clone(), ScalarStyle::Plain)));
        }
        if let Some(software) = &entry.software {
            fields.push((Node::scalar("software", ScalarStyle::Plain), software_to_node(software, None)));
        }
        let node = Node::mapping(fields, CollectionStyle::Block);
        node.borrow_mut().tag = Some(tag.to_string());
        Ok(ConversionOutcome::Done(node))
    }

    fn from_yaml_tree(&self, node: &NodeRef, tag: &str, _ctx: &mut ConversionContext) -> ExtResult<ConversionOutcome<NativeValue>> {
        let borrowed = node.borrow();
        let NodeKind::Mapping { entries, .. } = &borrowed.kind else {
            return Err(ExtError::MalformedNode { tag: tag.to_string(), message: "history_entry node must be a mapping".to_string() });
        };
        let description = mapping_field(entries, "description").and_then(|n| n.borrow().as_str().map(str::to_string)).ok_or_else(|| ExtError::MalformedNode { tag: tag.to_string(), message: "missing 'description'".to_string() })?;
        let time = mapping_field(entries, "time").and_then(|n| n.borrow().as_str().map(str::to_string));
        let software = mapping_field(entries, "software").map(|n| software_from_node(n, tag)).transpose()?;
        Ok(ConversionOutcome::Done(NativeValue::new(HistoryEntry { description, time, software })))
    }
}

/// A value that only needs to round-trip as opaque scalar text
/// (`core/constant`): a simplified stand-in for the real format's
/// schema-typed constant, which can wrap any YAML value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant(pub String);

/// Converter for `core/constant`.
pub struct ConstantConverter;

impl Converter for ConstantConverter {
    fn tags(&self) -> &[String] {
        static TAGS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        TAGS.get_or_init(|| vec![CONSTANT_TAG.to_string()])
    }

    fn types(&self) -> &[&'static str] {
        &["asdf::core_ext::Constant"]
    }

    fn select_tag(&self, _value: &NativeValue, candidates: &[String], _ctx: &ConversionContext) -> Option<String> {
        candidates.first().cloned()
    }

    fn to_yaml_tree(&self, value: &NativeValue, tag: &str, _ctx: &mut ConversionContext) -> ExtResult<ConversionOutcome<NodeRef>> {
        let constant = value.downcast_ref::<Constant>().expect("ConstantConverter only ever sees Constant");
        let node = Node::scalar(constant.0.clone(), ScalarStyle::Plain);
        node.borrow_mut().tag = Some(tag.to_string());
        Ok(ConversionOutcome::Done(node))
    }

    fn from_yaml_tree(&self, node: &NodeRef, tag: &str, _ctx: &mut ConversionContext) -> ExtResult<ConversionOutcome<NativeValue>> {
        let text = node.borrow().as_str().map(str::to_string).ok_or_else(|| ExtError::MalformedNode { tag: tag.to_string(), message: "constant node must be a scalar".to_string() })?;
        Ok(ConversionOutcome::Done(NativeValue::new(Constant(text))))
    }
}

/// An arbitrary-precision integer literal (`core/integer`), carried as
/// decimal text since no native integer type here is guaranteed wide
/// enough. This is what lets a value outside signed 64-bit round-trip
/// without tripping `asdf-schema`'s large-literal validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerValue(pub String);

/// Converter for `core/integer`.
pub struct IntegerConverter;

impl Converter for IntegerConverter {
    fn tags(&self) -> &[String] {
        static TAGS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        TAGS.get_or_init(|| vec![INTEGER_TAG.to_string()])
    }

    fn types(&self) -> &[&'static str] {
        &["asdf::core_ext::IntegerValue"]
    }

    fn select_tag(&self, _value: &NativeValue, candidates: &[String], _ctx: &ConversionContext) -> Option<String> {
        candidates.first().cloned()
    }

    fn to_yaml_tree(&self, value: &NativeValue, tag: &str, _ctx: &mut ConversionContext) -> ExtResult<ConversionOutcome<NodeRef>> {
        let integer = value.downcast_ref::<IntegerValue>().expect("IntegerConverter only ever sees IntegerValue");
        let node = Node::scalar(integer.0.clone(), ScalarStyle::Plain);
        node.borrow_mut().tag = Some(tag.to_string());
        Ok(ConversionOutcome::Done(node))
    }

    fn from_yaml_tree(&self, node: &NodeRef, tag: &str, _ctx: &mut ConversionContext) -> ExtResult<ConversionOutcome<NativeValue>> {
        let text = node.borrow().as_str().map(str::to_string).ok_or_else(|| ExtError::MalformedNode { tag: tag.to_string(), message: "integer node must be a scalar".to_string() })?;
        let digits = text.strip_prefix(['+', '-']).unwrap_or(&text);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ExtError::MalformedNode { tag: tag.to_string(), message: format!("'{text}' is not an integer literal") });
        }
        Ok(ConversionOutcome::Done(NativeValue::new(IntegerValue(text))))
    }
}

/// The `core` extension: every converter above, bundled the way a caller
/// registers any other extension (`registry.register(core_extension())`).
/// See [`crate::config::AsdfContext::with_core_extension`] for the
/// zero-setup convenience path.
pub fn core_extension() -> Extension {
    Extension::new("asdf.extensions.core", (1, 6, 0))
        .requires_standard((1, 0, 0))
        .with_converter(Arc::new(NdArrayConverter))
        .with_converter(Arc::new(SoftwareConverter))
        .with_converter(Arc::new(HistoryEntryConverter))
        .with_converter(Arc::new(ConstantConverter))
        .with_converter(Arc::new(IntegerConverter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use asdf_block::{BlockWriter, CompressorRegistry};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct TestAllocator(BlockWriter);

    impl BlockAllocator for TestAllocator {
        fn write_block(&mut self, data: Arc<[u8]>, compression: CompressionCode, share_base: bool) -> usize {
            self.0.allocate_or_reuse(data, compression, share_base)
        }
    }

    struct TestReader(Vec<Arc<[u8]>>);

    impl BlockReader for TestReader {
        fn read_block(&mut self, index: usize) -> ExtResult<Arc<[u8]>> {
            self.0.get(index).cloned().ok_or(ExtError::NoBlockAccess)
        }

        fn block_count(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn ndarray_round_trips_through_converter() {
        let data: Arc<[u8]> = Arc::from(vec![1u8, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0].into_boxed_slice());
        let array = NdArray { data: Arc::clone(&data), shape: vec![2], datatype: "int64".to_string(), byteorder: ByteOrder::Little, offset: 0, strides: None, mask: None };

        let mut conv = ConversionContext::new();
        conv.set_block_allocator(Rc::new(RefCell::new(TestAllocator(BlockWriter::new(CompressorRegistry::default())))));

        let converter = NdArrayConverter;
        let node = match converter.to_yaml_tree(&NativeValue::new(array), NDARRAY_TAG, &mut conv).unwrap() {
            ConversionOutcome::Done(node) => node,
            ConversionOutcome::Pending(_) => panic!("ndarray conversion is never deferred"),
        };

        let mut read_conv = ConversionContext::new();
        read_conv.set_block_reader(Rc::new(RefCell::new(TestReader(vec![Arc::clone(&data)]))));
        let native = match converter.from_yaml_tree(&node, NDARRAY_TAG, &mut read_conv).unwrap() {
            ConversionOutcome::Done(v) => v,
            ConversionOutcome::Pending(_) => panic!("ndarray conversion is never deferred"),
        };
        let recovered = native.downcast_ref::<NdArray>().unwrap();
        assert_eq!(recovered.shape, vec![2]);
        assert_eq!(recovered.data.as_ref(), data.as_ref());
    }

    #[test]
    fn ndarray_out_of_bounds_view_is_rejected() {
        let data: Arc<[u8]> = Arc::from(vec![0u8; 4].into_boxed_slice());
        let array = NdArray { data, shape: vec![10], datatype: "int64".to_string(), byteorder: ByteOrder::Little, offset: 0, strides: None, mask: None };
        assert!(array.check_bounds().is_err());
    }

    #[test]
    fn software_round_trips_author_and_version() {
        let entry = SoftwareEntry { name: "widgets".to_string(), author: Some("me".to_string()), homepage: None, version: Some("1.2.3".to_string()) };
        let node = software_to_node(&entry, Some(SOFTWARE_TAG));
        let back = software_from_node(&node, SOFTWARE_TAG).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn integer_rejects_non_digit_text() {
        let converter = IntegerConverter;
        let node = Node::scalar("12x", ScalarStyle::Plain);
        let mut conv = ConversionContext::new();
        let err = converter.from_yaml_tree(&node, INTEGER_TAG, &mut conv).unwrap_err();
        assert!(matches!(err, ExtError::MalformedNode { .. }));
    }

    #[test]
    fn constant_round_trips_as_scalar_text() {
        let converter = ConstantConverter;
        let mut conv = ConversionContext::new();
        let node = match converter.to_yaml_tree(&NativeValue::new(Constant("pi".to_string())), CONSTANT_TAG, &mut conv).unwrap() {
            ConversionOutcome::Done(node) => node,
            ConversionOutcome::Pending(_) => panic!("constant conversion is never deferred"),
        };
        let native = match converter.from_yaml_tree(&node, CONSTANT_TAG, &mut conv).unwrap() {
            ConversionOutcome::Done(v) => v,
            ConversionOutcome::Pending(_) => panic!("constant conversion is never deferred"),
        };
        assert_eq!(native.downcast::<Constant>().unwrap().0, "pi");
    }
}
