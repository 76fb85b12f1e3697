//! End-to-end coverage of `Document::open`/`write`/`update` against an
//! in-memory source, exercising a custom extension, schema validation, and
//! binary block layout together rather than in isolation.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use asdf::{AsdfContext, AsdfError, Document, OpenOptions, ValidationPolicy, Warning, WriteOptions};
use asdf_block::{BlockWriter, CompressorRegistry, COMPRESSION_NONE};
use asdf_ext::{ConversionContext, ConversionOutcome, Converter, Extension, ExtensionRegistry, NativeValue};
use asdf_io::{ByteSource, MemorySource};
use asdf_schema::{parse_schema, Schema};
use asdf_tree::{CollectionStyle, Node, NodeRef, ScalarStyle};

const POINT_TAG: &str = "tag:example.com:test/point-1.0.0";

#[derive(Debug, Clone, PartialEq)]
struct Point {
    x: f64,
    y: f64,
}

struct PointConverter;

impl Converter for PointConverter {
    fn tags(&self) -> &[String] {
        static TAGS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        TAGS.get_or_init(|| vec![POINT_TAG.to_string()])
    }

    fn types(&self) -> &[&'static str] {
        &["document_roundtrip::Point"]
    }

    fn select_tag(&self, _value: &NativeValue, candidates: &[String], _ctx: &ConversionContext) -> Option<String> {
        candidates.first().cloned()
    }

    fn to_yaml_tree(&self, value: &NativeValue, tag: &str, _ctx: &mut ConversionContext) -> asdf_ext::ExtResult<ConversionOutcome<NodeRef>> {
        let point = value.downcast_ref::<Point>().expect("PointConverter only ever sees Point");
        let node = Node::mapping(
            vec![
                (Node::scalar("x", ScalarStyle::Plain), Node::scalar(point.x.to_string(), ScalarStyle::Plain)),
                (Node::scalar("y", ScalarStyle::Plain), Node::scalar(point.y.to_string(), ScalarStyle::Plain)),
            ],
            CollectionStyle::Flow,
        );
        node.borrow_mut().tag = Some(tag.to_string());
        Ok(ConversionOutcome::Done(node))
    }

    fn from_yaml_tree(&self, node: &NodeRef, _tag: &str, _ctx: &mut ConversionContext) -> asdf_ext::ExtResult<ConversionOutcome<NativeValue>> {
        let borrowed = node.borrow();
        let asdf_tree::NodeKind::Mapping { entries, .. } = &borrowed.kind else {
            panic!("point node must be a mapping");
        };
        let mut x = None;
        let mut y = None;
        for (key, value) in entries {
            match key.borrow().as_str() {
                Some("x") => x = value.borrow().as_str().and_then(|s| s.parse().ok()),
                Some("y") => y = value.borrow().as_str().and_then(|s| s.parse().ok()),
                _ => {}
            }
        }
        let x = x.expect("point node has an x field");
        let y = y.expect("point node has a y field");
        Ok(ConversionOutcome::Done(NativeValue::new(Point { x, y })))
    }
}

fn ctx_with_point_extension() -> AsdfContext {
    let mut registry = ExtensionRegistry::new();
    registry.register(Extension::new("test.point", (1, 0, 0)).with_converter(Arc::new(PointConverter)));
    AsdfContext::new(registry)
}

#[test]
fn tagged_value_round_trips_through_open_native_write_reopen() {
    let bytes = b"#ASDF 1.0.0\n#ASDF_STANDARD 1.6.0\n---\nlocation: !<tag:example.com:test/point-1.0.0> {x: 1.5, y: -2}\n...\n".to_vec();
    let mut source = MemorySource::new(bytes);
    let ctx = ctx_with_point_extension();

    let (mut doc, warnings) = Document::open(&mut source, &ctx, &OpenOptions::default()).unwrap();
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");

    let mut conv = ConversionContext::new();
    let compressors = CompressorRegistry::default();
    let (native, warnings) = doc.to_native(&ctx, &mut conv, &mut source, &compressors).unwrap();
    assert!(warnings.is_empty());

    let root = native.downcast_ref::<asdf::NativeContainer>().expect("root is an untagged mapping container");
    let asdf::NativeContainerKind::Mapping(entries) = &root.kind else { panic!("expected mapping") };
    let (_, point_value) = entries.iter().find(|(k, _)| k == "location").expect("location key present");
    let point = point_value.downcast_ref::<Point>().expect("location converted to Point");
    assert_eq!(*point, Point { x: 1.5, y: -2.0 });

    let mut write_conv = ConversionContext::new();
    let mut history = asdf::History::new();
    let write_options = WriteOptions { validate: ValidationPolicy::Off, ..WriteOptions::default() };
    let blocks = Rc::new(RefCell::new(BlockWriter::new(CompressorRegistry::default())));
    let rebuilt = Document::from_native(&native, &ctx, &mut write_conv, &write_options, &mut history, &blocks).unwrap();
    assert!(!rebuilt.history.entries().is_empty(), "point converter firing should be recorded in history");

    let mut sink = MemorySource::empty();
    rebuilt.write(&mut sink, &ctx, &blocks.borrow(), None, &write_options).unwrap();

    let written = sink.into_inner();
    let mut reread = MemorySource::new(written);
    let (mut reopened, _) = Document::open(&mut reread, &ctx, &OpenOptions::default()).unwrap();
    let verbatim_tag = format!("!<{POINT_TAG}>");
    let found = reopened.search(|n| n.borrow().tag.as_deref() == Some(verbatim_tag.as_str()));
    assert_eq!(found.len(), 1);

    let mut reopen_conv = ConversionContext::new();
    let (native_again, warnings) = reopened.to_native(&ctx, &mut reopen_conv, &mut reread, &compressors).unwrap();
    assert!(warnings.is_empty(), "re-parsed verbatim tag should still resolve through the point converter: {warnings:?}");
    let root_again = native_again.downcast_ref::<asdf::NativeContainer>().unwrap();
    let asdf::NativeContainerKind::Mapping(entries_again) = &root_again.kind else { panic!("expected mapping") };
    let (_, point_again) = entries_again.iter().find(|(k, _)| k == "location").unwrap();
    assert_eq!(*point_again.downcast_ref::<Point>().unwrap(), Point { x: 1.5, y: -2.0 });
}

#[test]
fn missing_extension_warns_and_preserves_tag_as_container() {
    let bytes = b"#ASDF 1.0.0\n---\nthing: !<tag:example.com:unregistered-1.0.0> plain\n...\n".to_vec();
    let mut source = MemorySource::new(bytes);
    let ctx = AsdfContext::new(ExtensionRegistry::new());

    let (mut doc, _) = Document::open(&mut source, &ctx, &OpenOptions::default()).unwrap();
    let mut conv = ConversionContext::new();
    let compressors = CompressorRegistry::default();
    let (_, warnings) = doc.to_native(&ctx, &mut conv, &mut source, &compressors).unwrap();
    assert!(warnings.iter().any(|w| matches!(w, Warning::MissingExtension { tag } if tag == "!<tag:example.com:unregistered-1.0.0>")));
}

#[test]
fn document_schema_violation_raises_when_policy_is_raise() {
    let schema_src = "type: object\nrequired: [must_have]\n";
    let schema_tree = asdf_tree::parse_document(schema_src).unwrap().unwrap();
    let schema: Schema = parse_schema(&schema_tree, "test://inline").unwrap();

    let bytes = b"#ASDF 1.0.0\n---\nother: 1\n...\n".to_vec();
    let mut source = MemorySource::new(bytes);
    let ctx = AsdfContext::new(ExtensionRegistry::new());
    let (doc, _) = Document::open(&mut source, &ctx, &OpenOptions { validate: ValidationPolicy::Off, ..OpenOptions::default() }).unwrap();

    let mut sink = MemorySource::empty();
    let writer = BlockWriter::new(CompressorRegistry::default());
    let options = WriteOptions { validate: ValidationPolicy::Raise, ..WriteOptions::default() };
    let err = doc.write(&mut sink, &ctx, &writer, Some(&schema), &options).unwrap_err();
    assert!(matches!(err, AsdfError::ValidationFailed { .. }));
}

#[test]
fn update_in_place_when_new_body_fits_padding() {
    let write_options = WriteOptions { padding: 64, validate: ValidationPolicy::Off, ..WriteOptions::default() };
    let ctx = AsdfContext::new(ExtensionRegistry::new());

    let tree = Node::mapping(vec![(Node::scalar("count", ScalarStyle::Plain), Node::scalar("1", ScalarStyle::Plain))], CollectionStyle::Block);
    let blocks = Rc::new(RefCell::new(BlockWriter::new(CompressorRegistry::default())));
    let doc = Document::from_native(&NativeValue::new(wrap_as_container(&tree)), &ctx, &mut ConversionContext::new(), &write_options, &mut asdf::History::new(), &blocks).unwrap();

    let mut sink = MemorySource::empty();
    let writer = BlockWriter::new(CompressorRegistry::default());
    doc.write(&mut sink, &ctx, &writer, None, &write_options).unwrap();
    let mut source = MemorySource::new(sink.into_inner());

    let (opened, _) = Document::open(&mut source, &ctx, &OpenOptions::default()).unwrap();
    opened.search(|n| n.borrow().as_str() == Some("1")).first().unwrap().borrow_mut().kind = asdf_tree::NodeKind::Scalar { value: "2".into(), style: ScalarStyle::Plain };

    let new_writer = BlockWriter::new(CompressorRegistry::default());
    opened.update(&mut source, &ctx, &new_writer, None, &write_options).unwrap();

    source.seek(std::io::SeekFrom::Start(0)).unwrap();
    let (reopened, _) = Document::open(&mut source, &ctx, &OpenOptions::default()).unwrap();
    assert_eq!(reopened.search(|n| n.borrow().as_str() == Some("2")).len(), 1);
}

fn wrap_as_container(tree: &NodeRef) -> asdf::NativeContainer {
    fn convert(node: &NodeRef) -> asdf::NativeContainerKind {
        let borrowed = node.borrow();
        match &borrowed.kind {
            asdf_tree::NodeKind::Scalar { value, .. } => asdf::NativeContainerKind::Scalar(value.clone()),
            asdf_tree::NodeKind::Mapping { entries, .. } => asdf::NativeContainerKind::Mapping(
                entries
                    .iter()
                    .map(|(k, v)| (k.borrow().as_str().unwrap_or_default().to_string(), Arc::new(NativeValue::new(asdf::NativeContainer { tag: v.borrow().tag.clone(), kind: convert(v) }))))
                    .collect(),
            ),
            asdf_tree::NodeKind::Sequence { items, .. } => {
                asdf::NativeContainerKind::Sequence(items.iter().map(|i| Arc::new(NativeValue::new(asdf::NativeContainer { tag: i.borrow().tag.clone(), kind: convert(i) }))).collect())
            }
            asdf_tree::NodeKind::Alias { .. } => asdf::NativeContainerKind::Scalar(String::new()),
        }
    }
    asdf::NativeContainer { tag: None, kind: convert(tree) }
}

#[test]
fn internal_blocks_round_trip_through_write_and_open() {
    let ctx = AsdfContext::new(ExtensionRegistry::new());
    let tree = Node::mapping(Vec::new(), CollectionStyle::Block);
    let scratch_blocks = Rc::new(RefCell::new(BlockWriter::new(CompressorRegistry::default())));
    let doc = Document::from_native(
        &NativeValue::new(asdf::NativeContainer { tag: None, kind: wrap_as_container(&tree).kind }),
        &ctx,
        &mut ConversionContext::new(),
        &WriteOptions { validate: ValidationPolicy::Off, ..WriteOptions::default() },
        &mut asdf::History::new(),
        &scratch_blocks,
    )
    .unwrap();

    let mut writer = BlockWriter::new(CompressorRegistry::default());
    let payload_a: Arc<[u8]> = Arc::from(vec![1u8, 2, 3, 4].into_boxed_slice());
    let payload_b: Arc<[u8]> = Arc::from(vec![5u8, 6, 7, 8, 9].into_boxed_slice());
    writer.allocate_or_reuse(Arc::clone(&payload_a), COMPRESSION_NONE, true);
    writer.allocate_or_reuse(Arc::clone(&payload_b), COMPRESSION_NONE, true);
    assert_eq!(writer.block_count(), 2);

    let mut sink = MemorySource::empty();
    let options = WriteOptions { validate: ValidationPolicy::Off, ..WriteOptions::default() };
    doc.write(&mut sink, &ctx, &writer, None, &options).unwrap();

    let bytes = sink.into_inner();
    let mut reread = MemorySource::new(bytes);
    let (reopened, _) = Document::open(&mut reread, &ctx, &OpenOptions::default()).unwrap();
    assert_eq!(reopened.blocks.len(), 2);
}

#[test]
fn ndarray_round_trips_through_open_native_write_reopen() {
    let ctx = AsdfContext::new(ExtensionRegistry::new()).with_core_extension();

    let data: Arc<[u8]> = Arc::from((0u8..20).collect::<Vec<u8>>().into_boxed_slice());
    let array = asdf::NdArray { data, shape: vec![5], datatype: "int32".to_string(), byteorder: asdf::ByteOrder::Little, offset: 0, strides: None, mask: None };
    let container = asdf::NativeContainer {
        tag: None,
        kind: asdf::NativeContainerKind::Mapping(vec![("values".to_string(), Arc::new(NativeValue::new(array)))]),
    };

    let mut conv = ConversionContext::new();
    let mut history = asdf::History::new();
    let write_options = WriteOptions { validate: ValidationPolicy::Off, ..WriteOptions::default() };
    let blocks = Rc::new(RefCell::new(BlockWriter::new(CompressorRegistry::default())));
    let doc = Document::from_native(&NativeValue::new(container), &ctx, &mut conv, &write_options, &mut history, &blocks).unwrap();

    let mut sink = MemorySource::empty();
    doc.write(&mut sink, &ctx, &blocks.borrow(), None, &write_options).unwrap();

    let mut source = MemorySource::new(sink.into_inner());
    let (mut reopened, _) = Document::open(&mut source, &ctx, &OpenOptions::default()).unwrap();
    assert_eq!(reopened.blocks.len(), 1, "one block backs the single ndarray descriptor");

    let mut reopen_conv = ConversionContext::new();
    let compressors = CompressorRegistry::default();
    let (native, warnings) = reopened.to_native(&ctx, &mut reopen_conv, &mut source, &compressors).unwrap();
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");

    let root = native.downcast_ref::<asdf::NativeContainer>().unwrap();
    let asdf::NativeContainerKind::Mapping(entries) = &root.kind else { panic!("expected mapping") };
    let (_, values) = entries.iter().find(|(k, _)| k == "values").unwrap();
    let recovered = values.downcast_ref::<asdf::NdArray>().unwrap();
    assert_eq!(recovered.shape, vec![5]);
    assert_eq!(recovered.datatype, "int32");
    assert_eq!(recovered.data.as_ref(), &(0u8..20).collect::<Vec<u8>>()[..]);
}

#[test]
fn ndarray_views_sharing_one_buffer_share_one_block() {
    let ctx = AsdfContext::new(ExtensionRegistry::new()).with_core_extension();

    let backing: Arc<[u8]> = Arc::from((0u8..20).collect::<Vec<u8>>().into_boxed_slice());
    let first = asdf::NdArray { data: Arc::clone(&backing), shape: vec![10], datatype: "uint8".to_string(), byteorder: asdf::ByteOrder::Little, offset: 0, strides: None, mask: None };
    let second = asdf::NdArray { data: Arc::clone(&backing), shape: vec![10], datatype: "uint8".to_string(), byteorder: asdf::ByteOrder::Little, offset: 10, strides: None, mask: None };
    let container = asdf::NativeContainer {
        tag: None,
        kind: asdf::NativeContainerKind::Mapping(vec![("a".to_string(), Arc::new(NativeValue::new(first))), ("b".to_string(), Arc::new(NativeValue::new(second)))]),
    };

    let mut conv = ConversionContext::new();
    let mut history = asdf::History::new();
    let write_options = WriteOptions { validate: ValidationPolicy::Off, ..WriteOptions::default() };
    let blocks = Rc::new(RefCell::new(BlockWriter::new(CompressorRegistry::default())));
    let doc = Document::from_native(&NativeValue::new(container), &ctx, &mut conv, &write_options, &mut history, &blocks).unwrap();
    assert_eq!(blocks.borrow().block_count(), 1, "both views share one block by backing-buffer identity");

    let mut sink = MemorySource::empty();
    doc.write(&mut sink, &ctx, &blocks.borrow(), None, &write_options).unwrap();

    let mut source = MemorySource::new(sink.into_inner());
    let (reopened, _) = Document::open(&mut source, &ctx, &OpenOptions::default()).unwrap();
    assert_eq!(reopened.blocks.len(), 1);
}
