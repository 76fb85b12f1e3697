//! A typed view over a schema document's tagged tree, covering the subset
//! of {JSON-Schema Draft-04, ASDF's YAML-schema superset} this engine
//! actually enforces.

use asdf_tree::{NodeKind, NodeRef};

use crate::error::{SchemaError, SchemaResult};

/// The JSON-Schema `type` keyword's primitive values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    /// `object`
    Object,
    /// `array`
    Array,
    /// `string`
    String,
    /// `integer`
    Integer,
    /// `number`
    Number,
    /// `boolean`
    Boolean,
    /// `null`
    Null,
}

impl SchemaType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "null" => Some(Self::Null),
            _ => None,
        }
    }
}

/// The `ndarray`-specific keywords an ASDF schema may add to constrain an
/// `ndarray` block's binary layout.
#[derive(Debug, Clone, Default)]
pub struct NdarrayConstraint {
    /// Required scalar datatype name (e.g. `float64`), if constrained.
    pub datatype: Option<String>,
    /// Exact required dimensionality, if constrained.
    pub ndim: Option<u64>,
    /// Maximum allowed dimensionality, if constrained.
    pub max_ndim: Option<u64>,
}

/// A parsed schema node. Unset keywords are simply absent — an empty
/// `Schema` matches anything.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// `$id` / `id`, the schema's own URI, if declared.
    pub id: Option<String>,
    /// `tag`: restricts this schema to nodes carrying this exact tag URI.
    pub tag: Option<String>,
    /// `type`, as one or more alternatives.
    pub types: Vec<SchemaType>,
    /// `properties`: per-key sub-schemas for mapping nodes.
    pub properties: Vec<(String, Schema)>,
    /// `required`: property names that must be present.
    pub required: Vec<String>,
    /// `items`: the sub-schema every sequence element must satisfy.
    pub items: Option<Box<Schema>>,
    /// `enum`: the node's scalar text must be one of these.
    pub enum_values: Option<Vec<String>>,
    /// `allOf`: every sub-schema must also hold.
    pub all_of: Vec<Schema>,
    /// `default`: the tree fragment to fill in when a property is absent
    /// under standard <= 1.5.
    pub default: Option<NodeRef>,
    /// `ndarray`: additional constraints on an `ndarray`-tagged node.
    pub ndarray: Option<NdarrayConstraint>,
    /// `minimum` for numeric scalars.
    pub minimum: Option<f64>,
    /// `maximum` for numeric scalars.
    pub maximum: Option<f64>,
    /// `propertyOrder`: the emission order hint, carried through for the
    /// writer but not enforced as a validation constraint.
    pub property_order: Vec<String>,
    /// `flowStyle`: `"flow"` or `"block"`, an emission hint.
    pub flow_style: Option<String>,
}

/// Parse a schema document's root node into a [`Schema`]. `uri` is used
/// only to annotate error messages.
pub fn parse_schema(node: &NodeRef, uri: &str) -> SchemaResult<Schema> {
    let n = node.borrow();
    let NodeKind::Mapping { entries, .. } = &n.kind else {
        return Err(SchemaError::Malformed { uri: uri.to_string(), message: "schema root must be a mapping".into() });
    };

    let mut schema = Schema::default();
    for (key, value) in entries {
        let Some(key) = key.borrow().as_str().map(str::to_string) else { continue };
        match key.as_str() {
            "$id" | "id" => schema.id = value.borrow().as_str().map(str::to_string),
            "tag" => schema.tag = value.borrow().as_str().map(str::to_string),
            "type" => schema.types = parse_types(value),
            "properties" => schema.properties = parse_properties(value, uri)?,
            "required" => schema.required = scalar_list(value),
            "items" => schema.items = Some(Box::new(parse_schema(value, uri)?)),
            "enum" => schema.enum_values = Some(scalar_list(value)),
            "allOf" => schema.all_of = parse_schema_list(value, uri)?,
            "default" => schema.default = Some(value.clone()),
            "minimum" => schema.minimum = value.borrow().as_str().and_then(|s| s.parse().ok()),
            "maximum" => schema.maximum = value.borrow().as_str().and_then(|s| s.parse().ok()),
            "propertyOrder" => schema.property_order = scalar_list(value),
            "flowStyle" => schema.flow_style = value.borrow().as_str().map(str::to_string),
            "ndarray" => schema.ndarray = Some(parse_ndarray(value)),
            _ => {}
        }
    }
    Ok(schema)
}

fn parse_types(node: &NodeRef) -> Vec<SchemaType> {
    let n = node.borrow();
    match &n.kind {
        NodeKind::Scalar { value, .. } => SchemaType::parse(value).into_iter().collect(),
        NodeKind::Sequence { items, .. } => items.iter().filter_map(|i| i.borrow().as_str().and_then(SchemaType::parse)).collect(),
        _ => Vec::new(),
    }
}

fn parse_properties(node: &NodeRef, uri: &str) -> SchemaResult<Vec<(String, Schema)>> {
    let n = node.borrow();
    let NodeKind::Mapping { entries, .. } = &n.kind else {
        return Err(SchemaError::Malformed { uri: uri.to_string(), message: "'properties' must be a mapping".into() });
    };
    let mut out = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let Some(name) = key.borrow().as_str().map(str::to_string) else { continue };
        out.push((name, parse_schema(value, uri)?));
    }
    Ok(out)
}

fn parse_schema_list(node: &NodeRef, uri: &str) -> SchemaResult<Vec<Schema>> {
    let n = node.borrow();
    let NodeKind::Sequence { items, .. } = &n.kind else {
        return Err(SchemaError::Malformed { uri: uri.to_string(), message: "expected a sequence of schemas".into() });
    };
    items.iter().map(|item| parse_schema(item, uri)).collect()
}

fn parse_ndarray(node: &NodeRef) -> NdarrayConstraint {
    let n = node.borrow();
    let mut constraint = NdarrayConstraint::default();
    let NodeKind::Mapping { entries, .. } = &n.kind else { return constraint };
    for (key, value) in entries {
        let Some(key) = key.borrow().as_str() else { continue };
        match key {
            "datatype" => constraint.datatype = value.borrow().as_str().map(str::to_string),
            "ndim" => constraint.ndim = value.borrow().as_str().and_then(|s| s.parse().ok()),
            "max_ndim" => constraint.max_ndim = value.borrow().as_str().and_then(|s| s.parse().ok()),
            _ => {}
        }
    }
    constraint
}

fn scalar_list(node: &NodeRef) -> Vec<String> {
    let n = node.borrow();
    match &n.kind {
        NodeKind::Sequence { items, .. } => items.iter().filter_map(|i| i.borrow().as_str().map(str::to_string)).collect(),
        NodeKind::Scalar { value, .. } => vec![value.clone()],
        _ => Vec::new(),
    }
}
