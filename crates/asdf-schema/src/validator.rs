//! Walks a schema against a tagged tree, collecting validation errors.

use asdf_tree::{Node, NodeKind, NodeRef, ScalarStyle};

use crate::error::SchemaValidationError;
use crate::schema::{Schema, SchemaType};

/// `(major, minor, patch)`, ordered lexicographically like semver.
pub type StandardVersion = (u64, u64, u64);

/// The tag below which mapping-key restrictions and large-literal checks
/// apply (standard 1.6.0 and later).
pub const STANDARD_1_6: StandardVersion = (1, 6, 0);

const INTEGER_TAG: &str = "tag:stsci.edu:asdf/core/integer-1.0.0";

/// Compare tags independent of a `!`-shorthand prefix or a `tag:<authority>:`
/// scheme prefix. Full tag-handle expansion (`%TAG` directives, extensions'
/// registered `yaml_tag_handles`) is owned by the document engine and the
/// extension registry; this crate only needs to recognize the same logical
/// tag spelled two ways.
fn canonical_tag(tag: &str) -> &str {
    let tag = tag.trim_start_matches('!');
    tag.rsplit("asdf/").next().unwrap_or(tag)
}

/// Looks up the schema registered for a tag URI. Implemented by the
/// extension registry (component F), which owns the tag→schema index;
/// this crate only consumes the lookup.
pub trait TagSchemaIndex {
    /// Return the schema bound to `tag`, if any extension registered one.
    fn schema_for_tag(&self, tag: &str) -> Option<Schema>;
}

/// An index with nothing registered, for validating without tag-scoped
/// schemas (document-schema-only validation).
pub struct NoTagSchemas;

impl TagSchemaIndex for NoTagSchemas {
    fn schema_for_tag(&self, _tag: &str) -> Option<Schema> {
        None
    }
}

/// Validate `root` against an optional document-level schema and every
/// tag-scoped schema found while walking the tree, plus the large-literal
/// check. Tag-scoped schemas are applied at the point their tagged node is
/// encountered, in addition to (not instead of) the document schema.
pub fn validate_document(root: &NodeRef, document_schema: Option<&Schema>, tag_index: &dyn TagSchemaIndex, standard: StandardVersion) -> Vec<SchemaValidationError> {
    let mut out = Vec::new();
    if let Some(schema) = document_schema {
        validate_node(root, schema, "", standard, &mut out);
    }
    walk_tag_scoped(root, "", tag_index, standard, &mut out);
    check_large_literals(root, "", standard, &mut out);
    check_mapping_keys(root, "", standard, &mut out);
    out
}

/// Under standard <= 1.5, fill every property with a schema `default` that
/// is absent from the mapping. Under >= 1.6 this is a no-op: the spec
/// treats unset defaults as meaningful absence, not a value to backfill.
pub fn apply_defaults(node: &NodeRef, schema: &Schema, standard: StandardVersion) {
    if standard >= STANDARD_1_6 {
        return;
    }
    let is_mapping = node.borrow().is_mapping();
    if !is_mapping {
        return;
    }
    for (name, prop_schema) in &schema.properties {
        let existing = {
            let n = node.borrow();
            let NodeKind::Mapping { entries, .. } = &n.kind else { unreachable!() };
            entries.iter().find(|(k, _)| k.borrow().as_str() == Some(name.as_str())).map(|(_, v)| v.clone())
        };
        match existing {
            Some(value) => apply_defaults(&value, prop_schema, standard),
            None => {
                if let Some(default) = &prop_schema.default {
                    let mut n = node.borrow_mut();
                    let NodeKind::Mapping { entries, .. } = &mut n.kind else { unreachable!() };
                    entries.push((Node::scalar(name.clone(), ScalarStyle::Plain), default.clone()));
                }
            }
        }
    }
}

fn walk_tag_scoped(node: &NodeRef, path: &str, tag_index: &dyn TagSchemaIndex, standard: StandardVersion, out: &mut Vec<SchemaValidationError>) {
    let tag = node.borrow().tag.clone();
    if let Some(tag) = &tag {
        match tag_index.schema_for_tag(tag) {
            Some(schema) => validate_node(node, &schema, path, standard, out),
            None => tracing::debug!(tag, path, "no schema registered for tag"),
        }
    }

    let n = node.borrow();
    match &n.kind {
        NodeKind::Mapping { entries, .. } => {
            for (key, value) in entries {
                let child_path = format!("{path}/{}", key.borrow().as_str().unwrap_or_default());
                walk_tag_scoped(value, &child_path, tag_index, standard, out);
            }
        }
        NodeKind::Sequence { items, .. } => {
            for (i, item) in items.iter().enumerate() {
                walk_tag_scoped(item, &format!("{path}/{i}"), tag_index, standard, out);
            }
        }
        NodeKind::Scalar { .. } | NodeKind::Alias { .. } => {}
    }
}

/// Validate `node` against `schema` at `path`, recursing into
/// `properties`/`items`/`allOf` sub-schemas. Does not follow tags: that is
/// [`walk_tag_scoped`]'s job, layered on top.
pub fn validate_node(node: &NodeRef, schema: &Schema, path: &str, standard: StandardVersion, out: &mut Vec<SchemaValidationError>) {
    let n = node.borrow();

    if let Some(expected_tag) = &schema.tag {
        if n.tag.as_deref().map(canonical_tag) != Some(canonical_tag(expected_tag)) {
            out.push(SchemaValidationError { path: path.to_string(), message: format!("expected tag '{expected_tag}', found {:?}", n.tag) });
        }
    }

    if !schema.types.is_empty() {
        let actual = actual_type(&n.kind);
        if !schema.types.contains(&actual) {
            out.push(SchemaValidationError { path: path.to_string(), message: format!("expected type {:?}, found {actual:?}", schema.types) });
        }
    }

    if let Some(values) = &schema.enum_values {
        if let Some(text) = n.as_str() {
            if !values.iter().any(|v| v == text) {
                out.push(SchemaValidationError { path: path.to_string(), message: format!("value '{text}' is not one of {values:?}") });
            }
        }
    }

    if let Some(text) = n.as_str() {
        if let Ok(number) = text.parse::<f64>() {
            if let Some(min) = schema.minimum {
                if number < min {
                    out.push(SchemaValidationError { path: path.to_string(), message: format!("{number} is less than minimum {min}") });
                }
            }
            if let Some(max) = schema.maximum {
                if number > max {
                    out.push(SchemaValidationError { path: path.to_string(), message: format!("{number} is greater than maximum {max}") });
                }
            }
        }
    }

    if let NodeKind::Mapping { entries, .. } = &n.kind {
        for required in &schema.required {
            if !entries.iter().any(|(k, _)| k.borrow().as_str() == Some(required.as_str())) {
                out.push(SchemaValidationError { path: path.to_string(), message: format!("missing required property '{required}'") });
            }
        }
        for (name, prop_schema) in &schema.properties {
            if let Some((_, value)) = entries.iter().find(|(k, _)| k.borrow().as_str() == Some(name.as_str())) {
                validate_node(value, prop_schema, &format!("{path}/{name}"), standard, out);
            }
        }
    }

    if let (NodeKind::Sequence { items, .. }, Some(item_schema)) = (&n.kind, &schema.items) {
        for (i, item) in items.iter().enumerate() {
            validate_node(item, item_schema, &format!("{path}/{i}"), standard, out);
        }
    }

    if let Some(ndarray) = &schema.ndarray {
        validate_ndarray(&n, ndarray, path, out);
    }

    let all_of = schema.all_of.clone();
    drop(n);
    for sub in &all_of {
        validate_node(node, sub, path, standard, out);
    }
}

fn validate_ndarray(n: &Node, constraint: &crate::schema::NdarrayConstraint, path: &str, out: &mut Vec<SchemaValidationError>) {
    let NodeKind::Mapping { entries, .. } = &n.kind else {
        out.push(SchemaValidationError { path: path.to_string(), message: "ndarray constraint applied to a non-mapping node".into() });
        return;
    };
    let field = |name: &str| entries.iter().find(|(k, _)| k.borrow().as_str() == Some(name)).map(|(_, v)| v.clone());

    if let Some(expected) = &constraint.datatype {
        if let Some(actual) = field("datatype").and_then(|v| v.borrow().as_str().map(str::to_string)) {
            if &actual != expected {
                out.push(SchemaValidationError { path: path.to_string(), message: format!("ndarray datatype '{actual}' does not match required '{expected}'") });
            }
        }
    }
    if let Some(expected_ndim) = constraint.ndim {
        if let Some(shape_len) = field("shape").and_then(|v| match &v.borrow().kind {
            NodeKind::Sequence { items, .. } => Some(items.len() as u64),
            _ => None,
        }) {
            if shape_len != expected_ndim {
                out.push(SchemaValidationError { path: path.to_string(), message: format!("ndarray has {shape_len} dimensions, expected {expected_ndim}") });
            }
        }
    }
    if let Some(max_ndim) = constraint.max_ndim {
        if let Some(shape_len) = field("shape").and_then(|v| match &v.borrow().kind {
            NodeKind::Sequence { items, .. } => Some(items.len() as u64),
            _ => None,
        }) {
            if shape_len > max_ndim {
                out.push(SchemaValidationError { path: path.to_string(), message: format!("ndarray has {shape_len} dimensions, exceeding max {max_ndim}") });
            }
        }
    }
}

fn actual_type(kind: &NodeKind) -> SchemaType {
    match kind {
        NodeKind::Mapping { .. } => SchemaType::Object,
        NodeKind::Sequence { .. } => SchemaType::Array,
        NodeKind::Alias { .. } => SchemaType::Null,
        NodeKind::Scalar { value, .. } => {
            if value.is_empty() {
                SchemaType::Null
            } else if value.parse::<i64>().is_ok() {
                SchemaType::Integer
            } else if value.parse::<f64>().is_ok() {
                SchemaType::Number
            } else if matches!(value.as_str(), "true" | "false") {
                SchemaType::Boolean
            } else {
                SchemaType::String
            }
        }
    }
}

fn check_large_literals(node: &NodeRef, path: &str, standard: StandardVersion, out: &mut Vec<SchemaValidationError>) {
    if standard < STANDARD_1_6 {
        return;
    }
    let n = node.borrow();
    if let NodeKind::Scalar { value, style: ScalarStyle::Plain } = &n.kind {
        let is_plain_integer_text = !value.is_empty() && value.trim_start_matches(['+', '-']).chars().all(|c| c.is_ascii_digit());
        if is_plain_integer_text && value.parse::<i64>().is_err() && n.tag.as_deref().map(canonical_tag) != Some(canonical_tag(INTEGER_TAG)) {
            out.push(SchemaValidationError { path: path.to_string(), message: format!("integer literal '{value}' exceeds 64 bits and must use the '{INTEGER_TAG}' tag") });
        }
    }
    match &n.kind {
        NodeKind::Mapping { entries, .. } => {
            for (key, value) in entries {
                check_large_literals(value, &format!("{path}/{}", key.borrow().as_str().unwrap_or_default()), standard, out);
            }
        }
        NodeKind::Sequence { items, .. } => {
            for (i, item) in items.iter().enumerate() {
                check_large_literals(item, &format!("{path}/{i}"), standard, out);
            }
        }
        NodeKind::Scalar { .. } | NodeKind::Alias { .. } => {}
    }
}

/// Under standard >= 1.6, mapping keys are restricted to string, int, or
/// bool scalars. The parser accepts any node as a key (see
/// `asdf_tree::TreeError::MappingKeyNotScalar`'s doc comment); this is where
/// that restriction is actually enforced.
fn check_mapping_keys(node: &NodeRef, path: &str, standard: StandardVersion, out: &mut Vec<SchemaValidationError>) {
    if standard < STANDARD_1_6 {
        return;
    }
    let n = node.borrow();
    match &n.kind {
        NodeKind::Mapping { entries, .. } => {
            for (key, value) in entries {
                if !key.borrow().is_valid_key_scalar() {
                    out.push(SchemaValidationError {
                        path: path.to_string(),
                        message: "mapping key is not a string, int, or bool scalar".to_string(),
                    });
                }
                check_mapping_keys(value, &format!("{path}/{}", key.borrow().as_str().unwrap_or_default()), standard, out);
            }
        }
        NodeKind::Sequence { items, .. } => {
            for (i, item) in items.iter().enumerate() {
                check_mapping_keys(item, &format!("{path}/{i}"), standard, out);
            }
        }
        NodeKind::Scalar { .. } | NodeKind::Alias { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;
    use asdf_tree::parse_document;

    #[test]
    fn flags_missing_required_property() {
        let schema_tree = parse_document("type: object\nrequired:\n  - name\n").unwrap().unwrap();
        let schema = parse_schema(&schema_tree, "test").unwrap();
        let doc = parse_document("value: 1\n").unwrap().unwrap();
        let errors = validate_document(&doc, Some(&schema), &NoTagSchemas, STANDARD_1_6);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("name"));
    }

    #[test]
    fn flags_type_mismatch() {
        let schema_tree = parse_document("type: integer\n").unwrap().unwrap();
        let schema = parse_schema(&schema_tree, "test").unwrap();
        let doc = parse_document("value: not-a-number\n").unwrap().unwrap();
        let entries_schema = Schema { properties: vec![("value".to_string(), schema)], ..Default::default() };
        let errors = validate_document(&doc, Some(&entries_schema), &NoTagSchemas, STANDARD_1_6);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn flags_large_literal_without_integer_tag() {
        let doc = parse_document("value: 99999999999999999999\n").unwrap().unwrap();
        let errors = validate_document(&doc, None, &NoTagSchemas, STANDARD_1_6);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("exceeds 64 bits"));
    }

    #[test]
    fn allows_large_literal_under_integer_tag() {
        let doc = parse_document("value: !core/integer-1.0.0 99999999999999999999\n").unwrap().unwrap();
        let errors = validate_document(&doc, None, &NoTagSchemas, STANDARD_1_6);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn flags_non_scalar_mapping_key_under_standard_1_6() {
        let doc = parse_document("[1, 2]: value\n").unwrap().unwrap();
        let errors = validate_document(&doc, None, &NoTagSchemas, STANDARD_1_6);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("string, int, or bool"));
    }

    #[test]
    fn allows_string_int_bool_mapping_keys_under_standard_1_6() {
        let doc = parse_document("name: a\n42: b\ntrue: c\n").unwrap().unwrap();
        let errors = validate_document(&doc, None, &NoTagSchemas, STANDARD_1_6);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn allows_non_scalar_mapping_key_under_older_standard() {
        let doc = parse_document("[1, 2]: value\n").unwrap().unwrap();
        let errors = validate_document(&doc, None, &NoTagSchemas, (1, 5, 0));
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn canonical_tag_matches_shorthand_and_full_uri() {
        assert_eq!(canonical_tag("!core/ndarray-1.0.0"), canonical_tag("tag:stsci.edu:asdf/core/ndarray-1.0.0"));
    }

    #[test]
    fn fills_defaults_under_old_standard() {
        let schema_tree = parse_document("type: object\nproperties:\n  count:\n    type: integer\n    default: 0\n").unwrap().unwrap();
        let schema = parse_schema(&schema_tree, "test").unwrap();
        let doc = parse_document("name: x\n").unwrap().unwrap();
        apply_defaults(&doc, &schema, (1, 5, 0));
        let found = mapping_value(&doc, "count");
        assert_eq!(found, Some("0".to_string()));
    }

    fn mapping_value(doc: &NodeRef, key: &str) -> Option<String> {
        let n = doc.borrow();
        let NodeKind::Mapping { entries, .. } = &n.kind else { return None };
        entries.iter().find(|(k, _)| k.borrow().as_str() == Some(key)).and_then(|(_, v)| v.borrow().as_str().map(str::to_string))
    }
}
