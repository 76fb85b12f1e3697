//! Declarative extension manifests: a YAML document listing an
//! extension's tags, schemas, standard-version requirement, and legacy
//! class names. A manifest carries no code — the converters, compressors,
//! and validators it describes must still be registered programmatically;
//! [`load_manifest`] only builds the metadata half of an [`Extension`].

use asdf_tree::{NodeKind, NodeRef};

use crate::error::{ExtError, ExtResult};
use crate::extension::{Extension, TagDefinition};

/// Parse a manifest document's root node into an [`Extension`] shell (no
/// converters/compressors attached). `uri` annotates error messages.
pub fn load_manifest(node: &NodeRef, uri: &str) -> ExtResult<Extension> {
    let n = node.borrow();
    let NodeKind::Mapping { entries, .. } = &n.kind else {
        return Err(ExtError::MalformedManifest { uri: uri.to_string(), message: "manifest root must be a mapping".into() });
    };

    let mut name = uri.to_string();
    let mut version = (0, 1, 0);
    let mut standard_requirement = (1, 0, 0);
    let mut tags = Vec::new();
    let mut legacy_class_names = Vec::new();

    for (key, value) in entries {
        let Some(key) = key.borrow().as_str().map(str::to_string) else { continue };
        match key.as_str() {
            "extension_uri" | "id" => {
                if let Some(uri) = value.borrow().as_str() {
                    name = uri.to_string();
                    if let Some(v) = parse_version(uri) {
                        version = v;
                    }
                }
            }
            "standard_version_requirement" => {
                if let Some(text) = value.borrow().as_str() {
                    if let Some(v) = parse_version(text.trim_start_matches(['>', '=', '~', '^'])) {
                        standard_requirement = v;
                    }
                }
            }
            "legacy_class_names" => legacy_class_names = scalar_list(value),
            "tags" => tags = parse_tag_list(value, uri)?,
            _ => {}
        }
    }

    Ok(Extension { name, version, standard_requirement, tags, converters: Vec::new(), compressors: Vec::new(), tag_handles: Vec::new(), legacy_class_names })
}

fn parse_tag_list(node: &NodeRef, uri: &str) -> ExtResult<Vec<TagDefinition>> {
    let n = node.borrow();
    let NodeKind::Sequence { items, .. } = &n.kind else {
        return Err(ExtError::MalformedManifest { uri: uri.to_string(), message: "'tags' must be a sequence".into() });
    };
    items.iter().map(|item| parse_tag_definition(item, uri)).collect()
}

fn parse_tag_definition(node: &NodeRef, uri: &str) -> ExtResult<TagDefinition> {
    let n = node.borrow();
    let NodeKind::Mapping { entries, .. } = &n.kind else {
        return Err(ExtError::MalformedManifest { uri: uri.to_string(), message: "each tag entry must be a mapping".into() });
    };
    let mut def = TagDefinition::default();
    for (key, value) in entries {
        let Some(key) = key.borrow().as_str() else { continue };
        match key {
            "tag_uri" => def.tag_uri = value.borrow().as_str().unwrap_or_default().to_string(),
            "schema_uri" => def.schema_uris = scalar_list(value),
            "title" => def.title = value.borrow().as_str().map(str::to_string),
            _ => {}
        }
    }
    Ok(def)
}

fn scalar_list(node: &NodeRef) -> Vec<String> {
    let n = node.borrow();
    match &n.kind {
        NodeKind::Sequence { items, .. } => items.iter().filter_map(|i| i.borrow().as_str().map(str::to_string)).collect(),
        NodeKind::Scalar { value, .. } => vec![value.clone()],
        _ => Vec::new(),
    }
}

/// Parse a trailing `-M.m.p` or bare `M.m.p` version from a string.
fn parse_version(s: &str) -> Option<(u64, u64, u64)> {
    let version = s.rsplit(['-', ':']).next().unwrap_or(s);
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    Some((major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use asdf_tree::parse_document;

    #[test]
    fn parses_manifest_tags_and_requirement() {
        let text = "extension_uri: asdf://example.com/project/extensions/example-1.2.0\nstandard_version_requirement: '>=1.1.0'\nlegacy_class_names:\n  - old.Extension\ntags:\n  - tag_uri: tag:stsci.edu:asdf/core/ndarray-1.0.0\n    schema_uri: http://stsci.edu/schemas/asdf/core/ndarray-1.0.0\n    title: ndarray\n";
        let tree = parse_document(text).unwrap().unwrap();
        let ext = load_manifest(&tree, "test").unwrap();
        assert_eq!(ext.version, (1, 2, 0));
        assert_eq!(ext.standard_requirement, (1, 1, 0));
        assert_eq!(ext.legacy_class_names, vec!["old.Extension".to_string()]);
        assert_eq!(ext.tags.len(), 1);
        assert_eq!(ext.tags[0].tag_uri, "tag:stsci.edu:asdf/core/ndarray-1.0.0");
        assert_eq!(ext.tags[0].title.as_deref(), Some("ndarray"));
    }
}
