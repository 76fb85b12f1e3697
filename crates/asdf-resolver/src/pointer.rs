//! JSON-pointer (RFC 6901) parsing and tree traversal. Hand-rolled rather
//! than pulled in as a dependency — it is a handful of lines once the tree
//! model already exists, the same call the teacher makes for its own
//! path/index traversal helpers.

use asdf_tree::{NodeKind, NodeRef};

/// A parsed JSON pointer: a sequence of already-unescaped reference tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pointer(pub Vec<String>);

impl Pointer {
    /// Parse a pointer string, e.g. `/history/extensions/0`. The empty
    /// string and `"/"`-less root both parse to the empty pointer.
    pub fn parse(s: &str) -> Self {
        if s.is_empty() || s == "/" {
            return Self(Vec::new());
        }
        let s = s.strip_prefix('/').unwrap_or(s);
        Self(s.split('/').map(unescape_token).collect())
    }

    /// True if this pointer addresses the document root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for token in &self.0 {
            write!(f, "/{}", escape_token(token))?;
        }
        Ok(())
    }
}

fn unescape_token(s: &str) -> String {
    s.replace("~1", "/").replace("~0", "~")
}

fn escape_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

/// Walk `root` following `pointer`, one token at a time: a mapping step
/// matches a key whose scalar text equals the token; a sequence step parses
/// the token as a decimal index.
pub fn resolve(root: &NodeRef, pointer: &Pointer) -> Option<NodeRef> {
    let mut current = root.clone();
    for token in &pointer.0 {
        let next = {
            let node = current.borrow();
            match &node.kind {
                NodeKind::Mapping { entries, .. } => entries
                    .iter()
                    .find(|(k, _)| k.borrow().as_str() == Some(token.as_str()))
                    .map(|(_, v)| v.clone()),
                NodeKind::Sequence { items, .. } => token.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
                NodeKind::Scalar { .. } | NodeKind::Alias { .. } => None,
            }
        };
        current = next?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use asdf_tree::parse_document;

    #[test]
    fn parses_tokens_and_unescapes() {
        let p = Pointer::parse("/a~1b/c~0d/2");
        assert_eq!(p.0, vec!["a/b".to_string(), "c~d".to_string(), "2".to_string()]);
    }

    #[test]
    fn resolves_through_mapping_and_sequence() {
        let doc = parse_document("items:\n  - name: a\n  - name: b\n").unwrap().unwrap();
        let p = Pointer::parse("/items/1/name");
        let found = resolve(&doc, &p).unwrap();
        assert_eq!(found.borrow().as_str(), Some("b"));
    }

    #[test]
    fn missing_path_resolves_to_none() {
        let doc = parse_document("a: 1\n").unwrap().unwrap();
        assert!(resolve(&doc, &Pointer::parse("/missing")).is_none());
    }

    #[test]
    fn root_pointer_returns_input() {
        let doc = parse_document("a: 1\n").unwrap().unwrap();
        assert!(resolve(&doc, &Pointer::parse("")).is_some());
    }
}
