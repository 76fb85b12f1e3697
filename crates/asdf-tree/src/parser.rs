//! A hand-rolled reader for the YAML subset ASDF documents actually use:
//! block and flow mappings/sequences, plain/quoted/literal/folded scalars,
//! anchors, aliases, and explicit tags. It does not attempt full YAML 1.1/1.2
//! compliance (no multi-document streams inside one call, no complex keys
//! spanning multiple lines); callers hand it one document's body, already
//! sliced between the `---` marker and the trailing `...`/block-index tail.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{TreeError, TreeResult};
use crate::node::{CollectionStyle, Node, NodeKind, NodeRef, ScalarStyle};

struct RawLine<'a> {
    number: usize,
    indent: usize,
    /// Content after indentation, with any trailing line comment and
    /// trailing whitespace stripped. Empty for blank or comment-only lines.
    content: &'a str,
}

fn split_lines(text: &str) -> Vec<RawLine<'_>> {
    let mut out = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let indent = raw.len() - raw.trim_start_matches(' ').len();
        let rest = &raw[indent..];
        let content = strip_trailing_comment(rest).trim_end();
        out.push(RawLine { number: i + 1, indent, content });
    }
    out
}

/// Strip a `# ...` trailing comment, respecting single/double quoting so a
/// `#` inside a quoted scalar is not mistaken for one.
fn strip_trailing_comment(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'#' if !in_single && !in_double && (i == 0 || bytes[i - 1] == b' ') => return &s[..i],
            _ => {}
        }
        i += 1;
    }
    s
}

/// Parse one YAML document body into a tagged tree. Returns `None` for an
/// entirely empty or `~`/`null`-only document.
pub fn parse_document(text: &str) -> TreeResult<Option<NodeRef>> {
    let lines: Vec<RawLine<'_>> = split_lines(text)
        .into_iter()
        .filter(|l| !l.content.is_empty() && !l.content.starts_with('%') && l.content != "---")
        .take_while(|l| l.content != "...")
        .collect();

    if lines.is_empty() {
        return Ok(None);
    }

    let mut parser = Parser { lines, pos: 0, anchors: HashMap::new() };
    let root = parser.parse_node(0)?;
    Ok(Some(root))
}

struct Parser<'a> {
    lines: Vec<RawLine<'a>>,
    pos: usize,
    anchors: HashMap<String, NodeRef>,
}

/// A leading `&anchor` / `!tag` prefix stripped off a content string, plus
/// what remains.
struct Prefixed<'a> {
    anchor: Option<String>,
    tag: Option<String>,
    rest: &'a str,
}

fn strip_prefix(mut s: &str) -> Prefixed<'_> {
    let mut anchor = None;
    let mut tag = None;
    loop {
        s = s.trim_start();
        if let Some(stripped) = s.strip_prefix('&') {
            let (name, rest) = split_token(stripped);
            anchor = Some(name.to_string());
            s = rest;
        } else if let Some(stripped) = s.strip_prefix('!') {
            let (name, rest) = split_token(stripped);
            tag = Some(format!("!{name}"));
            s = rest;
        } else {
            break;
        }
    }
    Prefixed { anchor, tag, rest: s }
}

fn split_token(s: &str) -> (&str, &str) {
    match s.find(' ') {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    }
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&RawLine<'a>> {
        self.lines.get(self.pos)
    }

    fn line_number(&self) -> usize {
        self.peek().map_or(self.lines.last().map_or(1, |l| l.number + 1), |l| l.number)
    }

    /// Parse the node beginning at or after `self.pos`, requiring its first
    /// line to have indentation `>= min_indent`.
    fn parse_node(&mut self, min_indent: usize) -> TreeResult<NodeRef> {
        let line = self.peek().ok_or_else(|| TreeError::Syntax { line: self.line_number(), message: "unexpected end of document".into() })?;
        if line.indent < min_indent {
            return Err(TreeError::InvalidIndentation { line: line.number, found: line.indent });
        }
        let indent = line.indent;
        let content = line.content;

        if content == "-" || content.starts_with("- ") {
            self.parse_block_sequence(indent)
        } else if is_mapping_line(content) {
            self.parse_block_mapping(indent)
        } else {
            self.parse_scalar_line(indent)
        }
    }

    fn parse_block_sequence(&mut self, indent: usize) -> TreeResult<NodeRef> {
        let mut items = Vec::new();
        while let Some(line) = self.peek() {
            if line.indent != indent {
                break;
            }
            if !(line.content == "-" || line.content.starts_with("- ")) {
                break;
            }
            let number = line.number;
            let rest = if line.content == "-" { "" } else { line.content[2..].trim_start() };
            let item_col = indent + (line.content.len() - rest.len());
            self.pos += 1;

            if rest.is_empty() {
                let item = self.parse_node(indent + 1)?;
                items.push(item);
            } else if rest == "-" || rest.starts_with("- ") || is_mapping_line(rest) {
                // Inline continuation ("- key: value" / "- - nested"): splice
                // a synthetic line so the existing block parsers can treat
                // `rest` as if it began its own line at `item_col`.
                self.lines.insert(self.pos, RawLine { number, indent: item_col, content: rest });
                let item = self.parse_node(item_col)?;
                items.push(item);
            } else {
                let scalar = self.parse_scalar_text(rest, number)?;
                items.push(scalar);
            }
        }
        Ok(Node::sequence(items, CollectionStyle::Block))
    }

    fn parse_block_mapping(&mut self, indent: usize) -> TreeResult<NodeRef> {
        let mut entries = Vec::new();
        while let Some(line) = self.peek() {
            if line.indent != indent || !is_mapping_line(line.content) {
                break;
            }
            let number = line.number;
            let content = line.content;
            let split = find_key_split(content).ok_or_else(|| TreeError::Syntax { line: number, message: "expected 'key: value'".into() })?;
            let key_text = content[..split].trim_end();
            let value_text = content[split..].trim_start_matches(':').trim_start();
            self.pos += 1;

            let key = self.parse_scalar_text(key_text, number)?;
            if !key.borrow().is_valid_key_scalar() {
                tracing::debug!(line = number, "mapping key is not a restricted scalar kind");
            }

            let value = if value_text.is_empty() {
                match self.peek() {
                    Some(next) if next.indent > indent => self.parse_node(indent + 1)?,
                    _ => Node::scalar("", ScalarStyle::Plain),
                }
            } else {
                self.parse_inline_value(value_text, number, indent)?
            };

            if let Some(text) = key.borrow().as_str() {
                if entries.iter().any(|(k, _): &(NodeRef, NodeRef)| k.borrow().as_str() == Some(text)) {
                    return Err(TreeError::DuplicateMappingKey { line: number, key: text.to_string() });
                }
            }
            entries.push((key, value));
        }
        Ok(Node::mapping(entries, CollectionStyle::Block))
    }

    /// A value appearing after `key:` on the same line: a flow collection,
    /// an alias, a block-scalar header (`|`/`>`, whose body is the
    /// following more-indented lines), or a plain/quoted scalar.
    fn parse_inline_value(&mut self, text: &str, number: usize, parent_indent: usize) -> TreeResult<NodeRef> {
        let prefixed = strip_prefix(text);
        let rest = prefixed.rest.trim();

        if rest == "|" || rest == ">" || rest.starts_with("|-") || rest.starts_with(">-") || rest.starts_with("|+") || rest.starts_with(">+") {
            let folded = rest.starts_with('>');
            let chomp_strip = rest.ends_with('-');
            // Blank lines are dropped before parsing ever begins (see
            // `split_lines`/the filter in `parse_document`), so interior
            // blank-line fidelity within a block scalar is not preserved.
            let mut body_lines = Vec::new();
            while let Some(line) = self.peek() {
                if line.indent <= parent_indent {
                    break;
                }
                body_lines.push(line.content.to_string());
                self.pos += 1;
            }
            while chomp_strip && body_lines.last().is_some_and(String::is_empty) {
                body_lines.pop();
            }
            let joined = if folded { body_lines.join(" ") } else { body_lines.join("\n") };
            let node = Node::scalar(joined, if folded { ScalarStyle::Folded } else { ScalarStyle::Literal });
            self.finish_node(node, prefixed.anchor, prefixed.tag, number)
        } else {
            self.parse_scalar_text(text, number)
        }
    }

    /// A standalone scalar-or-alias-or-flow value occupying its own line.
    fn parse_scalar_line(&mut self, _indent: usize) -> TreeResult<NodeRef> {
        let line = self.peek().expect("checked by caller");
        let number = line.number;
        let content = line.content;
        self.pos += 1;
        self.parse_scalar_text(content, number)
    }

    fn parse_scalar_text(&mut self, text: &str, number: usize) -> TreeResult<NodeRef> {
        let prefixed = strip_prefix(text);
        let rest = prefixed.rest;

        if let Some(name) = rest.strip_prefix('*') {
            let name = name.trim().to_string();
            let target = self
                .anchors
                .get(&name)
                .ok_or_else(|| TreeError::UndefinedAlias { line: number, name: name.clone() })?;
            return Ok(Node::new(NodeKind::Alias { name, target: Rc::downgrade(target) }));
        }

        if rest.starts_with('[') {
            let node = self.parse_flow_sequence(rest)?;
            return self.finish_node(node, prefixed.anchor, prefixed.tag, number);
        }
        if rest.starts_with('{') {
            let node = self.parse_flow_mapping(rest)?;
            return self.finish_node(node, prefixed.anchor, prefixed.tag, number);
        }

        let (value, style) = unquote(rest);
        let node = Node::scalar(value, style);
        self.finish_node(node, prefixed.anchor, prefixed.tag, number)
    }

    fn finish_node(&mut self, node: NodeRef, anchor: Option<String>, tag: Option<String>, number: usize) -> TreeResult<NodeRef> {
        if let Some(name) = anchor {
            if self.anchors.contains_key(&name) {
                return Err(TreeError::DuplicateAnchor { line: number, name });
            }
            node.borrow_mut().anchor = Some(name.clone());
            self.anchors.insert(name, Rc::clone(&node));
        }
        if let Some(tag) = tag {
            node.borrow_mut().tag = Some(tag);
        }
        Ok(node)
    }

    fn parse_flow_sequence(&mut self, text: &str) -> TreeResult<NodeRef> {
        let inner = text.strip_prefix('[').and_then(|s| s.strip_suffix(']')).ok_or(TreeError::UnterminatedFlowCollection { line: self.line_number() })?;
        let mut items = Vec::new();
        for part in split_flow_items(inner) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            items.push(self.parse_scalar_text(part, self.line_number())?);
        }
        Ok(Node::sequence(items, CollectionStyle::Flow))
    }

    fn parse_flow_mapping(&mut self, text: &str) -> TreeResult<NodeRef> {
        let inner = text.strip_prefix('{').and_then(|s| s.strip_suffix('}')).ok_or(TreeError::UnterminatedFlowCollection { line: self.line_number() })?;
        let mut entries = Vec::new();
        for part in split_flow_items(inner) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let split = find_key_split(part).ok_or_else(|| TreeError::Syntax { line: self.line_number(), message: "expected 'key: value' in flow mapping".into() })?;
            let key = self.parse_scalar_text(part[..split].trim_end(), self.line_number())?;
            let value = self.parse_scalar_text(part[split..].trim_start_matches(':').trim_start(), self.line_number())?;

            if let Some(text) = key.borrow().as_str() {
                if entries.iter().any(|(k, _): &(NodeRef, NodeRef)| k.borrow().as_str() == Some(text)) {
                    return Err(TreeError::DuplicateMappingKey { line: self.line_number(), key: text.to_string() });
                }
            }
            entries.push((key, value));
        }
        Ok(Node::mapping(entries, CollectionStyle::Flow))
    }
}

/// Split a flow collection's interior on top-level commas (ignoring commas
/// nested inside quotes or inner flow collections).
fn split_flow_items(s: &str) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_single = false;
    let mut in_double = false;
    let mut start = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'[' | b'{' if !in_single && !in_double => depth += 1,
            b']' | b'}' if !in_single && !in_double => depth -= 1,
            b',' if depth == 0 && !in_single && !in_double => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// True if `content` contains a top-level (unquoted, not inside brackets)
/// `": "` or a trailing `":"`, marking it as a mapping entry line.
fn is_mapping_line(content: &str) -> bool {
    find_key_split(content).is_some()
}

fn find_key_split(content: &str) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    let mut depth = 0i32;
    for i in 0..bytes.len() {
        match bytes[i] {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'[' | b'{' if !in_single && !in_double => depth += 1,
            b']' | b'}' if !in_single && !in_double => depth -= 1,
            b':' if !in_single && !in_double && depth == 0 => {
                if i + 1 == bytes.len() || bytes[i + 1] == b' ' {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strip quoting from a scalar, returning its unescaped text and style.
fn unquote(s: &str) -> (String, ScalarStyle) {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        (s[1..s.len() - 1].replace("''", "'"), ScalarStyle::SingleQuoted)
    } else if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        (unescape_double(&s[1..s.len() - 1]), ScalarStyle::DoubleQuoted)
    } else if s == "~" || s.is_empty() {
        (String::new(), ScalarStyle::Plain)
    } else {
        (s.to_string(), ScalarStyle::Plain)
    }
}

fn unescape_double(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn mapping_entries(node: &NodeRef) -> Vec<(String, String)> {
        let node = node.borrow();
        match &node.kind {
            NodeKind::Mapping { entries, .. } => entries
                .iter()
                .map(|(k, v)| (k.borrow().as_str().unwrap_or_default().to_string(), v.borrow().as_str().unwrap_or_default().to_string()))
                .collect(),
            _ => panic!("expected mapping"),
        }
    }

    #[test]
    fn parses_flat_mapping() {
        let doc = parse_document("asdf_library: 2.0\nhistory: ~\n").unwrap().unwrap();
        assert_eq!(mapping_entries(&doc), vec![("asdf_library".into(), "2.0".into()), ("history".into(), "".into())]);
    }

    #[test]
    fn parses_nested_sequence_of_mappings() {
        let text = "items:\n  - name: a\n    value: 1\n  - name: b\n    value: 2\n";
        let doc = parse_document(text).unwrap().unwrap();
        let doc_ref = doc.borrow();
        let NodeKind::Mapping { entries, .. } = &doc_ref.kind else { panic!() };
        let (_, items) = &entries[0];
        let items_ref = items.borrow();
        let NodeKind::Sequence { items, .. } = &items_ref.kind else { panic!() };
        assert_eq!(items.len(), 2);
        assert_eq!(mapping_entries(&items[0]), vec![("name".into(), "a".into()), ("value".into(), "1".into())]);
    }

    #[test]
    fn resolves_anchor_and_alias() {
        let text = "base: &b [1, 2, 3]\nview: *b\n";
        let doc = parse_document(text).unwrap().unwrap();
        let doc_ref = doc.borrow();
        let NodeKind::Mapping { entries, .. } = &doc_ref.kind else { panic!() };
        let (_, view) = &entries[1];
        let view_ref = view.borrow();
        let NodeKind::Alias { target, .. } = &view_ref.kind else { panic!("expected alias") };
        assert!(target.upgrade().is_some());
    }

    #[test]
    fn undefined_alias_errors() {
        let err = parse_document("view: *missing\n").unwrap_err();
        assert!(matches!(err, TreeError::UndefinedAlias { .. }));
    }

    #[test]
    fn duplicate_block_mapping_key_errors() {
        let err = parse_document("name: a\nname: b\n").unwrap_err();
        assert!(matches!(err, TreeError::DuplicateMappingKey { key, .. } if key == "name"));
    }

    #[test]
    fn duplicate_flow_mapping_key_errors() {
        let err = parse_document("point: {x: 1, x: 2}\n").unwrap_err();
        assert!(matches!(err, TreeError::DuplicateMappingKey { key, .. } if key == "x"));
    }

    #[test]
    fn parses_flow_mapping_value() {
        let doc = parse_document("point: {x: 1, y: 2}\n").unwrap().unwrap();
        let doc_ref = doc.borrow();
        let NodeKind::Mapping { entries, .. } = &doc_ref.kind else { panic!() };
        assert_eq!(mapping_entries(&entries[0].1), vec![("x".into(), "1".into()), ("y".into(), "2".into())]);
    }

    #[test]
    fn parses_tagged_scalar() {
        let doc = parse_document("value: !core/complex-1.0.0 1+2j\n").unwrap().unwrap();
        let doc_ref = doc.borrow();
        let NodeKind::Mapping { entries, .. } = &doc_ref.kind else { panic!() };
        assert_eq!(entries[0].1.borrow().tag.as_deref(), Some("!core/complex-1.0.0"));
    }

    #[test]
    fn parses_literal_block_scalar() {
        let text = "description: |\n  line one\n  line two\nother: 1\n";
        let doc = parse_document(text).unwrap().unwrap();
        let doc_ref = doc.borrow();
        let NodeKind::Mapping { entries, .. } = &doc_ref.kind else { panic!() };
        assert_eq!(entries[0].1.borrow().as_str(), Some("line one\nline two"));
        assert_eq!(entries[1].0.borrow().as_str(), Some("other"));
    }
}
