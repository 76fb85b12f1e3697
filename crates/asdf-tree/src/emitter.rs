//! Style-preserving re-emission of a tagged tree back to YAML text.

use crate::node::{CollectionStyle, Node, NodeKind, NodeRef, ScalarStyle};

/// Number of spaces each nesting level indents by.
const INDENT_WIDTH: usize = 2;

/// Render `root` as a complete YAML document body (no `---`/`...` markers;
/// the document engine adds those along with the magic header line).
pub fn emit_document(root: &NodeRef) -> String {
    let mut out = String::new();
    emit_value(root, 0, &mut out);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// True if `node` can be written inline after a `key: ` or `- `, without
/// starting a new indented block.
fn is_inline(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Scalar { .. } | NodeKind::Alias { .. } => true,
        NodeKind::Sequence { style, items } => *style == CollectionStyle::Flow || items.is_empty(),
        NodeKind::Mapping { style, entries } => *style == CollectionStyle::Flow || entries.is_empty(),
    }
}

fn prefix(node: &Node) -> String {
    let mut out = String::new();
    if let Some(anchor) = &node.anchor {
        out.push('&');
        out.push_str(anchor);
        out.push(' ');
    }
    if let Some(tag) = &node.tag {
        out.push_str(tag);
        out.push(' ');
    }
    out
}

/// Emit `node` as an inline fragment (no leading indentation, no trailing
/// newline): used for flow collection members, scalar values after `key:`,
/// and sequence items that fit on the `- ` line.
fn emit_inline(node: &NodeRef, out: &mut String) {
    let n = node.borrow();
    out.push_str(&prefix(&n));
    match &n.kind {
        NodeKind::Scalar { value, style } => out.push_str(&render_scalar(value, *style)),
        NodeKind::Alias { name, .. } => {
            out.push('*');
            out.push_str(name);
        }
        NodeKind::Sequence { items, .. } => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                emit_inline(item, out);
            }
            out.push(']');
        }
        NodeKind::Mapping { entries, .. } => {
            out.push('{');
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                emit_inline(k, out);
                out.push_str(": ");
                emit_inline(v, out);
            }
            out.push('}');
        }
    }
}

/// Emit `node` at block level, at indentation `indent` columns, including a
/// trailing newline for every line it produces. Used for the document root
/// and for block-style mapping values / sequence items.
fn emit_value(node: &NodeRef, indent: usize, out: &mut String) {
    let n = node.borrow();
    if is_inline(&n) {
        out.push_str(&" ".repeat(indent));
        drop(n);
        emit_inline(node, out);
        out.push('\n');
        return;
    }

    match &n.kind {
        NodeKind::Mapping { entries, .. } => {
            for (key, value) in entries {
                out.push_str(&" ".repeat(indent));
                emit_inline(key, out);
                out.push(':');
                let value_borrow = value.borrow();
                if is_inline(&value_borrow) {
                    out.push(' ');
                    drop(value_borrow);
                    emit_inline(value, out);
                    out.push('\n');
                } else {
                    let prefix_text = prefix(&value_borrow);
                    drop(value_borrow);
                    if !prefix_text.is_empty() {
                        out.push(' ');
                        out.push_str(prefix_text.trim_end());
                    }
                    out.push('\n');
                    emit_value(value, indent + INDENT_WIDTH, out);
                }
            }
        }
        NodeKind::Sequence { items, .. } => {
            for item in items {
                out.push_str(&" ".repeat(indent));
                out.push_str("- ");
                let item_borrow = item.borrow();
                if is_inline(&item_borrow) {
                    drop(item_borrow);
                    emit_inline(item, out);
                    out.push('\n');
                } else {
                    drop(item_borrow);
                    // Emit the item's first line spliced onto the "- "
                    // prefix, continuation lines indented to align under it.
                    let mut nested = String::new();
                    emit_value(item, indent + INDENT_WIDTH, &mut nested);
                    let trimmed = nested.trim_start_matches(' ');
                    out.push_str(trimmed);
                }
            }
        }
        NodeKind::Scalar { .. } | NodeKind::Alias { .. } => unreachable!("handled by is_inline"),
    }
}

fn render_scalar(value: &str, style: ScalarStyle) -> String {
    match style {
        ScalarStyle::SingleQuoted => format!("'{}'", value.replace('\'', "''")),
        ScalarStyle::DoubleQuoted => format!("\"{}\"", escape_double(value)),
        ScalarStyle::Literal | ScalarStyle::Folded => {
            let marker = if style == ScalarStyle::Folded { '>' } else { '|' };
            format!("{marker}\n{}", indent_block(value, INDENT_WIDTH))
        }
        ScalarStyle::Plain => {
            if value.is_empty() {
                "~".to_string()
            } else if needs_quoting(value) {
                format!("\"{}\"", escape_double(value))
            } else {
                value.to_string()
            }
        }
    }
}

fn indent_block(value: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    value.lines().map(|line| format!("{pad}{line}\n")).collect()
}

fn needs_quoting(value: &str) -> bool {
    value.starts_with(['&', '*', '!', '|', '>', '%', '@', '`', '"', '\'', '#', ' '])
        || value.contains(": ")
        || value.ends_with(':')
        || matches!(value, "~" | "null" | "true" | "false" | "Null" | "True" | "False")
}

fn escape_double(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n").replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    #[test]
    fn round_trips_simple_mapping() {
        let text = "asdf_library: 2.0\nhistory: ~\n";
        let tree = parse_document(text).unwrap().unwrap();
        let emitted = emit_document(&tree);
        let reparsed = parse_document(&emitted).unwrap().unwrap();
        assert_eq!(emit_document(&reparsed), emitted);
    }

    #[test]
    fn round_trips_nested_sequence() {
        let text = "items:\n  - name: a\n    value: 1\n  - name: b\n    value: 2\n";
        let tree = parse_document(text).unwrap().unwrap();
        let emitted = emit_document(&tree);
        let reparsed = parse_document(&emitted).unwrap().unwrap();
        assert_eq!(emit_document(&reparsed), emitted);
    }

    #[test]
    fn preserves_tag_on_emission() {
        let text = "value: !core/complex-1.0.0 1+2j\n";
        let tree = parse_document(text).unwrap().unwrap();
        assert!(emit_document(&tree).contains("!core/complex-1.0.0"));
    }

    #[test]
    fn quotes_ambiguous_scalars() {
        assert_eq!(render_scalar("true", ScalarStyle::Plain), "\"true\"");
        assert_eq!(render_scalar("plain text", ScalarStyle::Plain), "plain text");
    }
}
