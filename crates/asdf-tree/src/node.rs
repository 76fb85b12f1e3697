//! The tagged tree: mappings, sequences, scalars, and alias links.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Shared handle to a node. Parent-to-child links are strong (`Rc`); alias
/// links are weak (`Weak`) so that a cycle (a descendant aliasing an
/// ancestor's anchor) does not leak memory.
pub type NodeRef = Rc<RefCell<Node>>;

/// How a scalar was quoted in the source, preserved so re-emission does not
/// gratuitously change a value's representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalarStyle {
    /// Unquoted.
    #[default]
    Plain,
    /// `'...'`
    SingleQuoted,
    /// `"..."`
    DoubleQuoted,
    /// `|` block literal.
    Literal,
    /// `>` block folded.
    Folded,
}

/// Block (indented) vs. flow (`[...]`/`{...}`) collection style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionStyle {
    /// Indentation-delimited.
    #[default]
    Block,
    /// Bracket-delimited, all on one logical construct.
    Flow,
}

/// A node's payload, independent of its tag/anchor metadata.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A scalar leaf: its literal text plus how it was quoted.
    Scalar {
        /// The scalar's textual value, already unescaped.
        value: String,
        /// Quoting style, for round-trip fidelity.
        style: ScalarStyle,
    },
    /// An ordered sequence of nodes.
    Sequence {
        /// Sequence members, in document order.
        items: Vec<NodeRef>,
        /// Block vs. flow style.
        style: CollectionStyle,
    },
    /// An ordered sequence of key/value pairs. Order is preserved because
    /// YAML mappings are insertion-ordered for ASDF's purposes even though
    /// the YAML spec treats them as unordered.
    Mapping {
        /// Key/value pairs, in document order.
        entries: Vec<(NodeRef, NodeRef)>,
        /// Block vs. flow style.
        style: CollectionStyle,
    },
    /// An alias (`*name`) resolving to a previously anchored node. Weak so
    /// that an alias back up to an ancestor does not create a reference
    /// cycle that `Rc` can never free.
    Alias {
        /// The anchor name as written (`*name`).
        name: String,
        /// The aliased node, once resolved.
        target: Weak<RefCell<Node>>,
    },
}

/// One node in the tagged tree: its YAML tag (if explicit), its anchor name
/// (if this node defines one), and its payload.
#[derive(Debug, Clone)]
pub struct Node {
    /// Explicit tag URI (e.g. `tag:stsci.edu:asdf/core/ndarray-1.0.0`), or
    /// `None` if the node carries only its kind's implicit tag.
    pub tag: Option<String>,
    /// Anchor name this node was defined under (`&name`), if any.
    pub anchor: Option<String>,
    /// The node's actual content.
    pub kind: NodeKind,
}

impl Node {
    /// Wrap a [`NodeKind`] with no tag or anchor.
    pub fn new(kind: NodeKind) -> NodeRef {
        Rc::new(RefCell::new(Self { tag: None, anchor: None, kind }))
    }

    /// A plain scalar node.
    pub fn scalar(value: impl Into<String>, style: ScalarStyle) -> NodeRef {
        Self::new(NodeKind::Scalar { value: value.into(), style })
    }

    /// An empty block mapping.
    pub fn mapping(entries: Vec<(NodeRef, NodeRef)>, style: CollectionStyle) -> NodeRef {
        Self::new(NodeKind::Mapping { entries, style })
    }

    /// A sequence node.
    pub fn sequence(items: Vec<NodeRef>, style: CollectionStyle) -> NodeRef {
        Self::new(NodeKind::Sequence { items, style })
    }

    /// This node's scalar text, if it is a scalar.
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }

    /// True if this node (after resolving through any alias) is a mapping.
    pub fn is_mapping(&self) -> bool {
        matches!(self.kind, NodeKind::Mapping { .. })
    }

    /// True if this node is a sequence.
    pub fn is_sequence(&self) -> bool {
        matches!(self.kind, NodeKind::Sequence { .. })
    }

    /// True if this node is a scalar restricted to string/int/bool, the
    /// only mapping-key kinds standard 1.6+ permits. Checked by the
    /// validator, not the parser.
    pub fn is_valid_key_scalar(&self) -> bool {
        match self.as_str() {
            Some(s) => {
                !matches!(self.kind, NodeKind::Scalar { style: ScalarStyle::Literal | ScalarStyle::Folded, .. })
                    && (looks_like_int(s) || looks_like_bool(s) || matches!(self.kind, NodeKind::Scalar { style: ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted, .. }) || is_plain_string(s))
            }
            None => false,
        }
    }
}

fn looks_like_int(s: &str) -> bool {
    let s = s.strip_prefix(['+', '-']).unwrap_or(s);
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn looks_like_bool(s: &str) -> bool {
    matches!(s, "true" | "false" | "True" | "False" | "TRUE" | "FALSE")
}

fn is_plain_string(s: &str) -> bool {
    !s.is_empty()
}

/// Walk `root` and every node transitively reachable through strong
/// (parent-to-child) links, in document order, yielding each once even if
/// multiple aliases point at the same anchor.
pub fn walk(root: &NodeRef, visit: &mut impl FnMut(&NodeRef)) {
    visit(root);
    let node = root.borrow();
    match &node.kind {
        NodeKind::Sequence { items, .. } => {
            for item in items {
                walk(item, visit);
            }
        }
        NodeKind::Mapping { entries, .. } => {
            for (key, value) in entries {
                walk(key, visit);
                walk(value, visit);
            }
        }
        NodeKind::Scalar { .. } | NodeKind::Alias { .. } => {}
    }
}
