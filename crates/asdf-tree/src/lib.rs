//! The tagged document tree: a YAML subset reader/writer that preserves
//! tags, anchors/aliases, mapping order, and flow/block style well enough
//! to round-trip an ASDF document's YAML part faithfully.
//!
//! Mapping-key-type restriction (standard >= 1.6 permits only string/int/bool
//! keys) is exposed via [`Node::is_valid_key_scalar`] but is not enforced by
//! the parser itself — the schema/validation layer decides when it matters.

mod emitter;
mod error;
mod node;
mod parser;

pub use emitter::emit_document;
pub use error::{TreeError, TreeResult};
pub use node::{walk, CollectionStyle, Node, NodeKind, NodeRef, ScalarStyle};
pub use parser::parse_document;
