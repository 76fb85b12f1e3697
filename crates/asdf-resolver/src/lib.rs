//! Resolves `{"$ref": "<uri>#<pointer>"}` nodes, intra- and inter-document.
//!
//! This crate never touches a byte source: the document engine supplies a
//! [`DocumentLoader`] that turns a URI into a parsed [`asdf_tree::NodeRef`],
//! letting the resolver stay ignorant of file layout, block storage, or
//! schema validation.

mod error;
mod pointer;
mod resolver;

pub use error::{ResolverError, ResolverResult};
pub use pointer::{resolve as resolve_pointer, Pointer};
pub use resolver::{DocumentLoader, RefProxy, RefSpec, Resolver};
