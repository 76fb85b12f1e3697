//! Schema registry, resource mapping, and tagged-tree validation (component
//! E): loads ASDF schema documents by URI, caches them, and validates a
//! parsed [`asdf_tree`] document against them.

mod error;
mod registry;
mod resource;
mod schema;
mod validator;

pub use error::{SchemaError, SchemaResult, SchemaValidationError};
pub use registry::SchemaRegistry;
pub use resource::{DirectoryMapping, InMemoryMapping, ResourceMapping, ResourceMappingChain};
pub use schema::{NdarrayConstraint, Schema, SchemaType, parse_schema};
pub use validator::{NoTagSchemas, StandardVersion, TagSchemaIndex, apply_defaults, validate_document, validate_node, STANDARD_1_6};
