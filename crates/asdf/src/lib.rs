//! ASDF (Advanced Scientific Data Format) document engine.
//!
//! Orchestrates byte I/O ([`asdf_io`]), the binary block store
//! ([`asdf_block`]), the tagged YAML tree ([`asdf_tree`]), `$ref` resolution
//! ([`asdf_resolver`]), schema validation ([`asdf_schema`]), and tag/native
//! conversion ([`asdf_ext`]) into a single `open`/`write`/`update` surface
//! for one ASDF file at a time.

mod config;
mod core_ext;
mod document;
mod error;
mod header;
mod history;
mod loader;

pub use config::{AsdfContext, OpenOptions, ValidationPolicy, WriteOptions};
pub use core_ext::{core_extension, ByteOrder, Constant, HistoryEntry, IntegerValue, NdArray, SoftwareEntry};
pub use document::{Document, NativeContainer, NativeContainerKind, TreeSummary};
pub use error::{AsdfError, AsdfResult, Warning};
pub use header::{FileHeader, ParsedHeader, SUPPORTED_FILE_FORMAT_VERSION};
pub use history::{ExtensionRecord, History};
pub use loader::{resolver_for, FilesystemLoader};
