//! Extension registry (component F): converters between tagged tree nodes
//! and native types, tag definitions, compressors, tag-handle shortcuts,
//! and version-aware selection, loadable from declarative manifests.

mod block_access;
mod converter;
mod error;
mod extension;
mod manifest;
mod registry;

pub use block_access::{BlockAllocator, BlockReader};
pub use converter::{ConversionContext, ConversionOutcome, Converter, NativeValue, PendingConversion};
pub use error::{ExtError, ExtResult};
pub use extension::{Extension, TagDefinition, TagHandle};
pub use manifest::load_manifest;
pub use registry::{ConverterMatch, ExtensionRegistry};
