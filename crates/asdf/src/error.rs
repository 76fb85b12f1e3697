//! Document engine error and warning taxonomy.

use thiserror::Error;

/// Errors raised by the document engine, composing every lower-layer
/// crate's error type via `#[from]`.
#[derive(Debug, Error)]
pub enum AsdfError {
    /// The first line was not a recognized `#ASDF <M.m.p>` magic.
    #[error("not an ASDF file: missing or malformed '#ASDF' magic line")]
    MissingMagic,

    /// The file format version is higher than this engine understands.
    #[error("unsupported ASDF file format version {found} (understands up to {supported})")]
    UnsupportedFileFormatVersion {
        /// Version found in the file.
        found: String,
        /// Highest version this engine supports.
        supported: String,
    },

    /// The YAML document body had no closing `...` marker.
    #[error("YAML document body is not terminated by '...'")]
    UnterminatedDocument,

    /// Schema validation failed and the active policy is to raise.
    #[error("validation failed with {count} error(s): {detail}", count = errors.len(), detail = summarize(errors))]
    ValidationFailed {
        /// Every validation failure collected during the run.
        errors: Vec<asdf_schema::SchemaValidationError>,
    },

    /// A native-object conversion never resolved after draining every
    /// pending continuation — the object graph has an unbreakable cycle.
    #[error("reference cycle left {0} object(s) unresolved")]
    UnresolvedReferenceCycle(usize),

    /// A write was asked to serialize a native value no registered
    /// extension claims, and no fallback was configured.
    #[error("no converter registered for type '{0}'")]
    UnknownType(String),

    /// The block index at the end of the file failed its sanity check and
    /// no linear scan fallback was permitted by the caller's policy.
    #[error("block index is invalid and linear-scan fallback is disabled")]
    BlockIndexRejected,

    /// Byte I/O failure.
    #[error(transparent)]
    Io(#[from] asdf_io::IoError),

    /// Block store failure.
    #[error(transparent)]
    Block(#[from] asdf_block::BlockError),

    /// YAML tree parse/emit failure.
    #[error(transparent)]
    Tree(#[from] asdf_tree::TreeError),

    /// `$ref` resolution failure.
    #[error(transparent)]
    Resolver(#[from] asdf_resolver::ResolverError),

    /// Schema loading failure (distinct from [`Self::ValidationFailed`],
    /// which carries validation *results* rather than a load error).
    #[error(transparent)]
    Schema(#[from] asdf_schema::SchemaError),

    /// Extension registration or converter selection failure.
    #[error(transparent)]
    Ext(#[from] asdf_ext::ExtError),
}

fn summarize(errors: &[asdf_schema::SchemaValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Result type for document engine operations.
pub type AsdfResult<T> = Result<T, AsdfError>;

/// Non-fatal conditions collected alongside a successful `open`/`write`,
/// never silently dropped. [`crate::config::ValidationPolicy::Warn`]
/// downgrades what would otherwise be an [`AsdfError`] into one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The document's standard version is newer than this engine was
    /// built against.
    VersionMismatch {
        /// Standard version declared by the file.
        found: (u64, u64, u64),
        /// Highest standard version this engine was validated against.
        supported: (u64, u64, u64),
    },
    /// A tagged node's extension could not be found; it round-trips as a
    /// raw tagged container instead of a native object.
    MissingExtension {
        /// The tag URI that had no matching converter.
        tag: String,
    },
    /// A tag matched an extension only at a different major version.
    UnknownTag {
        /// The tag URI in question.
        tag: String,
    },
    /// The trailing block index failed its sanity check; the engine fell
    /// back to a linear scan.
    BlockIndexInvalid,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VersionMismatch { found, supported } => {
                write!(f, "document standard version {found:?} is newer than supported {supported:?}")
            }
            Self::MissingExtension { tag } => write!(f, "no extension registered for tag '{tag}'"),
            Self::UnknownTag { tag } => write!(f, "tag '{tag}' matched only at a different major version"),
            Self::BlockIndexInvalid => write!(f, "block index failed sanity check, used linear scan"),
        }
    }
}
