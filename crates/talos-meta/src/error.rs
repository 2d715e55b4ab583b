//! Error types for talos-meta.

use thiserror::Error;

use crate::types::TypeKind;

/// Error type for binary meta parsing and walking.
#[derive(Debug, Error)]
pub enum Error {
    /// Top-level header did not parse.
    #[error("malformed meta header: {0}")]
    MalformedHeader(&'static str),

    /// Endianness cookie was neither byte order.
    #[error("unexpected endianness cookie {0:#010x}")]
    UnexpectedEndianness(u32),

    /// A block began with the wrong magic.
    #[error("unexpected block: expected {expected}, got {actual}")]
    UnexpectedBlock { expected: String, actual: String },

    /// A type index referenced outside the internal-types table.
    #[error("type index {0} out of range")]
    TypeIndexOutOfRange(usize),

    /// A walker met a kind it has no rule for.
    #[error("cannot walk type {name} of kind {kind:?}")]
    UnsupportedTypeKind { name: String, kind: TypeKind },

    /// A unique pointer carried an unrecognized template.
    #[error("unknown template {template:?} on type {name}")]
    UnknownTemplate { name: String, template: String },

    /// Stream ended inside a structure.
    #[error("meta stream truncated")]
    Truncated,

    /// Error from the common stream plumbing.
    #[error(transparent)]
    Common(#[from] talos_common::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the meta Error type.
pub type Result<T> = std::result::Result<T, Error>;
