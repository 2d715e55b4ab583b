//! Error types for talos-stream.

use thiserror::Error;

/// Error type for stream codecs and the signer.
#[derive(Debug, Error)]
pub enum Error {
    /// Stream header did not parse.
    #[error("malformed stream header: {0}")]
    MalformedHeader(&'static str),

    /// Header version outside the supported range.
    #[error("unsupported stream version {0}")]
    UnsupportedVersion(i32),

    /// Unknown hash-method tag in a signed header.
    #[error("unsupported hash method tag {0}")]
    UnsupportedHashMethod(i32),

    /// Stream ended inside a block.
    #[error("stream truncated inside a block")]
    Truncated,

    /// Signing key failed to decode.
    #[error("invalid signing key: {0}")]
    Key(#[from] rsa::pkcs1::Error),

    /// Signature generation failed.
    #[error("signature error: {0}")]
    Signature(#[from] rsa::signature::Error),

    /// Error from the common stream plumbing.
    #[error(transparent)]
    Common(#[from] talos_common::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the stream Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Convert into an `io::Error` for use inside `Read`/`Write`/`Seek` impls.
    pub(crate) fn into_io(self) -> std::io::Error {
        match self {
            Error::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}
