//! Error types for talos-resave.

use thiserror::Error;

/// Error type for resaving, scanning, and the batch driver.
#[derive(Debug, Error)]
pub enum Error {
    /// Stream codec failure.
    #[error(transparent)]
    Stream(#[from] talos_stream::Error),

    /// Meta parsing or walking failure.
    #[error(transparent)]
    Meta(#[from] talos_meta::Error),

    /// Error from the common stream plumbing.
    #[error(transparent)]
    Common(#[from] talos_common::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The batch was cancelled before this unit of work ran.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type alias using the resave Error type.
pub type Result<T> = std::result::Result<T, Error>;
