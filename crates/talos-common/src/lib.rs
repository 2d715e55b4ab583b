//! Common utilities for Talos.
//!
//! This crate provides the foundational stream vocabulary used across all
//! Talos crates:
//!
//! - [`ReadExt`] / [`WriteExt`] - primitive reads and writes shared by the
//!   stream codecs (little-endian integers, length-prefixed strings)
//! - [`ReadSeekExt`] - non-consuming peeks and stream length
//! - [`ReadSeek`] - boxable `Read + Seek` bound for layered codecs

mod error;
mod io;

pub use error::{Error, Result};
pub use io::{ReadExt, ReadSeek, ReadSeekExt, WriteExt};
