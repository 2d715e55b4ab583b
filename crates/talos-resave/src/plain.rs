//! Verbatim fallback for unrecognized payloads.

use std::io::{self, Read, Write};

use crate::Result;

/// Copy a payload through unchanged.
pub fn copy_verbatim<R: Read, W: Write>(input: &mut R, out: &mut W) -> Result<u64> {
    Ok(io::copy(input, out)?)
}
