//! Composer for binary meta payloads.
//!
//! The counterpart to [`MetaReader`](crate::MetaReader): emits the header
//! and blocks in the byte order the reader expects. Used heavily by tests
//! to build fixtures, and by tooling that needs to synthesize small meta
//! payloads.

use crate::parser::{ENDIAN_COOKIE, META_MAGIC};

/// Endianness-aware writer for a meta payload held in memory.
pub struct MetaWriter {
    buf: Vec<u8>,
    big_endian: bool,
    version: i32,
}

impl MetaWriter {
    /// Start a payload: magic, cookie, version, and (version > 1) an empty
    /// annotation string.
    pub fn new(version: i32, big_endian: bool) -> Self {
        let mut writer = Self {
            buf: Vec::new(),
            big_endian,
            version,
        };
        writer.buf.extend_from_slice(&META_MAGIC.to_le_bytes());
        let cookie = if big_endian {
            ENDIAN_COOKIE.swap_bytes()
        } else {
            ENDIAN_COOKIE
        };
        writer.buf.extend_from_slice(&cookie.to_le_bytes());
        writer.write_i32(version);
        if version > 1 {
            writer.write_string("");
        }
        writer
    }

    /// Declared version.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Append an i32 in the payload's byte order.
    pub fn write_i32(&mut self, value: i32) {
        let bytes = if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        self.buf.extend_from_slice(&bytes);
    }

    /// Append a u32 in the payload's byte order.
    pub fn write_u32(&mut self, value: u32) {
        self.write_i32(value as i32);
    }

    /// Append a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) {
        self.write_i32(value.len() as i32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Append raw bytes verbatim.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a block magic.
    pub fn begin_block(&mut self, magic: [u8; 4]) {
        self.buf.extend_from_slice(&magic);
    }

    /// Append a block magic and element count.
    pub fn begin_list(&mut self, magic: [u8; 4], count: i32) {
        self.begin_block(magic);
        self.write_i32(count);
    }

    /// Finished payload bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Current payload length.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet (never true: the header is
    /// emitted in `new`).
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
