//! Positional reader over a binary meta payload.
//!
//! A meta file opens with the ASCII magic `CTSEMETA`, an endianness cookie,
//! a version, and (from version 2 on) an annotation string. The rest of the
//! file is a fixed sequence of named blocks; a list is a block followed by
//! an element count. All integers and string length prefixes obey the
//! cookie; block magics are raw 4-byte ASCII tags either way.

use std::io::{self, Read, Seek, SeekFrom, Write};

use talos_common::ReadExt;

use crate::{Error, Result};

/// `CTSEMETA` interpreted as a little-endian u64.
pub const META_MAGIC: u64 = 0x4154_454D_4553_5443;

/// Endianness cookie as stored by a little-endian file.
pub const ENDIAN_COOKIE: u32 = 0x1234_ABCD;

/// The cookie as it reads back from a big-endian file.
pub const ENDIAN_COOKIE_SWAPPED: u32 = 0xCDAB_3412;

/// Block magics, in file order.
pub mod block {
    pub const MESSAGES: [u8; 4] = *b"MSGS";
    pub const INFO: [u8; 4] = *b"INFO";
    pub const EXTERNAL_FILES: [u8; 4] = *b"RFIL";
    pub const IDENTIFIERS: [u8; 4] = *b"IDNT";
    pub const EXTERNAL_TYPES: [u8; 4] = *b"EXTY";
    pub const INTERNAL_TYPES: [u8; 4] = *b"INTY";
    pub const DATA_TYPE: [u8; 4] = *b"DTTY";
    pub const STRUCT_MEMBERS: [u8; 4] = *b"STMB";
    pub const EXTERNAL_OBJECTS: [u8; 4] = *b"EXOB";
    pub const INTERNAL_OBJECT_TYPES: [u8; 4] = *b"OBTY";
    pub const EDIT_OBJECT_TYPES: [u8; 4] = *b"EDTY";
    pub const INTERNAL_OBJECTS: [u8; 4] = *b"OBJS";
    pub const EDIT_OBJECTS: [u8; 4] = *b"EDOB";
}

/// Endianness-aware positional reader over a meta payload.
#[derive(Debug)]
pub struct MetaReader<R> {
    inner: R,
    big_endian: bool,
    version: i32,
}

impl<R: Read + Seek> MetaReader<R> {
    /// Consume the top-level header: magic, cookie, version, annotation.
    pub fn new(mut inner: R) -> Result<Self> {
        let magic = inner.read_u64_le()?;
        if magic != META_MAGIC {
            return Err(Error::MalformedHeader("bad CTSEMETA magic"));
        }
        let big_endian = match inner.read_u32_le()? {
            ENDIAN_COOKIE => false,
            ENDIAN_COOKIE_SWAPPED => true,
            other => return Err(Error::UnexpectedEndianness(other)),
        };

        let mut reader = Self {
            inner,
            big_endian,
            version: 0,
        };
        reader.version = reader.read_i32()?;
        if reader.version > 1 {
            reader.read_string()?;
        }
        Ok(reader)
    }

    /// Declared meta version.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Whether integer fields are byte-swapped.
    pub fn big_endian(&self) -> bool {
        self.big_endian
    }

    /// Read an i32 in the file's byte order.
    pub fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(if self.big_endian {
            i32::from_be_bytes(buf)
        } else {
            i32::from_le_bytes(buf)
        })
    }

    /// Read a u32 in the file's byte order.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_i32().map(|v| v as u32)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_i32()?;
        if len < 1 {
            return Ok(String::new());
        }
        let bytes = self.inner.read_vec(len as usize)?;
        String::from_utf8(bytes).map_err(|e| Error::Common(e.into()))
    }

    /// Advance past `count` bytes.
    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Current(count as i64))?;
        Ok(())
    }

    /// Advance past one length-prefixed string.
    pub fn skip_string(&mut self) -> Result<()> {
        let len = self.read_i32()?;
        if len > 0 {
            self.skip(len as u64)?;
        }
        Ok(())
    }

    /// Assert a 4-byte block magic.
    pub fn expect_block(&mut self, magic: [u8; 4]) -> Result<()> {
        let mut actual = [0u8; 4];
        self.inner.read_exact(&mut actual)?;
        if actual != magic {
            return Err(Error::UnexpectedBlock {
                expected: tag_name(magic),
                actual: tag_name(actual),
            });
        }
        Ok(())
    }

    /// Assert a block magic and read the following element count.
    pub fn begin_list(&mut self, magic: [u8; 4]) -> Result<i32> {
        self.expect_block(magic)?;
        let count = self.read_i32()?;
        if count < 0 {
            return Err(Error::MalformedHeader("negative list length"));
        }
        Ok(count)
    }

    /// Current byte position in the underlying payload stream.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Copy the byte range `[from, to)` of the payload to `out`, leaving
    /// the read position where it was.
    pub fn copy_range_to<W: Write>(&mut self, out: &mut W, from: u64, to: u64) -> Result<()> {
        debug_assert!(from <= to);
        let saved = self.inner.stream_position()?;
        self.inner.seek(SeekFrom::Start(from))?;
        let copied = io::copy(&mut (&mut self.inner).take(to - from), out)?;
        if copied != to - from {
            return Err(Error::Truncated);
        }
        self.inner.seek(SeekFrom::Start(saved))?;
        Ok(())
    }

    /// Copy everything from `from` to the end of the payload to `out`.
    pub fn copy_rest_to<W: Write>(&mut self, out: &mut W, from: u64) -> Result<u64> {
        self.inner.seek(SeekFrom::Start(from))?;
        Ok(io::copy(&mut self.inner, out)?)
    }
}

/// Write a length-prefixed string in the given byte order.
pub fn write_meta_string<W: Write>(out: &mut W, value: &str, big_endian: bool) -> io::Result<()> {
    let len = value.len() as i32;
    let prefix = if big_endian {
        len.to_be_bytes()
    } else {
        len.to_le_bytes()
    };
    out.write_all(&prefix)?;
    out.write_all(value.as_bytes())
}

/// Write a u32 in the given byte order.
pub fn write_meta_u32<W: Write>(out: &mut W, value: u32, big_endian: bool) -> io::Result<()> {
    let bytes = if big_endian {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    };
    out.write_all(&bytes)
}

fn tag_name(magic: [u8; 4]) -> String {
    magic.iter().map(|&b| b as char).collect()
}
