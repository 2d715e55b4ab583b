//! Extension traits for reading and writing game streams.
//!
//! Every codec in the workspace speaks the same primitive vocabulary:
//! little-endian integers, length-prefixed UTF-8 strings (an `i32` byte
//! count followed by the bytes; a count below 1 denotes the empty string),
//! fixed-value assertions, and non-consuming peeks.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::{Error, Result};

/// Combined `Read + Seek` bound, boxable as a trait object.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Reading primitives shared by all codecs.
pub trait ReadExt: Read {
    /// Read a single byte.
    #[inline]
    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Read a little-endian u32.
    #[inline]
    fn read_u32_le(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a little-endian i32.
    #[inline]
    fn read_i32_le(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    /// Read a little-endian u64.
    #[inline]
    fn read_u64_le(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read exactly `count` bytes into a fresh buffer.
    fn read_vec(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; count];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read a length-prefixed UTF-8 string (little-endian length).
    fn read_len_string(&mut self) -> Result<String> {
        let len = self.read_i32_le()?;
        if len < 1 {
            return Ok(String::new());
        }
        let bytes = self.read_vec(len as usize)?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Consume and discard `count` bytes.
    fn skip_bytes(&mut self, count: u64) -> Result<()> {
        let mut remaining = count;
        let mut scratch = [0u8; 4096];
        while remaining > 0 {
            let want = remaining.min(scratch.len() as u64) as usize;
            let got = self.read(&mut scratch[..want])?;
            if got == 0 {
                return Err(Error::UnexpectedEof {
                    needed: count as usize,
                    available: (count - remaining) as usize,
                });
            }
            remaining -= got as u64;
        }
        Ok(())
    }

    /// Expect specific magic bytes.
    fn expect_magic(&mut self, expected: &[u8]) -> Result<()> {
        let actual = self.read_vec(expected.len())?;
        if actual != expected {
            return Err(Error::InvalidMagic {
                expected: expected.to_vec(),
                actual,
            });
        }
        Ok(())
    }

    /// Expect a specific little-endian u32.
    fn expect_u32_le(&mut self, expected: u32) -> Result<()> {
        let actual = self.read_u32_le()?;
        if actual != expected {
            return Err(Error::ExpectedValue {
                expected: format!("{:#010x}", expected),
                actual: format!("{:#010x}", actual),
            });
        }
        Ok(())
    }
}

impl<R: Read + ?Sized> ReadExt for R {}

/// Peeking and length helpers for seekable readers.
pub trait ReadSeekExt: Read + Seek {
    /// Read up to `count` bytes without consuming them.
    ///
    /// Returns fewer bytes near the end of the stream instead of failing,
    /// so callers can sniff short files.
    fn peek_at_most(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; count];
        let mut filled = 0;
        while filled < count {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        self.seek(SeekFrom::Current(-(filled as i64)))?;
        Ok(buf)
    }

    /// Total stream length; restores the current position.
    fn stream_len(&mut self) -> Result<u64> {
        let pos = self.stream_position()?;
        let len = self.seek(SeekFrom::End(0))?;
        if pos != len {
            self.seek(SeekFrom::Start(pos))?;
        }
        Ok(len)
    }
}

impl<R: Read + Seek + ?Sized> ReadSeekExt for R {}

/// Writing primitives shared by all codecs.
pub trait WriteExt: Write {
    /// Write a little-endian u32.
    #[inline]
    fn write_u32_le(&mut self, value: u32) -> Result<()> {
        self.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    /// Write a little-endian i32.
    #[inline]
    fn write_i32_le(&mut self, value: i32) -> Result<()> {
        self.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string (little-endian length).
    fn write_len_string(&mut self, value: &str) -> Result<()> {
        self.write_i32_le(value.len() as i32)?;
        self.write_all(value.as_bytes())?;
        Ok(())
    }
}

impl<W: Write + ?Sized> WriteExt for W {}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [0x01u8, 0x02, 0x03, 0x04, 0xFF];
        let mut cur = Cursor::new(&data[..]);

        assert_eq!(cur.read_u32_le().unwrap(), 0x04030201);
        assert_eq!(cur.read_u8().unwrap(), 0xFF);
        assert!(cur.read_u8().is_err());
    }

    #[test]
    fn test_len_string_roundtrip() {
        let mut buf = Vec::new();
        buf.write_len_string("Content/Old.tex").unwrap();
        buf.write_len_string("").unwrap();

        let mut cur = Cursor::new(buf);
        assert_eq!(cur.read_len_string().unwrap(), "Content/Old.tex");
        assert_eq!(cur.read_len_string().unwrap(), "");
    }

    #[test]
    fn test_negative_length_is_empty() {
        let mut buf = Vec::new();
        buf.write_i32_le(-1).unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(cur.read_len_string().unwrap(), "");
    }

    #[test]
    fn test_peek_does_not_consume() {
        let data = b"SIGSTRM1rest";
        let mut cur = Cursor::new(&data[..]);

        assert_eq!(cur.peek_at_most(8).unwrap(), b"SIGSTRM1");
        assert_eq!(cur.stream_position().unwrap(), 0);
        cur.expect_magic(b"SIGSTRM1").unwrap();
        assert_eq!(cur.stream_position().unwrap(), 8);
    }

    #[test]
    fn test_peek_short_stream() {
        let data = b"abc";
        let mut cur = Cursor::new(&data[..]);
        assert_eq!(cur.peek_at_most(8).unwrap(), b"abc");
        assert_eq!(cur.stream_position().unwrap(), 0);
    }

    #[test]
    fn test_expect_magic_mismatch() {
        let mut cur = Cursor::new(&b"WRKSTRM1"[..]);
        assert!(matches!(
            cur.expect_magic(b"SIGSTRM1"),
            Err(Error::InvalidMagic { .. })
        ));
    }

    #[test]
    fn test_skip_past_end() {
        let mut cur = Cursor::new(&b"ab"[..]);
        assert!(cur.skip_bytes(4).is_err());
    }

    #[test]
    fn test_stream_len_restores_position() {
        let mut cur = Cursor::new(&b"0123456789"[..]);
        cur.seek(SeekFrom::Start(3)).unwrap();
        assert_eq!(cur.stream_len().unwrap(), 10);
        assert_eq!(cur.stream_position().unwrap(), 3);
    }
}
