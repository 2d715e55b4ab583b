//! Wrecked stream codec.
//!
//! A wrecked stream scrambles its block layout instead of its bytes: block
//! sizes come from a pair of PRNG registers and are stored obfuscated in
//! 8-byte headers between blocks. The payload bytes themselves pass through
//! untouched, so readers only need to map out the block extents.
//!
//! The size derivation deliberately routes through single-precision floats;
//! the stored sizes are persisted round-trip, so the arithmetic here must
//! match IEEE-754 `f32` rounding step for step.

use std::io::{self, Read, Seek, SeekFrom, Write};

use talos_common::{ReadExt, ReadSeekExt, WriteExt};

use crate::{Error, Result};

/// Wrecked-stream header magic.
pub const WRECKED_MAGIC: u32 = 0x6C72_0D60;

/// Block-size generator backing the wrecked codec.
#[derive(Debug, Clone)]
pub struct BlockSizeGenerator {
    num1: u32,
    num2: u32,
}

impl BlockSizeGenerator {
    /// Fresh generator in its fixed initial state.
    pub fn new() -> Self {
        Self {
            num1: 0x1234_5678,
            num2: 0x8765_4321,
        }
    }

    /// Advance one tick; returns the register mix and the block size.
    pub fn advance(&mut self) -> (u32, u32) {
        self.num1 = (self.num1 >> 1) | (((self.num1 ^ (self.num1 << 3)) & 0xFFFF_FFF8) << 28);
        self.num2 = self.num2.wrapping_mul(1_220_703_125);

        let mix = self.num1 ^ self.num2;
        let scaled = (mix as f64 * 2.328_306_4e-10) as f32;
        let size = (scaled * 1_048_576.0 + 1_048_576.0 + 5_242_880.0) as i32;
        (mix, size as u32)
    }
}

impl Default for BlockSizeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Obfuscate a block size for storage.
pub fn pack_block_size(size: u32) -> u32 {
    size.wrapping_mul(1512).wrapping_add(662_700_032).rotate_left(4)
}

/// Recover a block size from its stored form.
pub fn unpack_block_size(packed: u32) -> u32 {
    packed.rotate_right(4) / 1512 + 5_242_880
}

#[derive(Debug, Clone, Copy)]
struct Block {
    base_offset: u64,
    logical_offset: u64,
    size: u64,
}

/// Read side of the wrecked stream codec.
///
/// Block extents are discovered lazily as reads and seeks advance; the
/// payload is served straight from the base stream.
#[derive(Debug)]
pub struct WreckedStreamReader<R> {
    inner: R,
    base_len: u64,
    blocks: Vec<Block>,
    exhausted: bool,
    pos: u64,
}

impl<R: Read + Seek> WreckedStreamReader<R> {
    /// Parse the stream header and locate the first block.
    pub fn new(mut inner: R) -> Result<Self> {
        let magic = inner.read_u32_le()?;
        if magic != WRECKED_MAGIC {
            return Err(Error::MalformedHeader("bad wrecked-stream magic"));
        }
        let _tick = inner.read_u32_le()?;
        let packed = inner.read_u32_le()?;

        let base_len = inner.stream_len()?;
        let data_start = inner.stream_position()?;
        let size = u64::from(unpack_block_size(packed)).min(base_len - data_start);

        let exhausted = data_start + size >= base_len;
        Ok(Self {
            inner,
            base_len,
            blocks: vec![Block {
                base_offset: data_start,
                logical_offset: 0,
                size,
            }],
            exhausted,
            pos: 0,
        })
    }

    /// Total payload length; scans the remaining block headers.
    pub fn len(&mut self) -> Result<u64> {
        while self.discover_next()? {}
        let last = self.blocks.last().expect("at least one block");
        Ok(last.logical_offset + last.size)
    }

    /// Whether the stream carries no payload.
    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn discover_next(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let last = *self.blocks.last().expect("at least one block");
        let header_at = last.base_offset + last.size;
        let remaining = self.base_len - header_at;
        if remaining == 0 {
            self.exhausted = true;
            return Ok(false);
        }
        if remaining < 8 {
            return Err(Error::Truncated);
        }

        self.inner.seek(SeekFrom::Start(header_at))?;
        let _tick = self.inner.read_u32_le()?;
        let packed = self.inner.read_u32_le()?;
        let size = u64::from(unpack_block_size(packed)).min(remaining - 8);

        self.blocks.push(Block {
            base_offset: header_at + 8,
            logical_offset: last.logical_offset + last.size,
            size,
        });
        if header_at + 8 + size >= self.base_len {
            self.exhausted = true;
        }
        Ok(true)
    }

    /// Index of the block containing `pos`, discovering headers as needed.
    fn block_for(&mut self, pos: u64) -> Result<Option<usize>> {
        loop {
            let last = self.blocks.last().expect("at least one block");
            if pos < last.logical_offset + last.size {
                // Blocks are in logical order; scan back for the owner.
                let index = self
                    .blocks
                    .iter()
                    .rposition(|b| b.logical_offset <= pos && pos < b.logical_offset + b.size)
                    .expect("position is covered by a discovered block");
                return Ok(Some(index));
            }
            if !self.discover_next()? {
                return Ok(None);
            }
        }
    }
}

impl<R: Read + Seek> Read for WreckedStreamReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            let Some(index) = self.block_for(self.pos).map_err(Error::into_io)? else {
                break;
            };
            let block = self.blocks[index];
            let offset = self.pos - block.logical_offset;
            let n = ((block.size - offset) as usize).min(buf.len() - written);

            self.inner.seek(SeekFrom::Start(block.base_offset + offset))?;
            self.inner.read_exact(&mut buf[written..written + n])?;
            written += n;
            self.pos += n as u64;
        }
        Ok(written)
    }
}

impl<R: Read + Seek> Seek for WreckedStreamReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
            SeekFrom::End(d) => {
                let len = self.len().map_err(Error::into_io)?;
                len as i128 + d as i128
            }
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of wrecked stream",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

/// Write side of the wrecked stream codec.
///
/// Emits the stream magic and the first block header up front, then streams
/// payload bytes through, inserting an 8-byte header at every block
/// boundary. Short final blocks need no trailer; readers truncate the last
/// stored size to the bytes actually present.
pub struct WreckedStreamWriter<W: Write> {
    inner: W,
    generator: BlockSizeGenerator,
    remaining: u64,
}

impl<W: Write> WreckedStreamWriter<W> {
    /// Write the stream header and return the writer.
    pub fn new(mut inner: W) -> Result<Self> {
        inner.write_u32_le(WRECKED_MAGIC)?;
        let mut generator = BlockSizeGenerator::new();
        let (mix, size) = generator.advance();
        inner.write_u32_le(mix)?;
        inner.write_u32_le(pack_block_size(size))?;
        Ok(Self {
            inner,
            generator,
            remaining: u64::from(size),
        })
    }

    /// Flush and return the inner writer.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for WreckedStreamWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;
        while !rest.is_empty() {
            if self.remaining == 0 {
                let (mix, size) = self.generator.advance();
                self.inner.write_u32_le(mix).map_err(|e| Error::from(e).into_io())?;
                self.inner
                    .write_u32_le(pack_block_size(size))
                    .map_err(|e| Error::from(e).into_io())?;
                self.remaining = u64::from(size);
            }
            let n = rest.len().min(self.remaining as usize);
            self.inner.write_all(&rest[..n])?;
            self.remaining -= n as u64;
            rest = &rest[n..];
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    // First ticks of the generator, fixed by its initial register values.
    const GOLDEN: [(u32, u32); 4] = [
        (0xFB03_CE09, 7_319_613),
        (0x61BE_2347, 6_691_810),
        (0x22A2_ED82, 6_433_327),
        (0xBE92_F3B6, 7_072_047),
    ];

    #[test]
    fn test_generator_golden_values() {
        let mut generator = BlockSizeGenerator::new();
        for &(mix, size) in &GOLDEN {
            assert_eq!(generator.advance(), (mix, size));
        }
    }

    #[test]
    fn test_pack_unpack_identity() {
        let mut generator = BlockSizeGenerator::new();
        for _ in 0..64 {
            let (_, size) = generator.advance();
            assert_eq!(unpack_block_size(pack_block_size(size)), size);
        }
    }

    #[test]
    fn test_roundtrip_three_blocks() {
        // Enough payload to span the first two blocks into a third.
        let len = (GOLDEN[0].1 + GOLDEN[1].1 + 1000) as usize;
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();

        let mut writer = WreckedStreamWriter::new(Vec::new()).unwrap();
        writer.write_all(&data).unwrap();
        let encoded = writer.finish().unwrap();

        // magic + three block headers (8 bytes each, first overlaps the
        // stream header) around the payload.
        assert_eq!(encoded.len(), 4 + 3 * 8 + data.len());

        let mut reader = WreckedStreamReader::new(Cursor::new(encoded)).unwrap();
        assert_eq!(reader.len().unwrap(), data.len() as u64);

        let mut decoded = Vec::new();
        reader.read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_block_boundaries() {
        let len = (GOLDEN[0].1 + GOLDEN[1].1 + 1000) as usize;
        let data: Vec<u8> = (0..len).map(|i| (i % 13) as u8).collect();

        let mut writer = WreckedStreamWriter::new(Vec::new()).unwrap();
        writer.write_all(&data).unwrap();
        let encoded = writer.finish().unwrap();

        let mut reader = WreckedStreamReader::new(Cursor::new(encoded)).unwrap();
        reader.len().unwrap();
        let sizes: Vec<u64> = reader.blocks.iter().map(|b| b.size).collect();
        assert_eq!(
            sizes,
            [u64::from(GOLDEN[0].1), u64::from(GOLDEN[1].1), 1000]
        );
    }

    #[test]
    fn test_seek_into_second_block() {
        let len = (GOLDEN[0].1 + 500) as usize;
        let data: Vec<u8> = (0..len).map(|i| (i % 199) as u8).collect();

        let mut writer = WreckedStreamWriter::new(Vec::new()).unwrap();
        writer.write_all(&data).unwrap();
        let encoded = writer.finish().unwrap();

        let mut reader = WreckedStreamReader::new(Cursor::new(encoded)).unwrap();
        let probe = GOLDEN[0].1 as u64 + 17;
        reader.seek(SeekFrom::Start(probe)).unwrap();
        let mut buf = [0u8; 16];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf[..], data[probe as usize..probe as usize + 16]);
    }

    #[test]
    fn test_empty_payload() {
        let writer = WreckedStreamWriter::new(Vec::new()).unwrap();
        let encoded = writer.finish().unwrap();
        assert_eq!(encoded.len(), 12);

        let mut reader = WreckedStreamReader::new(Cursor::new(encoded)).unwrap();
        assert_eq!(reader.len().unwrap(), 0);
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_bad_magic() {
        let err = WreckedStreamReader::new(Cursor::new(vec![0u8; 16])).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader(_)));
    }
}
