//! SIG2 signed stream codec.
//!
//! A signed stream is a block-oriented container: a header carrying the
//! block geometry and key identity, a header signature, then `blockSize`
//! payload chunks each followed by `digestSize + signatureSize` bytes of
//! signature material. Readers expose the concatenated payload as a
//! seekable byte stream and do not authenticate the blocks; writers sign
//! every block with the editor key.

use std::io::{self, Read, Seek, SeekFrom, Write};

use talos_common::{ReadExt, ReadSeekExt, WriteExt};
use zerocopy::little_endian::{I32, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::signer::{HashMethod, StreamSigner};
use crate::{Error, Result};

/// `SIG2` header magic.
pub const SIGNED_MAGIC: u32 = 0x5349_4732;

/// Newest header version understood by the codec.
pub const LATEST_VERSION: i32 = 5;

const MAX_BLOCK_SIZE: i32 = 0x0008_0000;
const MAX_DIGEST_SIZE: i32 = 0x1000;

/// Block size emitted by the writer.
const WRITE_BLOCK_SIZE: usize = 0x1_0000;

/// Key identifier emitted by the writer.
const WRITE_KEY_IDENTIFIER: &str = "Signkey.EditorSignature";

/// Mixed into the nonce when signing block N.
const BLOCK_NONCE_SALT: i32 = 0x0B1B;

/// Fixed-size leading portion of the header.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
struct RawHeader {
    magic: U32,
    version: I32,
    block_size: I32,
    hash_method: I32,
    digest_size: I32,
    nonce: I32,
}

/// Parsed signed-stream header.
#[derive(Debug, Clone)]
pub struct SignedHeader {
    pub version: i32,
    pub block_size: i32,
    pub hash_method: HashMethod,
    pub digest_size: i32,
    pub nonce: i32,
    pub signature_size: i32,
    pub key_identifier: String,
}

impl SignedHeader {
    /// Parse the header, leaving the reader at the header-signature bytes.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut raw = [0u8; std::mem::size_of::<RawHeader>()];
        reader.read_exact(&mut raw)?;
        let raw = RawHeader::read_from_bytes(&raw)
            .map_err(|_| Error::MalformedHeader("short header"))?;

        if raw.magic.get() != SIGNED_MAGIC {
            return Err(Error::MalformedHeader("bad SIG2 magic"));
        }
        let version = raw.version.get();
        if !(1..=LATEST_VERSION).contains(&version) {
            return Err(Error::UnsupportedVersion(version));
        }
        let block_size = raw.block_size.get().clamp(0, MAX_BLOCK_SIZE);
        let digest_size = raw.digest_size.get().clamp(0, MAX_DIGEST_SIZE);
        let hash_method = HashMethod::from_tag(raw.hash_method.get())?;

        if version > 1 {
            reader.read_i32_le()?;
        }
        if version > 2 {
            reader.read_i32_le()?;
        }
        if version > 4 {
            reader.read_len_string()?;
        }
        let signature_size = reader.read_i32_le()?.max(0);
        let key_identifier = if signature_size > 0 {
            reader.read_len_string()?
        } else {
            String::new()
        };

        Ok(Self {
            version,
            block_size,
            hash_method,
            digest_size,
            nonce: raw.nonce.get(),
            signature_size,
            key_identifier,
        })
    }

    /// Digest + signature bytes trailing the header and every block.
    pub fn trailer_len(&self) -> u64 {
        (self.digest_size + self.signature_size) as u64
    }
}

/// Read side of the signed stream codec.
///
/// Exposes the block payloads as one contiguous, seekable byte stream.
/// Block signatures are skipped, not verified.
#[derive(Debug)]
pub struct SignedStreamReader<R> {
    inner: R,
    header: SignedHeader,
    data_start: u64,
    block_size: u64,
    stride: u64,
    block_count: u64,
    len: u64,
    pos: u64,
    block: Vec<u8>,
    block_index: Option<u64>,
}

impl<R: Read + Seek> SignedStreamReader<R> {
    /// Parse the header and map out the block geometry.
    pub fn new(mut inner: R) -> Result<Self> {
        let header = SignedHeader::read(&mut inner)?;
        inner.seek(SeekFrom::Current(header.trailer_len() as i64))?;

        let data_start = inner.stream_position()?;
        let base_len = inner.stream_len()?;
        if base_len < data_start {
            return Err(Error::Truncated);
        }
        let total = base_len - data_start;

        let block_size = header.block_size as u64;
        let overhead = header.trailer_len();
        let stride = block_size + overhead;

        let (block_count, len) = if total == 0 {
            (0, 0)
        } else {
            if block_size == 0 {
                return Err(Error::MalformedHeader("zero block size with payload"));
            }
            let block_count = total.div_ceil(stride);
            let trailers = block_count * overhead;
            if trailers > total {
                return Err(Error::Truncated);
            }
            (block_count, total - trailers)
        };

        Ok(Self {
            inner,
            header,
            data_start,
            block_size,
            stride,
            block_count,
            len,
            pos: 0,
            block: Vec::new(),
            block_index: None,
        })
    }

    /// Parsed header.
    pub fn header(&self) -> &SignedHeader {
        &self.header
    }

    /// Logical payload length.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the stream carries no payload.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn load_block(&mut self, index: u64) -> io::Result<()> {
        let payload = if index + 1 == self.block_count {
            self.len - self.block_size * index
        } else {
            self.block_size
        };
        self.inner
            .seek(SeekFrom::Start(self.data_start + self.stride * index))?;
        self.block.resize(payload as usize, 0);
        self.inner.read_exact(&mut self.block)?;
        self.block_index = Some(index);
        Ok(())
    }
}

impl<R: Read + Seek> Read for SignedStreamReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() && self.pos < self.len {
            let index = self.pos / self.block_size;
            if self.block_index != Some(index) {
                self.load_block(index)?;
            }
            let offset = (self.pos - index * self.block_size) as usize;
            let n = (self.block.len() - offset).min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&self.block[offset..offset + n]);
            written += n;
            self.pos += n as u64;
        }
        Ok(written)
    }
}

impl<R: Read + Seek> Seek for SignedStreamReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
            SeekFrom::End(d) => self.len as i128 + d as i128,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of signed stream",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

/// Write side of the signed stream codec.
///
/// Emits a version 4 or 5 header signed with the editor key, then signs
/// each 64 KiB block as it fills. [`finish`](Self::finish) flushes the
/// final partial block; dropping the writer without finishing loses it.
pub struct SignedStreamWriter<W: Write> {
    inner: W,
    signer: StreamSigner,
    nonce: i32,
    block: Vec<u8>,
    block_index: i32,
}

impl<W: Write> SignedStreamWriter<W> {
    /// Write the signed header and return the writer.
    pub fn new(inner: W, signer: StreamSigner, version: i32) -> Result<Self> {
        Self::with_nonce(inner, signer, version, rand::random())
    }

    /// Header emission with a caller-chosen nonce, for deterministic tests.
    pub(crate) fn with_nonce(
        mut inner: W,
        signer: StreamSigner,
        version: i32,
        nonce: i32,
    ) -> Result<Self> {
        if !(1..=LATEST_VERSION).contains(&version) {
            return Err(Error::UnsupportedVersion(version));
        }

        // Everything before the key identifier is covered by the header
        // signature, so it is staged in memory first.
        let mut header = Vec::with_capacity(64);
        header.write_u32_le(SIGNED_MAGIC)?;
        header.write_i32_le(version)?;
        header.write_i32_le(WRITE_BLOCK_SIZE as i32)?;
        header.write_i32_le(signer.hash_method().tag())?;
        header.write_i32_le(0)?;
        header.write_i32_le(nonce)?;
        if version > 1 {
            header.write_i32_le(0)?;
        }
        if version > 2 {
            header.write_i32_le(0)?;
        }
        if version > 4 {
            header.write_len_string("")?;
        }
        header.write_i32_le(signer.signature_len() as i32)?;

        let signature = signer.sign(&header)?;
        inner.write_all(&header)?;
        inner.write_len_string(WRITE_KEY_IDENTIFIER)?;
        inner.write_all(&signature)?;

        Ok(Self {
            inner,
            signer,
            nonce,
            block: Vec::with_capacity(WRITE_BLOCK_SIZE),
            block_index: 0,
        })
    }

    fn flush_block(&mut self) -> Result<()> {
        let salted = self.nonce ^ self.block_index.wrapping_add(BLOCK_NONCE_SALT);
        let mut message = Vec::with_capacity(self.block.len() + 4);
        message.extend_from_slice(&salted.to_le_bytes());
        message.extend_from_slice(&self.block);

        let signature = self.signer.sign(&message)?;
        self.inner.write_all(&self.block)?;
        self.inner.write_all(&signature)?;

        self.block_index = self.block_index.wrapping_add(1);
        self.block.clear();
        Ok(())
    }

    /// Sign and flush any partial final block, returning the inner writer.
    pub fn finish(mut self) -> Result<W> {
        if !self.block.is_empty() {
            self.flush_block()?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for SignedStreamWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;
        while !rest.is_empty() {
            let room = WRITE_BLOCK_SIZE - self.block.len();
            let n = room.min(rest.len());
            self.block.extend_from_slice(&rest[..n]);
            rest = &rest[n..];
            if self.block.len() == WRITE_BLOCK_SIZE {
                self.flush_block().map_err(Error::into_io)?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
