//! Stream factory: wrapper sniffing and profile-driven output chains.
//!
//! Assets on disk wear up to three wrappers, identified by 8-byte magics at
//! the head of the stream: `SIGSTRM1` (signed), `WRKSTRM1` (wrecked) and
//! `INFSTRM1` (an informational string prefix). Opening a file peels
//! wrappers until the first unrecognized magic; creating one applies the
//! wrappers the selected [`StreamProfile`] dictates for the destination
//! path.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use talos_common::{ReadExt, ReadSeek, ReadSeekExt};

use crate::profile::StreamProfile;
use crate::signed::{SignedStreamReader, SignedStreamWriter};
use crate::wrecked::{WreckedStreamReader, WreckedStreamWriter};
use crate::Result;

/// Wrapper magic preceding a signed stream.
pub const SIGNED_WRAPPER_MAGIC: &[u8; 8] = b"SIGSTRM1";

/// Wrapper magic preceding a wrecked stream.
pub const WRECKED_WRAPPER_MAGIC: &[u8; 8] = b"WRKSTRM1";

/// Wrapper magic preceding an info string.
pub const INFO_WRAPPER_MAGIC: &[u8; 8] = b"INFSTRM1";

/// Peel every recognized wrapper off a readable stream.
///
/// Returns a reader positioned at the innermost payload. Unwrapped layers
/// chain: a wrecked stream inside a signed stream reads through both
/// codecs transparently.
pub fn open_payload(reader: Box<dyn ReadSeek>) -> Result<Box<dyn ReadSeek>> {
    let mut reader = reader;
    loop {
        let head = reader.peek_at_most(8)?;
        if head.len() < 8 {
            break;
        }
        if &head[..] == SIGNED_WRAPPER_MAGIC {
            reader.seek(SeekFrom::Current(8))?;
            reader = Box::new(SignedStreamReader::new(reader)?);
        } else if &head[..] == WRECKED_WRAPPER_MAGIC {
            reader.seek(SeekFrom::Current(8))?;
            reader = Box::new(WreckedStreamReader::new(reader)?);
        } else if &head[..] == INFO_WRAPPER_MAGIC {
            reader.seek(SeekFrom::Current(8))?;
            reader.read_len_string()?;
        } else {
            break;
        }
    }
    Ok(reader)
}

/// Open a file and peel its wrappers.
pub fn open_file(path: &Path) -> Result<Box<dyn ReadSeek>> {
    let file = BufReader::new(File::open(path)?);
    open_payload(Box::new(file))
}

/// Profile-driven output chain.
///
/// Writes are strictly streaming; call [`finish`](Self::finish) to flush
/// the codec tails before the file is usable.
pub enum DestStream {
    Plain(BufWriter<File>),
    Signed(SignedStreamWriter<BufWriter<File>>),
    Wrecked(WreckedStreamWriter<SignedStreamWriter<BufWriter<File>>>),
}

impl DestStream {
    /// Create the destination file with the wrappers `profile` prescribes
    /// for a file at `rel_path`.
    pub fn create(path: &Path, rel_path: &str, profile: StreamProfile) -> Result<Self> {
        let mut file = BufWriter::new(File::create(path)?);

        match profile.signed_spec() {
            Some(spec) if profile.signs_path(rel_path) => {
                file.write_all(SIGNED_WRAPPER_MAGIC)?;
                let mut signed = SignedStreamWriter::new(file, spec.signer()?, spec.version)?;
                if profile.wrecks_path(rel_path) {
                    signed.write_all(WRECKED_WRAPPER_MAGIC)?;
                    Ok(Self::Wrecked(WreckedStreamWriter::new(signed)?))
                } else {
                    Ok(Self::Signed(signed))
                }
            }
            _ => Ok(Self::Plain(file)),
        }
    }

    /// Flush codec tails and close out the chain.
    pub fn finish(self) -> Result<()> {
        match self {
            Self::Plain(mut file) => file.flush()?,
            Self::Signed(signed) => signed.finish()?.flush()?,
            Self::Wrecked(wrecked) => wrecked.finish()?.finish()?.flush()?,
        }
        Ok(())
    }
}

impl Write for DestStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Signed(w) => w.write(buf),
            Self::Wrecked(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Signed(w) => w.flush(),
            Self::Wrecked(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use talos_common::WriteExt;

    use super::*;
    use crate::signer::{HashMethod, StreamSigner};
    use crate::{keys, Error};

    fn test_signer() -> StreamSigner {
        StreamSigner::from_pkcs1_der(keys::SS4_EDITOR_KEY, HashMethod::Sha1).unwrap()
    }

    #[test]
    fn test_plain_passthrough() {
        let data = b"no wrapper here".to_vec();
        let mut payload = open_payload(Box::new(Cursor::new(data.clone()))).unwrap();
        let mut read = Vec::new();
        payload.read_to_end(&mut read).unwrap();
        assert_eq!(read, data);
    }

    #[test]
    fn test_info_strip() {
        let mut encoded = Vec::new();
        encoded.extend_from_slice(INFO_WRAPPER_MAGIC);
        encoded.write_len_string("build 289803").unwrap();
        encoded.extend_from_slice(b"payload");

        let mut payload = open_payload(Box::new(Cursor::new(encoded))).unwrap();
        let mut read = Vec::new();
        payload.read_to_end(&mut read).unwrap();
        assert_eq!(read, b"payload");
    }

    #[test]
    fn test_signed_chain() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();

        let mut out = Vec::new();
        out.extend_from_slice(SIGNED_WRAPPER_MAGIC);
        let mut writer = SignedStreamWriter::new(out, test_signer(), 5).unwrap();
        writer.write_all(&data).unwrap();
        let encoded = writer.finish().unwrap();

        let mut payload = open_payload(Box::new(Cursor::new(encoded))).unwrap();
        let mut read = Vec::new();
        payload.read_to_end(&mut read).unwrap();
        assert_eq!(read, data);
    }

    #[test]
    fn test_wrecked_inside_signed_chain() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 101) as u8).collect();

        let mut out = Vec::new();
        out.extend_from_slice(SIGNED_WRAPPER_MAGIC);
        let mut signed = SignedStreamWriter::new(out, test_signer(), 5).unwrap();
        signed.write_all(WRECKED_WRAPPER_MAGIC).unwrap();
        let mut wrecked = WreckedStreamWriter::new(signed).unwrap();
        wrecked.write_all(&data).unwrap();
        let encoded = wrecked.finish().unwrap().finish().unwrap();

        let mut payload = open_payload(Box::new(Cursor::new(encoded))).unwrap();
        let mut read = Vec::new();
        payload.read_to_end(&mut read).unwrap();
        assert_eq!(read, data);
    }

    #[test]
    fn test_short_file_is_untouched() {
        let mut payload = open_payload(Box::new(Cursor::new(b"tiny".to_vec()))).unwrap();
        let mut read = Vec::new();
        payload.read_to_end(&mut read).unwrap();
        assert_eq!(read, b"tiny");
    }

    #[test]
    fn test_signed_magic_without_header_fails() {
        let mut encoded = SIGNED_WRAPPER_MAGIC.to_vec();
        encoded.extend_from_slice(&[0u8; 32]);
        assert!(matches!(
            open_payload(Box::new(Cursor::new(encoded))),
            Err(Error::MalformedHeader(_))
        ));
    }
}
