//! RSA-PSS stream signer.
//!
//! Signed streams carry one RSA-PSS signature per block plus one over the
//! header. The engine's PSS parameters are fixed: an 11-byte salt and the
//! standard `0xBC` trailer, over a SHA-1 or SHA-256 digest of the message.

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use sha1::Sha1;
use sha2::Sha256;

use crate::{Error, Result};

/// Salt length used by every editor signature.
pub const PSS_SALT_LEN: usize = 11;

/// Digest selection for a signed stream, as stored in its header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashMethod {
    Sha1,
    Sha256,
}

impl HashMethod {
    /// Header tag for this digest.
    pub fn tag(self) -> i32 {
        match self {
            Self::Sha1 => 4,
            Self::Sha256 => 6,
        }
    }

    /// Decode a header tag.
    pub fn from_tag(tag: i32) -> Result<Self> {
        match tag {
            4 => Ok(Self::Sha1),
            6 => Ok(Self::Sha256),
            other => Err(Error::UnsupportedHashMethod(other)),
        }
    }
}

/// Signs header and block material for a signed stream.
///
/// Holds no OS resources; it is dropped together with its owning stream.
pub struct StreamSigner {
    key: RsaPrivateKey,
    hash: HashMethod,
}

impl StreamSigner {
    /// Build a signer from a DER-encoded PKCS#1 `RSAPrivateKey`.
    pub fn from_pkcs1_der(der: &[u8], hash: HashMethod) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs1_der(der)?;
        Ok(Self { key, hash })
    }

    /// Digest this signer applies before padding.
    pub fn hash_method(&self) -> HashMethod {
        self.hash
    }

    /// Signature length in bytes (the RSA modulus size).
    pub fn signature_len(&self) -> usize {
        self.key.size()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let mut rng = rand::thread_rng();
        let signature = match self.hash {
            HashMethod::Sha1 => {
                let key = SigningKey::<Sha1>::new_with_salt_len(self.key.clone(), PSS_SALT_LEN);
                key.try_sign_with_rng(&mut rng, message)?.to_vec()
            }
            HashMethod::Sha256 => {
                let key = SigningKey::<Sha256>::new_with_salt_len(self.key.clone(), PSS_SALT_LEN);
                key.try_sign_with_rng(&mut rng, message)?.to_vec()
            }
        };
        Ok(signature)
    }

    /// Check a signature produced by [`sign`](Self::sign).
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };
        match self.hash {
            HashMethod::Sha1 => {
                VerifyingKey::<Sha1>::new_with_salt_len(self.key.to_public_key(), PSS_SALT_LEN)
                    .verify(message, &signature)
                    .is_ok()
            }
            HashMethod::Sha256 => {
                VerifyingKey::<Sha256>::new_with_salt_len(self.key.to_public_key(), PSS_SALT_LEN)
                    .verify(message, &signature)
                    .is_ok()
            }
        }
    }
}

impl std::fmt::Debug for StreamSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSigner")
            .field("hash", &self.hash)
            .field("signature_len", &self.signature_len())
            .finish()
    }
}
