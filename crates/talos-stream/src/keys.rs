//! Editor signing keys.
//!
//! One DER-encoded PKCS#1 `RSAPrivateKey` per engine generation, baked into
//! the binary. They gate whether the game accepts a resaved file, not any
//! secrecy property. Swap the `keys/*.der` blobs to target a different
//! key set at build time.

/// Serious Sam HD editor key (signed-stream version 4).
pub const SSHD_EDITOR_KEY: &[u8] = include_bytes!("../keys/editor_sshd.der");

/// Serious Sam 3 editor key (signed-stream version 5).
pub const SS3_EDITOR_KEY: &[u8] = include_bytes!("../keys/editor_ss3.der");

/// Serious Sam Fusion editor key (signed-stream version 5).
pub const FUSION_EDITOR_KEY: &[u8] = include_bytes!("../keys/editor_fusion.der");

/// Serious Sam 4 editor key (signed-stream version 5).
pub const SS4_EDITOR_KEY: &[u8] = include_bytes!("../keys/editor_ss4.der");
