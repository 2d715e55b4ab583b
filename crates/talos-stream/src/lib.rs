//! Layered asset stream codecs for Serious Engine games.
//!
//! Assets ship wrapped in up to three stream layers, outermost first:
//!
//! - **Signed stream** (`SIGSTRM1` + `SIG2` header): block payloads with
//!   per-block RSA-PSS signatures under a per-game editor key
//! - **Wrecked stream** (`WRKSTRM1`): block sizes derived from a PRNG and
//!   stored obfuscated between blocks
//! - **Info strip** (`INFSTRM1`): a single length-prefixed string before
//!   the payload
//!
//! [`factory::open_file`] peels the layers off for reading;
//! [`factory::DestStream`] applies the layers a [`StreamProfile`]
//! prescribes when writing.

mod error;
mod factory;
pub mod keys;
mod profile;
mod signed;
mod signer;
mod wrecked;

pub use error::{Error, Result};
pub use factory::{
    open_file, open_payload, DestStream, INFO_WRAPPER_MAGIC, SIGNED_WRAPPER_MAGIC,
    WRECKED_WRAPPER_MAGIC,
};
pub use profile::{SignedStreamSpec, StreamProfile, PLAIN_EXTENSIONS, WRECKED_EXTENSION};
pub use signed::{
    SignedHeader, SignedStreamReader, SignedStreamWriter, LATEST_VERSION, SIGNED_MAGIC,
};
pub use signer::{HashMethod, StreamSigner, PSS_SALT_LEN};
pub use wrecked::{
    pack_block_size, unpack_block_size, BlockSizeGenerator, WreckedStreamReader,
    WreckedStreamWriter, WRECKED_MAGIC,
};
