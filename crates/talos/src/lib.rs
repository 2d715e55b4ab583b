//! Talos - Serious Engine asset renaming library.
//!
//! This crate provides a unified interface to the Talos library ecosystem
//! for renaming game assets and rewriting every reference to them.
//!
//! # Crates
//!
//! - [`talos_common`] - shared stream plumbing (primitive reads/writes)
//! - [`talos_stream`] - signed/wrecked/info stream codecs and game profiles
//! - [`talos_meta`] - binary meta parsing and type-driven object walking
//! - [`talos_resave`] - format resavers, reference scanners, batch driver
//!
//! # Example
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use talos::prelude::*;
//!
//! let driver = BatchDriver::new("/games/Fusion", StreamProfile::Fusion);
//! let files = [ResaveFile::new("Content/Old.tex", "Content/New.tex", true)];
//!
//! // Pick up every file that still points at the old name.
//! let map = RenameMap::from_files(&files);
//! let references = find_referencing_files(driver.root(), &map);
//!
//! let cancel = AtomicBool::new(false);
//! let outcome = driver.run(&files, &references, &cancel, |_, _| {});
//! for (file, error) in &outcome.resave_errors {
//!     eprintln!("{}: {}", file.old_path, error);
//! }
//! ```

// Re-export all sub-crates
pub use talos_common as common;
pub use talos_meta as meta;
pub use talos_resave as resave;
pub use talos_stream as stream;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use talos_common::{ReadExt, ReadSeek, ReadSeekExt, WriteExt};
    pub use talos_meta::{MetaReader, TypeTable};
    pub use talos_resave::{
        find_referencing_files, BatchDriver, BatchEvent, BatchOutcome, RenameMap, ResaveFile,
    };
    pub use talos_stream::{open_file, DestStream, SignedHeader, StreamProfile};
}

// Re-export commonly used types at the crate root
pub use talos_resave::{BatchDriver, RenameMap, ResaveFile};
pub use talos_stream::StreamProfile;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
