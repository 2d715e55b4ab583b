//! Asset resavers, reference scanners, and the parallel batch driver.
//!
//! Resaving rewrites every cross-reference an asset holds (external file
//! tables and resource links in binary meta payloads, path literals in
//! text meta, level info and Lua files) and, for a file that is itself
//! being renamed, its embedded asset filename and UID. Anything
//! unrecognized is copied verbatim.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use talos_resave::{BatchDriver, ResaveFile};
//! use talos_stream::StreamProfile;
//!
//! let driver = BatchDriver::new("/games/SeriousSam3", StreamProfile::Ss3);
//! let files = [ResaveFile::new(
//!     "Content/Textures/Wall.tex",
//!     "Content/Textures/BrickWall.tex",
//!     true,
//! )];
//! let references = ["Content/Levels/Intro.wld".to_string()];
//!
//! let cancel = AtomicBool::new(false);
//! let outcome = driver.run(&files, &references, &cancel, |done, total| {
//!     println!("{done}/{total}");
//! });
//! assert!(outcome.is_clean());
//! ```

mod binary;
mod driver;
mod error;
mod lua;
mod nfo;
mod plain;
mod rename;
mod scan;
mod sniff;
mod textmeta;

pub use binary::{resave_binary_meta, scan_binary_meta};
pub use driver::{resave_stream, BatchDriver, BatchEvent, BatchOutcome};
pub use error::{Error, Result};
pub use lua::{resave_lua, scan_lua};
pub use nfo::{resave_level_info, scan_level_info};
pub use plain::copy_verbatim;
pub use rename::{RenameMap, ResaveFile};
pub use scan::{find_referencing_files, stream_references_any};
pub use sniff::{sniff_format, PayloadFormat};
pub use textmeta::{resave_text_meta, scan_text_meta};
