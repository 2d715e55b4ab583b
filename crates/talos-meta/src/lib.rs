//! Binary meta payload parser for Serious Engine assets.
//!
//! A meta payload describes itself: after a fixed header and a table of
//! external file references, it declares the complete type system its
//! objects use, then stores the objects as bare field data interpretable
//! only through those declarations. This crate parses the header and
//! blocks ([`MetaReader`]), materializes the type table ([`TypeTable`]),
//! and walks object payloads by type (the walkers in [`walker`]).
//!
//! # Quick start
//!
//! ```no_run
//! use std::io::Cursor;
//! use talos_meta::{MetaReader, TypeTable};
//!
//! # fn demo(bytes: Vec<u8>) -> talos_meta::Result<()> {
//! let mut reader = MetaReader::new(Cursor::new(bytes))?;
//! // ... consume the leading blocks ...
//! let types = TypeTable::parse(&mut reader)?;
//! if let Some(index) = types.index_of("CModel") {
//!     types.visit_resource_links(index, &mut reader, &mut |r| {
//!         println!("references {}", r.read_string()?);
//!         Ok(())
//!     })?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
mod error;
mod parser;
mod types;
pub mod walker;

pub use builder::MetaWriter;
pub use error::{Error, Result};
pub use parser::{
    block, write_meta_string, write_meta_u32, MetaReader, ENDIAN_COOKIE, ENDIAN_COOKIE_SWAPPED,
    META_MAGIC,
};
pub use types::{DataTypeDef, StructMember, TypeKind, TypeTable};
