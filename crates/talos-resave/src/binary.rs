//! Binary meta resaver and scanner.
//!
//! The resaver is a copying stream editor: bytes flow from the input to
//! the output untouched until a replacement site is reached, then the
//! pending range is flushed, the replacement written, and the flush cursor
//! advanced past the original bytes. Everything the walkers skip is
//! reproduced bit-exactly, endianness cookie included.
//!
//! Replacement sites:
//!
//! 1. external-file table entries whose path is in the rename map
//! 2. when the file itself is being renamed and its first internal object
//!    is a `CResourceFile`: the asset filename member and the asset UID
//!    member (refreshed to a random u32)
//! 3. resource-link strings inside internal and edit objects whose types
//!    can reach one

use std::io::{Read, Seek, Write};

use talos_meta::{block, write_meta_string, write_meta_u32, MetaReader, TypeTable};

use crate::rename::RenameMap;
use crate::Result;

/// Type whose first instance self-identifies an asset.
const RESOURCE_FILE_TYPE: &str = "CResourceFile";

/// Member id/name of the asset filename inside `CResourceFile`.
const ASSET_FILENAME_MEMBER: &str = "14";

/// Member id/name of the asset UID inside `CResourceFile`.
const ASSET_UID_MEMBER: &str = "7";

/// Rewrite a binary meta payload.
///
/// `new_asset_fn` is supplied only when the file itself is being renamed.
pub fn resave_binary_meta<R: Read + Seek, W: Write>(
    mut input: R,
    out: &mut W,
    renames: &RenameMap,
    new_asset_fn: Option<&str>,
) -> Result<()> {
    let mut last_flush = input.stream_position()?;
    let mut reader = MetaReader::new(input)?;
    let big_endian = reader.big_endian();
    let version = reader.version();

    if version > 9 {
        reader.expect_block(block::MESSAGES)?;
        reader.skip_string()?;
    }
    reader.expect_block(block::INFO)?;
    reader.skip(if version > 7 { 20 } else { 16 })?;

    let entries = reader.begin_list(block::EXTERNAL_FILES)?;
    for _ in 0..entries {
        reader.skip(8)?;
        let at = reader.position()?;
        let path = reader.read_string()?;
        if let Some(new_path) = renames.get(&path) {
            reader.copy_range_to(out, last_flush, at)?;
            write_meta_string(out, new_path, big_endian)?;
            last_flush = at + 4 + path.len() as u64;
        }
    }

    let identifiers = reader.begin_list(block::IDENTIFIERS)?;
    for _ in 0..identifiers {
        reader.skip_string()?;
    }
    let external_types = reader.begin_list(block::EXTERNAL_TYPES)?;
    for _ in 0..external_types {
        reader.skip_string()?;
    }

    let types = TypeTable::parse(&mut reader)?;

    let resource_file_type = types.index_of(RESOURCE_FILE_TYPE);
    let self_rename_members = match (new_asset_fn, resource_file_type) {
        (Some(_), Some(index)) => types
            .get(index)?
            .members
            .as_deref()
            .map_or(0, |members| {
                members
                    .iter()
                    .filter(|m| {
                        m.matches(ASSET_FILENAME_MEMBER) || m.matches(ASSET_UID_MEMBER)
                    })
                    .count()
            }),
        _ => 0,
    };
    let has_links = types.any_resource_link();

    // Nothing downstream can need a rewrite: the rest is verbatim.
    if self_rename_members == 0 && !has_links {
        reader.copy_rest_to(out, last_flush)?;
        return Ok(());
    }

    let externals = reader.begin_list(block::EXTERNAL_OBJECTS)?;
    if externals > 0 {
        reader.skip(externals as u64 * 8)?;
    }

    let object_count = reader.begin_list(block::INTERNAL_OBJECT_TYPES)?;
    let mut object_types = Vec::with_capacity(object_count as usize);
    for _ in 0..object_count {
        object_types.push(reader.read_i32()? as usize);
    }
    let edit_count = reader.begin_list(block::EDIT_OBJECT_TYPES)?;
    let mut edit_types = Vec::with_capacity(edit_count as usize);
    for _ in 0..edit_count {
        edit_types.push(reader.read_i32()? as usize);
    }

    reader.expect_block(block::INTERNAL_OBJECTS)?;
    for (position, &type_index) in object_types.iter().enumerate() {
        let renames_self = position == 0 && Some(type_index) == resource_file_type;
        if let (true, Some(new_fn)) = (renames_self, new_asset_fn) {
            types.visit_struct_members(type_index, &mut reader, &mut |member, r| {
                if member.matches(ASSET_FILENAME_MEMBER) {
                    let at = r.position()?;
                    let old = r.read_string()?;
                    r.copy_range_to(out, last_flush, at)?;
                    write_meta_string(out, new_fn, big_endian)?;
                    last_flush = at + 4 + old.len() as u64;
                    Ok(true)
                } else if member.matches(ASSET_UID_MEMBER) {
                    let at = r.position()?;
                    r.skip(4)?;
                    r.copy_range_to(out, last_flush, at)?;
                    write_meta_u32(out, rand::random(), big_endian)?;
                    last_flush = at + 4;
                    Ok(true)
                } else {
                    Ok(false)
                }
            })?;
        } else {
            rewrite_object_links(
                &types,
                type_index,
                &mut reader,
                out,
                &mut last_flush,
                renames,
                big_endian,
            )?;
        }
    }

    // Without resource links the edit objects cannot change either.
    if has_links {
        reader.expect_block(block::EDIT_OBJECTS)?;
        for &type_index in &edit_types {
            rewrite_object_links(
                &types,
                type_index,
                &mut reader,
                out,
                &mut last_flush,
                renames,
                big_endian,
            )?;
        }
    }

    reader.copy_rest_to(out, last_flush)?;
    Ok(())
}

fn rewrite_object_links<R: Read + Seek, W: Write>(
    types: &TypeTable,
    type_index: usize,
    reader: &mut MetaReader<R>,
    out: &mut W,
    last_flush: &mut u64,
    renames: &RenameMap,
    big_endian: bool,
) -> Result<()> {
    if !types.has_resource_link(type_index) {
        types.skip_value(type_index, reader)?;
        return Ok(());
    }
    types.visit_resource_links(type_index, reader, &mut |r| {
        let at = r.position()?;
        let path = r.read_string()?;
        if let Some(new_path) = renames.get(&path) {
            r.copy_range_to(out, *last_flush, at)?;
            write_meta_string(out, new_path, big_endian)?;
            *last_flush = at + 4 + path.len() as u64;
        }
        Ok(())
    })?;
    Ok(())
}

/// Scan a binary meta payload's external-file table for any target path.
pub fn scan_binary_meta<R: Read + Seek>(input: R, targets: &RenameMap) -> Result<bool> {
    let mut reader = MetaReader::new(input)?;
    let version = reader.version();

    if version > 9 {
        reader.expect_block(block::MESSAGES)?;
        reader.skip_string()?;
    }
    reader.expect_block(block::INFO)?;
    reader.skip(if version > 7 { 20 } else { 16 })?;

    let entries = reader.begin_list(block::EXTERNAL_FILES)?;
    for _ in 0..entries {
        reader.skip(8)?;
        let path = reader.read_string()?;
        if targets.contains(&path) {
            return Ok(true);
        }
    }
    Ok(false)
}
