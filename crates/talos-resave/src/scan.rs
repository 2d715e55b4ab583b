//! Reference scanning across formats and directory trees.

use std::io::BufReader;
use std::path::Path;

use rayon::prelude::*;
use talos_common::{ReadSeek, ReadSeekExt};
use walkdir::WalkDir;

use crate::binary::scan_binary_meta;
use crate::lua::scan_lua;
use crate::nfo::scan_level_info;
use crate::rename::RenameMap;
use crate::sniff::{sniff_format, PayloadFormat};
use crate::textmeta::scan_text_meta;
use crate::Result;

/// Whether an unwrapped payload references any target path.
pub fn stream_references_any(
    mut reader: Box<dyn ReadSeek>,
    rel_path: &str,
    targets: &RenameMap,
) -> Result<bool> {
    let head = reader.peek_at_most(16)?;
    match sniff_format(&head, rel_path) {
        PayloadFormat::BinaryMeta => scan_binary_meta(reader, targets),
        PayloadFormat::TextMeta => scan_text_meta(BufReader::new(reader), targets),
        PayloadFormat::LevelInfo => scan_level_info(BufReader::new(reader), targets),
        PayloadFormat::Lua => scan_lua(BufReader::new(reader), targets),
        PayloadFormat::Opaque => Ok(false),
    }
}

/// Sweep a game tree for files referencing any target path.
///
/// Files that are themselves being renamed are excluded, and files that
/// fail to open or parse are treated as referencing nothing (a sweep over
/// a game directory routinely crosses unrelated formats).
pub fn find_referencing_files(root: &Path, targets: &RenameMap) -> Vec<String> {
    let candidates: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let rel = entry.path().strip_prefix(root).ok()?;
            let rel = rel.to_string_lossy().replace('\\', "/");
            (!targets.contains(&rel)).then_some(rel)
        })
        .collect();

    let mut hits: Vec<String> = candidates
        .into_par_iter()
        .filter(|rel| {
            let path = root.join(rel);
            matches!(scan_one(&path, rel, targets), Ok(true))
        })
        .collect();
    hits.sort();
    hits
}

fn scan_one(path: &Path, rel_path: &str, targets: &RenameMap) -> Result<bool> {
    let reader = talos_stream::open_file(path)?;
    stream_references_any(reader, rel_path, targets)
}
