//! Text meta resaver.
//!
//! Text meta files are line-oriented `key = value;` pairs; path values are
//! written as `@"..."` literals. Rewriting touches only path literals found
//! in the rename map and, when the file itself is being renamed, the
//! `rf_strAssetFN` / `rf_ulAssetUID` self-identity lines. Output uses LF
//! line endings.

use std::io::{BufRead, Write};

use crate::rename::RenameMap;
use crate::Result;

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Key fragment of the asset filename line.
const ASSET_FILENAME_KEY: &str = "rf_strAssetFN";

/// Key fragment of the asset UID line.
const ASSET_UID_KEY: &str = "rf_ulAssetUID";

/// Rewrite a text meta payload.
///
/// `new_asset_fn` is supplied only when the file itself is being renamed;
/// it replaces the asset filename and refreshes the asset UID.
pub fn resave_text_meta<R: BufRead, W: Write>(
    input: R,
    out: &mut W,
    renames: &RenameMap,
    new_asset_fn: Option<&str>,
) -> Result<()> {
    let mut first = true;
    for line in input.lines() {
        let mut line = line?;
        if first {
            first = false;
            if line.starts_with('\u{feff}') {
                out.write_all(BOM)?;
                line.remove(0);
            }
        }
        let rewritten = rewrite_line(&line, renames, new_asset_fn);
        out.write_all(rewritten.as_ref().unwrap_or(&line).as_bytes())?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Scan a text meta payload for a reference to any target path.
pub fn scan_text_meta<R: BufRead>(input: R, targets: &RenameMap) -> Result<bool> {
    for line in input.lines() {
        let line = line?;
        if let Some((_, path)) = path_literal(&line) {
            if targets.contains(path) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn rewrite_line(line: &str, renames: &RenameMap, new_asset_fn: Option<&str>) -> Option<String> {
    if let Some(new_fn) = new_asset_fn {
        if let Some(eq) = line.find('=') {
            let key = &line[..eq];
            let prefix = &line[..=eq];
            if key.contains(ASSET_FILENAME_KEY) {
                return Some(format!("{prefix} @\"{new_fn}\";"));
            }
            if key.contains(ASSET_UID_KEY) {
                return Some(format!("{prefix} {};", rand::random::<u32>()));
            }
        }
    }

    let (start, path) = path_literal(line)?;
    let new_path = renames.get(path)?;
    let end = start + 2 + path.len();
    Some(format!("{}@\"{}\"{}", &line[..start], new_path, &line[end + 1..]))
}

/// The first `@"..."` literal on a line: offset of the `@` and inner path.
fn path_literal(line: &str) -> Option<(usize, &str)> {
    let start = line.find("@\"")?;
    let rest = &line[start + 2..];
    let end = rest.find('"')?;
    Some((start, &rest[..end]))
}
