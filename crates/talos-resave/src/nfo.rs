//! Level info (.nfo) resaver.
//!
//! `KEY=VALUE` lines; only a fixed set of keys carry asset paths, quoted
//! inside the value. A leading UTF-8 BOM is preserved; output uses LF.

use std::io::{BufRead, Write};

use crate::rename::RenameMap;
use crate::Result;

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Keys whose values name assets.
const PATH_KEYS: &[&str] = &[
    "LOADING_SCREEN",
    "THUMBNAIL",
    "INTRO_CUTSCENE_WORLD",
    "NETRICSA",
];

/// Rewrite a level info payload.
pub fn resave_level_info<R: BufRead, W: Write>(
    input: R,
    out: &mut W,
    renames: &RenameMap,
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
        let rewritten = rewrite_line(&line, renames);
        out.write_all(rewritten.as_ref().unwrap_or(&line).as_bytes())?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Scan a level info payload for a reference to any target path.
pub fn scan_level_info<R: BufRead>(input: R, targets: &RenameMap) -> Result<bool> {
    let mut first = true;
    for line in input.lines() {
        let mut line = line?;
        if first {
            first = false;
            if line.starts_with('\u{feff}') {
                line.remove(0);
            }
        }
        if let Some((_, path)) = quoted_path(&line) {
            if targets.contains(path) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn rewrite_line(line: &str, renames: &RenameMap) -> Option<String> {
    let (quote_start, path) = quoted_path(line)?;
    let new_path = renames.get(path)?;
    let end = quote_start + 1 + path.len();
    Some(format!(
        "{}\"{}\"{}",
        &line[..quote_start],
        new_path,
        &line[end + 1..]
    ))
}

/// The first double-quoted span in the value of a recognized key line.
fn quoted_path(line: &str) -> Option<(usize, &str)> {
    let (key, value) = line.split_once('=')?;
    if !PATH_KEYS.contains(&key) {
        return None;
    }
    let open = value.find('"')?;
    let rest = &value[open + 1..];
    let close = rest.find('"')?;
    let quote_start = key.len() + 1 + open;
    Some((quote_start, &rest[..close]))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn run(input: &str, renames: &RenameMap) -> String {
        let mut out = Vec::new();
        resave_level_info(Cursor::new(input), &mut out, renames).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_only_recognized_keys_rewritten() {
        let mut renames = RenameMap::new();
        renames.insert("Content/A.tex", "Content/B.tex");

        let input = "LEVEL 1\nLOADING_SCREEN=\"Content/A.tex\"\nCOMMENT=\"Content/A.tex\"\n";
        let output = run(input, &renames);
        assert_eq!(
            output,
            "LEVEL 1\nLOADING_SCREEN=\"Content/B.tex\"\nCOMMENT=\"Content/A.tex\"\n"
        );
    }

    #[test]
    fn test_all_path_keys() {
        let mut renames = RenameMap::new();
        renames.insert("Content/A.wld", "Content/B.wld");

        for key in PATH_KEYS {
            let input = format!("{key}=\"Content/A.wld\"\n");
            let output = run(&input, &renames);
            assert_eq!(output, format!("{key}=\"Content/B.wld\"\n"));
        }
    }

    #[test]
    fn test_bom_preserved() {
        let mut renames = RenameMap::new();
        renames.insert("Content/A.tex", "Content/B.tex");

        let input = "\u{feff}LEVEL 1\nTHUMBNAIL=\"Content/A.tex\"\n";
        let output = run(input, &renames);
        assert_eq!(output.as_bytes()[..3], [0xEF, 0xBB, 0xBF]);
        assert_eq!(&output[3..], "LEVEL 1\nTHUMBNAIL=\"Content/B.tex\"\n");
    }

    #[test]
    fn test_scan() {
        let mut targets = RenameMap::new();
        targets.insert("Content/A.tex", "Content/B.tex");

        let hit = "LEVEL 1\nNETRICSA=\"Content/A.tex\"\n";
        let miss = "LEVEL 1\nCOMMENT=\"Content/A.tex\"\n";
        assert!(scan_level_info(Cursor::new(hit), &targets).unwrap());
        assert!(!scan_level_info(Cursor::new(miss), &targets).unwrap());
    }
}
