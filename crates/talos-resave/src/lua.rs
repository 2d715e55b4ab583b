//! Lua script resaver.
//!
//! Scripts reference assets through `LoadResource(...)` and `dofile(...)`
//! calls. Every call whose argument path is in the rename map is rewritten
//! to the canonical `Function("path")` form; surrounding text is kept.
//! A leading UTF-8 BOM is preserved; output uses LF.

use std::io::{BufRead, Write};
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::rename::RenameMap;
use crate::Result;

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

fn call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?P<function>LoadResource|dofile)\s*\(\s*["']?(?P<path>[^"')]+)["']?\s*\)"#)
            .expect("call pattern compiles")
    })
}

/// Rewrite a Lua script payload.
pub fn resave_lua<R: BufRead, W: Write>(input: R, out: &mut W, renames: &RenameMap) -> Result<()> {
    let pattern = call_pattern();
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
        let rewritten = pattern.replace_all(&line, |caps: &Captures| {
            match renames.get(&caps["path"]) {
                Some(new_path) => format!("{}(\"{}\")", &caps["function"], new_path),
                None => caps[0].to_string(),
            }
        });
        out.write_all(rewritten.as_bytes())?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Scan a Lua script payload for a reference to any target path.
pub fn scan_lua<R: BufRead>(input: R, targets: &RenameMap) -> Result<bool> {
    let pattern = call_pattern();
    for line in input.lines() {
        let line = line?;
        for caps in pattern.captures_iter(&line) {
            if targets.contains(&caps["path"]) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn run(input: &str, renames: &RenameMap) -> String {
        let mut out = Vec::new();
        resave_lua(Cursor::new(input), &mut out, renames).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_call_rewrite_keeps_surrounding_text() {
        let mut renames = RenameMap::new();
        renames.insert("Content/Old.tex", "Content/New.tex");

        let input = "LoadResource(\"Content/Old.tex\") -- comment\nprint(\"hi\")\n";
        let output = run(input, &renames);
        assert_eq!(
            output,
            "LoadResource(\"Content/New.tex\") -- comment\nprint(\"hi\")\n"
        );
    }

    #[test]
    fn test_quote_styles_and_spacing() {
        let mut renames = RenameMap::new();
        renames.insert("Scripts/Init.lua", "Scripts/Boot.lua");

        let output = run("dofile( 'Scripts/Init.lua' )\n", &renames);
        assert_eq!(output, "dofile(\"Scripts/Boot.lua\")\n");
    }

    #[test]
    fn test_multiple_calls_per_line() {
        let mut renames = RenameMap::new();
        renames.insert("A.tex", "B.tex");
        renames.insert("C.tex", "D.tex");

        let output = run("LoadResource(\"A.tex\") LoadResource(\"C.tex\")\n", &renames);
        assert_eq!(output, "LoadResource(\"B.tex\") LoadResource(\"D.tex\")\n");
    }

    #[test]
    fn test_unmatched_call_untouched() {
        let renames = RenameMap::new();
        let input = "LoadResource('Content/Keep.tex')\n";
        assert_eq!(run(input, &renames), input);
    }

    #[test]
    fn test_bom_preserved() {
        let renames = RenameMap::new();
        let output = run("\u{feff}-- header\n", &renames);
        assert_eq!(output.as_bytes()[..3], [0xEF, 0xBB, 0xBF]);
        assert_eq!(&output[3..], "-- header\n");
    }

    #[test]
    fn test_scan() {
        let mut targets = RenameMap::new();
        targets.insert("Content/Old.tex", "Content/New.tex");

        assert!(scan_lua(
            Cursor::new("x = LoadResource('Content/Old.tex')\n"),
            &targets
        )
        .unwrap());
        assert!(!scan_lua(Cursor::new("-- Content/Old.tex\n"), &targets).unwrap());
    }
}
