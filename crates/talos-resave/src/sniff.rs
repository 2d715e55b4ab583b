//! Payload format detection.

/// Formats the resavers and scanners understand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Binary meta payload (`CTSEMETA`).
    BinaryMeta,
    /// Text meta payload (`MetaText`).
    TextMeta,
    /// Level info file (`LEVEL`, optional UTF-8 BOM).
    LevelInfo,
    /// Lua script, recognized by extension.
    Lua,
    /// Anything else; copied verbatim.
    Opaque,
}

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Classify a payload from its first bytes and its path.
///
/// `head` should hold at least the first 11 bytes where available (a BOM
/// plus an 8-byte magic); shorter heads fall through to the extension
/// check.
pub fn sniff_format(head: &[u8], rel_path: &str) -> PayloadFormat {
    if head.starts_with(b"CTSEMETA") {
        return PayloadFormat::BinaryMeta;
    }
    let text = head.strip_prefix(BOM).unwrap_or(head);
    if text.starts_with(b"MetaText") {
        return PayloadFormat::TextMeta;
    }
    if text.starts_with(b"LEVEL") {
        return PayloadFormat::LevelInfo;
    }
    if rel_path.to_ascii_lowercase().ends_with(".lua") {
        return PayloadFormat::Lua;
    }
    PayloadFormat::Opaque
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_magics() {
        assert_eq!(
            sniff_format(b"CTSEMETA\xCD\xAB\x34\x12", "Content/X.mdl"),
            PayloadFormat::BinaryMeta
        );
        assert_eq!(
            sniff_format(b"MetaText v2", "Content/X.mdl"),
            PayloadFormat::TextMeta
        );
        assert_eq!(
            sniff_format(b"LEVEL 1.0", "Content/Level.nfo"),
            PayloadFormat::LevelInfo
        );
        assert_eq!(
            sniff_format(b"\xEF\xBB\xBFLEVEL 1.0", "Content/Level.nfo"),
            PayloadFormat::LevelInfo
        );
        assert_eq!(
            sniff_format(b"\xEF\xBB\xBFMetaText", "Content/X.mdl"),
            PayloadFormat::TextMeta
        );
    }

    #[test]
    fn test_sniff_lua_by_extension() {
        assert_eq!(
            sniff_format(b"-- script", "Content/Scripts/Init.LUA"),
            PayloadFormat::Lua
        );
        assert_eq!(
            sniff_format(b"-- script", "Content/Scripts/Init.txt"),
            PayloadFormat::Opaque
        );
    }

    #[test]
    fn test_sniff_short_head() {
        assert_eq!(sniff_format(b"ab", "Content/X.bin"), PayloadFormat::Opaque);
        assert_eq!(sniff_format(b"", "a.lua"), PayloadFormat::Lua);
    }
}
