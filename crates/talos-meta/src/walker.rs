//! Type-driven walkers over object payloads.
//!
//! Objects in a meta payload carry no framing of their own; the only way
//! past one is to interpret its type declaration field by field. Three
//! walks exist:
//!
//! - [`TypeTable::skip_value`] advances past one instance
//! - [`TypeTable::visit_resource_links`] advances past one instance,
//!   handing control to a callback at every resource-link string; the
//!   callback reads (and may replace) the string before the walk resumes
//! - [`TypeTable::visit_struct_members`] iterates a struct's fields,
//!   letting the callback claim individual members and skipping the rest
//!
//! A handful of engine types have layouts their declarations do not
//! capture; those are special-cased by name before any other rule.

use std::io::{Read, Seek};

use crate::parser::MetaReader;
use crate::types::{DataTypeDef, StructMember, TypeKind, TypeTable};
use crate::{Error, Result};

/// Callback invoked at each resource-link string. The string is unread
/// when the callback runs; the callback must consume it.
pub type OnResourceLink<'a, R> = dyn FnMut(&mut MetaReader<R>) -> Result<()> + 'a;

/// Callback invoked per struct member. Return `true` after consuming the
/// member's bytes, or `false` to let the walker skip it.
pub type OnMember<'a, R> = dyn FnMut(&StructMember, &mut MetaReader<R>) -> Result<bool> + 'a;

impl TypeTable {
    /// Advance past one instance of the type at `index`.
    pub fn skip_value<R: Read + Seek>(
        &self,
        index: usize,
        reader: &mut MetaReader<R>,
    ) -> Result<()> {
        let def = self.get(index)?;

        match def.name.as_str() {
            "CString" => return reader.skip_string(),
            "CMetaPointer" | "CMetaHandle" | "CSyncedSLONG" => return reader.skip(4),
            "CTransString" => {
                reader.skip(4)?;
                reader.skip_string()?;
                return reader.skip_string();
            }
            "CBaseTexture" => {
                self.skip_struct_fields(def, reader)?;
                return self.skip_texture_blob(def, reader);
            }
            _ => {}
        }

        if let Some(size) = def.size {
            return reader.skip(u64::from(size));
        }

        match def.kind {
            TypeKind::Array => {
                let element = self.referent_of(def)?;
                for _ in 0..def.array_size.unwrap_or(0) {
                    self.skip_value(element, reader)?;
                }
            }
            TypeKind::StaticArray | TypeKind::StaticStackArray => {
                reader.skip(4)?;
                let count = reader.read_i32()?;
                let element = self.referent_of(def)?;
                for _ in 0..count {
                    self.skip_value(element, reader)?;
                }
            }
            TypeKind::DynamicContainer => {
                reader.skip(4)?;
                let count = reader.read_i32()?;
                if count > 0 {
                    reader.skip(count as u64 * 4)?;
                }
            }
            TypeKind::Struct => self.skip_struct_fields(def, reader)?,
            TypeKind::Typedef => self.skip_value(self.referent_of(def)?, reader)?,
            TypeKind::UniquePointer => match def.template.as_deref() {
                Some("ResourceLink") => reader.skip_string()?,
                Some("Synced") => self.skip_value(self.referent_of(def)?, reader)?,
                Some("CStaticArray2D") => {
                    reader.skip(8)?;
                    reader.skip(4)?;
                    let count = reader.read_i32()?;
                    let element = self.referent_of(def)?;
                    for _ in 0..count {
                        self.skip_value(element, reader)?;
                    }
                }
                other => {
                    return Err(Error::UnknownTemplate {
                        name: def.name.clone(),
                        template: other.unwrap_or_default().to_string(),
                    })
                }
            },
            TypeKind::Void => {}
            kind => {
                return Err(Error::UnsupportedTypeKind {
                    name: def.name.clone(),
                    kind,
                })
            }
        }
        Ok(())
    }

    /// Advance past one instance, yielding at every resource-link string.
    ///
    /// Branches that cannot reach a link are skipped wholesale, so callers
    /// should only start this walk on types whose
    /// [`has_resource_link`](Self::has_resource_link) is true.
    pub fn visit_resource_links<R: Read + Seek>(
        &self,
        index: usize,
        reader: &mut MetaReader<R>,
        on_link: &mut OnResourceLink<'_, R>,
    ) -> Result<()> {
        if !self.has_resource_link(index) {
            return self.skip_value(index, reader);
        }
        let def = self.get(index)?;

        if def.name == "CBaseTexture" {
            self.visit_struct_links(def, reader, on_link)?;
            return self.skip_texture_blob(def, reader);
        }

        match def.kind {
            TypeKind::Array => {
                let element = self.referent_of(def)?;
                for _ in 0..def.array_size.unwrap_or(0) {
                    self.visit_resource_links(element, reader, on_link)?;
                }
            }
            TypeKind::StaticArray | TypeKind::StaticStackArray => {
                reader.skip(4)?;
                let count = reader.read_i32()?;
                let element = self.referent_of(def)?;
                for _ in 0..count {
                    self.visit_resource_links(element, reader, on_link)?;
                }
            }
            TypeKind::Struct => self.visit_struct_links(def, reader, on_link)?,
            TypeKind::Typedef => {
                self.visit_resource_links(self.referent_of(def)?, reader, on_link)?
            }
            TypeKind::UniquePointer => match def.template.as_deref() {
                Some("ResourceLink") => on_link(reader)?,
                Some("Synced") => {
                    self.visit_resource_links(self.referent_of(def)?, reader, on_link)?
                }
                Some("CStaticArray2D") => {
                    reader.skip(8)?;
                    reader.skip(4)?;
                    let count = reader.read_i32()?;
                    let element = self.referent_of(def)?;
                    for _ in 0..count {
                        self.visit_resource_links(element, reader, on_link)?;
                    }
                }
                other => {
                    return Err(Error::UnknownTemplate {
                        name: def.name.clone(),
                        template: other.unwrap_or_default().to_string(),
                    })
                }
            },
            kind => {
                return Err(Error::UnsupportedTypeKind {
                    name: def.name.clone(),
                    kind,
                })
            }
        }
        Ok(())
    }

    /// Iterate a struct's members, base first.
    ///
    /// The callback may claim a member by consuming its bytes and
    /// returning `true`; unclaimed members are skipped structurally.
    pub fn visit_struct_members<R: Read + Seek>(
        &self,
        index: usize,
        reader: &mut MetaReader<R>,
        on_member: &mut OnMember<'_, R>,
    ) -> Result<()> {
        let def = self.get(index)?;
        if def.kind != TypeKind::Struct {
            return Err(Error::UnsupportedTypeKind {
                name: def.name.clone(),
                kind: def.kind,
            });
        }
        if let Some(base) = def.base {
            self.visit_struct_members(base, reader, on_member)?;
        }
        if let Some(members) = &def.members {
            for member in members {
                if !on_member(member, reader)? {
                    self.skip_value(member.type_index, reader)?;
                }
            }
        }
        Ok(())
    }

    fn skip_struct_fields<R: Read + Seek>(
        &self,
        def: &DataTypeDef,
        reader: &mut MetaReader<R>,
    ) -> Result<()> {
        if let Some(base) = def.base {
            self.skip_value(base, reader)?;
        }
        if let Some(members) = &def.members {
            for member in members {
                self.skip_value(member.type_index, reader)?;
            }
        }
        Ok(())
    }

    fn visit_struct_links<R: Read + Seek>(
        &self,
        def: &DataTypeDef,
        reader: &mut MetaReader<R>,
        on_link: &mut OnResourceLink<'_, R>,
    ) -> Result<()> {
        if let Some(base) = def.base {
            self.visit_resource_links(base, reader, on_link)?;
        }
        if let Some(members) = &def.members {
            for member in members {
                self.visit_resource_links(member.type_index, reader, on_link)?;
            }
        }
        Ok(())
    }

    // Format tags above 26 append a sized pixel blob after the fields.
    fn skip_texture_blob<R: Read + Seek>(
        &self,
        def: &DataTypeDef,
        reader: &mut MetaReader<R>,
    ) -> Result<()> {
        if def.format > 26 {
            reader.skip(2)?;
            let blob = reader.read_i32()?;
            if blob > 0 {
                reader.skip(blob as u64)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::builder::MetaWriter;
    use crate::parser::{block, MetaReader};
    use crate::types::tests::write_type;
    use crate::types::{TypeKind, TypeTable};

    // Table used by most walks below:
    //   0 ULONG         1 CString       2 TexRef(ResourceLink -> 1)
    //   3 CModel        4 CPlain        5 Floats (static array of 0)
    fn fixture_types(writer: &mut MetaWriter) {
        writer.begin_list(block::INTERNAL_TYPES, 6);
        write_type(writer, 0, "ULONG", TypeKind::Simple, 0, -1, 0, "", -1, None);
        write_type(writer, 1, "CString", TypeKind::Simple, 0, -1, 0, "", -1, None);
        write_type(
            writer, 2, "TexRef", TypeKind::UniquePointer, 0, 1, 0, "ResourceLink", -1, None,
        );
        write_type(
            writer, 3, "CModel", TypeKind::Struct, 0, -1, 0, "", -1,
            Some(&[("3", 0), ("9", 2), ("12", 1)]),
        );
        write_type(
            writer, 4, "CPlain", TypeKind::Struct, 0, -1, 0, "", -1,
            Some(&[("1", 0), ("2", 0)]),
        );
        write_type(writer, 5, "Floats", TypeKind::StaticArray, 0, 0, 0, "", -1, None);
    }

    fn parse(writer: MetaWriter) -> (TypeTable, MetaReader<Cursor<Vec<u8>>>) {
        let mut reader = MetaReader::new(Cursor::new(writer.into_bytes())).unwrap();
        let table = TypeTable::parse(&mut reader).unwrap();
        (table, reader)
    }

    #[test]
    fn test_skip_fixed_size_struct() {
        let mut writer = MetaWriter::new(10, false);
        fixture_types(&mut writer);
        writer.write_u32(0x11111111);
        writer.write_u32(0x22222222);
        writer.write_u32(0xDEADBEEF);

        let (table, mut reader) = parse(writer);
        let plain = table.index_of("CPlain").unwrap();
        assert_eq!(table.size_of(plain), Some(8));

        table.skip_value(plain, &mut reader).unwrap();
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_skip_string_member() {
        let mut writer = MetaWriter::new(10, false);
        fixture_types(&mut writer);
        writer.write_string("some text");
        writer.write_u32(0xDEADBEEF);

        let (table, mut reader) = parse(writer);
        let string = table.index_of("CString").unwrap();
        table.skip_value(string, &mut reader).unwrap();
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_skip_static_array_of_counted_elements() {
        let mut writer = MetaWriter::new(10, false);
        fixture_types(&mut writer);
        writer.write_u32(0);
        writer.write_i32(3);
        writer.write_u32(1);
        writer.write_u32(2);
        writer.write_u32(3);
        writer.write_u32(0xDEADBEEF);

        let (table, mut reader) = parse(writer);
        let floats = table.index_of("Floats").unwrap();
        table.skip_value(floats, &mut reader).unwrap();
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_visit_yields_each_link() {
        let mut writer = MetaWriter::new(10, false);
        fixture_types(&mut writer);
        // CModel { ULONG, TexRef, CString }
        writer.write_u32(7);
        writer.write_string("Content/Wall.tex");
        writer.write_string("not a link");
        writer.write_u32(0xDEADBEEF);

        let (table, mut reader) = parse(writer);
        let model = table.index_of("CModel").unwrap();
        assert!(table.has_resource_link(model));

        let mut links = Vec::new();
        table
            .visit_resource_links(model, &mut reader, &mut |r| {
                links.push(r.read_string()?);
                Ok(())
            })
            .unwrap();

        assert_eq!(links, ["Content/Wall.tex"]);
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_visit_skips_linkless_type_wholesale() {
        let mut writer = MetaWriter::new(10, false);
        fixture_types(&mut writer);
        writer.write_u32(1);
        writer.write_u32(2);
        writer.write_u32(0xDEADBEEF);

        let (table, mut reader) = parse(writer);
        let plain = table.index_of("CPlain").unwrap();

        let mut yields = 0;
        table
            .visit_resource_links(plain, &mut reader, &mut |_| {
                yields += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(yields, 0);
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_member_matching_claims_and_skips() {
        let mut writer = MetaWriter::new(10, false);
        fixture_types(&mut writer);
        // CModel { "3": ULONG, "9": TexRef, "12": CString }
        writer.write_u32(0x1234);
        writer.write_string("Content/Old.tex");
        writer.write_string("tail string");
        writer.write_u32(0xDEADBEEF);

        let (table, mut reader) = parse(writer);
        let model = table.index_of("CModel").unwrap();

        let mut claimed = Vec::new();
        table
            .visit_struct_members(model, &mut reader, &mut |member, r| {
                if member.matches("9") {
                    claimed.push(r.read_string()?);
                    return Ok(true);
                }
                Ok(false)
            })
            .unwrap();

        assert_eq!(claimed, ["Content/Old.tex"]);
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_texture_blob_skip() {
        let mut writer = MetaWriter::new(10, false);
        writer.begin_list(block::INTERNAL_TYPES, 2);
        write_type(&mut writer, 0, "ULONG", TypeKind::Simple, 0, -1, 0, "", -1, None);
        write_type(
            &mut writer, 1, "CBaseTexture", TypeKind::Struct, 30, -1, 0, "", -1,
            Some(&[("1", 0)]),
        );
        // fields, 2 pad bytes, blob length, blob, sentinel
        writer.write_u32(9);
        writer.write_raw(&[0, 0]);
        writer.write_i32(5);
        writer.write_raw(b"PIXEL");
        writer.write_u32(0xDEADBEEF);

        let (table, mut reader) = parse(writer);
        let texture = table.index_of("CBaseTexture").unwrap();
        assert_eq!(table.size_of(texture), None);

        table.skip_value(texture, &mut reader).unwrap();
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_unknown_template_is_an_error() {
        let mut writer = MetaWriter::new(10, false);
        writer.begin_list(block::INTERNAL_TYPES, 2);
        write_type(&mut writer, 0, "ULONG", TypeKind::Simple, 0, -1, 0, "", -1, None);
        write_type(
            &mut writer, 1, "Odd", TypeKind::UniquePointer, 0, 0, 0, "Mystery", -1, None,
        );

        let (table, mut reader) = parse(writer);
        assert!(table.skip_value(1, &mut reader).is_err());
    }

    #[test]
    fn test_unwalkable_kind_is_an_error() {
        let mut writer = MetaWriter::new(10, false);
        writer.begin_list(block::INTERNAL_TYPES, 1);
        write_type(&mut writer, 0, "Fn", TypeKind::Function, 0, -1, 0, "", -1, None);

        let (table, mut reader) = parse(writer);
        assert!(table.skip_value(0, &mut reader).is_err());
    }
}
