//! Self-describing data types read from a meta payload.
//!
//! A meta file declares its own type system in the internal-types block:
//! every object that follows is walked by interpreting these declarations.
//! After parsing, each type gets a static size where one exists (propagated
//! to a fixpoint, since structs may reference later indices) and a memoized
//! flag telling whether any reachable constituent is a `ResourceLink`
//! unique pointer.

use std::io::{Read, Seek};

use rustc_hash::FxHashMap;

use crate::parser::{block, MetaReader};
use crate::{Error, Result};

/// Kind tag of a data type declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Simple,
    ValueField,
    Pointer,
    Reference,
    Array,
    Struct,
    StaticArray,
    StaticStackArray,
    DynamicContainer,
    Function,
    Void,
    SmartPointer,
    Handle,
    Typedef,
    UniquePointer,
    ScriptState,
    ScriptLatent,
    Unknown,
}

impl TypeKind {
    /// Decode a kind tag; out-of-range tags become [`Unknown`](Self::Unknown).
    pub fn from_tag(tag: i32) -> Self {
        match tag {
            0 => Self::Simple,
            1 => Self::ValueField,
            2 => Self::Pointer,
            3 => Self::Reference,
            4 => Self::Array,
            5 => Self::Struct,
            6 => Self::StaticArray,
            7 => Self::StaticStackArray,
            8 => Self::DynamicContainer,
            9 => Self::Function,
            10 => Self::Void,
            11 => Self::SmartPointer,
            12 => Self::Handle,
            13 => Self::Typedef,
            14 => Self::UniquePointer,
            15 => Self::ScriptState,
            16 => Self::ScriptLatent,
            _ => Self::Unknown,
        }
    }

    /// Kinds that carry a referent type index in their declaration.
    pub fn has_referent(self) -> bool {
        matches!(
            self,
            Self::Pointer
                | Self::Reference
                | Self::Array
                | Self::StaticArray
                | Self::StaticStackArray
                | Self::DynamicContainer
                | Self::SmartPointer
                | Self::Handle
                | Self::Typedef
                | Self::UniquePointer
        )
    }
}

/// One field of a struct declaration.
///
/// Older meta versions identify fields by a human-readable name, newer ones
/// by a decimal id string; exactly one of the two is populated.
#[derive(Clone, Debug)]
pub struct StructMember {
    pub name: Option<String>,
    pub id: Option<String>,
    pub type_index: usize,
}

impl StructMember {
    /// Whether this member's id or name equals `key`.
    pub fn matches(&self, key: &str) -> bool {
        self.id.as_deref() == Some(key) || self.name.as_deref() == Some(key)
    }

    /// The identifier, whichever form the file used.
    pub fn label(&self) -> &str {
        self.id.as_deref().or(self.name.as_deref()).unwrap_or("")
    }
}

/// Resource-link reachability memo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LinkState {
    Unknown,
    Visiting,
    No,
    Yes,
}

/// One entry of the internal-types table.
#[derive(Clone, Debug)]
pub struct DataTypeDef {
    pub index: usize,
    pub name: String,
    pub kind: TypeKind,
    pub format: i32,
    pub referent: Option<usize>,
    pub array_size: Option<i32>,
    pub template: Option<String>,
    pub base: Option<usize>,
    pub members: Option<Vec<StructMember>>,
    pub(crate) size: Option<u32>,
    link: LinkState,
}

/// The internal-types table of one meta payload.
pub struct TypeTable {
    types: Vec<DataTypeDef>,
    by_name: FxHashMap<String, usize>,
}

impl TypeTable {
    /// Parse the `INTY` list and prepare every type for walking.
    pub fn parse<R: Read + Seek>(reader: &mut MetaReader<R>) -> Result<Self> {
        let count = reader.begin_list(block::INTERNAL_TYPES)? as usize;
        let mut types = Vec::with_capacity(count);

        for expected in 0..count {
            reader.expect_block(block::DATA_TYPE)?;
            let index = reader.read_i32()?;
            if index as usize != expected {
                return Err(Error::MalformedHeader("non-dense type index"));
            }

            let name = reader.read_string()?;
            let kind = TypeKind::from_tag(reader.read_i32()?);
            let format = reader.read_i32()?;

            let mut def = DataTypeDef {
                index: expected,
                name,
                kind,
                format,
                referent: None,
                array_size: None,
                template: None,
                base: None,
                members: None,
                size: None,
                link: LinkState::Unknown,
            };

            if kind.has_referent() {
                def.referent = Some(reader.read_i32()? as usize);
            }
            if kind == TypeKind::Array {
                def.array_size = Some(reader.read_i32()?);
            }
            if kind == TypeKind::UniquePointer {
                def.template = Some(reader.read_string()?);
            }
            if kind == TypeKind::Struct {
                let base = reader.read_i32()?;
                def.base = (base >= 0).then_some(base as usize);

                let member_count = reader.begin_list(block::STRUCT_MEMBERS)?;
                let mut members = Vec::with_capacity(member_count as usize);
                for _ in 0..member_count {
                    let ident = reader.read_string()?;
                    let type_index = reader.read_i32()? as usize;
                    let member = if reader.version() > 7 {
                        StructMember {
                            name: None,
                            id: Some(ident),
                            type_index,
                        }
                    } else {
                        StructMember {
                            name: Some(ident),
                            id: None,
                            type_index,
                        }
                    };
                    members.push(member);
                }
                def.members = Some(members);
            }

            types.push(def);
        }

        let by_name = types
            .iter()
            .map(|def| (def.name.clone(), def.index))
            .collect();

        let mut table = Self { types, by_name };
        table.check_indices()?;
        table.propagate_sizes();
        table.resolve_links();
        Ok(table)
    }

    /// Number of declared types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the table declares no types.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Look a type up by index.
    pub fn get(&self, index: usize) -> Result<&DataTypeDef> {
        self.types
            .get(index)
            .ok_or(Error::TypeIndexOutOfRange(index))
    }

    /// Look a type up by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Static size of a type, when one exists.
    pub fn size_of(&self, index: usize) -> Option<u32> {
        self.types.get(index).and_then(|def| def.size)
    }

    /// Whether a type can reach a resource link.
    pub fn has_resource_link(&self, index: usize) -> bool {
        self.types
            .get(index)
            .is_some_and(|def| def.link == LinkState::Yes)
    }

    /// Whether any declared type can reach a resource link.
    pub fn any_resource_link(&self) -> bool {
        self.types.iter().any(|def| def.link == LinkState::Yes)
    }

    pub(crate) fn referent_of(&self, def: &DataTypeDef) -> Result<usize> {
        def.referent
            .ok_or(Error::MalformedHeader("missing referent type"))
    }

    fn check_indices(&self) -> Result<()> {
        let len = self.types.len();
        for def in &self.types {
            if let Some(referent) = def.referent {
                if referent >= len {
                    return Err(Error::TypeIndexOutOfRange(referent));
                }
            }
            if let Some(base) = def.base {
                if base >= len {
                    return Err(Error::TypeIndexOutOfRange(base));
                }
            }
            if let Some(members) = &def.members {
                for member in members {
                    if member.type_index >= len {
                        return Err(Error::TypeIndexOutOfRange(member.type_index));
                    }
                }
            }
        }
        Ok(())
    }

    // Sizes may depend on types at later indices, so run passes until
    // nothing new resolves. Each type's size is written at most once.
    fn propagate_sizes(&mut self) {
        loop {
            let mut changed = false;
            for index in 0..self.types.len() {
                if self.types[index].size.is_none() {
                    if let Some(size) = self.compute_size(index) {
                        self.types[index].size = Some(size);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn compute_size(&self, index: usize) -> Option<u32> {
        let def = &self.types[index];
        // CBaseTexture drags a pixel blob behind its fields; it must never
        // be skipped by static size, nor any struct embedding it.
        if def.name == "CBaseTexture" {
            return None;
        }
        match def.kind {
            TypeKind::Simple | TypeKind::Unknown => primitive_size(&def.name),
            TypeKind::Pointer
            | TypeKind::Reference
            | TypeKind::SmartPointer
            | TypeKind::Handle => Some(4),
            TypeKind::Array => {
                let element = self.types[def.referent?].size?;
                Some(def.array_size? as u32 * element)
            }
            TypeKind::Struct => {
                let mut total = 0u32;
                if let Some(base) = def.base {
                    total += self.types[base].size?;
                }
                for member in def.members.as_ref()? {
                    total += self.types[member.type_index].size?;
                }
                Some(total)
            }
            TypeKind::Typedef => self.types[def.referent?].size,
            TypeKind::UniquePointer => match def.template.as_deref() {
                Some("UniquePtr") => Some(4),
                Some("Synced") => self.types[def.referent?].size,
                _ => None,
            },
            TypeKind::Void => Some(0),
            _ => None,
        }
    }

    fn resolve_links(&mut self) {
        for index in 0..self.types.len() {
            self.resolve_link(index);
        }
    }

    fn resolve_link(&mut self, index: usize) -> bool {
        match self.types[index].link {
            LinkState::Yes => true,
            LinkState::No | LinkState::Visiting => false,
            LinkState::Unknown => {
                self.types[index].link = LinkState::Visiting;
                let reachable = self.compute_link(index);
                self.types[index].link = if reachable {
                    LinkState::Yes
                } else {
                    LinkState::No
                };
                reachable
            }
        }
    }

    fn compute_link(&mut self, index: usize) -> bool {
        let def = self.types[index].clone();
        match def.kind {
            TypeKind::UniquePointer => match def.template.as_deref() {
                Some("ResourceLink") => true,
                Some("Synced") | Some("CStaticArray2D") => def
                    .referent
                    .is_some_and(|referent| self.resolve_link(referent)),
                _ => false,
            },
            TypeKind::Array
            | TypeKind::StaticArray
            | TypeKind::StaticStackArray
            | TypeKind::Typedef => def
                .referent
                .is_some_and(|referent| self.resolve_link(referent)),
            TypeKind::Struct => {
                let mut reachable = def.base.is_some_and(|base| self.resolve_link(base));
                if let Some(members) = &def.members {
                    for member in members {
                        if self.resolve_link(member.type_index) {
                            reachable = true;
                        }
                    }
                }
                reachable
            }
            _ => false,
        }
    }
}

fn primitive_size(name: &str) -> Option<u32> {
    match name {
        "SBYTE" | "UBYTE" => Some(1),
        "SWORD" | "UWORD" => Some(2),
        "SLONG" | "ULONG" | "FLOAT" | "IDENT" => Some(4),
        "SQUAD" | "DOUBLE" => Some(8),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::builder::MetaWriter;

    // Writes one DTTY entry; struct members are (ident, type_index) pairs.
    pub(crate) fn write_type(
        writer: &mut MetaWriter,
        index: i32,
        name: &str,
        kind: TypeKind,
        format: i32,
        referent: i32,
        array_size: i32,
        template: &str,
        base: i32,
        members: Option<&[(&str, i32)]>,
    ) {
        writer.begin_block(block::DATA_TYPE);
        writer.write_i32(index);
        writer.write_string(name);
        writer.write_i32(kind_tag(kind));
        writer.write_i32(format);
        if kind.has_referent() {
            writer.write_i32(referent);
        }
        if kind == TypeKind::Array {
            writer.write_i32(array_size);
        }
        if kind == TypeKind::UniquePointer {
            writer.write_string(template);
        }
        if kind == TypeKind::Struct {
            writer.write_i32(base);
            let members = members.unwrap_or(&[]);
            writer.begin_list(block::STRUCT_MEMBERS, members.len() as i32);
            for (ident, type_index) in members {
                writer.write_string(ident);
                writer.write_i32(*type_index);
            }
        }
    }

    pub(crate) fn kind_tag(kind: TypeKind) -> i32 {
        match kind {
            TypeKind::Simple => 0,
            TypeKind::ValueField => 1,
            TypeKind::Pointer => 2,
            TypeKind::Reference => 3,
            TypeKind::Array => 4,
            TypeKind::Struct => 5,
            TypeKind::StaticArray => 6,
            TypeKind::StaticStackArray => 7,
            TypeKind::DynamicContainer => 8,
            TypeKind::Function => 9,
            TypeKind::Void => 10,
            TypeKind::SmartPointer => 11,
            TypeKind::Handle => 12,
            TypeKind::Typedef => 13,
            TypeKind::UniquePointer => 14,
            TypeKind::ScriptState => 15,
            TypeKind::ScriptLatent => 16,
            TypeKind::Unknown => 17,
        }
    }

    fn parse_table(writer: MetaWriter) -> TypeTable {
        let mut reader = MetaReader::new(Cursor::new(writer.into_bytes())).unwrap();
        TypeTable::parse(&mut reader).unwrap()
    }

    #[test]
    fn test_primitive_sizes() {
        let mut writer = MetaWriter::new(10, false);
        writer.begin_list(block::INTERNAL_TYPES, 4);
        write_type(&mut writer, 0, "UBYTE", TypeKind::Simple, 0, -1, 0, "", -1, None);
        write_type(&mut writer, 1, "ULONG", TypeKind::Simple, 0, -1, 0, "", -1, None);
        write_type(&mut writer, 2, "DOUBLE", TypeKind::Simple, 0, -1, 0, "", -1, None);
        write_type(&mut writer, 3, "CString", TypeKind::Simple, 0, -1, 0, "", -1, None);

        let table = parse_table(writer);
        assert_eq!(table.size_of(0), Some(1));
        assert_eq!(table.size_of(1), Some(4));
        assert_eq!(table.size_of(2), Some(8));
        assert_eq!(table.size_of(3), None);
    }

    #[test]
    fn test_struct_size_sums_base_and_members() {
        let mut writer = MetaWriter::new(10, false);
        writer.begin_list(block::INTERNAL_TYPES, 4);
        write_type(&mut writer, 0, "ULONG", TypeKind::Simple, 0, -1, 0, "", -1, None);
        write_type(&mut writer, 1, "UWORD", TypeKind::Simple, 0, -1, 0, "", -1, None);
        write_type(
            &mut writer, 2, "CBase", TypeKind::Struct, 0, -1, 0, "", -1,
            Some(&[("1", 0)]),
        );
        write_type(
            &mut writer, 3, "CDerived", TypeKind::Struct, 0, -1, 0, "", 2,
            Some(&[("2", 0), ("3", 1)]),
        );

        let table = parse_table(writer);
        assert_eq!(table.size_of(2), Some(4));
        assert_eq!(table.size_of(3), Some(10));
    }

    #[test]
    fn test_size_propagation_handles_forward_references() {
        // The struct at index 0 refers to a member type declared after it.
        let mut writer = MetaWriter::new(10, false);
        writer.begin_list(block::INTERNAL_TYPES, 2);
        write_type(
            &mut writer, 0, "CHolder", TypeKind::Struct, 0, -1, 0, "", -1,
            Some(&[("1", 1)]),
        );
        write_type(&mut writer, 1, "SLONG", TypeKind::Simple, 0, -1, 0, "", -1, None);

        let table = parse_table(writer);
        assert_eq!(table.size_of(0), Some(4));
    }

    #[test]
    fn test_array_and_pointer_sizes() {
        let mut writer = MetaWriter::new(10, false);
        writer.begin_list(block::INTERNAL_TYPES, 4);
        write_type(&mut writer, 0, "FLOAT", TypeKind::Simple, 0, -1, 0, "", -1, None);
        write_type(&mut writer, 1, "FLOAT3", TypeKind::Array, 0, 0, 3, "", -1, None);
        write_type(&mut writer, 2, "CEntity*", TypeKind::Pointer, 0, 0, 0, "", -1, None);
        write_type(&mut writer, 3, "Sync", TypeKind::UniquePointer, 0, 0, 0, "Synced", -1, None);

        let table = parse_table(writer);
        assert_eq!(table.size_of(1), Some(12));
        assert_eq!(table.size_of(2), Some(4));
        assert_eq!(table.size_of(3), Some(4));
    }

    #[test]
    fn test_resource_link_reachability() {
        let mut writer = MetaWriter::new(10, false);
        writer.begin_list(block::INTERNAL_TYPES, 5);
        write_type(&mut writer, 0, "CString", TypeKind::Simple, 0, -1, 0, "", -1, None);
        write_type(
            &mut writer, 1, "TexRef", TypeKind::UniquePointer, 0, 0, 0, "ResourceLink", -1, None,
        );
        write_type(
            &mut writer, 2, "CModel", TypeKind::Struct, 0, -1, 0, "", -1,
            Some(&[("9", 1)]),
        );
        write_type(&mut writer, 3, "ULONG", TypeKind::Simple, 0, -1, 0, "", -1, None);
        write_type(
            &mut writer, 4, "CPlain", TypeKind::Struct, 0, -1, 0, "", -1,
            Some(&[("1", 3)]),
        );

        let table = parse_table(writer);
        assert!(table.has_resource_link(1));
        assert!(table.has_resource_link(2));
        assert!(!table.has_resource_link(0));
        assert!(!table.has_resource_link(4));
        assert!(table.any_resource_link());
    }

    #[test]
    fn test_member_ident_version_gate() {
        let mut old = MetaWriter::new(6, false);
        old.begin_list(block::INTERNAL_TYPES, 2);
        write_type(&mut old, 0, "ULONG", TypeKind::Simple, 0, -1, 0, "", -1, None);
        write_type(
            &mut old, 1, "CThing", TypeKind::Struct, 0, -1, 0, "", -1,
            Some(&[("rf_ulFlags", 0)]),
        );
        let table = parse_table(old);
        let member = &table.get(1).unwrap().members.as_ref().unwrap()[0];
        assert_eq!(member.name.as_deref(), Some("rf_ulFlags"));
        assert!(member.id.is_none());
        assert!(member.matches("rf_ulFlags"));

        let mut new = MetaWriter::new(10, false);
        new.begin_list(block::INTERNAL_TYPES, 2);
        write_type(&mut new, 0, "ULONG", TypeKind::Simple, 0, -1, 0, "", -1, None);
        write_type(
            &mut new, 1, "CThing", TypeKind::Struct, 0, -1, 0, "", -1,
            Some(&[("7", 0)]),
        );
        let table = parse_table(new);
        let member = &table.get(1).unwrap().members.as_ref().unwrap()[0];
        assert_eq!(member.id.as_deref(), Some("7"));
        assert!(member.name.is_none());
    }

    #[test]
    fn test_non_dense_index_rejected() {
        let mut writer = MetaWriter::new(10, false);
        writer.begin_list(block::INTERNAL_TYPES, 1);
        write_type(&mut writer, 5, "ULONG", TypeKind::Simple, 0, -1, 0, "", -1, None);

        let mut reader = MetaReader::new(Cursor::new(writer.into_bytes())).unwrap();
        assert!(TypeTable::parse(&mut reader).is_err());
    }

    #[test]
    fn test_referent_out_of_range_rejected() {
        let mut writer = MetaWriter::new(10, false);
        writer.begin_list(block::INTERNAL_TYPES, 1);
        write_type(&mut writer, 0, "P", TypeKind::Typedef, 0, 9, 0, "", -1, None);

        let mut reader = MetaReader::new(Cursor::new(writer.into_bytes())).unwrap();
        assert!(matches!(
            TypeTable::parse(&mut reader),
            Err(Error::TypeIndexOutOfRange(9))
        ));
    }

    #[test]
    fn test_unknown_kind_tag() {
        assert_eq!(TypeKind::from_tag(42), TypeKind::Unknown);
        assert_eq!(TypeKind::from_tag(14), TypeKind::UniquePointer);
    }
}
