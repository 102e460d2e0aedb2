/* Per-file symbol tables and the offset index */

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::dex::annotations::AnnotationsDirectoryItem;
use crate::dex::code::CodeItem;
use crate::dex::error::DexError;
use crate::dex::items::{
    ClassDataItem, ClassDefItem, EncodedArrayItem, FieldIdItem, MethodIdItem, ProtoIdItem, StringDataItem,
    StringIdItem, TypeIdItem, TypeList, NO_INDEX,
};
use crate::dex::map::{Item, ItemType, MapList, Section};

/// A resolved prototype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtoRef
{
    pub shorty: String,
    pub return_type: String,
    pub parameters: Vec<String>,
    /// `(params)ret` as it appears in a method reference.
    pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRef
{
    pub class: String,
    pub name: String,
    pub type_desc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodRef
{
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

/// Owns every decoded section of one file, indexes records by file offset and
/// resolves names on demand.
///
/// Name tables are built on first request and never change afterwards.
#[derive(Debug)]
pub struct ClassManager
{
    map: MapList,
    by_offset: HashMap<u32, (usize, usize)>,
    api_level: u32,
    strings: OnceCell<Vec<String>>,
    types: OnceCell<Vec<String>>,
    protos: OnceCell<Vec<ProtoRef>>,
    fields: OnceCell<Vec<FieldRef>>,
    methods: OnceCell<Vec<MethodRef>>,
    classes: OnceCell<Vec<String>>,
    populations: AtomicUsize,
}

macro_rules! section_slice {
    ($name:ident, $item_type:ident, $variant:ident, $record:ty) => {
        pub fn $name(&self) -> &[$record]
        {
            match self.section(ItemType::$item_type)
            {
                Some(Section::$variant(v)) => v,
                _ => &[],
            }
        }
    };
}

fn unresolved(table: &str, idx: u32, len: usize) -> DexError
{
    err!(UnresolvedReference, "{} index {} out of range ({} entries)", table, idx, len)
}

impl ClassManager
{
    /// Registers every record of `map` by offset, then checks the structural
    /// cross references between sections.
    pub fn new(map: MapList, api_level: u32) -> Result<ClassManager, DexError>
    {
        let mut cm = ClassManager {
            map,
            by_offset: HashMap::new(),
            api_level,
            strings: OnceCell::new(),
            types: OnceCell::new(),
            protos: OnceCell::new(),
            fields: OnceCell::new(),
            methods: OnceCell::new(),
            classes: OnceCell::new(),
            populations: AtomicUsize::new(0),
        };
        let mut registrations = vec![];
        for (mi, item) in cm.map.items.iter().enumerate()
        {
            for (ii, off) in item.offsets.iter().enumerate()
            {
                registrations.push((mi, ii, *off));
            }
        }
        for (mi, ii, off) in registrations
        {
            cm.add_type_item(mi, ii, off);
        }
        cm.validate()?;
        debug!("class manager: {} records indexed", cm.by_offset.len());
        Ok(cm)
    }

    /// Indexes record `item_index` of map entry `map_index` at file offset `offset`.
    pub fn add_type_item(&mut self, map_index: usize, item_index: usize, offset: u32)
    {
        self.by_offset.insert(offset, (map_index, item_index));
    }

    pub fn get_item_by_offset(&self, offset: u32) -> Result<Item<'_>, DexError>
    {
        let (mi, ii) = match self.by_offset.get(&offset)
        {
            Some(loc) => *loc,
            None => fail!(UnknownOffset, "no record at offset 0x{:x}", offset),
        };
        self.map
            .items
            .get(mi)
            .and_then(|m| m.section.item(ii))
            .ok_or_else(|| err!(UnknownOffset, "stale index entry for offset 0x{:x}", offset))
    }

    pub fn api_level(&self) -> u32
    {
        self.api_level
    }

    pub fn map_list(&self) -> &MapList
    {
        &self.map
    }

    /// Number of name tables built so far.
    pub fn population_count(&self) -> usize
    {
        self.populations.load(Ordering::SeqCst)
    }

    fn section(&self, item_type: ItemType) -> Option<&Section>
    {
        self.map.find(item_type).map(|m| &m.section)
    }

    section_slice!(string_ids, StringId, StringIds, StringIdItem);
    section_slice!(type_ids, TypeId, TypeIds, TypeIdItem);
    section_slice!(proto_ids, ProtoId, ProtoIds, ProtoIdItem);
    section_slice!(field_ids, FieldId, FieldIds, FieldIdItem);
    section_slice!(method_ids, MethodId, MethodIds, MethodIdItem);
    section_slice!(class_defs, ClassDef, ClassDefs, ClassDefItem);

    pub fn get_code_item(&self, offset: u32) -> Result<&CodeItem, DexError>
    {
        match self.get_item_by_offset(offset)?
        {
            Item::Code(c) => Ok(c),
            other => fail!(UnknownOffset, "0x{:x} holds a {}, not a code_item", offset, other.item_type().name()),
        }
    }

    pub fn get_class_data(&self, offset: u32) -> Result<&ClassDataItem, DexError>
    {
        match self.get_item_by_offset(offset)?
        {
            Item::ClassData(c) => Ok(c),
            other => fail!(UnknownOffset, "0x{:x} holds a {}, not a class_data_item", offset, other.item_type().name()),
        }
    }

    pub fn get_type_list(&self, offset: u32) -> Result<&TypeList, DexError>
    {
        match self.get_item_by_offset(offset)?
        {
            Item::TypeList(t) => Ok(t),
            other => fail!(UnknownOffset, "0x{:x} holds a {}, not a type_list", offset, other.item_type().name()),
        }
    }

    pub fn get_raw_string(&self, idx: u32) -> Result<&StringDataItem, DexError>
    {
        let ids = self.string_ids();
        let id = ids.get(idx as usize).ok_or_else(|| unresolved("string", idx, ids.len()))?;
        match self.get_item_by_offset(id.string_data_off)?
        {
            Item::StringData(s) => Ok(s),
            other => fail!(
                UnresolvedReference,
                "string {} points at a {} (0x{:x})",
                idx,
                other.item_type().name(),
                id.string_data_off
            ),
        }
    }

    fn populated<'a, T>(
        &'a self,
        cell: &'a OnceCell<Vec<T>>,
        name: &str,
        build: impl FnOnce() -> Result<Vec<T>, DexError>,
    ) -> Result<&'a Vec<T>, DexError>
    {
        cell.get_or_try_init(|| {
            let table = build()?;
            self.populations.fetch_add(1, Ordering::SeqCst);
            debug!("populated {} table ({} entries)", name, table.len());
            Ok(table)
        })
    }

    fn strings(&self) -> Result<&Vec<String>, DexError>
    {
        self.populated(&self.strings, "string", || {
            (0..self.string_ids().len() as u32)
                .map(|i| self.get_raw_string(i).map(|s| s.data.to_string_lossy()))
                .collect()
        })
    }

    fn types(&self) -> Result<&Vec<String>, DexError>
    {
        self.populated(&self.types, "type", || {
            self.type_ids().iter().map(|t| self.get_string(t.descriptor_idx).map(str::to_string)).collect()
        })
    }

    fn protos(&self) -> Result<&Vec<ProtoRef>, DexError>
    {
        self.populated(&self.protos, "proto", || {
            self.proto_ids()
                .iter()
                .map(|p| {
                    let parameters = if p.parameters_off == 0
                    {
                        vec![]
                    }
                    else
                    {
                        self.get_type_list(p.parameters_off)?
                            .0
                            .iter()
                            .map(|t| self.get_type(*t as u32).map(str::to_string))
                            .collect::<Result<Vec<_>, _>>()?
                    };
                    let return_type = self.get_type(p.return_type_idx)?.to_string();
                    Ok(ProtoRef {
                        shorty: self.get_string(p.shorty_idx)?.to_string(),
                        descriptor: format!("({}){}", parameters.concat(), return_type),
                        return_type,
                        parameters,
                    })
                })
                .collect()
        })
    }

    fn fields(&self) -> Result<&Vec<FieldRef>, DexError>
    {
        self.populated(&self.fields, "field", || {
            self.field_ids()
                .iter()
                .map(|f| {
                    Ok(FieldRef {
                        class: self.get_type(f.class_idx as u32)?.to_string(),
                        name: self.get_string(f.name_idx)?.to_string(),
                        type_desc: self.get_type(f.type_idx as u32)?.to_string(),
                    })
                })
                .collect()
        })
    }

    fn methods(&self) -> Result<&Vec<MethodRef>, DexError>
    {
        self.populated(&self.methods, "method", || {
            self.method_ids()
                .iter()
                .map(|m| {
                    Ok(MethodRef {
                        class: self.get_type(m.class_idx as u32)?.to_string(),
                        name: self.get_string(m.name_idx)?.to_string(),
                        descriptor: self.get_proto(m.proto_idx as u32)?.descriptor.clone(),
                    })
                })
                .collect()
        })
    }

    fn classes(&self) -> Result<&Vec<String>, DexError>
    {
        self.populated(&self.classes, "class", || {
            self.class_defs().iter().map(|c| self.get_type(c.class_idx).map(str::to_string)).collect()
        })
    }

    pub fn get_string(&self, idx: u32) -> Result<&str, DexError>
    {
        let strings = self.strings()?;
        strings.get(idx as usize).map(String::as_str).ok_or_else(|| unresolved("string", idx, strings.len()))
    }

    pub fn get_type(&self, idx: u32) -> Result<&str, DexError>
    {
        let types = self.types()?;
        types.get(idx as usize).map(String::as_str).ok_or_else(|| unresolved("type", idx, types.len()))
    }

    pub fn get_proto(&self, idx: u32) -> Result<&ProtoRef, DexError>
    {
        let protos = self.protos()?;
        protos.get(idx as usize).ok_or_else(|| unresolved("proto", idx, protos.len()))
    }

    pub fn get_field(&self, idx: u32) -> Result<&FieldRef, DexError>
    {
        let fields = self.fields()?;
        fields.get(idx as usize).ok_or_else(|| unresolved("field", idx, fields.len()))
    }

    pub fn get_method_ref(&self, idx: u32) -> Result<&MethodRef, DexError>
    {
        let methods = self.methods()?;
        methods.get(idx as usize).ok_or_else(|| unresolved("method", idx, methods.len()))
    }

    /// Descriptor of the class defined by class_def `idx`.
    pub fn get_class_name(&self, idx: u32) -> Result<&str, DexError>
    {
        let classes = self.classes()?;
        classes.get(idx as usize).map(String::as_str).ok_or_else(|| unresolved("class_def", idx, classes.len()))
    }

    // Offset references must land on a record of the expected type; 0 means absent.
    fn check_offset(&self, offset: u32, expected: ItemType, what: &str) -> Result<(), DexError>
    {
        if offset == 0
        {
            return Ok(());
        }
        match self.get_item_by_offset(offset)
        {
            Ok(item) if item.item_type() == expected => Ok(()),
            Ok(item) => fail!(
                UnresolvedReference,
                "{} 0x{:x} holds a {}, expected {}",
                what,
                offset,
                item.item_type().name(),
                expected.name()
            ),
            Err(_) => fail!(UnresolvedReference, "{} 0x{:x} points at no {}", what, offset, expected.name()),
        }
    }

    fn check_index(idx: u32, len: usize, what: &str) -> Result<(), DexError>
    {
        if (idx as usize) < len { Ok(()) } else { Err(unresolved(what, idx, len)) }
    }

    fn validate(&self) -> Result<(), DexError>
    {
        let n_strings = self.string_ids().len();
        let n_types = self.type_ids().len();
        let n_protos = self.proto_ids().len();

        for (i, s) in self.string_ids().iter().enumerate()
        {
            if !matches!(self.get_item_by_offset(s.string_data_off), Ok(Item::StringData(_)))
            {
                fail!(UnresolvedReference, "string_id {} points at no string_data_item (0x{:x})", i, s.string_data_off);
            }
        }
        for (i, t) in self.type_ids().iter().enumerate()
        {
            Self::check_index(t.descriptor_idx, n_strings, "string")
                .map_err(|e| DexError::with_context(e, format!("type_id {}", i)))?;
        }
        for (i, p) in self.proto_ids().iter().enumerate()
        {
            let ctx = |e: DexError| DexError::with_context(e, format!("proto_id {}", i));
            Self::check_index(p.shorty_idx, n_strings, "string").map_err(ctx)?;
            Self::check_index(p.return_type_idx, n_types, "type").map_err(ctx)?;
            self.check_offset(p.parameters_off, ItemType::TypeList, "parameters_off").map_err(ctx)?;
        }
        for (i, f) in self.field_ids().iter().enumerate()
        {
            let ctx = |e: DexError| DexError::with_context(e, format!("field_id {}", i));
            Self::check_index(f.class_idx as u32, n_types, "type").map_err(ctx)?;
            Self::check_index(f.type_idx as u32, n_types, "type").map_err(ctx)?;
            Self::check_index(f.name_idx, n_strings, "string").map_err(ctx)?;
        }
        for (i, m) in self.method_ids().iter().enumerate()
        {
            let ctx = |e: DexError| DexError::with_context(e, format!("method_id {}", i));
            Self::check_index(m.class_idx as u32, n_types, "type").map_err(ctx)?;
            Self::check_index(m.proto_idx as u32, n_protos, "proto").map_err(ctx)?;
            Self::check_index(m.name_idx, n_strings, "string").map_err(ctx)?;
        }
        for (i, c) in self.class_defs().iter().enumerate()
        {
            let ctx = |e: DexError| DexError::with_context(e, format!("class_def {}", i));
            Self::check_index(c.class_idx, n_types, "type").map_err(ctx)?;
            if c.superclass_idx != NO_INDEX
            {
                Self::check_index(c.superclass_idx, n_types, "type").map_err(ctx)?;
            }
            if c.source_file_idx != NO_INDEX
            {
                Self::check_index(c.source_file_idx, n_strings, "string").map_err(ctx)?;
            }
            self.check_offset(c.interfaces_off, ItemType::TypeList, "interfaces_off").map_err(ctx)?;
            self.check_offset(c.annotations_off, ItemType::AnnotationsDirectory, "annotations_off").map_err(ctx)?;
            self.check_offset(c.class_data_off, ItemType::ClassData, "class_data_off").map_err(ctx)?;
            self.check_offset(c.static_values_off, ItemType::EncodedArray, "static_values_off").map_err(ctx)?;
        }
        if let Some(Section::ClassData(all)) = self.section(ItemType::ClassData)
        {
            for (i, data) in all.iter().enumerate()
            {
                for m in data.methods()
                {
                    self.check_offset(m.code_off, ItemType::Code, "code_off")
                        .map_err(|e| DexError::with_context(e, format!("method {} of class_data #{}", m.method_idx, i)))?;
                }
            }
        }
        Ok(())
    }

    /// Static values of a class, if any.
    pub fn get_static_values(&self, offset: u32) -> Result<&EncodedArrayItem, DexError>
    {
        match self.get_item_by_offset(offset)?
        {
            Item::EncodedArray(a) => Ok(a),
            other => fail!(UnknownOffset, "0x{:x} holds a {}, not an encoded_array_item", offset, other.item_type().name()),
        }
    }

    pub fn get_annotations_directory(&self, offset: u32) -> Result<&AnnotationsDirectoryItem, DexError>
    {
        match self.get_item_by_offset(offset)?
        {
            Item::AnnotationsDirectory(a) => Ok(a),
            other => fail!(
                UnknownOffset,
                "0x{:x} holds a {}, not an annotations_directory_item",
                offset,
                other.item_type().name()
            ),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::dex::error::DexErrorKind;
    use crate::dex::map::{MapEntry, MapItem};

    fn entry(item_type: ItemType, size: u32, offset: u32) -> MapEntry
    {
        MapEntry { item_type, unused: 0, size, offset }
    }

    // Two strings ("LFoo;", "I") and one type naming the first.
    fn small_map(descriptor_idx: u32) -> MapList
    {
        MapList {
            items: vec![
                MapItem {
                    entry: entry(ItemType::StringId, 2, 0x70),
                    section: Section::StringIds(vec![
                        StringIdItem { string_data_off: 0x100 },
                        StringIdItem { string_data_off: 0x107 },
                    ]),
                    offsets: vec![0x70, 0x74],
                },
                MapItem {
                    entry: entry(ItemType::TypeId, 1, 0x78),
                    section: Section::TypeIds(vec![TypeIdItem { descriptor_idx }]),
                    offsets: vec![0x78],
                },
                MapItem {
                    entry: entry(ItemType::StringData, 2, 0x100),
                    section: Section::StringData(vec![StringDataItem::new("LFoo;"), StringDataItem::new("I")]),
                    offsets: vec![0x100, 0x107],
                },
            ],
        }
    }

    #[test]
    fn resolves_and_counts_populations()
    {
        let cm = ClassManager::new(small_map(0), 33).unwrap();
        assert_eq!(cm.population_count(), 0);
        assert_eq!(cm.get_type(0).unwrap(), "LFoo;");
        // strings and types
        assert_eq!(cm.population_count(), 2);
        assert_eq!(cm.get_string(1).unwrap(), "I");
        assert_eq!(cm.get_type(0).unwrap(), "LFoo;");
        assert_eq!(cm.population_count(), 2);
        assert_eq!(cm.get_raw_string(1).unwrap().utf16_size, 1);
    }

    #[test]
    fn out_of_range_index_is_unresolved()
    {
        let cm = ClassManager::new(small_map(0), 33).unwrap();
        assert_eq!(cm.get_string(2).unwrap_err().kind(), DexErrorKind::UnresolvedReference);
        assert_eq!(cm.get_field(0).unwrap_err().kind(), DexErrorKind::UnresolvedReference);
        assert_eq!(cm.get_method_ref(7).unwrap_err().kind(), DexErrorKind::UnresolvedReference);
    }

    #[test]
    fn items_by_offset()
    {
        let cm = ClassManager::new(small_map(0), 33).unwrap();
        assert_eq!(cm.get_item_by_offset(0x74).unwrap(), Item::StringId(&StringIdItem { string_data_off: 0x107 }));
        assert_eq!(cm.get_item_by_offset(0x75).unwrap_err().kind(), DexErrorKind::UnknownOffset);
        assert_eq!(cm.get_code_item(0x100).unwrap_err().kind(), DexErrorKind::UnknownOffset);
    }

    #[test]
    fn dangling_references_fail_at_load()
    {
        let e = ClassManager::new(small_map(5), 33).unwrap_err();
        assert_eq!(e.kind(), DexErrorKind::UnresolvedReference);
        assert!(e.to_string().contains("type_id 0"));

        let mut map = small_map(0);
        map.items[0].section = Section::StringIds(vec![StringIdItem { string_data_off: 0x200 }]);
        let e = ClassManager::new(map, 33).unwrap_err();
        assert_eq!(e.kind(), DexErrorKind::UnresolvedReference);
    }
}
