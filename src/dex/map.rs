//! The map list and the decoded sections it describes.

use log::debug;
use num_traits::FromPrimitive;
use serde::Serialize;

use crate::dex::annotations::{AnnotationItem, AnnotationSetItem, AnnotationSetRefList, AnnotationsDirectoryItem};
use crate::dex::code::{CodeItem, DebugInfoItem};
use crate::dex::cursor::ByteCursor;
use crate::dex::dex_file::Header;
use crate::dex::error::DexError;
use crate::dex::items::{
    ClassDataItem, ClassDefItem, EncodedArrayItem, FieldIdItem, MethodIdItem, ProtoIdItem, StringDataItem,
    StringIdItem, TypeIdItem, TypeList,
};
use crate::dex::{write_align, write_u2, write_u4};

/// The closed set of map item types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u16)]
pub enum ItemType {
    Header = 0x0000,
    StringId = 0x0001,
    TypeId = 0x0002,
    ProtoId = 0x0003,
    FieldId = 0x0004,
    MethodId = 0x0005,
    ClassDef = 0x0006,
    MapList = 0x1000,
    TypeList = 0x1001,
    AnnotationSetRefList = 0x1002,
    AnnotationSet = 0x1003,
    ClassData = 0x2000,
    Code = 0x2001,
    StringData = 0x2002,
    DebugInfo = 0x2003,
    Annotation = 0x2004,
    EncodedArray = 0x2005,
    AnnotationsDirectory = 0x2006,
}

impl ItemType {
    /// Every item type, in map order.
    pub const ALL: [ItemType; 18] = [
        ItemType::Header,
        ItemType::StringId,
        ItemType::TypeId,
        ItemType::ProtoId,
        ItemType::FieldId,
        ItemType::MethodId,
        ItemType::ClassDef,
        ItemType::MapList,
        ItemType::TypeList,
        ItemType::AnnotationSetRefList,
        ItemType::AnnotationSet,
        ItemType::ClassData,
        ItemType::Code,
        ItemType::StringData,
        ItemType::DebugInfo,
        ItemType::Annotation,
        ItemType::EncodedArray,
        ItemType::AnnotationsDirectory,
    ];
}

impl FromPrimitive for ItemType {
    fn from_i64(n: i64) -> Option<Self> {
        if n < 0 { None } else { Self::from_u64(n as u64) }
    }

    fn from_u64(n: u64) -> Option<Self> {
        ItemType::ALL.iter().copied().find(|t| *t as u64 == n)
    }
}

impl ItemType {
    pub fn name(&self) -> &'static str {
        match self {
            ItemType::Header => "header_item",
            ItemType::StringId => "string_id_item",
            ItemType::TypeId => "type_id_item",
            ItemType::ProtoId => "proto_id_item",
            ItemType::FieldId => "field_id_item",
            ItemType::MethodId => "method_id_item",
            ItemType::ClassDef => "class_def_item",
            ItemType::MapList => "map_list",
            ItemType::TypeList => "type_list",
            ItemType::AnnotationSetRefList => "annotation_set_ref_list",
            ItemType::AnnotationSet => "annotation_set_item",
            ItemType::ClassData => "class_data_item",
            ItemType::Code => "code_item",
            ItemType::StringData => "string_data_item",
            ItemType::DebugInfo => "debug_info_item",
            ItemType::Annotation => "annotation_item",
            ItemType::EncodedArray => "encoded_array_item",
            ItemType::AnnotationsDirectory => "annotations_directory_item",
        }
    }

    /// Records of these types start on a 4-byte boundary.
    pub fn is_aligned(&self) -> bool {
        matches!(
            self,
            ItemType::TypeList
                | ItemType::AnnotationSetRefList
                | ItemType::AnnotationSet
                | ItemType::Code
                | ItemType::AnnotationsDirectory
        )
    }
}

/// One `map_item` as stored in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MapEntry {
    pub item_type: ItemType,
    pub unused: u16,
    pub size: u32,
    pub offset: u32,
}

impl MapEntry {
    pub fn read(cur: &mut ByteCursor) -> Result<MapEntry, DexError> {
        let tag = cur.read_u16()?;
        let item_type = match ItemType::from_u16(tag) {
            Some(t) => t,
            None => fail!(UnknownTypeTag, "unknown map item type 0x{:04x} at 0x{:x}", tag, cur.position() - 2),
        };
        Ok(MapEntry {
            item_type,
            unused: cur.read_u16()?,
            size: cur.read_u32()?,
            offset: cur.read_u32()?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_u2(bytes, self.item_type as u16);
        c += write_u2(bytes, self.unused);
        c += write_u4(bytes, self.size);
        c += write_u4(bytes, self.offset);
        c
    }
}

/// Reads a complete `map_list`: a count followed by that many entries.
pub fn read_map_entries(cur: &mut ByteCursor) -> Result<Vec<MapEntry>, DexError> {
    let size = cur.read_u32()? as usize;
    let mut entries = Vec::with_capacity(size.min(cur.remaining_len() / 12));
    for _ in 0..size {
        entries.push(MapEntry::read(cur)?);
    }
    Ok(entries)
}

pub fn write_map_entries(entries: &[MapEntry], bytes: &mut Vec<u8>) -> usize {
    let mut c = write_u4(bytes, entries.len() as u32);
    for e in entries {
        c += e.write(bytes);
    }
    c
}

/// The decoded records of one map entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Header(Vec<Header>),
    StringIds(Vec<StringIdItem>),
    TypeIds(Vec<TypeIdItem>),
    ProtoIds(Vec<ProtoIdItem>),
    FieldIds(Vec<FieldIdItem>),
    MethodIds(Vec<MethodIdItem>),
    ClassDefs(Vec<ClassDefItem>),
    MapList(Vec<Vec<MapEntry>>),
    TypeLists(Vec<TypeList>),
    AnnotationSetRefLists(Vec<AnnotationSetRefList>),
    AnnotationSets(Vec<AnnotationSetItem>),
    ClassData(Vec<ClassDataItem>),
    Code(Vec<CodeItem>),
    StringData(Vec<StringDataItem>),
    DebugInfo(Vec<DebugInfoItem>),
    Annotations(Vec<AnnotationItem>),
    EncodedArrays(Vec<EncodedArrayItem>),
    AnnotationsDirectories(Vec<AnnotationsDirectoryItem>),
}

/// A borrowed view of a single decoded record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Item<'a> {
    Header(&'a Header),
    StringId(&'a StringIdItem),
    TypeId(&'a TypeIdItem),
    ProtoId(&'a ProtoIdItem),
    FieldId(&'a FieldIdItem),
    MethodId(&'a MethodIdItem),
    ClassDef(&'a ClassDefItem),
    MapList(&'a [MapEntry]),
    TypeList(&'a TypeList),
    AnnotationSetRefList(&'a AnnotationSetRefList),
    AnnotationSet(&'a AnnotationSetItem),
    ClassData(&'a ClassDataItem),
    Code(&'a CodeItem),
    StringData(&'a StringDataItem),
    DebugInfo(&'a DebugInfoItem),
    Annotation(&'a AnnotationItem),
    EncodedArray(&'a EncodedArrayItem),
    AnnotationsDirectory(&'a AnnotationsDirectoryItem),
}

impl<'a> Item<'a> {
    pub fn item_type(&self) -> ItemType {
        match self {
            Item::Header(_) => ItemType::Header,
            Item::StringId(_) => ItemType::StringId,
            Item::TypeId(_) => ItemType::TypeId,
            Item::ProtoId(_) => ItemType::ProtoId,
            Item::FieldId(_) => ItemType::FieldId,
            Item::MethodId(_) => ItemType::MethodId,
            Item::ClassDef(_) => ItemType::ClassDef,
            Item::MapList(_) => ItemType::MapList,
            Item::TypeList(_) => ItemType::TypeList,
            Item::AnnotationSetRefList(_) => ItemType::AnnotationSetRefList,
            Item::AnnotationSet(_) => ItemType::AnnotationSet,
            Item::ClassData(_) => ItemType::ClassData,
            Item::Code(_) => ItemType::Code,
            Item::StringData(_) => ItemType::StringData,
            Item::DebugInfo(_) => ItemType::DebugInfo,
            Item::Annotation(_) => ItemType::Annotation,
            Item::EncodedArray(_) => ItemType::EncodedArray,
            Item::AnnotationsDirectory(_) => ItemType::AnnotationsDirectory,
        }
    }
}

// Decodes `count` records, re-aligning between them when the type requires it,
// and returns the records with their file offsets.
fn read_records<T>(
    cur: &mut ByteCursor,
    entry: &MapEntry,
    read: fn(&mut ByteCursor) -> Result<T, DexError>,
) -> Result<(Vec<T>, Vec<u32>), DexError> {
    let count = entry.size as usize;
    let mut records = Vec::with_capacity(count.min(cur.remaining_len()));
    let mut offsets = Vec::with_capacity(count.min(cur.remaining_len()));
    for i in 0..count {
        if entry.item_type.is_aligned() {
            cur.align(4)?;
        }
        offsets.push(cur.position() as u32);
        let record = read(cur).map_err(|e| {
            DexError::with_context(e, format!("{} #{} at 0x{:x}", entry.item_type.name(), i, cur.position()))
        })?;
        records.push(record);
    }
    Ok((records, offsets))
}

impl Section {
    /// Decodes the section described by `entry`, returning it with the file
    /// offset of each record.
    pub fn read(bytes: &[u8], entry: &MapEntry) -> Result<(Section, Vec<u32>), DexError> {
        let mut cur = ByteCursor::at(bytes, entry.offset as usize)?;
        let cur = &mut cur;
        macro_rules! section {
            ($variant:ident, $read:expr) => {{
                let (records, offsets) = read_records(cur, entry, $read)?;
                (Section::$variant(records), offsets)
            }};
        }
        let decoded = match entry.item_type {
            ItemType::Header => section!(Header, Header::read),
            ItemType::StringId => section!(StringIds, StringIdItem::read),
            ItemType::TypeId => section!(TypeIds, TypeIdItem::read),
            ItemType::ProtoId => section!(ProtoIds, ProtoIdItem::read),
            ItemType::FieldId => section!(FieldIds, FieldIdItem::read),
            ItemType::MethodId => section!(MethodIds, MethodIdItem::read),
            ItemType::ClassDef => section!(ClassDefs, ClassDefItem::read),
            ItemType::MapList => section!(MapList, read_map_entries),
            ItemType::TypeList => section!(TypeLists, TypeList::read),
            ItemType::AnnotationSetRefList => section!(AnnotationSetRefLists, AnnotationSetRefList::read),
            ItemType::AnnotationSet => section!(AnnotationSets, AnnotationSetItem::read),
            ItemType::ClassData => section!(ClassData, ClassDataItem::read),
            ItemType::Code => section!(Code, CodeItem::read),
            ItemType::StringData => section!(StringData, StringDataItem::read),
            ItemType::DebugInfo => section!(DebugInfo, DebugInfoItem::read),
            ItemType::Annotation => section!(Annotations, AnnotationItem::read),
            ItemType::EncodedArray => section!(EncodedArrays, EncodedArrayItem::read),
            ItemType::AnnotationsDirectory => section!(AnnotationsDirectories, AnnotationsDirectoryItem::read),
        };
        debug!(
            "decoded {} x{} at 0x{:x}..0x{:x}",
            entry.item_type.name(), entry.size, entry.offset, cur.position()
        );
        Ok(decoded)
    }

    pub fn len(&self) -> usize {
        match self {
            Section::Header(v) => v.len(),
            Section::StringIds(v) => v.len(),
            Section::TypeIds(v) => v.len(),
            Section::ProtoIds(v) => v.len(),
            Section::FieldIds(v) => v.len(),
            Section::MethodIds(v) => v.len(),
            Section::ClassDefs(v) => v.len(),
            Section::MapList(v) => v.len(),
            Section::TypeLists(v) => v.len(),
            Section::AnnotationSetRefLists(v) => v.len(),
            Section::AnnotationSets(v) => v.len(),
            Section::ClassData(v) => v.len(),
            Section::Code(v) => v.len(),
            Section::StringData(v) => v.len(),
            Section::DebugInfo(v) => v.len(),
            Section::Annotations(v) => v.len(),
            Section::EncodedArrays(v) => v.len(),
            Section::AnnotationsDirectories(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn item(&self, index: usize) -> Option<Item<'_>> {
        Some(match self {
            Section::Header(v) => Item::Header(v.get(index)?),
            Section::StringIds(v) => Item::StringId(v.get(index)?),
            Section::TypeIds(v) => Item::TypeId(v.get(index)?),
            Section::ProtoIds(v) => Item::ProtoId(v.get(index)?),
            Section::FieldIds(v) => Item::FieldId(v.get(index)?),
            Section::MethodIds(v) => Item::MethodId(v.get(index)?),
            Section::ClassDefs(v) => Item::ClassDef(v.get(index)?),
            Section::MapList(v) => Item::MapList(v.get(index)?),
            Section::TypeLists(v) => Item::TypeList(v.get(index)?),
            Section::AnnotationSetRefLists(v) => Item::AnnotationSetRefList(v.get(index)?),
            Section::AnnotationSets(v) => Item::AnnotationSet(v.get(index)?),
            Section::ClassData(v) => Item::ClassData(v.get(index)?),
            Section::Code(v) => Item::Code(v.get(index)?),
            Section::StringData(v) => Item::StringData(v.get(index)?),
            Section::DebugInfo(v) => Item::DebugInfo(v.get(index)?),
            Section::Annotations(v) => Item::Annotation(v.get(index)?),
            Section::EncodedArrays(v) => Item::EncodedArray(v.get(index)?),
            Section::AnnotationsDirectories(v) => Item::AnnotationsDirectory(v.get(index)?),
        })
    }

    /// Re-encodes every record. `bytes` is expected to start at the section's
    /// (aligned) file offset so that padding lands where the file had it.
    pub fn write(&self, item_type: ItemType, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        for i in 0..self.len() {
            if item_type.is_aligned() {
                c += write_align(bytes, 4);
            }
            c += match self.item(i) {
                Some(Item::Header(r)) => r.write(bytes),
                Some(Item::StringId(r)) => r.write(bytes),
                Some(Item::TypeId(r)) => r.write(bytes),
                Some(Item::ProtoId(r)) => r.write(bytes),
                Some(Item::FieldId(r)) => r.write(bytes),
                Some(Item::MethodId(r)) => r.write(bytes),
                Some(Item::ClassDef(r)) => r.write(bytes),
                Some(Item::MapList(r)) => write_map_entries(r, bytes),
                Some(Item::TypeList(r)) => r.write(bytes),
                Some(Item::AnnotationSetRefList(r)) => r.write(bytes),
                Some(Item::AnnotationSet(r)) => r.write(bytes),
                Some(Item::ClassData(r)) => r.write(bytes),
                Some(Item::Code(r)) => r.write(bytes),
                Some(Item::StringData(r)) => r.write(bytes),
                Some(Item::DebugInfo(r)) => r.write(bytes),
                Some(Item::Annotation(r)) => r.write(bytes),
                Some(Item::EncodedArray(r)) => r.write(bytes),
                Some(Item::AnnotationsDirectory(r)) => r.write(bytes),
                None => 0,
            };
        }
        c
    }
}

/// A map entry together with its decoded section.
#[derive(Debug, Clone, PartialEq)]
pub struct MapItem {
    pub entry: MapEntry,
    pub section: Section,
    /// File offset of each record, parallel to the section.
    pub offsets: Vec<u32>,
}

impl MapItem {
    pub fn read(bytes: &[u8], entry: MapEntry) -> Result<MapItem, DexError> {
        let (section, offsets) = Section::read(bytes, &entry)?;
        Ok(MapItem { entry, section, offsets })
    }

    pub fn item_type(&self) -> ItemType {
        self.entry.item_type
    }
}

/// The decoded map: every section of the file, in map order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapList {
    pub items: Vec<MapItem>,
}

impl MapList {
    /// Reads the map at `map_off` and decodes every section it lists.
    pub fn read(bytes: &[u8], map_off: u32) -> Result<MapList, DexError> {
        let mut cur = ByteCursor::at(bytes, map_off as usize)
            .map_err(|e| DexError::with_context(e, "map_list".to_string()))?;
        let entries = read_map_entries(&mut cur)?;
        let mut items = Vec::with_capacity(entries.len());
        for (i, entry) in entries.into_iter().enumerate() {
            let item = MapItem::read(bytes, entry).map_err(|e| DexError::with_context(e, format!("map entry {}", i)))?;
            items.push(item);
        }
        Ok(MapList { items })
    }

    pub fn entries(&self) -> Vec<MapEntry> {
        self.items.iter().map(|i| i.entry).collect()
    }

    /// The raw `map_list` encoding.
    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        write_map_entries(&self.entries(), bytes)
    }

    pub fn find(&self, item_type: ItemType) -> Option<&MapItem> {
        self.items.iter().find(|i| i.item_type() == item_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::error::DexErrorKind;

    #[test]
    fn item_type_tags() {
        assert_eq!(ItemType::from_u16(0x2001), Some(ItemType::Code));
        assert_eq!(ItemType::from_u16(0x1000), Some(ItemType::MapList));
        assert_eq!(ItemType::from_u16(0x0007), None);
        assert_eq!(ItemType::from_i64(-1), None);
        assert!(ItemType::Code.is_aligned());
        assert!(!ItemType::StringData.is_aligned());
    }

    #[test]
    fn every_item_type_tag_is_recognized() {
        for t in ItemType::ALL {
            assert_eq!(ItemType::from_u16(t as u16), Some(t), "{}", t.name());
        }
        let known = (0..=0xffffu16).filter(|v| ItemType::from_u16(*v).is_some()).count();
        assert_eq!(known, ItemType::ALL.len());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let bytes = [0x01, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let e = read_map_entries(&mut ByteCursor::new(&bytes)).unwrap_err();
        assert_eq!(e.kind(), DexErrorKind::UnknownTypeTag);
    }

    #[test]
    fn map_entries_roundtrip() {
        let entries = vec![
            MapEntry { item_type: ItemType::Header, unused: 0, size: 1, offset: 0 },
            MapEntry { item_type: ItemType::StringId, unused: 0, size: 4, offset: 0x70 },
            MapEntry { item_type: ItemType::MapList, unused: 0, size: 1, offset: 0x200 },
        ];
        let mut bytes = vec![];
        assert_eq!(write_map_entries(&entries, &mut bytes), 4 + 3 * 12);
        assert_eq!(read_map_entries(&mut ByteCursor::new(&bytes)).unwrap(), entries);
    }

    #[test]
    fn aligned_sections_skip_padding() {
        // two type lists: [1 entry] then padding to 4 then [2 entries]
        let bytes = [
            0x01, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00,
        ];
        let entry = MapEntry { item_type: ItemType::TypeList, unused: 0, size: 2, offset: 0 };
        let (section, offsets) = Section::read(&bytes, &entry).unwrap();
        assert_eq!(offsets, vec![0, 8]);
        assert_eq!(section.item(1), Some(Item::TypeList(&TypeList(vec![1, 2]))));
        let mut out = vec![];
        section.write(ItemType::TypeList, &mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn section_past_end_is_out_of_bounds() {
        let bytes = [0u8; 8];
        let entry = MapEntry { item_type: ItemType::StringId, unused: 0, size: 3, offset: 0 };
        let e = Section::read(&bytes, &entry).unwrap_err();
        assert_eq!(e.kind(), DexErrorKind::OutOfBounds);
    }
}
