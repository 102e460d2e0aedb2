//! A tiny, fully consistent DEX file built in memory.
//!
//! One class `LFoo;` with an instance field `count I`, a method `run()V`
//! carrying the supplied instructions and an abstract `stop()V`.

use crate::dex::code::CodeItem;
use crate::dex::dex_file::{Header, DEX_FILE_MAGIC, ENDIAN_CONSTANT, HEADER_SIZE};
use crate::dex::items::{
    AccessFlags, ClassDataItem, ClassDefItem, EncodedField, EncodedMethod, FieldIdItem, MethodIdItem, ProtoIdItem,
    StringDataItem, StringIdItem, TypeIdItem, NO_INDEX,
};
use crate::dex::map::{write_map_entries, ItemType, MapEntry};

pub const STRINGS: [&str; 7] = ["Hello", "I", "LFoo;", "V", "count", "run", "stop"];

/// Index of `run()V` in the method ids.
pub const RUN: u32 = 0;
/// Index of the abstract `stop()V`.
pub const STOP: u32 = 1;

pub struct SyntheticDex
{
    pub bytes: Vec<u8>,
    pub code_off: u32,
    pub map_off: u32,
    pub entries: Vec<MapEntry>,
}

fn entry(item_type: ItemType, size: u32, offset: u32) -> MapEntry
{
    MapEntry { item_type, unused: 0, size, offset }
}

/// Builds the file with `insns` (an even number of bytes) as the body of `run()V`.
pub fn build(insns: &[u8]) -> SyntheticDex
{
    assert_eq!(insns.len() % 2, 0, "instructions are whole code units");

    let string_ids_off = HEADER_SIZE as u32;
    let type_ids_off = string_ids_off + 4 * STRINGS.len() as u32;
    let proto_ids_off = type_ids_off + 4 * 3;
    let field_ids_off = proto_ids_off + 12;
    let method_ids_off = field_ids_off + 8;
    let class_defs_off = method_ids_off + 8 * 2;
    let data_off = class_defs_off + 32;

    let mut data = vec![];
    let at = |data: &Vec<u8>| data_off + data.len() as u32;

    let code_off = at(&data);
    let code = CodeItem {
        registers_size: 2,
        ins_size: 1,
        outs_size: 1,
        debug_info_off: 0,
        insns: insns.to_vec(),
        padding: None,
        tries: vec![],
        handlers: vec![],
    };
    code.write(&mut data);

    let string_data_off = at(&data);
    let mut string_offs = vec![];
    for s in STRINGS {
        string_offs.push(at(&data));
        StringDataItem::new(s).write(&mut data);
    }

    let class_data_off = at(&data);
    let class_data = ClassDataItem {
        static_fields: vec![],
        instance_fields: vec![EncodedField { field_idx: 0, access_flags: AccessFlags::PRIVATE }],
        direct_methods: vec![],
        virtual_methods: vec![
            EncodedMethod { method_idx: RUN, access_flags: AccessFlags::PUBLIC, code_off },
            EncodedMethod { method_idx: STOP, access_flags: AccessFlags::PUBLIC | AccessFlags::ABSTRACT, code_off: 0 },
        ],
    };
    class_data.write(&mut data);

    while at(&data) % 4 != 0 {
        data.push(0);
    }
    let map_off = at(&data);
    let entries = vec![
        entry(ItemType::Header, 1, 0),
        entry(ItemType::StringId, STRINGS.len() as u32, string_ids_off),
        entry(ItemType::TypeId, 3, type_ids_off),
        entry(ItemType::ProtoId, 1, proto_ids_off),
        entry(ItemType::FieldId, 1, field_ids_off),
        entry(ItemType::MethodId, 2, method_ids_off),
        entry(ItemType::ClassDef, 1, class_defs_off),
        entry(ItemType::Code, 1, code_off),
        entry(ItemType::StringData, STRINGS.len() as u32, string_data_off),
        entry(ItemType::ClassData, 1, class_data_off),
        entry(ItemType::MapList, 1, map_off),
    ];
    write_map_entries(&entries, &mut data);

    let header = Header {
        magic: DEX_FILE_MAGIC,
        checksum: 0,
        signature: [0; 20],
        file_size: data_off + data.len() as u32,
        header_size: HEADER_SIZE as u32,
        endian_tag: ENDIAN_CONSTANT,
        link_size: 0,
        link_off: 0,
        map_off,
        string_ids_size: STRINGS.len() as u32,
        string_ids_off,
        type_ids_size: 3,
        type_ids_off,
        proto_ids_size: 1,
        proto_ids_off,
        field_ids_size: 1,
        field_ids_off,
        method_ids_size: 2,
        method_ids_off,
        class_defs_size: 1,
        class_defs_off,
        data_size: data.len() as u32,
        data_off,
    };

    let mut bytes = vec![];
    header.write(&mut bytes);
    for off in &string_offs {
        StringIdItem { string_data_off: *off }.write(&mut bytes);
    }
    // I, LFoo;, V
    for descriptor_idx in [1, 2, 3] {
        TypeIdItem { descriptor_idx }.write(&mut bytes);
    }
    ProtoIdItem { shorty_idx: 3, return_type_idx: 2, parameters_off: 0 }.write(&mut bytes);
    FieldIdItem { class_idx: 1, type_idx: 0, name_idx: 4 }.write(&mut bytes);
    MethodIdItem { class_idx: 1, proto_idx: 0, name_idx: 5 }.write(&mut bytes);
    MethodIdItem { class_idx: 1, proto_idx: 0, name_idx: 6 }.write(&mut bytes);
    ClassDefItem {
        class_idx: 1,
        access_flags: AccessFlags::PUBLIC | AccessFlags::ABSTRACT,
        superclass_idx: NO_INDEX,
        interfaces_off: 0,
        source_file_idx: NO_INDEX,
        annotations_off: 0,
        class_data_off,
        static_values_off: 0,
    }
    .write(&mut bytes);
    assert_eq!(bytes.len() as u32, data_off);
    bytes.extend(data);

    SyntheticDex { bytes, code_off, map_off, entries }
}
