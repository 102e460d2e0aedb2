use crate::dex::code::CodeItem;
use crate::dex::error::DexErrorKind;
use crate::dex::map::{ItemType, MapList};
use crate::dex::{DexFile, DexOptions};
use crate::tests::synthetic::{self, RUN, STOP};

const RETURN_VOID: [u8; 2] = [0x0e, 0x00];

#[test]
fn opens_synthetic_dex() {
    let dex = synthetic::build(&RETURN_VOID);
    let file = DexFile::open(&dex.bytes, DexOptions::default()).expect("open synthetic dex");

    assert_eq!(file.dex_version(), 35);
    assert_eq!(file.api_level(), 19);
    assert_eq!(file.map_list().items.len(), dex.entries.len());
    assert_eq!(file.map_list().entries(), dex.entries);

    let cm = file.class_manager();
    assert_eq!(cm.get_class_name(0).unwrap(), "LFoo;");
    assert_eq!(cm.get_method_ref(RUN).unwrap().descriptor, "()V");
    assert_eq!(cm.get_method_ref(STOP).unwrap().name, "stop");
    assert_eq!(cm.get_field(0).unwrap().type_desc, "I");
    assert_eq!(cm.get_proto(0).unwrap().shorty, "V");
}

#[test]
fn return_void_method() {
    let dex = synthetic::build(&RETURN_VOID);
    let file = DexFile::from_bytes(&dex.bytes).unwrap();

    let mut code = file.get_method_code(RUN).unwrap();
    assert_eq!(code.get_start(), dex.code_off + CodeItem::INSNS_OFFSET);
    assert_eq!(code.get_insns_size(), 1);

    let all: Vec<_> = code.instructions().map(|i| i.into_owned()).collect();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name(), "return-void");
    assert_eq!(all[0].length(), 2);
    assert_eq!(all[0].raw_bytes(), RETURN_VOID.to_vec());
}

#[test]
fn methods_with_code() {
    let dex = synthetic::build(&RETURN_VOID);
    let file = DexFile::from_bytes(&dex.bytes).unwrap();
    let methods = file.methods();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].method_idx, RUN);
    assert_eq!(methods[0].code_off, dex.code_off);
    assert_eq!(file.get_code_item(RUN).unwrap().insns, RETURN_VOID.to_vec());
}

#[test]
fn method_without_code_is_not_found() {
    let dex = synthetic::build(&RETURN_VOID);
    let file = DexFile::from_bytes(&dex.bytes).unwrap();
    assert_eq!(file.get_method_code(STOP).unwrap_err().kind(), DexErrorKind::NotFound);
    assert_eq!(file.get_method_code(9).unwrap_err().kind(), DexErrorKind::UnresolvedReference);
}

#[test]
fn sections_reencode_to_original_bytes() {
    let dex = synthetic::build(&[0x12, 0x10, 0x0f, 0x00]);
    let file = DexFile::from_bytes(&dex.bytes).unwrap();

    for item in &file.map_list().items {
        let start = item.entry.offset as usize;
        let mut out = dex.bytes[..start].to_vec();
        item.section.write(item.item_type(), &mut out);
        assert_eq!(out[start..], dex.bytes[start..out.len()], "{}", item.item_type().name());
    }

    let mut map = vec![];
    file.map_list().write(&mut map);
    let map_off = dex.map_off as usize;
    assert_eq!(map, dex.bytes[map_off..map_off + map.len()]);
}

#[test]
fn recomputed_header_matches_original() {
    let dex = synthetic::build(&RETURN_VOID);
    let file = DexFile::from_bytes(&dex.bytes).unwrap();
    assert_eq!(file.recomputed_header(), file.header);
    assert_eq!(file.header_raw(), &dex.bytes[..0x70]);
    // memoized
    assert!(std::ptr::eq(file.header_raw(), file.header_raw()));
}

#[test]
fn bad_magic_is_rejected() {
    let mut dex = synthetic::build(&RETURN_VOID);
    dex.bytes[1] = b'x';
    let e = DexFile::from_bytes(&dex.bytes).unwrap_err();
    assert_eq!(e.kind(), DexErrorKind::MalformedHeader);
}

#[test]
fn unknown_map_tag_is_rejected() {
    let mut dex = synthetic::build(&RETURN_VOID);
    // first entry type, right after the entry count
    let at = dex.map_off as usize + 4;
    dex.bytes[at..at + 2].copy_from_slice(&0x0042u16.to_le_bytes());
    let e = DexFile::from_bytes(&dex.bytes).unwrap_err();
    assert_eq!(e.kind(), DexErrorKind::UnknownTypeTag);
    assert_eq!(MapList::read(&dex.bytes, dex.map_off).unwrap_err().kind(), DexErrorKind::UnknownTypeTag);
}

#[test]
fn dangling_code_offset_is_rejected() {
    let mut dex = synthetic::build(&RETURN_VOID);
    let class_data = dex.entries.iter().find(|e| e.item_type == ItemType::ClassData).unwrap().offset as usize;
    // counts (4 bytes), field (2 bytes), then run(): idx delta, flags, code_off
    let code_off_at = class_data + 4 + 2 + 2;
    assert_eq!(dex.bytes[code_off_at], 0xdc);
    dex.bytes[code_off_at] = 0xe0;
    let e = DexFile::from_bytes(&dex.bytes).unwrap_err();
    assert_eq!(e.kind(), DexErrorKind::UnresolvedReference);
}

#[test]
fn truncated_file_is_out_of_bounds() {
    let dex = synthetic::build(&RETURN_VOID);
    let e = DexFile::from_bytes(&dex.bytes[..dex.map_off as usize + 20]).unwrap_err();
    assert_eq!(e.kind(), DexErrorKind::OutOfBounds);
}

#[test]
fn api_level_override() {
    let dex = synthetic::build(&RETURN_VOID);
    let options = DexOptions { api_level: Some(10), ..DexOptions::default() };
    let file = DexFile::open(&dex.bytes, options).unwrap();
    assert_eq!(file.api_level(), 10);
    assert_eq!(file.class_manager().api_level(), 10);
}
