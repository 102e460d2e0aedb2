/* Dex file container: header, map and the method code lookup */

use std::fs;
use std::path::Path;

use log::{debug, info};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::dex::class_manager::ClassManager;
use crate::dex::code::CodeItem;
use crate::dex::cursor::ByteCursor;
use crate::dex::error::DexError;
use crate::dex::items::EncodedMethod;
use crate::dex::map::{ItemType, MapList};
use crate::dex::sweep::DCode;
use crate::dex::{write_u4, write_x};

/* Constants */
pub const DEX_FILE_MAGIC: [u8; 8] = [0x64, 0x65, 0x78, 0x0a, 0x30, 0x33, 0x35, 0x00];
pub const ENDIAN_CONSTANT: u32 = 0x12345678;
pub const REVERSE_ENDIAN_CONSTANT: u32 = 0x78563412;
pub const HEADER_SIZE: usize = 0x70;

/// Decoding parameters supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DexOptions
{
    /// Decode the optimized opcode page.
    pub odex: bool,
    /// Platform API level; derived from the magic when absent.
    pub api_level: Option<u32>,
    /// Full traversals after which the next one caches a method's instructions.
    pub warm_threshold: u32,
    /// Methods longer than this many code units are cached from their second traversal on.
    pub cache_size_threshold: u32,
}

impl Default for DexOptions
{
    fn default() -> Self
    {
        DexOptions { odex: false, api_level: None, warm_threshold: 5, cache_size_threshold: 1000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub magic: [u8; 8],
    pub checksum: u32,
    pub signature: [u8; 20],
    pub file_size: u32,
    pub header_size: u32,
    pub endian_tag: u32,
    pub link_size: u32,
    pub link_off: u32,
    pub map_off: u32,
    pub string_ids_size: u32,
    pub string_ids_off: u32,
    pub type_ids_size: u32,
    pub type_ids_off: u32,
    pub proto_ids_size: u32,
    pub proto_ids_off: u32,
    pub field_ids_size: u32,
    pub field_ids_off: u32,
    pub method_ids_size: u32,
    pub method_ids_off: u32,
    pub class_defs_size: u32,
    pub class_defs_off: u32,
    pub data_size: u32,
    pub data_off: u32,
}

impl Header
{
    pub fn read(cur: &mut ByteCursor) -> Result<Header, DexError>
    {
        if cur.remaining_len() < HEADER_SIZE {
            fail!(MalformedHeader, "not enough bytes for header ({} < {})", cur.remaining_len(), HEADER_SIZE);
        }

        let magic: [u8; 8] = cur.read_array()?;
        if &magic[0..4] != b"dex\n" || !magic[4..7].iter().all(u8::is_ascii_digit) || magic[7] != 0 {
            fail!(MalformedHeader, "invalid magic value {:02x?}", magic);
        }

        let header = Header {
            magic,
            checksum: cur.read_u32()?,
            signature: cur.read_array()?,
            file_size: cur.read_u32()?,
            header_size: cur.read_u32()?,
            endian_tag: cur.read_u32()?,
            link_size: cur.read_u32()?,
            link_off: cur.read_u32()?,
            map_off: cur.read_u32()?,
            string_ids_size: cur.read_u32()?,
            string_ids_off: cur.read_u32()?,
            type_ids_size: cur.read_u32()?,
            type_ids_off: cur.read_u32()?,
            proto_ids_size: cur.read_u32()?,
            proto_ids_off: cur.read_u32()?,
            field_ids_size: cur.read_u32()?,
            field_ids_off: cur.read_u32()?,
            method_ids_size: cur.read_u32()?,
            method_ids_off: cur.read_u32()?,
            class_defs_size: cur.read_u32()?,
            class_defs_off: cur.read_u32()?,
            data_size: cur.read_u32()?,
            data_off: cur.read_u32()?,
        };

        match header.endian_tag {
            ENDIAN_CONSTANT => Ok(header),
            REVERSE_ENDIAN_CONSTANT => fail!(MalformedHeader, "big-endian files are not supported"),
            tag => fail!(MalformedHeader, "unsupported endian tag 0x{:08x}", tag),
        }
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_x(bytes, &self.magic);
        c += write_u4(bytes, self.checksum);
        c += write_x(bytes, &self.signature);
        c += write_u4(bytes, self.file_size);
        c += write_u4(bytes, self.header_size);
        c += write_u4(bytes, self.endian_tag);
        c += write_u4(bytes, self.link_size);
        c += write_u4(bytes, self.link_off);
        c += write_u4(bytes, self.map_off);
        c += write_u4(bytes, self.string_ids_size);
        c += write_u4(bytes, self.string_ids_off);
        c += write_u4(bytes, self.type_ids_size);
        c += write_u4(bytes, self.type_ids_off);
        c += write_u4(bytes, self.proto_ids_size);
        c += write_u4(bytes, self.proto_ids_off);
        c += write_u4(bytes, self.field_ids_size);
        c += write_u4(bytes, self.field_ids_off);
        c += write_u4(bytes, self.method_ids_size);
        c += write_u4(bytes, self.method_ids_off);
        c += write_u4(bytes, self.class_defs_size);
        c += write_u4(bytes, self.class_defs_off);
        c += write_u4(bytes, self.data_size);
        c += write_u4(bytes, self.data_off);
        c
    }

    /// The numeric DEX version from the magic, e.g. 35, 37, 38, 39, 40, 41.
    pub fn version(&self) -> u32
    {
        let d = &self.magic[4..7];
        if d.iter().all(u8::is_ascii_digit) {
            ((d[0] - b'0') as u32) * 100 + ((d[1] - b'0') as u32) * 10 + ((d[2] - b'0') as u32)
        } else {
            35
        }
    }
}

/// Best-effort mapping from DEX version to Android API level.
pub fn api_level_for_version(dex_version: u32) -> u32
{
    match dex_version {
        35 => 19, // pre-L up to KitKat
        36 => 20,
        37 => 21, // Lollipop
        38 => 24, // Nougat
        39 => 26, // Oreo
        40 => 28, // Pie
        41 => 29, // Android 10
        _ => 33,
    }
}

/// A decoded DEX file. Every section is owned by the class manager; method
/// code handles borrow from it.
#[derive(Debug)]
pub struct DexFile {
    pub header: Header,
    cm: ClassManager,
    options: DexOptions,
    header_raw: OnceCell<Vec<u8>>,
}

impl DexFile {
    /// Parses the header, the map at `map_off` and every section the map lists.
    pub fn open(bytes: &[u8], options: DexOptions) -> Result<DexFile, DexError>
    {
        let header = Header::read(&mut ByteCursor::new(bytes))?;
        info!(
            "opening dex version {:03}: {} bytes, map at 0x{:x}",
            header.version(),
            bytes.len(),
            header.map_off
        );

        if header.map_off as usize >= bytes.len() {
            fail!(MalformedHeader, "map_off 0x{:x} outside of {} bytes", header.map_off, bytes.len());
        }
        let map = MapList::read(bytes, header.map_off)?;
        debug!("map lists {} sections", map.items.len());

        let api_level = options.api_level.unwrap_or_else(|| api_level_for_version(header.version()));
        let cm = ClassManager::new(map, api_level)?;

        Ok(DexFile { header, cm, options, header_raw: OnceCell::new() })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<DexFile, DexError>
    {
        DexFile::open(bytes, DexOptions::default())
    }

    pub fn from_file(path: &Path, options: DexOptions) -> Result<DexFile, DexError>
    {
        let bytes = fs::read(path).map_err(|e| DexError::new(&format!("io Error: {}", e)))?;
        DexFile::open(&bytes, options)
    }

    pub fn class_manager(&self) -> &ClassManager
    {
        &self.cm
    }

    pub fn map_list(&self) -> &MapList
    {
        self.cm.map_list()
    }

    pub fn options(&self) -> &DexOptions
    {
        &self.options
    }

    pub fn dex_version(&self) -> u32
    {
        self.header.version()
    }

    /// The API level used for decoding: the caller's override, else derived from the magic.
    pub fn api_level(&self) -> u32
    {
        self.cm.api_level()
    }

    /// The header with `map_off` and the id table pairs taken from the decoded map.
    pub fn recomputed_header(&self) -> Header
    {
        let map = self.cm.map_list();
        let pair = |t: ItemType| map.find(t).map(|m| (m.entry.size, m.entry.offset)).unwrap_or((0, 0));

        let mut header = self.header.clone();
        header.map_off = map.find(ItemType::MapList).map(|m| m.entry.offset).unwrap_or(0);
        (header.string_ids_size, header.string_ids_off) = pair(ItemType::StringId);
        (header.type_ids_size, header.type_ids_off) = pair(ItemType::TypeId);
        (header.proto_ids_size, header.proto_ids_off) = pair(ItemType::ProtoId);
        (header.field_ids_size, header.field_ids_off) = pair(ItemType::FieldId);
        (header.method_ids_size, header.method_ids_off) = pair(ItemType::MethodId);
        (header.class_defs_size, header.class_defs_off) = pair(ItemType::ClassDef);
        header
    }

    /// Encoded bytes of the recomputed header, built once.
    pub fn header_raw(&self) -> &[u8]
    {
        self.header_raw.get_or_init(|| {
            let mut bytes = Vec::with_capacity(HEADER_SIZE);
            self.recomputed_header().write(&mut bytes);
            bytes
        })
    }

    /// Every encoded method that has code, in class definition order.
    pub fn methods(&self) -> Vec<&EncodedMethod>
    {
        self.cm
            .class_defs()
            .iter()
            .filter(|c| c.class_data_off != 0)
            .filter_map(|c| self.cm.get_class_data(c.class_data_off).ok())
            .flat_map(|data| data.methods())
            .filter(|m| m.code_off != 0)
            .collect()
    }

    pub fn get_code_item(&self, method_idx: u32) -> Result<&CodeItem, DexError>
    {
        let method = self.find_encoded_method(method_idx)?;
        self.cm.get_code_item(method.code_off)
    }

    fn find_encoded_method(&self, method_idx: u32) -> Result<&EncodedMethod, DexError>
    {
        let ids = self.cm.method_ids();
        let method_id = match ids.get(method_idx as usize) {
            Some(m) => m,
            None => fail!(UnresolvedReference, "method index {} out of range ({} entries)", method_idx, ids.len()),
        };
        let class_idx = method_id.class_idx as u32;
        let class_def = match self.cm.class_defs().iter().find(|c| c.class_idx == class_idx) {
            Some(c) => c,
            None => fail!(NotFound, "method {} belongs to type {} which has no class_def", method_idx, class_idx),
        };
        if class_def.class_data_off == 0 {
            fail!(NotFound, "class of method {} has no class data", method_idx);
        }
        let data = self.cm.get_class_data(class_def.class_data_off)?;
        let method = match data.methods().find(|m| m.method_idx == method_idx) {
            Some(m) => m,
            None => fail!(NotFound, "method {} is not defined by its class", method_idx),
        };
        if method.code_off == 0 {
            fail!(NotFound, "method {} has no code", method_idx);
        }
        Ok(method)
    }

    /// The disassembler handle for a method's code.
    pub fn get_method_code(&self, method_idx: u32) -> Result<DCode<'_>, DexError>
    {
        let method = self.find_encoded_method(method_idx)?;
        let code = self
            .cm
            .get_code_item(method.code_off)
            .map_err(|e| DexError::with_context(e, format!("method {}", method_idx)))?;
        Ok(DCode::new(
            &self.cm,
            &code.insns,
            method.code_off + CodeItem::INSNS_OFFSET,
            code.insns_size(),
            &self.options,
        ))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::dex::error::DexErrorKind;

    fn header_bytes() -> Vec<u8>
    {
        let header = Header {
            magic: DEX_FILE_MAGIC,
            checksum: 0xdeadbeef,
            signature: [7; 20],
            file_size: 0x200,
            header_size: HEADER_SIZE as u32,
            endian_tag: ENDIAN_CONSTANT,
            link_size: 0,
            link_off: 0,
            map_off: 0x1a0,
            string_ids_size: 3,
            string_ids_off: 0x70,
            type_ids_size: 0,
            type_ids_off: 0,
            proto_ids_size: 0,
            proto_ids_off: 0,
            field_ids_size: 0,
            field_ids_off: 0,
            method_ids_size: 0,
            method_ids_off: 0,
            class_defs_size: 0,
            class_defs_off: 0,
            data_size: 0x100,
            data_off: 0x100,
        };
        let mut bytes = vec![];
        assert_eq!(header.write(&mut bytes), HEADER_SIZE);
        bytes
    }

    #[test]
    fn header_roundtrip()
    {
        let bytes = header_bytes();
        let header = Header::read(&mut ByteCursor::new(&bytes)).unwrap();
        assert_eq!(header.version(), 35);
        let mut out = vec![];
        header.write(&mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn bad_magic_is_rejected()
    {
        let mut bytes = header_bytes();
        bytes[0] = b'x';
        let e = Header::read(&mut ByteCursor::new(&bytes)).unwrap_err();
        assert_eq!(e.kind(), DexErrorKind::MalformedHeader);

        let mut bytes = header_bytes();
        bytes[5] = b'a';
        assert!(Header::read(&mut ByteCursor::new(&bytes)).is_err());
    }

    #[test]
    fn short_header_is_rejected()
    {
        let bytes = header_bytes();
        let e = Header::read(&mut ByteCursor::new(&bytes[..0x6f])).unwrap_err();
        assert_eq!(e.kind(), DexErrorKind::MalformedHeader);
    }

    #[test]
    fn reverse_endian_is_rejected()
    {
        let mut bytes = header_bytes();
        bytes[0x28..0x2c].copy_from_slice(&REVERSE_ENDIAN_CONSTANT.to_le_bytes());
        let e = Header::read(&mut ByteCursor::new(&bytes)).unwrap_err();
        assert_eq!(e.kind(), DexErrorKind::MalformedHeader);
    }

    #[test]
    fn map_outside_buffer_is_rejected()
    {
        let bytes = header_bytes();
        let e = DexFile::open(&bytes, DexOptions::default()).unwrap_err();
        assert_eq!(e.kind(), DexErrorKind::MalformedHeader);
    }

    #[test]
    fn api_levels()
    {
        assert_eq!(api_level_for_version(35), 19);
        assert_eq!(api_level_for_version(39), 26);
        assert_eq!(api_level_for_version(99), 33);
    }
}
