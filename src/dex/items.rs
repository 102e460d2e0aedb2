/* Section records of the DEX container */

use bitflags::bitflags;
use cesu8::{from_java_cesu8, to_java_cesu8};
use log::warn;

use crate::dex::cursor::ByteCursor;
use crate::dex::encoded_values::{read_encoded_array, write_encoded_array, EncodedValue};
use crate::dex::error::DexError;
use crate::dex::{write_u1, write_u2, write_u4, write_uleb128, write_x};

pub const NO_INDEX: u32 = 0xffffffff;

bitflags! {
    /// Access flags of classes, fields and methods.
    ///
    /// Some bits mean different things on fields and methods (`VOLATILE`/`BRIDGE`,
    /// `TRANSIENT`/`VARARGS`); only the field spelling is defined here.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const PUBLIC = 0x1;
        const PRIVATE = 0x2;
        const PROTECTED = 0x4;
        const STATIC = 0x8;
        const FINAL = 0x10;
        const SYNCHRONIZED = 0x20;
        const VOLATILE = 0x40;
        const TRANSIENT = 0x80;
        const NATIVE = 0x100;
        const INTERFACE = 0x200;
        const ABSTRACT = 0x400;
        const STRICT = 0x800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const CONSTRUCTOR = 0x10000;
        const DECLARED_SYNCHRONIZED = 0x20000;
    }
}

impl AccessFlags
{
    pub const BRIDGE: AccessFlags = AccessFlags::VOLATILE;
    pub const VARARGS: AccessFlags = AccessFlags::TRANSIENT;
}

/// string_id_item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringIdItem
{
    pub string_data_off: u32,
}

impl StringIdItem
{
    pub fn read(cur: &mut ByteCursor) -> Result<StringIdItem, DexError>
    {
        Ok(StringIdItem { string_data_off: cur.read_u32()? })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        write_u4(bytes, self.string_data_off)
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum DexString
{
    Decoded(String),
    /// MUTF-8 bytes that did not decode.
    Raw(Vec<u8>),
}

impl DexString
{
    pub fn from_string(s: &str) -> DexString
    {
        DexString::Decoded(s.to_string())
    }

    pub fn to_string(&self) -> Result<String, DexError>
    {
        match &self
        {
            DexString::Decoded(s) => Ok(s.to_string()),
            DexString::Raw(_) => Err(DexError::new("DexString failed conversion")),
        }
    }

    /// Lossy text, usable even for undecodable data.
    pub fn to_string_lossy(&self) -> String
    {
        match self
        {
            DexString::Decoded(s) => s.clone(),
            DexString::Raw(v) => String::from_utf8_lossy(v).into_owned(),
        }
    }

    pub fn is_decoded(&self) -> bool
    {
        matches!(self, DexString::Decoded(_))
    }
}

/// string_data_item: utf16 length followed by NUL terminated MUTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringDataItem
{
    pub utf16_size: u32,
    pub data: DexString,
}

impl StringDataItem
{
    pub fn new(s: &str) -> StringDataItem
    {
        StringDataItem { utf16_size: s.encode_utf16().count() as u32, data: DexString::from_string(s) }
    }

    pub fn read(cur: &mut ByteCursor) -> Result<StringDataItem, DexError>
    {
        let utf16_size = cur.read_uleb128()?;
        let v = cur.read_until_nul()?;

        let data = match from_java_cesu8(v)
        {
            Ok(converted_str) => DexString::Decoded(converted_str.into_owned()),
            _ => {
                warn!("string data of {} bytes is not valid MUTF-8, keeping raw bytes", v.len());
                DexString::Raw(v.to_vec())
            }
        };
        Ok(StringDataItem { utf16_size, data })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_uleb128(bytes, self.utf16_size);
        match &self.data
        {
            DexString::Raw(v) => c += write_x(bytes, v),
            DexString::Decoded(s) => c += write_x(bytes, &to_java_cesu8(s)),
        }
        c += write_u1(bytes, 0);
        c
    }
}

/// type_id_item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeIdItem
{
    pub descriptor_idx: u32,
}

impl TypeIdItem
{
    pub fn read(cur: &mut ByteCursor) -> Result<TypeIdItem, DexError>
    {
        Ok(TypeIdItem { descriptor_idx: cur.read_u32()? })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        write_u4(bytes, self.descriptor_idx)
    }
}

/// proto_id_item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtoIdItem
{
    pub shorty_idx: u32,
    pub return_type_idx: u32,
    /// Offset of a type_list, 0 when the prototype takes no parameters.
    pub parameters_off: u32,
}

impl ProtoIdItem
{
    pub fn read(cur: &mut ByteCursor) -> Result<ProtoIdItem, DexError>
    {
        Ok(ProtoIdItem {
            shorty_idx: cur.read_u32()?,
            return_type_idx: cur.read_u32()?,
            parameters_off: cur.read_u32()?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_u4(bytes, self.shorty_idx);
        c += write_u4(bytes, self.return_type_idx);
        c += write_u4(bytes, self.parameters_off);
        c
    }
}

/// field_id_item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldIdItem
{
    pub class_idx: u16,
    pub type_idx: u16,
    pub name_idx: u32,
}

impl FieldIdItem
{
    pub fn read(cur: &mut ByteCursor) -> Result<FieldIdItem, DexError>
    {
        Ok(FieldIdItem {
            class_idx: cur.read_u16()?,
            type_idx: cur.read_u16()?,
            name_idx: cur.read_u32()?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_u2(bytes, self.class_idx);
        c += write_u2(bytes, self.type_idx);
        c += write_u4(bytes, self.name_idx);
        c
    }
}

/// method_id_item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodIdItem
{
    pub class_idx: u16,
    pub proto_idx: u16,
    pub name_idx: u32,
}

impl MethodIdItem
{
    pub fn read(cur: &mut ByteCursor) -> Result<MethodIdItem, DexError>
    {
        Ok(MethodIdItem {
            class_idx: cur.read_u16()?,
            proto_idx: cur.read_u16()?,
            name_idx: cur.read_u32()?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_u2(bytes, self.class_idx);
        c += write_u2(bytes, self.proto_idx);
        c += write_u4(bytes, self.name_idx);
        c
    }
}

/// class_def_item. Offsets are kept as raw references into other sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassDefItem {
    pub class_idx: u32,
    pub access_flags: AccessFlags,
    pub superclass_idx: u32,
    pub interfaces_off: u32,
    pub source_file_idx: u32,
    pub annotations_off: u32,
    pub class_data_off: u32,
    pub static_values_off: u32,
}

impl ClassDefItem
{
    pub fn read(cur: &mut ByteCursor) -> Result<ClassDefItem, DexError>
    {
        Ok(ClassDefItem {
            class_idx: cur.read_u32()?,
            access_flags: AccessFlags::from_bits_retain(cur.read_u32()?),
            superclass_idx: cur.read_u32()?,
            interfaces_off: cur.read_u32()?,
            source_file_idx: cur.read_u32()?,
            annotations_off: cur.read_u32()?,
            class_data_off: cur.read_u32()?,
            static_values_off: cur.read_u32()?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_u4(bytes, self.class_idx);
        c += write_u4(bytes, self.access_flags.bits());
        c += write_u4(bytes, self.superclass_idx);
        c += write_u4(bytes, self.interfaces_off);
        c += write_u4(bytes, self.source_file_idx);
        c += write_u4(bytes, self.annotations_off);
        c += write_u4(bytes, self.class_data_off);
        c += write_u4(bytes, self.static_values_off);
        c
    }

    pub fn superclass(&self) -> Option<u32>
    {
        if self.superclass_idx == NO_INDEX { None } else { Some(self.superclass_idx) }
    }

    pub fn source_file(&self) -> Option<u32>
    {
        if self.source_file_idx == NO_INDEX { None } else { Some(self.source_file_idx) }
    }
}

/// type_list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeList(pub Vec<u16>);

impl TypeList
{
    pub fn read(cur: &mut ByteCursor) -> Result<TypeList, DexError>
    {
        let size = cur.read_u32()? as usize;
        let mut v = Vec::with_capacity(size.min(cur.remaining_len() / 2));
        for _ in 0..size { v.push(cur.read_u16()?); }
        Ok(TypeList(v))
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_u4(bytes, self.0.len() as u32);
        for i in &self.0 { c += write_u2(bytes, *i); }
        c
    }
}

/// encoded_array_item, used for static field initial values.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedArrayItem(pub Vec<EncodedValue>);

impl EncodedArrayItem
{
    pub fn read(cur: &mut ByteCursor) -> Result<EncodedArrayItem, DexError>
    {
        Ok(EncodedArrayItem(read_encoded_array(cur)?))
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        write_encoded_array(&self.0, bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedField
{
    pub field_idx: u32,
    pub access_flags: AccessFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMethod
{
    pub method_idx: u32,
    pub access_flags: AccessFlags,
    /// Offset of the code_item, 0 for abstract and native methods.
    pub code_off: u32,
}

/// class_data_item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDataItem {
    pub static_fields: Vec<EncodedField>,
    pub instance_fields: Vec<EncodedField>,
    pub direct_methods: Vec<EncodedMethod>,
    pub virtual_methods: Vec<EncodedMethod>,
}

impl ClassDataItem
{
    pub fn read(cur: &mut ByteCursor) -> Result<ClassDataItem, DexError>
    {
        let static_field_size = cur.read_uleb128()?;
        let instance_field_size = cur.read_uleb128()?;
        let direct_method_size = cur.read_uleb128()?;
        let virtual_method_size = cur.read_uleb128()?;

        let static_fields = read_fields(cur, static_field_size)?;
        let instance_fields = read_fields(cur, instance_field_size)?;
        let direct_methods = read_methods(cur, direct_method_size)?;
        let virtual_methods = read_methods(cur, virtual_method_size)?;

        Ok(ClassDataItem { static_fields, instance_fields, direct_methods, virtual_methods })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_uleb128(bytes, self.static_fields.len() as u32);
        c += write_uleb128(bytes, self.instance_fields.len() as u32);
        c += write_uleb128(bytes, self.direct_methods.len() as u32);
        c += write_uleb128(bytes, self.virtual_methods.len() as u32);

        for fields in [&self.static_fields, &self.instance_fields] {
            let mut last = 0;
            for f in fields {
                c += write_uleb128(bytes, f.field_idx.wrapping_sub(last));
                last = f.field_idx;
                c += write_uleb128(bytes, f.access_flags.bits());
            }
        }

        for methods in [&self.direct_methods, &self.virtual_methods] {
            let mut last = 0;
            for m in methods {
                c += write_uleb128(bytes, m.method_idx.wrapping_sub(last));
                last = m.method_idx;
                c += write_uleb128(bytes, m.access_flags.bits());
                c += write_uleb128(bytes, m.code_off);
            }
        }

        c
    }

    pub fn methods(&self) -> impl Iterator<Item = &EncodedMethod>
    {
        self.direct_methods.iter().chain(self.virtual_methods.iter())
    }
}

// Indices are delta encoded within each list.
fn read_fields(cur: &mut ByteCursor, count: u32) -> Result<Vec<EncodedField>, DexError>
{
    let mut fields = Vec::with_capacity((count as usize).min(cur.remaining_len()));
    let mut idx = 0u32;
    for _ in 0..count {
        idx = idx.wrapping_add(cur.read_uleb128()?);
        let access_flags = AccessFlags::from_bits_retain(cur.read_uleb128()?);
        fields.push(EncodedField { field_idx: idx, access_flags });
    }
    Ok(fields)
}

fn read_methods(cur: &mut ByteCursor, count: u32) -> Result<Vec<EncodedMethod>, DexError>
{
    let mut methods = Vec::with_capacity((count as usize).min(cur.remaining_len()));
    let mut idx = 0u32;
    for _ in 0..count {
        idx = idx.wrapping_add(cur.read_uleb128()?);
        let access_flags = AccessFlags::from_bits_retain(cur.read_uleb128()?);
        let code_off = cur.read_uleb128()?;
        methods.push(EncodedMethod { method_idx: idx, access_flags, code_off });
    }
    Ok(methods)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_data_roundtrip() {
        let item = StringDataItem::new("h\u{e9}llo");
        assert_eq!(item.utf16_size, 5);
        let mut bytes = vec![];
        item.write(&mut bytes);
        assert_eq!(bytes, vec![0x05, b'h', 0xc3, 0xa9, b'l', b'l', b'o', 0x00]);
        let mut cur = ByteCursor::new(&bytes);
        assert_eq!(StringDataItem::read(&mut cur).unwrap(), item);
        assert_eq!(cur.remaining_len(), 0);
    }

    #[test]
    fn string_data_supplementary_and_nul() {
        // MUTF-8 encodes U+0000 as c0 80 and astral characters as surrogate pairs
        let item = StringDataItem::new("a\u{0}\u{1f600}");
        assert_eq!(item.utf16_size, 4);
        let mut bytes = vec![];
        item.write(&mut bytes);
        assert_eq!(&bytes[1..4], &[b'a', 0xc0, 0x80]);
        assert_eq!(bytes.len(), 1 + 3 + 6 + 1);
        let mut cur = ByteCursor::new(&bytes);
        assert_eq!(StringDataItem::read(&mut cur).unwrap().data, DexString::from_string("a\u{0}\u{1f600}"));
    }

    #[test]
    fn undecodable_string_kept_raw() {
        let bytes = [0x01, 0xff, 0x00];
        let mut cur = ByteCursor::new(&bytes);
        let item = StringDataItem::read(&mut cur).unwrap();
        assert_eq!(item.data, DexString::Raw(vec![0xff]));
        assert!(!item.data.is_decoded());
        let mut out = vec![];
        item.write(&mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn id_items_roundtrip() {
        let bytes = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00];
        let f = FieldIdItem::read(&mut ByteCursor::new(&bytes)).unwrap();
        assert_eq!(f, FieldIdItem { class_idx: 1, type_idx: 2, name_idx: 3 });
        let m = MethodIdItem::read(&mut ByteCursor::new(&bytes)).unwrap();
        assert_eq!(m, MethodIdItem { class_idx: 1, proto_idx: 2, name_idx: 3 });
        let mut out = vec![];
        m.write(&mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn class_def_keeps_unknown_flag_bits() {
        let def = ClassDefItem {
            class_idx: 4,
            access_flags: AccessFlags::from_bits_retain(0x8000_0001),
            superclass_idx: NO_INDEX,
            interfaces_off: 0,
            source_file_idx: NO_INDEX,
            annotations_off: 0,
            class_data_off: 0x120,
            static_values_off: 0,
        };
        let mut bytes = vec![];
        assert_eq!(def.write(&mut bytes), 32);
        let back = ClassDefItem::read(&mut ByteCursor::new(&bytes)).unwrap();
        assert_eq!(back, def);
        assert!(back.access_flags.contains(AccessFlags::PUBLIC));
        assert_eq!(back.superclass(), None);
    }

    #[test]
    fn class_data_writes_every_list() {
        let data = ClassDataItem {
            static_fields: vec![EncodedField { field_idx: 2, access_flags: AccessFlags::STATIC }],
            instance_fields: vec![
                EncodedField { field_idx: 0, access_flags: AccessFlags::PRIVATE },
                EncodedField { field_idx: 5, access_flags: AccessFlags::FINAL },
            ],
            direct_methods: vec![EncodedMethod {
                method_idx: 1,
                access_flags: AccessFlags::PUBLIC | AccessFlags::CONSTRUCTOR,
                code_off: 0x200,
            }],
            virtual_methods: vec![
                EncodedMethod { method_idx: 3, access_flags: AccessFlags::PUBLIC, code_off: 0x220 },
                EncodedMethod { method_idx: 7, access_flags: AccessFlags::ABSTRACT, code_off: 0 },
            ],
        };
        let mut bytes = vec![];
        let n = data.write(&mut bytes);
        assert_eq!(n, bytes.len());
        let mut cur = ByteCursor::new(&bytes);
        assert_eq!(ClassDataItem::read(&mut cur).unwrap(), data);
        assert_eq!(cur.remaining_len(), 0);
        assert_eq!(data.methods().map(|m| m.method_idx).collect::<Vec<_>>(), vec![1, 3, 7]);
    }

    #[test]
    fn type_list_roundtrip() {
        let list = TypeList(vec![1, 2, 0xffff]);
        let mut bytes = vec![];
        list.write(&mut bytes);
        assert_eq!(TypeList::read(&mut ByteCursor::new(&bytes)).unwrap(), list);
        let short = [0x02, 0x00, 0x00, 0x00, 0x01, 0x00];
        assert!(TypeList::read(&mut ByteCursor::new(&short)).is_err());
    }
}
