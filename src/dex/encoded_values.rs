use crate::dex::class_manager::ClassManager;
use crate::dex::cursor::ByteCursor;
use crate::dex::error::DexError;
use crate::dex::kind::escape_string;
use crate::dex::{write_u1, write_uleb128, write_x};

#[derive(Debug, PartialEq, Clone)]
pub struct EncodedAnnotation {
    pub type_idx: u32,
    pub elements: Vec<AnnotationElement>,
}

impl EncodedAnnotation {
    pub fn read(cur: &mut ByteCursor) -> Result<EncodedAnnotation, DexError> {
        let type_idx = cur.read_uleb128()?;
        let size = cur.read_uleb128()? as usize;
        let mut elements = Vec::with_capacity(size.min(cur.remaining_len()));

        for _ in 0..size {
            elements.push(AnnotationElement::read(cur)?);
        }

        Ok(EncodedAnnotation { type_idx, elements })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_uleb128(bytes, self.type_idx);
        c += write_uleb128(bytes, self.elements.len() as u32);
        for element in &self.elements {
            c += element.write(bytes);
        }
        c
    }

    pub fn render(&self, cm: &ClassManager) -> String {
        let type_desc = cm.get_type(self.type_idx).map(str::to_string).unwrap_or_else(|e| format!("<unresolved: {}>", e));
        let elements: Vec<String> = self
            .elements
            .iter()
            .map(|e| {
                let name = cm.get_string(e.name_idx).map(str::to_string).unwrap_or_else(|_| format!("name@{}", e.name_idx));
                format!("{}={}", name, e.value.render(cm))
            })
            .collect();
        format!("{}({})", type_desc, elements.join(", "))
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct AnnotationElement {
    pub name_idx: u32,
    pub value: EncodedValue,
}

impl AnnotationElement {
    pub fn read(cur: &mut ByteCursor) -> Result<AnnotationElement, DexError> {
        let name_idx = cur.read_uleb128()?;
        let value = EncodedValue::read(cur)?;
        Ok(AnnotationElement { name_idx, value })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        write_uleb128(bytes, self.name_idx) + self.value.write(bytes)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum EncodedValue {
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    MethodType(u32),
    MethodHandle(u32),
    String(u32),
    Type(u32),
    Field(u32),
    Method(u32),
    Enum(u32),
    Array(Vec<EncodedValue>),
    Annotation(EncodedAnnotation),
    Null,
    Boolean(bool),
}

const VALUE_BYTE: u8 = 0x00;
const VALUE_SHORT: u8 = 0x02;
const VALUE_CHAR: u8 = 0x03;
const VALUE_INT: u8 = 0x04;
const VALUE_LONG: u8 = 0x06;
const VALUE_FLOAT: u8 = 0x10;
const VALUE_DOUBLE: u8 = 0x11;
const VALUE_METHOD_TYPE: u8 = 0x15;
const VALUE_METHOD_HANDLE: u8 = 0x16;
const VALUE_STRING: u8 = 0x17;
const VALUE_TYPE: u8 = 0x18;
const VALUE_FIELD: u8 = 0x19;
const VALUE_METHOD: u8 = 0x1a;
const VALUE_ENUM: u8 = 0x1b;
const VALUE_ARRAY: u8 = 0x1c;
const VALUE_ANNOTATION: u8 = 0x1d;
const VALUE_NULL: u8 = 0x1e;
const VALUE_BOOLEAN: u8 = 0x1f;

impl EncodedValue
{
    pub fn as_annotation(&self) -> Option<&EncodedAnnotation> {
        match self {
            EncodedValue::Annotation(ann) => Some(ann),
            _ => None,
        }
    }

    /// Renders the value with indices resolved through the class manager.
    pub fn render(&self, cm: &ClassManager) -> String
    {
        let or_index = |r: Result<String, DexError>, tag: &str, idx: &u32| r.unwrap_or_else(|_| format!("{}@{}", tag, idx));
        match self
        {
            EncodedValue::Byte(x) => format!("{}", x),
            EncodedValue::Short(x) => format!("{}", x),
            EncodedValue::Char(x) => format!("{}", x),
            EncodedValue::Int(x) => format!("{}", x),
            EncodedValue::Long(x) => format!("{}", x),
            EncodedValue::Float(x) => format!("{:?}", x),
            EncodedValue::Double(x) => format!("{:?}", x),
            EncodedValue::MethodType(x) => or_index(cm.get_proto(*x).map(|p| p.descriptor.clone()), "proto", x),
            EncodedValue::MethodHandle(x) => format!("handle@{}", x),
            EncodedValue::String(x) => {
                or_index(cm.get_string(*x).map(|s| format!("\"{}\"", escape_string(s))), "string", x)
            }
            EncodedValue::Type(x) => or_index(cm.get_type(*x).map(str::to_string), "type", x),
            EncodedValue::Field(x) | EncodedValue::Enum(x) => {
                or_index(cm.get_field(*x).map(|f| format!("{}->{}:{}", f.class, f.name, f.type_desc)), "field", x)
            }
            EncodedValue::Method(x) => {
                or_index(cm.get_method_ref(*x).map(|m| format!("{}->{}{}", m.class, m.name, m.descriptor)), "method", x)
            }
            EncodedValue::Array(v) => {
                let items: Vec<String> = v.iter().map(|i| i.render(cm)).collect();
                format!("{{ {} }}", items.join(", "))
            }
            EncodedValue::Annotation(ea) => ea.render(cm),
            EncodedValue::Null => "null".to_string(),
            EncodedValue::Boolean(b) => b.to_string(),
        }
    }

    pub fn read(cur: &mut ByteCursor) -> Result<EncodedValue, DexError> {
        let header_byte = cur.read_u8()?;
        let value_arg = header_byte >> 5;
        let value_type = header_byte & 0x1f;
        let size = (value_arg + 1) as usize;

        let check_size = |max: usize| -> Result<(), DexError> {
            if size > max {
                fail!("encoded value type 0x{:02x} with {} bytes", value_type, size);
            }
            Ok(())
        };

        Ok(match value_type {
            VALUE_BYTE => {
                check_size(1)?;
                EncodedValue::Byte(cur.read_u8()? as i8)
            }
            VALUE_SHORT => {
                check_size(2)?;
                EncodedValue::Short(read_signed(cur, size)? as i16)
            }
            VALUE_CHAR => {
                check_size(2)?;
                EncodedValue::Char(read_unsigned(cur, size)? as u16)
            }
            VALUE_INT => {
                check_size(4)?;
                EncodedValue::Int(read_signed(cur, size)? as i32)
            }
            VALUE_LONG => EncodedValue::Long(read_signed(cur, size)?),
            VALUE_FLOAT => {
                check_size(4)?;
                let bits = read_unsigned(cur, size)? << (8 * (4 - size));
                EncodedValue::Float(f32::from_bits(bits as u32))
            }
            VALUE_DOUBLE => {
                let bits = read_unsigned(cur, size)? << (8 * (8 - size));
                EncodedValue::Double(f64::from_bits(bits))
            }
            VALUE_METHOD_TYPE | VALUE_METHOD_HANDLE | VALUE_STRING | VALUE_TYPE | VALUE_FIELD
            | VALUE_METHOD | VALUE_ENUM => {
                check_size(4)?;
                let idx = read_unsigned(cur, size)? as u32;
                match value_type {
                    VALUE_METHOD_TYPE => EncodedValue::MethodType(idx),
                    VALUE_METHOD_HANDLE => EncodedValue::MethodHandle(idx),
                    VALUE_STRING => EncodedValue::String(idx),
                    VALUE_TYPE => EncodedValue::Type(idx),
                    VALUE_FIELD => EncodedValue::Field(idx),
                    VALUE_METHOD => EncodedValue::Method(idx),
                    _ => EncodedValue::Enum(idx),
                }
            }
            VALUE_ARRAY => EncodedValue::Array(read_encoded_array(cur)?),
            VALUE_ANNOTATION => EncodedValue::Annotation(EncodedAnnotation::read(cur)?),
            VALUE_NULL => EncodedValue::Null,
            VALUE_BOOLEAN => EncodedValue::Boolean(value_arg != 0),
            _ => fail!("unknown encoded value type 0x{:02x}", value_type),
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        match self {
            EncodedValue::Byte(val) => write_u1(bytes, VALUE_BYTE) + write_u1(bytes, *val as u8),
            EncodedValue::Short(v) => write_signed(bytes, VALUE_SHORT, *v as i64),
            EncodedValue::Char(v) => write_unsigned(bytes, VALUE_CHAR, *v as u64),
            EncodedValue::Int(v) => write_signed(bytes, VALUE_INT, *v as i64),
            EncodedValue::Long(v) => write_signed(bytes, VALUE_LONG, *v),
            EncodedValue::Float(v) => write_right_zero_extended(bytes, VALUE_FLOAT, &v.to_bits().to_le_bytes()),
            EncodedValue::Double(v) => write_right_zero_extended(bytes, VALUE_DOUBLE, &v.to_bits().to_le_bytes()),
            EncodedValue::MethodType(v) => write_unsigned(bytes, VALUE_METHOD_TYPE, *v as u64),
            EncodedValue::MethodHandle(v) => write_unsigned(bytes, VALUE_METHOD_HANDLE, *v as u64),
            EncodedValue::String(v) => write_unsigned(bytes, VALUE_STRING, *v as u64),
            EncodedValue::Type(v) => write_unsigned(bytes, VALUE_TYPE, *v as u64),
            EncodedValue::Field(v) => write_unsigned(bytes, VALUE_FIELD, *v as u64),
            EncodedValue::Method(v) => write_unsigned(bytes, VALUE_METHOD, *v as u64),
            EncodedValue::Enum(v) => write_unsigned(bytes, VALUE_ENUM, *v as u64),
            EncodedValue::Array(value) => write_u1(bytes, VALUE_ARRAY) + write_encoded_array(value, bytes),
            EncodedValue::Annotation(value) => write_u1(bytes, VALUE_ANNOTATION) + value.write(bytes),
            EncodedValue::Null => write_u1(bytes, VALUE_NULL),
            EncodedValue::Boolean(val) => write_u1(bytes, VALUE_BOOLEAN | ((*val as u8) << 5)),
        }
    }
}

fn read_unsigned(cur: &mut ByteCursor, size: usize) -> Result<u64, DexError> {
    let raw = cur.read(size)?;
    Ok(raw.iter().rev().fold(0u64, |acc, b| (acc << 8) | *b as u64))
}

fn read_signed(cur: &mut ByteCursor, size: usize) -> Result<i64, DexError> {
    let value = read_unsigned(cur, size)?;
    let shift = 64 - 8 * size as u32;
    Ok(((value << shift) as i64) >> shift)
}

/// Smallest byte count holding `v` as a sign-extended value.
fn signed_size(v: i64) -> usize {
    let magnitude = if v < 0 { !v } else { v };
    let bits = 64 - magnitude.leading_zeros() as usize + 1;
    ((bits + 7) / 8).max(1)
}

fn unsigned_size(v: u64) -> usize {
    let bits = 64 - v.leading_zeros() as usize;
    ((bits + 7) / 8).max(1)
}

fn write_signed(bytes: &mut Vec<u8>, value_type: u8, v: i64) -> usize {
    let size = signed_size(v);
    write_u1(bytes, ((size as u8 - 1) << 5) | value_type) + write_x(bytes, &v.to_le_bytes()[..size])
}

fn write_unsigned(bytes: &mut Vec<u8>, value_type: u8, v: u64) -> usize {
    let size = unsigned_size(v);
    write_u1(bytes, ((size as u8 - 1) << 5) | value_type) + write_x(bytes, &v.to_le_bytes()[..size])
}

/// Floats drop their low-order zero bytes and keep the high ones.
fn write_right_zero_extended(bytes: &mut Vec<u8>, value_type: u8, le: &[u8]) -> usize {
    let zeros = le.iter().take_while(|b| **b == 0).count();
    let size = (le.len() - zeros).max(1);
    write_u1(bytes, ((size as u8 - 1) << 5) | value_type) + write_x(bytes, &le[le.len() - size..])
}

pub fn write_encoded_array(encoded_array: &[EncodedValue], bytes: &mut Vec<u8>) -> usize
{
    let mut c = 0;
    c += write_uleb128(bytes, encoded_array.len() as u32);
    for value in encoded_array {
        c += value.write(bytes);
    }
    c
}

pub fn read_encoded_array(cur: &mut ByteCursor) -> Result<Vec<EncodedValue>, DexError>
{
    let size = cur.read_uleb128()? as usize;
    let mut values = Vec::with_capacity(size.min(cur.remaining_len()));
    for _ in 0..size
    {
        values.push(EncodedValue::read(cur)?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(bytes: &[u8]) -> EncodedValue {
        let mut cur = ByteCursor::new(bytes);
        let value = EncodedValue::read(&mut cur).expect("Failed to read EncodedValue");
        assert_eq!(cur.remaining_len(), 0);
        let mut out = vec![];
        assert_eq!(value.write(&mut out), bytes.len());
        assert_eq!(out, bytes);
        value
    }

    #[test]
    fn test_encoded_value_byte() {
        assert_eq!(roundtrip(&[0x00, 0x7f]), EncodedValue::Byte(127));
        assert_eq!(roundtrip(&[0x00, 0x80]), EncodedValue::Byte(-128));
    }

    #[test]
    fn test_encoded_value_short_and_char() {
        assert_eq!(roundtrip(&[0x22, 0x34, 0x12]), EncodedValue::Short(0x1234));
        assert_eq!(roundtrip(&[0x02, 0xff]), EncodedValue::Short(-1));
        assert_eq!(roundtrip(&[0x23, 0x34, 0x12]), EncodedValue::Char(0x1234));
        // chars are zero extended, so 0xff fits in one byte
        assert_eq!(roundtrip(&[0x03, 0xff]), EncodedValue::Char(0xff));
    }

    #[test]
    fn test_encoded_value_int_sign_aware() {
        assert_eq!(roundtrip(&[0x64, 0x78, 0x56, 0x34, 0x12]), EncodedValue::Int(0x12345678));
        // 0x80 needs a second byte to stay positive
        assert_eq!(roundtrip(&[0x24, 0x80, 0x00]), EncodedValue::Int(0x80));
        assert_eq!(roundtrip(&[0x04, 0x80]), EncodedValue::Int(-128));
        assert_eq!(roundtrip(&[0x24, 0x7f, 0xff]), EncodedValue::Int(-129));
    }

    #[test]
    fn test_encoded_value_long() {
        assert_eq!(roundtrip(&[0x06, 0x01]), EncodedValue::Long(1));
        assert_eq!(
            roundtrip(&[0xe6, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80]),
            EncodedValue::Long(i64::MIN)
        );
    }

    #[test]
    fn test_encoded_value_float_right_zero_extended() {
        // 1.0f is 0x3f800000: only the two high bytes are stored
        assert_eq!(roundtrip(&[0x30, 0x80, 0x3f]), EncodedValue::Float(1.0));
        // 1.0 is 0x3ff0000000000000
        assert_eq!(roundtrip(&[0x31, 0xf0, 0x3f]), EncodedValue::Double(1.0));
        assert_eq!(roundtrip(&[0x10, 0x00]), EncodedValue::Float(0.0));
    }

    #[test]
    fn test_encoded_value_indices() {
        assert_eq!(roundtrip(&[0x17, 0x05]), EncodedValue::String(5));
        assert_eq!(roundtrip(&[0x38, 0x00, 0x01]), EncodedValue::Type(0x100));
        assert_eq!(roundtrip(&[0x1b, 0x02]), EncodedValue::Enum(2));
    }

    #[test]
    fn test_encoded_value_null_and_boolean() {
        assert_eq!(roundtrip(&[0x1e]), EncodedValue::Null);
        assert_eq!(roundtrip(&[0x3f]), EncodedValue::Boolean(true));
        assert_eq!(roundtrip(&[0x1f]), EncodedValue::Boolean(false));
    }

    #[test]
    fn test_encoded_array_nesting() {
        let bytes = [0x1c, 0x02, 0x00, 0x01, 0x1c, 0x01, 0x1e];
        let value = roundtrip(&bytes);
        assert_eq!(
            value,
            EncodedValue::Array(vec![EncodedValue::Byte(1), EncodedValue::Array(vec![EncodedValue::Null])])
        );
    }

    #[test]
    fn test_bad_values_are_rejected() {
        let mut cur = ByteCursor::new(&[0x01]);
        assert!(EncodedValue::read(&mut cur).is_err());
        // an int claiming 5 bytes
        let mut cur = ByteCursor::new(&[0x84, 0, 0, 0, 0, 0]);
        assert!(EncodedValue::read(&mut cur).is_err());
        // truncated payload
        let mut cur = ByteCursor::new(&[0x64, 0x01]);
        assert!(EncodedValue::read(&mut cur).is_err());
    }

    #[test]
    fn test_encoded_annotation_read_write() {
        let annotation = EncodedAnnotation {
            type_idx: 1,
            elements: vec![
                AnnotationElement { name_idx: 2, value: EncodedValue::Boolean(true) },
                AnnotationElement { name_idx: 3, value: EncodedValue::Int(42) },
            ],
        };

        let mut bytes = vec![];
        annotation.write(&mut bytes);

        let mut cur = ByteCursor::new(&bytes);
        let read_annotation = EncodedAnnotation::read(&mut cur).expect("Failed to read EncodedAnnotation");
        assert_eq!(annotation, read_annotation);
    }
}
