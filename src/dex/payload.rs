//! Inline data payloads embedded in the instruction stream.
//!
//! A payload starts with a 16-bit identifier whose low byte is the `nop` opcode,
//! which is how a linear sweep tells it apart from code.

use std::borrow::Cow;

use log::warn;
use nom::multi::count;
use nom::number::complete::{le_i32, le_u16, le_u32};
use nom::sequence::tuple;
use nom::IResult;
use serde::Serialize;

use crate::dex::opcodes::{FILL_ARRAY_DATA_IDENT, PACKED_SWITCH_IDENT, SPARSE_SWITCH_IDENT};
use crate::dex::{write_u2, write_u4, write_x};

/// Zero-extends `slice` to at least `len` bytes so fixed headers always parse.
pub(crate) fn padded(slice: &[u8], len: usize) -> Cow<'_, [u8]> {
    if slice.len() >= len {
        Cow::Borrowed(slice)
    } else {
        let mut v = slice.to_vec();
        v.resize(len, 0);
        Cow::Owned(v)
    }
}

fn i32_entries(input: &[u8], n: usize) -> IResult<&[u8], Vec<i32>> {
    count(le_i32, n)(input)
}

fn packed_header(input: &[u8]) -> IResult<&[u8], (u16, u16, i32)> {
    tuple((le_u16, le_u16, le_i32))(input)
}

fn sparse_header(input: &[u8]) -> IResult<&[u8], (u16, u16)> {
    tuple((le_u16, le_u16))(input)
}

fn array_header(input: &[u8]) -> IResult<&[u8], (u16, u16, u32)> {
    tuple((le_u16, le_u16, le_u32))(input)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackedSwitch {
    pub size: u16,
    pub first_key: i32,
    pub targets: Vec<i32>,
}

impl PackedSwitch {
    pub fn decode(slice: &[u8]) -> PackedSwitch {
        let header = padded(slice, 8);
        let (size, first_key) = match packed_header(&header) {
            Ok((_, (_, size, first_key))) => (size, first_key),
            Err(_) => (0, 0),
        };

        let body = slice.get(8..).unwrap_or(&[]);
        let available = body.len() / 4;
        let n = (size as usize).min(available);
        if n < size as usize {
            warn!("packed-switch declares {} targets, only {} present", size, n);
        }
        let targets = i32_entries(body, n).map(|(_, t)| t).unwrap_or_default();
        PackedSwitch { size, first_key, targets }
    }

    pub fn keys(&self) -> Vec<i32> {
        (0..self.targets.len() as i32).map(|i| self.first_key.wrapping_add(i)).collect()
    }

    pub fn length(&self) -> usize {
        8 + self.targets.len() * 4
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_u2(bytes, PACKED_SWITCH_IDENT);
        c += write_u2(bytes, self.size);
        c += write_u4(bytes, self.first_key as u32);
        for t in &self.targets {
            c += write_u4(bytes, *t as u32);
        }
        c
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SparseSwitch {
    pub size: u16,
    pub keys: Vec<i32>,
    pub targets: Vec<i32>,
}

impl SparseSwitch {
    pub fn decode(slice: &[u8]) -> SparseSwitch {
        let header = padded(slice, 4);
        let size = match sparse_header(&header) {
            Ok((_, (_, size))) => size,
            Err(_) => 0,
        };

        let body = slice.get(4..).unwrap_or(&[]);
        let n = (size as usize).min(body.len() / 8);
        if n < size as usize {
            warn!("sparse-switch declares {} entries, only {} present", size, n);
        }
        let (keys, targets) = match i32_entries(body, n) {
            Ok((rest, keys)) => (keys, i32_entries(rest, n).map(|(_, t)| t).unwrap_or_default()),
            Err(_) => (vec![], vec![]),
        };
        SparseSwitch { size, keys, targets }
    }

    pub fn length(&self) -> usize {
        4 + self.keys.len() * 8
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_u2(bytes, SPARSE_SWITCH_IDENT);
        c += write_u2(bytes, self.size);
        for k in &self.keys {
            c += write_u4(bytes, *k as u32);
        }
        for t in &self.targets {
            c += write_u4(bytes, *t as u32);
        }
        c
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FillArrayData {
    pub element_width: u16,
    pub size: u32,
    /// Element bytes, padded to an even length.
    pub data: Vec<u8>,
}

impl FillArrayData {
    pub fn decode(slice: &[u8]) -> FillArrayData {
        let header = padded(slice, 8);
        let (element_width, size) = match array_header(&header) {
            Ok((_, (_, width, size))) => (width, size),
            Err(_) => (0, 0),
        };

        let declared = (element_width as usize).saturating_mul(size as usize);
        let declared = declared + (declared & 1);
        let body = slice.get(8..).unwrap_or(&[]);
        let take = declared.min(body.len() & !1);
        if take < declared {
            warn!("fill-array-data declares {} bytes, only {} present", declared, take);
        }
        FillArrayData { element_width, size, data: body[..take].to_vec() }
    }

    /// The elements as little-endian integers of `element_width` bytes.
    pub fn elements(&self) -> Vec<u64> {
        let width = self.element_width as usize;
        if width == 0 || width > 8 {
            return vec![];
        }
        self.data
            .chunks_exact(width)
            .take(self.size as usize)
            .map(|chunk| chunk.iter().rev().fold(0u64, |acc, b| (acc << 8) | *b as u64))
            .collect()
    }

    pub fn length(&self) -> usize {
        8 + self.data.len()
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_u2(bytes, FILL_ARRAY_DATA_IDENT);
        c += write_u2(bytes, self.element_width);
        c += write_u4(bytes, self.size);
        c += write_x(bytes, &self.data);
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_switch_roundtrip() {
        let bytes = [
            0x00, 0x01, 0x02, 0x00, 0x0a, 0x00, 0x00, 0x00, // size 2, first key 10
            0x05, 0x00, 0x00, 0x00, 0xfe, 0xff, 0xff, 0xff,
        ];
        let p = PackedSwitch::decode(&bytes);
        assert_eq!(p.first_key, 10);
        assert_eq!(p.targets, vec![5, -2]);
        assert_eq!(p.keys(), vec![10, 11]);
        assert_eq!(p.length(), bytes.len());
        let mut out = vec![];
        assert_eq!(p.write(&mut out), bytes.len());
        assert_eq!(out, bytes);
    }

    #[test]
    fn packed_switch_clamps_to_buffer() {
        // declares 5 targets but only carries one
        let bytes = [0x00, 0x01, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x07];
        let p = PackedSwitch::decode(&bytes);
        assert_eq!(p.size, 5);
        assert_eq!(p.targets, vec![1]);
        assert_eq!(p.length(), 12);
    }

    #[test]
    fn truncated_headers_do_not_panic() {
        assert_eq!(PackedSwitch::decode(&[0x00, 0x01]).targets.len(), 0);
        assert_eq!(SparseSwitch::decode(&[0x00]).keys.len(), 0);
        assert_eq!(FillArrayData::decode(&[0x00, 0x03, 0x04]).data.len(), 0);
    }

    #[test]
    fn sparse_switch_roundtrip() {
        let bytes = [
            0x00, 0x02, 0x02, 0x00,
            0x01, 0x00, 0x00, 0x00, 0x64, 0x00, 0x00, 0x00,
            0x10, 0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00,
        ];
        let s = SparseSwitch::decode(&bytes);
        assert_eq!(s.keys, vec![1, 100]);
        assert_eq!(s.targets, vec![0x10, 0x20]);
        assert_eq!(s.length(), bytes.len());
        let mut out = vec![];
        s.write(&mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn fill_array_data_pads_to_even_length() {
        // three one-byte elements take four bytes
        let bytes = [0x00, 0x03, 0x01, 0x00, 0x03, 0x00, 0x00, 0x00, 0x0a, 0x0b, 0x0c, 0x00];
        let f = FillArrayData::decode(&bytes);
        assert_eq!(f.data.len(), 4);
        assert_eq!(f.length(), 12);
        assert_eq!(f.elements(), vec![0x0a, 0x0b, 0x0c]);
        let mut out = vec![];
        f.write(&mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn fill_array_data_wide_elements() {
        let bytes = [0x00, 0x03, 0x04, 0x00, 0x01, 0x00, 0x00, 0x00, 0x78, 0x56, 0x34, 0x12];
        let f = FillArrayData::decode(&bytes);
        assert_eq!(f.elements(), vec![0x12345678]);
    }
}
