#[macro_use]
pub mod error;

pub mod cursor;
pub(crate) mod leb;
pub mod opcodes;
pub mod payload;
pub mod instructions;
pub mod kind;
pub mod encoded_values;
pub mod annotations;
pub mod items;
pub mod code;
pub mod map;
pub mod class_manager;
pub mod sweep;
pub mod dex_file;

pub use crate::dex::class_manager::ClassManager;
pub use crate::dex::cursor::ByteCursor;
pub use crate::dex::dex_file::{DexFile, DexOptions, Header};
pub use crate::dex::error::{DexError, DexErrorKind};
pub use crate::dex::instructions::{FormattedOperand, Instruction, Operand};
pub use crate::dex::kind::{resolve, ResolvedRef};
pub use crate::dex::opcodes::{Format, Kind};
pub use crate::dex::sweep::{DCode, LinearSweep};

use crate::dex::leb::{encode_sleb128, encode_uleb128, encode_uleb128p1};

// Basic type writing; every writer returns the number of bytes appended
pub(crate) fn write_u1(buffer: &mut Vec<u8>, val: u8) -> usize
{
    buffer.push(val);
    1
}

pub(crate) fn write_u2(buffer: &mut Vec<u8>, val: u16) -> usize
{
    buffer.extend_from_slice(&val.to_le_bytes());
    2
}

pub(crate) fn write_u4(buffer: &mut Vec<u8>, val: u32) -> usize
{
    buffer.extend_from_slice(&val.to_le_bytes());
    4
}

pub(crate) fn write_u8(buffer: &mut Vec<u8>, val: u64) -> usize
{
    buffer.extend_from_slice(&val.to_le_bytes());
    8
}

pub(crate) fn write_uleb128(buffer: &mut Vec<u8>, val: u32) -> usize
{
    let encoded = encode_uleb128(val);
    let c = encoded.len();
    buffer.extend(encoded);
    c
}

pub(crate) fn write_sleb128(buffer: &mut Vec<u8>, val: i32) -> usize
{
    let encoded = encode_sleb128(val);
    let c = encoded.len();
    buffer.extend(encoded);
    c
}

pub(crate) fn write_uleb128p1(buffer: &mut Vec<u8>, val: Option<u32>) -> usize
{
    let encoded = encode_uleb128p1(val);
    let c = encoded.len();
    buffer.extend(encoded);
    c
}

pub(crate) fn write_x(buffer: &mut Vec<u8>, val: &[u8]) -> usize
{
    buffer.extend_from_slice(val);
    val.len()
}

/// Pads with zero bytes until the buffer length is a multiple of `n`.
pub(crate) fn write_align(buffer: &mut Vec<u8>, n: usize) -> usize
{
    let mut c = 0;
    while buffer.len() % n != 0
    {
        c += write_u1(buffer, 0);
    }
    c
}
