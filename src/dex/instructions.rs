//! Dalvik instruction decoding and encoding.
//!
//! Field names follow the format ids: `a` is the first operand of the format
//! (`A`, `AA` or `AAAA`), `b` the second and so on. Register lists of the
//! `35c` family are kept in encoding order `C, D, E, F, G`.

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

use crate::dex::class_manager::ClassManager;
use crate::dex::error::DexError;
use crate::dex::kind::{resolve, ResolvedRef};
use crate::dex::opcodes::{self, Format, Kind, OpcodeDef, OpcodeFlags};
use crate::dex::opcodes::{FILL_ARRAY_DATA_IDENT, PACKED_SWITCH_IDENT, SPARSE_SWITCH_IDENT};
use crate::dex::payload::{padded, FillArrayData, PackedSwitch, SparseSwitch};
use crate::dex::{write_u2, write_u4, write_u8};

pub const INVALID_INSTRUCTION_NAME: &str = "invalid-instruction";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Instruction {
    /// An opcode byte with no definition. Always one code unit long.
    Invalid { word: u16 },
    Format10x { op: u16 },
    Format10t { op: u16, a: i8 },
    Format11n { op: u16, a: u8, b: i8 },
    Format11x { op: u16, a: u8 },
    Format12x { op: u16, a: u8, b: u8 },
    Format20t { op: u16, a: i16 },
    Format20bc { op: u16, a: u8, b: u16 },
    Format21c { op: u16, a: u8, b: u16 },
    Format21h { op: u16, a: u8, b: i16 },
    Format21s { op: u16, a: u8, b: i16 },
    Format21t { op: u16, a: u8, b: i16 },
    Format22b { op: u16, a: u8, b: u8, c: i8 },
    Format22c { op: u16, a: u8, b: u8, c: u16 },
    Format22cs { op: u16, a: u8, b: u8, c: u16 },
    Format22s { op: u16, a: u8, b: u8, c: i16 },
    Format22t { op: u16, a: u8, b: u8, c: i16 },
    Format22x { op: u16, a: u8, b: u16 },
    Format23x { op: u16, a: u8, b: u8, c: u8 },
    Format30t { op: u16, a: i32 },
    Format31c { op: u16, a: u8, b: u32 },
    Format31i { op: u16, a: u8, b: i32 },
    Format31t { op: u16, a: u8, b: i32 },
    Format32x { op: u16, a: u16, b: u16 },
    Format35c { op: u16, a: u8, b: u16, args: [u8; 5] },
    Format35mi { op: u16, a: u8, b: u16, args: [u8; 5] },
    Format35ms { op: u16, a: u8, b: u16, args: [u8; 5] },
    Format3rc { op: u16, a: u8, b: u16, c: u16 },
    Format3rmi { op: u16, a: u8, b: u16, c: u16 },
    Format3rms { op: u16, a: u8, b: u16, c: u16 },
    Format40sc { op: u16, a: u16, b: u32 },
    Format41c { op: u16, a: u16, b: u32 },
    Format51l { op: u16, a: u8, b: i64 },
    Format52c { op: u16, a: u16, b: u16, c: u32 },
    Format5rc { op: u16, a: u16, b: u32, c: u16 },
    PackedSwitch(PackedSwitch),
    SparseSwitch(SparseSwitch),
    FillArrayData(FillArrayData),
}

/// A decoded operand, with reference operands already resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Operand {
    Register(u16),
    Literal(i64),
    /// Branch or payload offset in code units, relative to the instruction.
    Offset(i32),
    Raw(Vec<u8>),
    Reference { kind: Kind, index: u32, resolved: Result<ResolvedRef, DexError> },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(r) => write!(f, "v{}", r),
            Operand::Literal(l) => write!(f, "{}", l),
            Operand::Offset(o) => f.write_str(&signed_hex(*o as i64)),
            Operand::Raw(data) => {
                for b in data {
                    write!(f, "\\x{:02x}", b)?;
                }
                Ok(())
            }
            Operand::Reference { resolved: Ok(r), .. } => write!(f, "{}", r),
            Operand::Reference { resolved: Err(e), .. } => write!(f, "<unresolved: {}>", e),
        }
    }
}

/// A literal reinterpreted as the floating point value the opcode loads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum FormattedOperand {
    Float(f32),
    Double(f64),
}

impl fmt::Display for FormattedOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormattedOperand::Float(v) => write!(f, "{:?}", v),
            FormattedOperand::Double(v) => write!(f, "{:?}", v),
        }
    }
}

fn signed_hex(v: i64) -> String {
    if v < 0 {
        format!("-{:x}", v.unsigned_abs())
    } else {
        format!("+{:x}", v)
    }
}

/// Little-endian code units over a window zero-extended to the format size.
struct Units<'a>(Cow<'a, [u8]>);

impl Units<'_> {
    fn u16(&self, i: usize) -> u16 {
        u16::from_le_bytes([self.0[2 * i], self.0[2 * i + 1]])
    }

    fn u32(&self, i: usize) -> u32 {
        self.u16(i) as u32 | (self.u16(i + 1) as u32) << 16
    }

    fn u64(&self, i: usize) -> u64 {
        self.u32(i) as u64 | (self.u32(i + 2) as u64) << 32
    }
}

fn first_unit(slice: &[u8]) -> u16 {
    let w = padded(slice, 2);
    u16::from_le_bytes([w[0], w[1]])
}

/// Decodes a one-byte opcode. Unknown opcodes yield [`Instruction::Invalid`].
pub fn decode_classical(op: u8, slice: &[u8]) -> Instruction {
    match opcodes::classical(op) {
        Some(def) => build(def, slice),
        None => Instruction::Invalid { word: (first_unit(slice) & 0xff00) | op as u16 },
    }
}

/// Decodes an instruction from the jumbo page selected by a 16-bit opcode.
pub fn decode_extended(op16: u16, slice: &[u8]) -> Instruction {
    match opcodes::extended(op16) {
        Some(def) => build(def, slice),
        None => Instruction::Invalid { word: op16 },
    }
}

/// Decodes an instruction from the odex page (`0xf2ff..=0xffff`).
pub fn decode_optimized(op16: u16, slice: &[u8]) -> Instruction {
    match opcodes::optimized(op16) {
        Some(def) => build(def, slice),
        None => Instruction::Invalid { word: op16 },
    }
}

/// Decodes one of the inline payloads. The slice starts at the identifier.
pub fn decode_payload(op16: u16, slice: &[u8]) -> Instruction {
    match op16 {
        PACKED_SWITCH_IDENT => Instruction::PackedSwitch(PackedSwitch::decode(slice)),
        SPARSE_SWITCH_IDENT => Instruction::SparseSwitch(SparseSwitch::decode(slice)),
        FILL_ARRAY_DATA_IDENT => Instruction::FillArrayData(FillArrayData::decode(slice)),
        _ => Instruction::Invalid { word: op16 },
    }
}

fn build(def: &OpcodeDef, slice: &[u8]) -> Instruction {
    use Instruction::*;

    let size = match def.format.size() {
        Some(size) => size,
        None => return decode_payload(def.value, slice),
    };
    let w = Units(padded(slice, size));
    let op = def.value;
    let hi = (w.u16(0) >> 8) as u8;

    match def.format {
        Format::Format10x => Format10x { op },
        Format::Format10t => Format10t { op, a: hi as i8 },
        Format::Format11n => Format11n { op, a: hi & 0xf, b: (hi as i8) >> 4 },
        Format::Format11x => Format11x { op, a: hi },
        Format::Format12x => Format12x { op, a: hi & 0xf, b: hi >> 4 },
        Format::Format20t => Format20t { op, a: w.u16(1) as i16 },
        Format::Format20bc => Format20bc { op, a: hi, b: w.u16(1) },
        Format::Format21c => Format21c { op, a: hi, b: w.u16(1) },
        Format::Format21h => Format21h { op, a: hi, b: w.u16(1) as i16 },
        Format::Format21s => Format21s { op, a: hi, b: w.u16(1) as i16 },
        Format::Format21t => Format21t { op, a: hi, b: w.u16(1) as i16 },
        Format::Format22b => {
            let unit = w.u16(1);
            Format22b { op, a: hi, b: unit as u8, c: (unit >> 8) as u8 as i8 }
        }
        Format::Format22c => Format22c { op, a: hi & 0xf, b: hi >> 4, c: w.u16(1) },
        Format::Format22cs => Format22cs { op, a: hi & 0xf, b: hi >> 4, c: w.u16(1) },
        Format::Format22s => Format22s { op, a: hi & 0xf, b: hi >> 4, c: w.u16(1) as i16 },
        Format::Format22t => Format22t { op, a: hi & 0xf, b: hi >> 4, c: w.u16(1) as i16 },
        Format::Format22x => Format22x { op, a: hi, b: w.u16(1) },
        Format::Format23x => {
            let unit = w.u16(1);
            Format23x { op, a: hi, b: unit as u8, c: (unit >> 8) as u8 }
        }
        Format::Format30t => Format30t { op, a: w.u32(1) as i32 },
        Format::Format31c => Format31c { op, a: hi, b: w.u32(1) },
        Format::Format31i => Format31i { op, a: hi, b: w.u32(1) as i32 },
        Format::Format31t => Format31t { op, a: hi, b: w.u32(1) as i32 },
        Format::Format32x => Format32x { op, a: w.u16(1), b: w.u16(2) },
        Format::Format35c | Format::Format35mi | Format::Format35ms => {
            let regs = w.u16(2);
            let args = [
                (regs & 0xf) as u8,
                ((regs >> 4) & 0xf) as u8,
                ((regs >> 8) & 0xf) as u8,
                (regs >> 12) as u8,
                hi & 0xf,
            ];
            let (a, b) = (hi >> 4, w.u16(1));
            match def.format {
                Format::Format35mi => Format35mi { op, a, b, args },
                Format::Format35ms => Format35ms { op, a, b, args },
                _ => Format35c { op, a, b, args },
            }
        }
        Format::Format3rc => Format3rc { op, a: hi, b: w.u16(1), c: w.u16(2) },
        Format::Format3rmi => Format3rmi { op, a: hi, b: w.u16(1), c: w.u16(2) },
        Format::Format3rms => Format3rms { op, a: hi, b: w.u16(1), c: w.u16(2) },
        Format::Format40sc => Format40sc { op, b: w.u32(1), a: w.u16(3) },
        Format::Format41c => Format41c { op, b: w.u32(1), a: w.u16(3) },
        Format::Format51l => Format51l { op, a: hi, b: w.u64(1) as i64 },
        Format::Format52c => Format52c { op, c: w.u32(1), a: w.u16(3), b: w.u16(4) },
        Format::Format5rc => Format5rc { op, b: w.u32(1), a: w.u16(3), c: w.u16(4) },
        Format::PackedSwitchPayload | Format::SparseSwitchPayload | Format::ArrayPayload => {
            decode_payload(op, slice)
        }
    }
}

fn unit(op: u16, hi: u8) -> u16 {
    (op & 0xff) | (hi as u16) << 8
}

fn nibbles(lo: u8, hi: u8) -> u8 {
    (lo & 0xf) | (hi << 4)
}

impl Instruction {
    pub fn op(&self) -> u16 {
        use Instruction::*;
        match self {
            Invalid { word } => word & 0xff,
            PackedSwitch(_) => PACKED_SWITCH_IDENT,
            SparseSwitch(_) => SPARSE_SWITCH_IDENT,
            FillArrayData(_) => FILL_ARRAY_DATA_IDENT,
            Format10x { op } | Format10t { op, .. } | Format11n { op, .. } | Format11x { op, .. }
            | Format12x { op, .. } | Format20t { op, .. } | Format20bc { op, .. } | Format21c { op, .. }
            | Format21h { op, .. } | Format21s { op, .. } | Format21t { op, .. } | Format22b { op, .. }
            | Format22c { op, .. } | Format22cs { op, .. } | Format22s { op, .. } | Format22t { op, .. }
            | Format22x { op, .. } | Format23x { op, .. } | Format30t { op, .. } | Format31c { op, .. }
            | Format31i { op, .. } | Format31t { op, .. } | Format32x { op, .. } | Format35c { op, .. }
            | Format35mi { op, .. } | Format35ms { op, .. } | Format3rc { op, .. } | Format3rmi { op, .. }
            | Format3rms { op, .. } | Format40sc { op, .. } | Format41c { op, .. } | Format51l { op, .. }
            | Format52c { op, .. } | Format5rc { op, .. } => *op,
        }
    }

    pub fn format(&self) -> Option<Format> {
        use Instruction::*;
        Some(match self {
            Invalid { .. } => return None,
            PackedSwitch(_) => Format::PackedSwitchPayload,
            SparseSwitch(_) => Format::SparseSwitchPayload,
            FillArrayData(_) => Format::ArrayPayload,
            Format10x { .. } => Format::Format10x,
            Format10t { .. } => Format::Format10t,
            Format11n { .. } => Format::Format11n,
            Format11x { .. } => Format::Format11x,
            Format12x { .. } => Format::Format12x,
            Format20t { .. } => Format::Format20t,
            Format20bc { .. } => Format::Format20bc,
            Format21c { .. } => Format::Format21c,
            Format21h { .. } => Format::Format21h,
            Format21s { .. } => Format::Format21s,
            Format21t { .. } => Format::Format21t,
            Format22b { .. } => Format::Format22b,
            Format22c { .. } => Format::Format22c,
            Format22cs { .. } => Format::Format22cs,
            Format22s { .. } => Format::Format22s,
            Format22t { .. } => Format::Format22t,
            Format22x { .. } => Format::Format22x,
            Format23x { .. } => Format::Format23x,
            Format30t { .. } => Format::Format30t,
            Format31c { .. } => Format::Format31c,
            Format31i { .. } => Format::Format31i,
            Format31t { .. } => Format::Format31t,
            Format32x { .. } => Format::Format32x,
            Format35c { .. } => Format::Format35c,
            Format35mi { .. } => Format::Format35mi,
            Format35ms { .. } => Format::Format35ms,
            Format3rc { .. } => Format::Format3rc,
            Format3rmi { .. } => Format::Format3rmi,
            Format3rms { .. } => Format::Format3rms,
            Format40sc { .. } => Format::Format40sc,
            Format41c { .. } => Format::Format41c,
            Format51l { .. } => Format::Format51l,
            Format52c { .. } => Format::Format52c,
            Format5rc { .. } => Format::Format5rc,
        })
    }

    fn def(&self) -> Option<&'static OpcodeDef> {
        match self {
            Instruction::Invalid { .. }
            | Instruction::PackedSwitch(_)
            | Instruction::SparseSwitch(_)
            | Instruction::FillArrayData(_) => None,
            _ => opcodes::lookup(self.op()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Instruction::PackedSwitch(_) => "packed-switch-payload",
            Instruction::SparseSwitch(_) => "sparse-switch-payload",
            Instruction::FillArrayData(_) => "fill-array-data-payload",
            _ => self.def().map(|d| d.name).unwrap_or(INVALID_INSTRUCTION_NAME),
        }
    }

    pub fn kind(&self) -> Kind {
        self.def().map(|d| d.kind).unwrap_or(Kind::None)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Instruction::Invalid { .. })
    }

    /// Encoded size in bytes.
    pub fn length(&self) -> usize {
        match self {
            Instruction::Invalid { .. } => 2,
            Instruction::PackedSwitch(p) => p.length(),
            Instruction::SparseSwitch(s) => s.length(),
            Instruction::FillArrayData(f) => f.length(),
            _ => self.format().and_then(|f| f.size()).unwrap_or(2),
        }
    }

    /// The raw index of the reference operand, if the format has one.
    pub fn ref_index(&self) -> Option<u32> {
        use Instruction::*;
        match self {
            Format20bc { b, .. } | Format21c { b, .. } => Some(*b as u32),
            Format22c { c, .. } | Format22cs { c, .. } => Some(*c as u32),
            Format31c { b, .. } | Format40sc { b, .. } | Format41c { b, .. } | Format5rc { b, .. } => Some(*b),
            Format35c { b, .. } | Format35mi { b, .. } | Format35ms { b, .. } => Some(*b as u32),
            Format3rc { b, .. } | Format3rmi { b, .. } | Format3rms { b, .. } => Some(*b as u32),
            Format52c { c, .. } => Some(*c),
            _ => None,
        }
    }

    /// Registers in operand order; range forms are expanded from first to last.
    pub fn registers(&self) -> Vec<u16> {
        use Instruction::*;
        match self {
            Format11n { a, .. } | Format11x { a, .. } | Format21c { a, .. } | Format21h { a, .. }
            | Format21s { a, .. } | Format21t { a, .. } | Format31c { a, .. } | Format31i { a, .. }
            | Format31t { a, .. } | Format51l { a, .. } => vec![*a as u16],
            Format12x { a, b, .. } | Format22b { a, b, .. } | Format22c { a, b, .. }
            | Format22cs { a, b, .. } | Format22s { a, b, .. } | Format22t { a, b, .. } => {
                vec![*a as u16, *b as u16]
            }
            Format22x { a, b, .. } => vec![*a as u16, *b],
            Format23x { a, b, c, .. } => vec![*a as u16, *b as u16, *c as u16],
            Format32x { a, b, .. } | Format52c { a, b, .. } => vec![*a, *b],
            Format41c { a, .. } => vec![*a],
            Format35c { a, args, .. } | Format35mi { a, args, .. } | Format35ms { a, args, .. } => {
                args.iter().take((*a as usize).min(5)).map(|r| *r as u16).collect()
            }
            Format3rc { a, c, .. } | Format3rmi { a, c, .. } | Format3rms { a, c, .. } => {
                register_range(*c, *a as u16)
            }
            Format5rc { a, c, .. } => register_range(*c, *a),
            _ => vec![],
        }
    }

    /// First and last register of a range form (`last = first + count - 1`).
    pub fn register_span(&self) -> Option<(u16, u16)> {
        use Instruction::*;
        let (first, count) = match self {
            Format3rc { a, c, .. } | Format3rmi { a, c, .. } | Format3rms { a, c, .. } => (*c, *a as u16),
            Format5rc { a, c, .. } => (*c, *a),
            _ => return None,
        };
        if count == 0 {
            return None;
        }
        Some((first, first.wrapping_add(count - 1)))
    }

    pub fn literals(&self) -> Vec<i64> {
        use Instruction::*;
        match self {
            Format11n { b, .. } => vec![*b as i64],
            Format21h { b, .. } | Format21s { b, .. } => vec![*b as i64],
            Format22b { c, .. } => vec![*c as i64],
            Format22s { c, .. } => vec![*c as i64],
            Format31i { b, .. } => vec![*b as i64],
            Format51l { b, .. } => vec![*b],
            _ => vec![],
        }
    }

    /// Branch (or payload) offset in code units.
    pub fn branch_offset(&self) -> Option<i32> {
        use Instruction::*;
        match self {
            Format10t { a, .. } => Some(*a as i32),
            Format20t { a, .. } => Some(*a as i32),
            Format30t { a, .. } => Some(*a),
            Format21t { b, .. } => Some(*b as i32),
            Format22t { c, .. } => Some(*c as i32),
            Format31t { b, .. } => Some(*b),
            _ => None,
        }
    }

    /// Float or double views of literals loaded by the `const*` family.
    pub fn formatted_operands(&self) -> Vec<FormattedOperand> {
        use Instruction::*;
        let flags = match self.def() {
            Some(def) => def.flags,
            None => return vec![],
        };
        if flags.contains(OpcodeFlags::FLOAT_LITERAL) {
            match self {
                Format31i { b, .. } => return vec![FormattedOperand::Float(f32::from_bits(*b as u32))],
                Format21h { b, .. } => {
                    return vec![FormattedOperand::Float(f32::from_bits((*b as u16 as u32) << 16))]
                }
                _ => {}
            }
        }
        if flags.contains(OpcodeFlags::DOUBLE_LITERAL) {
            match self {
                Format21s { b, .. } => return vec![FormattedOperand::Double(*b as f64)],
                Format31i { b, .. } => return vec![FormattedOperand::Double(*b as f64)],
                Format51l { b, .. } => return vec![FormattedOperand::Double(f64::from_bits(*b as u64))],
                Format21h { b, .. } => {
                    return vec![FormattedOperand::Double(f64::from_bits((*b as u16 as u64) << 48))]
                }
                _ => {}
            }
        }
        vec![]
    }

    fn reference(&self, cm: &ClassManager) -> Option<Operand> {
        let index = self.ref_index()?;
        let kind = self.kind();
        Some(Operand::Reference { kind, index, resolved: resolve(cm, kind, index) })
    }

    /// All operands, with references resolved through the class manager.
    /// A failed resolution is carried inside the operand.
    pub fn operands(&self, cm: &ClassManager) -> Vec<Operand> {
        use Instruction::*;
        let regs = || self.registers().into_iter().map(Operand::Register);
        let mut out: Vec<Operand> = match self {
            Invalid { .. } | PackedSwitch(_) | SparseSwitch(_) | Format10x { .. } => vec![],
            FillArrayData(f) => vec![Operand::Raw(f.data.clone())],
            Format20bc { a, .. } => vec![Operand::Literal(*a as i64)],
            Format40sc { a, .. } => vec![Operand::Literal(*a as i64)],
            _ => regs().collect(),
        };
        out.extend(self.literals().into_iter().map(Operand::Literal));
        if let Some(off) = self.branch_offset() {
            out.push(Operand::Offset(off));
        }
        if let Some(r) = self.reference(cm) {
            out.push(r);
        }
        out
    }

    /// The operand text of a listing line.
    pub fn output(&self, cm: &ClassManager) -> String {
        let mut buff = match self {
            Instruction::Invalid { word } => format!("(OP:{:x})", word & 0xff),
            Instruction::PackedSwitch(p) => {
                p.keys().iter().map(|k| format!("{:x}", k)).collect::<Vec<_>>().join(" ")
            }
            Instruction::SparseSwitch(s) => {
                s.keys.iter().map(|k| format!("{:x}", k)).collect::<Vec<_>>().join(" ")
            }
            _ => match self.register_span() {
                Some((first, last)) if first != last => {
                    let mut parts = vec![format!("v{} ... v{}", first, last)];
                    parts.extend(self.reference(cm).map(|r| r.to_string()));
                    parts.join(", ")
                }
                _ => self
                    .operands(cm)
                    .iter()
                    .map(|o| o.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            },
        };
        let formatted = self.formatted_operands();
        if !formatted.is_empty() {
            let values = formatted.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(", ");
            buff.push_str(&format!(" # [{}]", values));
        }
        buff
    }

    /// The exact encoding of this instruction.
    pub fn raw_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.length());
        self.write(&mut bytes);
        bytes
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        use Instruction::*;
        match self {
            Invalid { word } => write_u2(bytes, *word),
            PackedSwitch(p) => p.write(bytes),
            SparseSwitch(s) => s.write(bytes),
            FillArrayData(f) => f.write(bytes),
            Format10x { op } => write_u2(bytes, unit(*op, 0)),
            Format10t { op, a } => write_u2(bytes, unit(*op, *a as u8)),
            Format11n { op, a, b } => write_u2(bytes, unit(*op, nibbles(*a, *b as u8))),
            Format11x { op, a } => write_u2(bytes, unit(*op, *a)),
            Format12x { op, a, b } => write_u2(bytes, unit(*op, nibbles(*a, *b))),
            Format20t { op, a } => write_u2(bytes, unit(*op, 0)) + write_u2(bytes, *a as u16),
            Format20bc { op, a, b } | Format21c { op, a, b } | Format22x { op, a, b } => {
                write_u2(bytes, unit(*op, *a)) + write_u2(bytes, *b)
            }
            Format21h { op, a, b } | Format21s { op, a, b } | Format21t { op, a, b } => {
                write_u2(bytes, unit(*op, *a)) + write_u2(bytes, *b as u16)
            }
            Format22b { op, a, b, c } => {
                write_u2(bytes, unit(*op, *a)) + write_u2(bytes, *b as u16 | (*c as u8 as u16) << 8)
            }
            Format22c { op, a, b, c } | Format22cs { op, a, b, c } => {
                write_u2(bytes, unit(*op, nibbles(*a, *b))) + write_u2(bytes, *c)
            }
            Format22s { op, a, b, c } | Format22t { op, a, b, c } => {
                write_u2(bytes, unit(*op, nibbles(*a, *b))) + write_u2(bytes, *c as u16)
            }
            Format23x { op, a, b, c } => {
                write_u2(bytes, unit(*op, *a)) + write_u2(bytes, *b as u16 | (*c as u16) << 8)
            }
            Format30t { op, a } => write_u2(bytes, unit(*op, 0)) + write_u4(bytes, *a as u32),
            Format31c { op, a, b } => write_u2(bytes, unit(*op, *a)) + write_u4(bytes, *b),
            Format31i { op, a, b } | Format31t { op, a, b } => {
                write_u2(bytes, unit(*op, *a)) + write_u4(bytes, *b as u32)
            }
            Format32x { op, a, b } => write_u2(bytes, unit(*op, 0)) + write_u2(bytes, *a) + write_u2(bytes, *b),
            Format35c { op, a, b, args } | Format35mi { op, a, b, args } | Format35ms { op, a, b, args } => {
                let regs = (args[0] & 0xf) as u16
                    | ((args[1] & 0xf) as u16) << 4
                    | ((args[2] & 0xf) as u16) << 8
                    | ((args[3] & 0xf) as u16) << 12;
                write_u2(bytes, unit(*op, nibbles(args[4], *a))) + write_u2(bytes, *b) + write_u2(bytes, regs)
            }
            Format3rc { op, a, b, c } | Format3rmi { op, a, b, c } | Format3rms { op, a, b, c } => {
                write_u2(bytes, unit(*op, *a)) + write_u2(bytes, *b) + write_u2(bytes, *c)
            }
            Format40sc { op, a, b } | Format41c { op, a, b } => {
                write_u2(bytes, *op) + write_u4(bytes, *b) + write_u2(bytes, *a)
            }
            Format51l { op, a, b } => write_u2(bytes, unit(*op, *a)) + write_u8(bytes, *b as u64),
            Format52c { op, a, b, c } => {
                write_u2(bytes, *op) + write_u4(bytes, *c) + write_u2(bytes, *a) + write_u2(bytes, *b)
            }
            Format5rc { op, a, b, c } => {
                write_u2(bytes, *op) + write_u4(bytes, *b) + write_u2(bytes, *a) + write_u2(bytes, *c)
            }
        }
    }
}

fn register_range(first: u16, count: u16) -> Vec<u16> {
    (0..count).map(|i| first.wrapping_add(i)).collect()
}
