//! Static opcode tables for the classical, extended (jumbo) and optimized (odex) pages.

use std::collections::HashMap;

use bitflags::bitflags;
use once_cell::sync::Lazy;
use serde::Serialize;

use self::Format::*;

/// Binary layout of an instruction, named after the Dalvik format ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Format {
    Format10x,
    Format10t,
    Format11n,
    Format11x,
    Format12x,
    Format20t,
    Format20bc,
    Format21c,
    Format21h,
    Format21s,
    Format21t,
    Format22b,
    Format22c,
    Format22cs,
    Format22s,
    Format22t,
    Format22x,
    Format23x,
    Format30t,
    Format31c,
    Format31i,
    Format31t,
    Format32x,
    Format35c,
    Format35mi,
    Format35ms,
    Format3rc,
    Format3rmi,
    Format3rms,
    Format40sc,
    Format41c,
    Format51l,
    Format52c,
    Format5rc,
    PackedSwitchPayload,
    SparseSwitchPayload,
    ArrayPayload,
}

impl Format {
    /// Encoded size in bytes, `None` for the variable-length payloads.
    pub fn size(&self) -> Option<usize> {
        match self {
            Format10x | Format10t | Format11n | Format11x | Format12x => Some(2),
            Format20t | Format20bc | Format21c | Format21h | Format21s | Format21t | Format22b
            | Format22c | Format22cs | Format22s | Format22t | Format22x | Format23x => Some(4),
            Format30t | Format31c | Format31i | Format31t | Format32x | Format35c | Format35mi
            | Format35ms | Format3rc | Format3rmi | Format3rms => Some(6),
            Format40sc | Format41c => Some(8),
            Format51l | Format52c | Format5rc => Some(10),
            PackedSwitchPayload | SparseSwitchPayload | ArrayPayload => None,
        }
    }

    pub fn is_payload(&self) -> bool {
        self.size().is_none()
    }
}

/// What the reference operand of an instruction designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Kind {
    None,
    Method,
    String,
    RawString,
    Field,
    Type,
    VtableOffset,
    FieldOffset,
    InlineMethod,
    /// Meaning depends on the verification error carried by the instruction.
    Varies,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpcodeFlags: u32 {
        /// Only legal in optimized (odex) files.
        const ODEX_ONLY = 0x1;
        /// Selected through a 16-bit value rather than the opcode byte.
        const JUMBO_OPCODE = 0x2;
        /// The literal is the bit pattern of a float.
        const FLOAT_LITERAL = 0x4;
        /// The literal feeds a double register pair.
        const DOUBLE_LITERAL = 0x8;
    }
}

pub struct OpcodeDef {
    pub value: u16,
    pub name: &'static str,
    pub format: Format,
    pub kind: Kind,
    pub flags: OpcodeFlags,
}

impl OpcodeDef {
    pub(crate) fn new(value: u16, name: &'static str, format: Format, kind: Kind, flags: OpcodeFlags) -> Self {
        OpcodeDef { value, name, format, kind, flags }
    }

    pub fn odex_only(&self) -> bool {
        self.flags.contains(OpcodeFlags::ODEX_ONLY)
    }

    pub fn is_jumbo(&self) -> bool {
        self.flags.contains(OpcodeFlags::JUMBO_OPCODE)
    }
}

/// Identifiers of the three inline payloads.
pub const PACKED_SWITCH_IDENT: u16 = 0x0100;
pub const SPARSE_SWITCH_IDENT: u16 = 0x0200;
pub const FILL_ARRAY_DATA_IDENT: u16 = 0x0300;

pub(crate) fn is_payload_ident(op16: u16) -> bool {
    matches!(op16, PACKED_SWITCH_IDENT | SPARSE_SWITCH_IDENT | FILL_ARRAY_DATA_IDENT)
}

// Unused slots (0x3e..=0x43, 0x73, 0x79, 0x7a) and 0xff are absent and decode as invalid
static CLASSICAL: Lazy<Vec<OpcodeDef>> = Lazy::new(|| {
    vec![
        OpcodeDef::new(0x00, "nop", Format10x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x01, "move", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x02, "move/from16", Format22x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x03, "move/16", Format32x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x04, "move-wide", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x05, "move-wide/from16", Format22x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x06, "move-wide/16", Format32x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x07, "move-object", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x08, "move-object/from16", Format22x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x09, "move-object/16", Format32x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x0a, "move-result", Format11x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x0b, "move-result-wide", Format11x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x0c, "move-result-object", Format11x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x0d, "move-exception", Format11x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x0e, "return-void", Format10x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x0f, "return", Format11x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x10, "return-wide", Format11x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x11, "return-object", Format11x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x12, "const/4", Format11n, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x13, "const/16", Format21s, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x14, "const", Format31i, Kind::None, OpcodeFlags::FLOAT_LITERAL),
        OpcodeDef::new(0x15, "const/high16", Format21h, Kind::None, OpcodeFlags::FLOAT_LITERAL),
        OpcodeDef::new(0x16, "const-wide/16", Format21s, Kind::None, OpcodeFlags::DOUBLE_LITERAL),
        OpcodeDef::new(0x17, "const-wide/32", Format31i, Kind::None, OpcodeFlags::DOUBLE_LITERAL),
        OpcodeDef::new(0x18, "const-wide", Format51l, Kind::None, OpcodeFlags::DOUBLE_LITERAL),
        OpcodeDef::new(0x19, "const-wide/high16", Format21h, Kind::None, OpcodeFlags::DOUBLE_LITERAL),
        OpcodeDef::new(0x1a, "const-string", Format21c, Kind::String, OpcodeFlags::empty()),
        OpcodeDef::new(0x1b, "const-string/jumbo", Format31c, Kind::String, OpcodeFlags::empty()),
        OpcodeDef::new(0x1c, "const-class", Format21c, Kind::Type, OpcodeFlags::empty()),
        OpcodeDef::new(0x1d, "monitor-enter", Format11x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x1e, "monitor-exit", Format11x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x1f, "check-cast", Format21c, Kind::Type, OpcodeFlags::empty()),
        OpcodeDef::new(0x20, "instance-of", Format22c, Kind::Type, OpcodeFlags::empty()),
        OpcodeDef::new(0x21, "array-length", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x22, "new-instance", Format21c, Kind::Type, OpcodeFlags::empty()),
        OpcodeDef::new(0x23, "new-array", Format22c, Kind::Type, OpcodeFlags::empty()),
        OpcodeDef::new(0x24, "filled-new-array", Format35c, Kind::Type, OpcodeFlags::empty()),
        OpcodeDef::new(0x25, "filled-new-array/range", Format3rc, Kind::Type, OpcodeFlags::empty()),
        OpcodeDef::new(0x26, "fill-array-data", Format31t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x27, "throw", Format11x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x28, "goto", Format10t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x29, "goto/16", Format20t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x2a, "goto/32", Format30t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x2b, "packed-switch", Format31t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x2c, "sparse-switch", Format31t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x2d, "cmpl-float", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x2e, "cmpg-float", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x2f, "cmpl-double", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x30, "cmpg-double", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x31, "cmp-long", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x32, "if-eq", Format22t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x33, "if-ne", Format22t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x34, "if-lt", Format22t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x35, "if-ge", Format22t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x36, "if-gt", Format22t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x37, "if-le", Format22t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x38, "if-eqz", Format21t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x39, "if-nez", Format21t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x3a, "if-ltz", Format21t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x3b, "if-gez", Format21t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x3c, "if-gtz", Format21t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x3d, "if-lez", Format21t, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x44, "aget", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x45, "aget-wide", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x46, "aget-object", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x47, "aget-boolean", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x48, "aget-byte", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x49, "aget-char", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x4a, "aget-short", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x4b, "aput", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x4c, "aput-wide", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x4d, "aput-object", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x4e, "aput-boolean", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x4f, "aput-byte", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x50, "aput-char", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x51, "aput-short", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x52, "iget", Format22c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x53, "iget-wide", Format22c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x54, "iget-object", Format22c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x55, "iget-boolean", Format22c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x56, "iget-byte", Format22c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x57, "iget-char", Format22c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x58, "iget-short", Format22c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x59, "iput", Format22c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x5a, "iput-wide", Format22c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x5b, "iput-object", Format22c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x5c, "iput-boolean", Format22c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x5d, "iput-byte", Format22c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x5e, "iput-char", Format22c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x5f, "iput-short", Format22c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x60, "sget", Format21c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x61, "sget-wide", Format21c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x62, "sget-object", Format21c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x63, "sget-boolean", Format21c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x64, "sget-byte", Format21c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x65, "sget-char", Format21c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x66, "sget-short", Format21c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x67, "sput", Format21c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x68, "sput-wide", Format21c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x69, "sput-object", Format21c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x6a, "sput-boolean", Format21c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x6b, "sput-byte", Format21c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x6c, "sput-char", Format21c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x6d, "sput-short", Format21c, Kind::Field, OpcodeFlags::empty()),
        OpcodeDef::new(0x6e, "invoke-virtual", Format35c, Kind::Method, OpcodeFlags::empty()),
        OpcodeDef::new(0x6f, "invoke-super", Format35c, Kind::Method, OpcodeFlags::empty()),
        OpcodeDef::new(0x70, "invoke-direct", Format35c, Kind::Method, OpcodeFlags::empty()),
        OpcodeDef::new(0x71, "invoke-static", Format35c, Kind::Method, OpcodeFlags::empty()),
        OpcodeDef::new(0x72, "invoke-interface", Format35c, Kind::Method, OpcodeFlags::empty()),
        OpcodeDef::new(0x74, "invoke-virtual/range", Format3rc, Kind::Method, OpcodeFlags::empty()),
        OpcodeDef::new(0x75, "invoke-super/range", Format3rc, Kind::Method, OpcodeFlags::empty()),
        OpcodeDef::new(0x76, "invoke-direct/range", Format3rc, Kind::Method, OpcodeFlags::empty()),
        OpcodeDef::new(0x77, "invoke-static/range", Format3rc, Kind::Method, OpcodeFlags::empty()),
        OpcodeDef::new(0x78, "invoke-interface/range", Format3rc, Kind::Method, OpcodeFlags::empty()),
        OpcodeDef::new(0x7b, "neg-int", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x7c, "not-int", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x7d, "neg-long", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x7e, "not-long", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x7f, "neg-float", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x80, "neg-double", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x81, "int-to-long", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x82, "int-to-float", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x83, "int-to-double", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x84, "long-to-int", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x85, "long-to-float", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x86, "long-to-double", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x87, "float-to-int", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x88, "float-to-long", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x89, "float-to-double", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x8a, "double-to-int", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x8b, "double-to-long", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x8c, "double-to-float", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x8d, "int-to-byte", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x8e, "int-to-char", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x8f, "int-to-short", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x90, "add-int", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x91, "sub-int", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x92, "mul-int", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x93, "div-int", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x94, "rem-int", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x95, "and-int", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x96, "or-int", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x97, "xor-int", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x98, "shl-int", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x99, "shr-int", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x9a, "ushr-int", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x9b, "add-long", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x9c, "sub-long", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x9d, "mul-long", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x9e, "div-long", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0x9f, "rem-long", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xa0, "and-long", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xa1, "or-long", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xa2, "xor-long", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xa3, "shl-long", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xa4, "shr-long", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xa5, "ushr-long", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xa6, "add-float", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xa7, "sub-float", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xa8, "mul-float", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xa9, "div-float", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xaa, "rem-float", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xab, "add-double", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xac, "sub-double", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xad, "mul-double", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xae, "div-double", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xaf, "rem-double", Format23x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xb0, "add-int/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xb1, "sub-int/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xb2, "mul-int/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xb3, "div-int/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xb4, "rem-int/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xb5, "and-int/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xb6, "or-int/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xb7, "xor-int/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xb8, "shl-int/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xb9, "shr-int/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xba, "ushr-int/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xbb, "add-long/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xbc, "sub-long/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xbd, "mul-long/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xbe, "div-long/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xbf, "rem-long/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xc0, "and-long/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xc1, "or-long/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xc2, "xor-long/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xc3, "shl-long/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xc4, "shr-long/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xc5, "ushr-long/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xc6, "add-float/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xc7, "sub-float/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xc8, "mul-float/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xc9, "div-float/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xca, "rem-float/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xcb, "add-double/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xcc, "sub-double/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xcd, "mul-double/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xce, "div-double/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xcf, "rem-double/2addr", Format12x, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xd0, "add-int/lit16", Format22s, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xd1, "rsub-int", Format22s, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xd2, "mul-int/lit16", Format22s, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xd3, "div-int/lit16", Format22s, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xd4, "rem-int/lit16", Format22s, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xd5, "and-int/lit16", Format22s, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xd6, "or-int/lit16", Format22s, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xd7, "xor-int/lit16", Format22s, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xd8, "add-int/lit8", Format22b, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xd9, "rsub-int/lit8", Format22b, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xda, "mul-int/lit8", Format22b, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xdb, "div-int/lit8", Format22b, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xdc, "rem-int/lit8", Format22b, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xdd, "and-int/lit8", Format22b, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xde, "or-int/lit8", Format22b, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xdf, "xor-int/lit8", Format22b, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xe0, "shl-int/lit8", Format22b, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xe1, "shr-int/lit8", Format22b, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xe2, "ushr-int/lit8", Format22b, Kind::None, OpcodeFlags::empty()),
        OpcodeDef::new(0xe3, "iget-volatile", Format22c, Kind::Field, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xe4, "iput-volatile", Format22c, Kind::Field, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xe5, "sget-volatile", Format21c, Kind::Field, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xe6, "sput-volatile", Format21c, Kind::Field, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xe7, "iget-object-volatile", Format22c, Kind::Field, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xe8, "iget-wide-volatile", Format22c, Kind::Field, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xe9, "iput-wide-volatile", Format22c, Kind::Field, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xea, "sget-wide-volatile", Format21c, Kind::Field, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xeb, "sput-wide-volatile", Format21c, Kind::Field, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xec, "breakpoint", Format10x, Kind::None, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xed, "throw-verification-error", Format20bc, Kind::Varies, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xee, "execute-inline", Format35mi, Kind::InlineMethod, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xef, "execute-inline/range", Format3rmi, Kind::InlineMethod, OpcodeFlags::ODEX_ONLY),
        // 3rc as in the platform's own opcode list; some disassemblers use 35c
        OpcodeDef::new(0xf0, "invoke-object-init/range", Format3rc, Kind::Method, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf1, "return-void-barrier", Format10x, Kind::None, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf2, "iget-quick", Format22cs, Kind::FieldOffset, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf3, "iget-wide-quick", Format22cs, Kind::FieldOffset, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf4, "iget-object-quick", Format22cs, Kind::FieldOffset, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf5, "iput-quick", Format22cs, Kind::FieldOffset, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf6, "iput-wide-quick", Format22cs, Kind::FieldOffset, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf7, "iput-object-quick", Format22cs, Kind::FieldOffset, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf8, "invoke-virtual-quick", Format35ms, Kind::VtableOffset, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf9, "invoke-virtual-quick/range", Format3rms, Kind::VtableOffset, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xfa, "invoke-super-quick", Format35ms, Kind::VtableOffset, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xfb, "invoke-super-quick/range", Format3rms, Kind::VtableOffset, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xfc, "iput-object-volatile", Format22c, Kind::Field, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xfd, "sget-object-volatile", Format21c, Kind::Field, OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xfe, "sput-object-volatile", Format21c, Kind::Field, OpcodeFlags::ODEX_ONLY),
    ]
});

static EXTENDED: Lazy<Vec<OpcodeDef>> = Lazy::new(|| {
    vec![
        OpcodeDef::new(0x00ff, "const-class/jumbo", Format41c, Kind::Type, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x01ff, "check-cast/jumbo", Format41c, Kind::Type, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x02ff, "instance-of/jumbo", Format52c, Kind::Type, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x03ff, "new-instance/jumbo", Format41c, Kind::Type, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x04ff, "new-array/jumbo", Format52c, Kind::Type, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x05ff, "filled-new-array/jumbo", Format5rc, Kind::Type, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x06ff, "iget/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x07ff, "iget-wide/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x08ff, "iget-object/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x09ff, "iget-boolean/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x0aff, "iget-byte/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x0bff, "iget-char/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x0cff, "iget-short/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x0dff, "iput/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x0eff, "iput-wide/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x0fff, "iput-object/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x10ff, "iput-boolean/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x11ff, "iput-byte/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x12ff, "iput-char/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x13ff, "iput-short/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x14ff, "sget/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x15ff, "sget-wide/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x16ff, "sget-object/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x17ff, "sget-boolean/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x18ff, "sget-byte/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x19ff, "sget-char/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x1aff, "sget-short/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x1bff, "sput/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x1cff, "sput-wide/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x1dff, "sput-object/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x1eff, "sput-boolean/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x1fff, "sput-byte/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x20ff, "sput-char/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x21ff, "sput-short/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x22ff, "invoke-virtual/jumbo", Format5rc, Kind::Method, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x23ff, "invoke-super/jumbo", Format5rc, Kind::Method, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x24ff, "invoke-direct/jumbo", Format5rc, Kind::Method, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x25ff, "invoke-static/jumbo", Format5rc, Kind::Method, OpcodeFlags::JUMBO_OPCODE),
        OpcodeDef::new(0x26ff, "invoke-interface/jumbo", Format5rc, Kind::Method, OpcodeFlags::JUMBO_OPCODE),
    ]
});

static OPTIMIZED: Lazy<Vec<OpcodeDef>> = Lazy::new(|| {
    vec![
        OpcodeDef::new(0xf2ff, "invoke-object-init/jumbo", Format5rc, Kind::Method, OpcodeFlags::JUMBO_OPCODE | OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf3ff, "iget-volatile/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE | OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf4ff, "iget-wide-volatile/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE | OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf5ff, "iget-object-volatile/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE | OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf6ff, "iput-volatile/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE | OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf7ff, "iput-wide-volatile/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE | OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf8ff, "iput-object-volatile/jumbo", Format52c, Kind::Field, OpcodeFlags::JUMBO_OPCODE | OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xf9ff, "sget-volatile/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE | OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xfaff, "sget-wide-volatile/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE | OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xfbff, "sget-object-volatile/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE | OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xfcff, "sput-volatile/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE | OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xfdff, "sput-wide-volatile/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE | OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xfeff, "sput-object-volatile/jumbo", Format41c, Kind::Field, OpcodeFlags::JUMBO_OPCODE | OpcodeFlags::ODEX_ONLY),
        OpcodeDef::new(0xffff, "throw-verification-error/jumbo", Format40sc, Kind::Varies, OpcodeFlags::JUMBO_OPCODE | OpcodeFlags::ODEX_ONLY),
    ]
});

static CLASSICAL_INDEX: Lazy<[Option<usize>; 256]> = Lazy::new(|| {
    let mut index = [None; 256];
    for (i, def) in CLASSICAL.iter().enumerate() {
        index[def.value as usize] = Some(i);
    }
    index
});

fn index_by_value(table: &[OpcodeDef]) -> HashMap<u16, usize> {
    table.iter().enumerate().map(|(i, def)| (def.value, i)).collect()
}

static EXTENDED_INDEX: Lazy<HashMap<u16, usize>> = Lazy::new(|| index_by_value(&EXTENDED));
static OPTIMIZED_INDEX: Lazy<HashMap<u16, usize>> = Lazy::new(|| index_by_value(&OPTIMIZED));

/// Looks up a one-byte opcode.
pub fn classical(op: u8) -> Option<&'static OpcodeDef> {
    CLASSICAL_INDEX[op as usize].map(|i| &CLASSICAL[i])
}

/// Looks up a jumbo opcode such as `0x00ff` (const-class/jumbo).
pub fn extended(op16: u16) -> Option<&'static OpcodeDef> {
    EXTENDED_INDEX.get(&op16).map(|&i| &EXTENDED[i])
}

/// Looks up an optimized opcode in the `0xf2ff..=0xffff` page.
pub fn optimized(op16: u16) -> Option<&'static OpcodeDef> {
    OPTIMIZED_INDEX.get(&op16).map(|&i| &OPTIMIZED[i])
}

/// Finds the definition for an opcode value as stored in a decoded instruction.
pub fn lookup(op: u16) -> Option<&'static OpcodeDef> {
    if op <= 0xff {
        classical(op as u8)
    } else if op >= 0xf2ff {
        optimized(op)
    } else {
        extended(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classical_table_covers_defined_slots() {
        assert_eq!(classical(0x0e).map(|d| d.name), Some("return-void"));
        assert_eq!(classical(0x6e).map(|d| d.format), Some(Format35c));
        assert_eq!(classical(0x1a).map(|d| d.kind), Some(Kind::String));
        assert_eq!(classical(0xf0).map(|d| d.format), Some(Format3rc));
        for unused in [0x3e, 0x3f, 0x40, 0x41, 0x42, 0x43, 0x73, 0x79, 0x7a, 0xff] {
            assert!(classical(unused).is_none(), "0x{:02x} should be unused", unused);
        }
        let defined = (0u16..=0xff).filter(|v| classical(*v as u8).is_some()).count();
        assert_eq!(defined, 256 - 10);
    }

    #[test]
    fn table_values_are_unique() {
        for table in [&*CLASSICAL, &*EXTENDED, &*OPTIMIZED] {
            let index = index_by_value(table);
            assert_eq!(index.len(), table.len());
        }
    }

    #[test]
    fn extended_and_optimized_pages() {
        let def = extended(0x00ff).expect("const-class/jumbo");
        assert_eq!(def.name, "const-class/jumbo");
        assert!(def.is_jumbo());
        assert_eq!(extended(0x26ff).map(|d| d.format), Some(Format5rc));
        assert!(extended(0x27ff).is_none());

        let def = optimized(0xffff).expect("throw-verification-error/jumbo");
        assert_eq!(def.format, Format40sc);
        assert_eq!(def.kind, Kind::Varies);
        assert!(def.odex_only());
        assert_eq!(lookup(0xf5ff).map(|d| d.name), Some("iget-object-volatile/jumbo"));
        assert_eq!(lookup(0x0d).map(|d| d.name), Some("move-exception"));
    }

    #[test]
    fn sizes_follow_format_ids() {
        assert_eq!(Format10x.size(), Some(2));
        assert_eq!(Format22cs.size(), Some(4));
        assert_eq!(Format3rms.size(), Some(6));
        assert_eq!(Format40sc.size(), Some(8));
        assert_eq!(Format51l.size(), Some(10));
        assert!(ArrayPayload.is_payload());
    }
}
