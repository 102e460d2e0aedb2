//! Resolution of instruction reference operands.

use std::fmt;

use once_cell::sync::Lazy;
use rangemap::RangeInclusiveMap;
use serde::Serialize;

use crate::dex::class_manager::ClassManager;
use crate::dex::error::DexError;
use crate::dex::opcodes::Kind;

/// A method the VM may substitute with an intrinsic in optimized code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InlineMethod {
    pub class: &'static str,
    pub name: &'static str,
    pub descriptor: &'static str,
}

const fn inline(class: &'static str, name: &'static str, descriptor: &'static str) -> InlineMethod {
    InlineMethod { class, name, descriptor }
}

const NATIVE_TEST: &str = "Lorg/apache/harmony/dalvik/NativeTestTarget;";
const STRING: &str = "Ljava/lang/String;";
const MATH: &str = "Ljava/lang/Math;";

// odex 035
static LEGACY_INLINE_METHODS: [InlineMethod; 14] = [
    inline(NATIVE_TEST, "emptyInlineMethod", "()V"),
    inline(STRING, "charAt", "(I)C"),
    inline(STRING, "compareTo", "(Ljava/lang/String;)I"),
    inline(STRING, "equals", "(Ljava/lang/Object;)Z"),
    inline(STRING, "length", "()I"),
    inline(MATH, "abs", "(I)I"),
    inline(MATH, "abs", "(J)J"),
    inline(MATH, "abs", "(F)F"),
    inline(MATH, "abs", "(D)D"),
    inline(MATH, "min", "(II)I"),
    inline(MATH, "max", "(II)I"),
    inline(MATH, "sqrt", "(D)D"),
    inline(MATH, "cos", "(D)D"),
    inline(MATH, "sin", "(D)D"),
];

// odex 036
static INLINE_METHODS: [InlineMethod; 22] = [
    inline(NATIVE_TEST, "emptyInlineMethod", "()V"),
    inline(STRING, "charAt", "(I)C"),
    inline(STRING, "compareTo", "(Ljava/lang/String;)I"),
    inline(STRING, "equals", "(Ljava/lang/Object;)Z"),
    inline(STRING, "fastIndexOf", "(II)I"),
    inline(STRING, "isEmpty", "()Z"),
    inline(STRING, "length", "()I"),
    inline(MATH, "abs", "(I)I"),
    inline(MATH, "abs", "(J)J"),
    inline(MATH, "abs", "(F)F"),
    inline(MATH, "abs", "(D)D"),
    inline(MATH, "min", "(II)I"),
    inline(MATH, "max", "(II)I"),
    inline(MATH, "sqrt", "(D)D"),
    inline(MATH, "cos", "(D)D"),
    inline(MATH, "sin", "(D)D"),
    inline("Ljava/lang/Float;", "floatToIntBits", "(F)I"),
    inline("Ljava/lang/Float;", "floatToRawIntBits", "(F)I"),
    inline("Ljava/lang/Float;", "intBitsToFloat", "(I)F"),
    inline("Ljava/lang/Double;", "doubleToLongBits", "(D)J"),
    inline("Ljava/lang/Double;", "doubleToRawLongBits", "(D)J"),
    inline("Ljava/lang/Double;", "longBitsToDouble", "(J)D"),
];

/// Inline tables keyed by platform API level.
static INLINE_TABLES: Lazy<RangeInclusiveMap<u32, &'static [InlineMethod]>> = Lazy::new(|| {
    let mut tables = RangeInclusiveMap::new();
    tables.insert(0..=13, &LEGACY_INLINE_METHODS[..]);
    tables.insert(14..=u16::MAX as u32, &INLINE_METHODS[..]);
    tables
});

/// The inline method table in effect for `api_level`.
pub fn inline_methods(api_level: u32) -> &'static [InlineMethod] {
    INLINE_TABLES.get(&api_level).copied().unwrap_or(&INLINE_METHODS[..])
}

/// What a reference operand designates once looked up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ResolvedRef {
    Method { class: String, name: String, descriptor: String },
    String(String),
    RawString(String),
    Field { class: String, name: String, type_desc: String },
    Type(String),
    VtableOffset(u32),
    FieldOffset(u32),
    InlineMethod { index: u32, target: Option<InlineMethod> },
    Varies(u32),
}

impl fmt::Display for ResolvedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedRef::Method { class, name, descriptor } => write!(f, "{}->{}{}", class, name, descriptor),
            ResolvedRef::String(s) => write!(f, "\"{}\"", escape_string(s)),
            ResolvedRef::RawString(s) => f.write_str(s),
            ResolvedRef::Field { class, name, type_desc } => write!(f, "{}->{} {}", class, name, type_desc),
            ResolvedRef::Type(t) => f.write_str(t),
            ResolvedRef::VtableOffset(v) => write!(f, "vtable[0x{:x}]", v),
            ResolvedRef::FieldOffset(v) => write!(f, "field[0x{:x}]", v),
            ResolvedRef::InlineMethod { index, target: Some(m) } => {
                write!(f, "inline[0x{:x}] {}->{}{}", index, m.class, m.name, m.descriptor)
            }
            ResolvedRef::InlineMethod { index, target: None } => write!(f, "inline[0x{:x}]", index),
            ResolvedRef::Varies(v) => write!(f, "ref[0x{:x}]", v),
        }
    }
}

/// Escapes a string for display between double quotes.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || (0x7f..=0x9f).contains(&(c as u32)) => {
                out.push_str(&format!("\\u{:04x}", c as u32))
            }
            c => out.push(c),
        }
    }
    out
}

/// Resolves the raw reference value of an instruction of the given kind.
///
/// Identical inputs against the same class manager always yield identical results;
/// name tables are populated once and then only read.
pub fn resolve(cm: &ClassManager, kind: Kind, raw: u32) -> Result<ResolvedRef, DexError> {
    Ok(match kind {
        Kind::Method => {
            let m = cm.get_method_ref(raw)?;
            ResolvedRef::Method {
                class: m.class.clone(),
                name: m.name.clone(),
                descriptor: m.descriptor.clone(),
            }
        }
        Kind::String => ResolvedRef::String(cm.get_string(raw)?.to_string()),
        Kind::RawString => ResolvedRef::RawString(cm.get_string(raw)?.to_string()),
        Kind::Field => {
            let field = cm.get_field(raw)?;
            ResolvedRef::Field {
                class: field.class.clone(),
                name: field.name.clone(),
                type_desc: field.type_desc.clone(),
            }
        }
        Kind::Type => ResolvedRef::Type(cm.get_type(raw)?.to_string()),
        Kind::VtableOffset => ResolvedRef::VtableOffset(raw),
        Kind::FieldOffset => ResolvedRef::FieldOffset(raw),
        Kind::InlineMethod => ResolvedRef::InlineMethod {
            index: raw,
            target: inline_methods(cm.api_level()).get(raw as usize).copied(),
        },
        Kind::Varies => ResolvedRef::Varies(raw),
        Kind::None => fail!(InvalidInstruction, "instruction has no reference operand (raw 0x{:x})", raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_tables_by_api_level() {
        assert_eq!(inline_methods(8).len(), 14);
        assert_eq!(inline_methods(13)[4].name, "length");
        assert_eq!(inline_methods(14).len(), 22);
        assert_eq!(inline_methods(33)[4].name, "fastIndexOf");
        assert_eq!(inline_methods(u32::MAX)[21].name, "longBitsToDouble");
    }

    #[test]
    fn display_forms() {
        let m = ResolvedRef::Method {
            class: "LFoo;".to_string(),
            name: "run".to_string(),
            descriptor: "()V".to_string(),
        };
        assert_eq!(m.to_string(), "LFoo;->run()V");
        let f = ResolvedRef::Field {
            class: "LFoo;".to_string(),
            name: "count".to_string(),
            type_desc: "I".to_string(),
        };
        assert_eq!(f.to_string(), "LFoo;->count I");
        assert_eq!(ResolvedRef::String("a\"b\n".to_string()).to_string(), "\"a\\\"b\\n\"");
        assert_eq!(ResolvedRef::RawString("a\"b".to_string()).to_string(), "a\"b");
        assert_eq!(ResolvedRef::VtableOffset(0x1c).to_string(), "vtable[0x1c]");
        assert_eq!(ResolvedRef::FieldOffset(8).to_string(), "field[0x8]");
        assert_eq!(ResolvedRef::Varies(3).to_string(), "ref[0x3]");
        let target = inline_methods(20).get(1).copied();
        assert_eq!(
            ResolvedRef::InlineMethod { index: 1, target }.to_string(),
            "inline[0x1] Ljava/lang/String;->charAt(I)C"
        );
        assert_eq!(ResolvedRef::InlineMethod { index: 0x40, target: None }.to_string(), "inline[0x40]");
    }

    #[test]
    fn escapes_control_characters() {
        assert_eq!(escape_string("tab\there"), "tab\\there");
        assert_eq!(escape_string("\u{1}"), "\\u0001");
        assert_eq!(escape_string("caf\u{e9}"), "caf\u{e9}");
    }
}
