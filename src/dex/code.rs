//! code_item and the records hanging off it: try blocks, catch handlers and
//! the debug info state machine.

use log::warn;

use crate::dex::cursor::ByteCursor;
use crate::dex::error::DexError;
use crate::dex::{write_sleb128, write_u1, write_u2, write_u4, write_uleb128, write_uleb128p1, write_x};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTypeAddrPair {
    pub type_idx: u32,
    pub addr: u32,
}

impl EncodedTypeAddrPair {
    pub fn read(cur: &mut ByteCursor) -> Result<EncodedTypeAddrPair, DexError> {
        let type_idx = cur.read_uleb128()?;
        let addr = cur.read_uleb128()?;
        Ok(EncodedTypeAddrPair { type_idx, addr })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        write_uleb128(bytes, self.type_idx) + write_uleb128(bytes, self.addr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryItem {
    pub start_addr: u32,
    pub insn_count: u16,
    /// Offset in bytes from the start of the encoded_catch_handler_list.
    pub handler_off: u16,
}

impl TryItem {
    pub fn read(cur: &mut ByteCursor) -> Result<TryItem, DexError> {
        Ok(TryItem {
            start_addr: cur.read_u32()?,
            insn_count: cur.read_u16()?,
            handler_off: cur.read_u16()?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_u4(bytes, self.start_addr);
        c += write_u2(bytes, self.insn_count);
        c += write_u2(bytes, self.handler_off);
        c
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCatchHandler {
    pub handlers: Vec<EncodedTypeAddrPair>,
    pub catch_all_addr: Option<u32>,
}

impl EncodedCatchHandler {
    pub fn read(cur: &mut ByteCursor) -> Result<EncodedCatchHandler, DexError> {
        let size = cur.read_sleb128()?;
        let count = size.unsigned_abs() as usize;
        let mut pairs = Vec::with_capacity(count.min(cur.remaining_len() / 2));
        for _ in 0..count { pairs.push(EncodedTypeAddrPair::read(cur)?); }
        let catch_all_addr = if size <= 0 { Some(cur.read_uleb128()?) } else { None };
        Ok(EncodedCatchHandler { handlers: pairs, catch_all_addr })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        let size: i32 = if self.catch_all_addr.is_some() { -(self.handlers.len() as i32) } else { self.handlers.len() as i32 };
        c += write_sleb128(bytes, size);
        for p in &self.handlers { c += p.write(bytes); }
        if let Some(addr) = self.catch_all_addr { c += write_uleb128(bytes, addr); }
        c
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeItem
{
    pub registers_size: u16,
    pub ins_size: u16,
    pub outs_size: u16,
    /// Offset of the debug_info_item, 0 when absent.
    pub debug_info_off: u32,
    /// Instruction stream, `insns_size` code units.
    pub insns: Vec<u8>,
    /// Present when there are tries and an odd number of code units.
    pub padding: Option<u16>,
    pub tries: Vec<TryItem>,
    pub handlers: Vec<EncodedCatchHandler>,
}

impl CodeItem
{
    /// Size of the header preceding the instructions.
    pub const INSNS_OFFSET: u32 = 16;

    pub fn read(cur: &mut ByteCursor) -> Result<CodeItem, DexError>
    {
        let code_item_start = cur.position();
        let registers_size = cur.read_u16()?;
        let ins_size = cur.read_u16()?;
        let outs_size = cur.read_u16()?;
        let tries_size = cur.read_u16()?;
        let debug_info_off = cur.read_u32()?;
        let insns_size = cur.read_u32()? as usize;
        let insns = cur.read(insns_size.checked_mul(2).ok_or_else(|| err!(OutOfBounds, "insns_size {} overflows", insns_size))?)?.to_vec();

        let mut padding = None;
        let mut tries = vec![];
        let mut handlers = vec![];

        if tries_size > 0 {
            if (insns_size & 1) != 0 {
                let pad = cur.read_u16()?;
                if pad != 0 {
                    warn!("non-zero code_item padding 0x{:04x} at 0x{:x}", pad, cur.position() - 2);
                }
                padding = Some(pad);
            }
            for _ in 0..tries_size { tries.push(TryItem::read(cur)?); }

            let handlers_size = cur.read_uleb128()? as usize;
            let handlers_base = cur.position();
            for (ti, t) in tries.iter().enumerate() {
                if handlers_base + t.handler_off as usize >= cur.len() {
                    warn!("try #{} handler_off {} points past the end of the buffer", ti, t.handler_off);
                }
            }

            for i in 0..handlers_size {
                let entry_off = cur.position();
                match EncodedCatchHandler::read(cur) {
                    Ok(h) => handlers.push(h),
                    Err(e) => {
                        let ctx = format!(
                            "encoded_catch_handler #{}/{} at 0x{:x} (code_item at 0x{:x})",
                            i + 1, handlers_size, entry_off, code_item_start
                        );
                        return Err(DexError::with_context(e, ctx));
                    }
                }
            }
        }

        Ok(CodeItem { registers_size, ins_size, outs_size, debug_info_off, insns, padding, tries, handlers })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_u2(bytes, self.registers_size);
        c += write_u2(bytes, self.ins_size);
        c += write_u2(bytes, self.outs_size);
        c += write_u2(bytes, self.tries.len() as u16);
        c += write_u4(bytes, self.debug_info_off);
        c += write_u4(bytes, self.insns_size());
        c += write_x(bytes, &self.insns);

        if !self.tries.is_empty() {
            if (self.insns_size() & 1) != 0 {
                c += write_u2(bytes, self.padding.unwrap_or(0));
            }
            for t in &self.tries { c += t.write(bytes); }
            c += write_uleb128(bytes, self.handlers.len() as u32);
            for h in &self.handlers { c += h.write(bytes); }
        }
        c
    }

    /// Number of 16-bit code units.
    pub fn insns_size(&self) -> u32
    {
        (self.insns.len() / 2) as u32
    }
}

const DBG_END_SEQUENCE: u8 = 0x00;
const DBG_ADVANCE_PC: u8 = 0x01;
const DBG_ADVANCE_LINE: u8 = 0x02;
const DBG_START_LOCAL: u8 = 0x03;
const DBG_START_LOCAL_EXTENDED: u8 = 0x04;
const DBG_END_LOCAL: u8 = 0x05;
const DBG_RESTART_LOCAL: u8 = 0x06;
const DBG_SET_PROLOGUE_END: u8 = 0x07;
const DBG_SET_EPILOGUE_BEGIN: u8 = 0x08;
const DBG_SET_FILE: u8 = 0x09;
const DBG_FIRST_SPECIAL: u8 = 0x0a;
const DBG_LINE_BASE: i32 = -4;
const DBG_LINE_RANGE: u8 = 15;

/// One instruction of the debug info state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOp
{
    EndSequence,
    AdvancePc(u32),
    AdvanceLine(i32),
    StartLocal { register_num: u32, name_idx: Option<u32>, type_idx: Option<u32> },
    StartLocalExtended { register_num: u32, name_idx: Option<u32>, type_idx: Option<u32>, sig_idx: Option<u32> },
    EndLocal(u32),
    RestartLocal(u32),
    SetPrologueEnd,
    SetEpilogueBegin,
    SetFile(Option<u32>),
    /// Advances both address and line, then emits a position entry.
    Special(u8),
}

impl DebugOp
{
    fn read(cur: &mut ByteCursor) -> Result<DebugOp, DexError>
    {
        let op = cur.read_u8()?;
        Ok(match op {
            DBG_END_SEQUENCE => DebugOp::EndSequence,
            DBG_ADVANCE_PC => DebugOp::AdvancePc(cur.read_uleb128()?),
            DBG_ADVANCE_LINE => DebugOp::AdvanceLine(cur.read_sleb128()?),
            DBG_START_LOCAL => DebugOp::StartLocal {
                register_num: cur.read_uleb128()?,
                name_idx: cur.read_uleb128p1()?,
                type_idx: cur.read_uleb128p1()?,
            },
            DBG_START_LOCAL_EXTENDED => DebugOp::StartLocalExtended {
                register_num: cur.read_uleb128()?,
                name_idx: cur.read_uleb128p1()?,
                type_idx: cur.read_uleb128p1()?,
                sig_idx: cur.read_uleb128p1()?,
            },
            DBG_END_LOCAL => DebugOp::EndLocal(cur.read_uleb128()?),
            DBG_RESTART_LOCAL => DebugOp::RestartLocal(cur.read_uleb128()?),
            DBG_SET_PROLOGUE_END => DebugOp::SetPrologueEnd,
            DBG_SET_EPILOGUE_BEGIN => DebugOp::SetEpilogueBegin,
            DBG_SET_FILE => DebugOp::SetFile(cur.read_uleb128p1()?),
            special => DebugOp::Special(special),
        })
    }

    fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        match self {
            DebugOp::EndSequence => write_u1(bytes, DBG_END_SEQUENCE),
            DebugOp::AdvancePc(d) => write_u1(bytes, DBG_ADVANCE_PC) + write_uleb128(bytes, *d),
            DebugOp::AdvanceLine(d) => write_u1(bytes, DBG_ADVANCE_LINE) + write_sleb128(bytes, *d),
            DebugOp::StartLocal { register_num, name_idx, type_idx } => {
                write_u1(bytes, DBG_START_LOCAL)
                    + write_uleb128(bytes, *register_num)
                    + write_uleb128p1(bytes, *name_idx)
                    + write_uleb128p1(bytes, *type_idx)
            }
            DebugOp::StartLocalExtended { register_num, name_idx, type_idx, sig_idx } => {
                write_u1(bytes, DBG_START_LOCAL_EXTENDED)
                    + write_uleb128(bytes, *register_num)
                    + write_uleb128p1(bytes, *name_idx)
                    + write_uleb128p1(bytes, *type_idx)
                    + write_uleb128p1(bytes, *sig_idx)
            }
            DebugOp::EndLocal(r) => write_u1(bytes, DBG_END_LOCAL) + write_uleb128(bytes, *r),
            DebugOp::RestartLocal(r) => write_u1(bytes, DBG_RESTART_LOCAL) + write_uleb128(bytes, *r),
            DebugOp::SetPrologueEnd => write_u1(bytes, DBG_SET_PROLOGUE_END),
            DebugOp::SetEpilogueBegin => write_u1(bytes, DBG_SET_EPILOGUE_BEGIN),
            DebugOp::SetFile(idx) => write_u1(bytes, DBG_SET_FILE) + write_uleb128p1(bytes, *idx),
            DebugOp::Special(op) => write_u1(bytes, *op),
        }
    }
}

/// debug_info_item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfoItem
{
    pub line_start: u32,
    pub parameter_names: Vec<Option<u32>>,
    /// State machine bytecode, ending with `EndSequence`.
    pub ops: Vec<DebugOp>,
}

impl DebugInfoItem
{
    pub fn read(cur: &mut ByteCursor) -> Result<DebugInfoItem, DexError>
    {
        let line_start = cur.read_uleb128()?;
        let parameters_size = cur.read_uleb128()? as usize;
        let mut parameter_names = Vec::with_capacity(parameters_size.min(cur.remaining_len()));
        for _ in 0..parameters_size {
            parameter_names.push(cur.read_uleb128p1()?);
        }

        let mut ops = vec![];
        loop {
            let op = DebugOp::read(cur)?;
            let done = op == DebugOp::EndSequence;
            ops.push(op);
            if done { break; }
        }

        Ok(DebugInfoItem { line_start, parameter_names, ops })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_uleb128(bytes, self.line_start);
        c += write_uleb128(bytes, self.parameter_names.len() as u32);
        for p in &self.parameter_names {
            c += write_uleb128p1(bytes, *p);
        }
        for op in &self.ops {
            c += op.write(bytes);
        }
        c
    }

    /// Runs the state machine and returns the `(address, line)` position entries.
    /// Addresses are in code units.
    pub fn positions(&self) -> Vec<(u32, u32)>
    {
        let mut address = 0u32;
        let mut line = self.line_start as i64;
        let mut out = vec![];
        for op in &self.ops {
            match op {
                DebugOp::AdvancePc(d) => address = address.wrapping_add(*d),
                DebugOp::AdvanceLine(d) => line += *d as i64,
                DebugOp::Special(op) => {
                    let adjusted = op.saturating_sub(DBG_FIRST_SPECIAL);
                    line += (DBG_LINE_BASE + (adjusted % DBG_LINE_RANGE) as i32) as i64;
                    address = address.wrapping_add((adjusted / DBG_LINE_RANGE) as u32);
                    out.push((address, line.max(0) as u32));
                }
                DebugOp::EndSequence => break,
                _ => {}
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_item_roundtrip() {
        let t = TryItem { start_addr: 0x12345678, insn_count: 0x0102, handler_off: 0x2030 };
        let mut bytes = vec![];
        assert_eq!(t.write(&mut bytes), 8);
        let mut cur = ByteCursor::new(&bytes);
        assert_eq!(TryItem::read(&mut cur).expect("TryItem read failed"), t);
        assert_eq!(cur.remaining_len(), 0);
    }

    #[test]
    fn test_encoded_catch_handler_roundtrip() {
        for catch_all_addr in [None, Some(0x1234)] {
            let h = EncodedCatchHandler {
                handlers: vec![
                    EncodedTypeAddrPair { type_idx: 3, addr: 0x100 },
                    EncodedTypeAddrPair { type_idx: 7, addr: 0x2222 },
                ],
                catch_all_addr,
            };
            let mut bytes = vec![];
            h.write(&mut bytes);
            let mut cur = ByteCursor::new(&bytes);
            assert_eq!(EncodedCatchHandler::read(&mut cur).unwrap(), h);
            assert_eq!(cur.remaining_len(), 0);
        }
    }

    #[test]
    fn test_catch_all_only_handler() {
        // size 0 carries just a catch-all address
        let bytes = [0x00, 0x10];
        let h = EncodedCatchHandler::read(&mut ByteCursor::new(&bytes)).unwrap();
        assert_eq!(h.catch_all_addr, Some(0x10));
        assert!(h.handlers.is_empty());
        let mut out = vec![];
        h.write(&mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn test_code_item_with_tries_roundtrip() {
        let code = CodeItem {
            registers_size: 2,
            ins_size: 1,
            outs_size: 0,
            debug_info_off: 0x300,
            insns: vec![0x12, 0x00, 0x0f, 0x00, 0x0e, 0x00],
            padding: Some(0),
            tries: vec![TryItem { start_addr: 0, insn_count: 2, handler_off: 1 }],
            handlers: vec![EncodedCatchHandler {
                handlers: vec![EncodedTypeAddrPair { type_idx: 1, addr: 2 }],
                catch_all_addr: None,
            }],
        };
        let mut bytes = vec![];
        let n = code.write(&mut bytes);
        assert_eq!(n, bytes.len());
        assert_eq!(&bytes[12..16], &[3, 0, 0, 0]);
        let mut cur = ByteCursor::new(&bytes);
        let back = CodeItem::read(&mut cur).unwrap();
        assert_eq!(back, code);
        assert_eq!(cur.remaining_len(), 0);
        assert_eq!(back.insns_size(), 3);
    }

    #[test]
    fn test_code_item_truncated_insns() {
        let bytes = [1, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0x0e, 0x00];
        let e = CodeItem::read(&mut ByteCursor::new(&bytes)).unwrap_err();
        assert_eq!(e.kind(), crate::dex::DexErrorKind::OutOfBounds);
    }

    #[test]
    fn test_debug_info_roundtrip_and_positions() {
        let info = DebugInfoItem {
            line_start: 10,
            parameter_names: vec![Some(4), None],
            ops: vec![
                DebugOp::SetPrologueEnd,
                DebugOp::Special(0x0e), // line +0, address +0
                DebugOp::StartLocal { register_num: 1, name_idx: Some(5), type_idx: None },
                DebugOp::AdvancePc(3),
                DebugOp::Special(0x0a + 15 + 5), // line +1, address +1
                DebugOp::AdvanceLine(-2),
                DebugOp::SetFile(None),
                DebugOp::EndSequence,
            ],
        };
        let mut bytes = vec![];
        info.write(&mut bytes);
        let mut cur = ByteCursor::new(&bytes);
        assert_eq!(DebugInfoItem::read(&mut cur).unwrap(), info);
        assert_eq!(cur.remaining_len(), 0);
        assert_eq!(info.positions(), vec![(0, 10), (4, 11)]);
    }
}
