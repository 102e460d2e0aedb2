//! Linear-sweep disassembly of a method's instruction stream.

use std::borrow::Cow;
use std::slice;

use log::{debug, warn};

use crate::dex::class_manager::ClassManager;
use crate::dex::dex_file::DexOptions;
use crate::dex::instructions::{decode_classical, decode_extended, decode_optimized, decode_payload, Instruction};
use crate::dex::opcodes::{self, is_payload_ident};

/// Forward-only decoder over `insns[..bound]`.
///
/// A `0x00`/`0xff` opcode byte with at least two code units left is looked
/// at as a 16-bit value first: payload identifiers, then jumbo opcodes, then
/// (in odex mode) optimized opcodes win over the one-byte decoding.
#[derive(Debug, Clone)]
pub struct LinearSweep<'a>
{
    insns: &'a [u8],
    idx: usize,
    bound: usize,
    odex: bool,
}

impl<'a> LinearSweep<'a>
{
    pub fn new(insns: &'a [u8], insns_size: u32, odex: bool) -> LinearSweep<'a>
    {
        let bound = (insns_size as usize).saturating_mul(2).min(insns.len());
        LinearSweep { insns, idx: 0, bound, odex }
    }

    /// Byte index of the next instruction.
    pub fn position(&self) -> usize
    {
        self.idx
    }

    fn decode_at(&self, idx: usize) -> Instruction
    {
        let slice = &self.insns[idx..self.bound];
        let op = slice[0];

        if (op == 0x00 || op == 0xff) && idx + 4 <= self.bound
        {
            let op16 = u16::from_le_bytes([slice[0], slice[1]]);
            if is_payload_ident(op16)
            {
                return decode_payload(op16, slice);
            }
            if opcodes::extended(op16).is_some()
            {
                return decode_extended(op16, slice);
            }
            if self.odex && opcodes::optimized(op16).is_some()
            {
                return decode_optimized(op16, slice);
            }
        }

        if !self.odex && opcodes::classical(op).map_or(false, |def| def.odex_only())
        {
            warn!("odex-only opcode 0x{:02x} at byte 0x{:x} outside odex mode", op, idx);
        }
        decode_classical(op, slice)
    }
}

impl<'a> Iterator for LinearSweep<'a>
{
    type Item = Instruction;

    fn next(&mut self) -> Option<Instruction>
    {
        if self.idx >= self.bound
        {
            return None;
        }
        let ins = self.decode_at(self.idx);
        self.idx += ins.length().max(2);
        Some(ins)
    }
}

/// Where a method's instructions currently come from.
#[derive(Debug, Clone, PartialEq)]
pub enum InstructionCache
{
    Uncached,
    /// Number of full traversals served by sweeping so far.
    Warming(u32),
    Cached(Vec<Instruction>),
}

/// Instructions of one traversal, either freshly swept or borrowed from the cache.
pub enum Instructions<'c>
{
    /// `traversals` is bumped once the sweep runs to its end.
    Sweep { sweep: LinearSweep<'c>, traversals: Option<&'c mut u32> },
    Cached(slice::Iter<'c, Instruction>),
}

impl<'c> Iterator for Instructions<'c>
{
    type Item = Cow<'c, Instruction>;

    fn next(&mut self) -> Option<Self::Item>
    {
        match self
        {
            Instructions::Sweep { sweep, traversals } => match sweep.next()
            {
                Some(ins) => Some(Cow::Owned(ins)),
                None =>
                {
                    if let Some(n) = traversals.take()
                    {
                        *n = n.saturating_add(1);
                    }
                    None
                }
            },
            Instructions::Cached(iter) => iter.next().map(Cow::Borrowed),
        }
    }
}

/// A method's code: instruction bytes, start address and the class manager
/// used to resolve operands.
#[derive(Debug)]
pub struct DCode<'a>
{
    cm: &'a ClassManager,
    insns: &'a [u8],
    start: u32,
    insns_size: u32,
    odex: bool,
    warm_threshold: u32,
    cache_size_threshold: u32,
    cache: InstructionCache,
}

impl<'a> DCode<'a>
{
    pub fn new(cm: &'a ClassManager, insns: &'a [u8], start: u32, insns_size: u32, options: &DexOptions) -> DCode<'a>
    {
        DCode {
            cm,
            insns,
            start,
            insns_size,
            odex: options.odex,
            warm_threshold: options.warm_threshold,
            cache_size_threshold: options.cache_size_threshold,
            cache: InstructionCache::Uncached,
        }
    }

    fn sweep(&self) -> LinearSweep<'a>
    {
        LinearSweep::new(self.insns, self.insns_size, self.odex)
    }

    /// One traversal of the method.
    ///
    /// Only traversals that run to the end are counted. Once the count
    /// reaches `warm_threshold`, or a large method has been traversed once,
    /// the following call materializes the list and every later call is
    /// served from it.
    pub fn instructions(&mut self) -> Instructions<'_>
    {
        let traversals = match self.cache
        {
            InstructionCache::Cached(_) => None,
            InstructionCache::Warming(n) => Some(n),
            InstructionCache::Uncached => Some(0),
        };
        if let Some(n) = traversals
        {
            let large = self.insns_size > self.cache_size_threshold;
            if n >= self.warm_threshold || (large && n > 0)
            {
                let list: Vec<Instruction> = self.sweep().collect();
                debug!("caching {} instructions of code at 0x{:x} after {} traversals", list.len(), self.start, n);
                self.cache = InstructionCache::Cached(list);
            }
            else if n == 0
            {
                self.cache = InstructionCache::Warming(0);
            }
        }

        let sweep = self.sweep();
        match &mut self.cache
        {
            InstructionCache::Cached(list) => Instructions::Cached(list.iter()),
            InstructionCache::Warming(n) => Instructions::Sweep { sweep, traversals: Some(n) },
            InstructionCache::Uncached => Instructions::Sweep { sweep, traversals: None },
        }
    }

    /// Index of the instruction starting exactly at byte offset `off`.
    pub fn offset_to_index(&mut self, off: usize) -> Option<usize>
    {
        let mut pos = 0;
        for (i, ins) in self.instructions().enumerate()
        {
            if pos == off
            {
                return Some(i);
            }
            if pos > off
            {
                break;
            }
            pos += ins.length();
        }
        None
    }

    /// The instruction starting exactly at byte offset `off`.
    pub fn instruction_at_offset(&mut self, off: usize) -> Option<Instruction>
    {
        let mut pos = 0;
        for ins in self.instructions()
        {
            if pos == off
            {
                return Some(ins.into_owned());
            }
            if pos > off
            {
                break;
            }
            pos += ins.length();
        }
        None
    }

    /// A text listing, one `offset: name operands` line per instruction.
    pub fn listing(&mut self) -> String
    {
        let cm = self.cm;
        let mut out = String::new();
        let mut pos = 0;
        for ins in self.instructions()
        {
            let operands = ins.output(cm);
            if operands.is_empty()
            {
                out.push_str(&format!("{:04x}: {}\n", pos, ins.name()));
            }
            else
            {
                out.push_str(&format!("{:04x}: {} {}\n", pos, ins.name(), operands));
            }
            pos += ins.length();
        }
        out
    }

    pub fn class_manager(&self) -> &'a ClassManager
    {
        self.cm
    }

    pub fn insns(&self) -> &'a [u8]
    {
        self.insns
    }

    /// File offset of the first instruction.
    pub fn get_start(&self) -> u32
    {
        self.start
    }

    /// Length in 16-bit code units.
    pub fn get_insns_size(&self) -> u32
    {
        self.insns_size
    }

    pub fn get_length(&self) -> usize
    {
        self.insns_size as usize * 2
    }

    pub fn cache(&self) -> &InstructionCache
    {
        &self.cache
    }

    pub fn is_cached(&self) -> bool
    {
        matches!(self.cache, InstructionCache::Cached(_))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::dex::map::MapList;

    fn empty_cm() -> ClassManager
    {
        ClassManager::new(MapList::default(), 33).unwrap()
    }

    fn names(insns: &[u8], odex: bool) -> Vec<&'static str>
    {
        LinearSweep::new(insns, (insns.len() / 2) as u32, odex).map(|i| i.name()).collect()
    }

    #[test]
    fn sweeps_classical_stream()
    {
        // const/4 v0, 1; return v0
        assert_eq!(names(&[0x12, 0x10, 0x0f, 0x00], false), vec!["const/4", "return"]);
    }

    #[test]
    fn payload_is_preferred_over_nop()
    {
        let insns = [0x00, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00];
        let all: Vec<Instruction> = LinearSweep::new(&insns, 6, false).collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name(), "packed-switch-payload");
        assert_eq!(all[0].length(), 12);
    }

    #[test]
    fn trailing_nop_without_lookahead_is_classical()
    {
        // return-void; nop (only one code unit left, no 16-bit lookahead)
        assert_eq!(names(&[0x0e, 0x00, 0x00, 0x01], false), vec!["return-void", "nop"]);
    }

    #[test]
    fn jumbo_opcode_is_extended()
    {
        // const-class/jumbo v1, type@2
        let insns = [0xff, 0x00, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00];
        assert_eq!(names(&insns, false), vec!["const-class/jumbo"]);
    }

    #[test]
    fn optimized_page_only_in_odex_mode()
    {
        let insns = [0xff, 0xf2, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(names(&insns, true)[0], "invoke-object-init/jumbo");
        assert_eq!(names(&insns, false)[0], crate::dex::instructions::INVALID_INSTRUCTION_NAME);
    }

    #[test]
    fn unlisted_optimized_value_falls_back_to_classical()
    {
        // nop whose high byte lands past the optimized table; return-void
        let insns = [0x00, 0xf3, 0x0e, 0x00];
        assert_eq!(names(&insns, true), vec!["nop", "return-void"]);
        assert_eq!(names(&insns, false), vec!["nop", "return-void"]);
    }

    #[test]
    fn bound_is_the_smaller_of_size_and_buffer()
    {
        let insns = [0x0e, 0x00, 0x0e, 0x00];
        assert_eq!(LinearSweep::new(&insns, 1, false).count(), 1);
        assert_eq!(LinearSweep::new(&insns, 100, false).count(), 2);
    }

    #[test]
    fn cache_promotion_after_warm_threshold()
    {
        let cm = empty_cm();
        let insns = [0x12, 0x10, 0x0f, 0x00];
        let options = DexOptions { warm_threshold: 3, ..DexOptions::default() };
        let mut code = DCode::new(&cm, &insns, 0x100, 2, &options);
        let cold: Vec<Instruction> = code.instructions().map(|i| i.into_owned()).collect();
        assert_eq!(code.cache(), &InstructionCache::Warming(1));
        code.instructions().count();
        code.instructions().count();
        assert_eq!(code.cache(), &InstructionCache::Warming(3));
        let warm: Vec<Instruction> = code.instructions().map(|i| i.into_owned()).collect();
        assert!(code.is_cached());
        assert_eq!(cold, warm);
        assert!(matches!(code.instructions(), Instructions::Cached(_)));
    }

    #[test]
    fn partial_traversals_are_not_counted()
    {
        let cm = empty_cm();
        // const/16 v0, 5; return v0
        let insns = [0x13, 0x00, 0x05, 0x00, 0x0f, 0x00];
        let options = DexOptions { warm_threshold: 1, ..DexOptions::default() };
        let mut code = DCode::new(&cm, &insns, 0, 3, &options);
        assert_eq!(code.offset_to_index(0), Some(0));
        assert_eq!(code.instructions().next().map(|i| i.name()), Some("const/16"));
        assert_eq!(code.cache(), &InstructionCache::Warming(0));
        assert_eq!(code.instructions().count(), 2);
        assert_eq!(code.cache(), &InstructionCache::Warming(1));
        assert_eq!(code.instruction_at_offset(4).map(|i| i.name()), Some("return"));
        assert!(code.is_cached());
    }

    #[test]
    fn large_methods_are_cached_after_one_traversal()
    {
        let cm = empty_cm();
        let insns = [0x00u8; 8];
        let options = DexOptions { cache_size_threshold: 2, ..DexOptions::default() };
        let mut code = DCode::new(&cm, &insns, 0, 4, &options);
        assert_eq!(code.instructions().count(), 4);
        assert!(!code.is_cached());
        assert_eq!(code.instructions().count(), 4);
        assert!(code.is_cached());
    }

    #[test]
    fn offsets_map_to_instruction_boundaries()
    {
        let cm = empty_cm();
        // const/16 v0, 5; return v0
        let insns = [0x13, 0x00, 0x05, 0x00, 0x0f, 0x00];
        let mut code = DCode::new(&cm, &insns, 0, 3, &DexOptions::default());
        assert_eq!(code.offset_to_index(0), Some(0));
        assert_eq!(code.offset_to_index(4), Some(1));
        assert_eq!(code.offset_to_index(2), None);
        assert_eq!(code.offset_to_index(6), None);
        assert_eq!(code.instruction_at_offset(4).map(|i| i.name()), Some("return"));
    }

    #[test]
    fn listing_lines()
    {
        let cm = empty_cm();
        let insns = [0x12, 0x10, 0x0f, 0x00];
        let mut code = DCode::new(&cm, &insns, 0, 2, &DexOptions::default());
        assert_eq!(code.listing(), "0000: const/4 v0, 1\n0002: return v0\n");
    }
}
