//! Bounds-checked reading over an immutable byte buffer.

use crate::dex::error::DexError;
use crate::dex::leb::{decode_sleb128, decode_uleb128, decode_uleb128p1};

/// A read position over a borrowed buffer.
///
/// The position is always within `[0, len]`. Every read that would pass the end
/// of the buffer fails with `OutOfBounds` and leaves the position untouched.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a>
{
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a>
{
    pub fn new(bytes: &'a [u8]) -> Self
    {
        ByteCursor { bytes, pos: 0 }
    }

    pub fn at(bytes: &'a [u8], pos: usize) -> Result<Self, DexError>
    {
        let mut cur = ByteCursor::new(bytes);
        cur.seek(pos)?;
        Ok(cur)
    }

    pub fn position(&self) -> usize
    {
        self.pos
    }

    pub fn len(&self) -> usize
    {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.bytes.is_empty()
    }

    pub fn remaining_len(&self) -> usize
    {
        self.bytes.len() - self.pos
    }

    pub fn seek(&mut self, pos: usize) -> Result<(), DexError>
    {
        if pos > self.bytes.len()
        {
            fail!(OutOfBounds, "seek to 0x{:x} past end of buffer (0x{:x})", pos, self.bytes.len());
        }
        self.pos = pos;
        Ok(())
    }

    pub fn read(&mut self, n: usize) -> Result<&'a [u8], DexError>
    {
        if n > self.remaining_len()
        {
            fail!(OutOfBounds, "read of {} bytes at 0x{:x} with {} remaining", n, self.pos, self.remaining_len());
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Advances to the next multiple of `n` relative to the start of the buffer.
    pub fn align(&mut self, n: usize) -> Result<(), DexError>
    {
        let rem = self.pos % n;
        if rem != 0
        {
            self.seek(self.pos + (n - rem))?;
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, DexError>
    {
        Ok(self.read(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, DexError>
    {
        let b = self.read(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, DexError>
    {
        let b = self.read(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, DexError>
    {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64, DexError>
    {
        let lo = self.read_u32()? as u64;
        let hi = self.read_u32()? as u64;
        Ok((hi << 32) | lo)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DexError>
    {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(N)?);
        Ok(out)
    }

    pub fn read_uleb128(&mut self) -> Result<u32, DexError>
    {
        match decode_uleb128(&self.bytes[self.pos..])
        {
            Some((v, used)) => {
                self.pos += used;
                Ok(v)
            }
            None => Err(err!(OutOfBounds, "unterminated uleb128 at 0x{:x}", self.pos)),
        }
    }

    pub fn read_sleb128(&mut self) -> Result<i32, DexError>
    {
        match decode_sleb128(&self.bytes[self.pos..])
        {
            Some((v, used)) => {
                self.pos += used;
                Ok(v)
            }
            None => Err(err!(OutOfBounds, "unterminated sleb128 at 0x{:x}", self.pos)),
        }
    }

    /// Reads a uleb128p1, mapping the encoded NO_INDEX to `None`.
    pub fn read_uleb128p1(&mut self) -> Result<Option<u32>, DexError>
    {
        match decode_uleb128p1(&self.bytes[self.pos..])
        {
            Some((v, used)) => {
                self.pos += used;
                Ok(v)
            }
            None => Err(err!(OutOfBounds, "unterminated uleb128p1 at 0x{:x}", self.pos)),
        }
    }

    /// Reads bytes up to and including a zero terminator, returning them without it.
    pub fn read_until_nul(&mut self) -> Result<&'a [u8], DexError>
    {
        let rest = &self.bytes[self.pos..];
        match rest.iter().position(|&b| b == 0)
        {
            Some(end) => {
                self.pos += end + 1;
                Ok(&rest[..end])
            }
            None => Err(err!(OutOfBounds, "unterminated string data at 0x{:x}", self.pos)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::error::DexErrorKind;

    #[test]
    fn reads_little_endian_scalars() {
        let bytes = [0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xff];
        let mut cur = ByteCursor::new(&bytes);
        assert_eq!(cur.read_u16().unwrap(), 0x1234);
        assert_eq!(cur.read_u32().unwrap(), 0x12345678);
        assert_eq!(cur.position(), 6);
        assert_eq!(cur.remaining_len(), 1);
        assert_eq!(cur.read_u8().unwrap(), 0xff);
        assert_eq!(cur.remaining_len(), 0);
    }

    #[test]
    fn read_past_end_is_rejected() {
        let bytes = [1u8, 2, 3];
        let mut cur = ByteCursor::new(&bytes);
        cur.seek(1).unwrap();
        let e = cur.read(3).unwrap_err();
        assert_eq!(e.kind(), DexErrorKind::OutOfBounds);
        // position is unchanged and the exact remainder is still readable
        assert_eq!(cur.position(), 1);
        assert_eq!(cur.read(2).unwrap(), &[2, 3]);
        assert!(cur.read_u8().is_err());
    }

    #[test]
    fn seek_is_bounded_by_length() {
        let bytes = [0u8; 4];
        let mut cur = ByteCursor::new(&bytes);
        assert!(cur.seek(4).is_ok());
        assert_eq!(cur.seek(5).unwrap_err().kind(), DexErrorKind::OutOfBounds);
        assert_eq!(cur.position(), 4);
    }

    #[test]
    fn align_moves_to_word_boundary() {
        let bytes = [0u8; 8];
        let mut cur = ByteCursor::at(&bytes, 5).unwrap();
        cur.align(4).unwrap();
        assert_eq!(cur.position(), 8);
        cur.align(4).unwrap();
        assert_eq!(cur.position(), 8);
    }

    #[test]
    fn leb_reads_advance_and_check_bounds() {
        let bytes = [0xE5, 0x8E, 0x26, 0x7F, 0x00, 0x80];
        let mut cur = ByteCursor::new(&bytes);
        assert_eq!(cur.read_uleb128().unwrap(), 624485);
        assert_eq!(cur.read_sleb128().unwrap(), -1);
        assert_eq!(cur.read_uleb128p1().unwrap(), None);
        assert_eq!(cur.read_uleb128().unwrap_err().kind(), DexErrorKind::OutOfBounds);
        assert_eq!(cur.position(), 5);
    }

    #[test]
    fn nul_terminated_strings() {
        let bytes = b"abc\0de";
        let mut cur = ByteCursor::new(bytes);
        assert_eq!(cur.read_until_nul().unwrap(), b"abc");
        assert_eq!(cur.position(), 4);
        assert!(cur.read_until_nul().is_err());
    }
}
