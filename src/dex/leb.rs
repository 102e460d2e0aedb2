pub(crate) fn encode_uleb128(value: u32) -> Vec<u8> {
    let mut result = Vec::new();
    let mut remaining = value;

    if remaining == 0 {
        result.push(0);
        return result;
    }

    while remaining != 0 {
        let mut byte = (remaining & 0x7F) as u8;
        remaining >>= 7;

        if remaining != 0 {
            byte |= 0x80;
        }

        result.push(byte);
    }

    result
}

/// Decodes a uleb128 value, returning it with the number of bytes consumed.
/// `None` when the input ends before the terminating byte.
pub(crate) fn decode_uleb128(encoded: &[u8]) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    let mut shift: u32 = 0;

    for (i, &byte) in encoded.iter().enumerate() {
        let low = (byte & 0x7F) as u32;
        if shift < 32 {
            value = value.wrapping_add(low.wrapping_shl(shift));
        }
        shift = shift.saturating_add(7);

        // 32-bit values never need more than 5 bytes
        if (byte & 0x80) == 0 || i == 4 {
            return Some((value, i + 1));
        }
    }

    None
}

pub(crate) fn encode_sleb128(value: i32) -> Vec<u8> {
    let mut result = Vec::new();
    let mut remaining = value;

    loop {
        let mut byte = (remaining & 0x7F) as u8;
        remaining >>= 7;

        let is_more =
            !((remaining == 0 && (byte & 0x40) == 0) || (remaining == -1 && (byte & 0x40) != 0));
        if is_more {
            byte |= 0x80;
        }

        result.push(byte);

        if !is_more {
            break;
        }
    }

    result
}

pub(crate) fn decode_sleb128(encoded: &[u8]) -> Option<(i32, usize)> {
    let mut value: i32 = 0;
    let mut shift: u32 = 0;

    for (i, &byte) in encoded.iter().enumerate() {
        let low = (byte & 0x7F) as i32;
        if shift < 32 {
            value |= low.wrapping_shl(shift);
        }
        shift = shift.saturating_add(7);

        if (byte & 0x80) == 0 || i == 4 {
            // sign-extend unless all 32 bits were filled
            if (byte & 0x40) != 0 && shift < 32 {
                value |= (-1i32).wrapping_shl(shift);
            }
            return Some((value, i + 1));
        }
    }

    None
}

/// uleb128p1 stores `value + 1`, so that NO_INDEX encodes as a single zero byte.
pub(crate) fn encode_uleb128p1(value: Option<u32>) -> Vec<u8> {
    match value {
        Some(v) => encode_uleb128(v.wrapping_add(1)),
        None => encode_uleb128(0),
    }
}

pub(crate) fn decode_uleb128p1(encoded: &[u8]) -> Option<(Option<u32>, usize)> {
    decode_uleb128(encoded).map(|(v, c)| (v.checked_sub(1), c))
}
