//! Prefix integer codec (RFC 7541 Section 5.1).

use crate::error::HpackError;

/// Prefix width of an indexed header field (`1xxxxxxx`).
pub const INDEXED_PREFIX_BITS: u8 = 7;
/// Prefix width of a literal with incremental indexing (`01xxxxxx`).
pub const INCREMENTAL_PREFIX_BITS: u8 = 6;
/// Prefix width of a dynamic table size update (`001xxxxx`).
pub const SIZE_UPDATE_PREFIX_BITS: u8 = 5;
/// Prefix width of a literal without indexing or never indexed (`000xxxxx`).
pub const LITERAL_PREFIX_BITS: u8 = 4;
/// Prefix width of a string length; the high bit is the Huffman flag.
pub const STRING_PREFIX_BITS: u8 = 7;

/// Largest value that fits in the prefix, i.e. the prefix mask.
#[inline]
pub fn prefix_mask(prefix_bits: u8) -> u64 {
    debug_assert!((1..=8).contains(&prefix_bits));
    (1u64 << prefix_bits) - 1
}

/// Append `value` encoded with an N-bit prefix. `pattern` supplies the
/// representation bits above the prefix.
pub fn encode_integer(buf: &mut Vec<u8>, value: u64, prefix_bits: u8, pattern: u8) {
    let mask = prefix_mask(prefix_bits);
    if value < mask {
        buf.push(pattern | value as u8);
        return;
    }
    buf.push(pattern | mask as u8);
    let mut remaining = value - mask;
    while remaining >= 0x80 {
        buf.push(0x80 | (remaining & 0x7f) as u8);
        remaining >>= 7;
    }
    buf.push(remaining as u8);
}

/// Number of bytes `encode_integer` would produce.
pub fn encoded_integer_len(value: u64, prefix_bits: u8) -> usize {
    let mask = prefix_mask(prefix_bits);
    if value < mask {
        return 1;
    }
    let mut remaining = value - mask;
    let mut len = 2;
    while remaining >= 0x80 {
        remaining >>= 7;
        len += 1;
    }
    len
}

/// Decode an N-bit prefix integer from the start of `buf`.
///
/// Bits above the prefix in the first byte are ignored. Returns the value
/// and the number of bytes consumed.
pub fn decode_integer(buf: &[u8], prefix_bits: u8) -> Result<(u64, usize), HpackError> {
    let Some(&first) = buf.first() else {
        return Err(HpackError::Incomplete);
    };
    let mask = prefix_mask(prefix_bits);
    let prefix = u64::from(first) & mask;
    if prefix < mask {
        return Ok((prefix, 1));
    }

    let mut value = mask;
    let mut shift = 0u32;
    for (i, &b) in buf[1..].iter().enumerate() {
        let digit = u64::from(b & 0x7f);
        if digit != 0 {
            if shift >= u64::BITS || digit > u64::MAX >> shift {
                return Err(HpackError::IntegerOverflow);
            }
            value = value
                .checked_add(digit << shift)
                .ok_or(HpackError::IntegerOverflow)?;
        }
        if b & 0x80 == 0 {
            // A zero terminator after continuation bytes adds nothing.
            if b == 0 && i > 0 {
                return Err(HpackError::OverlongInteger);
            }
            return Ok((value, i + 2));
        }
        shift += 7;
    }
    Err(HpackError::Incomplete)
}
