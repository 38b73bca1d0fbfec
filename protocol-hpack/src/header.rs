//! String literals and header field representations (RFC 7541 Sections 5.2, 6).

use std::ops::{BitOr, BitOrAssign};

use crate::error::HpackError;
use crate::integer::{
    INCREMENTAL_PREFIX_BITS, INDEXED_PREFIX_BITS, LITERAL_PREFIX_BITS, SIZE_UPDATE_PREFIX_BITS,
    STRING_PREFIX_BITS, decode_integer, encode_integer,
};

const INDEXED_PATTERN: u8 = 0b1000_0000;
const INCREMENTAL_PATTERN: u8 = 0b0100_0000;
const SIZE_UPDATE_PATTERN: u8 = 0b0010_0000;
const NEVER_INDEXED_PATTERN: u8 = 0b0001_0000;
const WITHOUT_INDEXING_PATTERN: u8 = 0b0000_0000;

const HUFFMAN_FLAG: u8 = 0x80;

/// Per-header decode flags.
///
/// Huffman decoding is not performed: a flagged name or value is handed
/// back exactly as it appeared on the wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeaderFlags(u8);

impl HeaderFlags {
    pub const NONE: HeaderFlags = HeaderFlags(0);
    /// The name literal carried the Huffman bit.
    pub const NAME_HUFFMAN_CODED: HeaderFlags = HeaderFlags(0b001);
    /// The value literal carried the Huffman bit.
    pub const VALUE_HUFFMAN_CODED: HeaderFlags = HeaderFlags(0b010);
    /// The header was sent as never-indexed and must not be re-encoded with indexing.
    pub const NEVER_INDEXED: HeaderFlags = HeaderFlags(0b100);

    #[inline]
    pub fn contains(self, other: HeaderFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for HeaderFlags {
    type Output = HeaderFlags;

    fn bitor(self, rhs: HeaderFlags) -> HeaderFlags {
        HeaderFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for HeaderFlags {
    fn bitor_assign(&mut self, rhs: HeaderFlags) {
        self.0 |= rhs.0;
    }
}

/// How a literal header field interacts with the decoder's dynamic table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indexing {
    /// `01xxxxxx`: the decoder adds the field to its dynamic table.
    Incremental,
    /// `0000xxxx`: the field is not added.
    Without,
    /// `0001xxxx`: the field is not added, and intermediaries must keep it literal.
    Never,
}

impl Indexing {
    fn pattern(self) -> u8 {
        match self {
            Indexing::Incremental => INCREMENTAL_PATTERN,
            Indexing::Without => WITHOUT_INDEXING_PATTERN,
            Indexing::Never => NEVER_INDEXED_PATTERN,
        }
    }

    fn prefix_bits(self) -> u8 {
        match self {
            Indexing::Incremental => INCREMENTAL_PREFIX_BITS,
            Indexing::Without | Indexing::Never => LITERAL_PREFIX_BITS,
        }
    }
}

/// The name half of a literal header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Name<'a> {
    /// A reference to a table entry's name.
    Index(u64),
    /// A literal name.
    Literal(&'a [u8]),
}

/// A decoded literal header field.
///
/// `name` is empty when `name_index` is non-zero; resolving the index is
/// left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralHeader<'a> {
    pub name_index: u64,
    pub name: &'a [u8],
    pub value: &'a [u8],
    pub flags: HeaderFlags,
}

/// One decoded header block representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation<'a> {
    Indexed(u64),
    Literal(Indexing, LiteralHeader<'a>),
    SizeUpdate(u64),
}

// -- Strings --

/// Append a raw (non-Huffman) string literal.
pub fn encode_string(buf: &mut Vec<u8>, data: &[u8]) {
    encode_integer(buf, data.len() as u64, STRING_PREFIX_BITS, 0x00);
    buf.extend_from_slice(data);
}

/// Decode a string literal. Returns `(huffman_coded, bytes, consumed)`.
pub fn decode_string(buf: &[u8]) -> Result<(bool, &[u8], usize), HpackError> {
    let Some(&first) = buf.first() else {
        return Err(HpackError::Incomplete);
    };
    let (len, n) = decode_integer(buf, STRING_PREFIX_BITS)?;
    let available = (buf.len() - n) as u64;
    if available < len {
        return Err(HpackError::Incomplete);
    }
    let end = n + len as usize;
    Ok((first & HUFFMAN_FLAG != 0, &buf[n..end], end))
}

// -- Encoders --

/// Append an indexed header field referencing `index`.
pub fn encode_indexed(buf: &mut Vec<u8>, index: u64) {
    encode_integer(buf, index, INDEXED_PREFIX_BITS, INDEXED_PATTERN);
}

/// Append a dynamic table size update.
pub fn encode_size_update(buf: &mut Vec<u8>, size: u64) {
    encode_integer(buf, size, SIZE_UPDATE_PREFIX_BITS, SIZE_UPDATE_PATTERN);
}

/// Append a literal header field.
pub fn encode_literal(buf: &mut Vec<u8>, indexing: Indexing, name: Name<'_>, value: &[u8]) {
    match name {
        Name::Index(index) => {
            encode_integer(buf, index, indexing.prefix_bits(), indexing.pattern());
        }
        Name::Literal(name) => {
            encode_integer(buf, 0, indexing.prefix_bits(), indexing.pattern());
            encode_string(buf, name);
        }
    }
    encode_string(buf, value);
}

// -- Decoders --

/// Decode an indexed header field. Returns `(index, consumed)`.
pub fn decode_indexed(buf: &[u8]) -> Result<(u64, usize), HpackError> {
    decode_integer(buf, INDEXED_PREFIX_BITS)
}

/// Decode a dynamic table size update. Returns `(size, consumed)`.
pub fn decode_size_update(buf: &[u8]) -> Result<(u64, usize), HpackError> {
    decode_integer(buf, SIZE_UPDATE_PREFIX_BITS)
}

/// Decode a literal header field of the given kind. Returns the header and
/// the bytes consumed.
pub fn decode_literal(
    buf: &[u8],
    indexing: Indexing,
) -> Result<(LiteralHeader<'_>, usize), HpackError> {
    let mut flags = match indexing {
        Indexing::Never => HeaderFlags::NEVER_INDEXED,
        _ => HeaderFlags::NONE,
    };
    let (name_index, mut pos) = decode_integer(buf, indexing.prefix_bits())?;

    let name: &[u8] = if name_index != 0 {
        &[]
    } else {
        let (huffman, name, n) = decode_string(&buf[pos..])?;
        if huffman {
            flags |= HeaderFlags::NAME_HUFFMAN_CODED;
        }
        pos += n;
        name
    };

    let (huffman, value, n) = decode_string(&buf[pos..])?;
    if huffman {
        flags |= HeaderFlags::VALUE_HUFFMAN_CODED;
    }
    pos += n;

    Ok((
        LiteralHeader {
            name_index,
            name,
            value,
            flags,
        },
        pos,
    ))
}

/// Decode whichever representation starts at `buf[0]`.
pub fn decode_representation(buf: &[u8]) -> Result<(Representation<'_>, usize), HpackError> {
    let Some(&first) = buf.first() else {
        return Err(HpackError::Incomplete);
    };
    if first & INDEXED_PATTERN != 0 {
        let (index, n) = decode_indexed(buf)?;
        Ok((Representation::Indexed(index), n))
    } else if first & INCREMENTAL_PATTERN != 0 {
        let (header, n) = decode_literal(buf, Indexing::Incremental)?;
        Ok((Representation::Literal(Indexing::Incremental, header), n))
    } else if first & SIZE_UPDATE_PATTERN != 0 {
        let (size, n) = decode_size_update(buf)?;
        Ok((Representation::SizeUpdate(size), n))
    } else if first & NEVER_INDEXED_PATTERN != 0 {
        let (header, n) = decode_literal(buf, Indexing::Never)?;
        Ok((Representation::Literal(Indexing::Never, header), n))
    } else {
        let (header, n) = decode_literal(buf, Indexing::Without)?;
        Ok((Representation::Literal(Indexing::Without, header), n))
    }
}
