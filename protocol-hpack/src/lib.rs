//! Sans-IO HPACK primitives (RFC 7541).
//!
//! The pieces of HPACK that do not depend on connection state:
//!
//! - N-bit prefix integers ([`encode_integer`] / [`decode_integer`])
//! - String literals with the Huffman flag surfaced but not decoded
//! - The 61-entry static table, indexed from 1
//! - Header field representations: indexed, literal with incremental
//!   indexing, literal without indexing, literal never indexed, and
//!   dynamic table size updates
//!
//! Decoders are zero-copy: names and values borrow from the input buffer.
//! A short buffer yields [`HpackError::Incomplete`] so the caller can read
//! more and retry from the same position.
//!
//! # Example
//!
//! ```
//! use protocol_hpack::{Indexing, Name, Representation, decode_representation, encode_literal};
//!
//! let mut block = Vec::new();
//! encode_literal(&mut block, Indexing::Without, Name::Index(4), b"/sample/path");
//!
//! let (rep, consumed) = decode_representation(&block).unwrap();
//! assert_eq!(consumed, block.len());
//! let Representation::Literal(_, header) = rep else { unreachable!() };
//! assert_eq!(header.name_index, 4);
//! assert_eq!(header.value, b"/sample/path");
//! ```

mod error;
mod header;
mod integer;
mod table;

pub use error::HpackError;
pub use header::{
    HeaderFlags, Indexing, LiteralHeader, Name, Representation, decode_indexed, decode_literal,
    decode_representation, decode_size_update, decode_string, encode_indexed, encode_literal,
    encode_size_update, encode_string,
};
pub use integer::{
    INCREMENTAL_PREFIX_BITS, INDEXED_PREFIX_BITS, LITERAL_PREFIX_BITS, SIZE_UPDATE_PREFIX_BITS,
    STRING_PREFIX_BITS, decode_integer, encode_integer, encoded_integer_len, prefix_mask,
};
pub use table::{STATIC_TABLE, STATIC_TABLE_LEN, find_static, find_static_name, static_entry};
