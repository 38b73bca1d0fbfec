//! Request serialization.
//!
//! Encoders append to any [`BufMut`]. The request line always carries the
//! `Host` header; the blank line that ends the header section is written
//! separately so headers can follow.

use bytes::BufMut;

use crate::version::Version;

pub const CRLF: &[u8] = b"\r\n";
/// The zero-size chunk that ends a chunked body.
pub const LAST_CHUNK: &[u8] = b"0\r\n";

const TRANSFER_ENCODING_CHUNKED: &[u8] = b"\r\nTransfer-Encoding: chunked\r\n";

/// Append `METHOD SP PATH SP VERSION CRLF Host: AUTHORITY` followed by a CRLF,
/// or by `CRLF Transfer-Encoding: chunked CRLF` when `chunked` is set.
pub fn encode_request_line<B: BufMut>(
    dst: &mut B,
    method: &[u8],
    authority: &[u8],
    path: &[u8],
    version: Version,
    chunked: bool,
) {
    dst.put_slice(method);
    dst.put_u8(b' ');
    dst.put_slice(path);
    dst.put_u8(b' ');
    dst.put_slice(version.as_bytes());
    dst.put_slice(b"\r\nHost: ");
    dst.put_slice(authority);
    if chunked {
        dst.put_slice(TRANSFER_ENCODING_CHUNKED);
    } else {
        dst.put_slice(CRLF);
    }
}

/// Append a complete `CONNECT AUTHORITY VERSION CRLF CRLF` request head.
pub fn encode_connect<B: BufMut>(dst: &mut B, authority: &[u8], version: Version) {
    dst.put_slice(b"CONNECT ");
    dst.put_slice(authority);
    dst.put_u8(b' ');
    dst.put_slice(version.as_bytes());
    dst.put_slice(b"\r\n\r\n");
}

/// Append `name: value CRLF`.
pub fn encode_header<B: BufMut>(dst: &mut B, name: &[u8], value: &[u8]) {
    dst.put_slice(name);
    dst.put_slice(b": ");
    dst.put_slice(value);
    dst.put_slice(CRLF);
}

/// Append a header whose `name: ` prefix was encoded ahead of time.
pub fn encode_header_with_prefix<B: BufMut>(dst: &mut B, prefix: &[u8], value: &[u8]) {
    dst.put_slice(prefix);
    dst.put_slice(value);
    dst.put_slice(CRLF);
}

/// Append one header line carrying every value, joined by `separator`.
pub fn encode_header_values<B, V>(dst: &mut B, name: &[u8], values: &[V], separator: &[u8])
where
    B: BufMut,
    V: AsRef<[u8]>,
{
    dst.put_slice(name);
    dst.put_slice(b": ");
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            dst.put_slice(separator);
        }
        dst.put_slice(value.as_ref());
    }
    dst.put_slice(CRLF);
}

/// Append the envelope that precedes a chunk of `len` bytes: the size in
/// lowercase hex and a CRLF.
pub fn encode_chunk_header<B: BufMut>(dst: &mut B, len: u64) {
    let mut digits = [0u8; 16];
    let mut i = digits.len();
    let mut n = len;
    loop {
        i -= 1;
        digits[i] = b"0123456789abcdef"[(n & 0xf) as usize];
        n >>= 4;
        if n == 0 {
            break;
        }
    }
    dst.put_slice(&digits[i..]);
    dst.put_slice(CRLF);
}

/// Whether a method is `HEAD`, whose responses never carry content.
#[inline]
pub fn is_head(method: &[u8]) -> bool {
    method == b"HEAD"
}
