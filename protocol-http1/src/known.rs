//! Headers the engine acts on while scanning.

use crate::error::ParseError;
use crate::response::parse_decimal;

/// Framing and connection facts gathered from a response's headers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KnownHeaders {
    /// Value of `Content-Length`, if present.
    pub content_length: Option<u64>,
    /// `Transfer-Encoding` ends in `chunked`.
    pub chunked: bool,
    /// `Connection` lists `close`.
    pub close: bool,
}

impl KnownHeaders {
    /// Inspect one header. Names compare ASCII case-insensitively.
    pub fn observe(&mut self, name: &[u8], value: &[u8]) -> Result<(), ParseError> {
        if name.eq_ignore_ascii_case(b"content-length") {
            let length = parse_decimal(value.trim_ascii()).ok_or(ParseError::InvalidContentLength)?;
            self.content_length = Some(length);
        } else if name.eq_ignore_ascii_case(b"transfer-encoding") {
            let last = value.rsplit(|&b| b == b',').next().unwrap_or_default();
            self.chunked = last.trim_ascii().eq_ignore_ascii_case(b"chunked");
        } else if name.eq_ignore_ascii_case(b"connection") {
            if value
                .split(|&b| b == b',')
                .any(|token| token.trim_ascii().eq_ignore_ascii_case(b"close"))
            {
                self.close = true;
            }
        }
        Ok(())
    }
}
