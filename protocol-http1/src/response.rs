//! Response-side parsing: status lines, chunk-size lines, and the numeric
//! fields the engine acts on.

use crate::error::ParseError;
use crate::version::Version;

/// A parsed status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLine {
    /// `None` when the version token is neither `HTTP/1.0` nor `HTTP/1.1`.
    pub version: Option<Version>,
    pub status: u16,
    /// Bytes up to and including the line's LF.
    pub consumed: usize,
}

impl StatusLine {
    /// 1xx responses precede the final response.
    #[inline]
    pub fn is_informational(&self) -> bool {
        self.status < 200
    }
}

/// Parse `VERSION SP DIGIT DIGIT DIGIT [SP reason] CRLF`.
///
/// The reason phrase is skipped without inspection.
pub fn parse_status_line(buf: &[u8]) -> Result<StatusLine, ParseError> {
    let (version, mut pos) = match buf.first_chunk::<8>().map(|p| Version::from_prefix(*p)) {
        Some(Some(version)) if buf.len() > 8 && buf[8] == b' ' => (Some(version), 9),
        Some(Some(_)) if buf.len() == 8 => return Err(ParseError::Incomplete),
        _ => {
            let Some(sp) = buf.iter().position(|&b| b == b' ' || b == b'\n') else {
                return Err(ParseError::Incomplete);
            };
            if buf[sp] == b'\n' {
                return Err(ParseError::InvalidStatusLine);
            }
            (None, sp + 1)
        }
    };

    let Some(code) = buf.get(pos..pos + 4) else {
        return Err(ParseError::Incomplete);
    };
    if !code[..3].iter().all(u8::is_ascii_digit) || !matches!(code[3], b' ' | b'\r' | b'\n') {
        return Err(ParseError::InvalidStatusCode);
    }
    let status = code[..3]
        .iter()
        .fold(0u16, |acc, &d| acc * 10 + u16::from(d - b'0'));
    pos += 3;

    let Some(lf) = buf[pos..].iter().position(|&b| b == b'\n') else {
        return Err(ParseError::Incomplete);
    };
    Ok(StatusLine {
        version,
        status,
        consumed: pos + lf + 1,
    })
}

/// Parse a non-empty run of ASCII decimal digits.
pub fn parse_decimal(digits: &[u8]) -> Option<u64> {
    if digits.is_empty() {
        return None;
    }
    digits.iter().try_fold(0u64, |acc, &d| {
        if !d.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add(u64::from(d - b'0'))
    })
}

/// Parse a non-empty run of ASCII hex digits (either case).
pub fn parse_hex(digits: &[u8]) -> Result<u64, ParseError> {
    if digits.is_empty() {
        return Err(ParseError::InvalidChunkSize);
    }
    let mut value = 0u64;
    for &d in digits {
        let nibble = match d {
            b'0'..=b'9' => d - b'0',
            b'a'..=b'f' => d - b'a' + 10,
            b'A'..=b'F' => d - b'A' + 10,
            _ => return Err(ParseError::InvalidChunkSize),
        };
        if value >> 60 != 0 {
            return Err(ParseError::ChunkSizeOverflow);
        }
        value = (value << 4) | u64::from(nibble);
    }
    Ok(value)
}

/// Parse a chunk-size line, `HEX [;extension] CRLF`.
///
/// When `after_chunk` is set the line must be preceded by the CRLF that
/// closes the previous chunk's data. Returns the size and bytes consumed.
pub fn parse_chunk_size(buf: &[u8], after_chunk: bool) -> Result<(u64, usize), ParseError> {
    let mut pos = 0;
    if after_chunk {
        match buf {
            [b'\r', b'\n', ..] => pos = 2,
            [b'\n', ..] => pos = 1,
            [] | [b'\r'] => return Err(ParseError::Incomplete),
            _ => return Err(ParseError::MissingChunkTerminator),
        }
    }

    let Some(lf) = buf[pos..].iter().position(|&b| b == b'\n') else {
        return Err(ParseError::Incomplete);
    };
    let mut line = &buf[pos..pos + lf];
    if let [rest @ .., b'\r'] = line {
        line = rest;
    }
    if let Some(semi) = line.iter().position(|&b| b == b';') {
        line = &line[..semi];
    }
    let size = parse_hex(line.trim_ascii_end())?;
    Ok((size, pos + lf + 1))
}
