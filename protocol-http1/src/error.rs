//! Error types for HTTP/1 response parsing.

/// Error type for HTTP/1 parsing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Need more data to complete parsing.
    /// This is not a fatal error - the caller should buffer more data and retry.
    #[error("incomplete data")]
    Incomplete,

    /// The status line has no version/status separator before its end.
    #[error("invalid status line")]
    InvalidStatusLine,

    /// The status code is not three ASCII digits.
    #[error("invalid status code")]
    InvalidStatusCode,

    /// Content-Length is empty, non-numeric or does not fit in 64 bits.
    #[error("invalid content-length")]
    InvalidContentLength,

    /// A chunk-size line is empty or not hexadecimal.
    #[error("invalid chunk size")]
    InvalidChunkSize,

    /// A chunk size does not fit in 64 bits.
    #[error("chunk size overflow")]
    ChunkSizeOverflow,

    /// Chunk data was not followed by CRLF.
    #[error("missing CRLF after chunk data")]
    MissingChunkTerminator,
}

impl ParseError {
    /// Returns true if this error indicates incomplete data.
    #[inline]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ParseError::Incomplete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_incomplete() {
        assert!(ParseError::Incomplete.is_incomplete());
        assert!(!ParseError::InvalidChunkSize.is_incomplete());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(ParseError::Incomplete.to_string(), "incomplete data");
        assert_eq!(ParseError::InvalidStatusCode.to_string(), "invalid status code");
        assert_eq!(
            ParseError::MissingChunkTerminator.to_string(),
            "missing CRLF after chunk data"
        );
    }
}
