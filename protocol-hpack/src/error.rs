/// Errors produced while decoding HPACK representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HpackError {
    /// Not enough bytes buffered to finish the representation.
    #[error("incomplete HPACK data")]
    Incomplete,

    /// A multi-byte integer ended with a zero continuation byte.
    #[error("invalid HPACK: overlong integer")]
    OverlongInteger,

    /// A multi-byte integer does not fit in 64 bits.
    #[error("invalid HPACK: integer overflow")]
    IntegerOverflow,

    /// An index outside of the static table (or zero).
    #[error("invalid HPACK: index {0} is out of range")]
    InvalidIndex(u64),
}

impl HpackError {
    /// Returns `true` if more input may complete the representation.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, HpackError::Incomplete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(HpackError::Incomplete.to_string(), "incomplete HPACK data");
        assert_eq!(
            HpackError::OverlongInteger.to_string(),
            "invalid HPACK: overlong integer"
        );
        assert_eq!(
            HpackError::InvalidIndex(62).to_string(),
            "invalid HPACK: index 62 is out of range"
        );
    }

    #[test]
    fn incomplete_is_recoverable() {
        assert!(HpackError::Incomplete.is_incomplete());
        assert!(!HpackError::IntegerOverflow.is_incomplete());
    }
}
