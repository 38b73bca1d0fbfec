/// HTTP/1 protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Version {
    Http10,
    Http11,
}

pub(crate) const HTTP10: u64 = u64::from_le_bytes(*b"HTTP/1.0");
pub(crate) const HTTP11: u64 = u64::from_le_bytes(*b"HTTP/1.1");

impl Version {
    /// The version token as it appears on the wire.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Version::Http10 => b"HTTP/1.0",
            Version::Http11 => b"HTTP/1.1",
        }
    }

    /// Whether the version supports chunked transfer coding (and therefore
    /// trailing headers).
    pub fn supports_chunked(self) -> bool {
        self >= Version::Http11
    }

    /// Detect the version from the first eight bytes of a status line.
    #[inline]
    pub(crate) fn from_prefix(prefix: [u8; 8]) -> Option<Version> {
        match u64::from_le_bytes(prefix) {
            HTTP11 => Some(Version::Http11),
            HTTP10 => Some(Version::Http10),
            _ => None,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        })
    }
}
