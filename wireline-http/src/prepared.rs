//! Header encodings computed once and reused across requests.
//!
//! A [`PreparedHeader`] carries both its HTTP/1 line and its HPACK
//! representation. A [`PreparedHeaderSet`] collects headers until first use,
//! then concatenates each encoding into a single buffer and freezes.

use std::sync::{LazyLock, Mutex, OnceLock};

use bytes::{BufMut, Bytes, BytesMut};
use protocol_hpack::{
    Indexing, Name, STATIC_TABLE, encode_indexed, encode_literal, find_static, find_static_name,
};
use protocol_http1::encode_header;

use crate::error::HttpError;

/// A header name with its `name: ` prefix encoded ahead of time.
#[derive(Debug, Clone)]
pub struct PreparedHeaderName {
    name: Bytes,
    http1_prefix: Bytes,
}

impl PreparedHeaderName {
    pub fn new(name: impl AsRef<[u8]>) -> Self {
        let name = name.as_ref();
        let mut prefix = BytesMut::with_capacity(name.len() + 2);
        prefix.put_slice(name);
        prefix.put_slice(b": ");
        Self {
            name: Bytes::copy_from_slice(name),
            http1_prefix: prefix.freeze(),
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// `name: `, ready to be followed by a value.
    pub fn http1_prefix(&self) -> &[u8] {
        &self.http1_prefix
    }
}

/// A complete header with precomputed wire forms.
#[derive(Debug, Clone)]
pub struct PreparedHeader {
    name: Bytes,
    value: Bytes,
    http1: Bytes,
    hpack: Bytes,
}

impl PreparedHeader {
    /// Prepare `name: value`.
    ///
    /// The HPACK form is the static-table index when name and value both
    /// match an entry, otherwise a literal without indexing that references
    /// the static name where one exists. HPACK names are lowercased.
    pub fn new(name: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Self {
        let (name, value) = (name.as_ref(), value.as_ref());
        let lower = name.to_ascii_lowercase();

        let mut hpack = Vec::with_capacity(lower.len() + value.len() + 4);
        match find_static(&lower, value) {
            Some(index) => encode_indexed(&mut hpack, index),
            None => {
                let name = match find_static_name(&lower) {
                    Some(index) => Name::Index(index),
                    None => Name::Literal(&lower),
                };
                encode_literal(&mut hpack, Indexing::Without, name, value);
            }
        }

        Self::with_hpack(name, value, hpack)
    }

    fn with_hpack(name: &[u8], value: &[u8], hpack: Vec<u8>) -> Self {
        let mut http1 = BytesMut::with_capacity(name.len() + value.len() + 4);
        encode_header(&mut http1, name, value);
        Self {
            name: Bytes::copy_from_slice(name),
            value: Bytes::copy_from_slice(value),
            http1: http1.freeze(),
            hpack: Bytes::from(hpack),
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// `name: value CRLF`.
    pub fn http1_encoded(&self) -> &[u8] {
        &self.http1
    }

    pub fn hpack_encoded(&self) -> &[u8] {
        &self.hpack
    }
}

static STATIC_HEADERS: LazyLock<Vec<PreparedHeader>> = LazyLock::new(|| {
    STATIC_TABLE
        .iter()
        .enumerate()
        .map(|(i, (name, value))| {
            let mut hpack = Vec::with_capacity(1);
            encode_indexed(&mut hpack, i as u64 + 1);
            PreparedHeader::with_hpack(name, value, hpack)
        })
        .collect()
});

/// The prepared form of static-table entry `index` (1-based).
///
/// Its HPACK encoding is the one-byte indexed representation.
pub fn static_header(index: u64) -> Option<&'static PreparedHeader> {
    let slot = usize::try_from(index).ok()?.checked_sub(1)?;
    STATIC_HEADERS.get(slot)
}

#[derive(Debug, Default)]
struct Pending {
    headers: Vec<PreparedHeader>,
    frozen: bool,
}

#[derive(Debug)]
struct Frozen {
    headers: Vec<PreparedHeader>,
    http1: Bytes,
    hpack: Bytes,
}

/// An add-only collection of prepared headers.
#[derive(Debug, Default)]
pub struct PreparedHeaderSet {
    pending: Mutex<Pending>,
    frozen: OnceLock<Frozen>,
}

impl PreparedHeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header. Fails once the set has been used.
    pub fn add(&self, header: PreparedHeader) -> Result<(), HttpError> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending.frozen {
            return Err(HttpError::Misuse("prepared header set is frozen"));
        }
        pending.headers.push(header);
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get().is_some()
    }

    fn freeze(&self) -> &Frozen {
        self.frozen.get_or_init(|| {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.frozen = true;
            let headers = std::mem::take(&mut pending.headers);

            let mut http1 = BytesMut::with_capacity(headers.iter().map(|h| h.http1.len()).sum());
            let mut hpack = BytesMut::with_capacity(headers.iter().map(|h| h.hpack.len()).sum());
            for header in &headers {
                http1.put_slice(&header.http1);
                hpack.put_slice(&header.hpack);
            }
            Frozen {
                headers,
                http1: http1.freeze(),
                hpack: hpack.freeze(),
            }
        })
    }

    /// Every header's HTTP/1 line, concatenated. Freezes the set.
    pub fn http1_encoded(&self) -> &[u8] {
        &self.freeze().http1
    }

    /// Every header's HPACK representation, concatenated. Freezes the set.
    pub fn hpack_encoded(&self) -> &[u8] {
        &self.freeze().hpack
    }

    /// Freezes the set.
    pub fn iter(&self) -> std::slice::Iter<'_, PreparedHeader> {
        self.freeze().headers.iter()
    }

    /// Freezes the set.
    pub fn len(&self) -> usize {
        self.freeze().headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> IntoIterator for &'a PreparedHeaderSet {
    type Item = &'a PreparedHeader;
    type IntoIter = std::slice::Iter<'a, PreparedHeader>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
