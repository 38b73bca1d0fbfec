//! Header sinks and static-table header block decoding.

use protocol_hpack::{HeaderFlags, HpackError, Representation, decode_representation, static_entry};

use crate::error::HttpError;

/// Receives decoded headers, once per header, in wire order.
pub trait HeadersSink {
    fn on_header(&mut self, name: &[u8], value: &[u8]);

    /// Called instead of [`on_header`](Self::on_header) when the source
    /// carries per-header flags. Ignores them by default.
    fn on_header_with_flags(&mut self, name: &[u8], value: &[u8], flags: HeaderFlags) {
        let _ = flags;
        self.on_header(name, value);
    }
}

impl<F> HeadersSink for F
where
    F: FnMut(&[u8], &[u8]),
{
    fn on_header(&mut self, name: &[u8], value: &[u8]) {
        self(name, value)
    }
}

/// Discards every header.
pub(crate) struct NullSink;

impl HeadersSink for NullSink {
    fn on_header(&mut self, _name: &[u8], _value: &[u8]) {}
}

/// Decode an HPACK header block that references only the static table.
///
/// Each header is reported with its flags; names given by index are
/// resolved to their static-table text. Dynamic table size updates are
/// accepted and ignored. Any index past the static table is rejected.
pub fn decode_header_block(block: &[u8], sink: &mut dyn HeadersSink) -> Result<(), HttpError> {
    let mut pos = 0;
    while pos < block.len() {
        let (rep, n) = decode_representation(&block[pos..])?;
        match rep {
            Representation::Indexed(index) => {
                let (name, value) = static_entry(index).ok_or(HpackError::InvalidIndex(index))?;
                sink.on_header_with_flags(name, value, HeaderFlags::NONE);
            }
            Representation::Literal(_, header) => {
                let name = if header.name_index != 0 {
                    static_entry(header.name_index)
                        .ok_or(HpackError::InvalidIndex(header.name_index))?
                        .0
                } else {
                    header.name
                };
                sink.on_header_with_flags(name, header.value, header.flags);
            }
            Representation::SizeUpdate(_) => {}
        }
        pos += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect(Vec<(Vec<u8>, Vec<u8>, HeaderFlags)>);

    impl HeadersSink for Collect {
        fn on_header(&mut self, name: &[u8], value: &[u8]) {
            self.on_header_with_flags(name, value, HeaderFlags::NONE);
        }

        fn on_header_with_flags(&mut self, name: &[u8], value: &[u8], flags: HeaderFlags) {
            self.0.push((name.to_vec(), value.to_vec(), flags));
        }
    }

    #[test]
    fn request_block_without_huffman() {
        // RFC 7541 C.3.1
        let block = [
            0x82, 0x86, 0x84, 0x41, 0x0f, b'w', b'w', b'w', b'.', b'e', b'x', b'a', b'm', b'p',
            b'l', b'e', b'.', b'c', b'o', b'm',
        ];
        let mut sink = Collect::default();
        decode_header_block(&block, &mut sink).unwrap();
        let headers: Vec<_> = sink.0.iter().map(|(n, v, _)| (&n[..], &v[..])).collect();
        assert_eq!(
            headers,
            [
                (&b":method"[..], &b"GET"[..]),
                (b":scheme", b"http"),
                (b":path", b"/"),
                (b":authority", b"www.example.com"),
            ]
        );
    }

    #[test]
    fn literal_names_and_flags() {
        // never indexed, literal name, Huffman-flagged value
        let block = [0x10, 0x01, b'k', 0x81, b'v', 0x3f, 0x01];
        let mut sink = Collect::default();
        decode_header_block(&block, &mut sink).unwrap();
        assert_eq!(sink.0.len(), 1);
        let (name, value, flags) = &sink.0[0];
        assert_eq!(name, b"k");
        assert_eq!(value, b"v");
        assert!(flags.contains(HeaderFlags::NEVER_INDEXED));
        assert!(flags.contains(HeaderFlags::VALUE_HUFFMAN_CODED));
        assert!(!flags.contains(HeaderFlags::NAME_HUFFMAN_CODED));
    }

    #[test]
    fn closures_are_sinks() {
        let mut names = Vec::new();
        let mut sink = |name: &[u8], _value: &[u8]| names.push(name.to_vec());
        decode_header_block(&[0x88], &mut sink).unwrap();
        assert_eq!(names, [b":status".to_vec()]);
    }

    #[test]
    fn dynamic_indices_are_rejected() {
        let mut sink = NullSink;
        assert!(matches!(
            decode_header_block(&[0xbe], &mut sink),
            Err(HttpError::Hpack(HpackError::InvalidIndex(62)))
        ));
        assert!(matches!(
            decode_header_block(&[0x80], &mut sink),
            Err(HttpError::Hpack(HpackError::InvalidIndex(0)))
        ));
    }

    #[test]
    fn truncated_block() {
        let mut sink = NullSink;
        assert!(matches!(
            decode_header_block(&[0x41, 0x05, b'a'], &mut sink),
            Err(HttpError::Hpack(HpackError::Incomplete))
        ));
    }
}
