//! Sans-IO HTTP/1.0 and HTTP/1.1 client wire format.
//!
//! Everything here works on byte slices and never performs I/O:
//!
//! - [`encode_request_line`], [`encode_connect`], [`encode_header`] and
//!   [`encode_chunk_header`] produce request bytes into any
//!   [`bytes::BufMut`]
//! - [`parse_status_line`] and [`parse_chunk_size`] consume response framing,
//!   returning [`ParseError::Incomplete`] when more bytes are needed
//! - [`scan_headers`] walks a header section, rewriting obsolete line
//!   folding in place and reporting each header to a [`HeaderVisitor`]
//! - [`KnownHeaders`] picks out `Content-Length`, `Transfer-Encoding` and
//!   `Connection`
//!
//! # Example
//!
//! ```
//! use protocol_http1::{KnownHeaders, ParseError, parse_status_line, scan_headers};
//!
//! let mut response = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello".to_vec();
//! let line = parse_status_line(&response).unwrap();
//! assert_eq!(line.status, 200);
//!
//! let mut known = KnownHeaders::default();
//! let mut visitor = |name: &[u8], value: &[u8]| -> Result<(), ParseError> {
//!     known.observe(name, value)
//! };
//! let headers = &mut response[line.consumed..];
//! let len = headers.len();
//! let scan = scan_headers(headers, len, &mut visitor).unwrap();
//! assert!(scan.done);
//! assert_eq!(&headers[scan.consumed..], b"hello");
//! assert_eq!(known.content_length, Some(5));
//! ```

mod error;
mod known;
mod request;
mod response;
mod scanner;
mod version;

pub use error::ParseError;
pub use known::KnownHeaders;
pub use request::{
    CRLF, LAST_CHUNK, encode_chunk_header, encode_connect, encode_header, encode_header_values,
    encode_header_with_prefix, encode_request_line, is_head,
};
pub use response::{StatusLine, parse_chunk_size, parse_decimal, parse_hex, parse_status_line};
pub use scanner::{
    HeaderVisitor, SCAN_PADDING, Scan, ScanFn, scan_headers, scan_headers_scalar,
    selected_scanner, vector_scanners,
};
pub use version::Version;
