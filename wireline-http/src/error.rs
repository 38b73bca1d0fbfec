use std::io;
use std::sync::Arc;

use protocol_hpack::HpackError;
use protocol_http1::{ParseError, Version};

/// Errors produced by the connection engine.
///
/// Malformed wire data and transport failures are fatal: the first one is
/// latched on the connection and every later operation sees it wrapped in
/// [`HttpError::ConnectionFailed`]. Misuse and stale handles are local to
/// the call and leave the connection usable.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The response could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A compressed header block could not be decoded.
    #[error("hpack error: {0}")]
    Hpack(#[from] HpackError),

    /// An operation was called out of order.
    #[error("invalid use: {0}")]
    Misuse(&'static str),

    /// The requested version cannot be served by this connection.
    #[error("cannot create an {requested} request on an {connection} connection")]
    VersionMismatch {
        requested: Version,
        connection: Version,
    },

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The transport ended in the middle of a response.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// A request was dropped after it started writing, leaving the wire in
    /// an unknown state.
    #[error("request abandoned mid-flight")]
    Abandoned,

    /// The connection failed earlier; holds the root cause.
    #[error("connection failed: {0}")]
    ConnectionFailed(Arc<HttpError>),

    /// The connection is closing and accepts no more requests.
    #[error("connection closed")]
    ConnectionClosed,

    /// The handle's request has been recycled.
    #[error("stale request handle")]
    StaleHandle,
}

impl HttpError {
    /// Whether this error tears down the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HttpError::Parse(_)
                | HttpError::Hpack(_)
                | HttpError::Io(_)
                | HttpError::UnexpectedEof
                | HttpError::Abandoned
                | HttpError::ConnectionFailed(_)
                | HttpError::ConnectionClosed
        )
    }

    /// The underlying cause, looking through [`HttpError::ConnectionFailed`].
    pub fn root(&self) -> &HttpError {
        match self {
            HttpError::ConnectionFailed(root) => root.root(),
            other => other,
        }
    }

    /// The error a queued waiter sees for a connection that ended with
    /// `root`.
    pub(crate) fn from_root(root: Arc<HttpError>) -> HttpError {
        match *root {
            HttpError::ConnectionClosed => HttpError::ConnectionClosed,
            _ => HttpError::ConnectionFailed(root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes() {
        assert!(HttpError::Parse(ParseError::InvalidStatusCode).is_fatal());
        assert!(HttpError::Hpack(HpackError::OverlongInteger).is_fatal());
        assert!(HttpError::UnexpectedEof.is_fatal());
        assert!(!HttpError::Misuse("headers after content").is_fatal());
        assert!(!HttpError::StaleHandle.is_fatal());
        assert!(
            !HttpError::VersionMismatch {
                requested: Version::Http11,
                connection: Version::Http10,
            }
            .is_fatal()
        );
    }

    #[test]
    fn root_looks_through_wrapping() {
        let root = Arc::new(HttpError::UnexpectedEof);
        let wrapped = HttpError::from_root(root.clone());
        assert!(matches!(wrapped.root(), HttpError::UnexpectedEof));
        assert!(matches!(
            HttpError::from_root(Arc::new(HttpError::ConnectionClosed)),
            HttpError::ConnectionClosed
        ));
    }

    #[test]
    fn display() {
        let err = HttpError::VersionMismatch {
            requested: Version::Http11,
            connection: Version::Http10,
        };
        assert_eq!(
            err.to_string(),
            "cannot create an HTTP/1.1 request on an HTTP/1.0 connection"
        );
    }
}
