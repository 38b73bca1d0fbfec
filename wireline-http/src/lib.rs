//! Pipelined HTTP/1.0 and HTTP/1.1 client connections.
//!
//! A [`Connection`] wraps one transport and lets several requests share
//! it. Requests are admitted in order; each one writes when every earlier
//! request has finished writing, and reads its response when every earlier
//! response has been consumed. Writing the next request can overlap
//! reading the previous response.
//!
//! The engine is built from the sans-IO pieces in `protocol-http1` and
//! `protocol-hpack` and the buffers, lists and completions in `wireline`.
//!
//! # Errors
//!
//! Malformed responses and transport failures fail the whole connection:
//! the first such error is latched, and every queued and later operation
//! reports it as [`HttpError::ConnectionFailed`]. Calling operations out of
//! order returns [`HttpError::Misuse`] and leaves the connection usable.
//! A handle whose request has been recycled returns
//! [`HttpError::StaleHandle`].
//!
//! # Example
//!
//! ```
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//! use wireline_http::{Connection, ReadType, Version, VersionPolicy};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), wireline_http::HttpError> {
//! let (client, mut server) = tokio::io::duplex(4096);
//! tokio::spawn(async move {
//!     let mut request = [0u8; 512];
//!     let _ = server.read(&mut request).await;
//!     let _ = server
//!         .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello")
//!         .await;
//! });
//!
//! let conn = Connection::new(client, Version::Http11);
//! let mut request = conn
//!     .create_request(Version::Http11, VersionPolicy::RequestVersionExact)
//!     .await?
//!     .expect("connection is open");
//! request.configure_request(true, false)?;
//! request.write_request_start(b"GET", b"example.com", b"/")?;
//! request.complete_request().await?;
//!
//! assert!(request.read_to_content().await?);
//! let mut body = Vec::new();
//! request.read_content_to_end(&mut body).await?;
//! assert_eq!(body, b"hello");
//! assert_eq!(request.read().await?, ReadType::EndOfStream);
//! request.dispose().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod error;
mod handle;
mod prepared;
mod read;
mod request;
mod sink;
mod write;

pub use config::ConnectionConfig;
pub use connection::{Connection, ConnectionStatus};
pub use error::HttpError;
pub use handle::RequestHandle;
pub use prepared::{PreparedHeader, PreparedHeaderName, PreparedHeaderSet, static_header};
pub use protocol_hpack::HeaderFlags;
pub use protocol_http1::Version;
pub use read::ReadType;
pub use request::VersionPolicy;
pub use sink::{HeadersSink, decode_header_block};
