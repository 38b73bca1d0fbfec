//! Core primitives for a pipelined HTTP/1 client engine.
//!
//! The pieces here know nothing about HTTP:
//!
//! - [`Buffer`]: a growable byte buffer with a committed region and
//!   optional trailing padding for vectorized over-reads
//! - [`List`]: a doubly linked list whose links are embedded in nodes
//!   stored in a [`slab::Slab`]
//! - [`Completion`]: a single-slot, resettable future
//! - [`Transport`]: the async byte-stream contract, with vectored writes
//!   and shutdown-on-flush
//!
//! Higher crates build the HTTP/1 wire format (`protocol-http1`), HPACK
//! primitives (`protocol-hpack`) and the connection engine
//! (`wireline-http`) on top of these.

pub mod buffer;
pub mod completion;
pub mod error;
pub mod list;
pub mod metrics;
pub mod transport;

pub use buffer::{Buffer, READ_PADDING, VECTOR_WIDTH};
pub use completion::{Completion, Wait};
pub use error::Error;
pub use list::{Linked, Links, List};
pub use transport::{FlushType, Transport, finish_writes, write_all_vectored};
