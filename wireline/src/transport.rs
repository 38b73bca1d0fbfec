//! The byte-stream contract the engine runs over.

use std::io::{self, IoSlice};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::metrics::BYTES_SENT;

/// An async byte stream: a TCP socket, a TLS session, an in-memory pipe.
///
/// Shutting down writes maps to [`AsyncWrite::poll_shutdown`] and
/// scatter-gather writes to [`AsyncWrite::poll_write_vectored`].
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Transport for T {}

/// What to do after buffered request bytes are handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushType {
    /// Leave the bytes wherever the transport buffers them.
    None,
    /// Flush the transport.
    FlushWrites,
    /// Flush, then shut down the write direction.
    FlushAndShutdownWrites,
}

/// Apply `flush` to a writer whose data has already been written.
pub async fn finish_writes<W: AsyncWrite + Unpin>(io: &mut W, flush: FlushType) -> io::Result<()> {
    match flush {
        FlushType::None => Ok(()),
        FlushType::FlushWrites => io.flush().await,
        FlushType::FlushAndShutdownWrites => {
            io.flush().await?;
            io.shutdown().await
        }
    }
}

/// Write every byte of every slice, in order, using vectored writes.
///
/// Empty slices are skipped. A transport that accepts zero bytes fails
/// with [`io::ErrorKind::WriteZero`].
pub async fn write_all_vectored<W: AsyncWrite + Unpin>(
    io: &mut W,
    mut bufs: &mut [IoSlice<'_>],
) -> io::Result<()> {
    IoSlice::advance_slices(&mut bufs, 0);
    while !bufs.is_empty() {
        let n = io.write_vectored(bufs).await?;
        if n == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        BYTES_SENT.add(n as u64);
        IoSlice::advance_slices(&mut bufs, n);
    }
    Ok(())
}
