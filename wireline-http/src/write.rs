//! Request-side state machine.
//!
//! Only the connection's current writer drives a [`WriteSide`]. Header
//! bytes accumulate in the write buffer and reach the transport on the
//! next flush, content write or completion, gathered with any content
//! buffers into one vectored write.

use std::io::IoSlice;

use bytes::{BufMut, BytesMut};
use protocol_http1::{
    CRLF, LAST_CHUNK, Version, encode_chunk_header, encode_connect, encode_header,
    encode_header_values, encode_header_with_prefix, encode_request_line,
};
use tokio::io::AsyncWrite;
use tracing::trace;
use wireline::{FlushType, finish_writes, write_all_vectored};

use crate::error::HttpError;
use crate::request::Owner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteState {
    Unstarted,
    RequestWritten,
    HeadersWritten,
    HeadersFlushed,
    ContentWritten,
    TrailingHeadersWritten,
    Finished,
}

pub(crate) struct WriteSide<W> {
    io: Option<W>,
    buf: BytesMut,
    version: Version,
    pub(crate) owner: Option<Owner>,
    pub(crate) state: WriteState,
    chunked: bool,
    /// A transport write was cancelled part way through.
    pub(crate) interrupted: bool,
}

impl<W: AsyncWrite + Unpin> WriteSide<W> {
    pub(crate) fn new(io: W, version: Version, capacity: usize) -> Self {
        Self {
            io: Some(io),
            buf: BytesMut::with_capacity(capacity),
            version,
            owner: None,
            state: WriteState::Unstarted,
            chunked: version.supports_chunked(),
            interrupted: false,
        }
    }

    /// Reset for a new request unless `owner` already holds the write side.
    pub(crate) fn prepare(&mut self, owner: Owner) {
        if self.owner == Some(owner) {
            return;
        }
        trace!(key = owner.key, "preparing write side");
        self.owner = Some(owner);
        self.state = WriteState::Unstarted;
        self.chunked = self.version.supports_chunked();
        self.buf.clear();
    }

    pub(crate) fn release(&mut self) {
        self.owner = None;
    }

    /// Drop the transport half.
    pub(crate) fn close(&mut self) {
        self.io = None;
    }

    pub(crate) fn configure(
        &mut self,
        has_content_length: bool,
        has_trailing_headers: bool,
    ) -> Result<(), HttpError> {
        if self.state != WriteState::Unstarted {
            return Err(HttpError::Misuse("request already started"));
        }
        self.chunked = match self.version {
            Version::Http10 if has_trailing_headers => {
                return Err(HttpError::Misuse("HTTP/1.0 has no trailing headers"));
            }
            Version::Http10 => false,
            Version::Http11 => !has_content_length || has_trailing_headers,
        };
        Ok(())
    }

    pub(crate) fn write_request_start(
        &mut self,
        method: &[u8],
        authority: &[u8],
        path: &[u8],
    ) -> Result<(), HttpError> {
        if self.state != WriteState::Unstarted {
            return Err(HttpError::Misuse("request already started"));
        }
        encode_request_line(
            &mut self.buf,
            method,
            authority,
            path,
            self.version,
            self.chunked,
        );
        self.state = WriteState::RequestWritten;
        Ok(())
    }

    pub(crate) fn write_connect(&mut self, authority: &[u8]) -> Result<(), HttpError> {
        if self.state != WriteState::Unstarted {
            return Err(HttpError::Misuse("request already started"));
        }
        self.chunked = false;
        encode_connect(&mut self.buf, authority, self.version);
        self.state = WriteState::HeadersFlushed;
        Ok(())
    }

    fn begin_header(&mut self) -> Result<&mut BytesMut, HttpError> {
        match self.state {
            WriteState::RequestWritten | WriteState::HeadersWritten => {
                self.state = WriteState::HeadersWritten;
                Ok(&mut self.buf)
            }
            WriteState::Unstarted => Err(HttpError::Misuse("headers before the request line")),
            _ => Err(HttpError::Misuse("headers after the header section ended")),
        }
    }

    pub(crate) fn write_header(&mut self, name: &[u8], value: &[u8]) -> Result<(), HttpError> {
        encode_header(self.begin_header()?, name, value);
        Ok(())
    }

    pub(crate) fn write_header_with_prefix(
        &mut self,
        prefix: &[u8],
        value: &[u8],
    ) -> Result<(), HttpError> {
        encode_header_with_prefix(self.begin_header()?, prefix, value);
        Ok(())
    }

    pub(crate) fn write_header_values<V: AsRef<[u8]>>(
        &mut self,
        name: &[u8],
        values: &[V],
        separator: &[u8],
    ) -> Result<(), HttpError> {
        encode_header_values(self.begin_header()?, name, values, separator);
        Ok(())
    }

    /// Append complete, already encoded header lines.
    pub(crate) fn write_encoded_headers(&mut self, lines: &[u8]) -> Result<(), HttpError> {
        self.begin_header()?.put_slice(lines);
        Ok(())
    }

    pub(crate) fn write_trailing_header(
        &mut self,
        name: &[u8],
        value: &[u8],
    ) -> Result<(), HttpError> {
        if !self.chunked {
            return Err(HttpError::Misuse(
                "trailing headers need a request configured for them",
            ));
        }
        match self.state {
            WriteState::RequestWritten | WriteState::HeadersWritten => {
                self.buf.put_slice(CRLF);
                self.buf.put_slice(LAST_CHUNK);
            }
            WriteState::HeadersFlushed | WriteState::ContentWritten => {
                self.buf.put_slice(LAST_CHUNK);
            }
            WriteState::TrailingHeadersWritten => {}
            WriteState::Unstarted => {
                return Err(HttpError::Misuse("trailing headers before the request line"));
            }
            WriteState::Finished => {
                return Err(HttpError::Misuse("request already complete"));
            }
        }
        self.state = WriteState::TrailingHeadersWritten;
        encode_header(&mut self.buf, name, value);
        Ok(())
    }

    /// End the header section if it is still open.
    fn end_headers(&mut self) -> Result<(), HttpError> {
        match self.state {
            WriteState::RequestWritten | WriteState::HeadersWritten => {
                self.buf.put_slice(CRLF);
                self.state = WriteState::HeadersFlushed;
                Ok(())
            }
            WriteState::HeadersFlushed | WriteState::ContentWritten => Ok(()),
            WriteState::Unstarted => Err(HttpError::Misuse("content before the request line")),
            WriteState::TrailingHeadersWritten | WriteState::Finished => {
                Err(HttpError::Misuse("content after the body ended"))
            }
        }
    }

    /// Close out the request, leaving the final bytes in the buffer.
    fn end_request(&mut self) -> Result<(), HttpError> {
        match self.state {
            WriteState::Unstarted => {
                return Err(HttpError::Misuse("completing a request that never started"));
            }
            WriteState::RequestWritten | WriteState::HeadersWritten => {
                self.buf.put_slice(CRLF);
                if self.chunked {
                    self.buf.put_slice(LAST_CHUNK);
                    self.buf.put_slice(CRLF);
                }
            }
            WriteState::HeadersFlushed | WriteState::ContentWritten => {
                if self.chunked {
                    self.buf.put_slice(LAST_CHUNK);
                    self.buf.put_slice(CRLF);
                }
            }
            WriteState::TrailingHeadersWritten => self.buf.put_slice(CRLF),
            WriteState::Finished => {}
        }
        self.state = WriteState::Finished;
        Ok(())
    }

    pub(crate) async fn flush_headers(&mut self) -> Result<(), HttpError> {
        self.end_headers()?;
        self.send(&[], FlushType::FlushWrites).await
    }

    /// Write one body chunk gathered from `content`. Empty content writes
    /// nothing, so it never terminates a chunked body early.
    pub(crate) async fn write_content(&mut self, content: &[&[u8]]) -> Result<(), HttpError> {
        self.end_headers()?;
        let len: usize = content.iter().map(|c| c.len()).sum();
        if len == 0 {
            return Ok(());
        }
        self.state = WriteState::ContentWritten;
        if self.chunked {
            encode_chunk_header(&mut self.buf, len as u64);
            let mut parts = Vec::with_capacity(content.len() + 1);
            parts.extend_from_slice(content);
            parts.push(CRLF);
            self.send(&parts, FlushType::None).await
        } else {
            self.send(content, FlushType::None).await
        }
    }

    pub(crate) async fn flush_content(&mut self) -> Result<(), HttpError> {
        match self.state {
            WriteState::HeadersFlushed | WriteState::ContentWritten => {
                self.send(&[], FlushType::FlushWrites).await
            }
            WriteState::Unstarted | WriteState::RequestWritten | WriteState::HeadersWritten => {
                Err(HttpError::Misuse("flushing content before the header section ended"))
            }
            WriteState::TrailingHeadersWritten | WriteState::Finished => {
                Err(HttpError::Misuse("flushing content after the body ended"))
            }
        }
    }

    pub(crate) async fn complete(&mut self, flush: FlushType) -> Result<(), HttpError> {
        self.end_request()?;
        self.send(&[], flush).await
    }

    /// Write the buffer followed by `extra`, then finish with `flush`.
    async fn send(&mut self, extra: &[&[u8]], flush: FlushType) -> Result<(), HttpError> {
        let io = self.io.as_mut().ok_or(HttpError::ConnectionClosed)?;
        self.interrupted = true;

        let mut slices = Vec::with_capacity(extra.len() + 1);
        slices.push(IoSlice::new(&self.buf));
        slices.extend(extra.iter().map(|part| IoSlice::new(part)));
        write_all_vectored(io, &mut slices).await?;
        finish_writes(io, flush).await?;

        self.buf.clear();
        self.interrupted = false;
        Ok(())
    }
}
