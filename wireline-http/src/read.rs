//! Response-side state machine.
//!
//! Only the request at the front of the active queue drives a
//! [`ReadSide`]. Each [`ReadSide::read`] advances to the next response
//! element; elements the caller does not consume explicitly are skipped on
//! the way. The read buffer persists across requests so bytes of a
//! pipelined response that arrive early are kept for the next reader.

use protocol_http1::{
    KnownHeaders, ParseError, Version, parse_chunk_size, parse_status_line, scan_headers,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;
use wireline::Buffer;
use wireline::metrics::BYTES_RECEIVED;

use crate::error::HttpError;
use crate::request::Owner;
use crate::sink::{HeadersSink, NullSink};

const _: () = assert!(wireline::READ_PADDING >= protocol_http1::SCAN_PADDING);

/// Minimum free space requested from the buffer before each transport read.
const FILL_SIZE: usize = 1024;

/// The response element a read stopped at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadType {
    /// A 1xx status line. Its headers follow.
    InformationalResponse,
    /// The final status line.
    FinalResponse,
    /// A header section is ready for [`read_headers`](crate::RequestHandle::read_headers).
    Headers,
    /// Content is ready for [`read_content`](crate::RequestHandle::read_content).
    Content,
    /// Trailing headers are ready for [`read_headers`](crate::RequestHandle::read_headers).
    TrailingHeaders,
    /// The response is complete.
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadState {
    ReadToResponse,
    ReadToHeaders,
    SkipHeaders,
    ReadToContent,
    SkipContent,
    ReadToTrailingHeaders,
    SkipTrailingHeaders,
    EndOfStream,
}

pub(crate) struct ReadSide<R> {
    io: Option<R>,
    buf: Buffer,
    drain: Vec<u8>,
    drain_size: usize,
    pub(crate) owner: Option<Owner>,
    pub(crate) state: ReadState,
    head: bool,
    known: KnownHeaders,
    has_content_length: bool,
    chunked: bool,
    /// Content bytes left, or bytes left in the current chunk.
    remaining: u64,
    first_chunk: bool,
    pub(crate) status: u16,
    pub(crate) version: Option<Version>,
    /// The response asked for the connection to close after it.
    pub(crate) close_requested: bool,
}

impl<R: AsyncRead + Unpin> ReadSide<R> {
    pub(crate) fn new(io: R, capacity: usize, drain_size: usize) -> Self {
        Self {
            io: Some(io),
            buf: Buffer::with_padding(capacity, wireline::READ_PADDING),
            drain: Vec::new(),
            drain_size: drain_size.max(1),
            owner: None,
            state: ReadState::ReadToResponse,
            head: false,
            known: KnownHeaders::default(),
            has_content_length: false,
            chunked: false,
            remaining: 0,
            first_chunk: true,
            status: 0,
            version: None,
            close_requested: false,
        }
    }

    /// Reset for a new response unless `owner` already holds the read side.
    pub(crate) fn prepare(&mut self, owner: Owner, head: bool) {
        if self.owner == Some(owner) {
            return;
        }
        trace!(key = owner.key, head, "preparing read side");
        self.owner = Some(owner);
        self.state = ReadState::ReadToResponse;
        self.head = head;
        self.known = KnownHeaders::default();
        self.has_content_length = false;
        self.chunked = false;
        self.remaining = 0;
        self.first_chunk = true;
        self.status = 0;
        self.version = None;
        self.close_requested = false;
    }

    pub(crate) fn release(&mut self) {
        self.owner = None;
    }

    pub(crate) fn close(&mut self) {
        self.io = None;
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.state == ReadState::EndOfStream
    }

    /// Advance to the next response element.
    pub(crate) async fn read(&mut self) -> Result<ReadType, HttpError> {
        loop {
            match self.state {
                ReadState::ReadToResponse => {
                    let line = loop {
                        match parse_status_line(self.buf.active()) {
                            Ok(line) => break line,
                            Err(e) if e.is_incomplete() => self.fill().await?,
                            Err(e) => return Err(e.into()),
                        }
                    };
                    self.buf.discard(line.consumed);
                    self.status = line.status;
                    self.version = line.version;
                    self.state = ReadState::ReadToHeaders;
                    trace!(status = line.status, "status line");

                    if line.is_informational() {
                        return Ok(ReadType::InformationalResponse);
                    }
                    self.known = KnownHeaders::default();
                    self.has_content_length = false;
                    self.chunked = false;
                    self.remaining = 0;
                    self.first_chunk = true;
                    return Ok(ReadType::FinalResponse);
                }
                ReadState::ReadToHeaders => {
                    self.state = ReadState::SkipHeaders;
                    return Ok(ReadType::Headers);
                }
                ReadState::SkipHeaders | ReadState::SkipTrailingHeaders => {
                    self.read_headers(&mut NullSink).await?;
                }
                ReadState::ReadToContent => {
                    if self.status < 200 {
                        self.state = ReadState::ReadToResponse;
                        continue;
                    }
                    self.state = ReadState::SkipContent;
                    return Ok(ReadType::Content);
                }
                ReadState::SkipContent => {
                    self.skip_content(None).await?;
                }
                ReadState::ReadToTrailingHeaders => {
                    if !self.chunked {
                        self.state = ReadState::EndOfStream;
                        return Ok(ReadType::EndOfStream);
                    }
                    self.state = ReadState::SkipTrailingHeaders;
                    return Ok(ReadType::TrailingHeaders);
                }
                ReadState::EndOfStream => return Ok(ReadType::EndOfStream),
            }
        }
    }

    /// Report the current header section to `sink`. Does nothing unless a
    /// header section is the current element.
    pub(crate) async fn read_headers<S>(&mut self, sink: &mut S) -> Result<(), HttpError>
    where
        S: HeadersSink + ?Sized,
    {
        let main = match self.state {
            ReadState::SkipHeaders => true,
            ReadState::SkipTrailingHeaders => false,
            _ => return Ok(()),
        };
        let observe = main && self.status >= 200;

        loop {
            let (buf, len) = self.buf.active_padded_mut();
            let known = &mut self.known;
            let mut visitor = |name: &[u8], value: &[u8]| -> Result<(), ParseError> {
                if observe {
                    known.observe(name, value)?;
                }
                sink.on_header(name, value);
                Ok(())
            };
            let scan = scan_headers(buf, len, &mut visitor)?;
            self.buf.discard(scan.consumed);
            if scan.done {
                break;
            }
            self.fill().await?;
        }

        if main {
            self.state = ReadState::ReadToContent;
            if observe {
                self.frame_content();
            }
        } else {
            self.state = ReadState::EndOfStream;
        }
        Ok(())
    }

    /// Decide how the final response's content is delimited.
    fn frame_content(&mut self) {
        let known = self.known;
        if known.close {
            self.close_requested = true;
        }
        if self.head || self.status == 204 || self.status == 304 {
            self.chunked = false;
            self.has_content_length = true;
            self.remaining = 0;
        } else {
            self.chunked = known.chunked;
            self.has_content_length = known.content_length.is_some() && !self.chunked;
            self.remaining = if self.has_content_length {
                known.content_length.unwrap_or_default()
            } else {
                0
            };
            if !self.chunked && !self.has_content_length {
                // content runs to EOF
                self.close_requested = true;
            }
        }
        trace!(
            chunked = self.chunked,
            content_length = self.has_content_length,
            remaining = self.remaining,
            "content framing"
        );
    }

    /// Read content into `dst`. Returns 0 once the content has ended, or
    /// when content is not the current element.
    pub(crate) async fn read_content(&mut self, dst: &mut [u8]) -> Result<usize, HttpError> {
        if self.state != ReadState::SkipContent || dst.is_empty() {
            return Ok(0);
        }
        if self.chunked {
            self.read_chunked(dst).await
        } else {
            self.read_unenveloped(dst).await
        }
    }

    async fn read_unenveloped(&mut self, dst: &mut [u8]) -> Result<usize, HttpError> {
        let max = if self.has_content_length {
            if self.remaining == 0 {
                self.end_content();
                return Ok(0);
            }
            dst.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX))
        } else {
            dst.len()
        };

        let n = self.read_body(&mut dst[..max]).await?;
        if n == 0 {
            if self.has_content_length {
                return Err(HttpError::UnexpectedEof);
            }
            self.end_content();
            return Ok(0);
        }
        if self.has_content_length {
            self.remaining -= n as u64;
        }
        Ok(n)
    }

    async fn read_chunked(&mut self, dst: &mut [u8]) -> Result<usize, HttpError> {
        if self.remaining == 0 {
            let size = loop {
                match parse_chunk_size(self.buf.active(), !self.first_chunk) {
                    Ok((size, consumed)) => {
                        self.buf.discard(consumed);
                        break size;
                    }
                    Err(e) if e.is_incomplete() => self.fill().await?,
                    Err(e) => return Err(e.into()),
                }
            };
            self.first_chunk = false;
            if size == 0 {
                self.end_content();
                return Ok(0);
            }
            self.remaining = size;
        }

        let max = dst.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.read_body(&mut dst[..max]).await?;
        if n == 0 {
            return Err(HttpError::UnexpectedEof);
        }
        self.remaining -= n as u64;
        Ok(n)
    }

    fn end_content(&mut self) {
        trace!("end of content");
        self.state = ReadState::ReadToTrailingHeaders;
    }

    /// Consume the rest of the content. With a `limit`, stops and returns
    /// `false` once more than `limit` bytes have been skipped.
    pub(crate) async fn skip_content(&mut self, limit: Option<u64>) -> Result<bool, HttpError> {
        let mut drain = std::mem::take(&mut self.drain);
        if drain.is_empty() {
            drain.resize(self.drain_size, 0);
        }
        let result = self.skip_into(&mut drain, limit).await;
        self.drain = drain;
        result
    }

    async fn skip_into(&mut self, drain: &mut [u8], limit: Option<u64>) -> Result<bool, HttpError> {
        let mut skipped = 0u64;
        loop {
            let n = self.read_content(drain).await?;
            if n == 0 {
                return Ok(true);
            }
            skipped += n as u64;
            if limit.is_some_and(|limit| skipped > limit) {
                return Ok(false);
            }
        }
    }

    /// Skip to the end of the response. Returns `false` if the content
    /// exceeded `limit`, leaving the response unfinished.
    pub(crate) async fn drain(&mut self, limit: Option<u64>) -> Result<bool, HttpError> {
        if self.state == ReadState::SkipContent && !self.skip_content(limit).await? {
            return Ok(false);
        }
        loop {
            match self.read().await? {
                ReadType::Content => {
                    if !self.skip_content(limit).await? {
                        return Ok(false);
                    }
                }
                ReadType::EndOfStream => return Ok(true),
                _ => {}
            }
        }
    }

    /// Take buffered bytes first, otherwise read straight into `dst`.
    /// Returns 0 at EOF.
    async fn read_body(&mut self, dst: &mut [u8]) -> Result<usize, HttpError> {
        if !self.buf.is_empty() {
            let n = dst.len().min(self.buf.len());
            dst[..n].copy_from_slice(&self.buf.active()[..n]);
            self.buf.discard(n);
            return Ok(n);
        }
        let io = self.io.as_mut().ok_or(HttpError::ConnectionClosed)?;
        let n = io.read(dst).await?;
        BYTES_RECEIVED.add(n as u64);
        Ok(n)
    }

    /// Append at least one byte from the transport to the buffer.
    async fn fill(&mut self) -> Result<(), HttpError> {
        let io = self.io.as_mut().ok_or(HttpError::ConnectionClosed)?;
        self.buf.ensure_available(FILL_SIZE);
        let n = io.read(self.buf.available_mut()).await?;
        if n == 0 {
            return Err(HttpError::UnexpectedEof);
        }
        self.buf.commit(n);
        BYTES_RECEIVED.add(n as u64);
        Ok(())
    }
}
