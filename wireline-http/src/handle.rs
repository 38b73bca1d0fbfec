//! The versioned request handle callers hold.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use protocol_http1::{Version, is_head};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::MutexGuard;
use tracing::{debug, warn};
use wireline::{FlushType, Transport};

use crate::connection::Shared;
use crate::error::HttpError;
use crate::prepared::{PreparedHeader, PreparedHeaderName, PreparedHeaderSet};
use crate::read::{ReadSide, ReadType};
use crate::request::Owner;
use crate::sink::HeadersSink;
use crate::write::WriteSide;

type Writer<'a, T> = MutexGuard<'a, WriteSide<WriteHalf<T>>>;
type Reader<'a, T> = MutexGuard<'a, ReadSide<ReadHalf<T>>>;

/// One request on a [`Connection`](crate::Connection).
///
/// The handle remembers the generation of the slot it was issued for.
/// Once the request is retired and its slot recycled, every operation
/// fails with [`HttpError::StaleHandle`].
///
/// Writes are legal while the request holds the write turn, from
/// [`create_request`](crate::Connection::create_request) until
/// [`complete_request`](Self::complete_request). Reads wait for the read
/// turn, which passes to each request in admission order. Finish with
/// [`dispose`](Self::dispose); dropping the handle instead abandons the
/// request.
pub struct RequestHandle<T: Transport> {
    shared: Arc<Shared<T>>,
    owner: Owner,
    released: bool,
}

impl<T: Transport> fmt::Debug for RequestHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("key", &self.owner.key)
            .field("generation", &self.owner.generation)
            .field("released", &self.released)
            .finish()
    }
}

impl<T: Transport> RequestHandle<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>, owner: Owner) -> Self {
        Self {
            shared,
            owner,
            released: false,
        }
    }

    /// Whether the request has been retired.
    pub fn is_stale(&self) -> bool {
        self.shared.lock_queue().slot(self.owner).is_err()
    }

    /// Status code of the last status line read.
    pub fn status_code(&self) -> Result<u16, HttpError> {
        Ok(self.shared.lock_queue().slot(self.owner)?.status)
    }

    /// Version of the last status line read. `None` before one is read or
    /// when its version was not recognised.
    pub fn version(&self) -> Result<Option<Version>, HttpError> {
        Ok(self.shared.lock_queue().slot(self.owner)?.version)
    }

    /// The element the last [`read`](Self::read) stopped at.
    pub fn read_type(&self) -> Result<Option<ReadType>, HttpError> {
        Ok(self.shared.lock_queue().slot(self.owner)?.read_type)
    }

    // -- Writing --

    /// Confirm this request may use the write side.
    fn check_writer(&self) -> Result<(), HttpError> {
        let queue = self.shared.lock_queue();
        let slot = queue.slot(self.owner)?;
        if queue.writer != Some(self.owner.key) {
            return Err(HttpError::Misuse(if slot.write_finished {
                "request already complete"
            } else {
                "request does not hold the write turn"
            }));
        }
        drop(queue);
        self.shared.check_failure()
    }

    fn claim_writer(&self, writer: &mut WriteSide<WriteHalf<T>>) -> Result<(), HttpError> {
        if writer.interrupted {
            writer.close();
            return Err(self.shared.fail(HttpError::Abandoned));
        }
        writer.prepare(self.owner);
        Ok(())
    }

    /// Lock the write side for a buffering operation, which never waits.
    fn writer(&self) -> Result<Writer<'_, T>, HttpError> {
        self.check_writer()?;
        let mut writer = self
            .shared
            .writer
            .try_lock()
            .map_err(|_| HttpError::Misuse("write side is busy"))?;
        self.claim_writer(&mut writer)?;
        Ok(writer)
    }

    async fn writer_async(&self) -> Result<Writer<'_, T>, HttpError> {
        self.check_writer()?;
        let mut writer = self.shared.writer.lock().await;
        self.claim_writer(&mut writer)?;
        Ok(writer)
    }

    /// Latch fatal errors from a transport write.
    fn settle_write<U>(
        &self,
        writer: &mut WriteSide<WriteHalf<T>>,
        result: Result<U, HttpError>,
    ) -> Result<U, HttpError> {
        result.map_err(|e| {
            if e.is_fatal() {
                writer.close();
                self.shared.fail(e)
            } else {
                e
            }
        })
    }

    /// Choose the body framing before the request line is written.
    ///
    /// On HTTP/1.1 the body is chunked unless a `Content-Length` will be
    /// sent, and always when trailing headers will be. HTTP/1.0 requests
    /// are never chunked and cannot carry trailing headers.
    pub fn configure_request(
        &mut self,
        has_content_length: bool,
        has_trailing_headers: bool,
    ) -> Result<(), HttpError> {
        self.writer()?
            .configure(has_content_length, has_trailing_headers)
    }

    /// Buffer the request line and `Host` header.
    pub fn write_request_start(
        &mut self,
        method: &[u8],
        authority: &[u8],
        path: &[u8],
    ) -> Result<(), HttpError> {
        self.writer()?
            .write_request_start(method, authority, path)?;
        let mut queue = self.shared.lock_queue();
        let slot = queue.slot_mut(self.owner)?;
        slot.write_started = true;
        slot.head = is_head(method);
        Ok(())
    }

    /// Like [`write_request_start`](Self::write_request_start), building the
    /// authority from a host and optional port. IPv6 literals are
    /// bracketed.
    pub fn write_request_start_uri(
        &mut self,
        method: &[u8],
        host: &str,
        port: Option<u16>,
        path: &[u8],
    ) -> Result<(), HttpError> {
        let authority = authority(host, port);
        self.write_request_start(method, authority.as_bytes(), path)
    }

    /// Buffer a complete `CONNECT` request. No headers may follow.
    pub fn write_connect_request(&mut self, authority: &[u8]) -> Result<(), HttpError> {
        self.writer()?.write_connect(authority)?;
        self.shared.lock_queue().slot_mut(self.owner)?.write_started = true;
        Ok(())
    }

    pub fn write_header(&mut self, name: &[u8], value: &[u8]) -> Result<(), HttpError> {
        self.writer()?.write_header(name, value)
    }

    pub fn write_header_with_name(
        &mut self,
        name: &PreparedHeaderName,
        value: &[u8],
    ) -> Result<(), HttpError> {
        self.writer()?
            .write_header_with_prefix(name.http1_prefix(), value)
    }

    /// Write one header whose values are joined by `separator`.
    pub fn write_header_values<V: AsRef<[u8]>>(
        &mut self,
        name: &[u8],
        values: &[V],
        separator: &[u8],
    ) -> Result<(), HttpError> {
        self.writer()?
            .write_header_values(name, values, separator)
    }

    pub fn write_prepared_header(&mut self, header: &PreparedHeader) -> Result<(), HttpError> {
        self.writer()?
            .write_encoded_headers(header.http1_encoded())
    }

    pub fn write_prepared_headers(&mut self, headers: &PreparedHeaderSet) -> Result<(), HttpError> {
        self.writer()?
            .write_encoded_headers(headers.http1_encoded())
    }

    /// Buffer a trailing header. The first one ends the body.
    pub fn write_trailing_header(&mut self, name: &[u8], value: &[u8]) -> Result<(), HttpError> {
        self.writer()?.write_trailing_header(name, value)
    }

    /// End the header section and flush everything buffered.
    pub async fn flush_headers(&mut self) -> Result<(), HttpError> {
        let mut writer = self.writer_async().await?;
        let result = writer.flush_headers().await;
        self.settle_write(&mut writer, result)
    }

    /// Write body bytes, ending the header section first if needed.
    pub async fn write_content(&mut self, content: &[u8]) -> Result<(), HttpError> {
        self.write_content_vectored(&[content]).await
    }

    /// Write several buffers as one piece of body content, gathered into a
    /// single transport write.
    pub async fn write_content_vectored(&mut self, content: &[&[u8]]) -> Result<(), HttpError> {
        let mut writer = self.writer_async().await?;
        let result = writer.write_content(content).await;
        self.settle_write(&mut writer, result)
    }

    pub async fn flush_content(&mut self) -> Result<(), HttpError> {
        let mut writer = self.writer_async().await?;
        let result = writer.flush_content().await;
        self.settle_write(&mut writer, result)
    }

    /// Finish the request and pass the write turn on. Completing twice is
    /// a no-op.
    pub async fn complete_request(&mut self) -> Result<(), HttpError> {
        if self.shared.lock_queue().slot(self.owner)?.write_finished {
            return Ok(());
        }
        let mut writer = self.writer_async().await?;
        let flush = if self.shared.close_requested() {
            FlushType::FlushAndShutdownWrites
        } else {
            FlushType::FlushWrites
        };
        let result = writer.complete(flush).await;
        self.settle_write(&mut writer, result)?;
        writer.release();

        if flush == FlushType::FlushAndShutdownWrites {
            self.shared.begin_closing();
        }
        self.shared.finish_write(self.owner);
        debug!(key = self.owner.key, "request written");
        Ok(())
    }

    // -- Reading --

    /// Wait for the read turn, then lock the read side.
    async fn reader(&self) -> Result<Reader<'_, T>, HttpError> {
        let (gate, wait) = {
            let queue = self.shared.lock_queue();
            let slot = queue.slot(self.owner)?;
            (slot.read_gate.clone(), slot.wait_for_read)
        };
        if wait {
            gate.wait().await.map_err(HttpError::from_root)?;
        }
        self.shared.check_failure()?;

        let head = {
            let queue = self.shared.lock_queue();
            if !queue.is_reader(self.owner) {
                return Err(match queue.slot(self.owner) {
                    Ok(_) => HttpError::Misuse("request does not hold the read turn"),
                    Err(e) => e,
                });
            }
            queue.slot(self.owner)?.head
        };

        let mut reader = self.shared.reader.lock().await;
        if let Err(e) = self.shared.check_failure() {
            reader.close();
            return Err(e);
        }
        reader.prepare(self.owner, head);
        Ok(reader)
    }

    /// Record what the read side saw and latch fatal errors.
    fn settle_read<U>(
        &self,
        reader: &mut ReadSide<ReadHalf<T>>,
        result: Result<U, HttpError>,
    ) -> Result<U, HttpError> {
        if reader.close_requested {
            self.shared.request_close();
        }
        if let Ok(slot) = self.shared.lock_queue().slot_mut(self.owner) {
            slot.status = reader.status;
            slot.version = reader.version;
        }
        result.map_err(|e| {
            if e.is_fatal() {
                reader.close();
                self.shared.fail(e)
            } else {
                e
            }
        })
    }

    /// Advance to the next response element.
    ///
    /// Header sections and content not consumed through
    /// [`read_headers`](Self::read_headers) and
    /// [`read_content`](Self::read_content) are skipped.
    pub async fn read(&mut self) -> Result<ReadType, HttpError> {
        let mut reader = self.reader().await?;
        let result = reader.read().await;
        let read_type = self.settle_read(&mut reader, result)?;
        if let Ok(slot) = self.shared.lock_queue().slot_mut(self.owner) {
            slot.read_type = Some(read_type);
        }
        Ok(read_type)
    }

    /// Report the current header section to `sink`. Does nothing unless
    /// the last read stopped at headers or trailing headers.
    pub async fn read_headers<S>(&mut self, sink: &mut S) -> Result<(), HttpError>
    where
        S: HeadersSink + ?Sized,
    {
        let mut reader = self.reader().await?;
        let result = reader.read_headers(sink).await;
        self.settle_read(&mut reader, result)
    }

    /// Read content into `dst`. Returns 0 at the end of the content, and
    /// whenever content is not the current element.
    pub async fn read_content(&mut self, dst: &mut [u8]) -> Result<usize, HttpError> {
        let mut reader = self.reader().await?;
        let result = reader.read_content(dst).await;
        self.settle_read(&mut reader, result)
    }

    /// Append the rest of the current content to `dst`.
    pub async fn read_content_to_end(&mut self, dst: &mut Vec<u8>) -> Result<usize, HttpError> {
        let step = self.shared.config.drain_buffer_size.max(1);
        let mut total = 0;
        loop {
            let mut tail = Tail::new(dst, step);
            let n = self.read_content(tail.spare()).await?;
            tail.filled(n);
            drop(tail);
            if n == 0 {
                return Ok(total);
            }
            total += n;
        }
    }

    async fn current_or_next(&mut self) -> Result<ReadType, HttpError> {
        match self.read_type()? {
            Some(read_type) => Ok(read_type),
            None => self.read().await,
        }
    }

    /// Read until the final response's status line. Returns `false` if a
    /// later element was reached first.
    pub async fn read_to_final_response(&mut self) -> Result<bool, HttpError> {
        let mut read_type = self.current_or_next().await?;
        loop {
            match read_type {
                ReadType::FinalResponse => return Ok(true),
                ReadType::InformationalResponse => {}
                ReadType::Headers if self.status_code()? < 200 => {}
                _ => return Ok(false),
            }
            read_type = self.read().await?;
        }
    }

    /// Read until a header section. Returns `false` if a later element was
    /// reached first.
    pub async fn read_to_headers(&mut self) -> Result<bool, HttpError> {
        let mut read_type = self.current_or_next().await?;
        loop {
            match read_type {
                ReadType::Headers => return Ok(true),
                ReadType::Content | ReadType::TrailingHeaders | ReadType::EndOfStream => {
                    return Ok(false);
                }
                _ => read_type = self.read().await?,
            }
        }
    }

    /// Read until content. Returns `false` if the response ended first.
    pub async fn read_to_content(&mut self) -> Result<bool, HttpError> {
        let mut read_type = self.current_or_next().await?;
        loop {
            match read_type {
                ReadType::Content => return Ok(true),
                ReadType::TrailingHeaders | ReadType::EndOfStream => return Ok(false),
                _ => read_type = self.read().await?,
            }
        }
    }

    /// Like [`read_to_content`](Self::read_to_content), but always reads
    /// past the current element first.
    pub async fn read_to_next_content(&mut self) -> Result<bool, HttpError> {
        loop {
            match self.read().await? {
                ReadType::Content => return Ok(true),
                ReadType::TrailingHeaders | ReadType::EndOfStream => return Ok(false),
                _ => {}
            }
        }
    }

    /// Read until trailing headers. Returns `false` if the response ended
    /// without any.
    pub async fn read_to_trailing_headers(&mut self) -> Result<bool, HttpError> {
        let mut read_type = self.current_or_next().await?;
        loop {
            match read_type {
                ReadType::TrailingHeaders => return Ok(true),
                ReadType::EndOfStream => return Ok(false),
                _ => read_type = self.read().await?,
            }
        }
    }

    /// Consume the rest of the response. Returns `false`, leaving the
    /// response unfinished, if more than `max_content` content bytes
    /// remain.
    pub async fn drain(&mut self, max_content: u64) -> Result<bool, HttpError> {
        self.drain_with_limit(Some(max_content)).await
    }

    async fn drain_with_limit(&mut self, limit: Option<u64>) -> Result<bool, HttpError> {
        let mut reader = self.reader().await?;
        let result = reader.drain(limit).await;
        let drained = self.settle_read(&mut reader, result)?;
        if drained && let Ok(slot) = self.shared.lock_queue().slot_mut(self.owner) {
            slot.read_type = Some(ReadType::EndOfStream);
        }
        Ok(drained)
    }

    /// Finish with the request.
    ///
    /// A request still holding the write turn is abandoned. Otherwise the
    /// rest of its response is drained, up to the connection's
    /// `max_drain_size`, so the next request can read; failures here are
    /// logged rather than returned, and a response too large to drain
    /// closes the connection after it.
    pub async fn dispose(mut self) {
        let (writing, failed_turn) = {
            let queue = self.shared.lock_queue();
            let Ok(slot) = queue.slot(self.owner) else {
                self.released = true;
                return;
            };
            (
                queue.writer == Some(self.owner.key),
                slot.wait_for_read && slot.read_gate.is_completed(),
            )
        };
        if writing {
            self.released = true;
            self.shared.abandon(self.owner);
            return;
        }

        if !failed_turn && self.shared.failure().is_none() {
            match self.drain_with_limit(self.shared.config.max_drain_size).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(key = self.owner.key, "response too large to drain");
                    self.shared.request_close();
                }
                Err(e) => warn!(key = self.owner.key, error = %e, "drain on dispose failed"),
            }
        }

        self.released = true;
        self.shared.retire(self.owner);
    }
}

impl<T: Transport> Drop for RequestHandle<T> {
    fn drop(&mut self) {
        if !self.released {
            self.shared.abandon(self.owner);
        }
    }
}

/// Zero-filled room at the end of a `Vec`, cut back to what was actually
/// read when dropped, including when the read is cancelled.
struct Tail<'a> {
    vec: &'a mut Vec<u8>,
    start: usize,
    len: usize,
}

impl<'a> Tail<'a> {
    fn new(vec: &'a mut Vec<u8>, step: usize) -> Self {
        let start = vec.len();
        vec.resize(start + step, 0);
        Self { vec, start, len: 0 }
    }

    fn spare(&mut self) -> &mut [u8] {
        &mut self.vec[self.start..]
    }

    fn filled(&mut self, n: usize) {
        self.len = n;
    }
}

impl Drop for Tail<'_> {
    fn drop(&mut self) {
        self.vec.truncate(self.start + self.len);
    }
}

/// `host[:port]`, bracketing IPv6 literals.
fn authority(host: &str, port: Option<u16>) -> String {
    let host = match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => format!("[{host}]"),
        _ => host.to_string(),
    };
    match port {
        Some(port) => format!("{host}:{port}"),
        None => host,
    }
}
