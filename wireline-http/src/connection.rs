//! The connection engine: request queue, turn hand-off and failure latch.
//!
//! Requests live in a slab and are threaded onto two intrusive lists: the
//! active queue, in admission order, and the free list of recyclable
//! slots. A single mutex guards the slab, both lists and the current
//! writer, and is only held for short, non-blocking sections.
//!
//! The current writer owns the write side; the front of the active queue
//! owns the read side. Each side sits behind its own async mutex so one
//! write and one read can be in flight at once. Ownership passes from one
//! request to the next through the turn gates in each slot.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use protocol_http1::Version;
use slab::Slab;
use tokio::io::{ReadHalf, WriteHalf};
use tracing::{debug, warn};
use wireline::metrics::{CONNECTIONS_FAILED, REQUESTS_CREATED, REQUESTS_RECYCLED};
use wireline::{List, Transport};

use crate::config::ConnectionConfig;
use crate::error::HttpError;
use crate::handle::RequestHandle;
use crate::read::ReadSide;
use crate::request::{Owner, RequestSlot, VersionPolicy};
use crate::write::WriteSide;

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionStatus {
    /// Accepting requests.
    Open = 0,
    /// The last request has been written; responses may still be read.
    Closing = 1,
    /// Failed, or closed with nothing left to read.
    Closed = 2,
}

impl ConnectionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionStatus::Open,
            1 => ConnectionStatus::Closing,
            _ => ConnectionStatus::Closed,
        }
    }
}

pub(crate) struct Queue {
    pub(crate) slots: Slab<RequestSlot>,
    pub(crate) active: List,
    pub(crate) free: List,
    pub(crate) writer: Option<usize>,
}

impl Queue {
    /// The slot `owner` refers to, if that incarnation is still live.
    pub(crate) fn slot(&self, owner: Owner) -> Result<&RequestSlot, HttpError> {
        match self.slots.get(owner.key) {
            Some(slot) if slot.generation == owner.generation => Ok(slot),
            _ => Err(HttpError::StaleHandle),
        }
    }

    pub(crate) fn slot_mut(&mut self, owner: Owner) -> Result<&mut RequestSlot, HttpError> {
        match self.slots.get_mut(owner.key) {
            Some(slot) if slot.generation == owner.generation => Ok(slot),
            _ => Err(HttpError::StaleHandle),
        }
    }

    pub(crate) fn is_reader(&self, owner: Owner) -> bool {
        self.active.front() == Some(owner.key)
            && self.slot(owner).is_ok_and(|slot| !slot.wait_for_read)
    }
}

pub(crate) struct Shared<T: Transport> {
    pub(crate) version: Version,
    pub(crate) config: ConnectionConfig,
    queue: Mutex<Queue>,
    pub(crate) writer: tokio::sync::Mutex<WriteSide<WriteHalf<T>>>,
    pub(crate) reader: tokio::sync::Mutex<ReadSide<ReadHalf<T>>>,
    status: AtomicU8,
    close_requested: AtomicBool,
    failure: OnceLock<Arc<HttpError>>,
}

impl<T: Transport> Shared<T> {
    pub(crate) fn lock_queue(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.close_requested.load(Ordering::Acquire) || self.status() != ConnectionStatus::Open
    }

    pub(crate) fn close_requested(&self) -> bool {
        self.close_requested.load(Ordering::Acquire)
    }

    pub(crate) fn request_close(&self) {
        if !self.close_requested.swap(true, Ordering::AcqRel) {
            debug!("connection close requested");
        }
    }

    /// The last request has been written.
    pub(crate) fn begin_closing(&self) {
        let _ = self.status.compare_exchange(
            ConnectionStatus::Open as u8,
            ConnectionStatus::Closing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// The latched failure, if any.
    pub(crate) fn failure(&self) -> Option<&Arc<HttpError>> {
        self.failure.get()
    }

    pub(crate) fn check_failure(&self) -> Result<(), HttpError> {
        match self.failure.get() {
            Some(root) => Err(HttpError::ConnectionFailed(root.clone())),
            None => Ok(()),
        }
    }

    /// What a waiter denied its turn receives.
    fn terminal(&self) -> Arc<HttpError> {
        self.failure
            .get()
            .cloned()
            .unwrap_or_else(|| Arc::new(HttpError::ConnectionClosed))
    }

    /// Latch `error` as the connection's failure unless one is already
    /// latched, and return what the caller should report.
    pub(crate) fn fail(&self, error: HttpError) -> HttpError {
        match error {
            HttpError::ConnectionFailed(_) => return error,
            HttpError::ConnectionClosed => return HttpError::from_root(self.terminal()),
            _ => {}
        }

        let mut latched = false;
        let root = self
            .failure
            .get_or_init(|| {
                latched = true;
                Arc::new(error)
            })
            .clone();

        if latched {
            self.status
                .store(ConnectionStatus::Closed as u8, Ordering::Release);
            CONNECTIONS_FAILED.increment();
            warn!(error = %root, "connection failed");

            {
                let guard = self.lock_queue();
                fail_waiters(&guard, &root);
            }
            if let Ok(mut writer) = self.writer.try_lock() {
                writer.close();
            }
            if let Ok(mut reader) = self.reader.try_lock() {
                reader.close();
            }
        }
        HttpError::ConnectionFailed(root)
    }

    /// Record that `owner` finished writing and hand the write side on.
    pub(crate) fn finish_write(&self, owner: Owner) {
        let mut guard = self.lock_queue();
        let queue = &mut *guard;
        if let Ok(slot) = queue.slot_mut(owner) {
            slot.write_finished = true;
        }
        if queue.writer == Some(owner.key) {
            self.release_next_writer(queue, owner.key);
        }
    }

    fn release_next_writer(&self, queue: &mut Queue, key: usize) {
        let next = queue.active.next(&queue.slots, key);
        queue.writer = next;
        if let Some(next) = next {
            self.grant(queue, next);
        }
    }

    /// Open the gates `key` is waiting on, or fail every waiter if the
    /// connection will serve nothing more.
    fn grant(&self, queue: &mut Queue, key: usize) {
        if self.is_closing() {
            fail_waiters(queue, &self.terminal());
            return;
        }

        let writer = queue.writer == Some(key);
        let front = queue.active.front() == Some(key);
        let Some(slot) = queue.slots.get_mut(key) else {
            return;
        };
        if writer && slot.wait_for_write {
            slot.wait_for_write = false;
            let _ = slot.write_gate.set_result(());
            debug!(key, "write turn granted");
        }
        if front && slot.wait_for_read {
            slot.wait_for_read = false;
            let _ = slot.read_gate.set_result(());
            debug!(key, "read turn granted");
        }
    }

    /// Return `owner`'s slot to the free list, handing on whichever turns
    /// it still held.
    pub(crate) fn retire(&self, owner: Owner) {
        let mut guard = self.lock_queue();
        let queue = &mut *guard;
        let Ok(slot) = queue.slot_mut(owner) else {
            return;
        };
        slot.retire();
        if let Ok(mut reader) = self.reader.try_lock()
            && reader.owner == Some(owner)
        {
            reader.release();
        }

        let key = owner.key;
        let was_front = queue.active.front() == Some(key);
        if queue.writer == Some(key) {
            self.release_next_writer(queue, key);
        }
        if let Err(e) = queue.active.remove(&mut queue.slots, key) {
            debug_assert!(false, "retiring request {key}: {e}");
            return;
        }
        if let Err(e) = queue.free.push_back(&mut queue.slots, key) {
            debug_assert!(false, "recycling request {key}: {e}");
        }
        REQUESTS_RECYCLED.increment();
        debug!(key, "request retired");

        if was_front && let Some(front) = queue.active.front() {
            self.grant(queue, front);
        }
        if queue.active.is_empty() && self.is_closing() {
            self.status
                .store(ConnectionStatus::Closed as u8, Ordering::Release);
            debug!("connection closed");
        }
    }

    /// Drop a request without finishing it.
    ///
    /// A request that never started writing left nothing on the wire and
    /// is simply skipped. One that did, and has not read its whole
    /// response, leaves the wire in an unknown state and fails the
    /// connection.
    pub(crate) fn abandon(&self, owner: Owner) {
        let started = match self.lock_queue().slot(owner) {
            Ok(slot) => slot.write_started,
            Err(_) => return,
        };
        if started {
            let finished = self
                .reader
                .try_lock()
                .is_ok_and(|reader| reader.owner == Some(owner) && reader.is_finished());
            if !finished {
                self.fail(HttpError::Abandoned);
            }
        }
        self.retire(owner);
    }
}

/// Fail every queued turn with `root`.
fn fail_waiters(queue: &Queue, root: &Arc<HttpError>) {
    for key in queue.active.iter(&queue.slots) {
        let Some(slot) = queue.slots.get(key) else {
            continue;
        };
        if slot.wait_for_write {
            let _ = slot.write_gate.set_exception(root.clone());
        }
        if slot.wait_for_read {
            let _ = slot.read_gate.set_exception(root.clone());
        }
    }
}

/// A pipelined HTTP/1 client connection over one transport.
///
/// Cloning is cheap; every clone drives the same connection.
pub struct Connection<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for Connection<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Transport> Connection<T> {
    /// Wrap `transport`, speaking `version`, with default settings.
    pub fn new(transport: T, version: Version) -> Self {
        Self::with_config(
            transport,
            ConnectionConfig {
                version,
                ..ConnectionConfig::default()
            },
        )
    }

    pub fn with_config(transport: T, config: ConnectionConfig) -> Self {
        let (read, write) = tokio::io::split(transport);
        let shared = Shared {
            version: config.version,
            writer: tokio::sync::Mutex::new(WriteSide::new(
                write,
                config.version,
                config.write_buffer_capacity,
            )),
            reader: tokio::sync::Mutex::new(ReadSide::new(
                read,
                config.read_buffer_capacity,
                config.drain_buffer_size,
            )),
            config,
            queue: Mutex::new(Queue {
                slots: Slab::new(),
                active: List::new(),
                free: List::new(),
                writer: None,
            }),
            status: AtomicU8::new(ConnectionStatus::Open as u8),
            close_requested: AtomicBool::new(false),
            failure: OnceLock::new(),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    pub fn version(&self) -> Version {
        self.shared.version
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.status()
    }

    /// The error that failed the connection, if any.
    pub fn failure(&self) -> Option<Arc<HttpError>> {
        self.shared.failure().cloned()
    }

    /// Requests admitted and not yet retired.
    pub fn active_requests(&self) -> usize {
        self.shared.lock_queue().active.len()
    }

    /// Admit a new request.
    ///
    /// Returns once the request holds the write turn, after every earlier
    /// request has completed its write. Returns `Ok(None)` if the
    /// connection is closing, and the latched error if it has failed.
    /// Dropping the returned future while it waits withdraws the request
    /// from the queue.
    pub async fn create_request(
        &self,
        version: Version,
        policy: VersionPolicy,
    ) -> Result<Option<RequestHandle<T>>, HttpError> {
        if !policy.allows(version, self.shared.version) {
            return Err(HttpError::VersionMismatch {
                requested: version,
                connection: self.shared.version,
            });
        }
        self.shared.check_failure()?;
        if self.shared.is_closing() {
            return Ok(None);
        }

        let (owner, wait_for_write, gate) = {
            let mut guard = self.shared.lock_queue();
            let queue = &mut *guard;
            let wait_for_read = !queue.active.is_empty();
            let key = match queue.free.pop_front(&mut queue.slots) {
                Some(key) => key,
                None => queue.slots.insert(RequestSlot::new()),
            };
            let wait_for_write = queue.writer.is_some();
            if !wait_for_write {
                queue.writer = Some(key);
            }

            let slot = &mut queue.slots[key];
            slot.init(wait_for_write, wait_for_read);
            let owner = Owner {
                key,
                generation: slot.generation,
            };
            let gate = slot.write_gate.clone();
            if let Err(e) = queue.active.push_back(&mut queue.slots, key) {
                debug_assert!(false, "admitting request {key}: {e}");
            }
            debug!(key, wait_for_write, wait_for_read, "request admitted");
            (owner, wait_for_write, gate)
        };
        REQUESTS_CREATED.increment();

        let handle = RequestHandle::new(self.shared.clone(), owner);
        if wait_for_write {
            gate.wait().await.map_err(HttpError::from_root)?;
        }
        Ok(Some(handle))
    }
}
