//! Per-request bookkeeping kept in the connection's slab.

use std::sync::Arc;

use protocol_http1::Version;
use wireline::{Completion, Linked, Links};

use crate::error::HttpError;
use crate::read::ReadType;

/// A turn gate. Completes with `Ok` when the turn is granted, or with the
/// connection's terminal error when it never will be.
pub(crate) type Gate = Completion<(), Arc<HttpError>>;

/// Which request, in which incarnation, holds a read or write side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Owner {
    pub(crate) key: usize,
    pub(crate) generation: u32,
}

/// How strictly a request's version must match the connection's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionPolicy {
    /// Only the requested version.
    #[default]
    RequestVersionExact,
    /// The requested version or an older one.
    RequestVersionOrLower,
    /// The requested version or a newer one.
    RequestVersionOrHigher,
}

impl VersionPolicy {
    /// Whether a connection speaking `connection` can serve `requested`.
    pub fn allows(self, requested: Version, connection: Version) -> bool {
        match self {
            VersionPolicy::RequestVersionExact => connection == requested,
            VersionPolicy::RequestVersionOrLower => connection <= requested,
            VersionPolicy::RequestVersionOrHigher => connection >= requested,
        }
    }
}

pub(crate) struct RequestSlot {
    links: Links,
    /// Bumped every time the slot is recycled.
    pub(crate) generation: u32,
    pub(crate) wait_for_write: bool,
    pub(crate) wait_for_read: bool,
    pub(crate) write_gate: Arc<Gate>,
    pub(crate) read_gate: Arc<Gate>,
    /// The request line has been buffered.
    pub(crate) write_started: bool,
    /// `complete_request` finished.
    pub(crate) write_finished: bool,
    pub(crate) head: bool,
    pub(crate) read_type: Option<ReadType>,
    pub(crate) status: u16,
    pub(crate) version: Option<Version>,
}

impl RequestSlot {
    pub(crate) fn new() -> Self {
        Self {
            links: Links::default(),
            generation: 0,
            wait_for_write: false,
            wait_for_read: false,
            write_gate: Arc::new(Gate::new()),
            read_gate: Arc::new(Gate::new()),
            write_started: false,
            write_finished: false,
            head: false,
            read_type: None,
            status: 0,
            version: None,
        }
    }

    /// Ready the slot for a new request.
    pub(crate) fn init(&mut self, wait_for_write: bool, wait_for_read: bool) {
        self.wait_for_write = wait_for_write;
        self.wait_for_read = wait_for_read;
        self.write_gate.reset();
        self.read_gate.reset();
        self.write_started = false;
        self.write_finished = false;
        self.head = false;
        self.read_type = None;
        self.status = 0;
        self.version = None;
    }

    /// Invalidate every handle to the current incarnation.
    pub(crate) fn retire(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

impl Linked for RequestSlot {
    fn links(&self) -> &Links {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}
