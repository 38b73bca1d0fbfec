//! Growable byte buffer with a committed region and optional read padding.
//!
//! Layout of the backing storage:
//!
//! ```text
//! [ discarded | active (committed) | available | padding ]
//!             ^start               ^end       ^capacity
//! ```
//!
//! Producers write into [`Buffer::available_mut`] and then [`commit`](Buffer::commit)
//! what landed; consumers read [`Buffer::active`] and [`discard`](Buffer::discard)
//! what they used. Padding bytes are always allocated and initialized so a
//! fixed-width load starting anywhere in the active region stays in bounds.

/// Widest vector load the header scanner issues.
pub const VECTOR_WIDTH: usize = 32;

/// Padding a read buffer carries past its capacity.
pub const READ_PADDING: usize = VECTOR_WIDTH - 1;

pub struct Buffer {
    storage: Vec<u8>,
    start: usize,
    end: usize,
    padding: usize,
}

impl Buffer {
    /// Create a buffer with the given initial capacity and no padding.
    pub fn new(capacity: usize) -> Self {
        Self::with_padding(capacity, 0)
    }

    /// Create a buffer whose storage always extends `padding` bytes past
    /// the usable capacity.
    pub fn with_padding(capacity: usize, padding: usize) -> Self {
        Buffer {
            storage: vec![0; capacity + padding],
            start: 0,
            end: 0,
            padding,
        }
    }

    /// Usable capacity, excluding padding.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len() - self.padding
    }

    /// Number of committed, unconsumed bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Free bytes after the committed region.
    #[inline]
    pub fn available_len(&self) -> usize {
        self.capacity() - self.end
    }

    /// The committed, unconsumed bytes.
    #[inline]
    pub fn active(&self) -> &[u8] {
        &self.storage[self.start..self.end]
    }

    #[inline]
    pub fn active_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.start..self.end]
    }

    /// The active region followed by at least `padding` readable bytes.
    ///
    /// Returns the slice and the length of its meaningful prefix. Bytes past
    /// that prefix are initialized but carry no meaning.
    #[inline]
    pub fn active_padded_mut(&mut self) -> (&mut [u8], usize) {
        let len = self.len();
        (&mut self.storage[self.start..self.end + self.padding], len)
    }

    /// Space after the committed region, for external writes to land in.
    #[inline]
    pub fn available_mut(&mut self) -> &mut [u8] {
        let capacity = self.capacity();
        &mut self.storage[self.end..capacity]
    }

    /// Guarantee at least `n` bytes of available space, compacting first and
    /// doubling the capacity if compaction is not enough.
    pub fn ensure_available(&mut self, n: usize) {
        if self.available_len() >= n {
            return;
        }

        let active = self.len();
        if self.capacity() - active >= n {
            self.storage.copy_within(self.start..self.end, 0);
        } else {
            let capacity = (self.capacity() * 2).max(active + n);
            let mut storage = vec![0; capacity + self.padding];
            storage[..active].copy_from_slice(self.active());
            self.storage = storage;
        }
        self.start = 0;
        self.end = active;
    }

    /// Mark `n` bytes of the available region as committed.
    pub fn commit(&mut self, n: usize) {
        debug_assert!(
            n <= self.available_len(),
            "commit({n}) exceeds available space {}",
            self.available_len()
        );
        self.end += n.min(self.available_len());
    }

    /// Consume `n` bytes from the front of the active region.
    pub fn discard(&mut self, n: usize) {
        debug_assert!(n <= self.len(), "discard({n}) exceeds buffer length {}", self.len());
        self.start += n.min(self.len());
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    /// Append bytes, growing as needed.
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.ensure_available(data.len());
        self.available_mut()[..data.len()].copy_from_slice(data);
        self.end += data.len();
    }

    /// Discard everything.
    pub fn clear(&mut self) {
        self.start = 0;
        self.end = 0;
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("padding", &self.padding)
            .finish()
    }
}

impl std::fmt::Write for Buffer {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.extend_from_slice(s.as_bytes());
        Ok(())
    }
}
