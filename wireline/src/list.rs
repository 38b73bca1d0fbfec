//! Doubly linked list threaded through nodes stored in a [`Slab`].
//!
//! The links live inside each node ([`Links`]), so a node costs no extra
//! allocation to enqueue. A node may be linked into at most one list at a
//! time. Every list carries its own id and stamps it into the nodes it
//! links, so pushing a linked node, or removing a node through a list that
//! does not hold it, is rejected. All operations are O(1).

use std::sync::atomic::{AtomicU32, Ordering};

use slab::Slab;
use tracing::warn;

use crate::error::Error;

// Zero is reserved for "not linked".
static NEXT_LIST_ID: AtomicU32 = AtomicU32::new(1);

/// Embedded list links.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Links {
    prev: Option<usize>,
    next: Option<usize>,
    list: u32,
}

impl Links {
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.list != 0
    }
}

/// A node type that embeds [`Links`].
pub trait Linked {
    fn links(&self) -> &Links;
    fn links_mut(&mut self) -> &mut Links;
}

/// List head. Node storage is owned by the caller's slab, so the same slab
/// can back several lists.
#[derive(Debug)]
pub struct List {
    id: u32,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

fn node<T: Linked>(arena: &Slab<T>, key: usize) -> Result<&T, Error> {
    arena.get(key).ok_or(Error::InvalidKey(key))
}

fn node_mut<T: Linked>(arena: &mut Slab<T>, key: usize) -> Result<&mut T, Error> {
    arena.get_mut(key).ok_or(Error::InvalidKey(key))
}

impl List {
    pub fn new() -> Self {
        let mut id = NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed);
        if id == 0 {
            // wrapped
            id = NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed);
        }
        List {
            id,
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn front(&self) -> Option<usize> {
        self.head
    }

    #[inline]
    pub fn back(&self) -> Option<usize> {
        self.tail
    }

    /// The node after `key` in this list.
    pub fn next<T: Linked>(&self, arena: &Slab<T>, key: usize) -> Option<usize> {
        arena.get(key).and_then(|n| n.links().next)
    }

    /// The node before `key` in this list.
    pub fn prev<T: Linked>(&self, arena: &Slab<T>, key: usize) -> Option<usize> {
        arena.get(key).and_then(|n| n.links().prev)
    }

    pub fn push_back<T: Linked>(&mut self, arena: &mut Slab<T>, key: usize) -> Result<(), Error> {
        let tail = self.tail;
        let links = node_mut(arena, key)?.links_mut();
        if links.is_linked() {
            return Err(Error::AlreadyLinked(key));
        }
        *links = Links {
            prev: tail,
            next: None,
            list: self.id,
        };
        match tail {
            Some(t) => node_mut(arena, t)?.links_mut().next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        self.len += 1;
        Ok(())
    }

    pub fn push_front<T: Linked>(&mut self, arena: &mut Slab<T>, key: usize) -> Result<(), Error> {
        let head = self.head;
        let links = node_mut(arena, key)?.links_mut();
        if links.is_linked() {
            return Err(Error::AlreadyLinked(key));
        }
        *links = Links {
            prev: None,
            next: head,
            list: self.id,
        };
        match head {
            Some(h) => node_mut(arena, h)?.links_mut().prev = Some(key),
            None => self.tail = Some(key),
        }
        self.head = Some(key);
        self.len += 1;
        Ok(())
    }

    pub fn pop_front<T: Linked>(&mut self, arena: &mut Slab<T>) -> Option<usize> {
        let key = self.head?;
        self.remove(arena, key).ok()?;
        Some(key)
    }

    pub fn pop_back<T: Linked>(&mut self, arena: &mut Slab<T>) -> Option<usize> {
        let key = self.tail?;
        self.remove(arena, key).ok()?;
        Some(key)
    }

    /// Unlink `key`. Fails without touching any links when the node is
    /// unlinked or belongs to another list.
    pub fn remove<T: Linked>(&mut self, arena: &mut Slab<T>, key: usize) -> Result<(), Error> {
        let links = *node(arena, key)?.links();
        if !links.is_linked() {
            return Err(Error::NotLinked(key));
        }
        if links.list != self.id {
            warn!(key, list = self.id, owner = links.list, "removing node held by another list");
            return Err(Error::ForeignNode(key));
        }
        match links.prev {
            Some(p) => node_mut(arena, p)?.links_mut().next = links.next,
            None => self.head = links.next,
        }
        match links.next {
            Some(n) => node_mut(arena, n)?.links_mut().prev = links.prev,
            None => self.tail = links.prev,
        }
        *node_mut(arena, key)?.links_mut() = Links::default();
        self.len -= 1;
        Ok(())
    }

    /// Iterate keys from front to back.
    pub fn iter<'a, T: Linked>(&self, arena: &'a Slab<T>) -> Iter<'a, T> {
        Iter {
            arena,
            next: self.head,
        }
    }
}

pub struct Iter<'a, T> {
    arena: &'a Slab<T>,
    next: Option<usize>,
}

impl<T: Linked> Iterator for Iter<'_, T> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let key = self.next?;
        self.next = self.arena.get(key).and_then(|n| n.links().next);
        Some(key)
    }
}
