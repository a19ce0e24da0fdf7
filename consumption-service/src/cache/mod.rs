//! Bounded recency cache with per-entry TTL.
//!
//! Entries live in an index-linked list stored in a slab (`Vec<Option<Node>>`)
//! so that lookups, recency bumps and evictions are all O(1). The head of the
//! list is the least recently used entry, the tail the most recently used.
//! Expired entries are only removed when they are read, or when they happen to
//! be the LRU victim of an insert.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

pub const DEFAULT_CAPACITY: usize = 100;

struct Node<V> {
    key: String,
    value: V,
    expires_at: Instant,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Inner<V> {
    index: HashMap<String, usize>,
    slots: Vec<Option<Node<V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<V> Inner<V> {
    fn new(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    fn node(&self, slot: usize) -> Option<&Node<V>> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, slot: usize) -> Option<&mut Node<V>> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = match self.node(slot) {
            Some(n) => (n.prev, n.next),
            None => return,
        };

        match prev.and_then(|p| self.node_mut(p)) {
            Some(p) => p.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.node_mut(n)) {
            Some(n) => n.prev = prev,
            None => self.tail = prev,
        }

        if let Some(n) = self.node_mut(slot) {
            n.prev = None;
            n.next = None;
        }
    }

    fn push_back(&mut self, slot: usize) {
        let old_tail = self.tail;
        if let Some(n) = self.node_mut(slot) {
            n.prev = old_tail;
            n.next = None;
        }
        match old_tail.and_then(|t| self.node_mut(t)) {
            Some(t) => t.next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }

    fn remove(&mut self, slot: usize) -> Option<Node<V>> {
        self.unlink(slot);
        let node = self.slots.get_mut(slot).and_then(Option::take)?;
        self.index.remove(&node.key);
        self.free.push(slot);
        Some(node)
    }

    fn allocate(&mut self, node: Node<V>) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }
}

/// Thread-safe key/value cache holding at most `capacity` entries.
///
/// Every operation takes the single internal lock, so the index and the
/// recency order are always updated together.
pub struct RecencyCache<V> {
    capacity: usize,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> RecencyCache<V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<V>> {
        // No error channel: a poisoned lock still guards a consistent list.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the live value for `key`, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        let slot = *inner.index.get(key)?;

        let expired = inner
            .node(slot)
            .map(|n| Instant::now() > n.expires_at)
            .unwrap_or(true);
        if expired {
            inner.remove(slot);
            return None;
        }

        inner.unlink(slot);
        inner.push_back(slot);
        inner.node(slot).map(|n| n.value.clone())
    }

    /// Inserts or overwrites `key`, expiring `ttl` from now.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let mut inner = self.lock();
        let expires_at = Instant::now() + ttl;

        let existing = inner.index.get(key).copied();
        if let Some(slot) = existing {
            if let Some(n) = inner.node_mut(slot) {
                n.value = value;
                n.expires_at = expires_at;
            }
            inner.unlink(slot);
            inner.push_back(slot);
            return;
        }

        if inner.index.len() >= self.capacity {
            if let Some(victim) = inner.head {
                if let Some(evicted) = inner.remove(victim) {
                    tracing::debug!(key = %evicted.key, "evicted least recently used cache entry");
                }
            }
        }

        let slot = inner.allocate(Node {
            key: key.to_string(),
            value,
            expires_at,
            prev: None,
            next: None,
        });
        inner.index.insert(key.to_string(), slot);
        inner.push_back(slot);
    }

    /// Removes `key`; returns whether an entry was present.
    pub fn clear(&self, key: &str) -> bool {
        let mut inner = self.lock();
        let slot = inner.index.get(key).copied();
        match slot {
            Some(slot) => inner.remove(slot).is_some(),
            None => false,
        }
    }

    /// Number of stored entries, including ones that expired but were not read yet.
    pub fn len(&self) -> usize {
        self.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for RecencyCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
