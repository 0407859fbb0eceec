//! Byte buffer pool keyed by exact length
//!
//! I/O-heavy paths (the streaming scanner, header validation) borrow scratch
//! buffers here instead of allocating per call. Each distinct length gets its
//! own lock-free free list; the map of lists is guarded by a read-write lock
//! that is only taken for writing the first time a length is released.
//!
//! Retention is bounded: buffers longer than `max_buffer_len` are never kept,
//! and at most `max_sizes` distinct lengths get a free list.

use ahash::AHashMap;
use crossbeam::queue::SegQueue;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Buffers retained per length before releases are dropped
pub const DEFAULT_MAX_PER_SIZE: usize = 64;

/// Longest buffer a default pool keeps
pub const DEFAULT_MAX_BUFFER_LEN: usize = 1024 * 1024;

/// Distinct lengths a pool keeps free lists for
pub const DEFAULT_MAX_SIZES: usize = 32;

/// Buffer pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// Acquires served from a free list
    pub hits: u64,
    /// Acquires that allocated a fresh buffer
    pub misses: u64,
    /// Distinct buffer lengths with a free list
    pub sizes: usize,
    /// Buffers currently idle in the pool
    pub pooled: usize,
}

impl BufferPoolStats {
    /// Calculate hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

pub struct BufferPool {
    lists: RwLock<AHashMap<usize, Arc<SegQueue<Vec<u8>>>>>,
    max_per_size: usize,
    max_buffer_len: usize,
    max_sizes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_max_per_size(DEFAULT_MAX_PER_SIZE)
    }

    /// Create a pool that keeps at most `max_per_size` idle buffers per length
    pub fn with_max_per_size(max_per_size: usize) -> Self {
        Self::with_limits(max_per_size, DEFAULT_MAX_BUFFER_LEN, DEFAULT_MAX_SIZES)
    }

    /// Create a pool with explicit retention limits
    pub fn with_limits(max_per_size: usize, max_buffer_len: usize, max_sizes: usize) -> Self {
        BufferPool {
            lists: RwLock::new(AHashMap::new()),
            max_per_size,
            max_buffer_len,
            max_sizes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Longest buffer this pool keeps
    pub fn max_buffer_len(&self) -> usize {
        self.max_buffer_len
    }

    /// Free list for `size`, created on demand while under `max_sizes`
    fn list_for_release(&self, size: usize) -> Option<Arc<SegQueue<Vec<u8>>>> {
        if let Some(list) = self.lists.read().get(&size) {
            return Some(Arc::clone(list));
        }

        let mut lists = self.lists.write();
        if let Some(list) = lists.get(&size) {
            return Some(Arc::clone(list));
        }
        if lists.len() >= self.max_sizes {
            return None;
        }
        Some(Arc::clone(
            lists.entry(size).or_insert_with(|| Arc::new(SegQueue::new())),
        ))
    }

    /// Borrow a buffer of exactly `size` bytes.
    ///
    /// Reused buffers keep whatever their previous holder wrote.
    pub fn acquire(&self, size: usize) -> Vec<u8> {
        if size == 0 {
            return Vec::new();
        }

        let pooled = if size <= self.max_buffer_len {
            self.lists.read().get(&size).and_then(|list| list.pop())
        } else {
            None
        };

        match pooled {
            Some(buf) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                vec![0u8; size]
            }
        }
    }

    /// Return a buffer to the list for its current length.
    ///
    /// Buffers over `max_buffer_len`, or of a new length once `max_sizes`
    /// lengths are tracked, are dropped.
    pub fn release(&self, buf: Vec<u8>) {
        if buf.is_empty() || buf.len() > self.max_buffer_len {
            return;
        }

        if let Some(list) = self.list_for_release(buf.len()) {
            if list.len() < self.max_per_size {
                list.push(buf);
            }
        }
    }

    /// Get buffer pool statistics
    pub fn stats(&self) -> BufferPoolStats {
        let lists = self.lists.read();
        BufferPoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sizes: lists.len(),
            pooled: lists.values().map(|list| list.len()).sum(),
        }
    }

    /// Drop all idle buffers and reset statistics
    pub fn clear(&self) {
        self.lists.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("max_per_size", &self.max_per_size)
            .field("max_buffer_len", &self.max_buffer_len)
            .field("max_sizes", &self.max_sizes)
            .field("stats", &self.stats())
            .finish()
    }
}
