//! Chunk cache (spec.md §3, §4.6).
//!
//! A small bounded least-recently-used map from chunk number to decoded
//! plaintext, generalized from the teacher's single-slot `ChunkCache` into a
//! capacity-`N` ring so repeated out-of-order reads within a working set
//! don't all miss. Exclusively owned by one handle; never shared.

const DEFAULT_CAPACITY: usize = 8;

struct Entry {
    chunk_number: u64,
    buffer: Vec<u8>,
    valid_bytes: usize,
}

/// LRU cache of decoded chunk plaintext, keyed by global chunk number.
pub struct ChunkCache {
    capacity: usize,
    // Most-recently-used at the back.
    entries: Vec<Entry>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ChunkCache {
            capacity: capacity.max(1),
            entries: Vec::new(),
        }
    }

    /// Returns the cached plaintext for `chunk_number`, if present, marking
    /// it most-recently-used.
    pub fn get(&mut self, chunk_number: u64) -> Option<&[u8]> {
        let pos = self.entries.iter().position(|e| e.chunk_number == chunk_number)?;
        let entry = self.entries.remove(pos);
        self.entries.push(entry);
        Some(&self.entries.last().unwrap().buffer[..self.entries.last().unwrap().valid_bytes])
    }

    /// Inserts a freshly decoded chunk, evicting the least-recently-used
    /// entry if the cache is full.
    pub fn insert(&mut self, chunk_number: u64, buffer: Vec<u8>, valid_bytes: usize) {
        debug_assert!(valid_bytes <= buffer.len());
        if let Some(pos) = self.entries.iter().position(|e| e.chunk_number == chunk_number) {
            self.entries.remove(pos);
        } else if self.entries.len() >= self.capacity {
            self.entries.remove(0);
        }
        self.entries.push(Entry {
            chunk_number,
            buffer,
            valid_bytes,
        });
    }

    /// Drops every cached entry (spec.md §4.6: invalidated on close or on a
    /// read/write mode switch).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new()
    }
}
