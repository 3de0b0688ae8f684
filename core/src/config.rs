//! Configuration for memtables built on the core primitives.

use crate::constants::SKIPLIST_DEFAULT_LEVELS;

/// Configuration for a memtable.
#[derive(Clone, Debug)]
pub struct MemTableConfig {
    /// Initial arena size in bytes.
    pub arena_capacity: usize,
    /// Whether the arena may grow past `arena_capacity`.
    pub arena_growable: bool,
    /// Initial level count of the key index.
    pub skiplist_levels: usize,
    /// Target false-positive rate of the filter built at seal time.
    pub bloom_fp_rate: f64,
    /// Arena usage at which the memtable asks to be flushed.
    pub flush_threshold: usize,
}

impl Default for MemTableConfig {
    fn default() -> Self {
        Self {
            arena_capacity: 4 * 1024 * 1024, // 4MB
            arena_growable: true,
            skiplist_levels: SKIPLIST_DEFAULT_LEVELS,
            bloom_fp_rate: 0.01,
            flush_threshold: 4 * 1024 * 1024,
        }
    }
}
