//! Memtable glue over the core primitives.
//!
//! - Arena: encoded records, addressed by offset
//! - SkipList: key index over arena handles
//! - BloomFilter: built when a memtable is sealed for flushing

mod memtable;
mod types;
mod varint;

pub use memtable::{MemTable, SealedMemTable};
pub use types::{Entry, Key, SeqNum, Value};
