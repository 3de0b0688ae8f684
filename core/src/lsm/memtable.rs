//! Arena-backed memtable.
//!
//! Each write is encoded once into the memtable's [`Arena`]; the key index is
//! a [`SkipList`] of `(offset, len)` handles scored by the hash of the key, so
//! every version of a key sits in one run of equal scores. Sealing freezes the
//! arena and index and builds a [`BloomFilter`] over the keys.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::types::{Entry, Key, SeqNum, Value};
use crate::arena::Arena;
use crate::bloom::{self, BloomFilter};
use crate::config::MemTableConfig;
use crate::error::Result;
use crate::skiplist::{SkipList, hash_score};

/// Location of one encoded record in the arena.
#[derive(Clone, Copy, Debug)]
struct RecordRef {
    offset: usize,
    len: usize,
}

/// In-memory write buffer.
///
/// Writes and reads take `&self`: arena allocation is lock-free and the index
/// sits behind a single-writer `RwLock`.
pub struct MemTable {
    config: MemTableConfig,
    arena: Arena,
    index: RwLock<SkipList<RecordRef>>,
    next_seq_num: AtomicU64,
}

impl MemTable {
    pub fn new(config: MemTableConfig) -> Self {
        Self::with_seq_num(config, 1)
    }

    /// Create a memtable starting from a specific sequence number.
    pub fn with_seq_num(config: MemTableConfig, start_seq_num: SeqNum) -> Self {
        let arena = Arena::with_growth(config.arena_capacity, config.arena_growable);
        let index = SkipList::with_levels(config.skiplist_levels);
        Self {
            config,
            arena,
            index: RwLock::new(index),
            next_seq_num: AtomicU64::new(start_seq_num),
        }
    }

    fn alloc_seq_num(&self) -> SeqNum {
        self.next_seq_num.fetch_add(1, Ordering::SeqCst)
    }

    /// Next sequence number to be handed out.
    pub fn current_seq_num(&self) -> SeqNum {
        self.next_seq_num.load(Ordering::SeqCst)
    }

    /// Put a key-value pair. Returns the sequence number assigned.
    pub fn put(&self, key: Key, value: Value) -> Result<SeqNum> {
        let seq_num = self.alloc_seq_num();
        self.insert_entry(&Entry::put(key, seq_num, value))?;
        Ok(seq_num)
    }

    /// Write a tombstone for `key`. Returns the sequence number assigned.
    pub fn delete(&self, key: Key) -> Result<SeqNum> {
        let seq_num = self.alloc_seq_num();
        self.insert_entry(&Entry::delete(key, seq_num))?;
        Ok(seq_num)
    }

    /// Insert an entry carrying its own sequence number (log replay).
    pub fn insert_entry(&self, entry: &Entry) -> Result<()> {
        let bytes = entry.encode();
        let offset = self.arena.put_bytes(&bytes)?;
        let record = RecordRef {
            offset,
            len: bytes.len(),
        };
        self.index
            .write()
            .add_with_score(record, hash_score(entry.key.as_bytes()));
        self.next_seq_num
            .fetch_max(entry.seq_num + 1, Ordering::SeqCst);
        Ok(())
    }

    /// Latest version of `key`.
    /// Returns Some(Some(value)) if found, Some(None) if deleted (tombstone),
    /// or None if the key was never written here.
    pub fn get(&self, key: &Key) -> Result<Option<Option<Value>>> {
        let index = self.index.read();
        Ok(lookup(&self.arena, &index, key)?
            .into_iter()
            .next()
            .map(|entry| entry.value))
    }

    /// Every version of `key`, newest first.
    pub fn get_all(&self, key: &Key) -> Result<Vec<Entry>> {
        let index = self.index.read();
        lookup(&self.arena, &index, key)
    }

    /// All entries sorted by key, newest version first within a key.
    pub fn entries(&self) -> Result<Vec<Entry>> {
        let index = self.index.read();
        sorted_entries(&self.arena, &index)
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Arena bytes used by encoded records.
    pub fn size_bytes(&self) -> usize {
        self.arena.allocated()
    }

    pub fn should_flush(&self) -> bool {
        self.size_bytes() >= self.config.flush_threshold
    }

    /// Freeze this memtable and build its bloom filter.
    pub fn seal(self) -> Result<SealedMemTable> {
        let index = self.index.into_inner();

        let mut hashes = Vec::with_capacity(index.len());
        for record in index.iter() {
            let entry = decode_record(&self.arena, record)?;
            hashes.push(bloom::hash_key(entry.key.as_bytes()));
        }
        hashes.sort_unstable();
        hashes.dedup();

        let bloom = BloomFilter::with_keys(self.config.bloom_fp_rate, hashes.len().max(1), &hashes)?;
        tracing::debug!(
            entries = index.len(),
            keys = hashes.len(),
            bytes = self.arena.allocated(),
            "memtable sealed"
        );

        Ok(SealedMemTable {
            arena: self.arena,
            index,
            bloom,
            next_seq_num: self.next_seq_num.into_inner(),
        })
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new(MemTableConfig::default())
    }
}

/// Read-only memtable waiting to be written out as a table segment.
pub struct SealedMemTable {
    arena: Arena,
    index: SkipList<RecordRef>,
    bloom: BloomFilter,
    next_seq_num: SeqNum,
}

impl SealedMemTable {
    /// `false` means `key` is definitely not in this table.
    pub fn may_contain(&self, key: &Key) -> bool {
        self.bloom.may_contain(bloom::hash_key(key.as_bytes()))
    }

    /// Latest version of `key`, consulting the bloom filter first.
    pub fn get(&self, key: &Key) -> Result<Option<Option<Value>>> {
        if !self.may_contain(key) {
            return Ok(None);
        }
        Ok(lookup(&self.arena, &self.index, key)?
            .into_iter()
            .next()
            .map(|entry| entry.value))
    }

    pub fn entries(&self) -> Result<Vec<Entry>> {
        sorted_entries(&self.arena, &self.index)
    }

    pub fn bloom(&self) -> &BloomFilter {
        &self.bloom
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Sequence number the next memtable should start from.
    pub fn next_seq_num(&self) -> SeqNum {
        self.next_seq_num
    }
}

fn decode_record(arena: &Arena, record: &RecordRef) -> Result<Entry> {
    arena.read_with(record.offset, record.len, Entry::decode)?
}

/// Versions of `key`, newest first. Hash collisions share the score run, so
/// each candidate's key is compared.
fn lookup(arena: &Arena, index: &SkipList<RecordRef>, key: &Key) -> Result<Vec<Entry>> {
    let score = hash_score(key.as_bytes());
    let mut found = Vec::new();
    for (_, record) in index.iter_from(score).take_while(|(s, _)| *s == score) {
        let entry = decode_record(arena, record)?;
        if entry.key == *key {
            found.push(entry);
        }
    }
    found.sort_by(|a, b| b.seq_num.cmp(&a.seq_num));
    Ok(found)
}

fn sorted_entries(arena: &Arena, index: &SkipList<RecordRef>) -> Result<Vec<Entry>> {
    let mut entries = index
        .iter()
        .map(|record| decode_record(arena, record))
        .collect::<Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}
