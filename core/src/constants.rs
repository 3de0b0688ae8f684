/// Free space a growable arena keeps ahead of its allocation cursor.
pub const ARENA_HEADROOM: usize = 64;
/// Hard ceiling on the size of an arena's backing buffer.
pub const ARENA_MAX_SIZE: usize = 1 << 30;

/// Level count a fresh skip list starts with.
pub const SKIPLIST_DEFAULT_LEVELS: usize = 3;

/// Smallest bloom filter bit vector.
pub const BLOOM_MIN_BITS: usize = 64;
pub const BLOOM_MIN_PROBES: usize = 1;
pub const BLOOM_MAX_PROBES: usize = 30;
/// Keeps probe positions in the non-negative `i32` range.
pub const BLOOM_POSITIVE_MASK: u32 = 0x7FFF_FFFF;
/// Seed for hashing byte keys into a bloom filter.
pub const BLOOM_HASH_SEED: u32 = 0;
