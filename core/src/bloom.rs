//! Bloom filter used by table segments to skip lookups for absent keys.
//!
//! Probing uses double hashing over one 32-bit key: a per-key delta is derived
//! by rotating the key, and each round advances the position by that delta.
//! The rotation and addition are part of the filter format; changing them
//! invalidates existing filter bytes.
//!
//! Both the bulk constructor and `insert` wrap every position with the same
//! positive mask.

use xxhash_rust::xxh32::xxh32;

use crate::constants::{
    BLOOM_HASH_SEED, BLOOM_MAX_PROBES, BLOOM_MIN_BITS, BLOOM_MIN_PROBES, BLOOM_POSITIVE_MASK,
};
use crate::error::{CoreError, Result};

#[derive(Clone)]
pub struct BloomFilter {
    bits: Vec<u8>,
    num_probes: usize,
    bits_per_key: usize,
}

impl BloomFilter {
    /// Size a filter for `entries` keys at false-positive rate `fp_rate`.
    pub fn new(fp_rate: f64, entries: usize) -> Result<Self> {
        if !(fp_rate > 0.0 && fp_rate < 1.0) {
            return Err(CoreError::InvalidFalsePositiveRate(fp_rate));
        }
        if entries == 0 {
            return Err(CoreError::InvalidEntryCount(entries));
        }

        let bits_per_key = bits_per_key(entries, fp_rate);
        let num_probes = num_probes(bits_per_key);
        let num_bits = bits_per_key
            .checked_mul(entries)
            .ok_or(CoreError::InvalidEntryCount(entries))?
            .max(BLOOM_MIN_BITS);
        let num_bytes = num_bits.div_ceil(8);

        tracing::debug!(entries, fp_rate, bits = num_bytes * 8, num_probes, "bloom filter sized");

        Ok(Self {
            bits: vec![0u8; num_bytes],
            num_probes,
            bits_per_key,
        })
    }

    /// Size a filter and populate it with `keys`.
    pub fn with_keys(fp_rate: f64, entries: usize, keys: &[u32]) -> Result<Self> {
        let mut filter = Self::new(fp_rate, entries)?;
        for &key in keys {
            filter.insert(key);
        }
        Ok(filter)
    }

    pub fn insert(&mut self, key: u32) {
        let num_bits = self.num_bits();
        for pos in probes(key, self.num_probes, num_bits) {
            self.bits[pos / 8] |= 1 << (pos % 8);
        }
    }

    /// `false` means the key was never inserted. `true` means it may have been.
    pub fn may_contain(&self, key: u32) -> bool {
        if self.bits.is_empty() {
            return false;
        }
        probes(key, self.num_probes, self.num_bits()).all(|pos| self.bits[pos / 8] & (1 << (pos % 8)) != 0)
    }

    pub fn num_probes(&self) -> usize {
        self.num_probes
    }

    pub fn num_bits(&self) -> usize {
        self.bits.len() * 8
    }

    pub fn bits_per_key(&self) -> usize {
        self.bits_per_key
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits())
            .field("num_probes", &self.num_probes)
            .field("bits_per_key", &self.bits_per_key)
            .finish()
    }
}

/// Hash a byte key into the 32-bit domain the filter probes.
///
/// The hash is part of the filter format, so it must not change between builds.
pub fn hash_key(key: &[u8]) -> u32 {
    xxh32(key, BLOOM_HASH_SEED)
}

/// `ceil(-n * ln(p) / ln(2)^2 / n)`
fn bits_per_key(entries: usize, fp_rate: f64) -> usize {
    let n = entries as f64;
    let total = -n * fp_rate.ln() / std::f64::consts::LN_2.powi(2);
    (total / n).ceil() as usize
}

fn num_probes(bits_per_key: usize) -> usize {
    let k = (std::f64::consts::LN_2 * bits_per_key as f64).round() as usize;
    k.clamp(BLOOM_MIN_PROBES, BLOOM_MAX_PROBES)
}

/// Bit positions touched by `key`, in probe order.
fn probes(key: u32, rounds: usize, num_bits: usize) -> impl Iterator<Item = usize> {
    let delta = key.rotate_right(17) & BLOOM_POSITIVE_MASK;
    let mut x = key;
    (0..rounds).map(move |_| {
        let pos = x as usize % num_bits;
        x = x.wrapping_add(delta) & BLOOM_POSITIVE_MASK;
        pos
    })
}
