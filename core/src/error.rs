//! Error types for the storage primitives.

use thiserror::Error;

/// Result type alias using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the arena, bloom filter and memtable glue.
///
/// Arena capacity errors are fatal for the arena that produced them: the
/// owning memtable has to be sealed and replaced, never retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("arena capacity exceeded: requested {requested} bytes at offset {offset}, capacity {capacity}")]
    CapacityExceeded {
        requested: usize,
        offset: usize,
        capacity: usize,
    },

    #[error("arena growth ceiling exceeded: {required} bytes required, ceiling is {ceiling}")]
    GrowthCeilingExceeded { required: usize, ceiling: usize },

    #[error("invalid arena range: [{offset}, {offset}+{size}) outside {allocated} allocated bytes")]
    InvalidRange {
        offset: usize,
        size: usize,
        allocated: usize,
    },

    #[error("false positive rate must be in (0, 1), got {0}")]
    InvalidFalsePositiveRate(f64),

    #[error("expected entry count must be positive, got {0}")]
    InvalidEntryCount(usize),

    #[error("corrupted record: {0}")]
    Corrupted(String),
}

impl CoreError {
    /// True for the errors after which an arena must be discarded.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CoreError::CapacityExceeded { .. } | CoreError::GrowthCeilingExceeded { .. }
        )
    }
}
