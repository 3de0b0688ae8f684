// Public API
pub mod arena;
pub mod bloom;
pub mod config;
pub mod error;
pub mod lsm;
pub mod skiplist;

// Internal modules
pub(crate) mod constants;

pub use arena::Arena;
pub use bloom::BloomFilter;
pub use config::MemTableConfig;
pub use error::{CoreError, Result};
pub use skiplist::SkipList;
