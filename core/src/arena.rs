//! Append-only byte arena backing the memtable.
//!
//! Records are referenced by `(offset, len)` pairs into one contiguous buffer
//! instead of being heap-allocated one by one. Space is never reclaimed; the
//! arena lives exactly as long as the memtable that owns it.
//!
//! Allocation is a single `fetch_add` on the cursor. Only buffer growth takes
//! the write lock, so one thread at a time copies the old buffer and every
//! reader sees either the old or the fully copied buffer.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::constants::{ARENA_HEADROOM, ARENA_MAX_SIZE};
use crate::error::{CoreError, Result};

pub struct Arena {
    /// Backing buffer. The write lock doubles as the growth gate.
    buf: RwLock<Box<[u8]>>,
    /// Next free byte. May run past `capacity` once a fatal error was hit.
    offset: AtomicUsize,
    /// Mirror of `buf.len()` for the lock-free allocation fast path.
    capacity: AtomicUsize,
    growable: bool,
    /// First fatal error. Once set, every allocation fails.
    failure: OnceLock<CoreError>,
}

impl Arena {
    /// Create a fixed-size arena. Allocating past `capacity` is fatal.
    pub fn new(capacity: usize) -> Self {
        Self::with_growth(capacity, false)
    }

    /// Create an arena that optionally grows its buffer on demand.
    pub fn with_growth(capacity: usize, growable: bool) -> Self {
        Self {
            buf: RwLock::new(vec![0u8; capacity].into_boxed_slice()),
            offset: AtomicUsize::new(0),
            capacity: AtomicUsize::new(capacity),
            growable,
            failure: OnceLock::new(),
        }
    }

    /// Reserve `size` bytes and return the start offset of the range.
    pub fn allocate(&self, size: usize) -> Result<usize> {
        if let Some(err) = self.failure.get() {
            return Err(err.clone());
        }
        if self.growable && size > ARENA_MAX_SIZE {
            return Err(self.fail(CoreError::GrowthCeilingExceeded {
                required: size,
                ceiling: ARENA_MAX_SIZE,
            }));
        }

        let start = self.offset.fetch_add(size, Ordering::AcqRel);
        let end = start.saturating_add(size);

        if !self.growable {
            let capacity = self.capacity.load(Ordering::Acquire);
            if end > capacity {
                return Err(self.fail(CoreError::CapacityExceeded {
                    requested: size,
                    offset: start,
                    capacity,
                }));
            }
            return Ok(start);
        }

        if end.saturating_add(ARENA_HEADROOM) > self.capacity.load(Ordering::Acquire) {
            self.grow(end, size)?;
        }
        Ok(start)
    }

    /// Allocate `data.len()` bytes and copy `data` into them.
    ///
    /// The copy holds the buffer write lock, so concurrent puts and reads
    /// are serialized for its duration. Allocation itself stays lock-free.
    pub fn put_bytes(&self, data: &[u8]) -> Result<usize> {
        let start = self.allocate(data.len())?;
        let mut buf = self.buf.write();
        buf[start..start + data.len()].copy_from_slice(data);
        Ok(start)
    }

    /// Copy out `[offset, offset + size)`.
    pub fn get_bytes(&self, offset: usize, size: usize) -> Result<Vec<u8>> {
        self.read_with(offset, size, |bytes| bytes.to_vec())
    }

    /// Run `f` over `[offset, offset + size)` without copying.
    ///
    /// The buffer read lock is held while `f` runs, so `f` must not allocate
    /// from this arena.
    pub fn read_with<R>(&self, offset: usize, size: usize, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let buf = self.buf.read();
        let allocated = self.offset.load(Ordering::Acquire).min(buf.len());
        match offset.checked_add(size) {
            Some(end) if end <= allocated => Ok(f(&buf[offset..end])),
            _ => Err(CoreError::InvalidRange {
                offset,
                size,
                allocated,
            }),
        }
    }

    /// Bytes handed out so far.
    pub fn allocated(&self) -> usize {
        self.offset
            .load(Ordering::Acquire)
            .min(self.capacity.load(Ordering::Acquire))
    }

    /// Current length of the backing buffer.
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    pub fn is_growable(&self) -> bool {
        self.growable
    }

    pub fn is_empty(&self) -> bool {
        self.offset.load(Ordering::Acquire) == 0
    }

    /// Grow until `end` fits with headroom to spare, or fail at the ceiling.
    fn grow(&self, end: usize, size: usize) -> Result<()> {
        let mut buf = self.buf.write();
        if end > buf.len().max(ARENA_MAX_SIZE) {
            return Err(self.fail(CoreError::GrowthCeilingExceeded {
                required: end,
                ceiling: ARENA_MAX_SIZE,
            }));
        }

        // Another allocator may have grown the buffer while we waited.
        while end.saturating_add(ARENA_HEADROOM) > buf.len() {
            let old_len = buf.len();
            let Some(new_len) = next_len(old_len, size) else {
                // At or past the ceiling, and `end` already fits.
                break;
            };

            let mut grown = vec![0u8; new_len].into_boxed_slice();
            grown[..old_len].copy_from_slice(&buf);
            *buf = grown;
            self.capacity.store(new_len, Ordering::Release);
            tracing::debug!(old_len, new_len, "arena grown");
        }
        Ok(())
    }

    fn fail(&self, err: CoreError) -> CoreError {
        tracing::warn!(error = %err, "arena exhausted");
        let _ = self.failure.set(err.clone());
        err
    }
}

/// Buffer length after one growth step. `None` once the ceiling is reached.
fn next_len(old_len: usize, size: usize) -> Option<usize> {
    if old_len >= ARENA_MAX_SIZE {
        return None;
    }
    let grow_by = size.max(old_len).max(ARENA_HEADROOM);
    Some((old_len + grow_by).min(ARENA_MAX_SIZE))
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("allocated", &self.allocated())
            .field("capacity", &self.capacity())
            .field("growable", &self.growable)
            .field("exhausted", &self.failure.get().is_some())
            .finish()
    }
}
