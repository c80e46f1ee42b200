//! Bounded cache of retired buffers.
//!
//! Native call sites such as directory enumeration and registry reads are
//! hot paths; allocating and freeing a scratch buffer per call dominates
//! their cost. A [`BufferPool`] keeps a small number of retired
//! [`GrowableBuffer`]s around for reuse.
//!
//! # Limits
//!
//! The pool never holds more than `max_slots` buffers, and never accepts a
//! buffer larger than `max_pooled_size` bytes; such buffers are freed on
//! release instead of being cached, so one oversized call does not pin its
//! memory for the life of the process.
//!
//! # Sharing
//!
//! [`BufferPool::shared()`] is the process-wide instance. It is created on
//! first use and lives until the process exits. Call sites take the pool
//! by reference (see [`Invoker`](crate::Invoker)) so tests and embedders
//! can supply their own.
//!
//! Every operation is safe under concurrent use. The lock covers only the
//! slot bookkeeping; allocation, growth and deallocation happen outside
//! it.

use crate::buffer::GrowableBuffer;
use crate::util::{lock_or_clear, read_env_var};
use crate::Error;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, OnceLock};

const DEFAULT_MAX_SLOTS: usize = 16;
const DEFAULT_MAX_POOLED_SIZE: usize = 64 * 1024;

const SLOTS_ENV: &str = "WINHOLD_POOL_SLOTS";
const MAX_BYTES_ENV: &str = "WINHOLD_POOL_MAX_BYTES";

// ===== Builder ========================================================

/// Builder to configure a [`BufferPool`].
///
/// Construct with [`BufferPool::builder()`].
#[derive(Debug, Clone)]
pub struct Builder {
    max_slots: usize,
    max_pooled_size: usize,
}

impl Builder {
    /// Set the maximum number of buffers the pool retains.
    ///
    /// Zero disables caching: every released buffer is freed.
    ///
    /// Default: 16.
    #[must_use]
    pub fn max_slots(mut self, max: usize) -> Self {
        self.max_slots = max;
        self
    }

    /// Set the largest buffer, in bytes, the pool accepts on release.
    ///
    /// Default: 64 KiB.
    #[must_use]
    pub fn max_pooled_size(mut self, bytes: usize) -> Self {
        self.max_pooled_size = bytes;
        self
    }

    /// Apply `WINHOLD_POOL_SLOTS` / `WINHOLD_POOL_MAX_BYTES` overrides.
    ///
    /// Empty or unset variables are ignored; unparsable ones are ignored
    /// with a warning.
    #[must_use]
    fn with_env_overrides(mut self) -> Self {
        if let Some(slots) = parse_env_usize(SLOTS_ENV) {
            self.max_slots = slots;
        }
        if let Some(bytes) = parse_env_usize(MAX_BYTES_ENV) {
            self.max_pooled_size = bytes;
        }
        self
    }

    /// Create the pool.
    pub fn build(self) -> BufferPool {
        BufferPool {
            // The slot limit is caller- or environment-controlled; never
            // reserve more than the default up front.
            slots: Mutex::new(Vec::with_capacity(self.max_slots.min(DEFAULT_MAX_SLOTS))),
            max_slots: self.max_slots,
            max_pooled_size: self.max_pooled_size,
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            max_slots: DEFAULT_MAX_SLOTS,
            max_pooled_size: DEFAULT_MAX_POOLED_SIZE,
        }
    }
}

fn parse_env_usize(name: &str) -> Option<usize> {
    let value = read_env_var(name)?;
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(variable = name, value = %value, "ignoring unparsable pool limit");
            None
        }
    }
}

// ===== BufferPool =====================================================

/// A bounded, thread-safe cache of [`GrowableBuffer`]s.
pub struct BufferPool {
    slots: Mutex<Vec<GrowableBuffer>>,
    max_slots: usize,
    max_pooled_size: usize,
}

impl BufferPool {
    /// Create a pool with default limits.
    pub fn new() -> Self {
        Builder::default().build()
    }

    /// Start configuring a pool.
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// The process-wide pool.
    ///
    /// Created on first use with the default limits, overridden by the
    /// `WINHOLD_POOL_SLOTS` and `WINHOLD_POOL_MAX_BYTES` environment
    /// variables when set. Never torn down before process exit.
    pub fn shared() -> &'static BufferPool {
        static SHARED: OnceLock<BufferPool> = OnceLock::new();
        SHARED.get_or_init(|| Builder::default().with_env_overrides().build())
    }

    /// Maximum number of retained buffers.
    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// Largest buffer, in bytes, accepted on release.
    pub fn max_pooled_size(&self) -> usize {
        self.max_pooled_size
    }

    /// Number of buffers currently retained.
    pub fn len(&self) -> usize {
        lock_or_clear(&self.slots).len()
    }

    /// Returns `true` if no buffers are retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take a buffer with at least `min_byte_capacity` bytes.
    ///
    /// Prefers the smallest retained buffer that is already large enough,
    /// then the largest retained buffer (grown), and allocates only when
    /// the pool is empty. The buffer is removed from the pool before this
    /// returns, so no two callers ever hold the same one.
    pub fn acquire(&self, min_byte_capacity: usize) -> Result<GrowableBuffer, Error> {
        let taken = {
            let mut slots = lock_or_clear(&self.slots);
            select_slot(&slots, min_byte_capacity).map(|index| slots.swap_remove(index))
        };

        match taken {
            Some(mut buffer) => {
                buffer.clear();
                buffer.ensure_byte_capacity(min_byte_capacity)?;
                Ok(buffer)
            }
            None => GrowableBuffer::new(min_byte_capacity),
        }
    }

    /// Hand a buffer back.
    ///
    /// The buffer is retained if it fits the size limit and a slot is
    /// free, otherwise it is freed immediately.
    pub fn release(&self, mut buffer: GrowableBuffer) {
        let capacity = buffer.byte_capacity();
        if capacity == 0 {
            return;
        }
        if capacity > self.max_pooled_size {
            trace!(capacity, limit = self.max_pooled_size, "dropping oversized buffer");
            return;
        }
        buffer.clear();

        let rejected = {
            let mut slots = lock_or_clear(&self.slots);
            if slots.len() < self.max_slots {
                slots.push(buffer);
                None
            } else {
                Some(buffer)
            }
        };
        if rejected.is_some() {
            trace!(capacity, slots = self.max_slots, "pool full; dropping buffer");
        }
    }

    /// Take a buffer that returns itself to this pool when dropped.
    pub fn lease(&self, min_byte_capacity: usize) -> Result<PooledBuffer<'_>, Error> {
        Ok(PooledBuffer {
            pool: self,
            buffer: self.acquire(min_byte_capacity)?,
        })
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("len", &self.len())
            .field("max_slots", &self.max_slots)
            .field("max_pooled_size", &self.max_pooled_size)
            .finish()
    }
}

/// Index of the retained buffer to hand out for a request of `min` bytes.
fn select_slot(slots: &[GrowableBuffer], min: usize) -> Option<usize> {
    let fitting = slots
        .iter()
        .enumerate()
        .filter(|(_, b)| b.byte_capacity() >= min)
        .min_by_key(|(_, b)| b.byte_capacity());
    let chosen = match fitting {
        Some(hit) => Some(hit),
        None => slots.iter().enumerate().max_by_key(|(_, b)| b.byte_capacity()),
    };
    chosen.map(|(index, _)| index)
}

// ===== PooledBuffer ===================================================

/// A buffer on loan from a [`BufferPool`].
///
/// Dereferences to [`GrowableBuffer`] and goes back to the pool on every
/// exit path, including unwinding.
pub struct PooledBuffer<'p> {
    pool: &'p BufferPool,
    buffer: GrowableBuffer,
}

impl PooledBuffer<'_> {
    /// Keep the buffer instead of returning it to the pool.
    pub fn into_inner(mut self) -> GrowableBuffer {
        // The empty placeholder left behind is not cached on drop.
        std::mem::take(&mut self.buffer)
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = GrowableBuffer;

    fn deref(&self) -> &GrowableBuffer {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut GrowableBuffer {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buffer));
    }
}

impl fmt::Debug for PooledBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PooledBuffer").field(&self.buffer).finish()
    }
}
