//! Growable scratch memory for native calls.
//!
//! [`GrowableBuffer`] owns one contiguous, 8-byte-aligned allocation that a
//! native call writes into. Capacity only grows. The logical length records
//! how much of the capacity a successful call actually filled.
//!
//! Raw pointers handed out by [`as_mut_ptr`](GrowableBuffer::as_mut_ptr)
//! are invalidated by any call to
//! [`ensure_byte_capacity`](GrowableBuffer::ensure_byte_capacity); call
//! sites fetch a fresh pointer on every attempt.

use crate::Error;
use bytes::Bytes;
use std::fmt;

/// Allocation unit. Backing memory is a `Vec<u64>` so the region is
/// aligned for every NT structure the factory reads in place.
const WORD: usize = size_of::<u64>();

/// Size of one UTF-16 code unit.
const WCHAR: usize = size_of::<u16>();

/// An owned, grow-only block of native memory.
///
/// The allocation is released when the buffer is dropped. Buffers are
/// usually obtained from a [`BufferPool`](crate::BufferPool) rather than
/// created directly.
pub struct GrowableBuffer {
    words: Vec<u64>,
    len: usize,
}

impl GrowableBuffer {
    /// Create a buffer with at least `initial_byte_capacity` bytes.
    ///
    /// A zero capacity does not allocate. Capacities are rounded up to a
    /// multiple of 8 bytes.
    pub fn new(initial_byte_capacity: usize) -> Result<Self, Error> {
        let mut buffer = Self::empty();
        buffer.ensure_byte_capacity(initial_byte_capacity)?;
        Ok(buffer)
    }

    /// Create a buffer with no allocation.
    pub const fn empty() -> Self {
        Self {
            words: Vec::new(),
            len: 0,
        }
    }

    /// Allocated size in bytes.
    pub fn byte_capacity(&self) -> usize {
        self.words.len() * WORD
    }

    /// Grow the allocation to at least `min` bytes.
    ///
    /// No-op when the buffer is already large enough. Never shrinks, and
    /// keeps the current contents and logical length. Fails with
    /// `OutOfMemory` when the allocation cannot be satisfied.
    pub fn ensure_byte_capacity(&mut self, min: usize) -> Result<(), Error> {
        if min <= self.byte_capacity() {
            return Ok(());
        }
        let target_words = min.div_ceil(WORD);
        let additional = target_words - self.words.len();
        self.words.try_reserve_exact(additional).map_err(|e| {
            Error::out_of_memory(format!("cannot grow buffer to {min} bytes")).with_source(e)
        })?;
        self.words.resize(target_words, 0);
        Ok(())
    }

    /// Pointer to the start of the allocation, for passing to a native
    /// call alongside [`byte_capacity`](Self::byte_capacity).
    ///
    /// Null when the buffer has no allocation. Do not keep the pointer
    /// across a resize.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        if self.words.is_empty() {
            std::ptr::null_mut()
        } else {
            self.words.as_mut_ptr().cast()
        }
    }

    /// Read-only counterpart of [`as_mut_ptr`](Self::as_mut_ptr).
    pub fn as_ptr(&self) -> *const u8 {
        if self.words.is_empty() {
            std::ptr::null()
        } else {
            self.words.as_ptr().cast()
        }
    }

    /// Number of meaningful bytes.
    pub fn logical_length(&self) -> usize {
        self.len
    }

    /// Record how many bytes a call produced.
    ///
    /// Fails with `InvalidArgument` if `n` exceeds the capacity.
    pub fn set_logical_length(&mut self, n: usize) -> Result<(), Error> {
        let capacity = self.byte_capacity();
        if n > capacity {
            return Err(Error::invalid_argument(format!(
                "logical length {n} exceeds capacity {capacity}"
            )));
        }
        self.len = n;
        Ok(())
    }

    /// Reset the logical length to zero. Capacity is kept.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// The meaningful bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.capacity_bytes().get(..self.len).unwrap_or_default()
    }

    /// The meaningful bytes, copied into a [`Bytes`].
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }

    /// The whole allocation as bytes, regardless of logical length.
    pub fn capacity_bytes(&self) -> &[u8] {
        // SAFETY: `u64` has no padding or invalid bit patterns, every word
        // is initialised by `resize`, and `u8` has alignment 1.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast(), self.byte_capacity()) }
    }

    /// Mutable view of the whole allocation.
    pub fn capacity_bytes_mut(&mut self) -> &mut [u8] {
        let capacity = self.byte_capacity();
        // SAFETY: as for `capacity_bytes`; the borrow is unique.
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast(), capacity) }
    }

    /// Reinterpret the start of the allocation as `T`.
    ///
    /// Returns `None` if the allocation is smaller than `T` or `T` needs
    /// more than 8-byte alignment.
    ///
    /// # Safety
    ///
    /// The first `size_of::<T>()` bytes must hold a valid `T`, which for
    /// structures written by a native call means the call reported success.
    pub unsafe fn header<T>(&self) -> Option<&T> {
        if align_of::<T>() > WORD || self.byte_capacity() < size_of::<T>() {
            return None;
        }
        // SAFETY: size and alignment checked above; validity is the
        // caller's obligation.
        Some(unsafe { &*self.words.as_ptr().cast::<T>() })
    }

    // -- UTF-16 view --

    /// Capacity in UTF-16 code units.
    pub fn char_capacity(&self) -> usize {
        self.byte_capacity() / WCHAR
    }

    /// Grow to hold at least `min_chars` UTF-16 code units.
    pub fn ensure_char_capacity(&mut self, min_chars: usize) -> Result<(), Error> {
        let bytes = min_chars
            .checked_mul(WCHAR)
            .ok_or_else(|| Error::out_of_memory(format!("{min_chars} chars overflows usize")))?;
        self.ensure_byte_capacity(bytes)
    }

    /// Logical length in UTF-16 code units.
    pub fn char_length(&self) -> usize {
        self.len / WCHAR
    }

    /// Record how many UTF-16 code units a call produced.
    pub fn set_char_length(&mut self, n: usize) -> Result<(), Error> {
        let bytes = n.checked_mul(WCHAR).ok_or_else(|| {
            Error::invalid_argument(format!("char length {n} overflows usize"))
        })?;
        self.set_logical_length(bytes)
    }

    /// The whole allocation as UTF-16 code units.
    pub fn capacity_wide(&self) -> &[u16] {
        // SAFETY: u64 storage is 8-byte aligned and fully initialised.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast(), self.char_capacity()) }
    }

    /// Mutable view of the whole allocation as UTF-16 code units.
    pub fn capacity_wide_mut(&mut self) -> &mut [u16] {
        let chars = self.char_capacity();
        // SAFETY: as for `capacity_wide`; the borrow is unique.
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast(), chars) }
    }

    /// The meaningful UTF-16 code units.
    pub fn as_wide(&self) -> &[u16] {
        self.capacity_wide()
            .get(..self.char_length())
            .unwrap_or_default()
    }

    /// Decode the meaningful region as UTF-16, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.as_wide())
    }

    /// Set the logical length to the first UTF-16 null in the allocation,
    /// or to the full capacity if there is none.
    ///
    /// For APIs that null-terminate their output without reporting how
    /// much they wrote.
    pub fn set_length_to_first_null(&mut self) {
        let wide = self.capacity_wide();
        let chars = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
        self.len = chars * WCHAR;
    }
}

impl Default for GrowableBuffer {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for GrowableBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrowableBuffer")
            .field("byte_capacity", &self.byte_capacity())
            .field("logical_length", &self.len)
            .finish()
    }
}
