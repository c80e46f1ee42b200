//! Call native APIs with an auto-growing buffer.
//!
//! Windows APIs that return variable-length data do not allocate for the
//! caller. They report "buffer too small", usually along with the size they
//! need, and expect to be called again. [`Invoker`] owns that loop:
//!
//! 1. lease a buffer from a [`BufferPool`],
//! 2. run the call,
//! 3. on an insufficient-buffer signal grow the buffer and go to 2,
//! 4. on success decode the produced bytes,
//! 5. on anything else translate the code into an [`Error`].
//!
//! The buffer goes back to the pool on every exit path.
//!
//! # Growth
//!
//! On an insufficient-buffer signal the new capacity is the largest of the
//! size the API reported, double the current capacity, and the current
//! capacity plus `min_increment`. APIs that report no size still make
//! progress, and APIs that report a strictly increasing size finish in a
//! logarithmic number of attempts. Growth never goes past `max_capacity`;
//! a call that still wants more fails with `OutOfMemory`.
//!
//! # Enumeration
//!
//! NT enumeration calls answer `STATUS_MORE_ENTRIES` when they filled the
//! buffer and have more to give. That is a continuation, not a sizing
//! failure: [`Invoker::enumerate_with_growth`] decodes the partial result
//! and calls again with the same capacity, leaving the enumeration cursor
//! to the call closure.

use crate::buffer::GrowableBuffer;
use crate::pool::BufferPool;
use crate::status::{self, NativeErrorCode, Signal, win32};
use crate::Error;

const DEFAULT_MAX_CAPACITY: usize = 64 * 1024 * 1024;
const DEFAULT_MIN_INCREMENT: usize = 256;

/// The outcome of one native call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeCall {
    /// Status of the attempt, in the vocabulary the API uses.
    pub code: NativeErrorCode,
    /// Bytes produced on success, or bytes required on an
    /// insufficient-buffer signal. Zero when the API reports neither.
    pub size: usize,
}

impl NativeCall {
    /// An attempt reporting `code`.
    pub fn new(code: NativeErrorCode, size: usize) -> Self {
        Self { code, size }
    }

    /// An attempt reporting a Win32 last-error code.
    pub fn win32(code: u32, size: usize) -> Self {
        Self::new(NativeErrorCode::Win32(code), size)
    }

    /// An attempt reporting an `NTSTATUS`.
    pub fn nt(status: u32, size: usize) -> Self {
        Self::new(NativeErrorCode::NtStatus(status), size)
    }
}

/// How a call settled once it stopped asking for a bigger buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    /// Plain success; the buffer holds the whole result.
    Complete,
    /// The buffer holds one batch and the call has more.
    Partial(NativeErrorCode),
    /// Nothing (more) to return.
    Exhausted(NativeErrorCode),
}

// ===== Builder ========================================================

/// Builder to configure an [`Invoker`].
///
/// Construct with [`Invoker::builder()`].
#[derive(Debug, Clone)]
pub struct Builder {
    max_capacity: usize,
    min_increment: usize,
}

impl Builder {
    /// Set the largest capacity, in bytes, a buffer may grow to.
    ///
    /// Default: 64 MiB.
    #[must_use]
    pub fn max_capacity(mut self, bytes: usize) -> Self {
        self.max_capacity = bytes;
        self
    }

    /// Set the smallest absolute growth step, in bytes.
    ///
    /// Values below 1 are treated as 1.
    ///
    /// Default: 256.
    #[must_use]
    pub fn min_increment(mut self, bytes: usize) -> Self {
        self.min_increment = bytes.max(1);
        self
    }

    /// Create an invoker drawing buffers from `pool`.
    pub fn build(self, pool: &BufferPool) -> Invoker<'_> {
        Invoker {
            pool,
            max_capacity: self.max_capacity,
            min_increment: self.min_increment,
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_MAX_CAPACITY,
            min_increment: DEFAULT_MIN_INCREMENT,
        }
    }
}

// ===== Invoker ========================================================

/// Runs buffer-returning native calls to completion.
///
/// Cheap to copy; holds only a pool reference and two limits. Calls made
/// through one invoker from several threads each lease their own buffer.
#[derive(Debug, Clone, Copy)]
pub struct Invoker<'p> {
    pool: &'p BufferPool,
    max_capacity: usize,
    min_increment: usize,
}

impl Invoker<'static> {
    /// An invoker with default limits over [`BufferPool::shared()`].
    pub fn shared() -> Self {
        Builder::default().build(BufferPool::shared())
    }
}

impl<'p> Invoker<'p> {
    /// An invoker with default limits over `pool`.
    pub fn new(pool: &'p BufferPool) -> Self {
        Builder::default().build(pool)
    }

    /// Start configuring an invoker.
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// The pool buffers are leased from.
    pub fn pool(&self) -> &'p BufferPool {
        self.pool
    }

    /// Largest capacity a buffer may grow to.
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Run a single-shot call, growing the buffer until it fits.
    ///
    /// `call` receives the buffer for each attempt and reports the status
    /// and size. It must fetch the buffer pointer afresh every time.
    /// `decode` runs once, on success, with the number of bytes produced
    /// (which may be zero).
    ///
    /// A `STATUS_MORE_ENTRIES` answer fails with `Unsupported`; use
    /// [`enumerate_with_growth`](Self::enumerate_with_growth) for such
    /// APIs. Insufficient-buffer signals never escape.
    pub fn invoke_with_growth<T, C, D>(
        &self,
        initial_capacity: usize,
        mut call: C,
        decode: D,
    ) -> Result<T, Error>
    where
        C: FnMut(&mut GrowableBuffer) -> NativeCall,
        D: FnOnce(&GrowableBuffer, usize) -> Result<T, Error>,
    {
        let mut buffer = self.pool.lease(initial_capacity)?;
        match self.settle(&mut buffer, &mut call)? {
            Settled::Complete => decode(&buffer, buffer.logical_length()),
            Settled::Partial(code) => Err(Error::unsupported(
                "call reported more entries; use enumerate_with_growth",
            )
            .with_code(code)),
            Settled::Exhausted(code) => Err(Error::from_code(code)),
        }
    }

    /// Run an enumeration call until it is exhausted.
    ///
    /// Like [`invoke_with_growth`](Self::invoke_with_growth), but a
    /// `STATUS_MORE_ENTRIES` answer decodes the partial result and calls
    /// again with the same capacity. `call` owns the enumeration cursor.
    /// The enumeration ends on plain success (after decoding) or on a
    /// no-more-entries status (without decoding). Items are returned in
    /// call order.
    pub fn enumerate_with_growth<T, I, C, D>(
        &self,
        initial_capacity: usize,
        mut call: C,
        mut decode: D,
    ) -> Result<Vec<T>, Error>
    where
        C: FnMut(&mut GrowableBuffer) -> NativeCall,
        D: FnMut(&GrowableBuffer, usize) -> Result<I, Error>,
        I: IntoIterator<Item = T>,
    {
        let mut buffer = self.pool.lease(initial_capacity)?;
        let mut items = Vec::new();
        loop {
            match self.settle(&mut buffer, &mut call)? {
                Settled::Complete => {
                    items.extend(decode(&buffer, buffer.logical_length())?);
                    trace!(items = items.len(), "enumeration complete");
                    return Ok(items);
                }
                Settled::Partial(_) => {
                    items.extend(decode(&buffer, buffer.logical_length())?);
                }
                Settled::Exhausted(_) => {
                    trace!(items = items.len(), "enumeration exhausted");
                    return Ok(items);
                }
            }
        }
    }

    /// Run a call that returns a UTF-16 character count.
    ///
    /// Adapts the common Win32 convention: the call returns the required
    /// count (at least the capacity) when the buffer is too small, the
    /// number of characters written on success, and zero on failure. `call`
    /// returns `Ok(count)` for a nonzero return and `Err(code)` with the
    /// last error otherwise.
    pub fn invoke_counted<C>(&self, initial_chars: usize, mut call: C) -> Result<String, Error>
    where
        C: FnMut(&mut GrowableBuffer) -> Result<u32, NativeErrorCode>,
    {
        self.invoke_with_growth(
            initial_chars.saturating_mul(2),
            |buffer| {
                let capacity = buffer.char_capacity();
                match call(buffer) {
                    Ok(count) if count as usize >= capacity => NativeCall::win32(
                        win32::ERROR_INSUFFICIENT_BUFFER,
                        (count as usize).saturating_mul(2),
                    ),
                    Ok(count) => NativeCall::win32(win32::ERROR_SUCCESS, count as usize * 2),
                    Err(code) => NativeCall::new(code, 0),
                }
            },
            |buffer, _| Ok(buffer.to_string_lossy()),
        )
    }

    /// Call until the answer is anything but "grow the buffer".
    ///
    /// On [`Settled::Complete`] or [`Settled::Partial`] the buffer's
    /// logical length holds the produced size. Failures come back as
    /// errors, so insufficient-buffer signals never reach the caller.
    fn settle<C>(&self, buffer: &mut GrowableBuffer, call: &mut C) -> Result<Settled, Error>
    where
        C: FnMut(&mut GrowableBuffer) -> NativeCall,
    {
        loop {
            buffer.clear();
            let outcome = call(buffer);
            match status::signal(outcome.code) {
                Signal::InsufficientBuffer => self.grow(buffer, outcome)?,
                Signal::Success => {
                    buffer.set_logical_length(outcome.size)?;
                    return Ok(Settled::Complete);
                }
                Signal::MoreEntries => {
                    buffer.set_logical_length(outcome.size)?;
                    return Ok(Settled::Partial(outcome.code));
                }
                Signal::NoMoreEntries => return Ok(Settled::Exhausted(outcome.code)),
                Signal::Failure => {
                    debug!(code = %outcome.code, "native call failed");
                    return Err(Error::from_code(outcome.code));
                }
            }
        }
    }

    fn grow(&self, buffer: &mut GrowableBuffer, outcome: NativeCall) -> Result<(), Error> {
        let current = buffer.byte_capacity();
        let wanted = outcome
            .size
            .max(current.saturating_mul(2))
            .max(current.saturating_add(self.min_increment));

        let target = if wanted <= self.max_capacity {
            wanted
        } else if current < self.max_capacity && outcome.size <= self.max_capacity {
            self.max_capacity
        } else {
            debug!(
                current,
                required = outcome.size,
                ceiling = self.max_capacity,
                "buffer growth ceiling reached"
            );
            return Err(Error::out_of_memory(format!(
                "buffer would exceed the {} byte ceiling",
                self.max_capacity
            ))
            .with_code(outcome.code));
        };

        trace!(from = current, to = target, required = outcome.size, "growing buffer");
        buffer.ensure_byte_capacity(target)
    }
}
