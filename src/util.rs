//! Shared utility functions.
//!
//! Small helpers used across multiple modules. Nothing here calls into the
//! OS; FFI wrappers live in the `abi` module.

// ---------------------------------------------------------------------------
// Wide-string helpers
// ---------------------------------------------------------------------------

/// Read a UTF-16 string from a raw pointer and a length in bytes, as found
/// in `UNICODE_STRING` headers.
///
/// Decoding is lossy: NT object names are counted strings that are not
/// required to be well-formed UTF-16.
///
/// # Safety
///
/// `ptr` must be valid for reads of `byte_len` bytes and aligned for
/// `u16`, or null (returns an empty string).
#[cfg_attr(all(not(native_api), not(test)), expect(dead_code))]
pub(crate) unsafe fn wide_to_string_lossy(ptr: *const u16, byte_len: usize) -> String {
    if ptr.is_null() || byte_len == 0 {
        return String::new();
    }
    let slice = unsafe { std::slice::from_raw_parts(ptr, byte_len / 2) };
    String::from_utf16_lossy(slice)
}

/// Split a double-null-terminated list of UTF-16 strings.
///
/// Stops at the first empty entry, so a single trailing terminator, two
/// terminators, or a list truncated without terminators all decode the
/// same way. An empty list yields no strings.
pub fn split_multi_sz(wide: &[u16]) -> Vec<String> {
    wide.split(|&c| c == 0)
        .take_while(|s| !s.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}

// ---------------------------------------------------------------------------
// Environment helpers
// ---------------------------------------------------------------------------

/// Read an environment variable, returning `None` for empty or unset values.
pub(crate) fn read_env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Mutex helpers
// ---------------------------------------------------------------------------

/// Lock a [`Mutex`](std::sync::Mutex), recovering from poison.
///
/// If the mutex was poisoned (a prior panic occurred while the lock was
/// held), logs a warning, clears the poison flag, and returns the guard
/// anyway.
///
/// # When this is safe
///
/// The only mutex in this crate guards the buffer pool's slot list, whose
/// operations are single `push` / `swap_remove` calls. A panicking thread
/// cannot leave it half-updated.
pub(crate) fn lock_or_clear<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("buffer pool mutex poisoned by a prior panic; recovering");
            mutex.clear_poison();
            poisoned.into_inner()
        }
    }
}
