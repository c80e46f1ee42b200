//! Thin safe wrappers around Win32 and NT native calls.
//!
//! Every raw FFI call used by winhold lives in this module tree. The rest
//! of the crate never touches `unsafe` FFI directly -- it calls these
//! helpers instead. Each wrapper:
//!
//! * takes and returns [`RawHandle`] values rather than typed pointers,
//! * reports failures as [`Error`] or, for calls driven by the retry
//!   invoker, as a [`NativeCall`] carrying the raw code and size,
//! * takes output buffers as `&mut GrowableBuffer` and clamps their
//!   capacity to what the API's size parameter can express.
//!
//! The module is split by the DLL that exports the functions:
//!
//! * [`kernel32`] -- files, process, heap/global/local memory
//! * [`advapi32`] -- registry and access tokens
//! * [`crypt32`] -- certificate stores
//! * [`ntdll`] -- NT object manager (directories, symbolic links, names)

mod advapi32;
mod crypt32;
mod kernel32;
mod ntdll;

pub(crate) use advapi32::*;
pub(crate) use crypt32::*;
pub(crate) use kernel32::*;
pub(crate) use ntdll::*;

use crate::Error;
use crate::buffer::GrowableBuffer;
use crate::handle::RawHandle;
use crate::status::NativeErrorCode;
use std::ffi::c_void;
use windows_sys::Win32::Foundation::GetLastError;

// ---------------------------------------------------------------------------
// Low-level result helpers
// ---------------------------------------------------------------------------

/// The calling thread's last Win32 error, tagged.
pub(crate) fn last_error_code() -> NativeErrorCode {
    NativeErrorCode::Win32(unsafe { GetLastError() })
}

/// Build an [`Error`] from the calling thread's last Win32 error.
pub(crate) fn last_win32_error() -> Error {
    Error::from_code(last_error_code())
}

/// Map a Win32 `BOOL` (`i32`) return value to `Result`.
fn check_win32_bool(result: i32) -> Result<(), Error> {
    if result != 0 {
        Ok(())
    } else {
        Err(last_win32_error())
    }
}

/// Map a directly returned Win32 error code (registry style) to `Result`.
fn check_win32_code(code: u32) -> Result<(), Error> {
    if code == 0 {
        Ok(())
    } else {
        Err(Error::from_code(NativeErrorCode::Win32(code)))
    }
}

/// Map an `NTSTATUS` return value to `Result`.
fn check_nt(status: i32) -> Result<(), Error> {
    if status >= 0 {
        Ok(())
    } else {
        Err(Error::from_code(NativeErrorCode::NtStatus(status as u32)))
    }
}

// ---------------------------------------------------------------------------
// Handle and buffer conversions
// ---------------------------------------------------------------------------

/// Reinterpret a raw handle value as the pointer-typed handle the FFI uses.
fn as_handle(raw: RawHandle) -> *mut c_void {
    raw as *mut c_void
}

/// Reinterpret an FFI handle as a raw value.
fn from_handle(handle: *mut c_void) -> RawHandle {
    handle as RawHandle
}

/// Byte capacity of `buffer` as a `u32` size argument.
fn byte_len_u32(buffer: &GrowableBuffer) -> u32 {
    u32::try_from(buffer.byte_capacity()).unwrap_or(u32::MAX)
}

/// Character capacity of `buffer` as a `u32` size argument.
fn char_len_u32(buffer: &GrowableBuffer) -> u32 {
    u32::try_from(buffer.char_capacity()).unwrap_or(u32::MAX)
}

// ---------------------------------------------------------------------------
// Wide-string helpers
// ---------------------------------------------------------------------------

/// Encode a Rust `&str` as a null-terminated UTF-16 wide string.
pub(crate) fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Encode an OS string (typically a path) as a null-terminated wide string.
pub(crate) fn os_to_wide(s: &std::ffi::OsStr) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    s.encode_wide().chain(std::iter::once(0)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
