//! File, process and memory wrappers.

use super::{as_handle, char_len_u32, check_win32_bool, from_handle, last_error_code};
use crate::Error;
use crate::buffer::GrowableBuffer;
use crate::handle::RawHandle;
use crate::status::NativeErrorCode;
use windows_sys::Win32::Foundation::{CloseHandle, GlobalFree, LocalFree};
use windows_sys::Win32::Storage::FileSystem::{CreateFileW, GetFinalPathNameByHandleW};
use windows_sys::Win32::System::Memory::{
    GMEM_ZEROINIT, GetProcessHeap, GlobalAlloc, HEAP_ZERO_MEMORY, HeapAlloc, HeapFree,
};
use windows_sys::Win32::System::Threading::GetCurrentProcess;

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// `CreateFileW`. Returns the raw result, `INVALID_HANDLE_VALUE` on
/// failure; read the last error immediately.
pub(crate) fn create_file(
    path: &[u16],
    access: u32,
    share: u32,
    disposition: u32,
    flags: u32,
) -> RawHandle {
    let handle = unsafe {
        CreateFileW(
            path.as_ptr(),
            access,
            share,
            std::ptr::null(),
            disposition,
            flags,
            std::ptr::null_mut(),
        )
    };
    from_handle(handle)
}

/// `CloseHandle`.
pub(crate) fn close_handle(handle: RawHandle) -> Result<(), Error> {
    unsafe { check_win32_bool(CloseHandle(as_handle(handle))) }
}

/// `GetFinalPathNameByHandleW` into `buffer`.
///
/// Returns the character count the API reported (required size when the
/// buffer is too small, characters written otherwise) or the last error
/// when it reported zero.
pub(crate) fn get_final_path_name(
    file: RawHandle,
    buffer: &mut GrowableBuffer,
    flags: u32,
) -> Result<u32, NativeErrorCode> {
    let chars = char_len_u32(buffer);
    let count = unsafe {
        GetFinalPathNameByHandleW(as_handle(file), buffer.as_mut_ptr().cast(), chars, flags)
    };
    if count == 0 { Err(last_error_code()) } else { Ok(count) }
}

// ---------------------------------------------------------------------------
// Process
// ---------------------------------------------------------------------------

/// `GetCurrentProcess` -- the pseudo handle, which is never closed.
pub(crate) fn current_process() -> RawHandle {
    from_handle(unsafe { GetCurrentProcess() })
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// `HeapAlloc` on the process heap, zero-filled. Null on failure.
pub(crate) fn heap_alloc(bytes: usize) -> RawHandle {
    let block = unsafe { HeapAlloc(GetProcessHeap(), HEAP_ZERO_MEMORY, bytes) };
    from_handle(block)
}

/// `HeapFree` on the process heap.
pub(crate) fn heap_free(block: RawHandle) -> Result<(), Error> {
    unsafe { check_win32_bool(HeapFree(GetProcessHeap(), 0, as_handle(block).cast_const())) }
}

/// `GlobalAlloc`, fixed and zero-filled. Null on failure.
pub(crate) fn global_alloc(bytes: usize) -> RawHandle {
    from_handle(unsafe { GlobalAlloc(GMEM_ZEROINIT, bytes) })
}

/// `GlobalFree`. The API returns null on success.
pub(crate) fn global_free(block: RawHandle) -> Result<(), Error> {
    let rest = unsafe { GlobalFree(as_handle(block)) };
    if rest.is_null() { Ok(()) } else { Err(super::last_win32_error()) }
}

/// `LocalFree`. The API returns null on success.
pub(crate) fn local_free(block: RawHandle) -> Result<(), Error> {
    let rest = unsafe { LocalFree(as_handle(block)) };
    if rest.is_null() { Ok(()) } else { Err(super::last_win32_error()) }
}
