//! Registry and access-token wrappers.

use super::{as_handle, byte_len_u32, char_len_u32, check_win32_bool, check_win32_code};
use super::{from_handle, last_error_code};
use crate::Error;
use crate::buffer::GrowableBuffer;
use crate::family::LOCAL_MEMORY;
use crate::handle::{OwnedResource, RawHandle};
use crate::invoke::NativeCall;
use crate::status::{NativeErrorCode, win32};
use std::ffi::c_void;
use windows_sys::Win32::Security::Authorization::ConvertSidToStringSidW;
use windows_sys::Win32::Security::{GetTokenInformation, TOKEN_USER, TokenUser};
use windows_sys::Win32::System::Registry::{
    RegCloseKey, RegEnumKeyExW, RegOpenKeyExW, RegQueryValueExW,
};
use windows_sys::Win32::System::Threading::OpenProcessToken;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// `RegOpenKeyExW` -- open `subkey` (null-terminated) under `root`.
pub(crate) fn reg_open_key(root: RawHandle, subkey: &[u16], access: u32) -> Result<RawHandle, Error> {
    let mut key = std::ptr::null_mut();
    let code = unsafe { RegOpenKeyExW(as_handle(root), subkey.as_ptr(), 0, access, &mut key) };
    check_win32_code(code)?;
    Ok(from_handle(key))
}

/// `RegCloseKey`.
pub(crate) fn reg_close_key(key: RawHandle) -> Result<(), Error> {
    check_win32_code(unsafe { RegCloseKey(as_handle(key)) })
}

/// `RegQueryValueExW` into `buffer`.
///
/// Returns the attempt outcome and the value's type. `name` is
/// null-terminated; an empty name reads the key's default value.
pub(crate) fn reg_query_value(
    key: RawHandle,
    name: &[u16],
    buffer: &mut GrowableBuffer,
) -> (NativeCall, u32) {
    let capacity = byte_len_u32(buffer);
    let mut value_type = 0_u32;
    let mut size = capacity;
    let code = unsafe {
        RegQueryValueExW(
            as_handle(key),
            name.as_ptr(),
            std::ptr::null(),
            &mut value_type,
            buffer.as_mut_ptr(),
            &mut size,
        )
    };
    // With no data pointer the API answers success plus the required size.
    let code = if code == win32::ERROR_SUCCESS && size > capacity {
        win32::ERROR_MORE_DATA
    } else {
        code
    };
    (NativeCall::win32(code, size as usize), value_type)
}

/// `RegEnumKeyExW` -- the name of subkey `index`, into `buffer`.
///
/// The API reports no required size for a short name buffer, so the
/// outcome carries zero and the invoker grows geometrically.
pub(crate) fn reg_enum_key(key: RawHandle, index: u32, buffer: &mut GrowableBuffer) -> NativeCall {
    let mut chars = char_len_u32(buffer);
    let code = unsafe {
        RegEnumKeyExW(
            as_handle(key),
            index,
            buffer.as_mut_ptr().cast(),
            &mut chars,
            std::ptr::null(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        )
    };
    let size = if code == win32::ERROR_SUCCESS {
        chars as usize * 2
    } else {
        0
    };
    NativeCall::win32(code, size)
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// `OpenProcessToken`.
pub(crate) fn open_process_token(process: RawHandle, access: u32) -> Result<RawHandle, Error> {
    let mut token = std::ptr::null_mut();
    unsafe { check_win32_bool(OpenProcessToken(as_handle(process), access, &mut token))? };
    Ok(from_handle(token))
}

/// `GetTokenInformation(TokenUser)` into `buffer`.
pub(crate) fn get_token_user(token: RawHandle, buffer: &mut GrowableBuffer) -> NativeCall {
    let capacity = byte_len_u32(buffer);
    let mut returned = 0_u32;
    let ok = unsafe {
        GetTokenInformation(
            as_handle(token),
            TokenUser,
            buffer.as_mut_ptr().cast(),
            capacity,
            &mut returned,
        )
    };
    let code = match ok {
        0 => last_error_code(),
        _ => NativeErrorCode::Win32(win32::ERROR_SUCCESS),
    };
    NativeCall::new(code, returned as usize)
}

/// Read the user SID out of a `TokenUser` result and format it as an
/// `S-1-...` string.
///
/// The OS allocates the string with `LocalAlloc`; it is owned by a
/// [`LOCAL_MEMORY`] resource while it is read, then freed.
pub(crate) fn token_user_sid_string(buffer: &GrowableBuffer) -> Result<String, Error> {
    // SAFETY: called only after GetTokenInformation(TokenUser) succeeded,
    // which wrote a TOKEN_USER at the start of the buffer.
    let user = unsafe { buffer.header::<TOKEN_USER>() }
        .ok_or_else(|| Error::invalid_argument("TokenUser result shorter than TOKEN_USER"))?;
    let sid: *mut c_void = user.User.Sid;
    let mut text: *mut u16 = std::ptr::null_mut();
    // The SID points into `buffer`, which outlives this call.
    check_win32_bool(unsafe { ConvertSidToStringSidW(sid, &mut text) })?;

    let owned = OwnedResource::wrap(from_handle(text.cast()), &LOCAL_MEMORY, true);
    // SAFETY: ConvertSidToStringSidW returned a null-terminated string,
    // kept alive by `owned` until the explicit release below.
    let sid_string = unsafe { read_wide_cstr(text) };
    owned.release()?;
    Ok(sid_string)
}

/// Read a null-terminated wide string.
///
/// # Safety
///
/// `ptr` must be null or point to a live, null-terminated UTF-16 string.
unsafe fn read_wide_cstr(ptr: *const u16) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let mut len = 0;
    // SAFETY: the string is null-terminated per the caller's contract.
    while unsafe { *ptr.add(len) } != 0 {
        len += 1;
    }
    // SAFETY: `len` code units were just read.
    let wide = unsafe { std::slice::from_raw_parts(ptr, len) };
    String::from_utf16_lossy(wide)
}
