//! NT object manager wrappers.
//!
//! The structures, `NtClose` and `NtQueryObject` come from `windows-sys`.
//! The directory and symbolic-link entry points have no binding there, so
//! they are declared against `ntdll` below using the same types. All of
//! these return `NTSTATUS` directly.

use super::{as_handle, check_nt, from_handle};
use crate::Error;
use crate::buffer::GrowableBuffer;
use crate::handle::RawHandle;
use crate::invoke::NativeCall;
use crate::util::wide_to_string_lossy;
use std::ffi::c_void;
use windows_sys::Wdk::Foundation::{
    NtClose, NtQueryObject, OBJECT_ATTRIBUTES, OBJECT_INFORMATION_CLASS,
};
use windows_sys::Win32::Foundation::{BOOLEAN, HANDLE, NTSTATUS, UNICODE_STRING};

/// Attribute flag: name lookups ignore case.
const OBJ_CASE_INSENSITIVE: u32 = 0x0000_0040;

/// `ObjectNameInformation`: yields `OBJECT_NAME_INFORMATION`.
const OBJECT_NAME_INFORMATION: OBJECT_INFORMATION_CLASS = 1;
/// `ObjectTypeInformation`: yields `PUBLIC_OBJECT_TYPE_INFORMATION`.
const OBJECT_TYPE_INFORMATION: OBJECT_INFORMATION_CLASS = 2;

/// Describe `wide` (no terminator) without copying it.
fn borrowed_unicode(wide: &[u16]) -> Result<UNICODE_STRING, Error> {
    let bytes = u16::try_from(wide.len() * 2)
        .map_err(|_| Error::invalid_argument("object path longer than 32767 characters"))?;
    Ok(UNICODE_STRING {
        Length: bytes,
        MaximumLength: bytes,
        Buffer: wide.as_ptr().cast_mut(),
    })
}

/// Describe the whole of `buffer` as an empty output string.
fn output_unicode(buffer: &mut GrowableBuffer) -> UNICODE_STRING {
    let capacity = buffer.byte_capacity().min(usize::from(u16::MAX)) & !1;
    UNICODE_STRING {
        Length: 0,
        MaximumLength: capacity as u16,
        Buffer: buffer.as_mut_ptr().cast(),
    }
}

/// Decode a counted string.
///
/// # Safety
///
/// `s.Buffer` must be valid for `s.Length` bytes.
unsafe fn unicode_to_string(s: &UNICODE_STRING) -> String {
    unsafe { wide_to_string_lossy(s.Buffer, usize::from(s.Length)) }
}

/// `InitializeObjectAttributes` for a case-insensitive lookup of `name`.
fn named_attributes(name: &UNICODE_STRING) -> OBJECT_ATTRIBUTES {
    OBJECT_ATTRIBUTES {
        Length: size_of::<OBJECT_ATTRIBUTES>() as u32,
        RootDirectory: std::ptr::null_mut(),
        ObjectName: name,
        Attributes: OBJ_CASE_INSENSITIVE as _,
        SecurityDescriptor: std::ptr::null(),
        SecurityQualityOfService: std::ptr::null(),
    }
}

/// `OBJECT_DIRECTORY_INFORMATION`: one directory entry.
#[repr(C)]
struct ObjectDirectoryInformation {
    name: UNICODE_STRING,
    type_name: UNICODE_STRING,
}

#[link(name = "ntdll")]
unsafe extern "system" {
    fn NtOpenDirectoryObject(
        directory_handle: *mut HANDLE,
        desired_access: u32,
        object_attributes: *const OBJECT_ATTRIBUTES,
    ) -> NTSTATUS;

    fn NtQueryDirectoryObject(
        directory_handle: HANDLE,
        buffer: *mut c_void,
        length: u32,
        return_single_entry: BOOLEAN,
        restart_scan: BOOLEAN,
        context: *mut u32,
        return_length: *mut u32,
    ) -> NTSTATUS;

    fn NtOpenSymbolicLinkObject(
        link_handle: *mut HANDLE,
        desired_access: u32,
        object_attributes: *const OBJECT_ATTRIBUTES,
    ) -> NTSTATUS;

    fn NtQuerySymbolicLinkObject(
        link_handle: HANDLE,
        link_target: *mut UNICODE_STRING,
        returned_length: *mut u32,
    ) -> NTSTATUS;
}

// ---------------------------------------------------------------------------
// Open / close
// ---------------------------------------------------------------------------

/// `NtOpenDirectoryObject` for `path` (no terminator).
pub(crate) fn nt_open_directory_object(path: &[u16], access: u32) -> Result<RawHandle, Error> {
    let name = borrowed_unicode(path)?;
    let attributes = named_attributes(&name);
    let mut handle = std::ptr::null_mut();
    check_nt(unsafe { NtOpenDirectoryObject(&mut handle, access, &attributes) })?;
    Ok(from_handle(handle))
}

/// `NtOpenSymbolicLinkObject` for `path` (no terminator).
pub(crate) fn nt_open_symbolic_link_object(path: &[u16], access: u32) -> Result<RawHandle, Error> {
    let name = borrowed_unicode(path)?;
    let attributes = named_attributes(&name);
    let mut handle = std::ptr::null_mut();
    check_nt(unsafe { NtOpenSymbolicLinkObject(&mut handle, access, &attributes) })?;
    Ok(from_handle(handle))
}

/// `NtClose`.
pub(crate) fn nt_close(handle: RawHandle) -> Result<(), Error> {
    check_nt(unsafe { NtClose(as_handle(handle)) })
}

// ---------------------------------------------------------------------------
// Variable-length queries
// ---------------------------------------------------------------------------

/// `NtQueryDirectoryObject` -- the next batch of entries after `context`.
pub(crate) fn nt_query_directory_object(
    directory: RawHandle,
    buffer: &mut GrowableBuffer,
    context: &mut u32,
) -> NativeCall {
    let capacity = super::byte_len_u32(buffer);
    let mut returned = 0_u32;
    let status = unsafe {
        NtQueryDirectoryObject(
            as_handle(directory),
            buffer.as_mut_ptr().cast(),
            capacity,
            0,
            0,
            context,
            &mut returned,
        )
    };
    NativeCall::nt(status as u32, returned as usize)
}

/// Decode a `NtQueryDirectoryObject` result into `(name, type)` pairs.
///
/// The entries form an array terminated by an all-zero entry; their
/// strings point into the same buffer.
pub(crate) fn decode_directory_entries(buffer: &GrowableBuffer) -> Vec<(String, String)> {
    let base = buffer.as_ptr().cast::<ObjectDirectoryInformation>();
    let max_entries = buffer.byte_capacity() / size_of::<ObjectDirectoryInformation>();
    let mut entries = Vec::new();
    for index in 0..max_entries {
        // SAFETY: `index` is within the allocation and the buffer is
        // 8-byte aligned; the query succeeded, so the array is written.
        let entry = unsafe { &*base.add(index) };
        if entry.name.Length == 0 && entry.type_name.Length == 0 {
            break;
        }
        // SAFETY: entry strings point into the live buffer.
        let (name, type_name) =
            unsafe { (unicode_to_string(&entry.name), unicode_to_string(&entry.type_name)) };
        entries.push((name, type_name));
    }
    entries
}

/// `NtQuerySymbolicLinkObject` -- the link target, written into `buffer`.
///
/// On success the outcome size is the target's length in bytes, so the
/// buffer's logical region is the target itself.
pub(crate) fn nt_query_symbolic_link_object(
    link: RawHandle,
    buffer: &mut GrowableBuffer,
) -> NativeCall {
    let mut target = output_unicode(buffer);
    let mut returned = 0_u32;
    let status = unsafe { NtQuerySymbolicLinkObject(as_handle(link), &mut target, &mut returned) };
    let size = if status >= 0 {
        usize::from(target.Length)
    } else {
        returned as usize
    };
    NativeCall::nt(status as u32, size)
}

/// `NtQueryObject(ObjectNameInformation)` into `buffer`.
pub(crate) fn nt_query_object_name(handle: RawHandle, buffer: &mut GrowableBuffer) -> NativeCall {
    nt_query_object(handle, OBJECT_NAME_INFORMATION, buffer)
}

/// `NtQueryObject(ObjectTypeInformation)` into `buffer`.
///
/// A short buffer answers `STATUS_INFO_LENGTH_MISMATCH` with the size
/// required.
pub(crate) fn nt_query_object_type(handle: RawHandle, buffer: &mut GrowableBuffer) -> NativeCall {
    nt_query_object(handle, OBJECT_TYPE_INFORMATION, buffer)
}

fn nt_query_object(
    handle: RawHandle,
    class: OBJECT_INFORMATION_CLASS,
    buffer: &mut GrowableBuffer,
) -> NativeCall {
    let capacity = super::byte_len_u32(buffer);
    let mut returned = 0_u32;
    let status = unsafe {
        NtQueryObject(
            as_handle(handle),
            class,
            buffer.as_mut_ptr().cast(),
            capacity,
            &mut returned,
        )
    };
    // On success the reported size is informational; on a short buffer it
    // is the size required.
    let size = if status >= 0 {
        (returned as usize).min(buffer.byte_capacity())
    } else {
        returned as usize
    };
    NativeCall::nt(status as u32, size)
}

/// Decode the `UNICODE_STRING` that opens an `NtQueryObject` result.
///
/// Both `OBJECT_NAME_INFORMATION` and `PUBLIC_OBJECT_TYPE_INFORMATION`
/// start with one. Unnamed objects yield an empty string.
pub(crate) fn decode_object_string(buffer: &GrowableBuffer) -> String {
    // SAFETY: called only after NtQueryObject succeeded, which wrote a
    // header whose string points into the buffer.
    match unsafe { buffer.header::<UNICODE_STRING>() } {
        Some(name) => unsafe { unicode_to_string(name) },
        None => String::new(),
    }
}
