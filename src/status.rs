//! Native status translation.
//!
//! Windows reports failures through two unrelated vocabularies: the Win32
//! last-error codes (`GetLastError`) and the NT-layer `NTSTATUS` values
//! returned directly by `Nt*` calls. This module is the single place that
//! recognises the "buffer too small", "more entries" and "enumeration done"
//! signals in both, and the single place that maps raw codes onto
//! [`FailureKind`].
//!
//! New retryable codes are added to [`INSUFFICIENT_BUFFER_CODES`] and
//! nowhere else.

use crate::error::{Error, FailureKind};
use std::fmt;

/// Win32 last-error codes recognised by the translator.
pub mod win32 {
    /// The operation completed successfully.
    pub const ERROR_SUCCESS: u32 = 0;
    /// The system cannot find the file specified.
    pub const ERROR_FILE_NOT_FOUND: u32 = 2;
    /// The system cannot find the path specified.
    pub const ERROR_PATH_NOT_FOUND: u32 = 3;
    /// Access is denied.
    pub const ERROR_ACCESS_DENIED: u32 = 5;
    /// The handle is invalid.
    pub const ERROR_INVALID_HANDLE: u32 = 6;
    /// Not enough memory resources are available to process this command.
    pub const ERROR_NOT_ENOUGH_MEMORY: u32 = 8;
    /// Not enough memory resources are available to complete this operation.
    pub const ERROR_OUTOFMEMORY: u32 = 14;
    /// The system cannot find the drive specified.
    pub const ERROR_INVALID_DRIVE: u32 = 15;
    /// The process cannot access the file because it is being used by
    /// another process.
    pub const ERROR_SHARING_VIOLATION: u32 = 32;
    /// The request is not supported.
    pub const ERROR_NOT_SUPPORTED: u32 = 50;
    /// The network path was not found.
    pub const ERROR_BAD_NETPATH: u32 = 53;
    /// The file exists.
    pub const ERROR_FILE_EXISTS: u32 = 80;
    /// The parameter is incorrect.
    pub const ERROR_INVALID_PARAMETER: u32 = 87;
    /// This function is not supported on this system.
    pub const ERROR_CALL_NOT_IMPLEMENTED: u32 = 120;
    /// The data area passed to a system call is too small.
    pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
    /// The filename, directory name, or volume label syntax is incorrect.
    pub const ERROR_INVALID_NAME: u32 = 123;
    /// Cannot create a file when that file already exists.
    pub const ERROR_ALREADY_EXISTS: u32 = 183;
    /// More data is available.
    pub const ERROR_MORE_DATA: u32 = 234;
    /// No more data is available.
    pub const ERROR_NO_MORE_ITEMS: u32 = 259;
}

/// `NTSTATUS` values recognised by the translator.
pub mod nt {
    /// The operation completed successfully.
    pub const STATUS_SUCCESS: u32 = 0x0000_0000;
    /// More entries are available; call again with the same context.
    pub const STATUS_MORE_ENTRIES: u32 = 0x0000_0105;
    /// The data was too large to fit into the specified buffer.
    pub const STATUS_BUFFER_OVERFLOW: u32 = 0x8000_0005;
    /// No more files were found which match the file specification.
    pub const STATUS_NO_MORE_FILES: u32 = 0x8000_0006;
    /// No more entries are available from an enumeration operation.
    pub const STATUS_NO_MORE_ENTRIES: u32 = 0x8000_001A;
    /// The requested operation was unsuccessful.
    pub const STATUS_UNSUCCESSFUL: u32 = 0xC000_0001;
    /// The requested operation is not implemented.
    pub const STATUS_NOT_IMPLEMENTED: u32 = 0xC000_0002;
    /// The specified information record length does not match the length
    /// required for the specified information class.
    pub const STATUS_INFO_LENGTH_MISMATCH: u32 = 0xC000_0004;
    /// An invalid handle was specified.
    pub const STATUS_INVALID_HANDLE: u32 = 0xC000_0008;
    /// An invalid parameter was passed to a service or function.
    pub const STATUS_INVALID_PARAMETER: u32 = 0xC000_000D;
    /// The file does not exist.
    pub const STATUS_NO_SUCH_FILE: u32 = 0xC000_000F;
    /// Not enough virtual memory or paging file quota is available.
    pub const STATUS_NO_MEMORY: u32 = 0xC000_0017;
    /// A process has requested access to an object but has not been
    /// granted those access rights.
    pub const STATUS_ACCESS_DENIED: u32 = 0xC000_0022;
    /// The buffer is too small to contain the entry.
    pub const STATUS_BUFFER_TOO_SMALL: u32 = 0xC000_0023;
    /// The object name is invalid.
    pub const STATUS_OBJECT_NAME_INVALID: u32 = 0xC000_0033;
    /// The object name is not found.
    pub const STATUS_OBJECT_NAME_NOT_FOUND: u32 = 0xC000_0034;
    /// The object name already exists.
    pub const STATUS_OBJECT_NAME_COLLISION: u32 = 0xC000_0035;
    /// The path does not exist.
    pub const STATUS_OBJECT_PATH_NOT_FOUND: u32 = 0xC000_003A;
    /// Insufficient system resources exist to complete the API.
    pub const STATUS_INSUFFICIENT_RESOURCES: u32 = 0xC000_009A;
    /// The request is not supported.
    pub const STATUS_NOT_SUPPORTED: u32 = 0xC000_00BB;
}

/// A raw failure code tagged with the vocabulary that produced it.
///
/// The same numeric value means different things in the two domains
/// (`5` is `ERROR_ACCESS_DENIED` in Win32 and a success-class status in
/// NT), so a code is never interpreted without its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeErrorCode {
    /// A Win32 last-error code.
    Win32(u32),
    /// An `NTSTATUS` value, stored as its unsigned bit pattern.
    NtStatus(u32),
}

impl NativeErrorCode {
    /// Returns `true` if the code reports success.
    ///
    /// Win32 success is exactly `ERROR_SUCCESS`. NT success covers the
    /// success and informational severities (the sign bit is clear).
    pub fn is_success(self) -> bool {
        match self {
            NativeErrorCode::Win32(code) => code == win32::ERROR_SUCCESS,
            NativeErrorCode::NtStatus(status) => (status as i32) >= 0,
        }
    }

    /// The untagged numeric value.
    pub fn raw(self) -> u32 {
        match self {
            NativeErrorCode::Win32(code) | NativeErrorCode::NtStatus(code) => code,
        }
    }
}

impl fmt::Display for NativeErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeErrorCode::Win32(code) => write!(f, "Win32 error {code}"),
            NativeErrorCode::NtStatus(status) => write!(f, "NTSTATUS {status:#010X}"),
        }
    }
}

/// Codes meaning "the supplied buffer was too small; retry with a larger
/// one", across both vocabularies.
pub const INSUFFICIENT_BUFFER_CODES: &[NativeErrorCode] = &[
    NativeErrorCode::Win32(win32::ERROR_INSUFFICIENT_BUFFER),
    NativeErrorCode::Win32(win32::ERROR_MORE_DATA),
    NativeErrorCode::NtStatus(nt::STATUS_BUFFER_TOO_SMALL),
    NativeErrorCode::NtStatus(nt::STATUS_BUFFER_OVERFLOW),
    NativeErrorCode::NtStatus(nt::STATUS_INFO_LENGTH_MISMATCH),
];

/// Codes meaning "the enumeration is exhausted".
const END_OF_ENUMERATION_CODES: &[NativeErrorCode] = &[
    NativeErrorCode::Win32(win32::ERROR_NO_MORE_ITEMS),
    NativeErrorCode::NtStatus(nt::STATUS_NO_MORE_ENTRIES),
    NativeErrorCode::NtStatus(nt::STATUS_NO_MORE_FILES),
];

/// What the retry loop should do with a call result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The call completed; decode what it produced.
    Success,
    /// Grow the buffer and call again.
    InsufficientBuffer,
    /// Decode a partial result, then call again with the same capacity.
    MoreEntries,
    /// The enumeration has nothing further to return.
    NoMoreEntries,
    /// A failure that must be propagated.
    Failure,
}

/// Returns `true` if `code` asks for a larger buffer.
///
/// A "more entries" continuation is not a sizing failure and returns
/// `false`; see [`is_more_entries`].
pub fn is_insufficient_buffer(code: NativeErrorCode) -> bool {
    INSUFFICIENT_BUFFER_CODES.contains(&code)
}

/// Returns `true` if `code` reports a partial result with more to come.
pub fn is_more_entries(code: NativeErrorCode) -> bool {
    code == NativeErrorCode::NtStatus(nt::STATUS_MORE_ENTRIES)
}

/// Returns `true` if `code` reports an exhausted enumeration.
pub fn is_end_of_enumeration(code: NativeErrorCode) -> bool {
    END_OF_ENUMERATION_CODES.contains(&code)
}

/// Decide how a retry loop reacts to `code`.
///
/// Checks are ordered so that `STATUS_MORE_ENTRIES`, which is a success
/// severity in the NT domain, is reported as a continuation rather than as
/// plain success.
pub fn signal(code: NativeErrorCode) -> Signal {
    if is_insufficient_buffer(code) {
        Signal::InsufficientBuffer
    } else if is_more_entries(code) {
        Signal::MoreEntries
    } else if is_end_of_enumeration(code) {
        Signal::NoMoreEntries
    } else if code.is_success() {
        Signal::Success
    } else {
        Signal::Failure
    }
}

/// Map a raw code onto a [`FailureKind`].
///
/// Total: codes without a dedicated mapping (including success codes,
/// which callers are expected to filter through [`signal`] first) yield
/// [`FailureKind::GenericOsFailure`] carrying the raw value.
pub fn classify(code: NativeErrorCode) -> FailureKind {
    if is_insufficient_buffer(code) {
        return FailureKind::InsufficientBuffer;
    }
    if is_end_of_enumeration(code) {
        return FailureKind::NotFound;
    }
    match code {
        NativeErrorCode::Win32(raw) => classify_win32(raw),
        NativeErrorCode::NtStatus(raw) => classify_nt(raw),
    }
}

fn classify_win32(code: u32) -> FailureKind {
    match code {
        win32::ERROR_FILE_NOT_FOUND
        | win32::ERROR_PATH_NOT_FOUND
        | win32::ERROR_INVALID_DRIVE
        | win32::ERROR_BAD_NETPATH => FailureKind::NotFound,
        win32::ERROR_ACCESS_DENIED | win32::ERROR_SHARING_VIOLATION => FailureKind::AccessDenied,
        win32::ERROR_FILE_EXISTS | win32::ERROR_ALREADY_EXISTS => FailureKind::AlreadyExists,
        win32::ERROR_INVALID_HANDLE => FailureKind::InvalidHandle,
        win32::ERROR_NOT_ENOUGH_MEMORY | win32::ERROR_OUTOFMEMORY => FailureKind::OutOfMemory,
        win32::ERROR_INVALID_PARAMETER | win32::ERROR_INVALID_NAME => FailureKind::InvalidArgument,
        win32::ERROR_NOT_SUPPORTED | win32::ERROR_CALL_NOT_IMPLEMENTED => FailureKind::Unsupported,
        other => FailureKind::GenericOsFailure(other),
    }
}

fn classify_nt(status: u32) -> FailureKind {
    match status {
        nt::STATUS_OBJECT_NAME_NOT_FOUND
        | nt::STATUS_OBJECT_PATH_NOT_FOUND
        | nt::STATUS_NO_SUCH_FILE => FailureKind::NotFound,
        nt::STATUS_ACCESS_DENIED => FailureKind::AccessDenied,
        nt::STATUS_OBJECT_NAME_COLLISION => FailureKind::AlreadyExists,
        nt::STATUS_INVALID_HANDLE => FailureKind::InvalidHandle,
        nt::STATUS_NO_MEMORY | nt::STATUS_INSUFFICIENT_RESOURCES => FailureKind::OutOfMemory,
        nt::STATUS_INVALID_PARAMETER | nt::STATUS_OBJECT_NAME_INVALID => {
            FailureKind::InvalidArgument
        }
        nt::STATUS_NOT_SUPPORTED | nt::STATUS_NOT_IMPLEMENTED => FailureKind::Unsupported,
        other => FailureKind::GenericOsFailure(other),
    }
}

/// Build the structured failure for `code`, annotated with the path or
/// name involved.
///
/// An empty `context` attaches nothing.
pub fn to_structured_failure(code: NativeErrorCode, context: impl Into<String>) -> Error {
    let context = context.into();
    let err = Error::from_code(code);
    if context.is_empty() {
        err
    } else {
        err.with_context(context)
    }
}
