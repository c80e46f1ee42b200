//! The Windows resource families winhold knows how to release.
//!
//! Each constant pairs a sentinel policy with the native call that frees
//! a live value. Wrap raw values from other sources with the matching
//! family via [`OwnedResource::wrap`](crate::OwnedResource::wrap).

use crate::abi;
use crate::handle::{Family, Sentinel};

/// File handles from `CreateFileW`; `INVALID_HANDLE_VALUE` and null are
/// both invalid. Closed with `CloseHandle`.
pub static FILE: Family = Family::new("file", Sentinel::ZeroOrMinusOne, abi::close_handle);

/// Generic kernel object handles (tokens, processes, events). Closed with
/// `CloseHandle`.
pub static KERNEL_OBJECT: Family =
    Family::new("kernel object", Sentinel::Zero, abi::close_handle);

/// NT object manager handles (directories, symbolic links). Closed with
/// `NtClose`.
pub static NT_OBJECT: Family = Family::new("NT object", Sentinel::Zero, abi::nt_close);

/// Registry keys. Closed with `RegCloseKey`.
pub static REGISTRY_KEY: Family = Family::new("registry key", Sentinel::Zero, abi::reg_close_key);

/// Certificate stores. Closed with `CertCloseStore`.
pub static CERT_STORE: Family =
    Family::new("certificate store", Sentinel::Zero, abi::cert_close_store);

/// Blocks from the process heap. Freed with `HeapFree`.
pub static HEAP_MEMORY: Family = Family::new("heap memory", Sentinel::Zero, abi::heap_free);

/// Blocks from `GlobalAlloc`. Freed with `GlobalFree`.
pub static GLOBAL_MEMORY: Family = Family::new("global memory", Sentinel::Zero, abi::global_free);

/// Blocks the OS allocated with `LocalAlloc` on the caller's behalf.
/// Freed with `LocalFree`.
pub static LOCAL_MEMORY: Family = Family::new("local memory", Sentinel::Zero, abi::local_free);
