//! Certificate store wrappers.

use super::{as_handle, check_win32_bool, from_handle};
use crate::Error;
use crate::handle::RawHandle;
use windows_sys::Win32::Security::Cryptography::{CertCloseStore, CertOpenSystemStoreW};

/// `CertOpenSystemStoreW` -- open a system store such as `MY` or `ROOT`.
/// Null on failure; read the last error immediately.
pub(crate) fn cert_open_system_store(name: &[u16]) -> RawHandle {
    from_handle(unsafe { CertOpenSystemStoreW(0, name.as_ptr()) })
}

/// `CertCloseStore` without forcing outstanding contexts closed.
pub(crate) fn cert_close_store(store: RawHandle) -> Result<(), Error> {
    unsafe { check_win32_bool(CertCloseStore(as_handle(store), 0)) }
}
