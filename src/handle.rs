//! Exclusive ownership of OS resources.
//!
//! Windows resource families disagree on two things: which raw value means
//! "no handle" (zero, minus one, or either) and which call releases a live
//! one (`CloseHandle`, `NtClose`, `RegCloseKey`, `HeapFree`, ...). A
//! [`Family`] captures that pair as data. [`OwnedResource`] layers the
//! ownership rules on top, identically for every family:
//!
//! * the release call runs at most once per wrapper, no matter how many
//!   times or from how many threads release is requested,
//! * a sentinel value is never released,
//! * a non-owning view never releases,
//! * dropping the wrapper releases it if nothing else did.

use crate::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// A raw handle value, wide enough for every Windows handle type.
pub type RawHandle = isize;

/// Native release operation for one resource family.
pub type Releaser = fn(RawHandle) -> Result<(), Error>;

/// Which raw values a resource family uses to mean "no handle".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// `0` is invalid (most kernel, registry and NT object handles).
    Zero,
    /// `-1` is invalid (`INVALID_HANDLE_VALUE`).
    MinusOne,
    /// Both `0` and `-1` are invalid (file handles).
    ZeroOrMinusOne,
}

impl Sentinel {
    /// Returns `true` if `raw` is a sentinel under this policy.
    pub fn matches(self, raw: RawHandle) -> bool {
        match self {
            Sentinel::Zero => raw == 0,
            Sentinel::MinusOne => raw == -1,
            Sentinel::ZeroOrMinusOne => raw == 0 || raw == -1,
        }
    }
}

/// A resource family: its name, sentinel policy and releaser.
#[derive(Clone, Copy)]
pub struct Family {
    name: &'static str,
    sentinel: Sentinel,
    release: Releaser,
}

impl Family {
    /// Describe a resource family.
    pub const fn new(name: &'static str, sentinel: Sentinel, release: Releaser) -> Self {
        Self {
            name,
            sentinel,
            release,
        }
    }

    /// Human-readable name, used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The family's sentinel policy.
    pub fn sentinel(&self) -> Sentinel {
        self.sentinel
    }

    /// Returns `true` if `raw` means "no handle" for this family.
    pub fn is_sentinel(&self, raw: RawHandle) -> bool {
        self.sentinel.matches(raw)
    }
}

impl fmt::Debug for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Family")
            .field("name", &self.name)
            .field("sentinel", &self.sentinel)
            .finish()
    }
}

/// One OS resource and the obligation to release it.
///
/// Created from a raw value the moment an acquisition call returns, then
/// borrowed for further calls. Released exactly once, either explicitly
/// through [`release()`](Self::release), which reports failure, or
/// implicitly on drop, which logs failure.
pub struct OwnedResource {
    raw: RawHandle,
    family: &'static Family,
    owns: bool,
    released: AtomicBool,
}

impl OwnedResource {
    /// Wrap a raw value.
    ///
    /// With `owns == false` the wrapper is a view that never releases.
    /// Wrapping a sentinel is allowed; such a wrapper reports
    /// [`is_invalid()`](Self::is_invalid) and never releases.
    pub fn wrap(raw: RawHandle, family: &'static Family, owns: bool) -> Self {
        Self {
            raw,
            family,
            owns,
            released: AtomicBool::new(false),
        }
    }

    /// The family this resource belongs to.
    pub fn family(&self) -> &'static Family {
        self.family
    }

    /// Returns `true` if this wrapper will release the resource.
    pub fn owns(&self) -> bool {
        self.owns
    }

    /// Returns `true` if the raw value is the family's sentinel.
    pub fn is_invalid(&self) -> bool {
        self.family.is_sentinel(self.raw)
    }

    /// Returns `true` once release has happened or been relinquished.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// The raw value for passing into a native call.
    ///
    /// Fails with `InvalidHandle` if the wrapper holds a sentinel or has
    /// been released. Borrowing never changes ownership.
    pub fn borrow(&self) -> Result<RawHandle, Error> {
        if self.is_invalid() {
            return Err(Error::invalid_handle(format!("{} handle is invalid", self.family.name)));
        }
        if self.is_released() {
            return Err(Error::invalid_handle(format!(
                "{} handle was already released",
                self.family.name
            )));
        }
        Ok(self.raw)
    }

    /// The raw value, without validity checks.
    pub fn as_raw(&self) -> RawHandle {
        self.raw
    }

    /// A non-owning wrapper over the same raw value.
    ///
    /// The view never releases. A view taken after this wrapper released
    /// starts out released, so its [`borrow()`](Self::borrow) fails too. A
    /// view must not outlive the owner's release.
    pub fn view(&self) -> OwnedResource {
        OwnedResource {
            raw: self.raw,
            family: self.family,
            owns: false,
            released: AtomicBool::new(self.is_released()),
        }
    }

    /// Give up ownership and return the raw value unreleased.
    ///
    /// Fails with `InvalidHandle` if the resource was already released,
    /// since the raw value no longer names a live resource.
    pub fn into_raw(self) -> Result<RawHandle, Error> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Err(Error::invalid_handle(format!(
                "{} handle was already released",
                self.family.name
            )));
        }
        Ok(self.raw)
    }

    /// Release the resource now.
    ///
    /// Only the first call on an owning, non-sentinel wrapper invokes the
    /// native releaser, even when several threads race; every other call
    /// is a no-op returning `Ok`. A failure from the releaser is returned.
    pub fn release(&self) -> Result<(), Error> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if !self.owns || self.is_invalid() {
            return Ok(());
        }
        trace!(family = self.family.name, raw = self.raw, "releasing handle");
        (self.family.release)(self.raw)
    }
}

impl Drop for OwnedResource {
    #[cfg_attr(not(feature = "tracing"), expect(unused_variables))]
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(family = self.family.name, error = %e, "release failed during drop");
        }
    }
}

impl fmt::Debug for OwnedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedResource")
            .field("family", &self.family.name)
            .field("raw", &format_args!("{:#x}", self.raw))
            .field("owns", &self.owns)
            .field("released", &self.is_released())
            .finish()
    }
}

// Wrappers move freely between threads; release is serialised by the
// atomic flag.
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<OwnedResource>();
};
