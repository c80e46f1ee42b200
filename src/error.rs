//! Error type for winhold.
//!
//! Provides [`Error`], the single structured failure every operation in the
//! crate returns, whichever native vocabulary (Win32 last-error or NTSTATUS)
//! produced it. Query methods such as [`is_not_found()`](Error::is_not_found)
//! and [`is_access_denied()`](Error::is_access_denied) let callers branch on
//! the [`FailureKind`] without inspecting raw codes.

use crate::status::{self, NativeErrorCode};
use std::fmt;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Domain-neutral classification of a failure.
///
/// Every [`NativeErrorCode`] maps onto exactly one kind through
/// [`status::classify`]; codes without a dedicated mapping land in
/// [`GenericOsFailure`](FailureKind::GenericOsFailure) with the raw value
/// preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The supplied buffer was too small.
    ///
    /// Recovered inside the retry invoker; never returned from it.
    InsufficientBuffer,
    /// The target object, path, key, or value does not exist.
    NotFound,
    /// The caller lacks the rights to perform the operation.
    AccessDenied,
    /// The object being created already exists.
    AlreadyExists,
    /// The operation was attempted on a resource that was already released
    /// or never valid.
    InvalidHandle,
    /// An argument violated a precondition.
    InvalidArgument,
    /// Memory could not be allocated, or a buffer would have to grow past
    /// the configured ceiling.
    OutOfMemory,
    /// A feature or data type this layer does not implement.
    Unsupported,
    /// Catch-all carrying the untranslated raw code.
    GenericOsFailure(u32),
}

/// The error type for winhold operations.
///
/// Carries the [`FailureKind`], the raw native code when the failure came
/// from the OS, and an optional context string (usually the path or name
/// involved) that is included in the `Display` output for diagnostics.
pub struct Error {
    pub(crate) kind: FailureKind,
    pub(crate) code: Option<NativeErrorCode>,
    pub(crate) message: String,
    pub(crate) context: Option<String>,
    pub(crate) source: Option<BoxError>,
}

impl Error {
    /// The failure classification.
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// The raw native code, if the failure originated from a native call.
    pub fn code(&self) -> Option<NativeErrorCode> {
        self.code
    }

    /// The path or name this failure concerns, if known.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns `true` if the target does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, FailureKind::NotFound)
    }

    /// Returns `true` if access was denied.
    pub fn is_access_denied(&self) -> bool {
        matches!(self.kind, FailureKind::AccessDenied)
    }

    /// Returns `true` if the target already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(self.kind, FailureKind::AlreadyExists)
    }

    /// Returns `true` if a released or never-valid handle was used.
    pub fn is_invalid_handle(&self) -> bool {
        matches!(self.kind, FailureKind::InvalidHandle)
    }

    /// Returns `true` if an argument violated a precondition.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self.kind, FailureKind::InvalidArgument)
    }

    /// Returns `true` for allocation failures and growth-ceiling hits.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self.kind, FailureKind::OutOfMemory)
    }

    /// Returns `true` if the operation or data type is not implemented.
    pub fn is_unsupported(&self) -> bool {
        matches!(self.kind, FailureKind::Unsupported)
    }

    /// Attach the path or name involved (builder pattern).
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Strips the context from this error.
    #[must_use]
    pub fn without_context(mut self) -> Self {
        self.context = None;
        self
    }

    /// Attach a source error (builder pattern).
    ///
    /// Stores the underlying cause so that [`std::error::Error::source`]
    /// returns it.
    #[must_use]
    pub(crate) fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    // -- Internal constructors --

    /// Shared constructor for errors that did not come from a native code.
    fn with_kind(kind: FailureKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: msg.into(),
            context: None,
            source: None,
        }
    }

    /// Create an error from a raw native code.
    ///
    /// The code is classified through [`status::classify`]. Win32-domain
    /// codes additionally carry an [`std::io::Error`] in the source chain on
    /// Windows so that the system message text is reachable.
    pub(crate) fn from_code(code: NativeErrorCode) -> Self {
        let err = Self {
            kind: status::classify(code),
            code: Some(code),
            message: code.to_string(),
            context: None,
            source: None,
        };
        #[cfg(native_api)]
        if let NativeErrorCode::Win32(raw) = code {
            return err.with_source(std::io::Error::from_raw_os_error(raw as i32));
        }
        err
    }

    /// Create an allocation failure.
    pub(crate) fn out_of_memory(msg: impl Into<String>) -> Self {
        Self::with_kind(FailureKind::OutOfMemory, msg)
    }

    /// Create a precondition failure.
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::with_kind(FailureKind::InvalidArgument, msg)
    }

    /// Create a failure for use of a released or never-valid handle.
    pub(crate) fn invalid_handle(msg: impl Into<String>) -> Self {
        Self::with_kind(FailureKind::InvalidHandle, msg)
    }

    /// Create a failure for an unimplemented feature or data type.
    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::with_kind(FailureKind::Unsupported, msg)
    }

    /// Record the native code behind a failure whose kind was decided
    /// elsewhere, such as a growth ceiling hit on an insufficient-buffer
    /// answer.
    #[must_use]
    pub(crate) fn with_code(mut self, code: NativeErrorCode) -> Self {
        self.code = Some(code);
        self
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InsufficientBuffer => f.write_str("buffer too small"),
            FailureKind::NotFound => f.write_str("object not found"),
            FailureKind::AccessDenied => f.write_str("access denied"),
            FailureKind::AlreadyExists => f.write_str("object already exists"),
            FailureKind::InvalidHandle => f.write_str("invalid handle"),
            FailureKind::InvalidArgument => f.write_str("invalid argument"),
            FailureKind::OutOfMemory => f.write_str("out of memory"),
            FailureKind::Unsupported => f.write_str("operation not supported"),
            FailureKind::GenericOsFailure(_) => f.write_str("native call failed"),
        }
    }
}

impl fmt::Display for Error {
    /// A kind-based prefix, then ` (<code>)` when a native code is known and
    /// ` for '<context>'` when a path or name was attached. The free-form
    /// message is available through `Debug`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)?;
        if let Some(code) = &self.code {
            write!(f, " ({code})")?;
        }
        if let Some(context) = &self.context {
            write!(f, " for '{context}'")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("code", &self.code)
            .field("message", &self.message)
            .field("context", &self.context)
            .field("source", &self.source)
            .finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}

impl From<NativeErrorCode> for Error {
    fn from(code: NativeErrorCode) -> Self {
        Error::from_code(code)
    }
}

// Errors cross thread boundaries with the pooled buffers that produced them.
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Error>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{nt, win32};
    use std::error::Error as StdError;

    #[test]
    fn error_display_format() {
        let cases: Vec<(&str, Error, &str)> = vec![
            (
                "win32_with_context",
                Error::from_code(NativeErrorCode::Win32(win32::ERROR_FILE_NOT_FOUND))
                    .with_context(r"C:\missing.txt"),
                r"object not found (Win32 error 2) for 'C:\missing.txt'",
            ),
            (
                "nt_no_context",
                Error::from_code(NativeErrorCode::NtStatus(nt::STATUS_ACCESS_DENIED)),
                "access denied (NTSTATUS 0xC0000022)",
            ),
            (
                "generic",
                Error::from_code(NativeErrorCode::Win32(1_234)),
                "native call failed (Win32 error 1234)",
            ),
            ("oom", Error::out_of_memory("alloc failed"), "out of memory"),
            ("invalid_arg", Error::invalid_argument("n > capacity"), "invalid argument"),
            ("unsupported", Error::unsupported("REG_LINK"), "operation not supported"),
            (
                "invalid_handle_ctx",
                Error::invalid_handle("released").with_context("token"),
                "invalid handle for 'token'",
            ),
        ];

        for (label, err, expected) in &cases {
            assert_eq!(err.to_string(), *expected, "error display: {label}");
        }
    }

    /// Each kind has exactly one `is_*` query returning `true`.
    #[test]
    fn error_kind_exclusivity_table() {
        type TestCase<'a> = (Error, fn(&Error) -> bool, &'a str);
        let cases: Vec<TestCase> = vec![
            (
                Error::from_code(NativeErrorCode::NtStatus(nt::STATUS_OBJECT_NAME_NOT_FOUND)),
                Error::is_not_found,
                "not_found",
            ),
            (
                Error::from_code(NativeErrorCode::Win32(win32::ERROR_ACCESS_DENIED)),
                Error::is_access_denied,
                "access_denied",
            ),
            (
                Error::from_code(NativeErrorCode::Win32(win32::ERROR_ALREADY_EXISTS)),
                Error::is_already_exists,
                "already_exists",
            ),
            (Error::invalid_handle("h"), Error::is_invalid_handle, "invalid_handle"),
            (Error::invalid_argument("a"), Error::is_invalid_argument, "invalid_argument"),
            (Error::out_of_memory("m"), Error::is_out_of_memory, "out_of_memory"),
            (Error::unsupported("u"), Error::is_unsupported, "unsupported"),
        ];

        for (err, check, label) in &cases {
            assert!(check(err), "{label}: own is_*() should be true");
            for (_, other_check, other_label) in &cases {
                if *other_label != *label {
                    assert!(!other_check(err), "{label}: is_{other_label}() should be false");
                }
            }
        }
    }

    #[test]
    fn accessors_expose_code_and_context() {
        let code = NativeErrorCode::NtStatus(nt::STATUS_OBJECT_PATH_NOT_FOUND);
        let err = Error::from(code).with_context(r"\BaseNamedObjects\nope");
        assert_eq!(err.kind(), FailureKind::NotFound);
        assert_eq!(err.code(), Some(code));
        assert_eq!(err.context(), Some(r"\BaseNamedObjects\nope"));

        let err = err.without_context();
        assert!(err.context().is_none());
        assert_eq!(err.to_string(), "object not found (NTSTATUS 0xC000003A)");
    }

    #[test]
    fn generic_failure_keeps_raw_code() {
        let err = Error::from_code(NativeErrorCode::NtStatus(0xC000_0999));
        assert_eq!(err.kind(), FailureKind::GenericOsFailure(0xC000_0999));
    }

    #[test]
    fn error_debug_format() {
        let err = Error::invalid_argument("length 9 exceeds capacity 8");
        let debug = format!("{err:?}");
        assert!(debug.contains("InvalidArgument"));
        assert!(debug.contains("length 9 exceeds capacity 8"));
    }

    #[test]
    fn with_source_downcast() {
        let inner = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "reserve");
        let err = Error::out_of_memory("grow failed").with_source(inner);

        let source = StdError::source(&err).expect("should have source");
        let io_err = source
            .downcast_ref::<std::io::Error>()
            .expect("downcast to io::Error");
        assert_eq!(io_err.kind(), std::io::ErrorKind::OutOfMemory);
    }

    #[test]
    fn with_code_keeps_kind() {
        let code = NativeErrorCode::Win32(win32::ERROR_INSUFFICIENT_BUFFER);
        let err = Error::out_of_memory("ceiling").with_code(code);
        assert!(err.is_out_of_memory());
        assert_eq!(err.code(), Some(code));
        assert_eq!(err.to_string(), "out of memory (Win32 error 122)");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
