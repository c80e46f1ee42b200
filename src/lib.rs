#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================
// Portable core
//
// Buffers, the pool, the retry invoker and the handle protocol build on
// every host, so their logic is tested without an OS to call.
// ============================================================

#[macro_use]
mod tracing;

mod buffer;
mod error;
mod handle;
mod invoke;
mod pool;
pub mod status;
mod util;
pub mod value;

pub use buffer::GrowableBuffer;
pub use error::{Error, FailureKind};
pub use handle::{Family, OwnedResource, RawHandle, Releaser, Sentinel};
pub use invoke::{Builder as InvokerBuilder, Invoker, NativeCall};
pub use pool::{BufferPool, Builder as PoolBuilder, PooledBuffer};
pub use status::NativeErrorCode;
pub use util::split_multi_sz;
pub use value::RegistryValue;

// ============================================================
// Windows backend
//
// FFI wrappers, the resource families and the factory that opens them.
// ============================================================

#[cfg(native_api)]
mod abi;
#[cfg(native_api)]
mod factory;
#[cfg(native_api)]
pub mod family;

#[cfg(native_api)]
pub use factory::{DirectoryEntry, RegistryRoot, ResourceFactory, access};

/// A `Result` alias where the `Err` case is [`winhold::Error`](Error).
pub type Result<T> = std::result::Result<T, Error>;
