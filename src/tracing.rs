//! Internal log macros.
//!
//! With the `tracing` feature the macros forward to [`tracing`]; without
//! it they expand to nothing, so call-sites stay free of `#[cfg]`.
//!
//! Events the crate emits:
//!
//! | level   | message                                  | source             |
//! |---------|------------------------------------------|--------------------|
//! | `trace` | `growing buffer`                         | retry invoker      |
//! | `debug` | `buffer growth ceiling reached`          | retry invoker      |
//! | `debug` | `native call failed`                     | retry invoker      |
//! | `trace` | `enumeration complete`                   | retry invoker      |
//! | `trace` | `enumeration exhausted`                  | retry invoker      |
//! | `trace` | `pool full; dropping buffer`             | buffer pool        |
//! | `trace` | `dropping oversized buffer`              | buffer pool        |
//! | `warn`  | `ignoring unparsable pool limit`         | buffer pool        |
//! | `warn`  | `buffer pool mutex poisoned by a prior panic; recovering` | buffer pool |
//! | `trace` | `releasing handle`                       | owned resource     |
//! | `warn`  | `release failed during drop`             | owned resource     |

// Only one side of each cfg pair is active at a time.
#![allow(unused_macros)]

// ---- feature = "tracing" ----

#[cfg(feature = "tracing")]
macro_rules! trace {
    ($($tt:tt)*) => { ::tracing::trace!($($tt)*) }
}

#[cfg(feature = "tracing")]
macro_rules! debug {
    ($($tt:tt)*) => { ::tracing::debug!($($tt)*) }
}

#[cfg(feature = "tracing")]
macro_rules! warn {
    ($($tt:tt)*) => { ::tracing::warn!($($tt)*) }
}

// ---- not(feature = "tracing") ----

#[cfg(not(feature = "tracing"))]
macro_rules! trace {
    ($($tt:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($tt:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn {
    ($($tt:tt)*) => {};
}

// ---------------------------------------------------------------------------
// Test-only: a subscriber that keeps each event's level and message, so
// tests can check what the crate logged.
// ---------------------------------------------------------------------------

#[cfg(all(test, feature = "tracing"))]
pub(crate) use recorder::EventLog;


#[cfg(all(test, feature = "tracing"))]
mod tests {
    use super::EventLog;
    use crate::status::win32;
    use crate::{BufferPool, Error, Family, Invoker, NativeCall, OwnedResource, RawHandle, Sentinel};
    use ::tracing::Level;

    #[test]
    fn crate_events_reach_the_subscriber() {
        fn closed_elsewhere(_: RawHandle) -> crate::Result<()> {
            Err(Error::invalid_handle("closed elsewhere"))
        }
        static FAMILY: Family = Family::new("logged", Sentinel::Zero, closed_elsewhere);

        let log = EventLog::default();
        let _guard = log.install();

        // One growth step, then the pool has no slot to keep the buffer.
        let pool = BufferPool::builder().max_slots(0).build();
        Invoker::new(&pool)
            .invoke_with_growth(
                8,
                |buffer| {
                    if buffer.byte_capacity() < 100 {
                        NativeCall::win32(win32::ERROR_INSUFFICIENT_BUFFER, 100)
                    } else {
                        NativeCall::win32(win32::ERROR_SUCCESS, 0)
                    }
                },
                |_, _| Ok(()),
            )
            .unwrap();
        drop(OwnedResource::wrap(0x40, &FAMILY, true));

        let cases: &[(Level, &str, &str)] = &[
            (Level::TRACE, "growing buffer", "growth"),
            (Level::TRACE, "pool full; dropping buffer", "eviction"),
            (Level::TRACE, "releasing handle", "release"),
            (Level::WARN, "release failed during drop", "release_failure"),
        ];
        for &(level, message, label) in cases {
            assert_eq!(log.count(level, message), 1, "{label}: {:?}", log.events());
        }
    }
}
