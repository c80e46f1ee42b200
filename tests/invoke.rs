//! Integration tests for the retry invoker against simulated native calls.

#![expect(clippy::tests_outside_test_module)]

use std::cell::Cell;
use winhold::{BufferPool, FailureKind, GrowableBuffer, Invoker, NativeCall, NativeErrorCode};

const ERROR_SUCCESS: u32 = 0;
const ERROR_FILE_NOT_FOUND: u32 = 2;
const ERROR_ACCESS_DENIED: u32 = 5;
const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
const ERROR_MORE_DATA: u32 = 234;
const STATUS_SUCCESS: u32 = 0;
const STATUS_MORE_ENTRIES: u32 = 0x0000_0105;
const STATUS_NO_MORE_ENTRIES: u32 = 0x8000_001A;
const STATUS_BUFFER_TOO_SMALL: u32 = 0xC000_0023;
const STATUS_OBJECT_NAME_NOT_FOUND: u32 = 0xC000_0034;

fn pool() -> BufferPool {
    BufferPool::builder().max_slots(4).build()
}

/// Write `bytes` at the start of the buffer's capacity.
fn fill(buffer: &mut GrowableBuffer, bytes: &[u8]) {
    buffer.capacity_bytes_mut()[..bytes.len()].copy_from_slice(bytes);
}

// -----------------------------------------------------------------------
// Single-shot growth
// -----------------------------------------------------------------------

#[test]
fn grows_to_reported_size_then_decodes_produced_bytes() {
    let pool = pool();
    let invoker = Invoker::new(&pool);
    let payload: Vec<u8> = (0..34).collect();
    let attempts = Cell::new(0);
    let final_capacity = Cell::new(0);

    let decoded = invoker
        .invoke_with_growth(
            8,
            |buffer| {
                attempts.set(attempts.get() + 1);
                if buffer.byte_capacity() < 37 {
                    return NativeCall::win32(ERROR_INSUFFICIENT_BUFFER, 37);
                }
                fill(buffer, &payload);
                NativeCall::win32(ERROR_SUCCESS, 34)
            },
            |buffer, produced| {
                final_capacity.set(buffer.byte_capacity());
                Ok(buffer.as_bytes()[..produced].to_vec())
            },
        )
        .unwrap();

    assert_eq!(decoded, payload);
    assert_eq!(attempts.get(), 2, "one retry after the size report");
    assert!(final_capacity.get() >= 37, "capacity {}", final_capacity.get());
}

#[test]
fn growth_signals_from_both_vocabularies() {
    let cases: &[(NativeErrorCode, NativeErrorCode, &str)] = &[
        (
            NativeErrorCode::Win32(ERROR_INSUFFICIENT_BUFFER),
            NativeErrorCode::Win32(ERROR_SUCCESS),
            "win32_insufficient",
        ),
        (
            NativeErrorCode::Win32(ERROR_MORE_DATA),
            NativeErrorCode::Win32(ERROR_SUCCESS),
            "win32_more_data",
        ),
        (
            NativeErrorCode::NtStatus(STATUS_BUFFER_TOO_SMALL),
            NativeErrorCode::NtStatus(STATUS_SUCCESS),
            "nt_too_small",
        ),
    ];

    for &(grow, ok, label) in cases {
        let pool = pool();
        let invoker = Invoker::new(&pool);
        let produced = invoker
            .invoke_with_growth(
                16,
                |buffer| {
                    if buffer.byte_capacity() < 1000 {
                        NativeCall::new(grow, 1000)
                    } else {
                        NativeCall::new(ok, 1000)
                    }
                },
                |_, produced| Ok(produced),
            )
            .unwrap_or_else(|e| panic!("{label}: {e}"));
        assert_eq!(produced, 1000, "{label}");
    }
}

#[test]
fn increasing_requirements_terminate_logarithmically() {
    let pool = BufferPool::builder().max_slots(0).build();
    let invoker = Invoker::builder().min_increment(1).build(&pool);
    let target = 10_000_usize;
    let attempts = Cell::new(0_u32);

    invoker
        .invoke_with_growth(
            8,
            |buffer| {
                attempts.set(attempts.get() + 1);
                let capacity = buffer.byte_capacity();
                if capacity < target {
                    NativeCall::win32(ERROR_INSUFFICIENT_BUFFER, capacity + 1)
                } else {
                    NativeCall::win32(ERROR_SUCCESS, 0)
                }
            },
            |_, _| Ok(()),
        )
        .unwrap();

    // ceil(log2(10_000 / 8)) == 11, plus the final successful attempt.
    assert!(attempts.get() <= 12 + 1, "took {} attempts", attempts.get());
}

#[test]
fn zero_reported_size_still_makes_progress() {
    let pool = pool();
    let invoker = Invoker::new(&pool);
    let attempts = Cell::new(0_u32);

    let capacity = invoker
        .invoke_with_growth(
            0,
            |buffer| {
                attempts.set(attempts.get() + 1);
                if buffer.byte_capacity() < 4096 {
                    NativeCall::win32(ERROR_INSUFFICIENT_BUFFER, 0)
                } else {
                    NativeCall::win32(ERROR_SUCCESS, 0)
                }
            },
            |buffer, _| Ok(buffer.byte_capacity()),
        )
        .unwrap();

    assert!(capacity >= 4096);
    assert!(attempts.get() <= 6, "took {} attempts", attempts.get());
}

#[test]
fn zero_sized_success_is_an_empty_result() {
    let pool = pool();
    let invoker = Invoker::new(&pool);

    let decoded = invoker
        .invoke_with_growth(
            64,
            |_| NativeCall::nt(STATUS_SUCCESS, 0),
            |buffer, produced| Ok((buffer.as_bytes().to_vec(), produced)),
        )
        .unwrap();

    assert_eq!(decoded, (Vec::new(), 0));
}

#[test]
fn unbounded_requirements_hit_the_ceiling() {
    let pool = pool();
    let invoker = Invoker::builder().max_capacity(4096).build(&pool);
    let attempts = Cell::new(0_u32);

    let err = invoker
        .invoke_with_growth(
            8,
            |buffer| {
                attempts.set(attempts.get() + 1);
                NativeCall::nt(STATUS_BUFFER_TOO_SMALL, buffer.byte_capacity() * 4)
            },
            |_, _| Ok(()),
        )
        .unwrap_err();

    assert!(err.is_out_of_memory(), "{err:?}");
    assert_eq!(err.code(), Some(NativeErrorCode::NtStatus(STATUS_BUFFER_TOO_SMALL)));
    assert!(attempts.get() < 20, "took {} attempts", attempts.get());
}

#[test]
fn allocation_failure_during_growth_aborts_at_once() {
    // (reported size, label); both are within an unlimited ceiling but
    // no allocator can satisfy them.
    let cases: &[(usize, &str)] = &[
        (usize::MAX - 7, "near_usize_max"),
        (isize::MAX as usize, "isize_max"),
    ];

    for &(reported, label) in cases {
        let pool = pool();
        let invoker = Invoker::builder().max_capacity(usize::MAX).build(&pool);
        let attempts = Cell::new(0_u32);
        let decoded = Cell::new(false);

        let err = invoker
            .invoke_with_growth(
                64,
                |_| {
                    attempts.set(attempts.get() + 1);
                    NativeCall::win32(ERROR_INSUFFICIENT_BUFFER, reported)
                },
                |_, _| {
                    decoded.set(true);
                    Ok(())
                },
            )
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::OutOfMemory, "{label}: {err:?}");
        assert_eq!(attempts.get(), 1, "{label}: no retry after a failed allocation");
        assert!(!decoded.get(), "{label}: decode must not run");
        assert_eq!(pool.len(), 1, "{label}: buffer returns to the pool");
    }
}

#[test]
fn failures_propagate_with_kind_and_code() {
    let cases: &[(NativeErrorCode, FailureKind, &str)] = &[
        (NativeErrorCode::Win32(ERROR_FILE_NOT_FOUND), FailureKind::NotFound, "win32_not_found"),
        (NativeErrorCode::Win32(ERROR_ACCESS_DENIED), FailureKind::AccessDenied, "win32_denied"),
        (
            NativeErrorCode::NtStatus(STATUS_OBJECT_NAME_NOT_FOUND),
            FailureKind::NotFound,
            "nt_not_found",
        ),
        (NativeErrorCode::Win32(1_234_567), FailureKind::GenericOsFailure(1_234_567), "unmapped"),
    ];

    for &(code, kind, label) in cases {
        let pool = pool();
        let invoker = Invoker::new(&pool);
        let decoded = Cell::new(false);
        let err = invoker
            .invoke_with_growth(
                32,
                |_| NativeCall::new(code, 0),
                |_, _| {
                    decoded.set(true);
                    Ok(())
                },
            )
            .unwrap_err();

        assert_eq!(err.kind(), kind, "{label}");
        assert_eq!(err.code(), Some(code), "{label}");
        assert!(!decoded.get(), "{label}: decode must not run");
        assert_eq!(pool.len(), 1, "{label}: buffer returns to the pool");
    }
}

#[test]
fn decode_failure_propagates_and_returns_buffer() {
    let pool = pool();
    let invoker = Invoker::new(&pool);

    let err = invoker
        .invoke_with_growth(
            32,
            |_| NativeCall::win32(ERROR_SUCCESS, 4),
            |_, _| winhold::RegistryValue::decode(4, &[1, 2]),
        )
        .unwrap_err();

    assert!(err.is_invalid_argument(), "{err:?}");
    assert_eq!(pool.len(), 1);
}

#[test]
fn successive_calls_reuse_the_pooled_buffer() {
    let pool = pool();
    let invoker = Invoker::new(&pool);
    let pointers = std::cell::RefCell::new(Vec::new());

    for _ in 0..3 {
        invoker
            .invoke_with_growth(
                128,
                |buffer| {
                    pointers.borrow_mut().push(buffer.as_ptr() as usize);
                    NativeCall::win32(ERROR_SUCCESS, 0)
                },
                |_, _| Ok(()),
            )
            .unwrap();
    }

    let pointers = pointers.into_inner();
    assert!(pointers.windows(2).all(|w| w[0] == w[1]), "{pointers:?}");
    assert_eq!(pool.len(), 1);
}

// -----------------------------------------------------------------------
// Enumeration
// -----------------------------------------------------------------------

#[test]
fn more_entries_continues_at_the_same_capacity() {
    let pool = pool();
    let invoker = Invoker::new(&pool);
    let batches: &[&[u8]] = &[b"ab", b"cde", b"f"];
    let cursor = Cell::new(0_usize);
    let capacities = std::cell::RefCell::new(Vec::new());

    let items = invoker
        .enumerate_with_growth(
            64,
            |buffer| {
                capacities.borrow_mut().push(buffer.byte_capacity());
                let index = cursor.get();
                cursor.set(index + 1);
                let batch = batches[index];
                fill(buffer, batch);
                let status = if index + 1 < batches.len() {
                    STATUS_MORE_ENTRIES
                } else {
                    STATUS_SUCCESS
                };
                NativeCall::nt(status, batch.len())
            },
            |buffer, produced| Ok(buffer.as_bytes()[..produced].to_vec()),
        )
        .unwrap();

    assert_eq!(items, b"abcdef".to_vec());
    let capacities = capacities.into_inner();
    assert_eq!(capacities.len(), 3);
    assert!(capacities.iter().all(|&c| c == capacities[0]), "{capacities:?}");
}

#[test]
fn enumeration_grows_within_a_batch() {
    let pool = pool();
    let invoker = Invoker::new(&pool);
    let calls = Cell::new(0_u32);

    let items = invoker
        .enumerate_with_growth(
            8,
            |buffer| {
                calls.set(calls.get() + 1);
                match calls.get() {
                    1 => NativeCall::nt(STATUS_BUFFER_TOO_SMALL, 512),
                    2 => {
                        fill(buffer, &[1]);
                        NativeCall::nt(STATUS_MORE_ENTRIES, 1)
                    }
                    _ => NativeCall::nt(STATUS_NO_MORE_ENTRIES, 0),
                }
            },
            |buffer, produced| Ok(buffer.as_bytes()[..produced].to_vec()),
        )
        .unwrap();

    assert_eq!(items, vec![1]);
    assert_eq!(calls.get(), 3);
}

#[test]
fn empty_enumeration_yields_nothing() {
    let pool = pool();
    let invoker = Invoker::new(&pool);

    let items: Vec<u8> = invoker
        .enumerate_with_growth(
            64,
            |_| NativeCall::nt(STATUS_NO_MORE_ENTRIES, 0),
            |_, _| -> winhold::Result<Vec<u8>> { panic!("nothing to decode") },
        )
        .unwrap();

    assert!(items.is_empty());
}

#[test]
fn more_entries_in_a_single_shot_call_is_unsupported() {
    let pool = pool();
    let invoker = Invoker::new(&pool);

    let err = invoker
        .invoke_with_growth(64, |_| NativeCall::nt(STATUS_MORE_ENTRIES, 0), |_, _| Ok(()))
        .unwrap_err();

    assert!(err.is_unsupported(), "{err:?}");
    assert_eq!(err.code(), Some(NativeErrorCode::NtStatus(STATUS_MORE_ENTRIES)));
}

// -----------------------------------------------------------------------
// Character-count convention
// -----------------------------------------------------------------------

#[test]
fn counted_call_retries_with_required_count() {
    let pool = pool();
    let invoker = Invoker::new(&pool);
    let path: Vec<u16> = r"\\?\C:\Windows\System32".encode_utf16().collect();

    let result = invoker
        .invoke_counted(4, |buffer| {
            if buffer.char_capacity() <= path.len() {
                return Ok(path.len() as u32 + 1);
            }
            buffer.capacity_wide_mut()[..path.len()].copy_from_slice(&path);
            Ok(path.len() as u32)
        })
        .unwrap();

    assert_eq!(result, r"\\?\C:\Windows\System32");
}
