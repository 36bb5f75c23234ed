//! Bounded retry for large buffer allocations.
//!
//! Page caches and ISSL tables are sized from the collection, so they are the
//! allocations most likely to fail under memory pressure. Instead of aborting
//! the process, the request is retried with a cooperative yield up to a cap.

use std::mem::size_of;
use std::thread;

use log::warn;

use crate::IndexError;

/// Retry cap used when the caller has no configured value.
pub const DEFAULT_ALLOC_RETRIES: u32 = 1000;

/// Allocate a vector of `len` copies of `fill`, retrying failed reservations.
///
/// Fails with [`IndexError::ResourceExhausted`] once `max_retries` retries
/// have been spent.
pub fn acquire_buffer<T: Clone>(len: usize, fill: T, max_retries: u32) -> Result<Vec<T>, IndexError> {
    acquire_buffer_with(len, || fill.clone(), max_retries)
}

/// Like [`acquire_buffer`] for element types that are built rather than
/// cloned, such as atomics.
pub fn acquire_buffer_with<T, F>(len: usize, make: F, max_retries: u32) -> Result<Vec<T>, IndexError>
where
    F: FnMut() -> T,
{
    let mut buf: Vec<T> = Vec::new();
    let mut attempts = 0u32;
    loop {
        match buf.try_reserve_exact(len) {
            Ok(()) => {
                buf.resize_with(len, make);
                return Ok(buf);
            }
            Err(err) => {
                if attempts >= max_retries {
                    return Err(IndexError::ResourceExhausted {
                        bytes: len.saturating_mul(size_of::<T>()),
                        attempts,
                    });
                }
                if attempts == 0 {
                    warn!("allocation of {len} elements failed ({err}); retrying");
                }
                attempts += 1;
                thread::yield_now();
            }
        }
    }
}
