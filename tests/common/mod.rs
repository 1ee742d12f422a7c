//! Shared test utilities for allocation accounting and fault injection.

#![allow(dead_code)]

use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use sparsemem::{BlockAllocator, GranularityPolicy, HeapAllocator, StreamError, StreamOptions};

/// Granularity used by tests so results do not depend on the host.
pub const TEST_GRANULARITY: usize = 4096;

/// Options pinned to [`TEST_GRANULARITY`] with a block of the same size.
pub fn options_4k() -> StreamOptions {
    StreamOptions::default()
        .with_granularity(GranularityPolicy::with_granularity(TEST_GRANULARITY).unwrap())
        .with_block_size(TEST_GRANULARITY as u32)
}

/// Counters shared between a test and the allocator it handed to a stream.
#[derive(Debug, Default)]
pub struct AllocationCounters {
    reserved: AtomicUsize,
    freed: AtomicUsize,
    /// When non-zero, the Nth reserve (1-based) fails.
    fail_reserve_at: AtomicUsize,
    /// When true, every free fails.
    fail_free: AtomicBool,
}

impl AllocationCounters {
    pub fn reserved(&self) -> usize {
        self.reserved.load(Ordering::SeqCst)
    }

    pub fn freed(&self) -> usize {
        self.freed.load(Ordering::SeqCst)
    }

    pub fn outstanding(&self) -> usize {
        self.reserved() - self.freed()
    }

    /// Make the Nth reserve (1-based, counted from construction) fail.
    pub fn inject_reserve_error_at(&self, operation_n: usize) {
        self.fail_reserve_at.store(operation_n, Ordering::SeqCst);
    }

    /// Make every later free fail.
    pub fn inject_free_error(&self) {
        self.fail_free.store(true, Ordering::SeqCst);
    }
}

/// A fault-injection wrapper around [`HeapAllocator`] that counts calls.
#[derive(Debug, Clone, Default)]
pub struct CountingAllocator {
    inner: HeapAllocator,
    counters: Arc<AllocationCounters>,
}

impl CountingAllocator {
    pub fn new() -> (Self, Arc<AllocationCounters>) {
        let allocator = Self::default();
        let counters = Arc::clone(&allocator.counters);
        (allocator, counters)
    }
}

unsafe impl BlockAllocator for CountingAllocator {
    fn reserve(&mut self, size: usize, alignment: usize) -> Result<NonNull<u8>, StreamError> {
        let attempt = self.counters.reserved() + 1;
        let fail_at = self.counters.fail_reserve_at.load(Ordering::SeqCst);
        if fail_at != 0 && attempt >= fail_at {
            return Err(StreamError::Allocation { size });
        }
        let ptr = self.inner.reserve(size, alignment)?;
        self.counters.reserved.fetch_add(1, Ordering::SeqCst);
        Ok(ptr)
    }

    unsafe fn free(
        &mut self,
        ptr: NonNull<u8>,
        size: usize,
        alignment: usize,
    ) -> Result<(), StreamError> {
        // The memory is always returned; only the reported outcome fails.
        unsafe { self.inner.free(ptr, size, alignment) }?;
        if self.counters.fail_free.load(Ordering::SeqCst) {
            return Err(StreamError::Platform {
                failed: 1,
                message: "injected release failure".into(),
            });
        }
        self.counters.freed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Deterministic, non-zero test pattern.
pub fn pattern(len: usize, salt: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(salt) | 1)
        .collect()
}
