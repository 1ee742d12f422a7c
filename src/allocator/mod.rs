//! Memory reservation for stream storage
//!
//! Streams never call the global allocator directly. Every block of a
//! [`SparseMemoryStream`](crate::SparseMemoryStream) and the single region
//! of a [`FixedMemoryStream`](crate::FixedMemoryStream) is obtained from a
//! [`BlockAllocator`] and handed back to it at teardown.
//!
//! # Key Types
//!
//! - [`BlockAllocator`]: the reserve/free capability
//! - [`HeapAllocator`]: default implementation over `std::alloc`
//! - [`VirtualMemoryAllocator`]: anonymous `mmap` reservations (unix)
//! - [`GranularityPolicy`]: platform allocation unit and size validation

mod granularity;
#[cfg(unix)]
mod virtual_memory;

pub use granularity::{allocation_granularity, GranularityPolicy, FALLBACK_GRANULARITY};
#[cfg(unix)]
pub use virtual_memory::VirtualMemoryAllocator;

use std::ptr::NonNull;

use crate::error::{Result, StreamError};
use crate::utility::{aligned_alloc_zeroed, aligned_free, is_power_of_two};

/// Reserve and release zero-initialized, aligned memory.
///
/// Reservations are raw handles; the caller keeps the size and alignment
/// and passes them back to [`free`](Self::free).
///
/// # Safety
///
/// A successful [`reserve`](Self::reserve) must return a pointer to `size`
/// bytes, all zero, aligned to `alignment`, readable and writable and not
/// aliased by anything else until it is passed to `free`.
pub unsafe trait BlockAllocator {
    /// Reserve `size` zeroed bytes aligned to `alignment`.
    fn reserve(&mut self, size: usize, alignment: usize) -> Result<NonNull<u8>>;

    /// Release a reservation.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `reserve` on this allocator with the same `size`
    /// and `alignment`, must not have been freed already, and must not be
    /// used afterwards, whatever the outcome.
    unsafe fn free(&mut self, ptr: NonNull<u8>, size: usize, alignment: usize) -> Result<()>;
}

unsafe impl<A: BlockAllocator + ?Sized> BlockAllocator for Box<A> {
    fn reserve(&mut self, size: usize, alignment: usize) -> Result<NonNull<u8>> {
        (**self).reserve(size, alignment)
    }

    unsafe fn free(&mut self, ptr: NonNull<u8>, size: usize, alignment: usize) -> Result<()> {
        unsafe { (**self).free(ptr, size, alignment) }
    }
}

/// Allocator backed by the global heap.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

unsafe impl BlockAllocator for HeapAllocator {
    fn reserve(&mut self, size: usize, alignment: usize) -> Result<NonNull<u8>> {
        if size == 0 || !is_power_of_two(alignment as u64) {
            return Err(StreamError::Allocation { size });
        }
        // SAFETY: size is non-zero and alignment a power of two.
        unsafe { aligned_alloc_zeroed(alignment, size) }.ok_or(StreamError::Allocation { size })
    }

    unsafe fn free(&mut self, ptr: NonNull<u8>, size: usize, alignment: usize) -> Result<()> {
        unsafe { aligned_free(ptr, alignment, size) };
        Ok(())
    }
}
