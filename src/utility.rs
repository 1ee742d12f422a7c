//! Utility functions for sparsemem
//!
//! Alignment arithmetic and the raw aligned allocation behind
//! [`HeapAllocator`](crate::HeapAllocator).

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

/// Check if a value is a power of two
#[inline]
pub const fn is_power_of_two(n: u64) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

/// Pad a size up to the specified alignment.
///
/// Returns `None` when the padded size does not fit in `usize`.
#[inline]
pub const fn pad_alignment(size: usize, alignment: usize) -> Option<usize> {
    debug_assert!(is_power_of_two(alignment as u64));
    match size.checked_add(alignment - 1) {
        Some(padded) => Some(padded & !(alignment - 1)),
        None => None,
    }
}

/// Number of `block_size` chunks needed to cover `capacity` bytes.
#[inline]
pub const fn block_count_for(capacity: u64, block_size: u64) -> u64 {
    debug_assert!(block_size > 0);
    capacity / block_size + (capacity % block_size != 0) as u64
}

/// Aligned zeroed memory allocation
///
/// # Safety
/// The caller must ensure that:
/// - `alignment` is a power of two
/// - `size` is non-zero
/// - The returned memory must be deallocated with `aligned_free`
pub unsafe fn aligned_alloc_zeroed(alignment: usize, size: usize) -> Option<NonNull<u8>> {
    debug_assert!(is_power_of_two(alignment as u64));
    debug_assert!(size > 0);

    let layout = Layout::from_size_align(size, alignment).ok()?;
    let ptr = alloc_zeroed(layout);
    NonNull::new(ptr)
}

/// Free aligned memory
///
/// # Safety
/// The caller must ensure that:
/// - `ptr` was allocated with `aligned_alloc_zeroed`
/// - `alignment` and `size` match the original allocation
pub unsafe fn aligned_free(ptr: NonNull<u8>, alignment: usize, size: usize) {
    // The layout was validated when the allocation was made.
    let layout = Layout::from_size_align_unchecked(size, alignment);
    dealloc(ptr.as_ptr(), layout);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_power_of_two() {
        assert!(!is_power_of_two(0));
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(4096));
        assert!(!is_power_of_two(4095));
        assert!(is_power_of_two(1 << 16));
    }

    #[test]
    fn test_pad_alignment() {
        assert_eq!(pad_alignment(1, 4096), Some(4096));
        assert_eq!(pad_alignment(4096, 4096), Some(4096));
        assert_eq!(pad_alignment(4097, 4096), Some(8192));
        assert_eq!(pad_alignment(usize::MAX, 4096), None);
    }

    #[test]
    fn test_block_count_for() {
        assert_eq!(block_count_for(8192, 4096), 2);
        assert_eq!(block_count_for(8193, 4096), 3);
        assert_eq!(block_count_for(1, 4096), 1);
        assert_eq!(block_count_for(4096, 4096), 1);
    }

    #[test]
    fn test_aligned_alloc_is_zeroed_and_aligned() {
        unsafe {
            let ptr = aligned_alloc_zeroed(4096, 8192).unwrap();
            assert_eq!(ptr.as_ptr() as usize % 4096, 0);
            let bytes = std::slice::from_raw_parts_mut(ptr.as_ptr(), 8192);
            assert!(bytes.iter().all(|&b| b == 0));
            bytes[0] = 0xAB;
            bytes[8191] = 0xCD;
            aligned_free(ptr, 4096, 8192);
        }
    }
}
