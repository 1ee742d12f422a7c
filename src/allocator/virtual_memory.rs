//! Anonymous memory mappings as block storage.

use std::io;
use std::ptr::{self, NonNull};

use crate::allocator::{allocation_granularity, BlockAllocator};
use crate::error::{Result, StreamError};
use crate::utility::is_power_of_two;

/// Allocator that maps every reservation with `mmap` and unmaps it on free.
///
/// Pages are committed by the kernel on first touch and start zeroed.
/// Mappings are page aligned, so an alignment larger than the page size is
/// rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct VirtualMemoryAllocator;

unsafe impl BlockAllocator for VirtualMemoryAllocator {
    fn reserve(&mut self, size: usize, alignment: usize) -> Result<NonNull<u8>> {
        if size == 0 {
            return Err(StreamError::Allocation { size });
        }
        let page = allocation_granularity();
        if !is_power_of_two(alignment as u64) || alignment > page {
            return Err(StreamError::configuration(format!(
                "alignment {alignment} is not satisfiable by {page} byte pages"
            )));
        }

        // SAFETY: private anonymous mapping without an address hint touches
        // no existing memory.
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            if tracing::enabled!(tracing::Level::WARN) {
                tracing::warn!(size, error = %err, "mmap failed");
            }
            return Err(StreamError::Allocation { size });
        }
        NonNull::new(addr.cast::<u8>()).ok_or(StreamError::Allocation { size })
    }

    unsafe fn free(&mut self, ptr: NonNull<u8>, size: usize, _alignment: usize) -> Result<()> {
        // SAFETY: the caller guarantees ptr/size describe one live mapping.
        let rc = unsafe { libc::munmap(ptr.as_ptr().cast(), size) };
        if rc != 0 {
            return Err(StreamError::Platform {
                failed: 1,
                message: format!("munmap: {}", io::Error::last_os_error()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_is_zeroed_and_page_aligned() {
        let page = allocation_granularity();
        let mut alloc = VirtualMemoryAllocator;
        let ptr = alloc.reserve(3 * page, page).unwrap();
        assert_eq!(ptr.as_ptr() as usize % page, 0);

        let block = unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), 3 * page) };
        assert!(block.iter().all(|&b| b == 0));
        block[0] = 1;
        block[3 * page - 1] = 2;

        unsafe { alloc.free(ptr, 3 * page, page) }.unwrap();
    }

    #[test]
    fn test_rejects_unsatisfiable_alignment() {
        let page = allocation_granularity();
        let mut alloc = VirtualMemoryAllocator;
        assert!(matches!(
            alloc.reserve(page, page * 2),
            Err(StreamError::Configuration { .. })
        ));
        assert!(matches!(
            alloc.reserve(page, 0),
            Err(StreamError::Configuration { .. })
        ));
        assert!(matches!(
            alloc.reserve(0, page),
            Err(StreamError::Allocation { size: 0 })
        ));
    }

    #[test]
    fn test_munmap_failure_is_platform_error() {
        let page = allocation_granularity();
        let mut alloc = VirtualMemoryAllocator;
        let ptr = alloc.reserve(page, page).unwrap();

        // munmap rejects an address that is not page aligned with EINVAL and
        // leaves the mapping in place.
        let inside = unsafe { NonNull::new_unchecked(ptr.as_ptr().add(1)) };
        let err = unsafe { alloc.free(inside, page - 1, page) }.unwrap_err();
        assert!(matches!(err, StreamError::Platform { failed: 1, .. }));
        assert_eq!(err.status(), crate::Status::PlatformError);

        unsafe { alloc.free(ptr, page, page) }.unwrap();
    }
}
