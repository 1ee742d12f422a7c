//! Sparse block table
//!
//! One slot per block of the stream. A slot is either empty, reading as all
//! zeroes, or holds exactly one `block_size` reservation obtained from the
//! stream's allocator. Slots are only ever filled; they are emptied once, at
//! teardown, by [`BlockTable::release_all`].

use std::ptr::NonNull;
use std::slice;

use crate::allocator::BlockAllocator;
use crate::error::{Result, StreamError};

/// `None` for a never written block, otherwise the block's reservation.
/// Size and alignment are the table's, so a slot is one pointer wide.
type BlockSlot = Option<NonNull<u8>>;

/// Outcome of [`BlockTable::release_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseSummary {
    /// Blocks handed back to the allocator successfully
    pub freed: usize,
    /// Blocks whose release reported an error
    pub failed: usize,
    /// Message of the first failure, if any
    pub first_error: Option<String>,
}

impl ReleaseSummary {
    /// Blocks visited that were owned, whatever the outcome
    pub fn released(&self) -> usize {
        self.freed + self.failed
    }
}

/// Sparse mapping from block index to an optionally allocated block.
///
/// The table does not know its allocator. Blocks still held when the table
/// is dropped are leaked; owners call [`release_all`](Self::release_all)
/// first.
#[derive(Debug)]
pub struct BlockTable {
    slots: Vec<BlockSlot>,
    block_size: usize,
    alignment: usize,
    allocated: usize,
}

// Safety: the table exclusively owns every reservation in its slots and only
// hands out borrows tied to itself.
unsafe impl Send for BlockTable {}
unsafe impl Sync for BlockTable {}

impl BlockTable {
    /// Create a table of `block_count` empty slots.
    ///
    /// Only the slot array is allocated here; fails with
    /// [`StreamError::Allocation`] if even that cannot be reserved.
    pub fn new(block_count: usize, block_size: usize, alignment: usize) -> Result<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(block_count)
            .map_err(|_| StreamError::Allocation {
                size: block_count.saturating_mul(std::mem::size_of::<BlockSlot>()),
            })?;
        slots.resize(block_count, None);
        Ok(Self {
            slots,
            block_size,
            alignment,
            allocated: 0,
        })
    }

    /// Number of slots
    #[inline]
    pub fn block_count(&self) -> usize {
        self.slots.len()
    }

    /// Size of every owned block
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of owned blocks
    #[inline]
    pub fn allocated_blocks(&self) -> usize {
        self.allocated
    }

    /// Whether the slot at `index` owns a block. Out-of-range indices are
    /// reported as not allocated.
    pub fn is_allocated(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    /// Block contents at `index`, or `None` for an empty slot.
    pub fn get_if_present(&self, index: usize) -> Option<&[u8]> {
        self.slots[index].map(|ptr| {
            // SAFETY: an owned slot points at block_size bytes reserved for
            // this table, borrowed here for no longer than &self.
            unsafe { slice::from_raw_parts(ptr.as_ptr(), self.block_size) }
        })
    }

    /// Block contents at `index`, reserving a zeroed block first if the slot
    /// is empty.
    pub fn get_or_allocate<A>(&mut self, index: usize, allocator: &mut A) -> Result<&mut [u8]>
    where
        A: BlockAllocator + ?Sized,
    {
        let ptr = match self.slots[index] {
            Some(ptr) => ptr,
            None => {
                let ptr = allocator.reserve(self.block_size, self.alignment)?;
                self.slots[index] = Some(ptr);
                self.allocated += 1;

                if tracing::enabled!(tracing::Level::DEBUG) {
                    tracing::debug!(
                        block = index,
                        block_size = self.block_size,
                        allocated_blocks = self.allocated,
                        "block materialized"
                    );
                }
                ptr
            }
        };

        // SAFETY: as in get_if_present; &mut self makes the borrow unique.
        Ok(unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), self.block_size) })
    }

    /// Hand every owned block back to `allocator`.
    ///
    /// Visits every slot. A failed release is logged and counted, and the
    /// walk continues with the next slot.
    pub fn release_all<A>(&mut self, allocator: &mut A) -> ReleaseSummary
    where
        A: BlockAllocator + ?Sized,
    {
        let mut summary = ReleaseSummary::default();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(ptr) = slot.take() else {
                continue;
            };
            // SAFETY: the reservation came from this allocator with the
            // table's size and alignment, and the slot no longer refers to it.
            match unsafe { allocator.free(ptr, self.block_size, self.alignment) } {
                Ok(()) => summary.freed += 1,
                Err(err) => {
                    if tracing::enabled!(tracing::Level::WARN) {
                        tracing::warn!(block = index, error = %err, "failed to release block");
                    }
                    summary.failed += 1;
                    if summary.first_error.is_none() {
                        summary.first_error = Some(err.to_string());
                    }
                }
            }
        }
        self.allocated = 0;
        summary
    }
}

impl Drop for BlockTable {
    fn drop(&mut self) {
        if self.allocated > 0 && tracing::enabled!(tracing::Level::WARN) {
            tracing::warn!(
                blocks = self.allocated,
                block_size = self.block_size,
                "block table dropped without release, leaking blocks"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::HeapAllocator;

    struct FailingFree;

    unsafe impl BlockAllocator for FailingFree {
        fn reserve(&mut self, size: usize, alignment: usize) -> Result<NonNull<u8>> {
            HeapAllocator.reserve(size, alignment)
        }

        unsafe fn free(&mut self, ptr: NonNull<u8>, size: usize, alignment: usize) -> Result<()> {
            unsafe { HeapAllocator.free(ptr, size, alignment) }?;
            Err(StreamError::Platform {
                failed: 1,
                message: "release refused".to_string(),
            })
        }
    }

    #[test]
    fn test_slot_is_one_pointer_wide() {
        assert_eq!(
            std::mem::size_of::<BlockSlot>(),
            std::mem::size_of::<usize>()
        );
    }

    #[test]
    fn test_new_table_is_empty() {
        let mut table = BlockTable::new(4, 4096, 4096).unwrap();
        assert_eq!(table.block_count(), 4);
        assert_eq!(table.block_size(), 4096);
        assert_eq!(table.allocated_blocks(), 0);
        for index in 0..4 {
            assert!(table.get_if_present(index).is_none());
            assert!(!table.is_allocated(index));
        }
        assert!(!table.is_allocated(4));
        assert_eq!(table.release_all(&mut HeapAllocator).released(), 0);
    }

    #[test]
    fn test_get_or_allocate_is_idempotent() {
        let mut table = BlockTable::new(2, 4096, 4096).unwrap();
        let mut alloc = HeapAllocator;

        let block = table.get_or_allocate(1, &mut alloc).unwrap();
        assert_eq!(block.len(), 4096);
        assert!(block.iter().all(|&b| b == 0));
        block[10] = 7;

        let again = table.get_or_allocate(1, &mut alloc).unwrap();
        assert_eq!(again[10], 7);
        assert_eq!(table.allocated_blocks(), 1);
        assert!(table.is_allocated(1));
        assert!(!table.is_allocated(0));
        assert_eq!(table.get_if_present(1).unwrap()[10], 7);

        assert_eq!(table.release_all(&mut alloc).freed, 1);
    }

    #[test]
    fn test_failed_reservation_leaves_slot_empty() {
        let mut table = BlockTable::new(1, 4096, 3).unwrap();
        let err = table.get_or_allocate(0, &mut HeapAllocator).unwrap_err();
        assert!(matches!(err, StreamError::Allocation { size: 4096 }));
        assert_eq!(table.allocated_blocks(), 0);
        assert!(!table.is_allocated(0));
    }

    #[test]
    fn test_release_all_frees_each_block_once() {
        let mut table = BlockTable::new(8, 4096, 4096).unwrap();
        let mut alloc = HeapAllocator;
        for index in [0, 3, 7] {
            table.get_or_allocate(index, &mut alloc).unwrap();
        }

        let summary = table.release_all(&mut alloc);
        assert_eq!(summary.freed, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(table.allocated_blocks(), 0);
        assert!((0..8).all(|i| !table.is_allocated(i)));
    }

    #[test]
    fn test_release_all_continues_after_failure() {
        let mut table = BlockTable::new(3, 4096, 4096).unwrap();
        let mut alloc = FailingFree;
        for index in 0..3 {
            table.get_or_allocate(index, &mut alloc).unwrap();
        }

        let summary = table.release_all(&mut alloc);
        assert_eq!(summary.freed, 0);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.released(), 3);
        assert!(summary.first_error.unwrap().contains("release refused"));
        assert!((0..3).all(|i| !table.is_allocated(i)));
    }
}
