//! Eagerly committed memory stream
//!
//! Reserves the full capacity, padded up to the allocation granularity, as
//! a single zeroed region at construction. Requests never split; each one
//! is one bounds-checked copy.

use std::io::SeekFrom;

use crate::allocator::{BlockAllocator, HeapAllocator};
use crate::error::{Access, Result, StreamError};
use crate::stream::block_table::{BlockTable, ReleaseSummary};
use crate::stream::cursor::{SeekOrigin, StreamCursor};
use crate::stream::mode::StreamMode;
use crate::stream::stats::StreamStats;
use crate::stream::validate::validate_request;
use crate::stream::{impl_std_io, MemoryStream, StreamOptions, StreamState};
use crate::utility::pad_alignment;

/// Memory stream backed by one contiguous allocation.
#[derive(Debug)]
pub struct FixedMemoryStream<A: BlockAllocator = HeapAllocator> {
    cursor: StreamCursor,
    mode: StreamMode,
    /// Single slot holding the whole region
    region: BlockTable,
    reserved: usize,
    allocator: A,
    state: StreamState,
}

impl FixedMemoryStream<HeapAllocator> {
    /// Read-write stream over `capacity` bytes of heap memory.
    pub fn new(capacity: u64) -> Result<Self> {
        Self::with_options(capacity, StreamOptions::default())
    }

    /// Stream with the given mode.
    pub fn with_mode(capacity: u64, mode: StreamMode) -> Result<Self> {
        Self::with_options(capacity, StreamOptions::default().with_mode(mode))
    }

    /// Stream backed by the global heap. `options.block_size` is ignored.
    pub fn with_options(capacity: u64, options: StreamOptions) -> Result<Self> {
        Self::with_allocator(capacity, options, HeapAllocator)
    }
}

impl<A: BlockAllocator> FixedMemoryStream<A> {
    /// Stream whose region comes from `allocator`.
    pub fn with_allocator(capacity: u64, options: StreamOptions, mut allocator: A) -> Result<Self> {
        if capacity == 0 {
            return Err(StreamError::configuration(
                "capacity was expected to be greater than zero",
            ));
        }
        let native = usize::try_from(capacity).map_err(|_| StreamError::Overflow { capacity })?;

        let policy = options.policy();
        let reserved = pad_alignment(native, policy.granularity())
            .ok_or(StreamError::Overflow { capacity })?;
        let mut region = BlockTable::new(1, reserved, policy.granularity())?;
        region.get_or_allocate(0, &mut allocator)?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(capacity, reserved, mode = %options.mode, "fixed stream created");
        }

        Ok(Self {
            cursor: StreamCursor::new(capacity),
            mode: options.mode,
            region,
            reserved,
            allocator,
            state: StreamState::Ready,
        })
    }

    /// Logical size in bytes
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.cursor.capacity()
    }

    /// Current position
    #[inline]
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Capability flags
    #[inline]
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Whether [`dispose`](Self::dispose) has run
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.state == StreamState::Disposed
    }

    /// Bytes reserved, including granularity padding
    #[inline]
    pub fn reserved_bytes(&self) -> usize {
        self.reserved
    }

    /// The allocator the region was reserved from
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            StreamState::Ready => Ok(()),
            StreamState::Disposed => Err(StreamError::Lifecycle),
        }
    }

    /// Move the position relative to `origin`, wrapping into `[0, capacity)`.
    pub fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64> {
        self.ensure_ready()?;
        Ok(self.cursor.seek(offset, origin))
    }

    /// Seek to a `std::io` target with the same wrapping rules.
    pub fn seek_from(&mut self, target: SeekFrom) -> Result<u64> {
        self.ensure_ready()?;
        Ok(self.cursor.seek_from(target))
    }

    /// Copy `count` bytes at the position into `dest[offset..offset + count]`.
    pub fn read(&mut self, dest: &mut [u8], offset: usize, count: usize) -> Result<usize> {
        self.ensure_ready()?;
        validate_request(
            dest.len(),
            offset,
            count,
            Access::Read,
            self.mode,
            &self.cursor,
        )?;

        // validated: position + count <= capacity <= reserved
        let region = self.region.get_if_present(0).ok_or(StreamError::Lifecycle)?;
        let start = self.cursor.position() as usize;
        dest[offset..offset + count].copy_from_slice(&region[start..start + count]);
        self.cursor.advance(count);
        Ok(count)
    }

    /// Copy `src[offset..offset + count]` into the stream at the position.
    pub fn write(&mut self, src: &[u8], offset: usize, count: usize) -> Result<()> {
        self.ensure_ready()?;
        validate_request(
            src.len(),
            offset,
            count,
            Access::Write,
            self.mode,
            &self.cursor,
        )?;

        // Ready implies the slot is filled, so this never reserves.
        let region = self.region.get_or_allocate(0, &mut self.allocator)?;
        let start = self.cursor.position() as usize;
        region[start..start + count].copy_from_slice(&src[offset..offset + count]);
        self.cursor.advance(count);
        Ok(())
    }

    /// Release the region and reject further I/O.
    pub fn dispose(&mut self) -> Result<ReleaseSummary> {
        self.ensure_ready()?;
        self.state = StreamState::Disposed;
        let summary = self.region.release_all(&mut self.allocator);

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(reserved = self.reserved, "fixed stream disposed");
        }

        if summary.failed > 0 {
            return Err(StreamError::Platform {
                failed: summary.failed,
                message: summary.first_error.unwrap_or_default(),
            });
        }
        Ok(summary)
    }

    /// Occupancy snapshot. The region counts as a single block.
    pub fn stats(&self) -> StreamStats {
        let allocated = self.region.allocated_blocks() as u64;
        StreamStats {
            capacity: self.capacity(),
            block_size: self.reserved as u64,
            block_count: 1,
            allocated_blocks: allocated,
            allocated_bytes: allocated * self.reserved as u64,
            position: self.cursor.position(),
            mode: self.mode,
        }
    }
}

impl<A: BlockAllocator> MemoryStream for FixedMemoryStream<A> {
    fn len(&self) -> u64 {
        self.capacity()
    }

    fn mode(&self) -> StreamMode {
        self.mode
    }

    fn state(&self) -> StreamState {
        self.state
    }

    fn position(&self) -> u64 {
        self.cursor.position()
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64> {
        Self::seek(self, offset, origin)
    }

    fn read(&mut self, dest: &mut [u8], offset: usize, count: usize) -> Result<usize> {
        Self::read(self, dest, offset, count)
    }

    fn write(&mut self, src: &[u8], offset: usize, count: usize) -> Result<()> {
        Self::write(self, src, offset, count)
    }

    fn stats(&self) -> StreamStats {
        Self::stats(self)
    }

    fn dispose(&mut self) -> Result<ReleaseSummary> {
        Self::dispose(self)
    }
}

impl_std_io!(FixedMemoryStream);

impl<A: BlockAllocator> Drop for FixedMemoryStream<A> {
    fn drop(&mut self) {
        if self.state == StreamState::Ready {
            self.state = StreamState::Disposed;
            // failures are logged by release_all
            let _ = self.region.release_all(&mut self.allocator);
        }
    }
}
