//! Sparse, block-allocated memory stream
//!
//! The capacity is divided into `block_count = ceil(capacity / block_size)`
//! blocks. No block memory exists until a write touches the block:
//!
//! ```text
//!   position:  0        B        2B       3B     capacity
//!              ├────────┼────────┼────────┼────────┤
//!   blocks:    │ owned  │ empty  │ owned  │ empty  │
//!              └────────┴────────┴────────┴────────┘
//!   read  -> owned: copy, empty: zero-fill
//!   write -> empty: reserve a zeroed block, then copy
//! ```
//!
//! Every request is split at block boundaries and served one span at a time.

use std::io::SeekFrom;

use crate::allocator::{BlockAllocator, HeapAllocator};
use crate::error::{Access, Result, StreamError};
use crate::stream::block_table::{BlockTable, ReleaseSummary};
use crate::stream::cursor::{SeekOrigin, StreamCursor};
use crate::stream::mode::StreamMode;
use crate::stream::stats::StreamStats;
use crate::stream::validate::validate_request;
use crate::stream::{impl_std_io, MemoryStream, StreamOptions, StreamState};
use crate::utility::block_count_for;

/// The part of a request that falls inside a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockSpan {
    /// Block index
    block: usize,
    /// Offset of the span within the block
    offset: usize,
    /// Span length, never crossing the block end
    len: usize,
}

impl BlockSpan {
    /// Span starting at `position` covering at most `remaining` bytes.
    #[inline]
    fn locate(position: u64, block_size: usize, remaining: usize) -> Self {
        let block_size_u64 = block_size as u64;
        let block = (position / block_size_u64) as usize;
        let offset = (position % block_size_u64) as usize;
        Self {
            block,
            offset,
            len: remaining.min(block_size - offset),
        }
    }

    #[inline]
    fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Memory stream that commits block memory on first write.
///
/// See the [module documentation](self) for the layout.
///
/// # Example
///
/// ```
/// use sparsemem::{SeekOrigin, SparseMemoryStream};
///
/// let mut stream = SparseMemoryStream::new(1 << 20)?;
/// stream.write(b"hello", 0, 5)?;
/// assert_eq!(stream.allocated_blocks(), 1);
///
/// stream.seek(0, SeekOrigin::Begin)?;
/// let mut buf = [0u8; 5];
/// stream.read(&mut buf, 0, 5)?;
/// assert_eq!(&buf, b"hello");
/// # Ok::<(), sparsemem::StreamError>(())
/// ```
#[derive(Debug)]
pub struct SparseMemoryStream<A: BlockAllocator = HeapAllocator> {
    cursor: StreamCursor,
    mode: StreamMode,
    block_size: usize,
    table: BlockTable,
    allocator: A,
    state: StreamState,
}

impl SparseMemoryStream<HeapAllocator> {
    /// Read-write stream with the default block size.
    pub fn new(capacity: u64) -> Result<Self> {
        Self::with_options(capacity, StreamOptions::default())
    }

    /// Read-write stream with an explicit block size.
    pub fn with_block_size(capacity: u64, block_size: u32) -> Result<Self> {
        Self::with_options(capacity, StreamOptions::default().with_block_size(block_size))
    }

    /// Stream with the default block size and the given mode.
    pub fn with_mode(capacity: u64, mode: StreamMode) -> Result<Self> {
        Self::with_options(capacity, StreamOptions::default().with_mode(mode))
    }

    /// Stream backed by the global heap.
    pub fn with_options(capacity: u64, options: StreamOptions) -> Result<Self> {
        Self::with_allocator(capacity, options, HeapAllocator)
    }
}

impl<A: BlockAllocator> SparseMemoryStream<A> {
    /// Stream whose blocks come from `allocator`.
    ///
    /// Fails with [`StreamError::Configuration`] for a zero capacity or a
    /// block size that is not a positive multiple of the granularity, and
    /// with [`StreamError::Overflow`] if the capacity does not fit `usize`.
    pub fn with_allocator(capacity: u64, options: StreamOptions, allocator: A) -> Result<Self> {
        if capacity == 0 {
            return Err(StreamError::configuration(
                "capacity was expected to be greater than zero",
            ));
        }
        if usize::try_from(capacity).is_err() {
            return Err(StreamError::Overflow { capacity });
        }

        let policy = options.policy();
        let block_size = options
            .block_size
            .unwrap_or_else(|| policy.default_block_size());
        policy.validate(block_size)?;

        // block_count <= capacity, which fits usize
        let block_count = block_count_for(capacity, block_size as u64) as usize;
        let table = BlockTable::new(block_count, block_size as usize, policy.granularity())?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                capacity,
                block_size,
                block_count,
                mode = %options.mode,
                "sparse stream created"
            );
        }

        Ok(Self {
            cursor: StreamCursor::new(capacity),
            mode: options.mode,
            block_size: block_size as usize,
            table,
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

    /// Size of one block
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks covering the capacity
    #[inline]
    pub fn block_count(&self) -> usize {
        self.table.block_count()
    }

    /// Number of blocks holding memory
    #[inline]
    pub fn allocated_blocks(&self) -> usize {
        self.table.allocated_blocks()
    }

    /// Bytes of block memory committed so far
    #[inline]
    pub fn allocated_bytes(&self) -> u64 {
        self.table.allocated_blocks() as u64 * self.block_size as u64
    }

    /// Whether the block at `index` holds memory
    pub fn is_block_allocated(&self, index: usize) -> bool {
        self.table.is_allocated(index)
    }

    /// The allocator blocks are reserved from
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
    ///
    /// Never-written regions read as zeroes and stay unallocated. Returns
    /// `count`.
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

        let mut done = 0;
        while done < count {
            let span = BlockSpan::locate(self.cursor.position(), self.block_size, count - done);
            let target = &mut dest[offset + done..offset + done + span.len];
            match self.table.get_if_present(span.block) {
                Some(block) => target.copy_from_slice(&block[span.range()]),
                None => target.fill(0),
            }
            self.cursor.advance(span.len);
            done += span.len;
        }
        Ok(done)
    }

    /// Copy `src[offset..offset + count]` into the stream at the position.
    ///
    /// Blocks are reserved as the write reaches them. If a reservation
    /// fails the error is returned at once; spans already copied by this
    /// call keep their new contents and the position stays after them.
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

        let mut done = 0;
        while done < count {
            let span = BlockSpan::locate(self.cursor.position(), self.block_size, count - done);
            let block = self.table.get_or_allocate(span.block, &mut self.allocator)?;
            block[span.range()].copy_from_slice(&src[offset + done..offset + done + span.len]);
            self.cursor.advance(span.len);
            done += span.len;
        }
        Ok(())
    }

    /// Release every block and move to [`StreamState::Disposed`].
    ///
    /// All blocks are visited even if some fail to release; in that case the
    /// stream is still disposed and [`StreamError::Platform`] is returned.
    pub fn dispose(&mut self) -> Result<ReleaseSummary> {
        self.ensure_ready()?;
        self.state = StreamState::Disposed;
        let summary = self.table.release_all(&mut self.allocator);

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                freed = summary.freed,
                failed = summary.failed,
                "sparse stream disposed"
            );
        }

        if summary.failed > 0 {
            return Err(StreamError::Platform {
                failed: summary.failed,
                message: summary.first_error.unwrap_or_default(),
            });
        }
        Ok(summary)
    }

    /// Occupancy snapshot
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            capacity: self.capacity(),
            block_size: self.block_size as u64,
            block_count: self.block_count() as u64,
            allocated_blocks: self.allocated_blocks() as u64,
            allocated_bytes: self.allocated_bytes(),
            position: self.cursor.position(),
            mode: self.mode,
        }
    }
}

impl<A: BlockAllocator> MemoryStream for SparseMemoryStream<A> {
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

impl_std_io!(SparseMemoryStream);

impl<A: BlockAllocator> Drop for SparseMemoryStream<A> {
    fn drop(&mut self) {
        if self.state == StreamState::Ready {
            self.state = StreamState::Disposed;
            // failures are logged per block by release_all
            let _ = self.table.release_all(&mut self.allocator);
        }
    }
}
