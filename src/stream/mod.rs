//! Random-access memory streams
//!
//! Two implementations of one contract:
//!
//! - [`SparseMemoryStream`]: splits the capacity into fixed-size blocks and
//!   reserves each block on the first write that touches it. Unwritten
//!   regions read back as zeroes without consuming memory.
//! - [`FixedMemoryStream`]: reserves the whole capacity as one zeroed region
//!   at construction.
//!
//! Both follow the same rules:
//!
//! ```text
//!   seek   -> wraps any target into [0, capacity), never fails while Ready
//!   read   -> validate, then copy exactly `count` bytes out
//!   write  -> validate, then copy exactly `count` bytes in
//!   dispose-> release all memory, every later read/write/seek fails
//! ```
//!
//! A request that fails validation changes nothing. Neither stream does any
//! internal locking; a stream is used from one thread at a time.

mod block_table;
mod cursor;
mod fixed;
mod mode;
mod sparse;
mod stats;
mod validate;

pub use block_table::{BlockTable, ReleaseSummary};
pub use cursor::{SeekOrigin, StreamCursor};
pub use fixed::FixedMemoryStream;
pub use mode::{ParseModeError, StreamMode};
pub use sparse::SparseMemoryStream;
pub use stats::StreamStats;

use crate::allocator::GranularityPolicy;
use crate::error::Result;

/// Lifecycle of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Constructed, accepting I/O
    Ready,
    /// Memory released, rejecting I/O
    Disposed,
}

/// Construction parameters shared by both stream kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamOptions {
    /// Block size in bytes; defaults to the allocation granularity.
    /// Ignored by [`FixedMemoryStream`].
    pub block_size: Option<u32>,
    /// Capability flags
    pub mode: StreamMode,
    /// Granularity to validate against; defaults to the platform's.
    pub granularity: Option<GranularityPolicy>,
}

impl StreamOptions {
    /// Options with an explicit block size
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Options with an explicit mode
    pub fn with_mode(mut self, mode: StreamMode) -> Self {
        self.mode = mode;
        self
    }

    /// Options validated against `policy` instead of the platform
    pub fn with_granularity(mut self, policy: GranularityPolicy) -> Self {
        self.granularity = Some(policy);
        self
    }

    pub(crate) fn policy(&self) -> GranularityPolicy {
        self.granularity.unwrap_or_else(GranularityPolicy::platform)
    }
}

/// Seekable, fixed-capacity byte stream held in memory.
pub trait MemoryStream {
    /// Logical size in bytes; fixed at construction.
    fn len(&self) -> u64;

    /// Always `false`: construction rejects a zero capacity.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capability flags the stream was created with.
    fn mode(&self) -> StreamMode;

    /// Current lifecycle state.
    fn state(&self) -> StreamState;

    /// Whether the stream has been disposed.
    fn is_disposed(&self) -> bool {
        self.state() == StreamState::Disposed
    }

    /// Whether a read would pass the mode check right now.
    fn can_read(&self) -> bool {
        !self.is_disposed() && self.mode().can_read()
    }

    /// Whether a write would pass the mode check right now.
    fn can_write(&self) -> bool {
        !self.is_disposed() && self.mode().can_write()
    }

    /// Whether seeking is possible right now.
    fn can_seek(&self) -> bool {
        !self.is_disposed()
    }

    /// Current position.
    fn position(&self) -> u64;

    /// Equivalent to `seek(position, SeekOrigin::Begin)`.
    fn set_position(&mut self, position: i64) -> Result<u64> {
        self.seek(position, SeekOrigin::Begin)
    }

    /// Move the position, wrapping into `[0, len)`.
    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64>;

    /// Copy `count` bytes from the position into `dest[offset..offset + count]`.
    fn read(&mut self, dest: &mut [u8], offset: usize, count: usize) -> Result<usize>;

    /// Copy `src[offset..offset + count]` into the stream at the position.
    fn write(&mut self, src: &[u8], offset: usize, count: usize) -> Result<()>;

    /// Occupancy snapshot.
    fn stats(&self) -> StreamStats;

    /// Release all memory and reject further I/O.
    fn dispose(&mut self) -> Result<ReleaseSummary>;
}

/// Bytes a `std::io` transfer of `requested` bytes may move at `position`.
#[inline]
pub(crate) fn io_span(requested: usize, position: u64, capacity: u64) -> usize {
    let remaining = capacity.saturating_sub(position);
    usize::try_from(remaining).map_or(requested, |remaining| requested.min(remaining))
}

/// Implements `std::io::{Read, Write, Seek}` on top of [`MemoryStream`].
///
/// `Read` and `Write` clamp to the bytes left before the end and report
/// `Ok(0)` there; `flush` is a no-op.
macro_rules! impl_std_io {
    ($ty:ident) => {
        impl<A: $crate::allocator::BlockAllocator> ::std::io::Read for $ty<A> {
            fn read(&mut self, buf: &mut [u8]) -> ::std::io::Result<usize> {
                let count = $crate::stream::io_span(
                    buf.len(),
                    $crate::stream::MemoryStream::position(self),
                    $crate::stream::MemoryStream::len(self),
                );
                if count == 0 && !$crate::stream::MemoryStream::is_disposed(self) {
                    return Ok(0);
                }
                Ok($crate::stream::MemoryStream::read(self, buf, 0, count)?)
            }
        }

        impl<A: $crate::allocator::BlockAllocator> ::std::io::Write for $ty<A> {
            fn write(&mut self, buf: &[u8]) -> ::std::io::Result<usize> {
                let count = $crate::stream::io_span(
                    buf.len(),
                    $crate::stream::MemoryStream::position(self),
                    $crate::stream::MemoryStream::len(self),
                );
                if count == 0 && !$crate::stream::MemoryStream::is_disposed(self) {
                    return Ok(0);
                }
                $crate::stream::MemoryStream::write(self, buf, 0, count)?;
                Ok(count)
            }

            fn flush(&mut self) -> ::std::io::Result<()> {
                Ok(())
            }
        }

        impl<A: $crate::allocator::BlockAllocator> ::std::io::Seek for $ty<A> {
            fn seek(&mut self, pos: ::std::io::SeekFrom) -> ::std::io::Result<u64> {
                Ok(self.seek_from(pos)?)
            }
        }
    };
}

pub(crate) use impl_std_io;
