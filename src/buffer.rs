//! Host-facing buffer selection.
//!
//! Hosts describe the buffer they need with a [`BufferConfig`] and let
//! [`MemoryBuffer::open`] pick the backing: capacities at or below the
//! eager-commit limit are reserved up front, anything larger is sparse.

use std::io::SeekFrom;

use crate::allocator::{BlockAllocator, GranularityPolicy, HeapAllocator};
use crate::error::Result;
use crate::size::MIB;
use crate::stream::{
    impl_std_io, FixedMemoryStream, MemoryStream, ReleaseSummary, SeekOrigin,
    SparseMemoryStream, StreamMode, StreamOptions, StreamState, StreamStats,
};

/// Capacities up to this size are committed eagerly by default.
pub const DEFAULT_EAGER_COMMIT_LIMIT: u64 = 16 * MIB;

/// Description of a buffer to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Logical size in bytes
    pub capacity: u64,
    /// Block size for sparse buffers; defaults to the allocation granularity
    pub block_size: Option<u32>,
    /// Capability flags
    pub mode: StreamMode,
    /// Largest capacity committed as a single region; `0` disables eager
    /// buffers
    pub eager_commit_limit: u64,
    /// Granularity override; defaults to the platform's
    pub granularity: Option<GranularityPolicy>,
}

impl BufferConfig {
    /// Read-write buffer of `capacity` bytes with default settings.
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            block_size: None,
            mode: StreamMode::ReadWrite,
            eager_commit_limit: DEFAULT_EAGER_COMMIT_LIMIT,
            granularity: None,
        }
    }

    /// Config with an explicit block size
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Config with an explicit mode
    pub fn with_mode(mut self, mode: StreamMode) -> Self {
        self.mode = mode;
        self
    }

    /// Config with an explicit eager-commit limit
    pub fn with_eager_commit_limit(mut self, limit: u64) -> Self {
        self.eager_commit_limit = limit;
        self
    }

    /// Config validated against `policy` instead of the platform
    pub fn with_granularity(mut self, policy: GranularityPolicy) -> Self {
        self.granularity = Some(policy);
        self
    }

    /// Whether [`MemoryBuffer::open`] will choose the eager backing.
    pub fn prefers_eager(&self) -> bool {
        self.capacity <= self.eager_commit_limit
    }

    /// Stream construction options derived from this config.
    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            block_size: self.block_size,
            mode: self.mode,
            granularity: self.granularity,
        }
    }
}

/// A memory stream with its backing chosen at open time.
#[derive(Debug)]
pub enum MemoryBuffer<A: BlockAllocator = HeapAllocator> {
    /// Blocks committed on first write
    Sparse(SparseMemoryStream<A>),
    /// Whole capacity committed up front
    Fixed(FixedMemoryStream<A>),
}

impl MemoryBuffer<HeapAllocator> {
    /// Open a heap-backed buffer.
    pub fn open(config: &BufferConfig) -> Result<Self> {
        Self::open_with_allocator(config, HeapAllocator)
    }
}

impl<A: BlockAllocator> MemoryBuffer<A> {
    /// Open a buffer whose memory comes from `allocator`.
    ///
    /// An explicit block size is validated even when the eager backing,
    /// which has no blocks, is chosen.
    pub fn open_with_allocator(config: &BufferConfig, allocator: A) -> Result<Self> {
        let options = config.stream_options();
        if let Some(block_size) = options.block_size {
            options.policy().validate(block_size)?;
        }
        let buffer = if config.prefers_eager() {
            MemoryBuffer::Fixed(FixedMemoryStream::with_allocator(
                config.capacity,
                options,
                allocator,
            )?)
        } else {
            MemoryBuffer::Sparse(SparseMemoryStream::with_allocator(
                config.capacity,
                options,
                allocator,
            )?)
        };

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                capacity = config.capacity,
                sparse = buffer.is_sparse(),
                "memory buffer opened"
            );
        }
        Ok(buffer)
    }

    /// Whether the buffer commits memory per block
    pub fn is_sparse(&self) -> bool {
        matches!(self, MemoryBuffer::Sparse(_))
    }

    /// Seek to a `std::io` target with the stream's wrapping rules.
    pub fn seek_from(&mut self, target: SeekFrom) -> Result<u64> {
        match self {
            MemoryBuffer::Sparse(s) => s.seek_from(target),
            MemoryBuffer::Fixed(f) => f.seek_from(target),
        }
    }

    /// Logical size in bytes
    pub fn capacity(&self) -> u64 {
        match self {
            MemoryBuffer::Sparse(s) => s.capacity(),
            MemoryBuffer::Fixed(f) => f.capacity(),
        }
    }

    /// Capability flags
    pub fn mode(&self) -> StreamMode {
        match self {
            MemoryBuffer::Sparse(s) => s.mode(),
            MemoryBuffer::Fixed(f) => f.mode(),
        }
    }

    /// Current position
    pub fn position(&self) -> u64 {
        match self {
            MemoryBuffer::Sparse(s) => s.position(),
            MemoryBuffer::Fixed(f) => f.position(),
        }
    }

    /// Whether the buffer has been disposed
    pub fn is_disposed(&self) -> bool {
        match self {
            MemoryBuffer::Sparse(s) => s.is_disposed(),
            MemoryBuffer::Fixed(f) => f.is_disposed(),
        }
    }

    /// See [`SparseMemoryStream::seek`].
    pub fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64> {
        match self {
            MemoryBuffer::Sparse(s) => s.seek(offset, origin),
            MemoryBuffer::Fixed(f) => f.seek(offset, origin),
        }
    }

    /// See [`SparseMemoryStream::read`].
    pub fn read(&mut self, dest: &mut [u8], offset: usize, count: usize) -> Result<usize> {
        match self {
            MemoryBuffer::Sparse(s) => s.read(dest, offset, count),
            MemoryBuffer::Fixed(f) => f.read(dest, offset, count),
        }
    }

    /// See [`SparseMemoryStream::write`].
    pub fn write(&mut self, src: &[u8], offset: usize, count: usize) -> Result<()> {
        match self {
            MemoryBuffer::Sparse(s) => s.write(src, offset, count),
            MemoryBuffer::Fixed(f) => f.write(src, offset, count),
        }
    }

    /// Occupancy snapshot
    pub fn stats(&self) -> StreamStats {
        match self {
            MemoryBuffer::Sparse(s) => s.stats(),
            MemoryBuffer::Fixed(f) => f.stats(),
        }
    }

    /// Release all memory and reject further I/O.
    pub fn dispose(&mut self) -> Result<ReleaseSummary> {
        match self {
            MemoryBuffer::Sparse(s) => s.dispose(),
            MemoryBuffer::Fixed(f) => f.dispose(),
        }
    }
}

impl<A: BlockAllocator> MemoryStream for MemoryBuffer<A> {
    fn len(&self) -> u64 {
        self.capacity()
    }

    fn mode(&self) -> StreamMode {
        Self::mode(self)
    }

    fn state(&self) -> StreamState {
        if Self::is_disposed(self) {
            StreamState::Disposed
        } else {
            StreamState::Ready
        }
    }

    fn position(&self) -> u64 {
        Self::position(self)
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

impl_std_io!(MemoryBuffer);

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: u64) -> BufferConfig {
        BufferConfig::new(capacity)
            .with_granularity(GranularityPolicy::with_granularity(4096).unwrap())
            .with_block_size(4096)
    }

    #[test]
    fn test_small_capacity_is_fixed() {
        let buffer = MemoryBuffer::open(&config(64 * 1024)).unwrap();
        assert!(!buffer.is_sparse());
        assert_eq!(buffer.capacity(), 64 * 1024);
    }

    #[test]
    fn test_large_capacity_is_sparse() {
        let buffer = MemoryBuffer::open(&config(64 * 1024).with_eager_commit_limit(4096)).unwrap();
        assert!(buffer.is_sparse());
        assert_eq!(buffer.stats().allocated_blocks, 0);
    }

    #[test]
    fn test_zero_limit_disables_eager() {
        let cfg = config(4096).with_eager_commit_limit(0);
        assert!(!cfg.prefers_eager());
        assert!(MemoryBuffer::open(&cfg).unwrap().is_sparse());
    }

    #[test]
    fn test_misaligned_block_size_rejected_for_both_backings() {
        for limit in [0, u64::MAX] {
            let cfg = config(8192)
                .with_block_size(1000)
                .with_eager_commit_limit(limit);
            assert!(
                matches!(
                    MemoryBuffer::open(&cfg),
                    Err(crate::error::StreamError::Configuration { .. })
                ),
                "eager limit {limit}"
            );
        }
    }

    #[test]
    fn test_both_backings_behave_alike() {
        for limit in [0, u64::MAX] {
            let mut buffer =
                MemoryBuffer::open(&config(16384).with_eager_commit_limit(limit)).unwrap();
            let data: Vec<u8> = (0..5000).map(|i| (i % 13) as u8).collect();
            buffer.seek(4000, SeekOrigin::Begin).unwrap();
            buffer.write(&data, 0, data.len()).unwrap();
            assert_eq!(buffer.position(), 9000);

            buffer.set_position(4000).unwrap();
            let mut out = vec![0u8; 5000];
            buffer.read(&mut out, 0, 5000).unwrap();
            assert_eq!(out, data);

            assert_eq!(buffer.seek(-1, SeekOrigin::Begin).unwrap(), 16383);
            buffer.dispose().unwrap();
            assert!(buffer.is_disposed());
        }
    }
}
