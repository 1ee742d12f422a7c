//! sparsemem - Sparse, block-allocated random-access memory streams
//!
//! Provides a fixed-capacity byte stream whose memory is committed lazily,
//! one block at a time, as regions are first written:
//!
//! - **SparseMemoryStream**: block table with on-demand materialization
//! - **FixedMemoryStream**: single region committed up front
//! - **MemoryBuffer**: picks one of the two from a [`BufferConfig`]
//!
//! # Features
//!
//! - Unwritten regions read back as zeroes without consuming memory
//! - Wrap-around seeking within the logical capacity
//! - Strict request validation; a rejected request changes nothing
//! - `std::io::{Read, Write, Seek}` adapters
//! - TOML and environment configuration
//!
//! # Quick Start
//!
//! ```rust
//! use sparsemem::{SeekOrigin, SparseMemoryStream};
//!
//! let mut stream = SparseMemoryStream::new(1 << 20)?;
//! stream.seek(4000, SeekOrigin::Begin)?;
//! stream.write(b"hello", 0, 5)?;
//!
//! stream.seek(4000, SeekOrigin::Begin)?;
//! let mut out = [0u8; 5];
//! stream.read(&mut out, 0, 5)?;
//! assert_eq!(&out, b"hello");
//! # Ok::<(), sparsemem::StreamError>(())
//! ```

#![warn(missing_docs)]

pub mod allocator;
pub mod buffer;
pub mod config;
pub mod error;
pub mod status;
pub mod stream;
mod utility;

// Re-exports for convenience
pub use allocator::{BlockAllocator, GranularityPolicy, HeapAllocator};
#[cfg(unix)]
pub use allocator::VirtualMemoryAllocator;
pub use buffer::{BufferConfig, MemoryBuffer};
pub use config::{ConfigError, SparsememConfig};
pub use error::{Access, BoundsViolation, Result, StreamError};
pub use status::Status;
pub use stream::{
    FixedMemoryStream, MemoryStream, ReleaseSummary, SeekOrigin, SparseMemoryStream, StreamMode,
    StreamOptions, StreamState, StreamStats,
};

/// Utility for size literals (e.g., 1_GiB)
pub mod size {
    /// 1 KiB in bytes
    pub const KIB: u64 = 1024;
    /// 1 MiB in bytes
    pub const MIB: u64 = 1024 * KIB;
    /// 1 GiB in bytes
    pub const GIB: u64 = 1024 * MIB;
}

/// Prelude module for common imports
pub mod prelude {
    pub use crate::buffer::{BufferConfig, MemoryBuffer};
    pub use crate::error::{Result, StreamError};
    pub use crate::stream::{
        FixedMemoryStream, MemoryStream, SeekOrigin, SparseMemoryStream, StreamMode,
    };
}
