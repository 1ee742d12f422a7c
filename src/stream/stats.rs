//! Occupancy snapshot of a stream.

use std::fmt;

use crate::stream::mode::StreamMode;

/// Point-in-time view of how much memory a stream has committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStats {
    /// Logical size
    pub capacity: u64,
    /// Size of one block (the whole region for fixed streams)
    pub block_size: u64,
    /// Number of blocks covering the capacity
    pub block_count: u64,
    /// Blocks currently holding memory
    pub allocated_blocks: u64,
    /// Bytes currently committed
    pub allocated_bytes: u64,
    /// Current position
    pub position: u64,
    /// Capability flags
    pub mode: StreamMode,
}

impl StreamStats {
    /// Fraction of blocks that are materialized, in `[0, 1]`.
    pub fn occupancy(&self) -> f64 {
        if self.block_count == 0 {
            return 0.0;
        }
        self.allocated_blocks as f64 / self.block_count as f64
    }
}

impl fmt::Display for StreamStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Memory Stream Statistics:")?;
        writeln!(f, "  Capacity: {} bytes", self.capacity)?;
        writeln!(f, "  Mode: {}", self.mode)?;
        writeln!(f, "  Position: {}", self.position)?;
        writeln!(
            f,
            "  Blocks: {}/{} x {} bytes ({:.1}%)",
            self.allocated_blocks,
            self.block_count,
            self.block_size,
            self.occupancy() * 100.0
        )?;
        writeln!(f, "  Committed: {} bytes", self.allocated_bytes)
    }
}
