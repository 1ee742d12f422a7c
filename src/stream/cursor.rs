//! Position tracking with ring-style seek normalization.

use std::io::SeekFrom;

/// Reference point for [`StreamCursor::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    /// Offset from the start of the stream
    Begin,
    /// Offset from the current position
    Current,
    /// Offset back from the end of the stream: the target is
    /// `capacity - offset`
    End,
}

/// Current position within a fixed capacity.
///
/// Seeks never fail: every target is wrapped into `[0, capacity)`. Reads and
/// writes may leave the position at exactly `capacity`; the next seek wraps
/// it back to the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCursor {
    position: u64,
    capacity: u64,
}

impl StreamCursor {
    /// Cursor at position zero. `capacity` must be non-zero.
    pub fn new(capacity: u64) -> Self {
        debug_assert!(capacity > 0);
        Self {
            position: 0,
            capacity,
        }
    }

    /// Current position
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Fixed capacity
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes between the position and the end of the stream
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.capacity - self.position
    }

    /// Move relative to `origin`, wrapping into `[0, capacity)`.
    pub fn seek(&mut self, offset: i64, origin: SeekOrigin) -> u64 {
        let offset = offset as i128;
        let raw = match origin {
            SeekOrigin::Begin => offset,
            SeekOrigin::Current => self.position as i128 + offset,
            SeekOrigin::End => self.capacity as i128 - offset,
        };
        self.seek_to(raw)
    }

    /// Same as [`seek`](Self::seek) for a `std::io` seek target.
    ///
    /// `SeekFrom::End(n)` follows the `std::io` convention: the target is
    /// `capacity + n`.
    pub fn seek_from(&mut self, target: SeekFrom) -> u64 {
        let raw = match target {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(offset) => self.position as i128 + offset as i128,
            SeekFrom::End(offset) => self.capacity as i128 + offset as i128,
        };
        self.seek_to(raw)
    }

    fn seek_to(&mut self, raw: i128) -> u64 {
        // capacity and position both fit in u64, so raw never overflows i128
        self.position = raw.rem_euclid(self.capacity as i128) as u64;
        self.position
    }

    /// Advance after a completed transfer of `count` bytes.
    #[inline]
    pub(crate) fn advance(&mut self, count: usize) {
        debug_assert!(count as u64 <= self.remaining());
        self.position += count as u64;
    }
}
