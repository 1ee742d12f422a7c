//! Error types for stream construction, I/O and teardown.

use std::fmt;
use std::io;

use crate::status::Status;

/// Direction of a data transfer, used when reporting mode violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Copy bytes out of the stream
    Read,
    /// Copy bytes into the stream
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => write!(f, "reading"),
            Access::Write => write!(f, "writing"),
        }
    }
}

/// The specific argument check a read or write request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BoundsViolation {
    /// The caller's buffer has no bytes at all.
    #[error("buffer length was expected to be greater than zero")]
    EmptyBuffer,
    /// The request transfers nothing.
    #[error("count was expected to be greater than zero")]
    ZeroCount,
    /// `offset + count` runs past the end of the caller's buffer.
    #[error("buffer of {len} bytes does not contain {count} bytes at offset {offset}")]
    BufferTooSmall {
        /// Length of the caller's buffer.
        len: usize,
        /// Requested offset into the caller's buffer.
        offset: usize,
        /// Requested byte count.
        count: usize,
    },
    /// `position + count` runs past the stream capacity.
    #[error("{count} bytes at position {position} would exceed capacity {capacity}")]
    ExceedsCapacity {
        /// Stream position at the time of the request.
        position: u64,
        /// Requested byte count.
        count: usize,
        /// Stream capacity.
        capacity: u64,
    },
}

/// Errors returned by memory streams.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Block size or capacity rejected at construction.
    #[error("invalid stream configuration: {reason}")]
    Configuration {
        /// Human readable reason.
        reason: String,
    },
    /// Capacity does not fit the platform's native size type.
    #[error("capacity {capacity} is not representable on this platform")]
    Overflow {
        /// Requested capacity.
        capacity: u64,
    },
    /// A read or write request failed argument validation.
    #[error("request out of bounds: {0}")]
    Bounds(#[from] BoundsViolation),
    /// The stream mode does not allow the requested access.
    #[error("stream does not permit {access}")]
    Mode {
        /// Attempted access.
        access: Access,
    },
    /// Memory could not be reserved.
    #[error("failed to allocate {size} bytes of memory")]
    Allocation {
        /// Size of the failed reservation.
        size: usize,
    },
    /// The stream has already been disposed.
    #[error("stream has been disposed")]
    Lifecycle,
    /// Releasing memory back to the platform failed.
    #[error("failed to release {failed} allocation(s): {message}")]
    Platform {
        /// Number of allocations that could not be released.
        failed: usize,
        /// Description of the first failure.
        message: String,
    },
}

impl StreamError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        StreamError::Configuration {
            reason: reason.into(),
        }
    }

    /// Classify this error.
    pub fn status(&self) -> Status {
        match self {
            StreamError::Configuration { .. } => Status::Configuration,
            StreamError::Overflow { .. } => Status::Overflow,
            StreamError::Bounds(_) => Status::OutOfBounds,
            StreamError::Mode { .. } => Status::NotPermitted,
            StreamError::Allocation { .. } => Status::OutOfMemory,
            StreamError::Lifecycle => Status::Disposed,
            StreamError::Platform { .. } => Status::PlatformError,
        }
    }

    /// Returns the bounds check that failed, if this is a bounds error.
    pub fn bounds_violation(&self) -> Option<BoundsViolation> {
        match self {
            StreamError::Bounds(violation) => Some(*violation),
            _ => None,
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        let kind = match err.status() {
            Status::Configuration | Status::Overflow | Status::OutOfBounds => {
                io::ErrorKind::InvalidInput
            }
            Status::NotPermitted => io::ErrorKind::PermissionDenied,
            Status::OutOfMemory => io::ErrorKind::OutOfMemory,
            Status::Disposed => io::ErrorKind::NotConnected,
            Status::Ok | Status::PlatformError => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;
