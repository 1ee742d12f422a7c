//! Status codes for sparsemem operations
//!
//! Every [`StreamError`](crate::StreamError) maps onto one of these codes so
//! hosts can branch on the failure class without matching error payloads.

use std::fmt;

/// Status code classifying the outcome of a stream operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Status {
    /// Operation completed successfully
    #[default]
    Ok = 0,
    /// Block size or capacity is not aligned to the allocation granularity
    Configuration = 1,
    /// Capacity is not representable in the native size type
    Overflow = 2,
    /// Offset, count or position violates buffer or capacity limits
    OutOfBounds = 3,
    /// Operation not permitted by the stream mode
    NotPermitted = 4,
    /// Memory for a block or buffer could not be reserved
    OutOfMemory = 5,
    /// Operation attempted after the stream was disposed
    Disposed = 6,
    /// The platform reported a failure while releasing memory
    PlatformError = 7,
}

impl Status {
    /// Check if the status indicates success
    #[inline]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Check if the status indicates an error
    #[inline]
    pub const fn is_error(&self) -> bool {
        !self.is_ok()
    }

    /// Check if the failure was caused by the caller's arguments rather than
    /// by the environment.
    #[inline]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Status::Configuration
                | Status::Overflow
                | Status::OutOfBounds
                | Status::NotPermitted
                | Status::Disposed
        )
    }

    /// Get the status as a string
    pub const fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "Ok",
            Status::Configuration => "Configuration",
            Status::Overflow => "Overflow",
            Status::OutOfBounds => "OutOfBounds",
            Status::NotPermitted => "NotPermitted",
            Status::OutOfMemory => "OutOfMemory",
            Status::Disposed => "Disposed",
            Status::PlatformError => "PlatformError",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
