//! Platform allocation granularity discovery and validation.

use std::sync::OnceLock;

use crate::error::{Result, StreamError};
use crate::utility::is_power_of_two;

/// Granularity assumed when the platform query is unavailable or fails.
#[cfg(unix)]
pub const FALLBACK_GRANULARITY: usize = 4096;

/// Granularity assumed when the platform query is unavailable or fails.
///
/// Windows reserves virtual memory in 64 KiB units.
#[cfg(not(unix))]
pub const FALLBACK_GRANULARITY: usize = 64 * 1024;

static PLATFORM_GRANULARITY: OnceLock<usize> = OnceLock::new();

/// The platform's minimum virtual memory allocation unit.
///
/// Queried once per process and cached.
pub fn allocation_granularity() -> usize {
    *PLATFORM_GRANULARITY.get_or_init(query_granularity)
}

#[cfg(unix)]
fn query_granularity() -> usize {
    // SAFETY: sysconf has no preconditions.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    match usize::try_from(page_size) {
        Ok(value) if is_power_of_two(value as u64) => value,
        _ => {
            if tracing::enabled!(tracing::Level::WARN) {
                tracing::warn!(
                    page_size,
                    fallback = FALLBACK_GRANULARITY,
                    "page size query failed, using fallback granularity"
                );
            }
            FALLBACK_GRANULARITY
        }
    }
}

#[cfg(not(unix))]
fn query_granularity() -> usize {
    FALLBACK_GRANULARITY
}

/// Validates block and region sizes against an allocation granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GranularityPolicy {
    granularity: usize,
}

impl GranularityPolicy {
    /// Policy for the running platform.
    pub fn platform() -> Self {
        Self {
            granularity: allocation_granularity(),
        }
    }

    /// Policy with an explicit granularity.
    ///
    /// The granularity must be a power of two that fits in a `u32`.
    pub fn with_granularity(granularity: usize) -> Result<Self> {
        if !is_power_of_two(granularity as u64) || u32::try_from(granularity).is_err() {
            return Err(StreamError::configuration(format!(
                "allocation granularity {granularity} is not a power of two"
            )));
        }
        Ok(Self { granularity })
    }

    /// The granularity in bytes.
    pub fn granularity(&self) -> usize {
        self.granularity
    }

    /// Default block size for streams built with this policy: one unit.
    pub fn default_block_size(&self) -> u32 {
        // with_granularity/platform only admit values that fit
        self.granularity as u32
    }

    /// Whether `value` is a multiple of the granularity.
    pub fn is_aligned(&self, value: u64) -> bool {
        value % self.granularity as u64 == 0
    }

    /// Reject block sizes that are zero or not a multiple of the granularity.
    pub fn validate(&self, block_size: u32) -> Result<()> {
        if block_size == 0 {
            return Err(StreamError::configuration(
                "block size was expected to be greater than zero",
            ));
        }
        if !self.is_aligned(block_size as u64) {
            return Err(StreamError::configuration(format!(
                "block size {block_size} is not aligned to allocation granularity ({})",
                self.granularity
            )));
        }
        Ok(())
    }
}

impl Default for GranularityPolicy {
    fn default() -> Self {
        Self::platform()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_granularity_is_cached_power_of_two() {
        let first = allocation_granularity();
        assert!(is_power_of_two(first as u64));
        assert_eq!(first, allocation_granularity());
        assert_eq!(GranularityPolicy::platform().granularity(), first);
    }

    #[test]
    fn test_validate_multiples() {
        let policy = GranularityPolicy::with_granularity(4096).unwrap();
        policy.validate(4096).unwrap();
        policy.validate(8192).unwrap();
        policy.validate(4096 * 16).unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_and_misaligned() {
        let policy = GranularityPolicy::with_granularity(4096).unwrap();
        assert!(matches!(
            policy.validate(0),
            Err(StreamError::Configuration { .. })
        ));
        assert!(matches!(
            policy.validate(4095),
            Err(StreamError::Configuration { .. })
        ));
        assert!(matches!(
            policy.validate(6144),
            Err(StreamError::Configuration { .. })
        ));
    }

    #[test]
    fn test_with_granularity_rejects_non_power_of_two() {
        assert!(GranularityPolicy::with_granularity(0).is_err());
        assert!(GranularityPolicy::with_granularity(3000).is_err());
        assert_eq!(
            GranularityPolicy::with_granularity(512)
                .unwrap()
                .default_block_size(),
            512
        );
    }
}
