//! Stream capability flags.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which transfers a stream admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// Reads only
    ReadOnly,
    /// Writes only
    WriteOnly,
    /// Reads and writes
    #[default]
    ReadWrite,
}

impl StreamMode {
    /// Whether reads are permitted
    #[inline]
    pub const fn can_read(&self) -> bool {
        matches!(self, StreamMode::ReadOnly | StreamMode::ReadWrite)
    }

    /// Whether writes are permitted
    #[inline]
    pub const fn can_write(&self) -> bool {
        matches!(self, StreamMode::WriteOnly | StreamMode::ReadWrite)
    }

    /// Get the mode as its configuration string
    pub const fn as_str(&self) -> &'static str {
        match self {
            StreamMode::ReadOnly => "read_only",
            StreamMode::WriteOnly => "write_only",
            StreamMode::ReadWrite => "read_write",
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown mode string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stream mode: {0}")]
pub struct ParseModeError(pub String);

impl FromStr for StreamMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read_only" | "readonly" | "r" => Ok(StreamMode::ReadOnly),
            "write_only" | "writeonly" | "w" => Ok(StreamMode::WriteOnly),
            "read_write" | "readwrite" | "rw" => Ok(StreamMode::ReadWrite),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}
