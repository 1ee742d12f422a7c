//! Argument checks shared by every read and write path.
//!
//! Validation runs before any byte is copied or any block is touched, so a
//! rejected request leaves both the stream contents and the position as
//! they were.

use crate::error::{Access, BoundsViolation, Result, StreamError};
use crate::stream::cursor::StreamCursor;
use crate::stream::mode::StreamMode;

/// Check a `(buffer, offset, count)` request against the stream state.
///
/// Checks run in order: buffer non-empty, count positive, range inside the
/// buffer, mode permits `access`, range inside the capacity.
pub(crate) fn validate_request(
    buffer_len: usize,
    offset: usize,
    count: usize,
    access: Access,
    mode: StreamMode,
    cursor: &StreamCursor,
) -> Result<()> {
    if buffer_len == 0 {
        return Err(BoundsViolation::EmptyBuffer.into());
    }
    if count == 0 {
        return Err(BoundsViolation::ZeroCount.into());
    }
    match offset.checked_add(count) {
        Some(end) if end <= buffer_len => {}
        _ => {
            return Err(BoundsViolation::BufferTooSmall {
                len: buffer_len,
                offset,
                count,
            }
            .into())
        }
    }

    let permitted = match access {
        Access::Read => mode.can_read(),
        Access::Write => mode.can_write(),
    };
    if !permitted {
        return Err(StreamError::Mode { access });
    }

    if count as u64 > cursor.remaining() {
        return Err(BoundsViolation::ExceedsCapacity {
            position: cursor.position(),
            count,
            capacity: cursor.capacity(),
        }
        .into());
    }
    Ok(())
}
