//! Errors raised by the Sans-IO protocol driver.

use thiserror::Error;
use trapline_proto::ProtocolError;

/// Errors raised by [`crate::driver::ProtocolDriver`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DriverError {
    /// A wire-level codec or framing error surfaced while decoding an
    /// inbound message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A single message's encoded length exceeds `write_buffer_capacity` on
    /// its own, so no flush could ever make room for it.
    #[error("write buffer overflow: {attempted} bytes exceeds capacity {capacity}")]
    WriteBufferOverflow { attempted: usize, capacity: usize },
}
