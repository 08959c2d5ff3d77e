//! Errors raised by the client facade and the worker thread it owns.

use thiserror::Error;
use trapline_proto::ProtocolError;

/// Errors a [`crate::client::Connection`] or its worker thread can surface.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A wire-level codec or framing error, either while establishing the
    /// handshake environment (malformed `Describe`, unsupported protocol
    /// version) or later, once an unrecoverable parser error (e.g. an
    /// unknown tag) kills an otherwise-live connection.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The Sans-IO driver refused to batch an outbound message.
    #[error(transparent)]
    Driver(#[from] trapline_core::DriverError),

    /// No `Describe` reply arrived within the configured handshake timeout.
    #[error("no response from device within the handshake timeout")]
    HandshakeTimeout,

    /// The serial port returned zero bytes while a message was mid-frame,
    /// past the retry window — the device end of the link is gone.
    #[error("serial port closed while a message was still in flight")]
    PortClosed,

    /// An I/O failure on the underlying serial port.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The serial port could not be opened or configured.
    #[error(transparent)]
    Serial(#[from] serialport::Error),

    /// The device sent a fatal `Error` message; the worker has marked the
    /// connection dead and stopped accepting new work.
    #[error("device reported a fatal error: {0:?}")]
    DeviceError(Vec<u8>),

    /// The worker thread ended unexpectedly (panicked, or its `JoinHandle`
    /// could not be joined).
    #[error("worker thread panicked")]
    WorkerPanicked,
}
