//! Sans-IO protocol driver for the motion controller link.
//!
//! [`ProtocolDriver`] owns the correlation-token bookkeeping and outbound
//! write-buffer batching described by the protocol's flow-control rules. It
//! performs no I/O itself — callers (the worker loop in `trapline-client`)
//! feed it decoded inbound messages and write whatever byte chunks it
//! returns to the serial port.

pub mod driver;
pub mod error;

pub use driver::{DriverConfig, ProtocolDriver};
pub use error::DriverError;
