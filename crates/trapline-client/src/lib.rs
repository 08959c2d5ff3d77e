//! Host-side client for the stepper-motor/laser motion controller link.
//!
//! Owns the serial port on a dedicated worker thread, speaks the protocol
//! defined by `trapline-proto` through the `trapline-core` driver, and
//! exposes a small synchronous facade ([`Connection`]) to the rest of the
//! application.

pub mod client;
pub mod error;
pub mod event;
pub mod worker;

pub use client::Connection;
pub use error::ClientError;
pub use event::Event;
pub use worker::{BufferedBatch, ClientConfig, Signals};
