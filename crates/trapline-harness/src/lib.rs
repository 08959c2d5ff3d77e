//! Simulated serial transport and simulated device firmware for
//! integration tests spanning the wire codec, the Sans-IO protocol
//! driver, and the motion planner together, without a real serial port.
//!
//! Both pieces are thin wrappers tests drive explicitly — scripted
//! request/reply and an in-memory duplex pipe — rather than a background
//! I/O loop, since this link is a blocking byte stream, not an async
//! socket.

pub mod sim_device;
pub mod sim_port;

pub use sim_device::SimDevice;
pub use sim_port::{duplex_pair, SimPort};
