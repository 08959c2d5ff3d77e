//! Simulated firmware: answers `Inquire`/`Ask`, tracks a synthetic
//! execution buffer, and emits `Status`/`Buffer` replies the way the real
//! device does.
//!
//! A thin wrapper-over-state-machine, scripted like [`super::SimPort`]:
//! the wire semantics are whatever the host expects to receive, read
//! backwards into what a well-behaved device must send.

use trapline_proto::messages::{BufferMessage, Status, StatusFlag, SystemDescription};
use trapline_proto::{Message, PROTOCOL_VERSION};

/// A scripted, in-memory stand-in for the motion controller firmware.
///
/// Tests drive it explicitly: feed it an inbound [`Message`] via
/// [`SimDevice::handle`], get back whatever reply messages a real device
/// would have sent for that input, and call [`SimDevice::execute`] to
/// simulate queued segments completing (there is no real-time execution
/// here — tests advance it exactly as fast as the scenario requires).
pub struct SimDevice {
    axis_count: u32,
    buffer_capacity: u32,
    occupied: u32,
    status_flag: StatusFlag,
    move_number: u32,
    position: Vec<i32>,
    override_value: f64,
}

impl SimDevice {
    /// A fresh device at rest, idle, and fully empty.
    #[must_use]
    pub fn new(axis_count: u32, buffer_capacity: u32) -> Self {
        Self {
            axis_count,
            buffer_capacity,
            occupied: 0,
            status_flag: StatusFlag::Idle,
            move_number: 0,
            position: vec![0; axis_count as usize],
            override_value: 1.0,
        }
    }

    /// The `Describe` payload this device answers `Inquire` with.
    #[must_use]
    pub fn description(&self) -> SystemDescription {
        SystemDescription {
            version: PROTOCOL_VERSION,
            axis_count: self.axis_count,
            magic: 0xDEAD_BEEF,
            buffer_size: self.buffer_capacity,
        }
    }

    /// Unoccupied buffer slots remaining.
    #[must_use]
    pub fn free_space(&self) -> u32 {
        self.buffer_capacity.saturating_sub(self.occupied)
    }

    /// The device's current status flag.
    #[must_use]
    pub fn status_flag(&self) -> StatusFlag {
        self.status_flag
    }

    /// Simulate `n` queued segments finishing execution: frees their
    /// buffer slots and, once the queue is drained, flips the status flag
    /// back to `Idle`.
    pub fn execute(&mut self, n: u32) {
        self.occupied = self.occupied.saturating_sub(n);
        self.move_number = self.move_number.wrapping_add(n);
        if self.occupied == 0 {
            self.status_flag = StatusFlag::Idle;
        }
    }

    fn status_reply(&self, request_counter: u32) -> Message {
        Message::Status(Status {
            request_counter,
            status_flag: self.status_flag,
            free_space: self.free_space(),
            move_number: self.move_number,
            override_value: self.override_value,
            position: self.position.clone(),
        })
    }

    /// Feed one inbound message and collect the reply (if any) a real
    /// device would send back.
    pub fn handle(&mut self, message: &Message) -> Vec<Message> {
        match message {
            Message::Inquire => vec![Message::Describe(self.description())],
            Message::Ask(ask) => vec![self.status_reply(ask.request_counter)],
            Message::Buffer(buffer) => {
                let granted = buffer.spaces.min(self.free_space());
                self.occupied += granted;
                if granted > 0 {
                    self.status_flag = StatusFlag::Busy;
                }
                if granted < buffer.spaces {
                    vec![Message::Buffer(BufferMessage {
                        request_counter: buffer.request_counter,
                        spaces: granted,
                    })]
                } else {
                    Vec::new()
                }
            }
            Message::Segment(_) | Message::Immediate(_) | Message::Home(_) | Message::Override(_) => {
                Vec::new()
            }
            Message::Done | Message::Start => Vec::new(),
            Message::Describe(_) | Message::Status(_) | Message::Error(_) | Message::PeripheralStatus(_) => {
                Vec::new()
            }
        }
    }
}
