//! The protocol driver: a Sans-IO state machine that mints correlation
//! tokens for outstanding `Ask`/`Status` and `Buffer` requests, and batches
//! outbound messages into write-sized chunks. It never touches a port —
//! callers feed it events and write whatever bytes it hands back.

use bytes::BytesMut;
use tracing::{debug, warn};
use trapline_proto::{Ask, BufferMessage, Message};

use crate::error::DriverError;

/// Tuning knobs for the driver's outbound batching.
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    /// Flush the write buffer once appending the next message would push it
    /// past this many bytes.
    pub write_buffer_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { write_buffer_capacity: 1024 }
    }
}

/// Mint the next token in the sequence, skipping zero so a token value of
/// zero can always mean "no outstanding request".
fn next_token(current: &mut u32) -> u32 {
    loop {
        *current = current.wrapping_add(1);
        if *current != 0 {
            return *current;
        }
    }
}

/// Tracks the single outstanding request of one correlation kind (status or
/// buffer). `None` means the last request was answered, invalidated, or
/// never made.
#[derive(Debug, Clone, Copy, Default)]
struct Correlation {
    sequence: u32,
    outstanding: Option<u32>,
}

impl Correlation {
    fn mint(&mut self) -> u32 {
        let token = next_token(&mut self.sequence);
        self.outstanding = Some(token);
        token
    }

    fn invalidate(&mut self) {
        self.outstanding = None;
    }

    fn matches(&self, received: u32) -> bool {
        self.outstanding == Some(received)
    }

    fn is_valid(&self) -> bool {
        self.outstanding.is_some()
    }
}

/// The Sans-IO correlation and batching state for one link.
///
/// Mirrors `ProtocolParser` from the original host driver: a single
/// sequence-number generator feeds two independent correlation slots
/// (`status`, `buffer`), and every send that changes what the device is
/// expected to do next invalidates whichever slot it supersedes.
pub struct ProtocolDriver {
    config: DriverConfig,
    status: Correlation,
    buffer: Correlation,
    write_buf: BytesMut,
}

impl ProtocolDriver {
    /// Build a driver with empty correlation state and an empty write buffer.
    #[must_use]
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            status: Correlation::default(),
            buffer: Correlation::default(),
            write_buf: BytesMut::new(),
        }
    }

    /// Mint a new status token, clear any outstanding buffer token, and
    /// return the bytes to write for the resulting `Ask`.
    ///
    /// Grounded on `parser.py::request_status`, which invalidates the whole
    /// correlation state (`status_number = next(...)`, and any buffer
    /// request that was pending is no longer meaningful once a fresh status
    /// poll is in flight) before sending.
    pub fn request_status(&mut self) -> Result<Vec<Vec<u8>>, DriverError> {
        let token = self.status.mint();
        self.buffer.invalidate();
        debug!(token, "minted status request, invalidating any outstanding buffer token");
        self.encode_batch(&[Message::Ask(Ask { request_counter: token })])
    }

    /// Drop the outstanding status token, as if it had been answered or
    /// superseded.
    pub fn invalidate_status(&mut self) {
        self.status.invalidate();
    }

    /// Whether a status request is currently outstanding.
    #[must_use]
    pub fn has_valid_status_request(&self) -> bool {
        self.status.is_valid()
    }

    /// Whether `received` matches the currently outstanding status token.
    #[must_use]
    pub fn status_request_matches(&self, received: u32) -> bool {
        self.status.matches(received)
    }

    /// Drop the outstanding buffer token, as if it had been answered or
    /// superseded.
    pub fn invalidate_buffer(&mut self) {
        self.buffer.invalidate();
    }

    /// Whether `received` matches the currently outstanding buffer token.
    #[must_use]
    pub fn buffer_request_matches(&self, received: u32) -> bool {
        self.buffer.matches(received)
    }

    /// True once neither correlation slot has an outstanding request — the
    /// worker loop's trigger to issue a fresh `request_status`.
    #[must_use]
    pub fn has_any_outstanding_request(&self) -> bool {
        self.status.is_valid() || self.buffer.is_valid()
    }

    /// Announce `segments.len()` buffered records, then transmit them
    /// followed by an optional `Done` and an optional `Start`.
    ///
    /// Invalidates the status token (a buffer announcement supersedes any
    /// in-flight status poll) and mints a fresh buffer token; after this
    /// call the device is expected to consume exactly `segments.len()`
    /// records without emitting further unsolicited `Buffer` replies, so the
    /// caller — not the device — is responsible for the next flow-control
    /// decision. Grounded on `parser.py::send_segments`.
    pub fn send_segments(
        &mut self,
        segments: &[Message],
        done: bool,
        start: bool,
    ) -> Result<Vec<Vec<u8>>, DriverError> {
        self.status.invalidate();
        let token = self.buffer.mint();
        debug!(token, spaces = segments.len(), "minted buffer announcement, invalidating any outstanding status token");
        let announcement =
            Message::Buffer(BufferMessage { request_counter: token, spaces: segments.len() as u32 });

        let mut batch = Vec::with_capacity(segments.len() + 3);
        batch.push(announcement);
        batch.extend_from_slice(segments);
        if done {
            batch.push(Message::Done);
        }
        if start {
            batch.push(Message::Start);
        }
        self.encode_batch(&batch)
    }

    /// Serialize `messages` in order, flushing the internal write buffer
    /// into a completed chunk whenever the next message would overflow
    /// `write_buffer_capacity`. Returns the chunks ready to hand to the
    /// transport, in write order; the final partial chunk (if any) is
    /// always included, so the caller never needs to call a separate flush.
    ///
    /// # Errors
    /// Returns [`DriverError::WriteBufferOverflow`] if a single message's
    /// encoded length exceeds `write_buffer_capacity` on its own — no flush
    /// could ever make room for it.
    pub fn encode_batch(&mut self, messages: &[Message]) -> Result<Vec<Vec<u8>>, DriverError> {
        let mut chunks = Vec::new();
        for message in messages {
            let mut encoded = Vec::new();
            message.encode(&mut encoded);
            if encoded.len() > self.config.write_buffer_capacity {
                warn!(
                    attempted = encoded.len(),
                    capacity = self.config.write_buffer_capacity,
                    "message too large for the configured write buffer"
                );
                return Err(DriverError::WriteBufferOverflow {
                    attempted: encoded.len(),
                    capacity: self.config.write_buffer_capacity,
                });
            }
            if !self.write_buf.is_empty()
                && self.write_buf.len() + encoded.len() > self.config.write_buffer_capacity
            {
                chunks.push(self.write_buf.split().to_vec());
            }
            self.write_buf.extend_from_slice(&encoded);
        }
        if !self.write_buf.is_empty() {
            chunks.push(self.write_buf.split().to_vec());
        }
        Ok(chunks)
    }
}
