//! Framed parser: reassembles messages out of however many bytes a serial
//! read happened to return.
//!
//! Fed arbitrary chunks via [`FramedParser::feed`], and drained lazily via
//! repeated calls to [`FramedParser::poll`] until it returns `None` — one
//! `read()` from the port can easily contain zero, one, or several complete
//! messages, and a message can just as easily span two reads.

use bytes::{Buf, BytesMut};
use tracing::warn;

use crate::error::ProtocolError;
use crate::messages::{CodecTable, Env, Message, MessageTag};

#[derive(Debug, Clone, Copy)]
enum ParserState {
    AwaitTag,
    AwaitPayload { tag: u8, needed: usize },
    Errored,
}

/// A non-blocking, incremental message reassembler over one codec table.
pub struct FramedParser {
    table: CodecTable,
    env: Env,
    state: ParserState,
    buffer: BytesMut,
}

impl FramedParser {
    /// Build a parser over `table`, with an empty accumulation buffer.
    #[must_use]
    pub fn new(table: CodecTable, env: Env) -> Self {
        Self { table, env, state: ParserState::AwaitTag, buffer: BytesMut::new() }
    }

    /// Append newly-read bytes to the internal accumulation buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Rebind the codec table, e.g. once the handshake environment widens
    /// (an extension parameter bound after the initial `Describe`).
    pub fn rebind(&mut self, table: CodecTable, env: Env) {
        self.table = table;
        self.env = env;
    }

    /// Pull the next fully-buffered message, if any.
    ///
    /// Returns `None` when there isn't a complete message yet — callers
    /// should stop polling and wait for more bytes. A device `Error` tag, or
    /// an unknown tag byte, makes the byte stream permanently untrustworthy:
    /// once either happens the parser is terminally `Errored` and every
    /// further poll just hands back whatever bytes have accumulated as a raw
    /// [`Message::Error`], exactly as spec's framed-parser state machine
    /// describes for its terminal state.
    pub fn poll(&mut self) -> Option<Result<Message, ProtocolError>> {
        loop {
            match self.state {
                ParserState::Errored => {
                    if self.buffer.is_empty() {
                        return None;
                    }
                    let remainder = self.buffer.split_to(self.buffer.len()).to_vec();
                    return Some(Ok(Message::Error(remainder)));
                }
                ParserState::AwaitTag => {
                    if self.buffer.is_empty() {
                        return None;
                    }
                    let tag = self.buffer[0];
                    if tag == MessageTag::Error as u8 {
                        self.buffer.advance(1);
                        let remainder = self.buffer.split_to(self.buffer.len()).to_vec();
                        self.state = ParserState::Errored;
                        return Some(Ok(Message::Error(remainder)));
                    }
                    match self.table.payload_len(tag) {
                        Some(0) => {
                            self.buffer.advance(1);
                            return Some(self.decode(tag, &[]));
                        }
                        Some(needed) => {
                            self.buffer.advance(1);
                            self.state = ParserState::AwaitPayload { tag, needed };
                        }
                        None => {
                            self.buffer.advance(1);
                            warn!(tag, "unknown tag, parser entering errored state");
                            self.state = ParserState::Errored;
                            return Some(Err(ProtocolError::UnknownTag { tag }));
                        }
                    }
                }
                ParserState::AwaitPayload { tag, needed } => {
                    if self.buffer.len() < needed {
                        return None;
                    }
                    let payload = self.buffer.split_to(needed);
                    self.state = ParserState::AwaitTag;
                    return Some(self.decode(tag, &payload));
                }
            }
        }
    }

    fn decode(&mut self, tag: u8, payload: &[u8]) -> Result<Message, ProtocolError> {
        match self.table.decode(tag, payload, &self.env) {
            Ok(message) => Ok(message),
            Err(err) => {
                self.state = ParserState::Errored;
                Err(err)
            }
        }
    }

    /// True once a decode error has made the byte stream untrustworthy.
    #[must_use]
    pub fn is_errored(&self) -> bool {
        matches!(self.state, ParserState::Errored)
    }
}
