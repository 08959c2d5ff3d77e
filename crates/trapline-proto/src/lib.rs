//! Wire format for the motion controller link: size expressions, message
//! records, the handshake, and the framed parser that reassembles messages
//! from arbitrary serial reads.

pub mod error;
pub mod handshake;
pub mod messages;
pub mod parser;
pub mod schema;
pub mod sea;

pub use error::ProtocolError;
pub use handshake::Handshake;
pub use messages::{
    Ask, BufferMessage, CodecTable, Env, HomingMessage, HomingPhase, Immediate, Message,
    MessageTag, OverrideMessage, PeripheralStatus, Segment, Status, StatusFlag, SystemDescription,
    NUM_AXIS, PERIPHERAL_STATUS, PROTOCOL_VERSION,
};
pub use parser::FramedParser;
pub use schema::{Codec, FieldDescriptor, FieldType, FieldValue, RecordSchema, Repeat};
pub use sea::SizeExpr;
