//! The message set: wire tags, per-kind record shapes, and the records
//! built from them.
//!
//! Every record declares a [`schema::RecordSchema`] — a flat list of
//! `u32`/`i32`/`f64` fields, optionally ending in a fixed- or
//! environment-sized array — and converts itself to and from
//! [`schema::FieldValue`]s; the actual byte-level encode/decode logic lives
//! once, generically, in [`schema::Codec`]. Two tag groups exist because
//! some records need `NUM_AXIS` (bound by the handshake) to know their own
//! length: [`CodecTable::initial`] covers everything decodable before a
//! handshake happens, [`CodecTable::bind`] adds the rest once the
//! environment is known.

use std::collections::BTreeMap;

use bytes::BufMut;

use crate::error::ProtocolError;
use crate::schema::{encode_fields, Codec, FieldDescriptor, FieldType, FieldValue, RecordSchema};
use crate::sea::SizeExpr;

/// Variable referencing the axis count bound from `Describe.axis_count`.
pub const NUM_AXIS: SizeExpr = SizeExpr::Var("NUM_AXIS");
/// Variable referencing the optional peripheral telemetry word count, bound
/// only if the device exposes it as a handshake extension.
pub const PERIPHERAL_STATUS: SizeExpr = SizeExpr::Var("PERIPHERAL_STATUS");

/// The handshake environment: a small set of named parameters bound once
/// `Describe` has been received, used to evaluate `NUM_AXIS`-shaped fields.
#[derive(Debug, Clone, Default)]
pub struct Env(BTreeMap<&'static str, u32>);

impl Env {
    /// An empty, unbound environment.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Bind `name` to `value`, overwriting any previous binding.
    pub fn bind(&mut self, name: &'static str, value: u32) {
        self.0.insert(name, value);
    }

    /// The value bound to `name`, if any.
    #[must_use]
    pub fn get(&self, name: &'static str) -> Option<u32> {
        self.0.get(name).copied()
    }

    /// The full set of bindings, for evaluating a [`SizeExpr`].
    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<&'static str, u32> {
        &self.0
    }
}

/// Wire tag for each message kind. Values match the order of the original
/// enum this protocol was distilled from; `PeripheralStatus` is an
/// extension the core enum never had and is assigned a tag past the end.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageTag {
    /// Host→device: request the device's self-description.
    Inquire = 1,
    /// Device→host: the handshake reply.
    Describe = 2,
    /// Host→device: poll for status under a fresh correlation token.
    Ask = 3,
    /// Device→host: current execution state and position.
    Status = 4,
    /// Either direction: buffer-space announcement/reply.
    Buffer = 5,
    /// Host→device: no more segments follow the current announcement.
    Done = 6,
    /// Host→device: enqueue a motion segment.
    Segment = 7,
    /// Host→device: execute a segment immediately, bypassing the buffer.
    Immediate = 8,
    /// Host→device: run a homing sequence on the given axes.
    Home = 9,
    /// Host→device: release the device to begin executing its buffer.
    Start = 10,
    /// Host→device: adjust the feed-rate override.
    Override = 11,
    /// Device→host: a fatal fault, carrying an opaque trailing blob.
    Error = 12,
    /// Device→host: optional extended telemetry.
    PeripheralStatus = 13,
}

impl MessageTag {
    const ALL: [MessageTag; 13] = [
        MessageTag::Inquire,
        MessageTag::Describe,
        MessageTag::Ask,
        MessageTag::Status,
        MessageTag::Buffer,
        MessageTag::Done,
        MessageTag::Segment,
        MessageTag::Immediate,
        MessageTag::Home,
        MessageTag::Start,
        MessageTag::Override,
        MessageTag::Error,
        MessageTag::PeripheralStatus,
    ];

    /// Resolve a raw tag byte to its message kind, if recognized.
    #[must_use]
    pub fn from_byte(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| *t as u8 == tag)
    }

    /// True for message kinds that are a bare tag byte with no payload.
    /// `Error` is deliberately excluded: its trailing bytes are unspecified
    /// and consume whatever remains of the read rather than a fixed count.
    #[must_use]
    pub fn is_bare(self) -> bool {
        matches!(self, MessageTag::Inquire | MessageTag::Done | MessageTag::Start)
    }
}

/// Protocol version this crate implements the handshake for.
pub const PROTOCOL_VERSION: u32 = 1;

/// The device's reply to `Inquire`: its identity and the parameters the
/// handshake binds into the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemDescription {
    /// Protocol version the device implements.
    pub version: u32,
    /// Number of motion axes; binds `NUM_AXIS` at handshake.
    pub axis_count: u32,
    /// Device identity/build marker, not otherwise interpreted.
    pub magic: u32,
    /// Size of the device's execution buffer, in segments.
    pub buffer_size: u32,
}

impl SystemDescription {
    /// Field layout of the `Describe` reply.
    pub const SCHEMA: RecordSchema = RecordSchema::new(&[
        FieldDescriptor::scalar("version", FieldType::U32),
        FieldDescriptor::scalar("axis_count", FieldType::U32),
        FieldDescriptor::scalar("magic", FieldType::U32),
        FieldDescriptor::scalar("buffer_size", FieldType::U32),
    ]);
    /// Fixed on-wire payload size in bytes.
    pub const SIZE: usize = 16;

    fn to_fields(self) -> Vec<FieldValue> {
        vec![
            FieldValue::U32(self.version),
            FieldValue::U32(self.axis_count),
            FieldValue::U32(self.magic),
            FieldValue::U32(self.buffer_size),
        ]
    }

    fn from_fields(fields: Vec<FieldValue>) -> Result<Self, ProtocolError> {
        let [version, axis_count, magic, buffer_size] = <[FieldValue; 4]>::try_from(fields)
            .map_err(|_| ProtocolError::SchemaMismatch { record: "SystemDescription" })?;
        Ok(Self {
            version: version.expect_u32("SystemDescription")?,
            axis_count: axis_count.expect_u32("SystemDescription")?,
            magic: magic.expect_u32("SystemDescription")?,
            buffer_size: buffer_size.expect_u32("SystemDescription")?,
        })
    }

    /// Encode this reply's fields in wire order.
    pub fn encode(&self, out: &mut impl BufMut) {
        encode_fields(&self.to_fields(), out);
    }

    /// Decode a `Describe` payload.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let codec = Codec::for_schema(&Self::SCHEMA, &Env::new())?;
        Self::from_fields(codec.decode_fields(buf, MessageTag::Describe)?)
    }
}

/// A poll for the device's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ask {
    /// Correlation token the matching `Status` reply must echo.
    pub request_counter: u32,
}

impl Ask {
    /// Field layout of the `Ask` request.
    pub const SCHEMA: RecordSchema =
        RecordSchema::new(&[FieldDescriptor::scalar("request_counter", FieldType::U32)]);
    /// Fixed on-wire payload size in bytes.
    pub const SIZE: usize = 4;

    fn to_fields(self) -> Vec<FieldValue> {
        vec![FieldValue::U32(self.request_counter)]
    }

    fn from_fields(fields: Vec<FieldValue>) -> Result<Self, ProtocolError> {
        let [request_counter] =
            <[FieldValue; 1]>::try_from(fields).map_err(|_| ProtocolError::SchemaMismatch { record: "Ask" })?;
        Ok(Self { request_counter: request_counter.expect_u32("Ask")? })
    }

    /// Encode this request's fields in wire order.
    pub fn encode(&self, out: &mut impl BufMut) {
        encode_fields(&self.to_fields(), out);
    }

    /// Decode an `Ask` payload.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let codec = Codec::for_schema(&Self::SCHEMA, &Env::new())?;
        Self::from_fields(codec.decode_fields(buf, MessageTag::Ask)?)
    }
}

/// The device's coarse execution state, as reported in `Status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFlag {
    /// Execution buffer empty, device ready for new work.
    Idle = 1,
    /// Device is executing queued segments.
    Busy = 2,
    /// Device has halted; no further buffer draining until cleared.
    Halt = 3,
    /// Device is running a homing sequence.
    Homing = 4,
    /// Device is in an unrecoverable fault state.
    Dead = 5,
    /// Device ran out of queued segments before seeing `Done`.
    BufferUnderflow = 6,
}

impl StatusFlag {
    fn from_u32(value: u32) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(StatusFlag::Idle),
            2 => Ok(StatusFlag::Busy),
            3 => Ok(StatusFlag::Halt),
            4 => Ok(StatusFlag::Homing),
            5 => Ok(StatusFlag::Dead),
            6 => Ok(StatusFlag::BufferUnderflow),
            other => Err(ProtocolError::UnknownVariant { type_name: "StatusFlag", value: other }),
        }
    }
}

/// The device's reply to `Ask`: its current coarse state and telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    /// Correlation token echoed from the `Ask` this answers, or stale if it
    /// doesn't match the driver's outstanding token.
    pub request_counter: u32,
    /// Device's current execution state.
    pub status_flag: StatusFlag,
    /// Free slots in the execution buffer at the moment this was sent.
    pub free_space: u32,
    /// Sequence number of the move currently executing.
    pub move_number: u32,
    /// Current feed-rate override multiplier.
    pub override_value: f64,
    /// Current position, one entry per axis.
    pub position: Vec<i32>,
}

impl Status {
    /// Field layout of the `Status` reply.
    pub const SCHEMA: RecordSchema = RecordSchema::new(&[
        FieldDescriptor::scalar("request_counter", FieldType::U32),
        FieldDescriptor::scalar("status_flag", FieldType::U32),
        FieldDescriptor::scalar("free_space", FieldType::U32),
        FieldDescriptor::scalar("move_number", FieldType::U32),
        FieldDescriptor::scalar("override_value", FieldType::F64),
        FieldDescriptor::array("position", FieldType::I32, NUM_AXIS),
    ]);

    /// Fixed part of the payload size, before `NUM_AXIS` is resolved.
    #[must_use]
    pub fn fixed_size() -> usize {
        Self::SCHEMA.fixed_size()
    }

    /// Total payload size once `env` resolves `NUM_AXIS`.
    #[must_use]
    pub fn payload_size(env: &Env) -> Option<usize> {
        Self::SCHEMA.payload_size(env).ok()
    }

    fn to_fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::U32(self.request_counter),
            FieldValue::U32(self.status_flag as u32),
            FieldValue::U32(self.free_space),
            FieldValue::U32(self.move_number),
            FieldValue::F64(self.override_value),
            FieldValue::I32Array(self.position.clone()),
        ]
    }

    fn from_fields(fields: Vec<FieldValue>) -> Result<Self, ProtocolError> {
        let [request_counter, status_flag, free_space, move_number, override_value, position] =
            <[FieldValue; 6]>::try_from(fields)
                .map_err(|_| ProtocolError::SchemaMismatch { record: "Status" })?;
        Ok(Self {
            request_counter: request_counter.expect_u32("Status")?,
            status_flag: StatusFlag::from_u32(status_flag.expect_u32("Status")?)?,
            free_space: free_space.expect_u32("Status")?,
            move_number: move_number.expect_u32("Status")?,
            override_value: override_value.expect_f64("Status")?,
            position: position.expect_i32_array("Status")?,
        })
    }

    /// Encode this reply's fields in wire order.
    pub fn encode(&self, out: &mut impl BufMut) {
        encode_fields(&self.to_fields(), out);
    }

    /// Decode a `Status` payload against the bound environment.
    pub fn decode(buf: &[u8], env: &Env) -> Result<Self, ProtocolError> {
        let codec = Codec::for_schema(&Self::SCHEMA, env)?;
        Self::from_fields(codec.decode_fields(buf, MessageTag::Status)?)
    }
}

/// Sent in either direction over the `Buffer` tag: host→device reports the
/// device's free slot count (a status-adjacent reply to `Ask`), device→host
/// tells the device how many segments to expect before `Start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferMessage {
    /// Correlation token for this announcement/reply pair.
    pub request_counter: u32,
    /// Host→device: segments to expect. Device→host: slots actually free.
    pub spaces: u32,
}

impl BufferMessage {
    /// Field layout of the `Buffer` message.
    pub const SCHEMA: RecordSchema = RecordSchema::new(&[
        FieldDescriptor::scalar("request_counter", FieldType::U32),
        FieldDescriptor::scalar("spaces", FieldType::U32),
    ]);
    /// Fixed on-wire payload size in bytes.
    pub const SIZE: usize = 8;

    fn to_fields(self) -> Vec<FieldValue> {
        vec![FieldValue::U32(self.request_counter), FieldValue::U32(self.spaces)]
    }

    fn from_fields(fields: Vec<FieldValue>) -> Result<Self, ProtocolError> {
        let [request_counter, spaces] = <[FieldValue; 2]>::try_from(fields)
            .map_err(|_| ProtocolError::SchemaMismatch { record: "BufferMessage" })?;
        Ok(Self {
            request_counter: request_counter.expect_u32("BufferMessage")?,
            spaces: spaces.expect_u32("BufferMessage")?,
        })
    }

    /// Encode this message's fields in wire order.
    pub fn encode(&self, out: &mut impl BufMut) {
        encode_fields(&self.to_fields(), out);
    }

    /// Decode a `Buffer` payload.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let codec = Codec::for_schema(&Self::SCHEMA, &Env::new())?;
        Self::from_fields(codec.decode_fields(buf, MessageTag::Buffer)?)
    }
}

/// One buffered motion segment queued into the device's execution buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Caller-assigned identity, carried through subdivision.
    pub move_id: u32,
    /// Device-interpreted move flags; the planner always emits `0`.
    pub move_flag: u32,
    /// Entry velocity in device units (steps per microsecond).
    pub start_velocity: f64,
    /// Exit velocity in device units (steps per microsecond).
    pub end_velocity: f64,
    /// Target position, one entry per axis, in microsteps.
    pub coords: Vec<f64>,
}

impl Segment {
    /// Field layout of the `Segment` message.
    pub const SCHEMA: RecordSchema = RecordSchema::new(&[
        FieldDescriptor::scalar("move_id", FieldType::U32),
        FieldDescriptor::scalar("move_flag", FieldType::U32),
        FieldDescriptor::scalar("start_velocity", FieldType::F64),
        FieldDescriptor::scalar("end_velocity", FieldType::F64),
        FieldDescriptor::array("coords", FieldType::F64, NUM_AXIS),
    ]);

    /// Fixed part of the payload size, before `NUM_AXIS` is resolved.
    #[must_use]
    pub fn fixed_size() -> usize {
        Self::SCHEMA.fixed_size()
    }

    /// Total payload size once `env` resolves `NUM_AXIS`.
    #[must_use]
    pub fn payload_size(env: &Env) -> Option<usize> {
        Self::SCHEMA.payload_size(env).ok()
    }

    fn to_fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::U32(self.move_id),
            FieldValue::U32(self.move_flag),
            FieldValue::F64(self.start_velocity),
            FieldValue::F64(self.end_velocity),
            FieldValue::F64Array(self.coords.clone()),
        ]
    }

    fn from_fields(fields: Vec<FieldValue>) -> Result<Self, ProtocolError> {
        let [move_id, move_flag, start_velocity, end_velocity, coords] =
            <[FieldValue; 5]>::try_from(fields)
                .map_err(|_| ProtocolError::SchemaMismatch { record: "Segment" })?;
        Ok(Self {
            move_id: move_id.expect_u32("Segment")?,
            move_flag: move_flag.expect_u32("Segment")?,
            start_velocity: start_velocity.expect_f64("Segment")?,
            end_velocity: end_velocity.expect_f64("Segment")?,
            coords: coords.expect_f64_array("Segment")?,
        })
    }

    /// Encode this segment's fields in wire order.
    pub fn encode(&self, out: &mut impl BufMut) {
        encode_fields(&self.to_fields(), out);
    }

    /// Decode a `Segment` payload against the bound environment.
    pub fn decode(buf: &[u8], env: &Env) -> Result<Self, ProtocolError> {
        let codec = Codec::for_schema(&Self::SCHEMA, env)?;
        Self::from_fields(codec.decode_fields(buf, MessageTag::Segment)?)
    }
}

/// Identical on-wire shape to [`Segment`] (spec's message table lists it as
/// "same shape as Segment") but carries its own tag: the device executes it
/// immediately instead of enqueueing it in the motion buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Immediate {
    /// Caller-assigned identity, carried through subdivision.
    pub move_id: u32,
    /// Device-interpreted move flags; the planner always emits `0`.
    pub move_flag: u32,
    /// Entry velocity in device units (steps per microsecond).
    pub start_velocity: f64,
    /// Exit velocity in device units (steps per microsecond).
    pub end_velocity: f64,
    /// Target position, one entry per axis, in microsteps.
    pub coords: Vec<f64>,
}

impl Immediate {
    /// Field layout of the `Immediate` message.
    pub const SCHEMA: RecordSchema = RecordSchema::new(&[
        FieldDescriptor::scalar("move_id", FieldType::U32),
        FieldDescriptor::scalar("move_flag", FieldType::U32),
        FieldDescriptor::scalar("start_velocity", FieldType::F64),
        FieldDescriptor::scalar("end_velocity", FieldType::F64),
        FieldDescriptor::array("coords", FieldType::F64, NUM_AXIS),
    ]);

    /// Fixed part of the payload size, before `NUM_AXIS` is resolved.
    #[must_use]
    pub fn fixed_size() -> usize {
        Self::SCHEMA.fixed_size()
    }

    /// Total payload size once `env` resolves `NUM_AXIS`.
    #[must_use]
    pub fn payload_size(env: &Env) -> Option<usize> {
        Self::SCHEMA.payload_size(env).ok()
    }

    fn to_fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::U32(self.move_id),
            FieldValue::U32(self.move_flag),
            FieldValue::F64(self.start_velocity),
            FieldValue::F64(self.end_velocity),
            FieldValue::F64Array(self.coords.clone()),
        ]
    }

    fn from_fields(fields: Vec<FieldValue>) -> Result<Self, ProtocolError> {
        let [move_id, move_flag, start_velocity, end_velocity, coords] =
            <[FieldValue; 5]>::try_from(fields)
                .map_err(|_| ProtocolError::SchemaMismatch { record: "Immediate" })?;
        Ok(Self {
            move_id: move_id.expect_u32("Immediate")?,
            move_flag: move_flag.expect_u32("Immediate")?,
            start_velocity: start_velocity.expect_f64("Immediate")?,
            end_velocity: end_velocity.expect_f64("Immediate")?,
            coords: coords.expect_f64_array("Immediate")?,
        })
    }

    /// Encode this message's fields in wire order.
    pub fn encode(&self, out: &mut impl BufMut) {
        encode_fields(&self.to_fields(), out);
    }

    /// Decode an `Immediate` payload against the bound environment.
    pub fn decode(buf: &[u8], env: &Env) -> Result<Self, ProtocolError> {
        let codec = Codec::for_schema(&Self::SCHEMA, env)?;
        Self::from_fields(codec.decode_fields(buf, MessageTag::Immediate)?)
    }
}

/// Which stage of a homing sequence a `Home` command requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingPhase {
    /// Move toward the limit switch.
    Approach = 1,
    /// Back off the limit switch before a slower re-approach.
    Backoff = 2,
    /// Homing sequence finished.
    Done = 3,
}

impl HomingPhase {
    fn from_u32(value: u32) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(HomingPhase::Approach),
            2 => Ok(HomingPhase::Backoff),
            3 => Ok(HomingPhase::Done),
            other => Err(ProtocolError::UnknownVariant { type_name: "HomingPhase", value: other }),
        }
    }
}

/// Drive the masked axes toward their home switch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomingMessage {
    /// Bitmask of which axes to home.
    pub axis_bitmask: u32,
    /// Which phase of the homing sequence to run.
    pub phase: HomingPhase,
    /// Homing speed for this phase.
    pub speed: f64,
}

impl HomingMessage {
    /// Field layout of the `Home` message.
    pub const SCHEMA: RecordSchema = RecordSchema::new(&[
        FieldDescriptor::scalar("axis_bitmask", FieldType::U32),
        FieldDescriptor::scalar("phase", FieldType::U32),
        FieldDescriptor::scalar("speed", FieldType::F64),
    ]);
    /// Fixed on-wire payload size in bytes.
    pub const SIZE: usize = 4 + 4 + 8;

    fn to_fields(self) -> Vec<FieldValue> {
        vec![FieldValue::U32(self.axis_bitmask), FieldValue::U32(self.phase as u32), FieldValue::F64(self.speed)]
    }

    fn from_fields(fields: Vec<FieldValue>) -> Result<Self, ProtocolError> {
        let [axis_bitmask, phase, speed] = <[FieldValue; 3]>::try_from(fields)
            .map_err(|_| ProtocolError::SchemaMismatch { record: "HomingMessage" })?;
        Ok(Self {
            axis_bitmask: axis_bitmask.expect_u32("HomingMessage")?,
            phase: HomingPhase::from_u32(phase.expect_u32("HomingMessage")?)?,
            speed: speed.expect_f64("HomingMessage")?,
        })
    }

    /// Encode this message's fields in wire order.
    pub fn encode(&self, out: &mut impl BufMut) {
        encode_fields(&self.to_fields(), out);
    }

    /// Decode a `Home` payload.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let codec = Codec::for_schema(&Self::SCHEMA, &Env::new())?;
        Self::from_fields(codec.decode_fields(buf, MessageTag::Home)?)
    }
}

/// Adjust the feed/speed override in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverrideMessage {
    /// New feed-rate override multiplier.
    pub override_value: f64,
    /// Velocity the override ramps toward.
    pub override_velocity: f64,
}

impl OverrideMessage {
    /// Field layout of the `Override` message.
    pub const SCHEMA: RecordSchema = RecordSchema::new(&[
        FieldDescriptor::scalar("override_value", FieldType::F64),
        FieldDescriptor::scalar("override_velocity", FieldType::F64),
    ]);
    /// Fixed on-wire payload size in bytes.
    pub const SIZE: usize = 16;

    fn to_fields(self) -> Vec<FieldValue> {
        vec![FieldValue::F64(self.override_value), FieldValue::F64(self.override_velocity)]
    }

    fn from_fields(fields: Vec<FieldValue>) -> Result<Self, ProtocolError> {
        let [override_value, override_velocity] = <[FieldValue; 2]>::try_from(fields)
            .map_err(|_| ProtocolError::SchemaMismatch { record: "OverrideMessage" })?;
        Ok(Self {
            override_value: override_value.expect_f64("OverrideMessage")?,
            override_velocity: override_velocity.expect_f64("OverrideMessage")?,
        })
    }

    /// Encode this message's fields in wire order.
    pub fn encode(&self, out: &mut impl BufMut) {
        encode_fields(&self.to_fields(), out);
    }

    /// Decode an `Override` payload.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let codec = Codec::for_schema(&Self::SCHEMA, &Env::new())?;
        Self::from_fields(codec.decode_fields(buf, MessageTag::Override)?)
    }
}

/// Optional device telemetry; only decodable once the handshake has bound
/// `PERIPHERAL_STATUS`. Host-to-device encoding is never defined for this
/// kind, matching [`Message::encode`]'s refusal to encode it.
#[derive(Debug, Clone, PartialEq)]
pub struct PeripheralStatus {
    /// Correlation token, if this reply answers a specific request.
    pub request_counter: u32,
    /// Trailing telemetry words, one per `PERIPHERAL_STATUS` slot.
    pub values: Vec<u32>,
}

impl PeripheralStatus {
    /// Field layout of the `PeripheralStatus` message.
    pub const SCHEMA: RecordSchema = RecordSchema::new(&[
        FieldDescriptor::scalar("request_counter", FieldType::U32),
        FieldDescriptor::array("values", FieldType::U32, PERIPHERAL_STATUS),
    ]);

    /// Fixed part of the payload size, before `PERIPHERAL_STATUS` is resolved.
    #[must_use]
    pub fn fixed_size() -> usize {
        Self::SCHEMA.fixed_size()
    }

    /// Total payload size once `env` resolves `PERIPHERAL_STATUS`.
    #[must_use]
    pub fn payload_size(env: &Env) -> Option<usize> {
        Self::SCHEMA.payload_size(env).ok()
    }

    fn from_fields(fields: Vec<FieldValue>) -> Result<Self, ProtocolError> {
        let [request_counter, values] = <[FieldValue; 2]>::try_from(fields)
            .map_err(|_| ProtocolError::SchemaMismatch { record: "PeripheralStatus" })?;
        Ok(Self {
            request_counter: request_counter.expect_u32("PeripheralStatus")?,
            values: values.expect_u32_array("PeripheralStatus")?,
        })
    }

    /// Decode a `PeripheralStatus` payload against the bound environment.
    pub fn decode(buf: &[u8], env: &Env) -> Result<Self, ProtocolError> {
        let codec = Codec::for_schema(&Self::SCHEMA, env)?;
        Self::from_fields(codec.decode_fields(buf, MessageTag::PeripheralStatus)?)
    }
}

/// A decoded, self-contained message (tag plus payload).
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Request the device's identity and axis count.
    Inquire,
    /// Reply to [`Message::Inquire`] with the system description.
    Describe(SystemDescription),
    /// Poll for the current status.
    Ask(Ask),
    /// Reply to [`Message::Ask`] with the current status.
    Status(Status),
    /// Announce (host) or grant (device) buffered send spaces.
    Buffer(BufferMessage),
    /// Marks the end of a buffered announcement's segments.
    Done,
    /// One buffered motion segment.
    Segment(Segment),
    /// One immediate (non-buffered) command.
    Immediate(Immediate),
    /// Drive an axis toward its home switch.
    Home(HomingMessage),
    /// Release the device to begin executing buffered work.
    Start,
    /// Adjust the feed/speed override in flight.
    Override(OverrideMessage),
    /// Device reported a fatal fault; the trailing bytes are an opaque,
    /// unspecified blob (spec's `Error` row: "unspecified trailing bytes").
    Error(Vec<u8>),
    /// Unsolicited device telemetry.
    PeripheralStatus(PeripheralStatus),
}

impl Message {
    /// The wire tag identifying this message's kind.
    #[must_use]
    pub fn tag(&self) -> MessageTag {
        match self {
            Message::Inquire => MessageTag::Inquire,
            Message::Describe(_) => MessageTag::Describe,
            Message::Ask(_) => MessageTag::Ask,
            Message::Status(_) => MessageTag::Status,
            Message::Buffer(_) => MessageTag::Buffer,
            Message::Done => MessageTag::Done,
            Message::Segment(_) => MessageTag::Segment,
            Message::Immediate(_) => MessageTag::Immediate,
            Message::Home(_) => MessageTag::Home,
            Message::Start => MessageTag::Start,
            Message::Override(_) => MessageTag::Override,
            Message::Error(_) => MessageTag::Error,
            Message::PeripheralStatus(_) => MessageTag::PeripheralStatus,
        }
    }

    /// Encode a host-originated message. Device-to-host-only kinds
    /// (`Describe`, `Status`, `Buffer` spaces reply, `Error`,
    /// `PeripheralStatus`) have no business being constructed on the host
    /// side; calling this on one of them is a programmer error.
    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u8(self.tag() as u8);
        match self {
            Message::Inquire | Message::Done | Message::Start => {}
            Message::Ask(m) => m.encode(out),
            Message::Buffer(m) => m.encode(out),
            Message::Segment(m) => m.encode(out),
            Message::Immediate(m) => m.encode(out),
            Message::Home(m) => m.encode(out),
            Message::Override(m) => m.encode(out),
            Message::Describe(_) | Message::Status(_) | Message::Error(_) | Message::PeripheralStatus(_) => {
                unreachable!("device-to-host message kinds are never encoded by the host")
            }
        }
    }
}

/// (tag, schema) pairs decodable before any handshake: the fixed-shape
/// record kinds, independent of the bound environment.
fn initial_schemas() -> [(MessageTag, &'static RecordSchema); 5] {
    [
        (MessageTag::Describe, &SystemDescription::SCHEMA),
        (MessageTag::Ask, &Ask::SCHEMA),
        (MessageTag::Buffer, &BufferMessage::SCHEMA),
        (MessageTag::Home, &HomingMessage::SCHEMA),
        (MessageTag::Override, &OverrideMessage::SCHEMA),
    ]
}

/// (tag, schema) pairs whose size depends on the bound environment.
fn bound_schemas() -> [(MessageTag, &'static RecordSchema); 3] {
    [
        (MessageTag::Status, &Status::SCHEMA),
        (MessageTag::Segment, &Segment::SCHEMA),
        (MessageTag::Immediate, &Immediate::SCHEMA),
    ]
}

/// A table mapping a tag byte to the payload length (bytes, excluding the
/// tag byte itself) the framed parser should expect for it.
///
/// Built in two stages matching the protocol's own two stages: everything
/// decodable before a handshake, then everything that needed `NUM_AXIS` (or
/// an optional extension parameter) to know its own size. Both stages walk
/// [`initial_schemas`]/[`bound_schemas`] generically rather than hardcoding
/// each record kind's size computation.
#[derive(Debug, Clone, Default)]
pub struct CodecTable {
    sizes: BTreeMap<u8, usize>,
}

impl CodecTable {
    /// Sizes for message kinds that don't depend on the handshake
    /// environment: the handshake messages themselves, plus everything with
    /// a fixed field list.
    #[must_use]
    pub fn initial() -> Self {
        let mut sizes = BTreeMap::new();
        sizes.insert(MessageTag::Inquire as u8, 0);
        sizes.insert(MessageTag::Done as u8, 0);
        sizes.insert(MessageTag::Start as u8, 0);
        let env = Env::new();
        for (tag, schema) in initial_schemas() {
            #[allow(
                clippy::expect_used,
                reason = "initial_schemas lists only fixed-shape records, which by construction never reference an environment variable"
            )]
            let size = schema
                .payload_size(&env)
                .expect("fixed-shape schemas never reference an environment variable");
            sizes.insert(tag as u8, size);
        }
        // Error is deliberately absent: the framed parser recognizes it
        // before consulting this table and consumes the rest of the read
        // as an opaque blob rather than a fixed payload length.
        Self { sizes }
    }

    /// Add the message kinds whose size depends on the bound environment.
    /// `PeripheralStatus` is only added if the environment exposes
    /// `PERIPHERAL_STATUS`; a device that never sends it simply never binds
    /// that parameter.
    pub fn bind(&mut self, env: &Env) -> Result<(), ProtocolError> {
        for (tag, schema) in bound_schemas() {
            self.sizes.insert(tag as u8, schema.payload_size(env)?);
        }
        if let Ok(size) = PeripheralStatus::SCHEMA.payload_size(env) {
            self.sizes.insert(MessageTag::PeripheralStatus as u8, size);
        }
        Ok(())
    }

    /// Payload length in bytes for a given tag, if the table knows it yet.
    #[must_use]
    pub fn payload_len(&self, tag: u8) -> Option<usize> {
        self.sizes.get(&tag).copied()
    }

    /// Decode a complete frame (tag plus payload) into a [`Message`].
    pub fn decode(&self, tag: u8, payload: &[u8], env: &Env) -> Result<Message, ProtocolError> {
        let Some(message_tag) = MessageTag::from_byte(tag) else {
            return Err(ProtocolError::UnknownTag { tag });
        };
        let expected = self.payload_len(tag).ok_or(ProtocolError::NotYetBound)?;
        if payload.len() != expected {
            return Err(ProtocolError::PayloadSizeMismatch {
                tag,
                expected,
                actual: payload.len(),
            });
        }
        Ok(match message_tag {
            MessageTag::Inquire => Message::Inquire,
            MessageTag::Describe => Message::Describe(SystemDescription::decode(payload)?),
            MessageTag::Ask => Message::Ask(Ask::decode(payload)?),
            MessageTag::Status => Message::Status(Status::decode(payload, env)?),
            MessageTag::Buffer => Message::Buffer(BufferMessage::decode(payload)?),
            MessageTag::Done => Message::Done,
            MessageTag::Segment => Message::Segment(Segment::decode(payload, env)?),
            MessageTag::Immediate => Message::Immediate(Immediate::decode(payload, env)?),
            MessageTag::Home => Message::Home(HomingMessage::decode(payload)?),
            MessageTag::Start => Message::Start,
            MessageTag::Override => Message::Override(OverrideMessage::decode(payload)?),
            MessageTag::Error => Message::Error(payload.to_vec()),
            MessageTag::PeripheralStatus => {
                Message::PeripheralStatus(PeripheralStatus::decode(payload, env)?)
            }
        })
    }
}
