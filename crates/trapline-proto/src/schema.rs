//! Declarative field schemas and the generic codec built over them.
//!
//! Every record type registers its shape once, as ordinary `'static` data —
//! a [`RecordSchema`] naming each field's wire type and repeat count — built
//! entirely from `const fn` constructors rather than a derive macro or
//! runtime reflection over the struct. [`Codec::for_schema`] is a pure
//! function of a schema and a bound environment: it resolves every field's
//! size once and then walks the same field list to decode a payload into
//! typed [`FieldValue`]s. Adding a record kind means writing its field list
//! and a small `to_fields`/`from_fields` pair, not a bespoke byte-pusher.

use bytes::{Buf, BufMut};

use crate::error::ProtocolError;
use crate::messages::{Env, MessageTag};
use crate::sea::SizeExpr;

/// A field's on-wire scalar type. Every field is, at the wire level, a
/// little-endian `u32`, `i32`, or `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 32-bit integer.
    I32,
    /// 64-bit IEEE-754 float.
    F64,
}

impl FieldType {
    /// Width of one scalar of this type, in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            FieldType::U32 | FieldType::I32 => 4,
            FieldType::F64 => 8,
        }
    }
}

/// How many consecutive scalars a field occupies.
#[derive(Debug, Clone)]
pub enum Repeat {
    /// A single scalar.
    One,
    /// A trailing array whose length resolves against the bound environment.
    Count(SizeExpr),
}

/// One field in a record's declared shape, in wire order.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// The field's name, used only for diagnostics.
    pub name: &'static str,
    /// The field's on-wire scalar type.
    pub ty: FieldType,
    /// Whether this field is a single scalar or a trailing array.
    pub repeat: Repeat,
}

impl FieldDescriptor {
    /// A single scalar field.
    #[must_use]
    pub const fn scalar(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty, repeat: Repeat::One }
    }

    /// A trailing array field whose length resolves against the bound
    /// environment (an axis coordinate array, sized by `NUM_AXIS`).
    #[must_use]
    pub const fn array(name: &'static str, ty: FieldType, count: SizeExpr) -> Self {
        Self { name, ty, repeat: Repeat::Count(count) }
    }
}

/// A record's declared field list, written once per message kind.
#[derive(Debug, Clone, Copy)]
pub struct RecordSchema {
    /// The record's fields, in wire order.
    pub fields: &'static [FieldDescriptor],
}

impl RecordSchema {
    /// Declare a record's field list.
    #[must_use]
    pub const fn new(fields: &'static [FieldDescriptor]) -> Self {
        Self { fields }
    }

    /// Sum of the fields whose length doesn't depend on the environment —
    /// the part of the record's size known before any handshake.
    #[must_use]
    pub fn fixed_size(&self) -> usize {
        self.fields.iter().filter(|f| matches!(f.repeat, Repeat::One)).map(|f| f.ty.width()).sum()
    }

    /// Total payload size in bytes, resolving any array field's length
    /// against `env`.
    pub fn payload_size(&self, env: &Env) -> Result<usize, ProtocolError> {
        let mut total = 0usize;
        for field in self.fields {
            let count = match &field.repeat {
                Repeat::One => 1,
                Repeat::Count(expr) => expr.eval(env.as_map()).ok_or_else(|| {
                    ProtocolError::UnboundParameter { name: unbound_var(expr, env) }
                })? as usize,
            };
            total += field.ty.width() * count;
        }
        Ok(total)
    }
}

/// Find the first variable `expr` references that `env` doesn't bind, for
/// error reporting. Every array field in this protocol references a bare
/// `Var`, but this walks the general `Add`/`Mul` tree too.
fn unbound_var(expr: &SizeExpr, env: &Env) -> &'static str {
    match expr {
        SizeExpr::Const(_) => "unknown",
        SizeExpr::Var(name) => name,
        SizeExpr::Add(l, r) | SizeExpr::Mul(l, r) => {
            if !l.is_bound(env.as_map()) {
                unbound_var(l, env)
            } else {
                unbound_var(r, env)
            }
        }
    }
}

/// A decoded field's value, tagged by shape (scalar vs. trailing array) to
/// match how [`FieldDescriptor::repeat`] declared it.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A decoded `u32` scalar.
    U32(u32),
    /// A decoded `i32` scalar.
    I32(i32),
    /// A decoded `f64` scalar.
    F64(f64),
    /// A decoded `u32` array.
    U32Array(Vec<u32>),
    /// A decoded `i32` array.
    I32Array(Vec<i32>),
    /// A decoded `f64` array.
    F64Array(Vec<f64>),
}

impl FieldValue {
    /// Unwrap a `U32` value, or report a schema mismatch against `record`.
    pub fn expect_u32(self, record: &'static str) -> Result<u32, ProtocolError> {
        match self {
            FieldValue::U32(v) => Ok(v),
            _ => Err(ProtocolError::SchemaMismatch { record }),
        }
    }

    /// Unwrap an `I32` value, or report a schema mismatch against `record`.
    pub fn expect_i32(self, record: &'static str) -> Result<i32, ProtocolError> {
        match self {
            FieldValue::I32(v) => Ok(v),
            _ => Err(ProtocolError::SchemaMismatch { record }),
        }
    }

    /// Unwrap an `F64` value, or report a schema mismatch against `record`.
    pub fn expect_f64(self, record: &'static str) -> Result<f64, ProtocolError> {
        match self {
            FieldValue::F64(v) => Ok(v),
            _ => Err(ProtocolError::SchemaMismatch { record }),
        }
    }

    /// Unwrap an `I32Array` value, or report a schema mismatch against `record`.
    pub fn expect_i32_array(self, record: &'static str) -> Result<Vec<i32>, ProtocolError> {
        match self {
            FieldValue::I32Array(v) => Ok(v),
            _ => Err(ProtocolError::SchemaMismatch { record }),
        }
    }

    /// Unwrap a `U32Array` value, or report a schema mismatch against `record`.
    pub fn expect_u32_array(self, record: &'static str) -> Result<Vec<u32>, ProtocolError> {
        match self {
            FieldValue::U32Array(v) => Ok(v),
            _ => Err(ProtocolError::SchemaMismatch { record }),
        }
    }

    /// Unwrap an `F64Array` value, or report a schema mismatch against `record`.
    pub fn expect_f64_array(self, record: &'static str) -> Result<Vec<f64>, ProtocolError> {
        match self {
            FieldValue::F64Array(v) => Ok(v),
            _ => Err(ProtocolError::SchemaMismatch { record }),
        }
    }
}

fn u32_field(buf: &mut impl Buf, tag: MessageTag) -> Result<u32, ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::FrameTruncated { tag: tag as u8, needed: 4, available: buf.remaining() });
    }
    Ok(buf.get_u32_le())
}

fn i32_field(buf: &mut impl Buf, tag: MessageTag) -> Result<i32, ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::FrameTruncated { tag: tag as u8, needed: 4, available: buf.remaining() });
    }
    Ok(buf.get_i32_le())
}

fn f64_field(buf: &mut impl Buf, tag: MessageTag) -> Result<f64, ProtocolError> {
    if buf.remaining() < 8 {
        return Err(ProtocolError::FrameTruncated { tag: tag as u8, needed: 8, available: buf.remaining() });
    }
    Ok(buf.get_f64_le())
}

/// A schema bound to a concrete environment: knows the record's total wire
/// size and can turn a payload into one [`FieldValue`] per declared field.
///
/// `for_schema` is a pure function of its two arguments — given a record's
/// schema and a handshake environment, it produces the codec for that
/// combination, with no hidden state beyond what `schema` and `env` say.
pub struct Codec {
    schema: &'static RecordSchema,
    env: Env,
    size: usize,
}

impl Codec {
    /// Resolve `schema`'s total size against `env` and build the codec.
    pub fn for_schema(schema: &'static RecordSchema, env: &Env) -> Result<Self, ProtocolError> {
        let size = schema.payload_size(env)?;
        Ok(Self { schema, env: env.clone(), size })
    }

    /// Total wire size of a record encoded with this codec.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Decode `buf` into one [`FieldValue`] per schema field, in declared
    /// order. `buf` is expected to hold exactly [`Codec::size`] bytes.
    pub fn decode_fields(&self, buf: &[u8], tag: MessageTag) -> Result<Vec<FieldValue>, ProtocolError> {
        let mut cursor = buf;
        let mut values = Vec::with_capacity(self.schema.fields.len());
        for field in self.schema.fields {
            let value = match &field.repeat {
                Repeat::One => match field.ty {
                    FieldType::U32 => FieldValue::U32(u32_field(&mut cursor, tag)?),
                    FieldType::I32 => FieldValue::I32(i32_field(&mut cursor, tag)?),
                    FieldType::F64 => FieldValue::F64(f64_field(&mut cursor, tag)?),
                },
                Repeat::Count(expr) => {
                    #[allow(
                        clippy::expect_used,
                        reason = "for_schema already evaluated payload_size successfully, so every count in this schema resolves against the same env"
                    )]
                    let count = expr
                        .eval(self.env.as_map())
                        .expect("Codec::for_schema already validated every count resolves")
                        as usize;
                    match field.ty {
                        FieldType::U32 => FieldValue::U32Array(
                            (0..count).map(|_| u32_field(&mut cursor, tag)).collect::<Result<_, _>>()?,
                        ),
                        FieldType::I32 => FieldValue::I32Array(
                            (0..count).map(|_| i32_field(&mut cursor, tag)).collect::<Result<_, _>>()?,
                        ),
                        FieldType::F64 => FieldValue::F64Array(
                            (0..count).map(|_| f64_field(&mut cursor, tag)).collect::<Result<_, _>>()?,
                        ),
                    }
                }
            };
            values.push(value);
        }
        Ok(values)
    }
}

/// Serialize already-typed field values in schema order. Array lengths come
/// from the values themselves: encoding never needs the environment, only
/// decoding does, since the wire bytes don't carry their own lengths.
pub fn encode_fields(values: &[FieldValue], out: &mut impl BufMut) {
    for value in values {
        match value {
            FieldValue::U32(v) => out.put_u32_le(*v),
            FieldValue::I32(v) => out.put_i32_le(*v),
            FieldValue::F64(v) => out.put_f64_le(*v),
            FieldValue::U32Array(vs) => vs.iter().for_each(|v| out.put_u32_le(*v)),
            FieldValue::I32Array(vs) => vs.iter().for_each(|v| out.put_i32_le(*v)),
            FieldValue::F64Array(vs) => vs.iter().for_each(|v| out.put_f64_le(*v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::NUM_AXIS;

    const PAIR_SCHEMA: RecordSchema = RecordSchema::new(&[
        FieldDescriptor::scalar("request_counter", FieldType::U32),
        FieldDescriptor::array("coords", FieldType::F64, NUM_AXIS),
    ]);

    #[test]
    fn fixed_size_ignores_array_fields() {
        assert_eq!(PAIR_SCHEMA.fixed_size(), 4);
    }

    #[test]
    fn payload_size_errors_until_the_variable_is_bound() {
        let env = Env::new();
        assert_eq!(
            PAIR_SCHEMA.payload_size(&env),
            Err(ProtocolError::UnboundParameter { name: "NUM_AXIS" })
        );
    }

    #[test]
    fn codec_round_trips_fields_through_encode_and_decode() {
        let mut env = Env::new();
        env.bind("NUM_AXIS", 3);
        let codec = Codec::for_schema(&PAIR_SCHEMA, &env).unwrap();
        assert_eq!(codec.size(), 4 + 3 * 8);

        let values = vec![FieldValue::U32(42), FieldValue::F64Array(vec![1.0, -2.0, 3.5])];
        let mut buf = Vec::new();
        encode_fields(&values, &mut buf);
        assert_eq!(buf.len(), codec.size());

        let decoded = codec.decode_fields(&buf, MessageTag::Status).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn decode_reports_truncation_against_the_requesting_tag() {
        let env = Env::new();
        let codec = Codec::for_schema(&RecordSchema::new(&[FieldDescriptor::scalar("x", FieldType::U32)]), &env)
            .unwrap();
        assert_eq!(
            codec.decode_fields(&[0, 0], MessageTag::Ask),
            Err(ProtocolError::FrameTruncated { tag: MessageTag::Ask as u8, needed: 4, available: 2 })
        );
    }
}
