//! The dynamic "any" value and hashable float keys.

use crate::container::{encode_map_entries, fill_vec_with, read_map_header, read_sequence_header};
use crate::core::*;
use crate::kind::{Classify, Kind, ScalarKind};
use crate::target::{resolve_sequence, DecodeTarget};
use crate::{Decoder, Encoder, EncoderError, Handle, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::hash::{Hash, Hasher};

/// A value whose shape is decided by the wire rather than by its Rust type.
///
/// Signed integers are written with a `TAG_SIGNED` marker so that they come back as
/// [`Value::Int`]; typed integer decoders ignore the marker.
///
/// Floats compare and hash by their bit pattern, so `Value` can be used as a map key.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Seq(Vec<Value>),
    /// Entries in wire order. Duplicate keys are kept.
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => a.to_bits() == b.to_bits(),
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Nil => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Uint(u) => u.hash(state),
            Value::Float32(f) => f.to_bits().hash(state),
            Value::Float64(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Seq(items) => items.hash(state),
            Value::Map(entries) => entries.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Uint(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Seq(value)
    }
}

impl Classify for Value {
    fn classify() -> Kind {
        Kind::Dynamic
    }
}

impl Encoder for Value {
    fn encode(&self, writer: &mut BytesMut, handle: &Handle) -> Result<()> {
        match self {
            Value::Nil => writer.put_u8(TAG_NONE),
            Value::Bool(b) => b.encode(writer, handle)?,
            Value::Int(i) if *i >= 0 => {
                writer.put_u8(TAG_SIGNED);
                encode_unsigned(*i as u128, writer);
            }
            Value::Int(i) => encode_signed(*i as i128, writer),
            Value::Uint(u) => encode_unsigned(*u as u128, writer),
            Value::Float32(f) => f.encode(writer, handle)?,
            Value::Float64(f) => f.encode(writer, handle)?,
            Value::String(s) => encode_str(s, writer),
            Value::Bytes(b) => encode_binary(b, writer),
            Value::Seq(items) => items.encode(writer, handle)?,
            Value::Map(entries) => encode_map_entries(
                entries.len(),
                entries.iter().map(|(k, v)| (k, v)),
                writer,
                handle,
            )?,
        }
        Ok(())
    }
}

/// Enters one more level of container nesting.
fn descend(depth: usize, handle: &Handle) -> Result<usize> {
    if depth >= handle.max_depth() {
        return Err(EncoderError::Format(format!(
            "Dynamic value nesting exceeds the maximum depth of {}",
            handle.max_depth()
        )));
    }
    Ok(depth + 1)
}

fn is_seq_tag(tag: u8) -> bool {
    (TAG_SEQ_BASE..=TAG_SEQ_LONG).contains(&tag)
}

fn decode_items(
    items: &mut Vec<Value>,
    target: DecodeTarget,
    reader: &mut Bytes,
    handle: &Handle,
    depth: usize,
) -> Result<()> {
    let (payload, _) = read_sequence_header::<Value>(reader)?;
    let path = resolve_sequence(target, payload)?;
    fill_vec_with(
        items,
        path,
        payload,
        reader,
        handle,
        |slot, reader| slot.decode_into_at(reader, handle, depth),
        |reader| Value::decode_at(reader, handle, depth),
    )
}

fn decode_entries(
    entries: &mut Vec<(Value, Value)>,
    reader: &mut Bytes,
    handle: &Handle,
    depth: usize,
) -> Result<()> {
    let payload = read_map_header(reader)?;
    entries.clear();
    entries.reserve(payload.len().min(handle.max_init_len()));
    for _ in 0..payload.len() {
        let key = Value::decode_at(reader, handle, depth)?;
        let value = Value::decode_at(reader, handle, depth)?;
        entries.push((key, value));
    }
    Ok(())
}

// Every recursive step below carries `depth`, the number of sequences and maps already entered,
// so a hostile payload fails with `Format` once it nests past `Handle::max_depth`.
impl Value {
    fn decode_at(reader: &mut Bytes, handle: &Handle, depth: usize) -> Result<Self> {
        let tag = peek_tag(reader)?;
        match tag {
            TAG_NONE => {
                reader.advance(1);
                Ok(Value::Nil)
            }
            TAG_FALSE | TAG_TRUE => Ok(Value::Bool(bool::decode(reader, handle)?)),
            TAG_ZERO..=TAG_U8_127 | TAG_U8..=TAG_U128 => {
                Ok(Value::Uint(WireInt::decode(reader)?.narrow("u64")?))
            }
            TAG_NEGATIVE | TAG_SIGNED => Ok(Value::Int(WireInt::decode(reader)?.narrow("i64")?)),
            TAG_F32 => Ok(Value::Float32(f32::decode(reader, handle)?)),
            TAG_F64 => Ok(Value::Float64(f64::decode(reader, handle)?)),
            TAG_STRING_BASE..=TAG_STRING_LONG => Ok(Value::String(String::decode(reader, handle)?)),
            TAG_BINARY => Ok(Value::Bytes(Vec::<u8>::decode(reader, handle)?)),
            TAG_SEQ_BASE..=TAG_SEQ_LONG => {
                let depth = descend(depth, handle)?;
                let mut items = Vec::new();
                decode_items(&mut items, DecodeTarget::Nil, reader, handle, depth)?;
                Ok(Value::Seq(items))
            }
            TAG_MAP => {
                let depth = descend(depth, handle)?;
                let mut entries = Vec::new();
                decode_entries(&mut entries, reader, handle, depth)?;
                Ok(Value::Map(entries))
            }
            other => Err(EncoderError::Format(format!(
                "Unexpected tag for dynamic value: {}",
                other
            ))),
        }
    }

    fn decode_into_at(&mut self, reader: &mut Bytes, handle: &Handle, depth: usize) -> Result<()> {
        let tag = peek_tag(reader)?;
        match self {
            Value::String(s) if (TAG_STRING_BASE..=TAG_STRING_LONG).contains(&tag) => {
                s.decode_into(reader, handle)
            }
            Value::Bytes(b) if tag == TAG_BINARY => b.decode_into(reader, handle),
            Value::Seq(items) if is_seq_tag(tag) => {
                let target = DecodeTarget::of_vec(items);
                decode_items(items, target, reader, handle, descend(depth, handle)?)
            }
            Value::Map(entries) if tag == TAG_MAP => {
                decode_entries(entries, reader, handle, descend(depth, handle)?)
            }
            _ => {
                *self = Value::decode_at(reader, handle, depth)?;
                Ok(())
            }
        }
    }

    fn decode_in_place_at(
        &mut self,
        reader: &mut Bytes,
        handle: &Handle,
        depth: usize,
    ) -> Result<()> {
        match self {
            Value::Seq(items) if is_seq_tag(peek_tag(reader)?) => {
                let target = DecodeTarget::NonAddressable { len: items.len() };
                decode_items(items, target, reader, handle, descend(depth, handle)?)
            }
            _ => self.decode_into_at(reader, handle, depth),
        }
    }
}

impl Decoder for Value {
    fn decode(reader: &mut Bytes, handle: &Handle) -> Result<Self> {
        Value::decode_at(reader, handle, 0)
    }

    /// Reuses the buffer of a string, binary, sequence or map value when the payload has the
    /// same shape.
    fn decode_into(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        self.decode_into_at(reader, handle, 0)
    }

    /// A sequence value receiving a sequence payload is filled slot by slot and must already have
    /// the payload's length. Any other payload replaces the value, as the value itself is the
    /// slot.
    fn decode_in_place(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        self.decode_in_place_at(reader, handle, 0)
    }
}

// --- FloatKey ---

/// A float usable as a hash map key.
///
/// `0.0` and `-0.0` are the same key, and every NaN is the same key. On the wire it is exactly
/// the wrapped float.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatKey<F>(pub F);

macro_rules! impl_float_key {
    ($($ty:ty => $scalar:ident),*) => {
        $(
            impl FloatKey<$ty> {
                fn canonical_bits(&self) -> <$ty as FloatBits>::Bits {
                    if self.0.is_nan() {
                        <$ty>::NAN.to_bits()
                    } else if self.0 == 0.0 {
                        (0.0 as $ty).to_bits()
                    } else {
                        self.0.to_bits()
                    }
                }
            }

            impl PartialEq for FloatKey<$ty> {
                fn eq(&self, other: &Self) -> bool {
                    self.canonical_bits() == other.canonical_bits()
                }
            }

            impl Eq for FloatKey<$ty> {}

            impl Hash for FloatKey<$ty> {
                fn hash<H: Hasher>(&self, state: &mut H) {
                    self.canonical_bits().hash(state);
                }
            }

            impl From<$ty> for FloatKey<$ty> {
                fn from(value: $ty) -> Self {
                    FloatKey(value)
                }
            }

            impl Classify for FloatKey<$ty> {
                fn classify() -> Kind {
                    Kind::Scalar(ScalarKind::$scalar)
                }
            }

            impl Encoder for FloatKey<$ty> {
                fn encode(&self, writer: &mut BytesMut, handle: &Handle) -> Result<()> {
                    self.0.encode(writer, handle)
                }
            }

            impl Decoder for FloatKey<$ty> {
                fn decode(reader: &mut Bytes, handle: &Handle) -> Result<Self> {
                    Ok(FloatKey(<$ty>::decode(reader, handle)?))
                }
            }
        )*
    };
}

trait FloatBits {
    type Bits: Eq + Hash;
}

impl FloatBits for f32 {
    type Bits = u32;
}

impl FloatBits for f64 {
    type Bits = u64;
}

impl_float_key!(f32 => F32, f64 => F64);
