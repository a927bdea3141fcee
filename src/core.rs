use crate::kind::{Classify, Kind, ScalarKind};
use crate::{Decoder, Encoder, EncoderError, Handle, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// Type tags used in the senax binary format.
///
/// These tags are written as the first byte of each encoded value to identify its type.
/// Most users do not need to use these directly.
///
/// - Scalars, nil, strings, binary data, sequences and maps each have their own tag(s).
/// - Tags are stable and part of the wire format.

///< 0 for numbers
pub const TAG_ZERO: u8 = 0;
// 0-127: unsigned values stored in the tag itself
pub const TAG_U8_127: u8 = 127;
///< Nil pointer or nil collection
pub const TAG_NONE: u8 = 128;
pub const TAG_FALSE: u8 = 129;
pub const TAG_TRUE: u8 = 130;
pub const TAG_U8: u8 = 131;
pub const TAG_U16: u8 = 132;
pub const TAG_U32: u8 = 133;
pub const TAG_U64: u8 = 134;
pub const TAG_U128: u8 = 135;
///< Negative signed integer (bit-inverted encoding)
pub const TAG_NEGATIVE: u8 = 136;
pub const TAG_F32: u8 = 137;
pub const TAG_F64: u8 = 138;
///< Short string (length in tag)
pub const TAG_STRING_BASE: u8 = 139;
///< Long string (length encoded)
pub const TAG_STRING_LONG: u8 = 180;
///< Vec<u8> or Bytes
pub const TAG_BINARY: u8 = 181;
///< Marks the following unsigned integer as a signed value
pub const TAG_SIGNED: u8 = 182;
///< Short sequence (length in tag)
pub const TAG_SEQ_BASE: u8 = 188;
///< Long sequence (length encoded)
pub const TAG_SEQ_LONG: u8 = 194;
///< Map (HashMap, BTreeMap, IndexMap, map-by-slice types)
pub const TAG_MAP: u8 = 196;

/// Reads one tag byte.
#[inline]
pub fn read_tag(reader: &mut Bytes) -> Result<u8> {
    if reader.remaining() == 0 {
        return Err(EncoderError::InsufficientData);
    }
    Ok(reader.get_u8())
}

/// Returns the next tag byte without consuming it.
#[inline]
pub fn peek_tag(reader: &Bytes) -> Result<u8> {
    reader.first().copied().ok_or(EncoderError::InsufficientData)
}

/// Consumes a `TAG_NONE` if it is next, reporting whether it did.
#[inline]
pub(crate) fn take_nil(reader: &mut Bytes) -> Result<bool> {
    if peek_tag(reader)? == TAG_NONE {
        reader.advance(1);
        return Ok(true);
    }
    Ok(false)
}

/// Splits `len` bytes off the front of the reader.
#[inline]
pub(crate) fn take_bytes(reader: &mut Bytes, len: usize) -> Result<Bytes> {
    if reader.remaining() < len {
        return Err(EncoderError::InsufficientData);
    }
    Ok(reader.split_to(len))
}

// --- Integers ---

/// An integer as it appears on the wire, before it is narrowed to a destination type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireInt {
    Unsigned(u128),
    /// A negative value, stored bit-inverted: the value is `!inverted`.
    Negative(u128),
}

impl WireInt {
    /// Reads any integer encoding, skipping a leading `TAG_SIGNED` marker.
    pub fn decode(reader: &mut Bytes) -> Result<Self> {
        let mut tag = read_tag(reader)?;
        if tag == TAG_SIGNED {
            tag = read_tag(reader)?;
        }
        if tag == TAG_NEGATIVE {
            let tag = read_tag(reader)?;
            return Ok(WireInt::Negative(decode_unsigned_from_tag(tag, reader)?));
        }
        Ok(WireInt::Unsigned(decode_unsigned_from_tag(tag, reader)?))
    }

    /// Narrows to `T`, failing with [`EncoderError::Range`] instead of wrapping.
    pub fn narrow<T>(self, target: &'static str) -> Result<T>
    where
        T: TryFrom<u128> + TryFrom<i128>,
    {
        let narrowed = match self {
            WireInt::Unsigned(value) => <T as TryFrom<u128>>::try_from(value).ok(),
            WireInt::Negative(inverted) => i128::try_from(inverted)
                .ok()
                .and_then(|inv| <T as TryFrom<i128>>::try_from(!inv).ok()),
        };
        narrowed.ok_or_else(|| EncoderError::range(self, target))
    }
}

macro_rules! impl_wire_int_to_float {
    ($($method:ident => $ty:ty),* $(,)?) => {
        impl WireInt {
            $(
                /// Converts to a float, failing with [`EncoderError::Range`] unless the value is
                /// exactly representable.
                pub fn $method(self) -> Result<$ty> {
                    // 2^128, or infinity where that overflows
                    let limit = u128::MAX as $ty;
                    let exact = |magnitude: u128| {
                        let value = magnitude as $ty;
                        (value < limit && value as u128 == magnitude).then_some(value)
                    };
                    let converted = match self {
                        WireInt::Unsigned(value) => exact(value),
                        WireInt::Negative(inverted) => match inverted.checked_add(1) {
                            Some(magnitude) => exact(magnitude).map(|value| -value),
                            None => limit.is_finite().then_some(-limit),
                        },
                    };
                    converted.ok_or_else(|| EncoderError::range(self, stringify!($ty)))
                }
            )*
        }
    };
}

impl_wire_int_to_float!(to_f32 => f32, to_f64 => f64);

/// True for every tag that starts an integer encoding.
#[inline]
pub fn is_int_tag(tag: u8) -> bool {
    matches!(
        tag,
        TAG_ZERO..=TAG_U8_127 | TAG_U8..=TAG_U128 | TAG_NEGATIVE | TAG_SIGNED
    )
}

impl fmt::Display for WireInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            WireInt::Unsigned(value) => write!(f, "{}", value),
            WireInt::Negative(inverted) => match inverted.checked_add(1) {
                Some(magnitude) => write!(f, "-{}", magnitude),
                None => f.write_str("-340282366920938463463374607431768211456"),
            },
        }
    }
}

/// Encodes an unsigned integer using the compact variable-length format.
///
/// - 0..=127 are encoded as a single tag byte
/// - 128..=383 use `TAG_U8` followed by `value - 128`
/// - Larger values use `TAG_U16`, `TAG_U32`, `TAG_U64`, or `TAG_U128` with the value in
///   little-endian
pub fn encode_unsigned(value: u128, writer: &mut BytesMut) {
    if value <= TAG_U8_127 as u128 {
        writer.put_u8(TAG_ZERO + value as u8);
    } else if value <= 255 + 128 {
        writer.put_u8(TAG_U8);
        writer.put_u8((value - 128) as u8);
    } else if value <= u16::MAX as u128 {
        writer.put_u8(TAG_U16);
        writer.put_u16_le(value as u16);
    } else if value <= u32::MAX as u128 {
        writer.put_u8(TAG_U32);
        writer.put_u32_le(value as u32);
    } else if value <= u64::MAX as u128 {
        writer.put_u8(TAG_U64);
        writer.put_u64_le(value as u64);
    } else {
        writer.put_u8(TAG_U128);
        writer.put_u128_le(value);
    }
}

/// Encodes a signed integer: non-negative values as unsigned, negative values as `TAG_NEGATIVE`
/// followed by the bit-inverted value.
pub fn encode_signed(value: i128, writer: &mut BytesMut) {
    if value >= 0 {
        encode_unsigned(value as u128, writer);
    } else {
        writer.put_u8(TAG_NEGATIVE);
        encode_unsigned(!value as u128, writer);
    }
}

/// Decodes an unsigned integer whose tag has already been read.
fn decode_unsigned_from_tag(tag: u8, reader: &mut Bytes) -> Result<u128> {
    let width = match tag {
        TAG_ZERO..=TAG_U8_127 => return Ok((tag - TAG_ZERO) as u128),
        TAG_U8 => 1,
        TAG_U16 => 2,
        TAG_U32 => 4,
        TAG_U64 => 8,
        TAG_U128 => 16,
        other => {
            return Err(EncoderError::Format(format!(
                "Expected integer tag, got {}",
                other
            )))
        }
    };
    if reader.remaining() < width {
        return Err(EncoderError::InsufficientData);
    }
    Ok(match tag {
        TAG_U8 => reader.get_u8() as u128 + 128,
        TAG_U16 => reader.get_u16_le() as u128,
        TAG_U32 => reader.get_u32_le() as u128,
        TAG_U64 => reader.get_u64_le() as u128,
        _ => reader.get_u128_le(),
    })
}

macro_rules! impl_unsigned {
    ($($ty:ty => $scalar:ident),* $(,)?) => {
        $(
            impl Classify for $ty {
                fn classify() -> Kind {
                    Kind::Scalar(ScalarKind::$scalar)
                }
            }

            impl Encoder for $ty {
                fn encode(&self, writer: &mut BytesMut, _handle: &Handle) -> Result<()> {
                    encode_unsigned(*self as u128, writer);
                    Ok(())
                }
            }

            impl Decoder for $ty {
                fn decode(reader: &mut Bytes, _handle: &Handle) -> Result<Self> {
                    WireInt::decode(reader)?.narrow(ScalarKind::$scalar.name())
                }
            }
        )*
    };
}

macro_rules! impl_signed {
    ($($ty:ty => $scalar:ident),* $(,)?) => {
        $(
            impl Classify for $ty {
                fn classify() -> Kind {
                    Kind::Scalar(ScalarKind::$scalar)
                }
            }

            impl Encoder for $ty {
                fn encode(&self, writer: &mut BytesMut, _handle: &Handle) -> Result<()> {
                    encode_signed(*self as i128, writer);
                    Ok(())
                }
            }

            impl Decoder for $ty {
                fn decode(reader: &mut Bytes, _handle: &Handle) -> Result<Self> {
                    WireInt::decode(reader)?.narrow(ScalarKind::$scalar.name())
                }
            }
        )*
    };
}

impl_unsigned!(u8 => U8, u16 => U16, u32 => U32, u64 => U64, u128 => U128, usize => Usize);
impl_signed!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, i128 => I128, isize => Isize);

// --- bool ---

impl Classify for bool {
    fn classify() -> Kind {
        Kind::Scalar(ScalarKind::Bool)
    }
}

/// Encodes a `bool` as a single tag byte: `TAG_FALSE` or `TAG_TRUE`.
impl Encoder for bool {
    fn encode(&self, writer: &mut BytesMut, _handle: &Handle) -> Result<()> {
        writer.put_u8(if *self { TAG_TRUE } else { TAG_FALSE });
        Ok(())
    }
}

impl Decoder for bool {
    fn decode(reader: &mut Bytes, _handle: &Handle) -> Result<Self> {
        match read_tag(reader)? {
            TAG_FALSE => Ok(false),
            TAG_TRUE => Ok(true),
            other => Err(EncoderError::Format(format!(
                "Expected bool tag ({} or {}), got {}",
                TAG_FALSE, TAG_TRUE, other
            ))),
        }
    }
}

// --- f32/f64 ---

impl Classify for f32 {
    fn classify() -> Kind {
        Kind::Scalar(ScalarKind::F32)
    }
}

/// Encodes an `f32` as a tag and 4 bytes (little-endian IEEE 754).
impl Encoder for f32 {
    fn encode(&self, writer: &mut BytesMut, _handle: &Handle) -> Result<()> {
        writer.put_u8(TAG_F32);
        writer.put_f32_le(*self);
        Ok(())
    }
}

/// Decodes an `f32` from 4 bytes, or from an `f64` or integer that is exactly representable.
///
/// # Errors
/// Returns [`EncoderError::Range`] if a wider payload would lose precision.
impl Decoder for f32 {
    fn decode(reader: &mut Bytes, _handle: &Handle) -> Result<Self> {
        if is_int_tag(peek_tag(reader)?) {
            return WireInt::decode(reader)?.to_f32();
        }
        match read_tag(reader)? {
            TAG_F32 => {
                if reader.remaining() < 4 {
                    return Err(EncoderError::InsufficientData);
                }
                Ok(reader.get_f32_le())
            }
            TAG_F64 => {
                if reader.remaining() < 8 {
                    return Err(EncoderError::InsufficientData);
                }
                let wide = reader.get_f64_le();
                let narrow = wide as f32;
                if wide.is_nan() || narrow as f64 == wide {
                    Ok(narrow)
                } else {
                    Err(EncoderError::range(wide, "f32"))
                }
            }
            other => Err(EncoderError::Format(format!(
                "Expected f32/f64 tag ({} or {}) or an integer, got {}",
                TAG_F32, TAG_F64, other
            ))),
        }
    }
}

impl Classify for f64 {
    fn classify() -> Kind {
        Kind::Scalar(ScalarKind::F64)
    }
}

/// Encodes an `f64` as a tag and 8 bytes (little-endian IEEE 754).
impl Encoder for f64 {
    fn encode(&self, writer: &mut BytesMut, _handle: &Handle) -> Result<()> {
        writer.put_u8(TAG_F64);
        writer.put_f64_le(*self);
        Ok(())
    }
}

/// Decodes an `f64` from either width; `f32` widens losslessly. Integers are accepted when
/// exactly representable.
impl Decoder for f64 {
    fn decode(reader: &mut Bytes, _handle: &Handle) -> Result<Self> {
        if is_int_tag(peek_tag(reader)?) {
            return WireInt::decode(reader)?.to_f64();
        }
        match read_tag(reader)? {
            TAG_F32 => {
                if reader.remaining() < 4 {
                    return Err(EncoderError::InsufficientData);
                }
                Ok(reader.get_f32_le() as f64)
            }
            TAG_F64 => {
                if reader.remaining() < 8 {
                    return Err(EncoderError::InsufficientData);
                }
                Ok(reader.get_f64_le())
            }
            other => Err(EncoderError::Format(format!(
                "Expected f32/f64 tag ({} or {}) or an integer, got {}",
                TAG_F32, TAG_F64, other
            ))),
        }
    }
}

// --- String ---

impl Classify for String {
    fn classify() -> Kind {
        Kind::Scalar(ScalarKind::String)
    }
}

/// Encodes a `String` as UTF-8 with a length prefix (short strings use a single tag byte).
impl Encoder for String {
    fn encode(&self, writer: &mut BytesMut, _handle: &Handle) -> Result<()> {
        encode_str(self, writer);
        Ok(())
    }
}

pub(crate) fn encode_str(value: &str, writer: &mut BytesMut) {
    let len = value.len();
    let max_short = (TAG_STRING_LONG - TAG_STRING_BASE - 1) as usize;
    if len <= max_short {
        writer.put_u8(TAG_STRING_BASE + len as u8);
    } else {
        writer.put_u8(TAG_STRING_LONG);
        encode_unsigned(len as u128, writer);
    }
    writer.put_slice(value.as_bytes());
}

/// Reads a string header and returns the still unvalidated UTF-8 bytes.
///
/// Binary data is accepted too, as long as it turns out to be valid UTF-8.
fn read_str_bytes(reader: &mut Bytes) -> Result<Bytes> {
    let tag = read_tag(reader)?;
    if tag == TAG_BINARY {
        return read_binary_body(reader);
    }
    let len = if (TAG_STRING_BASE..TAG_STRING_LONG).contains(&tag) {
        (tag - TAG_STRING_BASE) as usize
    } else if tag == TAG_STRING_LONG {
        WireInt::decode(reader)?
            .narrow::<usize>("usize")
            .map_err(|_| EncoderError::Format("String length prefix is too large".to_string()))?
    } else {
        return Err(EncoderError::Format(format!(
            "Expected String tag ({}..={}) or Bytes tag ({}), got {}",
            TAG_STRING_BASE, TAG_STRING_LONG, TAG_BINARY, tag
        )));
    };
    take_bytes(reader, len)
}

impl Decoder for String {
    fn decode(reader: &mut Bytes, _handle: &Handle) -> Result<Self> {
        let bytes = read_str_bytes(reader)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| EncoderError::Format(e.to_string()))
    }

    /// Decodes into the existing buffer, keeping its allocation.
    fn decode_into(&mut self, reader: &mut Bytes, _handle: &Handle) -> Result<()> {
        let bytes = read_str_bytes(reader)?;
        let text = std::str::from_utf8(&bytes).map_err(|e| EncoderError::Format(e.to_string()))?;
        self.clear();
        self.push_str(text);
        Ok(())
    }
}

// --- Binary ---

pub(crate) fn encode_binary(data: &[u8], writer: &mut BytesMut) {
    writer.put_u8(TAG_BINARY);
    encode_unsigned(data.len() as u128, writer);
    writer.put_slice(data);
}

/// Reads the body of a binary value whose `TAG_BINARY` has already been consumed.
pub(crate) fn read_binary_body(reader: &mut Bytes) -> Result<Bytes> {
    let len = WireInt::decode(reader)?
        .narrow::<usize>("usize")
        .map_err(|_| EncoderError::Format("Binary length prefix is too large".to_string()))?;
    take_bytes(reader, len)
}

impl Classify for Bytes {
    fn classify() -> Kind {
        Kind::Scalar(ScalarKind::Bytes)
    }
}

/// Encodes `Bytes` as `TAG_BINARY`, a length and the raw bytes.
impl Encoder for Bytes {
    fn encode(&self, writer: &mut BytesMut, _handle: &Handle) -> Result<()> {
        encode_binary(self, writer);
        Ok(())
    }
}

/// Decodes `Bytes` without copying: the result shares the input buffer.
impl Decoder for Bytes {
    fn decode(reader: &mut Bytes, _handle: &Handle) -> Result<Self> {
        let tag = read_tag(reader)?;
        if tag != TAG_BINARY {
            return Err(EncoderError::Format(format!(
                "Expected Bytes tag ({}), got {}",
                TAG_BINARY, tag
            )));
        }
        read_binary_body(reader)
    }
}

// --- Sequence headers ---

/// Encodes the length for the sequence format.
#[inline(never)]
pub(crate) fn encode_seq_len(len: usize, writer: &mut BytesMut) {
    let max_short = (TAG_SEQ_LONG - TAG_SEQ_BASE - 1) as usize;
    if len <= max_short {
        writer.put_u8(TAG_SEQ_BASE + len as u8);
    } else {
        writer.put_u8(TAG_SEQ_LONG);
        encode_unsigned(len as u128, writer);
    }
}

/// Decodes the length for the sequence format; `tag` has already been read.
#[inline(never)]
pub(crate) fn decode_seq_len(tag: u8, reader: &mut Bytes) -> Result<usize> {
    if (TAG_SEQ_BASE..TAG_SEQ_LONG).contains(&tag) {
        Ok((tag - TAG_SEQ_BASE) as usize)
    } else if tag == TAG_SEQ_LONG {
        decode_len(reader)
    } else {
        Err(EncoderError::Format(format!(
            "Expected sequence tag ({}..={}), got {}",
            TAG_SEQ_BASE, TAG_SEQ_LONG, tag
        )))
    }
}

/// Decodes a length prefix.
pub(crate) fn decode_len(reader: &mut Bytes) -> Result<usize> {
    WireInt::decode(reader)?
        .narrow::<usize>("usize")
        .map_err(|_| EncoderError::Format("Length prefix is too large".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded<T: Encoder>(value: T) -> Bytes {
        let mut writer = BytesMut::new();
        value.encode(&mut writer, &Handle::default()).unwrap();
        writer.freeze()
    }

    #[test]
    fn test_compact_integer_widths() {
        assert_eq!(encoded(0u64).len(), 1);
        assert_eq!(encoded(127u64).len(), 1);
        assert_eq!(encoded(128u64).len(), 2);
        assert_eq!(encoded(383u64).len(), 2);
        assert_eq!(encoded(384u64).len(), 3);
        assert_eq!(encoded(u64::MAX).len(), 9);
        assert_eq!(encoded(u128::MAX).len(), 17);
        assert_eq!(encoded(-1i8).to_vec(), vec![TAG_NEGATIVE, 0]);
    }

    #[test]
    fn test_wire_int_display() {
        assert_eq!(WireInt::Unsigned(300).to_string(), "300");
        assert_eq!(WireInt::Negative(0).to_string(), "-1");
        assert_eq!(
            WireInt::Negative(u128::MAX).to_string(),
            "-340282366920938463463374607431768211456"
        );
    }

    #[test]
    fn test_signed_marker_is_transparent() {
        let mut bytes = Bytes::from_static(&[TAG_SIGNED, 5]);
        assert_eq!(u8::decode(&mut bytes, &Handle::default()).unwrap(), 5);
    }

    #[test]
    fn test_string_decode_into_keeps_buffer() {
        let mut dst = String::with_capacity(64);
        let mut bytes = encoded("hello".to_string());
        dst.decode_into(&mut bytes, &Handle::default()).unwrap();
        assert_eq!(dst, "hello");
        assert_eq!(dst.capacity(), 64);
    }

    #[test]
    fn test_truncated_string() {
        let mut bytes = Bytes::from_static(&[TAG_STRING_BASE + 4, b'a']);
        let err = String::decode(&mut bytes, &Handle::default()).unwrap_err();
        assert!(matches!(err, EncoderError::InsufficientData));
    }
}
