//! Pointer-like wrappers: `Option<T>` is a nullable pointer, `Box<T>` and `Arc<T>` always point
//! somewhere. Decoding through any of them behaves exactly like decoding into the pointee.

use crate::core::{peek_tag, take_nil, TAG_NONE};
use crate::kind::{Classify, Kind};
use crate::{Decoder, Encoder, EncoderError, Handle, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::sync::Arc;

// --- Option ---

impl<T: Classify> Classify for Option<T> {
    fn classify() -> Kind {
        Kind::pointer(T::classify())
    }
}

/// Encodes `None` as `TAG_NONE` and `Some(value)` exactly like `value`.
///
/// Nested options flatten: `Some(None::<T>)` and `None::<Option<T>>` encode the same way.
impl<T: Encoder> Encoder for Option<T> {
    fn encode(&self, writer: &mut BytesMut, handle: &Handle) -> Result<()> {
        match self {
            Some(value) => value.encode(writer, handle),
            None => {
                writer.put_u8(TAG_NONE);
                Ok(())
            }
        }
    }
}

impl<T: Decoder> Decoder for Option<T> {
    fn decode(reader: &mut Bytes, handle: &Handle) -> Result<Self> {
        if take_nil(reader)? {
            return Ok(None);
        }
        Ok(Some(T::decode(reader, handle)?))
    }

    /// A nil payload sets `self` to `None`. Anything else decodes into the existing pointee, or
    /// allocates one.
    fn decode_into(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        if take_nil(reader)? {
            *self = None;
            return Ok(());
        }
        match self {
            Some(inner) => inner.decode_into(reader, handle),
            None => {
                *self = Some(T::decode(reader, handle)?);
                Ok(())
            }
        }
    }

    /// The pointer itself is never changed: a present pointee is filled in place, and a value
    /// aimed at `None` is an [`EncoderError::Addressability`] error.
    fn decode_in_place(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        match self {
            Some(inner) => inner.decode_in_place(reader, handle),
            None if peek_tag(reader)? == TAG_NONE => take_nil(reader).map(|_| ()),
            None => Err(EncoderError::Addressability {
                payload: 1,
                available: 0,
            }),
        }
    }
}

// --- Box ---

impl<T: Classify> Classify for Box<T> {
    fn classify() -> Kind {
        Kind::pointer(T::classify())
    }
}

impl<T: Encoder> Encoder for Box<T> {
    fn encode(&self, writer: &mut BytesMut, handle: &Handle) -> Result<()> {
        (**self).encode(writer, handle)
    }
}

impl<T: Decoder> Decoder for Box<T> {
    fn decode(reader: &mut Bytes, handle: &Handle) -> Result<Self> {
        Ok(Box::new(T::decode(reader, handle)?))
    }

    fn decode_into(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        (**self).decode_into(reader, handle)
    }

    fn decode_in_place(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        (**self).decode_in_place(reader, handle)
    }
}

// --- Arc ---

impl<T: Classify> Classify for Arc<T> {
    fn classify() -> Kind {
        Kind::pointer(T::classify())
    }
}

impl<T: Encoder> Encoder for Arc<T> {
    fn encode(&self, writer: &mut BytesMut, handle: &Handle) -> Result<()> {
        (**self).encode(writer, handle)
    }
}

/// A uniquely held `Arc` is decoded through like a `Box`. A shared one is replaced when owned and
/// cannot be written in place.
impl<T: Decoder> Decoder for Arc<T> {
    fn decode(reader: &mut Bytes, handle: &Handle) -> Result<Self> {
        Ok(Arc::new(T::decode(reader, handle)?))
    }

    fn decode_into(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        match Arc::get_mut(self) {
            Some(inner) => inner.decode_into(reader, handle),
            None => {
                *self = Arc::new(T::decode(reader, handle)?);
                Ok(())
            }
        }
    }

    fn decode_in_place(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        match Arc::get_mut(self) {
            Some(inner) => inner.decode_in_place(reader, handle),
            None => Err(EncoderError::Addressability {
                payload: 1,
                available: 0,
            }),
        }
    }
}
