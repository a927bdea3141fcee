//! # senax-codec
//!
//! A container-aware binary codec for Rust, built on the senax tag scheme.
//!
//! - Encodes scalars, sequences (`Vec<T>`), maps (`HashMap`, `BTreeMap`, `IndexMap`), pointers
//!   (`Option`, `Box`, `Arc`) and the dynamic [`Value`] type
//! - Keeps nil and empty collections apart: `None::<Vec<T>>` and `Some(vec![])` encode differently
//! - Decodes into existing destinations, reusing their capacity instead of reallocating
//! - Decodes into non-addressable destinations, filling existing slots without resizing them
//! - Lets a named sequence type be written as a key/value map with `#[senax(map_by_slice)]`
//!
//! ## Entry points
//!
//! - [`marshal`] encodes a value (or a pointer to one) into [`Bytes`].
//! - [`unmarshal`] decodes into a destination the caller owns; the codec may grow, shrink or
//!   replace its storage.
//! - [`unmarshal_in_place`] and [`unmarshal_slice`] decode into a destination the codec may only
//!   fill element by element.
//!
//! ```rust
//! use senax_codec::{marshal, unmarshal, Handle};
//!
//! let handle = Handle::default();
//! let bytes = marshal(&vec![1i32, 2, 3], &handle).unwrap();
//!
//! let mut dst: Vec<i32> = Vec::with_capacity(8);
//! unmarshal(bytes, &mut dst, &handle).unwrap();
//! assert_eq!(dst, vec![1, 2, 3]);
//! assert_eq!(dst.capacity(), 8);
//! ```
//!
//! ## Attribute Macros
//!
//! `#[derive(Encode, Decode)]` is available for single-field newtypes:
//!
//! - Without attributes the newtype is encoded exactly like its field.
//! - `#[senax(map_by_slice)]` on a newtype over `Vec<T>` writes the elements pairwise as a map
//!   (`[k0, v0, k1, v1, ...]`). An odd number of elements is an encode error.
//!
//! ## Feature Flags
//!
//! - `indexmap`: Enables encoding/decoding of `IndexMap` as an associative container.

pub mod container;
pub mod core;
mod features;
mod handle;
pub mod kind;
mod pointer;
pub mod target;
pub mod value;

pub use bytes;
use bytes::{Bytes, BytesMut};
pub use container::MapBySlice;
pub use handle::{Handle, DEFAULT_MAX_DEPTH, DEFAULT_MAX_INIT_LEN};
pub use kind::{kind_of, Classify, Kind, ScalarKind};
pub use senax_codec_derive::{Decode, Encode};
pub use target::{DecodePath, DecodeTarget, Payload};
pub use value::{FloatKey, Value};

/// Errors that can occur during encoding or decoding operations.
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    /// The input is malformed: an unexpected tag, invalid UTF-8 or an unusable length prefix.
    #[error("Format error: {0}")]
    Format(String),
    /// The buffer did not contain enough data to complete the operation.
    #[error("Insufficient data in buffer")]
    InsufficientData,
    /// A decoded number does not fit the destination type.
    #[error("Value {value} out of range for {target}")]
    Range { value: String, target: &'static str },
    /// The type cannot be classified into anything the codec knows how to handle.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
    /// The payload would require resizing a destination the codec may only fill.
    #[error("Cannot fit {payload} decoded elements into a non-addressable destination of length {available}")]
    Addressability { payload: usize, available: usize },
    /// A map-by-slice sequence does not consist of whole key/value pairs.
    #[error("Map-by-slice sequence has odd length {len}")]
    OddSequenceLength { len: usize },
}

impl EncoderError {
    /// Returns true for errors caused by malformed or truncated input.
    pub fn is_format(&self) -> bool {
        matches!(self, EncoderError::Format(_) | EncoderError::InsufficientData)
    }

    pub(crate) fn range(value: impl std::fmt::Display, target: &'static str) -> Self {
        EncoderError::Range {
            value: value.to_string(),
            target,
        }
    }
}

/// The result type used throughout this crate for encode/decode operations.
pub type Result<T> = std::result::Result<T, EncoderError>;

/// Trait for types that can be encoded into the senax binary format.
///
/// Most users should use `#[derive(Encode)]` on newtypes, or rely on the provided
/// implementations for scalars, collections and pointers.
pub trait Encoder: Classify {
    /// Encode the value into the given buffer.
    ///
    /// # Arguments
    /// * `writer` - The buffer to write the encoded bytes into.
    /// * `handle` - Behavioural options, such as canonical map ordering.
    fn encode(&self, writer: &mut BytesMut, handle: &Handle) -> Result<()>;
}

/// Trait for types that can be decoded from the senax binary format.
///
/// The three methods correspond to the three kinds of destination a decode can target:
/// no destination at all, a destination the codec owns, and a destination it may only fill.
pub trait Decoder: Classify + Sized {
    /// Decode a fresh value.
    fn decode(reader: &mut Bytes, handle: &Handle) -> Result<Self>;

    /// Decode into an existing value, reusing its storage where possible.
    ///
    /// The default replaces `self` with a freshly decoded value.
    fn decode_into(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        *self = Self::decode(reader, handle)?;
        Ok(())
    }

    /// Decode into an existing value without resizing or replacing its storage.
    ///
    /// Scalars are single slots and simply take the decoded value. Containers only overwrite the
    /// elements they already hold and fail with [`EncoderError::Addressability`] otherwise.
    fn decode_in_place(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        self.decode_into(reader, handle)
    }
}

/// Encodes a value into bytes.
///
/// The type is classified (and the classification validated) before anything is written, so an
/// unsupported type never produces partial output.
///
/// # Example
/// ```rust
/// use senax_codec::{marshal, unmarshal, Handle};
///
/// let handle = Handle::default();
/// let nil: Option<Vec<u8>> = None;
/// let empty: Option<Vec<u8>> = Some(Vec::new());
/// assert_ne!(marshal(&nil, &handle).unwrap(), marshal(&empty, &handle).unwrap());
/// ```
pub fn marshal<T: Encoder + 'static>(value: &T, handle: &Handle) -> Result<Bytes> {
    kind_of::<T>()?;
    let mut writer = BytesMut::new();
    value.encode(&mut writer, handle)?;
    Ok(writer.freeze())
}

/// Decodes bytes into a destination the caller owns.
///
/// The destination may be grown, truncated or replaced. Decoding through a pointer (`Box<T>`,
/// `Option<T>`) behaves exactly like decoding into the pointee.
///
/// # Example
/// ```rust
/// use senax_codec::{marshal, unmarshal, Handle};
///
/// let handle = Handle::default();
/// let bytes = marshal(&None::<Vec<i32>>, &handle).unwrap();
/// let mut dst: Option<Vec<i32>> = Some(Vec::new());
/// unmarshal(bytes, &mut dst, &handle).unwrap();
/// assert_eq!(dst, None);
/// ```
pub fn unmarshal<T: Decoder + 'static>(data: Bytes, dest: &mut T, handle: &Handle) -> Result<()> {
    kind_of::<T>()?;
    let mut reader = data;
    dest.decode_into(&mut reader, handle)
}

/// Decodes bytes into a destination the codec may fill but not resize or replace.
///
/// Sequences must already have exactly as many elements as the payload carries.
pub fn unmarshal_in_place<T: Decoder + 'static>(
    data: Bytes,
    dest: &mut T,
    handle: &Handle,
) -> Result<()> {
    kind_of::<T>()?;
    let mut reader = data;
    dest.decode_in_place(&mut reader, handle)
}

/// Decodes a sequence payload into a borrowed slice, one element per slot.
pub fn unmarshal_slice<T: Decoder + 'static>(
    data: Bytes,
    dest: &mut [T],
    handle: &Handle,
) -> Result<()> {
    kind_of::<Vec<T>>()?;
    let mut reader = data;
    container::decode_slice_in_place(dest, &mut reader, handle)
}

/// Convenience function to decode a fresh value from bytes.
///
/// # Example
/// ```rust
/// use senax_codec::{decode, marshal, Handle};
/// use std::collections::HashMap;
///
/// let handle = Handle::default();
/// let map: HashMap<String, u8> = [("a".to_string(), 0), ("b".to_string(), 33)].into();
/// let mut bytes = marshal(&map, &handle).unwrap();
/// let decoded: HashMap<String, u8> = decode(&mut bytes, &handle).unwrap();
/// assert_eq!(map, decoded);
/// ```
pub fn decode<T: Decoder + 'static>(reader: &mut Bytes, handle: &Handle) -> Result<T> {
    kind_of::<T>()?;
    T::decode(reader, handle)
}
