//! Sequences, maps and map-by-slice types.
//!
//! Every decoder here reads the container header first, asks the resolver in [`crate::target`]
//! which [`DecodePath`] to take, and only then touches the destination.

use crate::core::*;
use crate::kind::{Classify, Kind};
use crate::target::{resolve_map, resolve_sequence, DecodePath, DecodeTarget, Payload};
use crate::{Decoder, Encoder, EncoderError, Handle, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

/// A named sequence type that is written as a map of alternating keys and values.
///
/// Elements at even positions are keys and the element after each key is its value, so
/// `[k0, v0, k1, v1]` is written as the two-entry map `{k0: v0, k1: v1}`. Encoding a sequence of
/// odd length fails with [`EncoderError::OddSequenceLength`].
///
/// Implemented by `#[derive(Encode)]` with `#[senax(map_by_slice)]`:
///
/// ```rust
/// use senax_codec::{marshal, unmarshal, Decode, Encode, Handle, MapBySlice};
///
/// #[derive(Encode, Decode, Debug, PartialEq, Default)]
/// #[senax(map_by_slice)]
/// struct Pairs(Vec<String>);
///
/// let handle = Handle::default();
/// let pairs = Pairs(vec!["a".into(), "1".into(), "b".into(), "2".into()]);
/// let bytes = marshal(&pairs, &handle).unwrap();
///
/// let mut dst = Pairs::default();
/// unmarshal(bytes, &mut dst, &handle).unwrap();
/// assert_eq!(dst.items(), pairs.items());
/// ```
pub trait MapBySlice {
    type Item;

    fn items(&self) -> &[Self::Item];

    fn items_mut(&mut self) -> &mut Vec<Self::Item>;
}

/// How the elements of a sequence payload are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Items {
    /// Each element carries its own tag.
    Tagged,
    /// A `TAG_BINARY` body: one raw byte per `u8` element.
    Raw,
}

/// Reads a sequence header: nil, a tagged sequence, or binary data for `u8` elements.
///
/// The announced length is checked against the remaining input, so nothing is reserved for
/// elements that cannot be there.
pub(crate) fn read_sequence_header<T: 'static>(reader: &mut Bytes) -> Result<(Payload, Items)> {
    let tag = read_tag(reader)?;
    let (len, items) = match tag {
        TAG_NONE => return Ok((Payload::Nil, Items::Tagged)),
        TAG_BINARY => {
            if TypeId::of::<T>() != TypeId::of::<u8>() {
                return Err(EncoderError::Format(format!(
                    "Binary data cannot be decoded into a sequence of {}",
                    std::any::type_name::<T>()
                )));
            }
            (decode_len(reader)?, Items::Raw)
        }
        _ => (decode_seq_len(tag, reader)?, Items::Tagged),
    };
    if len > reader.remaining() {
        return Err(EncoderError::InsufficientData);
    }
    Ok((Payload::Items(len), items))
}

/// Moves a raw byte into a `u8` element.
fn raw_element<T: 'static>(byte: u8) -> Result<T> {
    let mut byte = Some(byte);
    (&mut byte as &mut dyn Any)
        .downcast_mut::<Option<T>>()
        .and_then(Option::take)
        .ok_or_else(|| {
            EncoderError::Format(format!(
                "Binary data cannot be decoded into {}",
                std::any::type_name::<T>()
            ))
        })
}

fn decode_element<T: Decoder + 'static>(
    items: Items,
    reader: &mut Bytes,
    handle: &Handle,
) -> Result<T> {
    match items {
        Items::Tagged => T::decode(reader, handle),
        Items::Raw => raw_element(reader.get_u8()),
    }
}

fn decode_slot<T: Decoder + 'static>(
    slot: &mut T,
    items: Items,
    reader: &mut Bytes,
    handle: &Handle,
) -> Result<()> {
    match items {
        Items::Tagged => slot.decode_into(reader, handle),
        Items::Raw => {
            *slot = raw_element(reader.get_u8())?;
            Ok(())
        }
    }
}

/// Decodes one element into each slot, reusing what the slots already hold.
fn decode_slots<T: Decoder + 'static>(
    slots: &mut [T],
    items: Items,
    reader: &mut Bytes,
    handle: &Handle,
) -> Result<()> {
    for slot in slots {
        decode_slot(slot, items, reader, handle)?;
    }
    Ok(())
}

/// Materializes a sequence payload in `dest` along a resolved path.
///
/// Existing slots are decoded with `into`; slots past the current length are created with
/// `fresh`.
pub(crate) fn fill_vec_with<T, I, F>(
    dest: &mut Vec<T>,
    path: DecodePath,
    payload: Payload,
    reader: &mut Bytes,
    handle: &Handle,
    mut into: I,
    mut fresh: F,
) -> Result<()>
where
    I: FnMut(&mut T, &mut Bytes) -> Result<()>,
    F: FnMut(&mut Bytes) -> Result<T>,
{
    match path {
        DecodePath::Nil => dest.clear(),
        DecodePath::NonAddressableFill => {
            for slot in dest.iter_mut() {
                into(slot, reader)?;
            }
        }
        DecodePath::ReuseCapacity | DecodePath::Grow => {
            let len = payload.len();
            dest.truncate(len);
            if path == DecodePath::Grow {
                dest.reserve((len - dest.len()).min(handle.max_init_len()));
            }
            for slot in dest.iter_mut() {
                into(slot, reader)?;
            }
            while dest.len() < len {
                dest.push(fresh(reader)?);
            }
        }
    }
    Ok(())
}

pub(crate) fn fill_vec<T: Decoder + 'static>(
    dest: &mut Vec<T>,
    path: DecodePath,
    payload: Payload,
    items: Items,
    reader: &mut Bytes,
    handle: &Handle,
) -> Result<()> {
    fill_vec_with(
        dest,
        path,
        payload,
        reader,
        handle,
        |slot, reader| decode_slot(slot, items, reader, handle),
        |reader| decode_element(items, reader, handle),
    )
}

pub(crate) fn decode_vec<T: Decoder + 'static>(
    dest: &mut Vec<T>,
    target: DecodeTarget,
    reader: &mut Bytes,
    handle: &Handle,
) -> Result<()> {
    let (payload, items) = read_sequence_header::<T>(reader)?;
    let path = resolve_sequence(target, payload)?;
    fill_vec(dest, path, payload, items, reader, handle)
}

/// Decodes a sequence payload into a slice the codec may not resize.
///
/// # Errors
/// Returns [`EncoderError::Addressability`] unless the payload has exactly `dest.len()` elements.
pub fn decode_slice_in_place<T: Decoder + 'static>(
    dest: &mut [T],
    reader: &mut Bytes,
    handle: &Handle,
) -> Result<()> {
    let (payload, items) = read_sequence_header::<T>(reader)?;
    resolve_sequence(DecodeTarget::NonAddressable { len: dest.len() }, payload)?;
    decode_slots(dest, items, reader, handle)
}

// --- Vec<T> ---

impl<T: Classify> Classify for Vec<T> {
    fn classify() -> Kind {
        Kind::sequence(T::classify())
    }
}

/// Encodes a `Vec<T>` as a length-prefixed sequence. `Vec<u8>` is written as binary.
impl<T: Encoder + 'static> Encoder for Vec<T> {
    fn encode(&self, writer: &mut BytesMut, handle: &Handle) -> Result<()> {
        if let Some(bytes) = (self as &dyn Any).downcast_ref::<Vec<u8>>() {
            encode_binary(bytes, writer);
            return Ok(());
        }
        encode_seq_len(self.len(), writer);
        for item in self {
            item.encode(writer, handle)?;
        }
        Ok(())
    }
}

/// Decodes a `Vec<T>`. A nil payload decodes to an empty vector; use `Option<Vec<T>>` to keep
/// nil apart from empty.
impl<T: Decoder + 'static> Decoder for Vec<T> {
    fn decode(reader: &mut Bytes, handle: &Handle) -> Result<Self> {
        let mut vec = Vec::new();
        decode_vec(&mut vec, DecodeTarget::Nil, reader, handle)?;
        Ok(vec)
    }

    fn decode_into(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        let target = DecodeTarget::of_vec(self);
        decode_vec(self, target, reader, handle)
    }

    fn decode_in_place(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        decode_slice_in_place(self, reader, handle)
    }
}

// --- Maps ---

/// The map operations the decoder needs, shared by every associative container.
pub(crate) trait MapStorage<K, V> {
    fn target(&self) -> DecodeTarget;

    fn slot(&mut self, key: &K) -> Option<&mut V>;

    fn put(&mut self, key: K, value: V);

    fn clear_entries(&mut self);

    fn reserve_entries(&mut self, additional: usize);
}

impl<K: Eq + Hash, V, S: BuildHasher> MapStorage<K, V> for HashMap<K, V, S> {
    fn target(&self) -> DecodeTarget {
        if self.capacity() == 0 {
            DecodeTarget::Fresh
        } else {
            DecodeTarget::Existing {
                len: self.len(),
                capacity: self.capacity(),
            }
        }
    }

    fn slot(&mut self, key: &K) -> Option<&mut V> {
        self.get_mut(key)
    }

    fn put(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn clear_entries(&mut self) {
        self.clear();
    }

    fn reserve_entries(&mut self, additional: usize) {
        self.reserve(additional);
    }
}

/// A `BTreeMap` has no spare capacity: every new entry allocates.
impl<K: Ord, V> MapStorage<K, V> for BTreeMap<K, V> {
    fn target(&self) -> DecodeTarget {
        if self.is_empty() {
            DecodeTarget::Fresh
        } else {
            DecodeTarget::Existing {
                len: self.len(),
                capacity: self.len(),
            }
        }
    }

    fn slot(&mut self, key: &K) -> Option<&mut V> {
        self.get_mut(key)
    }

    fn put(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn clear_entries(&mut self) {
        self.clear();
    }

    fn reserve_entries(&mut self, _additional: usize) {}
}

/// Reads a map header, checking the pair count against the remaining input.
pub(crate) fn read_map_header(reader: &mut Bytes) -> Result<Payload> {
    let tag = read_tag(reader)?;
    match tag {
        TAG_NONE => Ok(Payload::Nil),
        TAG_MAP => {
            let pairs = decode_len(reader)?;
            if pairs.saturating_mul(2) > reader.remaining() {
                return Err(EncoderError::InsufficientData);
            }
            Ok(Payload::Items(pairs))
        }
        other => Err(EncoderError::Format(format!(
            "Expected Map tag ({}), got {}",
            TAG_MAP, other
        ))),
    }
}

/// Decodes a map payload into `map`, merging with the entries it already holds.
///
/// A key already present has its value decoded in place, or replaced when
/// [`Handle::map_value_reset`] is set. Keys not on the wire are left untouched.
pub(crate) fn decode_map_entries<K, V, M>(
    map: &mut M,
    target: DecodeTarget,
    reader: &mut Bytes,
    handle: &Handle,
) -> Result<()>
where
    K: Decoder,
    V: Decoder,
    M: MapStorage<K, V>,
{
    let payload = read_map_header(reader)?;
    match resolve_map(target, payload)? {
        DecodePath::Nil => {
            map.clear_entries();
            return Ok(());
        }
        DecodePath::Grow => map.reserve_entries(payload.len().min(handle.max_init_len())),
        DecodePath::ReuseCapacity | DecodePath::NonAddressableFill => {}
    }
    for _ in 0..payload.len() {
        let key = K::decode(reader, handle)?;
        match map.slot(&key) {
            Some(existing) if handle.map_value_reset() => *existing = V::decode(reader, handle)?,
            Some(existing) => existing.decode_into(reader, handle)?,
            None => {
                let value = V::decode(reader, handle)?;
                map.put(key, value);
            }
        }
    }
    Ok(())
}

/// Writes `TAG_MAP`, the entry count and the entries.
///
/// With [`Handle::canonical`] the entries are sorted by their encoded key bytes.
pub(crate) fn encode_map_entries<'a, K, V, I>(
    len: usize,
    entries: I,
    writer: &mut BytesMut,
    handle: &Handle,
) -> Result<()>
where
    K: Encoder + 'a,
    V: Encoder + 'a,
    I: Iterator<Item = (&'a K, &'a V)>,
{
    writer.put_u8(TAG_MAP);
    encode_unsigned(len as u128, writer);
    if !handle.canonical() {
        for (key, value) in entries {
            key.encode(writer, handle)?;
            value.encode(writer, handle)?;
        }
        return Ok(());
    }

    let mut sorted = Vec::with_capacity(len);
    for (key, value) in entries {
        let mut key_bytes = BytesMut::new();
        key.encode(&mut key_bytes, handle)?;
        sorted.push((key_bytes, value));
    }
    sorted.sort_by(|a, b| a.0[..].cmp(&b.0[..]));
    for (key_bytes, value) in sorted {
        writer.put_slice(&key_bytes);
        value.encode(writer, handle)?;
    }
    Ok(())
}

// --- HashMap ---

impl<K: Classify, V: Classify, S> Classify for HashMap<K, V, S> {
    fn classify() -> Kind {
        Kind::associative(K::classify(), V::classify())
    }
}

impl<K: Encoder, V: Encoder, S> Encoder for HashMap<K, V, S> {
    fn encode(&self, writer: &mut BytesMut, handle: &Handle) -> Result<()> {
        encode_map_entries(self.len(), self.iter(), writer, handle)
    }
}

impl<K, V, S> Decoder for HashMap<K, V, S>
where
    K: Decoder + Eq + Hash,
    V: Decoder,
    S: BuildHasher + Default,
{
    fn decode(reader: &mut Bytes, handle: &Handle) -> Result<Self> {
        let mut map = HashMap::default();
        decode_map_entries(&mut map, DecodeTarget::Nil, reader, handle)?;
        Ok(map)
    }

    fn decode_into(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        let target = self.target();
        decode_map_entries(self, target, reader, handle)
    }

    fn decode_in_place(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        let target = DecodeTarget::NonAddressable { len: self.len() };
        decode_map_entries(self, target, reader, handle)
    }
}

// --- BTreeMap ---

impl<K: Classify, V: Classify> Classify for BTreeMap<K, V> {
    fn classify() -> Kind {
        Kind::associative(K::classify(), V::classify())
    }
}

impl<K: Encoder, V: Encoder> Encoder for BTreeMap<K, V> {
    fn encode(&self, writer: &mut BytesMut, handle: &Handle) -> Result<()> {
        encode_map_entries(self.len(), self.iter(), writer, handle)
    }
}

impl<K: Decoder + Ord, V: Decoder> Decoder for BTreeMap<K, V> {
    fn decode(reader: &mut Bytes, handle: &Handle) -> Result<Self> {
        let mut map = BTreeMap::new();
        decode_map_entries(&mut map, DecodeTarget::Nil, reader, handle)?;
        Ok(map)
    }

    fn decode_into(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        let target = self.target();
        decode_map_entries(self, target, reader, handle)
    }

    fn decode_in_place(&mut self, reader: &mut Bytes, handle: &Handle) -> Result<()> {
        let target = DecodeTarget::NonAddressable { len: self.len() };
        decode_map_entries(self, target, reader, handle)
    }
}

// --- Map by slice ---

/// Encodes a [`MapBySlice`] value as `TAG_MAP`, the pair count, then the elements in order.
///
/// Elements keep their sequence order even when [`Handle::canonical`] is set.
///
/// # Errors
/// Returns [`EncoderError::OddSequenceLength`] before writing anything if the sequence does not
/// consist of whole pairs.
pub fn encode_map_by_slice<M>(value: &M, writer: &mut BytesMut, handle: &Handle) -> Result<()>
where
    M: MapBySlice,
    M::Item: Encoder,
{
    let items = value.items();
    if items.len() % 2 != 0 {
        return Err(EncoderError::OddSequenceLength { len: items.len() });
    }
    writer.put_u8(TAG_MAP);
    encode_unsigned((items.len() / 2) as u128, writer);
    for item in items {
        item.encode(writer, handle)?;
    }
    Ok(())
}

/// Decodes into a [`MapBySlice`] value whose storage is described by `target`.
///
/// Accepts a map payload, flattened to `[k0, v0, k1, v1, ...]` in wire order, as well as a
/// plain sequence payload.
pub fn decode_map_by_slice<M>(
    value: &mut M,
    target: DecodeTarget,
    reader: &mut Bytes,
    handle: &Handle,
) -> Result<()>
where
    M: MapBySlice,
    M::Item: Decoder + 'static,
{
    let (payload, items) = if peek_tag(reader)? == TAG_MAP {
        reader.advance(1);
        let pairs = decode_len(reader)?;
        let len = pairs.checked_mul(2).ok_or_else(|| {
            EncoderError::Format(format!("Map entry count {} is too large", pairs))
        })?;
        if len > reader.remaining() {
            return Err(EncoderError::InsufficientData);
        }
        (Payload::Items(len), Items::Tagged)
    } else {
        read_sequence_header::<M::Item>(reader)?
    };
    let path = resolve_sequence(target, payload)?;
    fill_vec(value.items_mut(), path, payload, items, reader, handle)
}
