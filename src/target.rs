//! Decode destinations and the paths taken to fill them.
//!
//! Container decoders describe their destination as a [`DecodeTarget`], read the container
//! header into a [`Payload`], and ask [`resolve_sequence`] or [`resolve_map`] which
//! [`DecodePath`] to take before touching any storage.

use crate::{EncoderError, Result};
use tracing::trace;

/// The state of a decode destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeTarget {
    /// No destination exists yet; one will be created.
    Nil,
    /// An empty destination without allocated storage.
    Fresh,
    /// A destination the codec owns, with its current length and capacity.
    Existing { len: usize, capacity: usize },
    /// A destination the codec may fill slot by slot but not resize or replace.
    NonAddressable { len: usize },
}

impl DecodeTarget {
    /// Describes an owned `Vec` destination.
    pub fn of_vec<T>(vec: &Vec<T>) -> Self {
        if vec.capacity() == 0 {
            DecodeTarget::Fresh
        } else {
            DecodeTarget::Existing {
                len: vec.len(),
                capacity: vec.capacity(),
            }
        }
    }

    /// Number of elements the destination already holds.
    pub fn len(&self) -> usize {
        match *self {
            DecodeTarget::Nil | DecodeTarget::Fresh => 0,
            DecodeTarget::Existing { len, .. } | DecodeTarget::NonAddressable { len } => len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a container header announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// An encoded nil collection.
    Nil,
    /// A present collection with this many elements (or entries, for maps).
    Items(usize),
}

impl Payload {
    pub fn len(&self) -> usize {
        match *self {
            Payload::Nil => 0,
            Payload::Items(n) => n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How the decoder materializes the payload in the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePath {
    /// Leave the destination nil, or empty it.
    Nil,
    /// The payload fits in the storage already allocated.
    ReuseCapacity,
    /// The destination needs more storage.
    Grow,
    /// Overwrite the destination's existing slots only.
    NonAddressableFill,
}

/// Chooses the decode path for a sequence destination.
///
/// # Errors
/// Returns [`EncoderError::Addressability`] when a non-addressable destination's length differs
/// from the payload length, since filling it would require resizing it.
pub fn resolve_sequence(target: DecodeTarget, payload: Payload) -> Result<DecodePath> {
    let path = match (target, payload) {
        (DecodeTarget::NonAddressable { len }, payload) => {
            if payload.len() != len {
                return Err(EncoderError::Addressability {
                    payload: payload.len(),
                    available: len,
                });
            }
            DecodePath::NonAddressableFill
        }
        (_, Payload::Nil) => DecodePath::Nil,
        (DecodeTarget::Nil | DecodeTarget::Fresh, Payload::Items(0)) => DecodePath::ReuseCapacity,
        (DecodeTarget::Nil | DecodeTarget::Fresh, Payload::Items(_)) => DecodePath::Grow,
        (DecodeTarget::Existing { capacity, .. }, Payload::Items(n)) if n <= capacity => {
            DecodePath::ReuseCapacity
        }
        (DecodeTarget::Existing { .. }, Payload::Items(_)) => DecodePath::Grow,
    };
    trace!(?target, ?payload, ?path, "resolved sequence decode path");
    Ok(path)
}

/// Chooses the decode path for a map destination.
///
/// Decoded entries are merged into whatever the map already holds, so a non-addressable map can
/// take any number of entries. It cannot be emptied by a nil payload, though.
///
/// # Errors
/// Returns [`EncoderError::Addressability`] for a nil payload aimed at a non-empty,
/// non-addressable map.
pub fn resolve_map(target: DecodeTarget, payload: Payload) -> Result<DecodePath> {
    let path = match (target, payload) {
        (DecodeTarget::NonAddressable { len }, Payload::Nil) => {
            if len != 0 {
                return Err(EncoderError::Addressability {
                    payload: 0,
                    available: len,
                });
            }
            DecodePath::NonAddressableFill
        }
        (DecodeTarget::NonAddressable { .. }, Payload::Items(_)) => DecodePath::NonAddressableFill,
        (_, Payload::Nil) => DecodePath::Nil,
        (DecodeTarget::Nil | DecodeTarget::Fresh, Payload::Items(0)) => DecodePath::ReuseCapacity,
        (DecodeTarget::Nil | DecodeTarget::Fresh, Payload::Items(_)) => DecodePath::Grow,
        (DecodeTarget::Existing { len, capacity }, Payload::Items(n))
            if len.saturating_add(n) <= capacity =>
        {
            DecodePath::ReuseCapacity
        }
        (DecodeTarget::Existing { .. }, Payload::Items(_)) => DecodePath::Grow,
    };
    trace!(?target, ?payload, ?path, "resolved map decode path");
    Ok(path)
}
