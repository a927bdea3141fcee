//! Type classification.
//!
//! Every encodable type reports a [`Kind`]: a closed description of how it is laid out on the
//! wire. Classification depends only on the type, so [`kind_of`] computes it once per type and
//! serves later calls from a process-wide cache.

use crate::{EncoderError, Result};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};
use tracing::trace;

/// Primitive leaf types handled by the scalar codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
    String,
    Bytes,
}

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::I128 => "i128",
            ScalarKind::Isize => "isize",
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::U128 => "u128",
            ScalarKind::Usize => "usize",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::String => "string",
            ScalarKind::Bytes => "bytes",
        }
    }
}

/// How a type is laid out on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A primitive leaf.
    Scalar(ScalarKind),
    /// The dynamic [`Value`](crate::Value) type; the wire tag decides its shape.
    Dynamic,
    /// A nullable or boxed indirection to another kind.
    Pointer(Box<Kind>),
    /// A sequence of elements.
    Sequence(Box<Kind>),
    /// A map from keys to values.
    Associative(Box<Kind>, Box<Kind>),
    /// A flat sequence written as a map of alternating keys and values.
    MapBySlice(Box<Kind>),
}

impl Kind {
    pub fn pointer(inner: Kind) -> Self {
        Kind::Pointer(Box::new(inner))
    }

    pub fn sequence(elem: Kind) -> Self {
        Kind::Sequence(Box::new(elem))
    }

    pub fn associative(key: Kind, value: Kind) -> Self {
        Kind::Associative(Box::new(key), Box::new(value))
    }

    pub fn map_by_slice(elem: Kind) -> Self {
        Kind::MapBySlice(Box::new(elem))
    }

    /// The kind behind any number of pointer layers.
    pub fn deref(&self) -> &Kind {
        let mut kind = self;
        while let Kind::Pointer(inner) = kind {
            kind = inner;
        }
        kind
    }

    /// True for sequences, maps and map-by-slice types, looking through pointers.
    pub fn is_container(&self) -> bool {
        matches!(
            self.deref(),
            Kind::Sequence(_) | Kind::Associative(..) | Kind::MapBySlice(_)
        )
    }

    /// Checks the structural rules a classification must satisfy before any bytes move.
    ///
    /// Map keys must be scalars, dynamic values, or pointers to those.
    pub fn validate(&self) -> Result<()> {
        match self {
            Kind::Scalar(_) | Kind::Dynamic => Ok(()),
            Kind::Pointer(inner) | Kind::Sequence(inner) | Kind::MapBySlice(inner) => {
                inner.validate()
            }
            Kind::Associative(key, value) => {
                if key.is_container() {
                    return Err(EncoderError::UnsupportedType(format!(
                        "{} cannot be used as a map key in {}",
                        key, self
                    )));
                }
                key.validate()?;
                value.validate()
            }
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Scalar(scalar) => f.write_str(scalar.name()),
            Kind::Dynamic => f.write_str("any"),
            Kind::Pointer(inner) => write!(f, "*{}", inner),
            Kind::Sequence(elem) => write!(f, "[]{}", elem),
            Kind::Associative(key, value) => write!(f, "map[{}]{}", key, value),
            Kind::MapBySlice(elem) => write!(f, "mapbyslice[]{}", elem),
        }
    }
}

/// Reports the [`Kind`] of a type.
///
/// Implemented for every type the codec supports. `#[derive(Encode)]` implements it for
/// newtypes.
pub trait Classify {
    fn classify() -> Kind;
}

fn classification_cache() -> &'static RwLock<HashMap<TypeId, Arc<Kind>>> {
    static CLASSIFICATIONS: OnceLock<RwLock<HashMap<TypeId, Arc<Kind>>>> = OnceLock::new();
    CLASSIFICATIONS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Returns the validated classification of `T`, computing it on first use.
///
/// Concurrent first calls may both classify the type; the results are identical, and the first
/// one stored wins.
///
/// # Errors
/// Returns [`EncoderError::UnsupportedType`] if the classification breaks a structural rule.
pub fn kind_of<T: Classify + 'static>() -> Result<Arc<Kind>> {
    let id = TypeId::of::<T>();
    if let Some(kind) = classification_cache()
        .read()
        .ok()
        .and_then(|map| map.get(&id).cloned())
    {
        return Ok(kind);
    }

    let kind = T::classify();
    kind.validate()?;
    trace!(kind = %kind, type_name = std::any::type_name::<T>(), "classified type");
    let kind = Arc::new(kind);
    if let Ok(mut map) = classification_cache().write() {
        return Ok(map.entry(id).or_insert(kind).clone());
    }
    Ok(kind)
}
