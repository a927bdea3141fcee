#[cfg(feature = "indexmap")]
mod index_map {
    use crate::container::{decode_map_entries, encode_map_entries, MapStorage};
    use crate::kind::{Classify, Kind};
    use crate::target::DecodeTarget;
    use crate::{Decoder, Encoder, Handle, Result};
    use bytes::{Bytes, BytesMut};
    use indexmap::IndexMap;
    use std::hash::{BuildHasher, Hash};

    impl<K: Eq + Hash, V, S: BuildHasher> MapStorage<K, V> for IndexMap<K, V, S> {
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

    impl<K: Classify, V: Classify, S> Classify for IndexMap<K, V, S> {
        fn classify() -> Kind {
            Kind::associative(K::classify(), V::classify())
        }
    }

    /// Entries are written in insertion order unless the handle asks for canonical order.
    impl<K: Encoder, V: Encoder, S> Encoder for IndexMap<K, V, S> {
        fn encode(&self, writer: &mut BytesMut, handle: &Handle) -> Result<()> {
            encode_map_entries(self.len(), self.iter(), writer, handle)
        }
    }

    /// New keys are appended in wire order after the entries already present.
    impl<K, V, S> Decoder for IndexMap<K, V, S>
    where
        K: Decoder + Eq + Hash,
        V: Decoder,
        S: BuildHasher + Default,
    {
        fn decode(reader: &mut Bytes, handle: &Handle) -> Result<Self> {
            let mut map = IndexMap::default();
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
}
