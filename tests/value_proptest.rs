//! Property-based tests for dynamic values and container decode paths.

use proptest::prelude::*;
use senax_codec::{decode, marshal, unmarshal, unmarshal_in_place, Handle, Value};
use std::collections::HashMap;

/// Strategy for generating arbitrary `Value` instances.
fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Nil),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<u64>().prop_map(Value::Uint),
        // Floats compare by bit pattern, so NaN is fine here
        any::<f32>().prop_map(Value::Float32),
        any::<f64>().prop_map(Value::Float64),
        ".*".prop_map(Value::String),
        prop::collection::vec(any::<u8>(), 0..100).prop_map(Value::Bytes),
    ];

    leaf.prop_recursive(
        3,  // depth
        64, // size
        10, // items per collection
        |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..10).prop_map(Value::Seq),
                prop::collection::vec((inner.clone(), inner), 0..10).prop_map(Value::Map),
            ]
        },
    )
}

proptest! {
    #[test]
    fn value_round_trip(value in arb_value()) {
        let handle = Handle::default();
        let mut bytes = marshal(&value, &handle).expect("encode should succeed");
        let decoded: Value = decode(&mut bytes, &handle).expect("decode should succeed");
        prop_assert_eq!(decoded, value);
        prop_assert!(bytes.is_empty());
    }

    #[test]
    fn value_decode_into_any_destination(value in arb_value(), previous in arb_value()) {
        let handle = Handle::default();
        let bytes = marshal(&value, &handle).expect("encode should succeed");
        let mut dst = previous;
        unmarshal(bytes, &mut dst, &handle).expect("decode should succeed");
        prop_assert_eq!(dst, value);
    }

    #[test]
    fn canonical_encoding_ignores_insertion_order(
        entries in prop::collection::hash_map("[a-z]{0,8}", any::<i32>(), 0..20)
    ) {
        let handle = Handle::new().with_canonical(true);
        let forward: HashMap<String, i32> = entries.clone();
        let mut backward: HashMap<String, i32> = HashMap::with_capacity(entries.len() * 4);
        let mut pairs: Vec<_> = entries.into_iter().collect();
        pairs.reverse();
        backward.extend(pairs);
        prop_assert_eq!(
            marshal(&forward, &handle).expect("encode should succeed"),
            marshal(&backward, &handle).expect("encode should succeed")
        );
    }

    #[test]
    fn vec_decode_matches_source_for_any_destination(
        src in prop::collection::vec(any::<i64>(), 0..40),
        existing in prop::collection::vec(any::<i64>(), 0..40),
        spare in 0usize..16,
    ) {
        let handle = Handle::default();
        let bytes = marshal(&src, &handle).expect("encode should succeed");
        let mut dst = Vec::with_capacity(existing.len() + spare);
        dst.extend_from_slice(&existing);
        let capacity = dst.capacity();
        let ptr = dst.as_ptr();
        unmarshal(bytes, &mut dst, &handle).expect("decode should succeed");
        prop_assert_eq!(&dst, &src);
        if src.len() <= capacity {
            prop_assert_eq!(dst.as_ptr(), ptr);
        }
    }

    #[test]
    fn non_addressable_decode_requires_matching_length(
        src in prop::collection::vec(any::<u16>(), 0..20),
        len in 0usize..20,
    ) {
        let handle = Handle::default();
        let bytes = marshal(&src, &handle).expect("encode should succeed");
        let mut dst = vec![0u16; len];
        let result = unmarshal_in_place(bytes, &mut dst, &handle);
        if len == src.len() {
            prop_assert!(result.is_ok());
            prop_assert_eq!(&dst, &src);
        } else {
            prop_assert!(result.is_err());
            prop_assert_eq!(dst, vec![0u16; len]);
        }
    }
}
