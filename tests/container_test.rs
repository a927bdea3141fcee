use senax_codec::{
    marshal, unmarshal, unmarshal_in_place, unmarshal_slice, EncoderError, Handle, Value,
};
use std::collections::{BTreeMap, HashMap};

fn handle() -> Handle {
    Handle::default()
}

/// Generates the same decode scenarios for every element type.
macro_rules! container_suite {
    ($($name:ident: $ty:ty => $make:expr;)*) => {
        $(
            mod $name {
                use super::*;

                fn make(i: usize) -> $ty {
                    ($make)(i)
                }

                fn sample(n: usize) -> Vec<$ty> {
                    (0..n).map(make).collect()
                }

                fn sample_map(n: usize) -> HashMap<String, $ty> {
                    (0..n).map(|i| (format!("k{}", i), make(i))).collect()
                }

                #[test]
                fn vec_into_fresh() {
                    let src = sample(3);
                    let mut dst: Vec<$ty> = Vec::new();
                    unmarshal(marshal(&src, &handle()).unwrap(), &mut dst, &handle()).unwrap();
                    assert_eq!(dst, src);
                }

                #[test]
                fn vec_into_len1_cap1_grows() {
                    let src = sample(5);
                    let mut dst: Vec<$ty> = Vec::with_capacity(1);
                    dst.push(make(9));
                    unmarshal(marshal(&src, &handle()).unwrap(), &mut dst, &handle()).unwrap();
                    assert_eq!(dst, src);
                }

                #[test]
                fn vec_into_exact_reuses_slots() {
                    let src = sample(3);
                    let mut dst: Vec<$ty> = Vec::with_capacity(3);
                    dst.extend((10..13).map(make));
                    let ptr = dst.as_ptr();
                    let capacity = dst.capacity();
                    unmarshal(marshal(&src, &handle()).unwrap(), &mut dst, &handle()).unwrap();
                    assert_eq!(dst, src);
                    assert_eq!(dst.as_ptr(), ptr);
                    assert_eq!(dst.capacity(), capacity);
                }

                #[test]
                fn vec_into_spare_capacity() {
                    let src = sample(3);
                    let mut dst: Vec<$ty> = Vec::with_capacity(16);
                    dst.push(make(9));
                    let ptr = dst.as_ptr();
                    let capacity = dst.capacity();
                    unmarshal(marshal(&src, &handle()).unwrap(), &mut dst, &handle()).unwrap();
                    assert_eq!(dst, src);
                    assert_eq!(dst.as_ptr(), ptr);
                    assert_eq!(dst.capacity(), capacity);
                }

                #[test]
                fn vec_into_longer_truncates() {
                    let src = sample(2);
                    let mut dst = sample(6);
                    unmarshal(marshal(&src, &handle()).unwrap(), &mut dst, &handle()).unwrap();
                    assert_eq!(dst, src);
                }

                #[test]
                fn vec_nil_payload_empties_owned() {
                    let mut dst = sample(2);
                    let bytes = marshal(&None::<Vec<$ty>>, &handle()).unwrap();
                    unmarshal(bytes, &mut dst, &handle()).unwrap();
                    assert!(dst.is_empty());
                }

                #[test]
                fn vec_non_addressable_exact() {
                    let src = sample(3);
                    let mut dst: Vec<$ty> = (10..13).map(make).collect();
                    unmarshal_in_place(marshal(&src, &handle()).unwrap(), &mut dst, &handle())
                        .unwrap();
                    assert_eq!(dst, src);
                }

                #[test]
                fn vec_non_addressable_too_short() {
                    let src = sample(3);
                    let mut dst = vec![make(9)];
                    let err = unmarshal_in_place(
                        marshal(&src, &handle()).unwrap(),
                        &mut dst,
                        &handle(),
                    )
                    .unwrap_err();
                    assert!(matches!(
                        err,
                        EncoderError::Addressability { payload: 3, available: 1 }
                    ));
                    assert_eq!(dst, vec![make(9)]);
                }

                #[test]
                fn slice_non_addressable() {
                    let src = sample(3);
                    let mut dst = [make(10), make(11), make(12)];
                    unmarshal_slice(marshal(&src, &handle()).unwrap(), &mut dst[..], &handle())
                        .unwrap();
                    assert_eq!(dst.to_vec(), src);

                    let err = unmarshal_slice(
                        marshal(&sample(4), &handle()).unwrap(),
                        &mut dst[..],
                        &handle(),
                    )
                    .unwrap_err();
                    assert!(matches!(err, EncoderError::Addressability { .. }));
                }

                #[test]
                fn vec_through_box() {
                    let src = sample(4);
                    let mut dst: Box<Vec<$ty>> = Box::new(Vec::with_capacity(8));
                    let capacity = dst.capacity();
                    unmarshal(marshal(&Box::new(src.clone()), &handle()).unwrap(), &mut dst, &handle())
                        .unwrap();
                    assert_eq!(*dst, src);
                    assert_eq!(dst.capacity(), capacity);
                }

                #[test]
                fn vec_through_nested_pointers() {
                    let src = sample(2);
                    let mut dst: Option<Box<Vec<$ty>>> = Some(Box::new(Vec::with_capacity(4)));
                    unmarshal(marshal(&src, &handle()).unwrap(), &mut dst, &handle()).unwrap();
                    assert_eq!(dst.as_deref(), Some(&src));
                }

                #[test]
                fn nil_into_some_empty_is_none() {
                    let bytes = marshal(&None::<Vec<$ty>>, &handle()).unwrap();
                    let mut dst: Option<Vec<$ty>> = Some(Vec::new());
                    unmarshal(bytes, &mut dst, &handle()).unwrap();
                    assert_eq!(dst, None);
                }

                #[test]
                fn empty_into_none_is_some_empty() {
                    let bytes = marshal(&Some(Vec::<$ty>::new()), &handle()).unwrap();
                    let mut dst: Option<Vec<$ty>> = None;
                    unmarshal(bytes, &mut dst, &handle()).unwrap();
                    assert_eq!(dst, Some(Vec::new()));
                }

                #[test]
                fn option_some_reuses_capacity() {
                    let src = sample(3);
                    let mut dst: Option<Vec<$ty>> = Some(Vec::with_capacity(8));
                    let capacity = dst.as_ref().map(Vec::capacity);
                    unmarshal(marshal(&Some(src.clone()), &handle()).unwrap(), &mut dst, &handle())
                        .unwrap();
                    assert_eq!(dst.as_ref(), Some(&src));
                    assert_eq!(dst.as_ref().map(Vec::capacity), capacity);
                }

                #[test]
                fn map_into_fresh() {
                    let src = sample_map(3);
                    let mut dst: HashMap<String, $ty> = HashMap::new();
                    unmarshal(marshal(&src, &handle()).unwrap(), &mut dst, &handle()).unwrap();
                    assert_eq!(dst, src);
                }

                #[test]
                fn map_merges_into_existing() {
                    let src = sample_map(2);
                    let mut dst: HashMap<String, $ty> = HashMap::with_capacity(8);
                    dst.insert("k0".to_string(), make(9));
                    dst.insert("other".to_string(), make(7));
                    unmarshal(marshal(&src, &handle()).unwrap(), &mut dst, &handle()).unwrap();
                    assert_eq!(dst.len(), 3);
                    assert_eq!(dst["k0"], make(0));
                    assert_eq!(dst["k1"], make(1));
                    assert_eq!(dst["other"], make(7));
                }

                #[test]
                fn map_non_addressable_receives_entries() {
                    let src = sample_map(2);
                    let mut dst: HashMap<String, $ty> = HashMap::new();
                    unmarshal_in_place(marshal(&src, &handle()).unwrap(), &mut dst, &handle())
                        .unwrap();
                    assert_eq!(dst, src);
                }

                #[test]
                fn map_non_addressable_cannot_be_nilled() {
                    let mut dst = sample_map(1);
                    let bytes = marshal(&None::<HashMap<String, $ty>>, &handle()).unwrap();
                    let err = unmarshal_in_place(bytes, &mut dst, &handle()).unwrap_err();
                    assert!(matches!(err, EncoderError::Addressability { .. }));
                    assert_eq!(dst, sample_map(1));
                }

                #[test]
                fn map_nil_vs_empty() {
                    let bytes = marshal(&None::<HashMap<String, $ty>>, &handle()).unwrap();
                    let mut dst = Some(sample_map(2));
                    unmarshal(bytes, &mut dst, &handle()).unwrap();
                    assert_eq!(dst, None);

                    let bytes = marshal(&Some(HashMap::<String, $ty>::new()), &handle()).unwrap();
                    unmarshal(bytes, &mut dst, &handle()).unwrap();
                    assert_eq!(dst, Some(HashMap::new()));
                }

                #[test]
                fn map_through_box() {
                    let src = sample_map(3);
                    let mut dst: Box<HashMap<String, $ty>> = Box::default();
                    unmarshal(marshal(&src, &handle()).unwrap(), &mut dst, &handle()).unwrap();
                    assert_eq!(*dst, src);
                }

                #[test]
                fn btree_map_round_trip() {
                    let src: BTreeMap<String, $ty> = sample_map(4).into_iter().collect();
                    let mut dst: BTreeMap<String, $ty> = BTreeMap::new();
                    unmarshal(marshal(&src, &handle()).unwrap(), &mut dst, &handle()).unwrap();
                    assert_eq!(dst, src);
                }
            }
        )*
    };
}

container_suite! {
    elem_i8: i8 => |i: usize| i as i8 - 3;
    elem_i16: i16 => |i: usize| (i as i16 - 3) * 300;
    elem_i32: i32 => |i: usize| (i as i32 - 3) * 70_000;
    elem_i64: i64 => |i: usize| (i as i64 - 3) * 5_000_000_000;
    elem_u8: u8 => |i: usize| (i as u8).wrapping_mul(19);
    elem_u16: u16 => |i: usize| i as u16 * 1000;
    elem_u32: u32 => |i: usize| i as u32 * 100_000;
    elem_u64: u64 => |i: usize| i as u64 * u32::MAX as u64;
    elem_f32: f32 => |i: usize| i as f32 * 0.5 - 1.0;
    elem_f64: f64 => |i: usize| i as f64 * 0.25 - 1.0;
    elem_bool: bool => |i: usize| i % 2 == 0;
    elem_string: String => |i: usize| format!("s{}", i);
    elem_value: Value => |i: usize| Value::Int(i as i64 - 2);
    elem_nested: Vec<u16> => |i: usize| vec![i as u16; i];
}

#[test]
fn test_string_u8_map_destinations() {
    let handle = handle();
    let src: HashMap<String, u8> = [("a".to_string(), 0), ("b".to_string(), 33)].into();
    let bytes = marshal(&src, &handle).unwrap();

    let mut fresh: HashMap<String, u8> = HashMap::new();
    unmarshal(bytes.clone(), &mut fresh, &handle).unwrap();
    assert_eq!(fresh, src);

    let mut non_addressable: HashMap<String, u8> = HashMap::new();
    unmarshal_in_place(bytes.clone(), &mut non_addressable, &handle).unwrap();
    assert_eq!(non_addressable, src);

    let mut pointer_to_nil: Option<HashMap<String, u8>> = None;
    unmarshal(bytes, &mut pointer_to_nil, &handle).unwrap();
    assert_eq!(pointer_to_nil, Some(src));
}

#[test]
fn test_nil_i32_slice_into_pointer_to_empty() {
    let handle = handle();
    let bytes = marshal(&None::<Vec<i32>>, &handle).unwrap();
    let mut dst: Box<Option<Vec<i32>>> = Box::new(Some(Vec::new()));
    unmarshal(bytes, &mut dst, &handle).unwrap();
    assert_eq!(*dst, None);
}

#[test]
fn test_nested_vec_reuses_inner_buffers() {
    let handle = handle();
    let src = vec![vec![1u32, 2], vec![3]];
    let mut dst: Vec<Vec<u32>> = vec![Vec::with_capacity(10), Vec::with_capacity(10)];
    let inner_ptr = dst[0].as_ptr();
    unmarshal(marshal(&src, &handle).unwrap(), &mut dst, &handle).unwrap();
    assert_eq!(dst, src);
    assert_eq!(dst[0].as_ptr(), inner_ptr);
}

#[test]
fn test_map_value_decoded_in_place() {
    let handle = handle();
    let src: HashMap<u32, Vec<u8>> = [(1, vec![1, 2, 3])].into();
    let mut dst: HashMap<u32, Vec<u8>> = HashMap::new();
    dst.insert(1, Vec::with_capacity(32));
    let ptr = dst[&1].as_ptr();
    unmarshal(marshal(&src, &handle).unwrap(), &mut dst, &handle).unwrap();
    assert_eq!(dst, src);
    assert_eq!(dst[&1].as_ptr(), ptr);
}

#[test]
fn test_sequence_payload_into_byte_vec() {
    let handle = handle();
    let src = vec![Value::Uint(1), Value::Uint(200)];
    let mut dst: Vec<u8> = Vec::new();
    unmarshal(marshal(&src, &handle).unwrap(), &mut dst, &handle).unwrap();
    assert_eq!(dst, vec![1, 200]);
}

#[test]
fn test_map_keyed_by_value_and_float() {
    let handle = handle();
    let mut src: HashMap<Value, senax_codec::FloatKey<f64>> = HashMap::new();
    src.insert(Value::from("a"), senax_codec::FloatKey(1.5));
    src.insert(Value::Int(-1), senax_codec::FloatKey(f64::NAN));

    let mut dst: HashMap<Value, senax_codec::FloatKey<f64>> = HashMap::new();
    unmarshal(marshal(&src, &handle).unwrap(), &mut dst, &handle).unwrap();
    assert_eq!(dst, src);

    let mut float_keys: BTreeMap<bool, HashMap<senax_codec::FloatKey<f32>, String>> =
        BTreeMap::new();
    float_keys
        .entry(true)
        .or_default()
        .insert(senax_codec::FloatKey(-0.0), "zero".to_string());
    let mut decoded: BTreeMap<bool, HashMap<senax_codec::FloatKey<f32>, String>> =
        BTreeMap::new();
    unmarshal(marshal(&float_keys, &handle).unwrap(), &mut decoded, &handle).unwrap();
    assert_eq!(decoded, float_keys);
    assert_eq!(
        decoded[&true].get(&senax_codec::FloatKey(0.0)).map(String::as_str),
        Some("zero")
    );
}
