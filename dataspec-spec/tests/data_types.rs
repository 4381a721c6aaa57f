//! Property tests for the type registry
//!
//! For every registered type, values inside `[min, max]` survive an
//! encode/decode round trip bit-exactly, and values outside are rejected.

use dataspec_spec::{DataType, SpecError, TypeFamily, Value};
use proptest::prelude::*;

fn arb_data_type() -> impl Strategy<Value = DataType> {
    (0..DataType::ALL.len()).prop_map(|i| DataType::ALL[i])
}

/// A value inside the type's range that both f64 and the type represent exactly
fn representable_value(t: DataType, bits: u64) -> Value {
    if t.family() == TypeFamily::Float {
        // 24 significant bits fit binary32; avoids NaN bit patterns
        return Value::Real(((bits as i64) >> 40) as f64 / 256.0);
    }
    let span = t.max_raw() - t.min_raw() + 1;
    let raw = if span <= 1i128 << 53 {
        t.min_raw() + (bits as i128 % span)
    } else if t.is_signed() {
        ((bits as i64) >> 11) as i128
    } else {
        (bits >> 11) as i128
    };
    t.from_raw(raw)
}

proptest! {
    #[test]
    fn test_round_trip_in_range(t in arb_data_type(), bits in any::<u64>()) {
        let value = representable_value(t, bits);
        let bytes = t.encode(value).unwrap();
        prop_assert_eq!(bytes.len(), t.size());
        prop_assert_eq!(t.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn test_integer_round_trip_full_range(t in arb_data_type(), bits in any::<u64>()) {
        prop_assume!(t.family() == TypeFamily::Integer);
        let span = t.max_raw() - t.min_raw() + 1;
        let raw = t.min_raw() + (bits as i128 % span);
        let bytes = t.encode(Value::Integer(raw)).unwrap();
        prop_assert_eq!(t.decode(&bytes).unwrap(), Value::Integer(raw));
    }

    #[test]
    fn test_integer_above_range_rejected(t in arb_data_type(), excess in 1i128..1_000_000) {
        prop_assume!(t.family() == TypeFamily::Integer);
        let result = t.encode(Value::Integer(t.max_raw() + excess));
        let rejected = matches!(result, Err(SpecError::ValueOutOfRange { .. }));
        prop_assert!(rejected);
    }

    #[test]
    fn test_integer_below_range_rejected(t in arb_data_type(), excess in 1i128..1_000_000) {
        prop_assume!(t.family() == TypeFamily::Integer);
        let result = t.encode(Value::Integer(t.min_raw() - excess));
        prop_assert!(result.is_err());
    }

    #[test]
    fn test_fixed_point_outside_range_rejected(t in arb_data_type(), excess in 1.0f64..1000.0) {
        prop_assume!(t.family() == TypeFamily::FixedPoint);
        prop_assert!(t.encode(t.max() + excess).is_err());
        prop_assert!(t.encode(t.min() - excess).is_err());
    }

    #[test]
    fn test_float64_round_trip_any_finite(x in any::<f64>()) {
        prop_assume!(x.is_finite());
        let bytes = DataType::Float64.encode(x).unwrap();
        prop_assert_eq!(bytes, x.to_le_bytes().to_vec());
        prop_assert_eq!(DataType::Float64.decode(&x.to_le_bytes()).unwrap(), Value::Real(x));
    }

    #[test]
    fn test_float32_round_trip_any_finite(x in any::<f32>()) {
        prop_assume!(x.is_finite());
        let bytes = DataType::Float32.encode(x).unwrap();
        prop_assert_eq!(bytes, x.to_le_bytes().to_vec());
        prop_assert_eq!(DataType::Float32.decode(&x.to_le_bytes()).unwrap(), Value::Real(x as f64));
    }

    #[test]
    fn test_float32_beyond_range_rejected(excess in 1.0f64..1e6) {
        let t = DataType::Float32;
        prop_assert!(t.encode(t.max() * (1.0 + excess)).is_err());
        prop_assert!(t.encode(t.min() * (1.0 + excess)).is_err());
    }

    #[test]
    fn test_array_round_trip(t in arb_data_type(), seeds in prop::collection::vec(any::<u64>(), 0..32)) {
        let values: Vec<Value> = seeds.iter().map(|bits| representable_value(t, *bits)).collect();
        let bytes = t.encode_array(&values).unwrap();
        prop_assert_eq!(bytes.len(), values.len() * t.size());
        prop_assert_eq!(t.decode_array(&bytes).unwrap(), values);
    }
}

#[test]
fn test_boundaries_encode() {
    for t in DataType::ALL {
        assert!(t.encode(t.from_raw(t.min_raw())).is_ok(), "{} min raw", t);
        assert!(t.encode(Value::Integer(0)).is_ok(), "{} zero", t);
        assert!(t.encode(t.min()).is_ok(), "{} min", t);
        let max = t.encode(t.max());
        assert!(max.is_ok(), "{} max", t);
        if t.family() == TypeFamily::Integer {
            assert!(t.encode(t.from_raw(t.max_raw())).is_ok(), "{} max raw", t);
        } else {
            assert_eq!(t.decode(&max.unwrap()).unwrap(), Value::Real(t.max()), "{} max decode", t);
        }
    }
}

#[test]
fn test_raw_bytes_match_little_endian() {
    assert_eq!(DataType::Int32.raw_to_bytes(-2).unwrap(), (-2i32).to_le_bytes().to_vec());
    assert_eq!(DataType::Uint16.raw_to_bytes(0xBEEF).unwrap(), vec![0xEF, 0xBE]);
    assert_eq!(DataType::S063.raw_from_bytes(&i64::MIN.to_le_bytes()).unwrap(), i64::MIN as i128);
    assert_eq!(DataType::U064.raw_from_bytes(&[0xFF; 8]).unwrap(), u64::MAX as i128);
}

#[test]
fn test_wrong_length_rejected() {
    assert!(matches!(
        DataType::Uint32.decode(&[1, 2]),
        Err(SpecError::InvalidLength { expected: 4, found: 2, .. })
    ));
}
