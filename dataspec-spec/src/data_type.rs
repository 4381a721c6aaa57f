//! # Data Type Registry
//!
//! Every scalar encoding a specification can write, with its stable numeric
//! id, width, numeric range and fixed-point scale.
//!
//! ## Families
//!
//! ```text
//! Integer      uint8..uint64, int8..int64        scale 0
//! Fixed-point  u88, u1616, u3232                 unsigned, integer + fraction bits
//!              s87, s1615, s3231                 signed, sign + integer + fraction bits
//!              u08, u016, u032, u064             unsigned, fraction only
//!              s07, s015, s031, s063             signed, fraction only
//! Float        float32, float64                  IEEE-754 binary32 / binary64
//! ```
//!
//! Integer and fixed-point encodings are little-endian two's complement of
//! the raw (scaled) integer. A fixed-point value `v` is stored as
//! `round(v * 2^scale)`. For floats the raw value is the IEEE-754 bit
//! pattern read as an unsigned integer, stored little-endian.

use crate::error::{Result, SpecError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric family of a [`DataType`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeFamily {
    Integer,
    FixedPoint,
    Float,
}

/// Scalar encoding identified by a stable numeric id
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    // ========== Integers ==========
    Uint8 = 0,
    Uint16 = 1,
    Uint32 = 2,
    Uint64 = 3,
    Int8 = 4,
    Int16 = 5,
    Int32 = 6,
    Int64 = 7,

    // ========== Fixed point, integer + fraction ==========
    /// 8.8 unsigned
    U88 = 8,
    /// 16.16 unsigned
    U1616 = 9,
    /// 32.32 unsigned
    U3232 = 10,
    /// sign + 8.7
    S87 = 11,
    /// sign + 16.15
    S1615 = 12,
    /// sign + 32.31
    S3231 = 13,

    // ========== Floating point ==========
    Float32 = 14,
    Float64 = 15,

    // ========== Fixed point, fraction only ==========
    U08 = 16,
    U016 = 17,
    U032 = 18,
    U064 = 19,
    S07 = 20,
    S015 = 21,
    S031 = 22,
    S063 = 23,
}

/// A value handed to or produced by the registry
///
/// Integer types decode to `Integer`, fixed-point and float types to `Real`. Either
/// variant is accepted by [`DataType::encode`] as long as it is representable.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i128),
    Real(f64),
}

impl DataType {
    /// Every registered type, in id order
    pub const ALL: [DataType; 24] = [
        DataType::Uint8,
        DataType::Uint16,
        DataType::Uint32,
        DataType::Uint64,
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::U88,
        DataType::U1616,
        DataType::U3232,
        DataType::S87,
        DataType::S1615,
        DataType::S3231,
        DataType::Float32,
        DataType::Float64,
        DataType::U08,
        DataType::U016,
        DataType::U032,
        DataType::U064,
        DataType::S07,
        DataType::S015,
        DataType::S031,
        DataType::S063,
    ];

    /// Look a type up by its wire id
    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.id() == id)
    }

    #[inline]
    pub const fn id(self) -> u32 {
        self as u32
    }

    /// Encoded width in bytes
    pub const fn size(self) -> usize {
        match self {
            Self::Uint8 | Self::Int8 | Self::U08 | Self::S07 => 1,
            Self::Uint16 | Self::Int16 | Self::U88 | Self::S87 | Self::U016 | Self::S015 => 2,
            Self::Uint32 | Self::Int32 | Self::U1616 | Self::S1615 | Self::U032 | Self::S031 | Self::Float32 => 4,
            Self::Uint64 | Self::Int64 | Self::U3232 | Self::S3231 | Self::U064 | Self::S063 | Self::Float64 => 8,
        }
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.size() as u32 * 8
    }

    /// Whether the raw integer is two's complement; floats carry their sign
    /// inside an unsigned bit pattern
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::S87
                | Self::S1615
                | Self::S3231
                | Self::S07
                | Self::S015
                | Self::S031
                | Self::S063
        )
    }

    /// Number of fractional bits (0 for integers and floats)
    pub const fn scale(self) -> u32 {
        match self {
            Self::Float32 | Self::Float64 => 0,
            Self::Uint8
            | Self::Uint16
            | Self::Uint32
            | Self::Uint64
            | Self::Int8
            | Self::Int16
            | Self::Int32
            | Self::Int64 => 0,
            Self::U88 | Self::U08 => 8,
            Self::U1616 | Self::U016 => 16,
            Self::U3232 | Self::U032 => 32,
            Self::U064 => 64,
            Self::S87 | Self::S07 => 7,
            Self::S1615 | Self::S015 => 15,
            Self::S3231 | Self::S031 => 31,
            Self::S063 => 63,
        }
    }

    pub const fn family(self) -> TypeFamily {
        match self {
            Self::Uint8
            | Self::Uint16
            | Self::Uint32
            | Self::Uint64
            | Self::Int8
            | Self::Int16
            | Self::Int32
            | Self::Int64 => TypeFamily::Integer,
            Self::Float32 | Self::Float64 => TypeFamily::Float,
            _ => TypeFamily::FixedPoint,
        }
    }

    /// Smallest raw (scaled) integer
    pub const fn min_raw(self) -> i128 {
        if self.is_signed() {
            -(1i128 << (self.bits() - 1))
        } else {
            0
        }
    }

    /// Largest raw (scaled) integer
    pub const fn max_raw(self) -> i128 {
        if self.is_signed() {
            (1i128 << (self.bits() - 1)) - 1
        } else {
            (1i128 << self.bits()) - 1
        }
    }

    /// `2^scale`
    pub fn scale_factor(self) -> f64 {
        2f64.powi(self.scale() as i32)
    }

    /// Smallest finite representable value
    pub fn min(self) -> f64 {
        match self {
            Self::Float32 => -(f32::MAX as f64),
            Self::Float64 => f64::MIN,
            _ => self.min_raw() as f64 / self.scale_factor(),
        }
    }

    /// Largest finite value that encodes without error
    pub fn max(self) -> f64 {
        match self {
            Self::Float32 => f32::MAX as f64,
            Self::Float64 => f64::MAX,
            _ => {
                let max = self.max_raw() as f64 / self.scale_factor();
                // 64-bit raw ranges round up to the next power of two
                if (max * self.scale_factor()).round() as i128 > self.max_raw() {
                    f64::from_bits(max.to_bits() - 1)
                } else {
                    max
                }
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::U88 => "u88",
            Self::U1616 => "u1616",
            Self::U3232 => "u3232",
            Self::S87 => "s87",
            Self::S1615 => "s1615",
            Self::S3231 => "s3231",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::U08 => "u08",
            Self::U016 => "u016",
            Self::U032 => "u032",
            Self::U064 => "u064",
            Self::S07 => "s07",
            Self::S015 => "s015",
            Self::S031 => "s031",
            Self::S063 => "s063",
        }
    }

    // ========================================================================
    // Raw conversion
    // ========================================================================

    /// Convert a value to its raw scaled integer, failing if it does not fit
    pub fn to_raw(self, value: Value) -> Result<i128> {
        let raw = match (self.family(), value) {
            (TypeFamily::Integer, Value::Integer(v)) => v,
            (TypeFamily::Integer, Value::Real(r)) => {
                if !r.is_finite() || r.fract() != 0.0 {
                    return Err(SpecError::NotIntegral { data_type: self, value: r });
                }
                r as i128
            }
            (TypeFamily::FixedPoint, Value::Integer(v)) => v
                .checked_mul(1i128 << self.scale())
                .ok_or_else(|| self.out_of_range(value))?,
            (TypeFamily::FixedPoint, Value::Real(r)) => {
                if !r.is_finite() {
                    return Err(self.out_of_range(value));
                }
                (r * self.scale_factor()).round() as i128
            }
            (TypeFamily::Float, _) => {
                let r = match value {
                    Value::Integer(v) => v as f64,
                    Value::Real(r) => r,
                };
                if self == Self::Float32 {
                    // Infinities and NaN pass through; finite values must not overflow
                    if r.is_finite() && r.abs() > f32::MAX as f64 {
                        return Err(self.out_of_range(value));
                    }
                    (r as f32).to_bits() as i128
                } else {
                    r.to_bits() as i128
                }
            }
        };

        self.check_raw(raw).map_err(|_| self.out_of_range(value))?;
        Ok(raw)
    }

    /// Convert a raw scaled integer back to a value
    pub fn from_raw(self, raw: i128) -> Value {
        match self.family() {
            TypeFamily::Integer => Value::Integer(raw),
            TypeFamily::FixedPoint => Value::Real(raw as f64 / self.scale_factor()),
            TypeFamily::Float if self == Self::Float32 => Value::Real(f32::from_bits(raw as u32) as f64),
            TypeFamily::Float => Value::Real(f64::from_bits(raw as u64)),
        }
    }

    /// Check a raw integer against this type's raw range
    pub fn check_raw(self, raw: i128) -> Result<()> {
        if raw < self.min_raw() || raw > self.max_raw() {
            return Err(SpecError::ValueOutOfRange {
                data_type: self,
                value: raw.to_string(),
            });
        }
        Ok(())
    }

    /// Interpret a 64-bit register as a raw value of this type
    ///
    /// 8-byte types take the register's bit pattern (unsigned types
    /// reinterpret it); narrower types require the value to fit.
    pub fn raw_from_register(self, bits: i64) -> Result<i128> {
        let raw = if self.size() == 8 && !self.is_signed() {
            bits as u64 as i128
        } else {
            bits as i128
        };
        self.check_raw(raw)?;
        Ok(raw)
    }

    /// Truncate a raw value into a 64-bit register
    #[inline]
    pub fn raw_to_register(self, raw: i128) -> i64 {
        raw as i64
    }

    /// Little-endian bytes of a raw value
    pub fn raw_to_bytes(self, raw: i128) -> Result<Vec<u8>> {
        self.check_raw(raw)?;
        Ok((raw as u128).to_le_bytes()[..self.size()].to_vec())
    }

    /// Raw value from exactly `size()` little-endian bytes
    pub fn raw_from_bytes(self, bytes: &[u8]) -> Result<i128> {
        if bytes.len() != self.size() {
            return Err(SpecError::InvalidLength {
                data_type: self,
                expected: self.size(),
                found: bytes.len(),
            });
        }

        let mut buf = [0u8; 16];
        buf[..bytes.len()].copy_from_slice(bytes);
        let unsigned = u128::from_le_bytes(buf);

        if self.is_signed() {
            let shift = 128 - self.bits();
            Ok(((unsigned << shift) as i128) >> shift)
        } else {
            Ok(unsigned as i128)
        }
    }

    // ========================================================================
    // Encode / decode
    // ========================================================================

    pub fn encode(self, value: impl Into<Value>) -> Result<Vec<u8>> {
        let raw = self.to_raw(value.into())?;
        self.raw_to_bytes(raw)
    }

    pub fn decode(self, bytes: &[u8]) -> Result<Value> {
        Ok(self.from_raw(self.raw_from_bytes(bytes)?))
    }

    /// Encode a contiguous run of values with no separators
    pub fn encode_array<V: Into<Value> + Copy>(self, values: &[V]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(values.len() * self.size());
        for value in values {
            out.extend(self.encode(*value)?);
        }
        Ok(out)
    }

    pub fn decode_array(self, bytes: &[u8]) -> Result<Vec<Value>> {
        if bytes.len() % self.size() != 0 {
            return Err(SpecError::InvalidLength {
                data_type: self,
                expected: bytes.len() - bytes.len() % self.size(),
                found: bytes.len(),
            });
        }
        bytes.chunks_exact(self.size()).map(|chunk| self.decode(chunk)).collect()
    }

    fn out_of_range(self, value: Value) -> SpecError {
        SpecError::ValueOutOfRange {
            data_type: self,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(r) => write!(f, "{}", r),
        }
    }
}

macro_rules! integer_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Integer(v as i128)
            }
        })*
    };
}

integer_value!(i8, i16, i32, i64, i128, u8, u16, u32, u64);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(v as f64)
    }
}
