// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Typed values and their wire conversions.
//!
//! [`TypedValue`] is the closed set of values the client reads and writes.
//! [`UaType`] ties each Rust type to its OPC UA wire type so that
//! `client.read::<u8>(..)` requests a `Byte` and nothing else.
//!
//! Conversions never coerce: a value read as `Int32` is not silently
//! returned as `Double`, a `String` payload that is not valid UTF-8 is a
//! mismatch rather than a lossy decode, and integers are range-checked
//! instead of truncated.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{Scalar, ScalarType, Variant};
use crate::error::{ConfigError, UaError, UaResult};

// =============================================================================
// WireType
// =============================================================================

/// OPC UA built-in types supported by the typed layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireType {
    /// Boolean.
    Boolean,
    /// Signed 8-bit integer.
    SByte,
    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// IEEE 754 single precision.
    Float,
    /// IEEE 754 double precision.
    Double,
    /// UTF-8 string.
    String,
}

impl WireType {
    /// Every supported wire type, in type id order.
    pub const ALL: [WireType; 12] = [
        Self::Boolean,
        Self::SByte,
        Self::Byte,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Float,
        Self::Double,
        Self::String,
    ];

    /// Returns the OPC UA built-in type id (`i=1` .. `i=12`).
    pub fn type_id(self) -> u32 {
        match self {
            Self::Boolean => 1,
            Self::SByte => 2,
            Self::Byte => 3,
            Self::Int16 => 4,
            Self::UInt16 => 5,
            Self::Int32 => 6,
            Self::UInt32 => 7,
            Self::Int64 => 8,
            Self::UInt64 => 9,
            Self::Float => 10,
            Self::Double => 11,
            Self::String => 12,
        }
    }

    /// Returns the OPC UA type name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
        }
    }

    /// Returns the inclusive bounds of an integer type.
    pub fn integer_bounds(self) -> Option<(i128, i128)> {
        Some(match self {
            Self::SByte => (i8::MIN.into(), i8::MAX.into()),
            Self::Byte => (u8::MIN.into(), u8::MAX.into()),
            Self::Int16 => (i16::MIN.into(), i16::MAX.into()),
            Self::UInt16 => (u16::MIN.into(), u16::MAX.into()),
            Self::Int32 => (i32::MIN.into(), i32::MAX.into()),
            Self::UInt32 => (u32::MIN.into(), u32::MAX.into()),
            Self::Int64 => (i64::MIN.into(), i64::MAX.into()),
            Self::UInt64 => (u64::MIN.into(), u64::MAX.into()),
            Self::Boolean | Self::Float | Self::Double | Self::String => return None,
        })
    }

    /// Returns `true` for `Float` and `Double`.
    pub fn is_floating(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WireType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wire = match s.to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Self::Boolean,
            "sbyte" | "i8" => Self::SByte,
            "byte" | "u8" => Self::Byte,
            "int16" | "i16" => Self::Int16,
            "uint16" | "u16" => Self::UInt16,
            "int32" | "i32" => Self::Int32,
            "uint32" | "u32" => Self::UInt32,
            "int64" | "i64" => Self::Int64,
            "uint64" | "u64" => Self::UInt64,
            "float" | "f32" => Self::Float,
            "double" | "f64" => Self::Double,
            "string" | "str" => Self::String,
            _ => {
                return Err(ConfigError::invalid_value(
                    "type",
                    format!("unknown wire type '{s}'"),
                ))
            }
        };
        Ok(wire)
    }
}

// =============================================================================
// TypeTag
// =============================================================================

/// Expected shape of a value: a wire type, scalar or array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeTag {
    /// Element type.
    pub wire_type: WireType,
    /// `true` for a one-dimensional array.
    pub is_array: bool,
}

impl TypeTag {
    /// Tag for a scalar of `wire_type`.
    pub const fn scalar(wire_type: WireType) -> Self {
        Self {
            wire_type,
            is_array: false,
        }
    }

    /// Tag for an array of `wire_type`.
    pub const fn array(wire_type: WireType) -> Self {
        Self {
            wire_type,
            is_array: true,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_array {
            write!(f, "{}[]", self.wire_type)
        } else {
            write!(f, "{}", self.wire_type)
        }
    }
}

/// Parses `byte`, `Byte`, `byte[]`, `uint32[]` and similar.
impl FromStr for TypeTag {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().strip_suffix("[]") {
            Some(element) => element.parse().map(Self::array),
            None => s.trim().parse().map(Self::scalar),
        }
    }
}

// =============================================================================
// DecodeError
// =============================================================================

/// Why a wire value could not be converted to the requested type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The server holds a different type or shape.
    #[error("expected {expected}, got {actual}")]
    WrongType {
        /// Requested type.
        expected: TypeTag,
        /// Type actually found.
        actual: String,
    },

    /// A `String` payload is not valid UTF-8.
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    /// The value has no typed-layer counterpart.
    #[error("unsupported wire value {0}")]
    Unsupported(String),
}

impl DecodeError {
    /// Converts into a [`UaError::TypeMismatch`] about `subject`.
    pub fn into_ua_error(self, subject: impl Into<String>, expected: TypeTag) -> UaError {
        let actual = match self {
            Self::WrongType { actual, .. } => actual,
            Self::InvalidUtf8 => "String with invalid UTF-8".to_string(),
            Self::Unsupported(actual) => actual,
        };
        UaError::type_mismatch(subject, expected, actual)
    }
}

// =============================================================================
// Scalar codec
// =============================================================================

trait ScalarCodec: Sized {
    const WIRE: WireType;

    fn encode(self) -> Scalar;

    fn decode(scalar: Scalar) -> Result<Self, DecodeError>;
}

macro_rules! scalar_codec {
    ($($wire:ident($ty:ty);)*) => {
        $(
            impl ScalarCodec for $ty {
                const WIRE: WireType = WireType::$wire;

                fn encode(self) -> Scalar {
                    Scalar::$wire(self)
                }

                fn decode(scalar: Scalar) -> Result<Self, DecodeError> {
                    match scalar {
                        Scalar::$wire(value) => Ok(value),
                        other => Err(DecodeError::WrongType {
                            expected: TypeTag::scalar(Self::WIRE),
                            actual: other.scalar_type().name().to_string(),
                        }),
                    }
                }
            }
        )*
    };
}

scalar_codec! {
    Boolean(bool);
    SByte(i8);
    Byte(u8);
    Int16(i16);
    UInt16(u16);
    Int32(i32);
    UInt32(u32);
    Int64(i64);
    UInt64(u64);
    Float(f32);
    Double(f64);
}

impl ScalarCodec for String {
    const WIRE: WireType = WireType::String;

    fn encode(self) -> Scalar {
        Scalar::String(self.into_bytes())
    }

    fn decode(scalar: Scalar) -> Result<Self, DecodeError> {
        match scalar {
            Scalar::String(bytes) => String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8),
            other => Err(DecodeError::WrongType {
                expected: TypeTag::scalar(WireType::String),
                actual: other.scalar_type().name().to_string(),
            }),
        }
    }
}

// =============================================================================
// UaType
// =============================================================================

/// A Rust type with a fixed OPC UA wire type.
///
/// Implemented for `bool`, `i8`, `u8`, `i16`, `u16`, `i32`, `u32`, `i64`,
/// `u64`, `f32`, `f64` and `String`.
pub trait UaType: Sized + Send + 'static {
    /// The wire type this Rust type reads and writes as.
    const WIRE_TYPE: WireType;

    /// Wraps a scalar.
    fn into_value(self) -> TypedValue;

    /// Wraps an array.
    fn into_array_value(values: Vec<Self>) -> TypedValue;

    /// Unwraps a scalar, handing the value back on a tag mismatch.
    fn from_value(value: TypedValue) -> Result<Self, TypedValue>;

    /// Unwraps an array, handing the value back on a tag mismatch.
    fn from_array_value(value: TypedValue) -> Result<Vec<Self>, TypedValue>;
}

// =============================================================================
// TypedValue
// =============================================================================

macro_rules! typed_values {
    ($($wire:ident, $array:ident, $ty:ty;)*) => {
        /// A value of one supported wire type, scalar or array.
        ///
        /// Serializes as the bare value (`42`, `"text"`, `[1, 2]`).
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(untagged)]
        pub enum TypedValue {
            $(
                #[doc = concat!("Scalar `", stringify!($wire), "`.")]
                $wire($ty),
            )*
            $(
                #[doc = concat!("Array of `", stringify!($wire), "`.")]
                $array(Vec<$ty>),
            )*
        }

        $(
            impl UaType for $ty {
                const WIRE_TYPE: WireType = WireType::$wire;

                fn into_value(self) -> TypedValue {
                    TypedValue::$wire(self)
                }

                fn into_array_value(values: Vec<Self>) -> TypedValue {
                    TypedValue::$array(values)
                }

                fn from_value(value: TypedValue) -> Result<Self, TypedValue> {
                    match value {
                        TypedValue::$wire(inner) => Ok(inner),
                        other => Err(other),
                    }
                }

                fn from_array_value(value: TypedValue) -> Result<Vec<Self>, TypedValue> {
                    match value {
                        TypedValue::$array(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )*

        impl TypedValue {
            /// Returns the type tag of this value.
            pub fn type_tag(&self) -> TypeTag {
                match self {
                    $(
                        Self::$wire(_) => TypeTag::scalar(WireType::$wire),
                        Self::$array(_) => TypeTag::array(WireType::$wire),
                    )*
                }
            }

            /// Converts into the engine representation.
            pub fn into_variant(self) -> Variant {
                match self {
                    $(
                        Self::$wire(value) => Variant::Scalar(value.encode()),
                        Self::$array(values) => Variant::Array {
                            element_type: ScalarType::$wire,
                            values: values.into_iter().map(<$ty as ScalarCodec>::encode).collect(),
                        },
                    )*
                }
            }

            /// Returns the number of elements of an array, `None` for scalars.
            pub fn array_len(&self) -> Option<usize> {
                match self {
                    $(
                        Self::$wire(_) => None,
                        Self::$array(values) => Some(values.len()),
                    )*
                }
            }

            fn decode_scalar(wire: WireType, scalar: Scalar) -> Result<Self, DecodeError> {
                match wire {
                    $(WireType::$wire => <$ty as ScalarCodec>::decode(scalar).map(Self::$wire),)*
                }
            }

            fn decode_array(wire: WireType, values: Vec<Scalar>) -> Result<Self, DecodeError> {
                match wire {
                    $(
                        WireType::$wire => values
                            .into_iter()
                            .map(<$ty as ScalarCodec>::decode)
                            .collect::<Result<Vec<_>, _>>()
                            .map(Self::$array),
                    )*
                }
            }

            fn collect_array(wire: WireType, items: Vec<TypedValue>) -> UaResult<Self> {
                match wire {
                    $(
                        WireType::$wire => items
                            .into_iter()
                            .map(|item| {
                                <$ty as UaType>::from_value(item).map_err(|other| {
                                    UaError::type_mismatch(
                                        "array element",
                                        wire,
                                        other.type_tag().to_string(),
                                    )
                                })
                            })
                            .collect::<UaResult<Vec<_>>>()
                            .map(Self::$array),
                    )*
                }
            }
        }
    };
}

typed_values! {
    Boolean, BooleanArray, bool;
    SByte, SByteArray, i8;
    Byte, ByteArray, u8;
    Int16, Int16Array, i16;
    UInt16, UInt16Array, u16;
    Int32, Int32Array, i32;
    UInt32, UInt32Array, u32;
    Int64, Int64Array, i64;
    UInt64, UInt64Array, u64;
    Float, FloatArray, f32;
    Double, DoubleArray, f64;
    String, StringArray, String;
}

impl TypedValue {
    /// Returns the element wire type.
    pub fn wire_type(&self) -> WireType {
        self.type_tag().wire_type
    }

    /// Returns `true` for array values.
    pub fn is_array(&self) -> bool {
        self.type_tag().is_array
    }

    /// Decodes a wire value, requiring exactly the `expected` type and shape.
    pub fn from_variant(variant: Variant, expected: TypeTag) -> Result<Self, DecodeError> {
        match (variant, expected.is_array) {
            (Variant::Scalar(scalar), false) => Self::decode_scalar(expected.wire_type, scalar),
            (
                Variant::Array {
                    element_type,
                    values,
                },
                true,
            ) if element_type == ScalarType::from(expected.wire_type) => {
                Self::decode_array(expected.wire_type, values)
            }
            (other, _) => Err(DecodeError::WrongType {
                expected,
                actual: other.describe(),
            }),
        }
    }

    /// Decodes a wire value using the type it reports.
    pub fn from_variant_any(variant: Variant) -> Result<Self, DecodeError> {
        match variant.type_tag() {
            Some(tag) => Self::from_variant(variant, tag),
            None => Err(DecodeError::Unsupported(variant.describe())),
        }
    }

    // =========================================================================
    // Range-checked construction
    // =========================================================================

    /// Builds an integer value, rejecting anything outside the type's range.
    ///
    /// # Examples
    ///
    /// ```
    /// use opcua_typed::{ErrorKind, TypedValue, WireType};
    ///
    /// assert_eq!(TypedValue::from_integer(WireType::Byte, 255).unwrap(), TypedValue::Byte(255));
    /// let err = TypedValue::from_integer(WireType::Byte, 256).unwrap_err();
    /// assert_eq!(err.kind(), ErrorKind::ValueOutOfRange);
    /// ```
    pub fn from_integer(wire: WireType, value: i128) -> UaResult<Self> {
        let (min, max) = wire
            .integer_bounds()
            .ok_or_else(|| UaError::type_mismatch("input", wire, "integer"))?;
        if value < min || value > max {
            return Err(UaError::out_of_range(
                wire.name(),
                format!("{value} is outside {min}..={max}"),
            ));
        }

        // Bounds were checked above, so the casts below are exact.
        Ok(match wire {
            WireType::SByte => Self::SByte(value as i8),
            WireType::Byte => Self::Byte(value as u8),
            WireType::Int16 => Self::Int16(value as i16),
            WireType::UInt16 => Self::UInt16(value as u16),
            WireType::Int32 => Self::Int32(value as i32),
            WireType::UInt32 => Self::UInt32(value as u32),
            WireType::Int64 => Self::Int64(value as i64),
            WireType::UInt64 => Self::UInt64(value as u64),
            WireType::Boolean | WireType::Float | WireType::Double | WireType::String => {
                return Err(UaError::type_mismatch("input", wire, "integer"))
            }
        })
    }

    /// Builds a floating point value.
    ///
    /// Non-finite values pass through. A finite value too large for `Float`
    /// is out of range rather than silently becoming infinity.
    pub fn from_float(wire: WireType, value: f64) -> UaResult<Self> {
        match wire {
            WireType::Double => Ok(Self::Double(value)),
            WireType::Float => {
                if value.is_finite() && value.abs() > f64::from(f32::MAX) {
                    return Err(UaError::out_of_range(
                        wire.name(),
                        format!("{value} exceeds the single precision range"),
                    ));
                }
                Ok(Self::Float(value as f32))
            }
            other => Err(UaError::type_mismatch("input", other, "floating point number")),
        }
    }

    /// Parses text input into a value of type `tag`.
    ///
    /// Arrays are comma separated, optionally wrapped in brackets; an empty
    /// input yields an empty array. String array elements cannot contain
    /// commas in this form.
    pub fn parse(tag: TypeTag, input: &str) -> UaResult<Self> {
        if !tag.is_array {
            return Self::parse_scalar(tag.wire_type, input);
        }

        let trimmed = input.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(trimmed);

        let items = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner
                .split(',')
                .map(|item| Self::parse_scalar(tag.wire_type, item.trim()))
                .collect::<UaResult<Vec<_>>>()?
        };
        Self::collect_array(tag.wire_type, items)
    }

    fn parse_scalar(wire: WireType, input: &str) -> UaResult<Self> {
        let invalid = || UaError::type_mismatch("input", wire, format!("{input:?}"));
        match wire {
            WireType::Boolean => match input.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Self::Boolean(true)),
                "false" | "0" => Ok(Self::Boolean(false)),
                _ => Err(invalid()),
            },
            WireType::Float | WireType::Double => {
                let value = input.trim().parse::<f64>().map_err(|_| invalid())?;
                Self::from_float(wire, value)
            }
            WireType::String => Ok(Self::String(input.to_string())),
            _ => {
                let value = input.trim().parse::<i128>().map_err(|_| invalid())?;
                Self::from_integer(wire, value)
            }
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::SByte(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::BooleanArray(v) => write_list(f, v),
            Self::SByteArray(v) => write_list(f, v),
            Self::ByteArray(v) => write_list(f, v),
            Self::Int16Array(v) => write_list(f, v),
            Self::UInt16Array(v) => write_list(f, v),
            Self::Int32Array(v) => write_list(f, v),
            Self::UInt32Array(v) => write_list(f, v),
            Self::Int64Array(v) => write_list(f, v),
            Self::UInt64Array(v) => write_list(f, v),
            Self::FloatArray(v) => write_list(f, v),
            Self::DoubleArray(v) => write_list(f, v),
            Self::StringArray(v) => write_list(f, v),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ids() {
        let ids: Vec<u32> = WireType::ALL.iter().map(|w| w.type_id()).collect();
        assert_eq!(ids, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_type_tag_parse_and_display() {
        assert_eq!("byte".parse::<TypeTag>().unwrap(), TypeTag::scalar(WireType::Byte));
        assert_eq!("UInt32[]".parse::<TypeTag>().unwrap(), TypeTag::array(WireType::UInt32));
        assert_eq!(TypeTag::array(WireType::Double).to_string(), "Double[]");
        assert!("decimal".parse::<TypeTag>().is_err());
    }

    #[test]
    fn test_scalar_shape_is_enforced() {
        let variant = Variant::Scalar(Scalar::Int32(7));
        let err = TypedValue::from_variant(variant, TypeTag::array(WireType::Int32)).unwrap_err();
        assert_eq!(
            err,
            DecodeError::WrongType {
                expected: TypeTag::array(WireType::Int32),
                actual: "Int32".to_string(),
            }
        );
    }

    #[test]
    fn test_no_numeric_widening() {
        let variant = Variant::Scalar(Scalar::Float(1.5));
        assert!(TypedValue::from_variant(variant, TypeTag::scalar(WireType::Double)).is_err());

        let variant = Variant::Scalar(Scalar::Int32(1));
        assert!(TypedValue::from_variant(variant, TypeTag::scalar(WireType::Int64)).is_err());
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let variant = Variant::Scalar(Scalar::String(vec![0x66, 0x6f, 0xff]));
        let err = TypedValue::from_variant(variant, TypeTag::scalar(WireType::String)).unwrap_err();
        assert_eq!(err, DecodeError::InvalidUtf8);

        let ua = err.into_ua_error("ns=5;s=string_test", TypeTag::scalar(WireType::String));
        assert_eq!(ua.kind(), crate::ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_string_bytes_preserved() {
        let text = "Grüße 🦀 \u{10FFFF}".to_string();
        let variant = TypedValue::String(text.clone()).into_variant();
        match &variant {
            Variant::Scalar(Scalar::String(bytes)) => assert_eq!(bytes.as_slice(), text.as_bytes()),
            other => panic!("unexpected variant {other:?}"),
        }
        let back = TypedValue::from_variant(variant, TypeTag::scalar(WireType::String)).unwrap();
        assert_eq!(back, TypedValue::String(text));
    }

    #[test]
    fn test_empty_array_keeps_element_type() {
        let variant = TypedValue::Int32Array(Vec::new()).into_variant();
        assert_eq!(variant.describe(), "Int32[]");
        assert!(TypedValue::from_variant(variant.clone(), TypeTag::array(WireType::UInt32)).is_err());
        assert_eq!(
            TypedValue::from_variant(variant, TypeTag::array(WireType::Int32)).unwrap(),
            TypedValue::Int32Array(Vec::new())
        );
    }

    #[test]
    fn test_mixed_array_is_rejected_whole() {
        let variant = Variant::Array {
            element_type: ScalarType::Byte,
            values: vec![Scalar::Byte(1), Scalar::Int16(2)],
        };
        assert!(TypedValue::from_variant(variant, TypeTag::array(WireType::Byte)).is_err());
    }

    #[test]
    fn test_from_variant_any() {
        let value = TypedValue::from_variant_any(Variant::Scalar(Scalar::UInt16(100))).unwrap();
        assert_eq!(value, TypedValue::UInt16(100));
        assert!(TypedValue::from_variant_any(Variant::Empty).is_err());
    }

    #[test]
    fn test_integer_bounds() {
        assert_eq!(TypedValue::from_integer(WireType::Byte, 0).unwrap(), TypedValue::Byte(0));
        assert_eq!(TypedValue::from_integer(WireType::Byte, 255).unwrap(), TypedValue::Byte(255));
        for rejected in [-1, 256, 1000] {
            let err = TypedValue::from_integer(WireType::Byte, rejected).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::ValueOutOfRange);
        }
        assert!(TypedValue::from_integer(WireType::SByte, -129).is_err());
        assert!(TypedValue::from_integer(WireType::UInt64, -1).is_err());
        assert_eq!(
            TypedValue::from_integer(WireType::UInt64, u64::MAX.into()).unwrap(),
            TypedValue::UInt64(u64::MAX)
        );
        assert!(TypedValue::from_integer(WireType::Double, 1).is_err());
    }

    #[test]
    fn test_float_range() {
        assert!(TypedValue::from_float(WireType::Float, 1e39).is_err());
        assert_eq!(
            TypedValue::from_float(WireType::Float, f64::INFINITY).unwrap(),
            TypedValue::Float(f32::INFINITY)
        );
        match TypedValue::from_float(WireType::Double, f64::NAN).unwrap() {
            TypedValue::Double(v) => assert!(v.is_nan()),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn test_parse() {
        let tag = TypeTag::scalar(WireType::Byte);
        assert_eq!(TypedValue::parse(tag, "127").unwrap(), TypedValue::Byte(127));
        assert_eq!(
            TypedValue::parse(tag, "300").unwrap_err().kind(),
            crate::ErrorKind::ValueOutOfRange
        );
        assert_eq!(
            TypedValue::parse(tag, "abc").unwrap_err().kind(),
            crate::ErrorKind::TypeMismatch
        );

        let tag = TypeTag::array(WireType::Int32);
        assert_eq!(
            TypedValue::parse(tag, "[1, 2, 3]").unwrap(),
            TypedValue::Int32Array(vec![1, 2, 3])
        );
        assert_eq!(TypedValue::parse(tag, "").unwrap(), TypedValue::Int32Array(vec![]));
        assert_eq!(TypedValue::parse(tag, "[]").unwrap(), TypedValue::Int32Array(vec![]));

        let tag = TypeTag::scalar(WireType::Boolean);
        assert_eq!(TypedValue::parse(tag, "TRUE").unwrap(), TypedValue::Boolean(true));
    }

    #[test]
    fn test_array_elements_of_another_type_are_rejected() {
        let items = vec![TypedValue::Int32(1), TypedValue::Byte(2)];
        let err = TypedValue::collect_array(WireType::Int32, items).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::TypeMismatch);

        let items = vec![TypedValue::Int32(1), TypedValue::Int32(2)];
        assert_eq!(
            TypedValue::collect_array(WireType::Int32, items).unwrap(),
            TypedValue::Int32Array(vec![1, 2])
        );
    }

    #[test]
    fn test_ua_type_mapping() {
        assert_eq!(<u8 as UaType>::WIRE_TYPE, WireType::Byte);
        assert_eq!(<String as UaType>::WIRE_TYPE, WireType::String);
        assert_eq!(42u8.into_value(), TypedValue::Byte(42));
        assert_eq!(u8::from_value(TypedValue::Byte(9)), Ok(9));
        assert_eq!(
            u8::from_value(TypedValue::Int16(9)),
            Err(TypedValue::Int16(9))
        );
        assert_eq!(
            i32::from_array_value(TypedValue::Int32Array(vec![1, 2])),
            Ok(vec![1, 2])
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(TypedValue::Byte(7).to_string(), "7");
        assert_eq!(TypedValue::ByteArray(vec![1, 2]).to_string(), "[1, 2]");
        assert_eq!(TypedValue::StringArray(vec![]).to_string(), "[]");
    }

    #[test]
    fn test_serialize_untagged() {
        let json = serde_json::to_string(&TypedValue::UInt32Array(vec![100, 200])).unwrap();
        assert_eq!(json, "[100,200]");
    }
}
