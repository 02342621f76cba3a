//! # Protocol16 Values
//!
//! Recursive decoder for the self-describing tagged value format used in
//! operation and event parameters.
//!
//! ## Wire Tags
//! ```text
//! 0x2A Nil          0x62 Int8 (u8)     0x6B Int16 (u16)    0x73 String
//! 0x44 Dictionary   0x64 Double        0x6C Int64          0x78 ByteArray
//! 0x61 StringArray  0x66 Float32       0x6E Int32Array     0x79 TypedArray
//! 0x68 Hashtable    0x69 Int32         0x6F Boolean        0x7A ObjectArray
//! ```
//! Tag `0x00` also decodes as Nil. Tag `0x07` is a legacy alias of Int16 and is
//! accepted for compatibility with older peers; it is never produced.
//!
//! Maps are kept as ordered `(key, value)` pairs: keys may be floats or arrays,
//! so they are not required to be hashable.

use serde::Serialize;

use crate::core::cursor::ByteCursor;
use crate::error::{ProtocolError, Result};

/// Default recursion limit for nested containers.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Legacy wire alias for [`TypeTag::Int16`].
pub const LEGACY_INT16_TAG: u8 = 0x07;

/// Recognised value type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeTag {
    Nil,
    Dictionary,
    StringArray,
    Int8,
    Double,
    Float32,
    Hashtable,
    Int32,
    Int16,
    Int64,
    Int32Array,
    Boolean,
    String,
    ByteArray,
    TypedArray,
    ObjectArray,
}

impl TypeTag {
    /// Resolve a wire byte. Both `0x6B` and the legacy `0x07` map to Int16,
    /// both `0x2A` and `0x00` map to Nil.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let tag = match byte {
            0x00 | 0x2A => TypeTag::Nil,
            0x44 => TypeTag::Dictionary,
            0x61 => TypeTag::StringArray,
            0x62 => TypeTag::Int8,
            0x64 => TypeTag::Double,
            0x66 => TypeTag::Float32,
            0x68 => TypeTag::Hashtable,
            0x69 => TypeTag::Int32,
            LEGACY_INT16_TAG | 0x6B => TypeTag::Int16,
            0x6C => TypeTag::Int64,
            0x6E => TypeTag::Int32Array,
            0x6F => TypeTag::Boolean,
            0x73 => TypeTag::String,
            0x78 => TypeTag::ByteArray,
            0x79 => TypeTag::TypedArray,
            0x7A => TypeTag::ObjectArray,
            _ => return None,
        };
        Some(tag)
    }

    /// Canonical wire byte.
    pub fn to_byte(self) -> u8 {
        match self {
            TypeTag::Nil => 0x2A,
            TypeTag::Dictionary => 0x44,
            TypeTag::StringArray => 0x61,
            TypeTag::Int8 => 0x62,
            TypeTag::Double => 0x64,
            TypeTag::Float32 => 0x66,
            TypeTag::Hashtable => 0x68,
            TypeTag::Int32 => 0x69,
            TypeTag::Int16 => 0x6B,
            TypeTag::Int64 => 0x6C,
            TypeTag::Int32Array => 0x6E,
            TypeTag::Boolean => 0x6F,
            TypeTag::String => 0x73,
            TypeTag::ByteArray => 0x78,
            TypeTag::TypedArray => 0x79,
            TypeTag::ObjectArray => 0x7A,
        }
    }
}

/// A decoded Protocol16 value. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ProtocolValue {
    Nil,
    Bool(bool),
    Int8(u8),
    Int16(u16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    ByteArray(Vec<u8>),
    TypedArray {
        element: TypeTag,
        items: Vec<ProtocolValue>,
    },
    ObjectArray(Vec<ProtocolValue>),
    Dictionary {
        key: TypeTag,
        value: TypeTag,
        entries: Vec<(ProtocolValue, ProtocolValue)>,
    },
    Hashtable(Vec<(ProtocolValue, ProtocolValue)>),
    Int32Array(Vec<i32>),
    StringArray(Vec<String>),
}

impl ProtocolValue {
    /// Any integer variant widened to i64.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            ProtocolValue::Int8(v) => Some(i64::from(v)),
            ProtocolValue::Int16(v) => Some(i64::from(v)),
            ProtocolValue::Int32(v) => Some(i64::from(v)),
            ProtocolValue::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ProtocolValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ProtocolValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Raw bytes: a ByteArray, or a typed/object array whose elements are all Int8.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            ProtocolValue::ByteArray(bytes) => Some(bytes.clone()),
            ProtocolValue::TypedArray { items, .. } | ProtocolValue::ObjectArray(items) => items
                .iter()
                .map(|item| match item {
                    ProtocolValue::Int8(b) => Some(*b),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// Integer sequence from any array shape; non-integer elements become `None`.
    pub fn to_int_list(&self) -> Option<Vec<Option<i64>>> {
        match self {
            ProtocolValue::Int32Array(values) => {
                Some(values.iter().map(|v| Some(i64::from(*v))).collect())
            }
            ProtocolValue::ByteArray(bytes) => {
                Some(bytes.iter().map(|b| Some(i64::from(*b))).collect())
            }
            ProtocolValue::TypedArray { items, .. } | ProtocolValue::ObjectArray(items) => {
                Some(items.iter().map(ProtocolValue::as_i64).collect())
            }
            _ => None,
        }
    }

    /// Short type name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolValue::Nil => "nil",
            ProtocolValue::Bool(_) => "bool",
            ProtocolValue::Int8(_) => "int8",
            ProtocolValue::Int16(_) => "int16",
            ProtocolValue::Int32(_) => "int32",
            ProtocolValue::Int64(_) => "int64",
            ProtocolValue::Float32(_) => "float32",
            ProtocolValue::Float64(_) => "float64",
            ProtocolValue::String(_) => "string",
            ProtocolValue::ByteArray(_) => "byte array",
            ProtocolValue::TypedArray { .. } => "typed array",
            ProtocolValue::ObjectArray(_) => "object array",
            ProtocolValue::Dictionary { .. } => "dictionary",
            ProtocolValue::Hashtable(_) => "hashtable",
            ProtocolValue::Int32Array(_) => "int32 array",
            ProtocolValue::StringArray(_) => "string array",
        }
    }
}

/// Read one value of the given wire type with the default depth limit.
pub fn read_value(type_tag: u8, cursor: &mut ByteCursor<'_>) -> Result<ProtocolValue> {
    ValueReader::new(DEFAULT_MAX_DEPTH).read(type_tag, cursor)
}

/// Value decoder carrying the recursion limit.
#[derive(Debug, Clone, Copy)]
pub struct ValueReader {
    max_depth: usize,
}

impl Default for ValueReader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl ValueReader {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Decode a value whose tag byte has already been consumed.
    pub fn read(&self, type_tag: u8, cursor: &mut ByteCursor<'_>) -> Result<ProtocolValue> {
        self.read_at_depth(type_tag, cursor, 0)
    }

    /// Read a tag byte, then the value it announces.
    pub fn read_tagged(&self, cursor: &mut ByteCursor<'_>) -> Result<ProtocolValue> {
        let tag = cursor.read_u8()?;
        self.read(tag, cursor)
    }

    fn resolve(tag: u8, cursor: &ByteCursor<'_>) -> Result<TypeTag> {
        TypeTag::from_byte(tag).ok_or_else(|| {
            // the tag byte sits just before the cursor for inline values
            let position = cursor.position().saturating_sub(1);
            tracing::warn!(tag, position, "Unknown type tag");
            ProtocolError::UnknownTypeTag { tag, position }
        })
    }

    fn read_at_depth(
        &self,
        type_tag: u8,
        cursor: &mut ByteCursor<'_>,
        depth: usize,
    ) -> Result<ProtocolValue> {
        if depth > self.max_depth {
            return Err(ProtocolError::NestingTooDeep {
                depth: self.max_depth,
            });
        }
        let tag = Self::resolve(type_tag, cursor)?;
        let value = match tag {
            TypeTag::Nil => ProtocolValue::Nil,
            TypeTag::Int8 => ProtocolValue::Int8(cursor.read_u8()?),
            TypeTag::Int16 => ProtocolValue::Int16(cursor.read_u16()?),
            TypeTag::Int32 => ProtocolValue::Int32(cursor.read_i32()?),
            TypeTag::Int64 => ProtocolValue::Int64(cursor.read_i64()?),
            TypeTag::Float32 => ProtocolValue::Float32(cursor.read_f32()?),
            TypeTag::Double => ProtocolValue::Float64(cursor.read_f64()?),
            TypeTag::Boolean => {
                let position = cursor.position();
                match cursor.read_u8()? {
                    0 => ProtocolValue::Bool(false),
                    1 => ProtocolValue::Bool(true),
                    value => return Err(ProtocolError::InvalidBoolean { value, position }),
                }
            }
            TypeTag::String => ProtocolValue::String(read_string(cursor)?),
            TypeTag::ByteArray => ProtocolValue::ByteArray(cursor.read_len_prefixed()?.to_vec()),
            TypeTag::TypedArray => {
                let count = cursor.read_u16()? as usize;
                let element_byte = cursor.read_u8()?;
                let element = Self::resolve(element_byte, cursor)?;
                let mut items = Vec::with_capacity(count.min(cursor.remaining()));
                for _ in 0..count {
                    items.push(self.read_at_depth(element_byte, cursor, depth + 1)?);
                }
                ProtocolValue::TypedArray { element, items }
            }
            TypeTag::ObjectArray => {
                let count = cursor.read_u16()? as usize;
                let mut items = Vec::with_capacity(count.min(cursor.remaining()));
                for _ in 0..count {
                    let item_tag = cursor.read_u8()?;
                    items.push(self.read_at_depth(item_tag, cursor, depth + 1)?);
                }
                ProtocolValue::ObjectArray(items)
            }
            TypeTag::Dictionary => {
                let key_byte = cursor.read_u8()?;
                let key = Self::resolve(key_byte, cursor)?;
                let value_byte = cursor.read_u8()?;
                let value = Self::resolve(value_byte, cursor)?;
                let count = cursor.read_u16()? as usize;
                let mut entries = Vec::with_capacity(count.min(cursor.remaining()));
                for _ in 0..count {
                    let k = self.read_at_depth(key_byte, cursor, depth + 1)?;
                    let v = self.read_at_depth(value_byte, cursor, depth + 1)?;
                    entries.push((k, v));
                }
                ProtocolValue::Dictionary {
                    key,
                    value,
                    entries,
                }
            }
            TypeTag::Hashtable => {
                let count = cursor.read_u16()? as usize;
                let mut entries = Vec::with_capacity(count.min(cursor.remaining()));
                for _ in 0..count {
                    let key_tag = cursor.read_u8()?;
                    let k = self.read_at_depth(key_tag, cursor, depth + 1)?;
                    let value_tag = cursor.read_u8()?;
                    let v = self.read_at_depth(value_tag, cursor, depth + 1)?;
                    entries.push((k, v));
                }
                ProtocolValue::Hashtable(entries)
            }
            TypeTag::Int32Array => {
                let count = cursor.read_u32()? as usize;
                let mut values = Vec::with_capacity(count.min(cursor.remaining() / 4));
                for _ in 0..count {
                    values.push(cursor.read_i32()?);
                }
                ProtocolValue::Int32Array(values)
            }
            TypeTag::StringArray => {
                let count = cursor.read_u16()? as usize;
                let mut values = Vec::with_capacity(count.min(cursor.remaining() / 2));
                for _ in 0..count {
                    values.push(read_string(cursor)?);
                }
                ProtocolValue::StringArray(values)
            }
        };
        Ok(value)
    }
}

fn read_string(cursor: &mut ByteCursor<'_>) -> Result<String> {
    let len = cursor.read_u16()? as usize;
    cursor.read_string(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(tag: u8, bytes: &[u8]) -> Result<ProtocolValue> {
        let mut cursor = ByteCursor::new(bytes);
        read_value(tag, &mut cursor)
    }

    #[test]
    fn test_boolean_bytes() {
        assert_eq!(decode(0x6F, &[0]).unwrap(), ProtocolValue::Bool(false));
        assert_eq!(decode(0x6F, &[1]).unwrap(), ProtocolValue::Bool(true));
        assert!(matches!(
            decode(0x6F, &[2]),
            Err(ProtocolError::InvalidBoolean { value: 2, .. })
        ));
    }

    #[test]
    fn test_legacy_int16_alias() {
        assert_eq!(decode(0x07, &[0x01, 0x00]).unwrap(), ProtocolValue::Int16(256));
        assert_eq!(decode(0x6B, &[0xFF, 0xFF]).unwrap(), ProtocolValue::Int16(65535));
        assert_eq!(TypeTag::Int16.to_byte(), 0x6B);
    }

    #[test]
    fn test_nil_tags() {
        assert_eq!(decode(0x2A, &[]).unwrap(), ProtocolValue::Nil);
        assert_eq!(decode(0x00, &[]).unwrap(), ProtocolValue::Nil);
    }

    #[test]
    fn test_unknown_tag_reports_tag() {
        match decode(0x63, &[0, 0]) {
            Err(ProtocolError::UnknownTypeTag { tag, .. }) => assert_eq!(tag, 0x63),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_string_and_byte_array() {
        assert_eq!(
            decode(0x73, &[0, 3, b'a', b'b', b'c']).unwrap(),
            ProtocolValue::String("abc".into())
        );
        assert_eq!(
            decode(0x78, &[0, 0, 0, 2, 9, 8]).unwrap(),
            ProtocolValue::ByteArray(vec![9, 8])
        );
    }

    #[test]
    fn test_int32_array_and_string_array() {
        assert_eq!(
            decode(0x6E, &[0, 0, 0, 2, 0, 0, 0, 1, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap(),
            ProtocolValue::Int32Array(vec![1, -1])
        );
        assert_eq!(
            decode(0x61, &[0, 2, 0, 1, b'x', 0, 0]).unwrap(),
            ProtocolValue::StringArray(vec!["x".into(), String::new()])
        );
    }

    #[test]
    fn test_typed_array_of_bytes_converts() {
        let value = decode(0x79, &[0, 2, 0x62, 7, 9]).unwrap();
        assert_eq!(value.to_bytes(), Some(vec![7, 9]));
        assert_eq!(value.to_int_list(), Some(vec![Some(7), Some(9)]));
    }

    #[test]
    fn test_depth_limit() {
        // ObjectArray nested inside itself beyond the limit
        let mut bytes = Vec::new();
        for _ in 0..4 {
            bytes.extend_from_slice(&[0, 1, 0x7A]);
        }
        bytes.extend_from_slice(&[0, 0]);
        let mut cursor = ByteCursor::new(&bytes);
        let err = ValueReader::new(2).read(0x7A, &mut cursor).unwrap_err();
        assert!(matches!(err, ProtocolError::NestingTooDeep { depth: 2 }));

        let mut cursor = ByteCursor::new(&bytes);
        assert!(ValueReader::new(8).read(0x7A, &mut cursor).is_ok());
    }

    #[test]
    fn test_truncated_dictionary_fails() {
        // key=String value=Int32 count=1 but the value is missing
        let bytes = [0x73, 0x69, 0, 1, 0, 1, b'k'];
        assert!(matches!(
            decode(0x44, &bytes),
            Err(ProtocolError::OutOfBounds { .. })
        ));
    }
}
