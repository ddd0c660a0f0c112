//! Value slot and event descriptor types
//!
//! Defines the wire data types understood by the master board and the
//! immutable descriptors that the state table is assembled from.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Data type of a value slot, as declared in the console definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
}

impl DataType {
    /// Number of bytes the value occupies on the wire
    pub const fn size(self) -> usize {
        match self {
            DataType::Bool | DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 => 4,
        }
    }

    /// C type name used by the firmware (e.g. `uint32_t`)
    pub const fn c_name(self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::U8 => "uint8_t",
            DataType::I8 => "int8_t",
            DataType::U16 => "uint16_t",
            DataType::I16 => "int16_t",
            DataType::U32 => "uint32_t",
            DataType::I32 => "int32_t",
        }
    }

    /// Type tag used by the tablet manager (e.g. `TYPE_UINT32`)
    pub const fn type_tag(self) -> &'static str {
        match self {
            DataType::Bool => "TYPE_BOOL",
            DataType::U8 => "TYPE_UINT8",
            DataType::I8 => "TYPE_INT8",
            DataType::U16 => "TYPE_UINT16",
            DataType::I16 => "TYPE_INT16",
            DataType::U32 => "TYPE_UINT32",
            DataType::I32 => "TYPE_INT32",
        }
    }

    fn range(self) -> (i64, i64) {
        match self {
            DataType::Bool => (0, 1),
            DataType::U8 => (u8::MIN.into(), u8::MAX.into()),
            DataType::I8 => (i8::MIN.into(), i8::MAX.into()),
            DataType::U16 => (u16::MIN.into(), u16::MAX.into()),
            DataType::I16 => (i16::MIN.into(), i16::MAX.into()),
            DataType::U32 => (u32::MIN.into(), u32::MAX.into()),
            DataType::I32 => (i32::MIN.into(), i32::MAX.into()),
        }
    }

    /// Parse user text into the little-endian wire bytes for this type
    ///
    /// Booleans accept `true`/`True`/`false`/`False`. Integers are decimal and
    /// must fit the type's range.
    pub fn parse(self, text: &str) -> Result<Vec<u8>, ValueError> {
        if self == DataType::Bool {
            return match text {
                "true" | "True" => Ok(vec![1]),
                "false" | "False" => Ok(vec![0]),
                _ => Err(ValueError::NotABool(text.to_string())),
            };
        }

        let value: i64 = text.trim().parse().map_err(|_| ValueError::NotAnInteger {
            text: text.to_string(),
            ty: self,
        })?;

        let (min, max) = self.range();
        if value < min || value > max {
            return Err(ValueError::OutOfRange { value, ty: self });
        }

        // Range checked above, so the narrowing casts are lossless
        let bytes = match self {
            DataType::Bool => unreachable!("bool handled above"),
            DataType::U8 => (value as u8).to_le_bytes().to_vec(),
            DataType::I8 => (value as i8).to_le_bytes().to_vec(),
            DataType::U16 => (value as u16).to_le_bytes().to_vec(),
            DataType::I16 => (value as i16).to_le_bytes().to_vec(),
            DataType::U32 => (value as u32).to_le_bytes().to_vec(),
            DataType::I32 => (value as i32).to_le_bytes().to_vec(),
        };
        Ok(bytes)
    }

    /// Decode exactly `size()` little-endian bytes into a typed value
    pub fn decode(self, bytes: &[u8]) -> Result<TypedValue, ValueError> {
        if bytes.len() != self.size() {
            return Err(ValueError::WrongLength {
                ty: self,
                expected: self.size(),
                got: bytes.len(),
            });
        }

        let value = match self {
            DataType::Bool => return Ok(TypedValue::Bool(bytes[0] != 0)),
            DataType::U8 => i64::from(bytes[0]),
            DataType::I8 => i64::from(bytes[0] as i8),
            DataType::U16 => i64::from(u16::from_le_bytes([bytes[0], bytes[1]])),
            DataType::I16 => i64::from(i16::from_le_bytes([bytes[0], bytes[1]])),
            DataType::U32 => i64::from(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            DataType::I32 => i64::from(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        };
        Ok(TypedValue::Int(value))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

/// A decoded value received from the master
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    Bool(bool),
    Int(i64),
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Bool(b) => write!(f, "{}", b),
            TypedValue::Int(n) => write!(f, "{}", n),
        }
    }
}

/// Errors converting between user text, wire bytes and typed values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("{0:?} is not a bool")]
    NotABool(String),

    #[error("{text:?} is not a valid {ty} value")]
    NotAnInteger { text: String, ty: DataType },

    #[error("{value} does not fit in {ty}")]
    OutOfRange { value: i64, ty: DataType },

    #[error("{ty} needs {expected} bytes, got {got}")]
    WrongLength {
        ty: DataType,
        expected: usize,
        got: usize,
    },
}

/// Typed, addressable register exposed by the master controller
///
/// Describes the slot only; reading and writing the register is the
/// manager's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct HardwareValue {
    address: u8,
    default_value: u32,
    data_type: DataType,
}

impl HardwareValue {
    pub const fn new(address: u8, default_value: u32, data_type: DataType) -> Self {
        Self {
            address,
            default_value,
            data_type,
        }
    }

    pub const fn address(&self) -> u8 {
        self.address
    }

    pub const fn default_value(&self) -> u32 {
        self.default_value
    }

    pub const fn data_type(&self) -> DataType {
        self.data_type
    }
}

/// Tablet-side value slot (never forwarded to hardware)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LocalValue {
    index: u8,
    data_type: DataType,
}

impl LocalValue {
    pub const fn new(index: u8, data_type: DataType) -> Self {
        Self { index, data_type }
    }

    pub const fn index(&self) -> u8 {
        self.index
    }

    pub const fn data_type(&self) -> DataType {
        self.data_type
    }
}

/// Tablet-local event marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LocalEvent {
    index: u8,
    flag: u8,
}

impl LocalEvent {
    pub const fn new(index: u8, flag: u8) -> Self {
        Self { index, flag }
    }

    pub const fn index(&self) -> u8 {
        self.index
    }

    pub const fn flag(&self) -> u8 {
        self.flag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_match_c_types() {
        assert_eq!(DataType::Bool.size(), 1);
        assert_eq!(DataType::I8.size(), 1);
        assert_eq!(DataType::U16.size(), 2);
        assert_eq!(DataType::I32.size(), 4);
        assert_eq!(DataType::U32.size(), 4);
    }

    #[test]
    fn test_c_names_and_type_tags() {
        assert_eq!(DataType::U32.c_name(), "uint32_t");
        assert_eq!(DataType::I8.to_string(), "int8_t");
        assert_eq!(DataType::Bool.c_name(), "bool");
        assert_eq!(DataType::U32.type_tag(), "TYPE_UINT32");
        assert_eq!(DataType::I16.type_tag(), "TYPE_INT16");
    }

    #[test]
    fn test_parse_u32_little_endian() {
        assert_eq!(DataType::U32.parse("300").unwrap(), vec![0x2C, 0x01, 0x00, 0x00]);
        assert_eq!(
            DataType::U32.parse("4294967295").unwrap(),
            vec![0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_parse_signed() {
        assert_eq!(DataType::I16.parse("-2").unwrap(), vec![0xFE, 0xFF]);
        assert_eq!(DataType::I8.parse("-128").unwrap(), vec![0x80]);
    }

    #[test]
    fn test_parse_bool_spellings() {
        assert_eq!(DataType::Bool.parse("true").unwrap(), vec![1]);
        assert_eq!(DataType::Bool.parse("True").unwrap(), vec![1]);
        assert_eq!(DataType::Bool.parse("False").unwrap(), vec![0]);
        assert_eq!(
            DataType::Bool.parse("yes"),
            Err(ValueError::NotABool("yes".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert_eq!(
            DataType::U8.parse("256"),
            Err(ValueError::OutOfRange { value: 256, ty: DataType::U8 })
        );
        assert!(matches!(DataType::U32.parse("-1"), Err(ValueError::OutOfRange { .. })));
        assert!(matches!(DataType::U16.parse("abc"), Err(ValueError::NotAnInteger { .. })));
    }

    #[test]
    fn test_decode() {
        assert_eq!(
            DataType::U32.decode(&[0x2C, 0x01, 0x00, 0x00]).unwrap(),
            TypedValue::Int(300)
        );
        assert_eq!(DataType::I16.decode(&[0xFE, 0xFF]).unwrap(), TypedValue::Int(-2));
        assert_eq!(DataType::Bool.decode(&[1]).unwrap(), TypedValue::Bool(true));
        assert_eq!(
            DataType::U16.decode(&[1]),
            Err(ValueError::WrongLength { ty: DataType::U16, expected: 2, got: 1 })
        );
    }

    #[test]
    fn test_descriptors_keep_construction_arguments() {
        let slot = HardwareValue::new(2, 0, DataType::U32);
        assert_eq!(slot.address(), 2);
        assert_eq!(slot.default_value(), 0);
        assert_eq!(slot.data_type(), DataType::U32);

        let event = LocalEvent::new(1, 0);
        assert_eq!(event.index(), 1);
        assert_eq!(event.flag(), 0);

        let local = LocalValue::new(3, DataType::I8);
        assert_eq!(local.index(), 3);
        assert_eq!(local.data_type(), DataType::I8);
    }
}
