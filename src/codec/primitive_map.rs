//! Typed property maps carried by `WireFormatInfo` and message properties.
//!
//! Each entry is a modified UTF-8 key followed by a one-byte type code and
//! the value. A map starts with an `i32` entry count, `-1` meaning null.

use std::{
    collections::BTreeMap,
    hash::{Hash, Hasher},
};

use bytes::{BufMut, BytesMut};

use super::{
    data_stream::{DataInput, put_big_utf, put_utf},
    error::ProtocolError,
};

/// Value type codes used inside primitive maps and lists.
pub mod type_code {
    pub const NULL: u8 = 0;
    pub const BOOLEAN: u8 = 1;
    pub const BYTE: u8 = 2;
    pub const CHAR: u8 = 3;
    pub const SHORT: u8 = 4;
    pub const INTEGER: u8 = 5;
    pub const LONG: u8 = 6;
    pub const DOUBLE: u8 = 7;
    pub const FLOAT: u8 = 8;
    pub const STRING: u8 = 9;
    pub const BYTE_ARRAY: u8 = 10;
    pub const MAP: u8 = 11;
    pub const LIST: u8 = 12;
    pub const BIG_STRING: u8 = 13;
}

/// Strings at least this many UTF-16 units long use the 32-bit prefix.
const BIG_STRING_THRESHOLD: usize = 8191;

/// Ordered map of property names to typed values.
pub type PrimitiveMap = BTreeMap<String, PrimitiveValue>;

/// A single typed property value.
///
/// Floating point values compare and hash by bit pattern so that maps can
/// sit inside hashable data structures.
#[derive(Clone, Debug)]
pub enum PrimitiveValue {
    Null,
    Bool(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Map(PrimitiveMap),
    List(Vec<PrimitiveValue>),
}

impl PrimitiveValue {
    fn type_code(&self) -> u8 {
        match self {
            Self::Null => type_code::NULL,
            Self::Bool(_) => type_code::BOOLEAN,
            Self::Byte(_) => type_code::BYTE,
            Self::Char(_) => type_code::CHAR,
            Self::Short(_) => type_code::SHORT,
            Self::Int(_) => type_code::INTEGER,
            Self::Long(_) => type_code::LONG,
            Self::Float(_) => type_code::FLOAT,
            Self::Double(_) => type_code::DOUBLE,
            Self::String(s) if s.encode_utf16().count() >= BIG_STRING_THRESHOLD => {
                type_code::BIG_STRING
            }
            Self::String(_) => type_code::STRING,
            Self::Bytes(_) => type_code::BYTE_ARRAY,
            Self::Map(_) => type_code::MAP,
            Self::List(_) => type_code::LIST,
        }
    }

    /// Returns the boolean payload, if any.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns an integral payload widened to `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Byte(v) => Some(i64::from(*v)),
            Self::Short(v) => Some(i64::from(*v)),
            Self::Int(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for PrimitiveValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Byte(a), Self::Byte(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::Short(a), Self::Short(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PrimitiveValue {}

impl Hash for PrimitiveValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Byte(v) => v.hash(state),
            Self::Char(v) => v.hash(state),
            Self::Short(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Long(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Double(v) => v.to_bits().hash(state),
            Self::String(v) => v.hash(state),
            Self::Bytes(v) => v.hash(state),
            Self::Map(v) => v.hash(state),
            Self::List(v) => v.hash(state),
        }
    }
}

impl From<bool> for PrimitiveValue {
    fn from(value: bool) -> Self { Self::Bool(value) }
}

impl From<i32> for PrimitiveValue {
    fn from(value: i32) -> Self { Self::Int(value) }
}

impl From<i64> for PrimitiveValue {
    fn from(value: i64) -> Self { Self::Long(value) }
}

impl From<&str> for PrimitiveValue {
    fn from(value: &str) -> Self { Self::String(value.to_owned()) }
}

fn length_prefix(what: &'static str, len: usize) -> Result<i32, ProtocolError> {
    i32::try_from(len).map_err(|_| ProtocolError::InvalidLength {
        what,
        len: i32::MAX,
    })
}

/// Writes `map` with its entry count, or `-1` for `None`.
///
/// # Errors
///
/// Returns [`ProtocolError::StringTooLong`] for keys longer than 65535
/// encoded bytes.
pub fn marshal_primitive_map(
    map: Option<&PrimitiveMap>,
    dst: &mut BytesMut,
) -> Result<(), ProtocolError> {
    let Some(map) = map else {
        dst.put_i32(-1);
        return Ok(());
    };
    dst.put_i32(length_prefix("map", map.len())?);
    for (key, value) in map {
        put_utf(dst, key)?;
        marshal_primitive(value, dst)?;
    }
    Ok(())
}

/// Reads a map written by [`marshal_primitive_map`].
///
/// # Errors
///
/// Returns [`ProtocolError`] for truncated input or unknown type codes.
pub fn unmarshal_primitive_map(
    input: &mut DataInput<'_>,
) -> Result<Option<PrimitiveMap>, ProtocolError> {
    let count = input.read_i32()?;
    if count < 0 {
        return Ok(None);
    }
    let mut map = PrimitiveMap::new();
    for _ in 0..count {
        let key = input.read_utf()?;
        let value = unmarshal_primitive(input)?;
        map.insert(key, value);
    }
    Ok(Some(map))
}

fn marshal_primitive(value: &PrimitiveValue, dst: &mut BytesMut) -> Result<(), ProtocolError> {
    let code = value.type_code();
    dst.put_u8(code);
    match value {
        PrimitiveValue::Null => {}
        PrimitiveValue::Bool(v) => dst.put_u8(u8::from(*v)),
        PrimitiveValue::Byte(v) => dst.put_i8(*v),
        PrimitiveValue::Char(v) => dst.put_u16(*v),
        PrimitiveValue::Short(v) => dst.put_i16(*v),
        PrimitiveValue::Int(v) => dst.put_i32(*v),
        PrimitiveValue::Long(v) => dst.put_i64(*v),
        PrimitiveValue::Float(v) => dst.put_f32(*v),
        PrimitiveValue::Double(v) => dst.put_f64(*v),
        PrimitiveValue::String(s) if code == type_code::BIG_STRING => put_big_utf(dst, s)?,
        PrimitiveValue::String(s) => put_utf(dst, s)?,
        PrimitiveValue::Bytes(b) => {
            dst.put_i32(length_prefix("byte array", b.len())?);
            dst.put_slice(b);
        }
        PrimitiveValue::Map(m) => marshal_primitive_map(Some(m), dst)?,
        PrimitiveValue::List(items) => {
            dst.put_i32(length_prefix("list", items.len())?);
            for item in items {
                marshal_primitive(item, dst)?;
            }
        }
    }
    Ok(())
}

fn unmarshal_primitive(input: &mut DataInput<'_>) -> Result<PrimitiveValue, ProtocolError> {
    let value = match input.read_u8()? {
        type_code::NULL => PrimitiveValue::Null,
        type_code::BOOLEAN => PrimitiveValue::Bool(input.read_bool()?),
        type_code::BYTE => PrimitiveValue::Byte(input.read_i8()?),
        type_code::CHAR => PrimitiveValue::Char(input.read_u16()?),
        type_code::SHORT => PrimitiveValue::Short(input.read_i16()?),
        type_code::INTEGER => PrimitiveValue::Int(input.read_i32()?),
        type_code::LONG => PrimitiveValue::Long(input.read_i64()?),
        type_code::FLOAT => PrimitiveValue::Float(input.read_f32()?),
        type_code::DOUBLE => PrimitiveValue::Double(input.read_f64()?),
        type_code::STRING => PrimitiveValue::String(input.read_utf()?),
        type_code::BIG_STRING => PrimitiveValue::String(input.read_big_utf()?),
        type_code::BYTE_ARRAY => {
            let len = read_len(input, "byte array")?;
            PrimitiveValue::Bytes(input.read_vec(len)?)
        }
        type_code::MAP => PrimitiveValue::Map(unmarshal_primitive_map(input)?.unwrap_or_default()),
        type_code::LIST => {
            let len = read_len(input, "list")?;
            let mut items = Vec::with_capacity(len.min(input.remaining()));
            for _ in 0..len {
                items.push(unmarshal_primitive(input)?);
            }
            PrimitiveValue::List(items)
        }
        code => return Err(ProtocolError::InvalidPrimitiveType { code }),
    };
    Ok(value)
}

fn read_len(input: &mut DataInput<'_>, what: &'static str) -> Result<usize, ProtocolError> {
    let len = input.read_i32()?;
    usize::try_from(len).map_err(|_| ProtocolError::InvalidLength { what, len })
}
