use crate::common::BinarySerializable;
use crate::DateTime;
use chrono::{TimeZone, Utc};
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io;
use std::io::{Read, Write};

/// Value stored in a document field.
///
/// Indexed values must be `Str`; the other variants exist for stored-only
/// and column data.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    U64(u64),
    I64(i64),
    F64(f64),
    Date(DateTime),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn text(&self) -> Option<&str> {
        match *self {
            Value::Str(ref text) => Some(text),
            _ => None,
        }
    }

    pub fn u64_value(&self) -> Option<u64> {
        match *self {
            Value::U64(val) => Some(val),
            _ => None,
        }
    }

    pub fn i64_value(&self) -> Option<i64> {
        match *self {
            Value::I64(val) => Some(val),
            _ => None,
        }
    }

    pub fn f64_value(&self) -> Option<f64> {
        match *self {
            Value::F64(val) => Some(val),
            _ => None,
        }
    }

    pub fn date_value(&self) -> Option<&DateTime> {
        match *self {
            Value::Date(ref date) => Some(date),
            _ => None,
        }
    }

    pub fn bytes_value(&self) -> Option<&[u8]> {
        match *self {
            Value::Bytes(ref bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Value::Str(ref text) => serializer.serialize_str(text),
            Value::U64(val) => serializer.serialize_u64(val),
            Value::I64(val) => serializer.serialize_i64(val),
            Value::F64(val) => serializer.serialize_f64(val),
            Value::Date(ref date) => serializer.serialize_str(&date.to_rfc3339()),
            Value::Bytes(ref bytes) => serializer.serialize_str(&base64::encode(bytes)),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or a number")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Value, E> {
                Ok(Value::U64(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Value, E> {
                Ok(Value::I64(v))
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Value, E> {
                Ok(Value::F64(v))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Value, E> {
                Ok(Value::Str(v.to_string()))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

const STR_CODE: u8 = 0;
const U64_CODE: u8 = 1;
const I64_CODE: u8 = 2;
const F64_CODE: u8 = 3;
const DATE_CODE: u8 = 4;
const BYTES_CODE: u8 = 5;

impl BinarySerializable for Value {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match *self {
            Value::Str(ref text) => {
                BinarySerializable::serialize(&STR_CODE, writer)?;
                BinarySerializable::serialize(text, writer)
            }
            Value::U64(val) => {
                BinarySerializable::serialize(&U64_CODE, writer)?;
                BinarySerializable::serialize(&val, writer)
            }
            Value::I64(val) => {
                BinarySerializable::serialize(&I64_CODE, writer)?;
                BinarySerializable::serialize(&val, writer)
            }
            Value::F64(val) => {
                BinarySerializable::serialize(&F64_CODE, writer)?;
                BinarySerializable::serialize(&val.to_bits(), writer)
            }
            Value::Date(ref date) => {
                BinarySerializable::serialize(&DATE_CODE, writer)?;
                BinarySerializable::serialize(&date.timestamp(), writer)?;
                BinarySerializable::serialize(&date.timestamp_subsec_nanos(), writer)
            }
            Value::Bytes(ref bytes) => {
                BinarySerializable::serialize(&BYTES_CODE, writer)?;
                BinarySerializable::serialize(bytes, writer)
            }
        }
    }

    fn deserialize<R: Read>(reader: &mut R) -> io::Result<Value> {
        let type_code = <u8 as BinarySerializable>::deserialize(reader)?;
        match type_code {
            STR_CODE => Ok(Value::Str(<String as BinarySerializable>::deserialize(reader)?)),
            U64_CODE => Ok(Value::U64(<u64 as BinarySerializable>::deserialize(reader)?)),
            I64_CODE => Ok(Value::I64(<i64 as BinarySerializable>::deserialize(reader)?)),
            F64_CODE => Ok(Value::F64(f64::from_bits(<u64 as BinarySerializable>::deserialize(reader)?))),
            DATE_CODE => {
                let secs = <i64 as BinarySerializable>::deserialize(reader)?;
                let nanos = <u32 as BinarySerializable>::deserialize(reader)?;
                Ok(Value::Date(Utc.timestamp(secs, nanos)))
            }
            BYTES_CODE => Ok(Value::Bytes(<Vec<u8> as BinarySerializable>::deserialize(reader)?)),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown value type code {}", type_code),
            )),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Value {
        Value::Str(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Value {
        Value::Str(text)
    }
}

impl From<u64> for Value {
    fn from(val: u64) -> Value {
        Value::U64(val)
    }
}

impl From<i64> for Value {
    fn from(val: i64) -> Value {
        Value::I64(val)
    }
}

impl From<f64> for Value {
    fn from(val: f64) -> Value {
        Value::F64(val)
    }
}

impl From<DateTime> for Value {
    fn from(date: DateTime) -> Value {
        Value::Date(date)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Value {
        Value::Bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_binary_round_trip() {
        let values = vec![
            Value::Str("hello".to_string()),
            Value::U64(42),
            Value::I64(-42),
            Value::F64(3.5),
            Value::Date(Utc.timestamp(1_500_000_000, 0)),
            Value::Bytes(vec![0, 1, 255]),
        ];
        for value in values {
            let mut buffer = Vec::new();
            BinarySerializable::serialize(&value, &mut buffer).unwrap();
            let restored =
                <Value as BinarySerializable>::deserialize(&mut &buffer[..]).unwrap();
            assert_eq!(restored, value);
        }
    }

    #[test]
    fn test_value_json() {
        assert_eq!(
            serde_json::to_string(&Value::Str("abc".to_string())).unwrap(),
            "\"abc\""
        );
        assert_eq!(serde_json::to_string(&Value::U64(3)).unwrap(), "3");
    }
}
