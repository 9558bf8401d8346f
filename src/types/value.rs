//! Typed values exchanged between stages, sub-procedures and clients.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Column and parameter types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Decimal,
    String,
    Varbinary,
    Timestamp,
}

impl ColumnType {
    /// True for the four integer widths.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::TinyInt => "TINYINT",
            ColumnType::SmallInt => "SMALLINT",
            ColumnType::Integer => "INTEGER",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Float => "FLOAT",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::String => "VARCHAR",
            ColumnType::Varbinary => "VARBINARY",
            ColumnType::Timestamp => "TIMESTAMP",
        };
        f.write_str(name)
    }
}

/// A single typed value.
///
/// `Null` is typeless and acceptable wherever a value of any column type is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f64),
    Decimal(Decimal),
    String(String),
    Varbinary(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// The column type of this value, or `None` for `Null`.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::TinyInt(_) => Some(ColumnType::TinyInt),
            Value::SmallInt(_) => Some(ColumnType::SmallInt),
            Value::Integer(_) => Some(ColumnType::Integer),
            Value::BigInt(_) => Some(ColumnType::BigInt),
            Value::Float(_) => Some(ColumnType::Float),
            Value::Decimal(_) => Some(ColumnType::Decimal),
            Value::String(_) => Some(ColumnType::String),
            Value::Varbinary(_) => Some(ColumnType::Varbinary),
            Value::Timestamp(_) => Some(ColumnType::Timestamp),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer content widened to i64, if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(i64::from(*v)),
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Integer(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert this value to `target`, applying the parameter coercion rules.
    ///
    /// Integers convert to any integer type they fit in, and to float or
    /// decimal. Floats convert to decimal. Everything else must already match.
    /// Returns `None` when the conversion would lose information or is not allowed.
    pub fn coerce_to(&self, target: ColumnType) -> Option<Value> {
        if self.is_null() {
            return Some(Value::Null);
        }
        if self.column_type() == Some(target) {
            return Some(self.clone());
        }
        if let Some(v) = self.as_i64() {
            return match target {
                ColumnType::TinyInt => i8::try_from(v).ok().map(Value::TinyInt),
                ColumnType::SmallInt => i16::try_from(v).ok().map(Value::SmallInt),
                ColumnType::Integer => i32::try_from(v).ok().map(Value::Integer),
                ColumnType::BigInt => Some(Value::BigInt(v)),
                ColumnType::Float => Some(Value::Float(v as f64)),
                ColumnType::Decimal => Some(Value::Decimal(Decimal::from(v))),
                _ => None,
            };
        }
        match (self, target) {
            (Value::Float(v), ColumnType::Decimal) => Decimal::from_f64_retain(*v).map(Value::Decimal),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::TinyInt(v) => write!(f, "{v}"),
            Value::SmallInt(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
            Value::Varbinary(b) => {
                for byte in b {
                    write!(f, "{byte:02X}")?;
                }
                Ok(())
            }
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::TinyInt(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Varbinary(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widening() {
        assert_eq!(
            Value::TinyInt(7).coerce_to(ColumnType::BigInt),
            Some(Value::BigInt(7))
        );
        assert_eq!(
            Value::BigInt(12).coerce_to(ColumnType::Integer),
            Some(Value::Integer(12))
        );
    }

    #[test]
    fn test_integer_narrowing_overflow_rejected() {
        assert_eq!(Value::BigInt(300).coerce_to(ColumnType::TinyInt), None);
    }

    #[test]
    fn test_string_does_not_coerce_to_integer() {
        assert_eq!(Value::from("arg2").coerce_to(ColumnType::Integer), None);
    }

    #[test]
    fn test_null_accepted_for_any_type() {
        assert_eq!(Value::Null.coerce_to(ColumnType::Timestamp), Some(Value::Null));
    }

    #[test]
    fn test_integer_to_decimal() {
        assert_eq!(
            Value::Integer(5).coerce_to(ColumnType::Decimal),
            Some(Value::Decimal(Decimal::from(5)))
        );
    }

    #[test]
    fn test_varbinary_display_is_hex() {
        assert_eq!(Value::Varbinary(vec![0x0a, 0xff]).to_string(), "0AFF");
    }

    #[test]
    fn test_option_into_value() {
        let none: Option<i64> = None;
        assert_eq!(Value::from(none), Value::Null);
        assert_eq!(Value::from(Some(3i64)), Value::BigInt(3));
    }
}
