//! Declared column types with type-specific attributes.
//!
//! Note: Nullability is a column property, not a type property.

use crate::codec::ScaledDecimal;
use crate::error::{Error, Result};

use super::value::SqlValue;

/// Declared SQL type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    SmallInt,
    Integer,
    BigInt,
    /// NUMERIC(precision, scale) - exact fixed-point.
    Numeric { precision: u8, scale: u8 },
    /// DECIMAL(precision, scale) - exact fixed-point.
    Decimal { precision: u8, scale: u8 },
    Float,
    Double,
    /// VARCHAR(max_len) - variable-length string.
    Varchar { max_len: u32 },
    /// CHAR(max_len) - fixed-length string.
    Char { max_len: u32 },
    Boolean,
    Date,
    Timestamp,
    Blob,
}

impl SqlType {
    /// Whether values of this type go through the fixed-point codec.
    pub fn is_fixed_point(&self) -> bool {
        matches!(self, SqlType::Numeric { .. } | SqlType::Decimal { .. })
    }

    /// Get precision (for fixed-point types, 0 otherwise).
    pub fn precision(&self) -> u8 {
        match self {
            SqlType::Numeric { precision, .. } | SqlType::Decimal { precision, .. } => *precision,
            _ => 0,
        }
    }

    /// Get scale (for fixed-point types, 0 otherwise).
    pub fn scale(&self) -> u8 {
        match self {
            SqlType::Numeric { scale, .. } | SqlType::Decimal { scale, .. } => *scale,
            _ => 0,
        }
    }

    /// Get max_len (for Varchar/Char, 0 otherwise).
    pub fn max_len(&self) -> u32 {
        match self {
            SqlType::Varchar { max_len } | SqlType::Char { max_len } => *max_len,
            _ => 0,
        }
    }

    /// Check `value` against this type and convert it to the value kind the
    /// column stores.
    ///
    /// Fixed-point values are not rounded here; rounding to the column scale
    /// happens when the value is bound.
    pub fn coerce(&self, column: &str, value: SqlValue) -> Result<SqlValue> {
        let mismatch = |value: &SqlValue| Error::type_mismatch(column, self, value.kind());

        let coerced = match (self, value) {
            (_, SqlValue::Null) => SqlValue::Null,

            (SqlType::SmallInt, SqlValue::Integer(v)) => {
                check_range(column, self, v, i64::from(i16::MIN), i64::from(i16::MAX))?
            }
            (SqlType::Integer, SqlValue::Integer(v)) => {
                check_range(column, self, v, i64::from(i32::MIN), i64::from(i32::MAX))?
            }
            (SqlType::BigInt, SqlValue::Integer(v)) => SqlValue::Integer(v),

            (t, SqlValue::Integer(v)) if t.is_fixed_point() => {
                SqlValue::Decimal(ScaledDecimal::from(v))
            }
            (t, SqlValue::Decimal(d)) if t.is_fixed_point() => SqlValue::Decimal(d),
            (t, SqlValue::Double(v)) if t.is_fixed_point() => {
                if !v.is_finite() {
                    return Err(Error::type_mismatch(column, self, "non-finite double"));
                }
                // Shortest round-trip text of the double, then exact from there.
                // Magnitude is checked against the column when the value is bound.
                SqlValue::Decimal(format!("{}", v).parse::<ScaledDecimal>()?)
            }

            (SqlType::Float | SqlType::Double, SqlValue::Double(v)) => SqlValue::Double(v),
            (SqlType::Float | SqlType::Double, SqlValue::Integer(v)) => SqlValue::Double(v as f64),
            (SqlType::Float | SqlType::Double, SqlValue::Decimal(d)) => {
                SqlValue::Double(d.to_f64())
            }

            (SqlType::Varchar { max_len } | SqlType::Char { max_len }, SqlValue::Text(s)) => {
                let len = s.chars().count();
                if len > *max_len as usize {
                    return Err(Error::type_mismatch(
                        column,
                        self,
                        format!("text of length {}", len),
                    ));
                }
                SqlValue::Text(s)
            }

            (SqlType::Boolean, SqlValue::Boolean(b)) => SqlValue::Boolean(b),
            (SqlType::Date, SqlValue::Date(d)) => SqlValue::Date(d),
            (SqlType::Timestamp, SqlValue::Timestamp(ts)) => SqlValue::Timestamp(ts),
            (SqlType::Timestamp, SqlValue::Date(d)) => match d.and_hms_opt(0, 0, 0) {
                Some(ts) => SqlValue::Timestamp(ts),
                None => return Err(Error::type_mismatch(column, self, "date")),
            },
            (SqlType::Blob, SqlValue::Binary(b)) => SqlValue::Binary(b),
            (SqlType::Blob, SqlValue::Text(s)) => SqlValue::Binary(s.into_bytes()),

            (_, other) => return Err(mismatch(&other)),
        };
        Ok(coerced)
    }
}

fn check_range(column: &str, ty: &SqlType, v: i64, min: i64, max: i64) -> Result<SqlValue> {
    if v < min || v > max {
        return Err(Error::Overflow {
            column: Some(column.to_string()),
            value: v.to_string(),
            target: ty.to_string(),
        });
    }
    Ok(SqlValue::Integer(v))
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlType::SmallInt => write!(f, "SMALLINT"),
            SqlType::Integer => write!(f, "INTEGER"),
            SqlType::BigInt => write!(f, "BIGINT"),
            SqlType::Numeric { precision, scale } => write!(f, "NUMERIC({},{})", precision, scale),
            SqlType::Decimal { precision, scale } => write!(f, "DECIMAL({},{})", precision, scale),
            SqlType::Float => write!(f, "FLOAT"),
            SqlType::Double => write!(f, "DOUBLE PRECISION"),
            SqlType::Varchar { max_len } => write!(f, "VARCHAR({})", max_len),
            SqlType::Char { max_len } => write!(f, "CHAR({})", max_len),
            SqlType::Boolean => write!(f, "BOOLEAN"),
            SqlType::Date => write!(f, "DATE"),
            SqlType::Timestamp => write!(f, "TIMESTAMP"),
            SqlType::Blob => write!(f, "BLOB"),
        }
    }
}
