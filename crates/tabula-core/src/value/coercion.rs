use super::{DATE_FORMAT, DATE_TIME_FORMAT, Value};
use crate::model::TypeAffinity;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error as ThisError;

///
/// CoercionError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CoercionError {
    #[error("cannot convert {from} value to {to}")]
    Incompatible { from: &'static str, to: &'static str },

    #[error("value {value} is out of range for {to}")]
    OutOfRange { value: String, to: &'static str },

    #[error("cannot parse '{text}' as {to}")]
    Parse { text: String, to: &'static str },
}

impl Value {
    /// Convert to the representation a column of `affinity` stores.
    ///
    /// Null and array values pass through unchanged, as does anything
    /// targeted at `Other`.
    pub fn coerce_to(self, affinity: TypeAffinity) -> Result<Self, CoercionError> {
        if matches!(self, Self::Null | Self::Array(_)) {
            return Ok(self);
        }

        match affinity {
            TypeAffinity::Boolean => to_bool(self).map(Self::Bool),
            TypeAffinity::Integer => to_int(self).map(Self::Int),
            TypeAffinity::Float | TypeAffinity::Decimal => to_float(self).map(Self::Float),
            TypeAffinity::Text | TypeAffinity::Guid => to_text(self).map(Self::Text),
            TypeAffinity::Date => to_date(self).map(Self::Date),
            TypeAffinity::DateTime => to_date_time(self).map(Self::DateTime),
            TypeAffinity::Binary => to_blob(self).map(Self::Blob),
            TypeAffinity::Array | TypeAffinity::Other => Ok(self),
        }
    }
}

const fn incompatible(value: &Value, to: &'static str) -> CoercionError {
    CoercionError::Incompatible {
        from: value.kind(),
        to,
    }
}

fn parse_error(text: &str, to: &'static str) -> CoercionError {
    CoercionError::Parse {
        text: text.to_string(),
        to,
    }
}

fn to_bool(value: Value) -> Result<bool, CoercionError> {
    match value {
        Value::Bool(v) => Ok(v),
        Value::Int(v) => Ok(v != 0),
        Value::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(parse_error(&text, "bool")),
        },
        other => Err(incompatible(&other, "bool")),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn to_int(value: Value) -> Result<i64, CoercionError> {
    match value {
        Value::Int(v) => Ok(v),
        Value::Bool(v) => Ok(i64::from(v)),
        Value::Float(v) => {
            if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
                Ok(v as i64)
            } else {
                Err(CoercionError::OutOfRange {
                    value: v.to_string(),
                    to: "int",
                })
            }
        }
        Value::Text(text) => text.trim().parse().map_err(|_| parse_error(&text, "int")),
        other => Err(incompatible(&other, "int")),
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_float(value: Value) -> Result<f64, CoercionError> {
    match value {
        Value::Float(v) => Ok(v),
        Value::Int(v) => Ok(v as f64),
        Value::Text(text) => text.trim().parse().map_err(|_| parse_error(&text, "float")),
        other => Err(incompatible(&other, "float")),
    }
}

fn to_text(value: Value) -> Result<String, CoercionError> {
    match value {
        Value::Text(v) => Ok(v),
        Value::Blob(_) => Err(CoercionError::Incompatible {
            from: "blob",
            to: "text",
        }),
        other => Ok(other.to_string()),
    }
}

fn to_date(value: Value) -> Result<NaiveDate, CoercionError> {
    match value {
        Value::Date(v) => Ok(v),
        Value::DateTime(v) => Ok(v.date()),
        Value::Text(text) => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
            .or_else(|_| parse_date_time(&text).map(|dt| dt.date()))
            .map_err(|_| parse_error(&text, "date")),
        other => Err(incompatible(&other, "date")),
    }
}

fn to_date_time(value: Value) -> Result<NaiveDateTime, CoercionError> {
    match value {
        Value::DateTime(v) => Ok(v),
        Value::Date(v) => Ok(v.and_time(NaiveTime::MIN)),
        Value::Text(text) => parse_date_time(&text).map_err(|_| parse_error(&text, "datetime")),
        other => Err(incompatible(&other, "datetime")),
    }
}

fn parse_date_time(text: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, DATE_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
}

fn to_blob(value: Value) -> Result<Vec<u8>, CoercionError> {
    match value {
        Value::Blob(v) => Ok(v),
        Value::Text(text) => Ok(text.into_bytes()),
        other => Err(incompatible(&other, "blob")),
    }
}

///
/// FromValue
///
/// Typed extraction from a column value, with coercion from other
/// representable kinds. `null_default` is what an absent or SQL-null
/// column reads as.
///

pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, CoercionError>;

    fn null_default() -> Self;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        Ok(value.clone())
    }

    fn null_default() -> Self {
        Self::Null
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }

    fn null_default() -> Self {
        None
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        to_bool(value.clone())
    }

    fn null_default() -> Self {
        false
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        to_int(value.clone())
    }

    fn null_default() -> Self {
        0
    }
}

macro_rules! from_value_narrow_int {
    ( $( $ty:ty ),* $(,)? ) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, CoercionError> {
                    let wide = to_int(value.clone())?;
                    Self::try_from(wide).map_err(|_| CoercionError::OutOfRange {
                        value: wide.to_string(),
                        to: stringify!($ty),
                    })
                }

                fn null_default() -> Self {
                    0
                }
            }
        )*
    };
}

from_value_narrow_int!(i8, i16, i32, u8, u16, u32, u64);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        to_float(value.clone())
    }

    fn null_default() -> Self {
        0.0
    }
}

impl FromValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        to_float(value.clone()).map(|v| v as Self)
    }

    fn null_default() -> Self {
        0.0
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        to_text(value.clone())
    }

    fn null_default() -> Self {
        Self::new()
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        to_blob(value.clone())
    }

    fn null_default() -> Self {
        Self::new()
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        to_date(value.clone())
    }

    fn null_default() -> Self {
        Self::default()
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        to_date_time(value.clone())
    }

    fn null_default() -> Self {
        Self::default()
    }
}
