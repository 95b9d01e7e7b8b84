//! Text-to-value conversion for store column types.
//!
//! The same parsers back both [`convert`] and type inference, so a value that
//! makes a candidate type plausible during inference also converts to it.

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use super::mapping::StoreType;
use crate::error::ConversionError;

/// ISO calendar date format (`YYYY-MM-DD`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// ISO combined date and time formats accepted for `DateTime` values.
const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Format ClickHouse expects for `DateTime` values in text formats.
const WIRE_DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A converted value in its typed form.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Boolean(bool),
    Uuid(Uuid),
    String(String),
}

impl Value {
    /// Render the value the way the store reads it in delimited text.
    #[must_use]
    pub fn to_wire(&self) -> String {
        match self {
            Value::Int32(v) => v.to_string(),
            Value::Int64(v) => v.to_string(),
            // `{:?}` keeps the fractional part of integral values
            Value::Float64(v) => format!("{v:?}"),
            Value::Date(v) => v.format(DATE_FORMAT).to_string(),
            Value::DateTime(v) => v.format(WIRE_DATE_TIME_FORMAT).to_string(),
            Value::Boolean(v) => v.to_string(),
            Value::Uuid(v) => v.hyphenated().to_string(),
            Value::String(v) => v.clone(),
        }
    }
}

/// Convert a text value to the representation of `store_type`.
///
/// Missing and empty input converts to `None` for every type. Types without a
/// dedicated parser pass the text through unchanged as [`Value::String`].
///
/// # Errors
///
/// Returns `ConversionError` naming the value and the target type when the text
/// does not parse.
///
/// # Example
///
/// ```
/// use clickflat::types::{convert, StoreType, Value};
///
/// assert_eq!(convert(Some("42"), &StoreType::Int32).unwrap(), Some(Value::Int32(42)));
/// assert_eq!(convert(Some(""), &StoreType::Int32).unwrap(), None);
/// assert!(convert(Some("forty-two"), &StoreType::Int32).is_err());
/// ```
pub fn convert(
    value: Option<&str>,
    store_type: &StoreType,
) -> Result<Option<Value>, ConversionError> {
    let text = match value {
        Some(text) if !text.is_empty() => text,
        _ => return Ok(None),
    };

    let err = |message: &dyn ToString| {
        ConversionError::new(text, store_type.type_name(), message.to_string())
    };

    let converted = match store_type {
        StoreType::Int32 => Value::Int32(text.parse::<i32>().map_err(|e| err(&e))?),
        StoreType::Int64 => Value::Int64(text.parse::<i64>().map_err(|e| err(&e))?),
        StoreType::Float64 => {
            Value::Float64(parse_float(text).ok_or_else(|| err(&"expected a decimal number"))?)
        }
        StoreType::Date => {
            Value::Date(parse_date(text).ok_or_else(|| err(&"expected YYYY-MM-DD"))?)
        }
        StoreType::DateTime => Value::DateTime(
            parse_date_time(text).ok_or_else(|| err(&"expected YYYY-MM-DD[T| ]HH:MM[:SS[.fff]]"))?,
        ),
        StoreType::Boolean => Value::Boolean(
            parse_boolean(text).ok_or_else(|| err(&"expected true/false, 1/0 or yes/no"))?,
        ),
        StoreType::Uuid => Value::Uuid(Uuid::parse_str(text).map_err(|e| err(&e))?),
        StoreType::String | StoreType::Other(_) => Value::String(text.to_string()),
    };

    Ok(Some(converted))
}

/// Whether `text` parses as `store_type`.
pub(crate) fn is_plausible(text: &str, store_type: &StoreType) -> bool {
    match store_type {
        StoreType::Int32 => text.parse::<i32>().is_ok(),
        StoreType::Int64 => text.parse::<i64>().is_ok(),
        StoreType::Float64 => parse_float(text).is_some(),
        StoreType::Date => parse_date(text).is_some(),
        StoreType::DateTime => parse_date_time(text).is_some(),
        StoreType::Boolean => parse_boolean(text).is_some(),
        StoreType::Uuid => Uuid::parse_str(text).is_ok(),
        StoreType::String | StoreType::Other(_) => true,
    }
}

/// Parse a strict `YYYY-MM-DD` date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    // chrono accepts unpadded fields; the ISO form is always ten characters.
    if text.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}

/// Parse a decimal number. Words such as `NaN` or `inf` are not numbers here.
pub fn parse_float(text: &str) -> Option<f64> {
    if !text.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Parse a `YYYY-MM-DDTHH:MM[:SS[.fraction]]` date-time. A space may stand
/// in for the `T`, which is how the store writes date-times.
pub fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let separated = matches!(text.as_bytes().get(10), Some(b'T' | b' '));
    if !separated || parse_date(&text[..10]).is_none() {
        return None;
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

/// Parse a boolean from `true/false`, `1/0` or `yes/no`, ignoring case.
pub fn parse_boolean(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
