//! Lenient field coercion for backend payloads.
//!
//! The backend is loose about types: ids and ratings arrive as numbers or
//! numeric strings, and the favorite flag arrives as a boolean, the string
//! `"true"`/`"false"`, or not at all. Everything is normalized at the
//! deserialization boundary so the rest of the crate only sees strict types.

use serde::de::{Deserialize, Deserializer, Error as _};
use serde_json::Value;

/// Parse an integer the way a browser's `parseInt` does.
///
/// Numbers are truncated toward zero. Strings may have leading whitespace
/// and a sign, and are read up to the first non-digit (`"5 stars"` is 5).
/// Anything without leading digits is `None`.
pub fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => parse_int_str(s),
        _ => None,
    }
}

fn parse_int_str(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let sign_len = match s.as_bytes().first() {
        Some(b'-') | Some(b'+') => 1,
        _ => 0,
    };

    let rest = &s[sign_len..];
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }

    s[..sign_len + digits_end].parse().ok()
}

/// Normalize a favorite flag to a strict boolean.
///
/// `true` and `"true"` are true. Everything else, including a missing
/// value, is false.
pub fn favorite_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

pub(crate) fn integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_int(&value).ok_or_else(|| D::Error::custom(format!("expected an integer, got {}", value)))
}

pub(crate) fn optional_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_int(&value))
}

pub(crate) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(favorite_flag(&value))
}

pub(crate) fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Text field where `null` (or any non-text value) reads as empty.
pub(crate) fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_text(deserializer)?.unwrap_or_default())
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
