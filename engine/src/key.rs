//! Keys for primary and secondary lookups.
//!
//! Records are plain JSON objects. A collection declares a key path; the
//! value found at that path becomes the record's [`Key`]. Secondary indexes
//! work the same way with their own key paths.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A primary or index key.
///
/// Integers sort before strings, so a collection keyed by numeric ids
/// iterates in numeric order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Text(String),
}

impl Key {
    /// Extract a key from a JSON value.
    ///
    /// Integral numbers and strings are keys. Floats with a fractional part,
    /// booleans, null, arrays and objects are not.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Key::Int(i))
                } else {
                    n.as_f64()
                        .filter(|f| f.is_finite() && f.fract() == 0.0)
                        .map(|f| Key::Int(f as i64))
                }
            }
            Value::String(s) => Some(Key::Text(s.clone())),
            _ => None,
        }
    }

    /// Read the key stored at `key_path` in a record.
    pub fn extract(record: &Value, key_path: &str) -> Option<Self> {
        record.get(key_path).and_then(Self::from_value)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{}", i),
            Key::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value.into())
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Text(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_from_values() {
        assert_eq!(Key::from_value(&json!(42)), Some(Key::Int(42)));
        assert_eq!(Key::from_value(&json!(42.0)), Some(Key::Int(42)));
        assert_eq!(Key::from_value(&json!("Downtown")), Some(Key::from("Downtown")));
        assert_eq!(Key::from_value(&json!(4.5)), None);
        assert_eq!(Key::from_value(&json!(true)), None);
        assert_eq!(Key::from_value(&json!(null)), None);
        assert_eq!(Key::from_value(&json!({"id": 1})), None);
    }

    #[test]
    fn extract_from_record() {
        let record = json!({"id": 7, "cuisine_type": "Asian"});
        assert_eq!(Key::extract(&record, "id"), Some(Key::Int(7)));
        assert_eq!(Key::extract(&record, "cuisine_type"), Some(Key::from("Asian")));
        assert_eq!(Key::extract(&record, "neighborhood"), None);
    }

    #[test]
    fn integers_sort_before_strings() {
        let mut keys = vec![Key::from("a"), Key::Int(10), Key::Int(2)];
        keys.sort();
        assert_eq!(keys, vec![Key::Int(2), Key::Int(10), Key::from("a")]);
    }

    #[test]
    fn string_and_number_keys_differ() {
        // "42" and 42 are distinct keys, like in IndexedDB.
        assert_ne!(Key::from("42"), Key::Int(42));
    }
}
