//! Dynamically typed value tree exchanged with the host

use std::collections::BTreeMap;

use crate::error::DecodeError;
use crate::types::WireType;

/// JSON string the host uses in place of a value that is not yet known
pub const UNKNOWN_SENTINEL: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// A wire value
///
/// Every node is tri-state: concrete, [`Value::Unknown`] (supplied later, e.g.
/// after another object is applied) or [`Value::Null`] (explicitly absent).
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Value will be known after apply
    Unknown,
    /// Value is explicitly absent
    #[default]
    Null,
    /// String leaf
    String(String),
    /// Bool leaf
    Bool(bool),
    /// Number leaf
    Number(Number),
    /// Ordered list of values
    List(Vec<Value>),
    /// Object keyed by attribute name
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Build an object from `(key, value)` pairs
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a string leaf
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Whether the value is null
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this node is unknown (children are not inspected)
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    /// Whether this node and every descendant is known
    #[must_use]
    pub fn is_wholly_known(&self) -> bool {
        match self {
            Value::Unknown => false,
            Value::List(items) => items.iter().all(Value::is_wholly_known),
            Value::Object(fields) => fields.values().all(Value::is_wholly_known),
            _ => true,
        }
    }

    /// Object fields, if this is an object
    #[must_use]
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// String contents, if this is a string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up an object attribute
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|fields| fields.get(key))
    }

    /// Short name of the value's kind, used in decode errors
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unknown => "unknown",
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Infer the wire type of a value
    ///
    /// Null and unknown nodes infer as [`WireType::Dynamic`]; lists take the
    /// type of their first element.
    #[must_use]
    pub fn infer_type(&self) -> WireType {
        match self {
            Value::Unknown | Value::Null => WireType::Dynamic,
            Value::String(_) => WireType::String,
            Value::Bool(_) => WireType::Bool,
            Value::Number(_) => WireType::Number,
            Value::List(items) => WireType::List(Box::new(
                items.first().map_or(WireType::Dynamic, Value::infer_type),
            )),
            Value::Object(fields) => WireType::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.infer_type()))
                    .collect(),
            ),
        }
    }

    /// Convert a JSON document into a wire value
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(Number(n.clone())),
            serde_json::Value::String(s) if s == UNKNOWN_SENTINEL => Value::Unknown,
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert a wire value into its JSON form
    ///
    /// Numbers are written back in the form they were read, so integer
    /// inputs survive a round trip unchanged.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Unknown => serde_json::Value::String(UNKNOWN_SENTINEL.to_string()),
            Value::Null => serde_json::Value::Null,
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.0.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(fields) => serde_json::Value::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Parse a JSON payload into a wire value
    ///
    /// # Errors
    /// Returns `DecodeError::Malformed` if the payload is not valid JSON
    pub fn parse_json(payload: &[u8]) -> Result<Self, DecodeError> {
        let json: serde_json::Value =
            serde_json::from_slice(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        Ok(Value::from_json(&json))
    }
}

/// Number leaf that keeps JSON integers exact
///
/// Integers compare as integers and anything else as `f64`, so `2` and `2.0`
/// are equal while integers beyond 2^53 stay distinct.
#[derive(Debug, Clone)]
pub struct Number(serde_json::Number);

impl Number {
    /// Nearest `f64`
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        self.0.as_f64().unwrap_or(f64::NAN)
    }

    /// Exact value, if this is an integer that fits `i64`
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.0.as_i64()
    }

    /// Exact value, if this is a non-negative integer
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        self.0.as_u64()
    }

    /// Number for a finite float; integral values are stored as integers
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn from_f64(n: f64) -> Option<Self> {
        if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
            return Some(Self::from(n as i64));
        }
        serde_json::Number::from_f64(n).map(Self)
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.as_i64(), other.as_i64()) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (self.as_u64(), other.as_u64()) {
            return a == b;
        }
        self.as_f64() == other.as_f64()
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Self(n.into())
    }
}

impl From<u64> for Number {
    fn from(n: u64) -> Self {
        Self(n.into())
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Non-finite floats have no JSON form and become null
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_unknown_sentinel() {
        let v = Value::from_json(&json!({ "host": UNKNOWN_SENTINEL }));
        assert_eq!(v.get("host"), Some(&Value::Unknown));
        assert!(!v.is_wholly_known());
        assert_eq!(v.to_json(), json!({ "host": UNKNOWN_SENTINEL }));
    }

    #[test]
    fn test_integers_stay_integers() {
        let original = json!({ "status": 2, "ratio": 0.5 });
        let v = Value::from_json(&original);
        assert_eq!(v.to_json(), original);
        assert_eq!(v.to_json().to_string(), original.to_string());
    }

    #[test]
    fn test_large_integers_exact() {
        // 2^53 + 1 has no exact f64 form
        let original = json!({
            "big": 9_007_199_254_740_993_u64,
            "low": -9_007_199_254_740_993_i64,
            "max": u64::MAX,
        });
        let v = Value::from_json(&original);
        assert_eq!(v.to_json().to_string(), original.to_string());

        let big = Value::from_json(&json!(9_007_199_254_740_993_u64));
        let neighbour = Value::from_json(&json!(9_007_199_254_740_992_u64));
        assert_ne!(big, neighbour);
    }

    #[test]
    fn test_number_equality_ignores_representation() {
        assert_eq!(Value::from_json(&json!(2)), Value::from_json(&json!(2.0)));
        assert_eq!(Value::from(2.0), Value::from(2_i64));
        assert_ne!(Value::from(2.5), Value::from(2_i64));
        assert_eq!(Value::from(f64::NAN), Value::Null);
    }

    #[test]
    fn test_parse_malformed() {
        let err = Value::parse_json(b"{not json").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
        assert!(err.path().is_none());
    }

    #[test]
    fn test_infer_type() {
        let v = Value::object([("user", Value::from("ubuntu")), ("port", Value::from(22.0))]);
        assert_eq!(
            v.infer_type().to_string(),
            "object({port=number,user=string})"
        );
    }
}
