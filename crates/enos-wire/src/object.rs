//! Struct-keyed marshal and unmarshal

use std::collections::BTreeMap;

use crate::attr::{Attr, Scalar};
use crate::error::DecodeError;
use crate::path::AttributePath;
use crate::types::WireType;
use crate::value::Value;

/// A typed struct that maps to a wire object by attribute name
///
/// `wire_type` takes `&self` because some attributes (transport blocks)
/// generate their type from what was actually supplied.
pub trait WireObject: Sized {
    /// Wire type of this instance
    fn wire_type(&self) -> WireType;

    /// Encode into a wire value
    fn encode(&self) -> Value;

    /// Decode from a wire value located at `path`
    ///
    /// # Errors
    /// Returns a `DecodeError` if the value does not match the struct
    fn decode(value: &Value, path: &AttributePath) -> Result<Self, DecodeError>;
}

/// Read side of a struct decode
///
/// Keys without a matching field are ignored here; callers that need a closed
/// attribute set use [`ObjectReader::reject_unknown_keys`].
#[derive(Debug)]
pub struct ObjectReader<'a> {
    fields: Option<&'a BTreeMap<String, Value>>,
    unknown: bool,
    path: AttributePath,
}

impl<'a> ObjectReader<'a> {
    /// Start reading `value` as an object
    ///
    /// Null reads as an object whose attributes are all null, unknown as one
    /// whose attributes are all unknown.
    ///
    /// # Errors
    /// Returns `DecodeError::TypeMismatch` for any other non-object value
    pub fn new(value: &'a Value, path: &AttributePath) -> Result<Self, DecodeError> {
        match value {
            Value::Object(fields) => Ok(Self {
                fields: Some(fields),
                unknown: false,
                path: path.clone(),
            }),
            Value::Null | Value::Unknown => Ok(Self {
                fields: None,
                unknown: value.is_unknown(),
                path: path.clone(),
            }),
            other => Err(DecodeError::TypeMismatch {
                path: path.clone(),
                expected: "object".to_string(),
                found: other.kind(),
            }),
        }
    }

    /// Path of the object being read
    #[must_use]
    pub fn path(&self) -> &AttributePath {
        &self.path
    }

    /// Raw value of an attribute
    #[must_use]
    pub fn raw(&self, name: &str) -> Option<&'a Value> {
        self.fields.and_then(|fields| fields.get(name))
    }

    /// Keys present in the object
    pub fn keys(&self) -> impl Iterator<Item = &'a str> {
        self.fields
            .into_iter()
            .flat_map(|fields| fields.keys().map(String::as_str))
    }

    /// Decode a scalar attribute; a missing key decodes as null
    ///
    /// # Errors
    /// Returns a `DecodeError` if the leaf has the wrong kind
    pub fn attr<T: Scalar>(&self, name: &str) -> Result<Attr<T>, DecodeError> {
        match self.raw(name) {
            Some(value) => Attr::decode(value, &self.path.attr(name)),
            None if self.unknown => Ok(Attr::Unknown),
            None => Ok(Attr::Null),
        }
    }

    /// Decode a nested object attribute
    ///
    /// # Errors
    /// Returns whatever the nested decode returns
    pub fn object<O: WireObject>(&self, name: &str) -> Result<O, DecodeError> {
        let fallback = if self.unknown { Value::Unknown } else { Value::Null };
        let value = self.raw(name).unwrap_or(&fallback);
        O::decode(value, &self.path.attr(name))
    }

    /// Fail on the first key not listed in `allowed`
    ///
    /// # Errors
    /// Returns `DecodeError::UnsupportedAttribute` naming the key's full path
    pub fn reject_unknown_keys(&self, allowed: &[&str]) -> Result<(), DecodeError> {
        for key in self.keys() {
            if !allowed.contains(&key) {
                return Err(DecodeError::UnsupportedAttribute {
                    path: self.path.attr(key),
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Write side of a struct encode
#[derive(Debug, Default)]
pub struct ObjectWriter {
    fields: BTreeMap<String, Value>,
}

impl ObjectWriter {
    /// Start an empty object
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scalar attribute
    #[must_use]
    pub fn attr<T: Scalar>(mut self, name: &str, attr: &Attr<T>) -> Self {
        self.fields.insert(name.to_string(), attr.encode());
        self
    }

    /// Add a nested object attribute
    #[must_use]
    pub fn object<O: WireObject>(mut self, name: &str, object: &O) -> Self {
        self.fields.insert(name.to_string(), object.encode());
        self
    }

    /// Add a raw value
    #[must_use]
    pub fn value(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Finish the object
    #[must_use]
    pub fn finish(self) -> Value {
        Value::Object(self.fields)
    }
}
