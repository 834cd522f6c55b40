//! Tri-state scalar attributes

use crate::error::DecodeError;
use crate::path::AttributePath;
use crate::types::WireType;
use crate::value::Value;

/// A concrete value type that can sit inside an [`Attr`]
pub trait Scalar: Sized + Clone + PartialEq {
    /// Wire type declared for attributes of this scalar
    fn wire_type() -> WireType;

    /// Decode a known value
    ///
    /// # Errors
    /// Returns `DecodeError::TypeMismatch` if the value has the wrong kind
    fn from_value(value: &Value, path: &AttributePath) -> Result<Self, DecodeError>;

    /// Check the known parts of a value that contains unknown descendants
    ///
    /// Only container scalars can hold an unknown part, so the default
    /// rejects the value's kind.
    ///
    /// # Errors
    /// Returns `DecodeError::TypeMismatch` if the value or a known element
    /// has the wrong kind
    fn check_partial(value: &Value, path: &AttributePath) -> Result<(), DecodeError> {
        Err(mismatch::<Self>(value, path))
    }

    /// Encode as a known value
    fn to_value(&self) -> Value;
}

impl Scalar for String {
    fn wire_type() -> WireType {
        WireType::String
    }

    fn from_value(value: &Value, path: &AttributePath) -> Result<Self, DecodeError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch::<Self>(other, path)),
        }
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl Scalar for bool {
    fn wire_type() -> WireType {
        WireType::Bool
    }

    fn from_value(value: &Value, path: &AttributePath) -> Result<Self, DecodeError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch::<Self>(other, path)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl Scalar for f64 {
    fn wire_type() -> WireType {
        WireType::Number
    }

    fn from_value(value: &Value, path: &AttributePath) -> Result<Self, DecodeError> {
        match value {
            Value::Number(n) => Ok(n.as_f64()),
            other => Err(mismatch::<Self>(other, path)),
        }
    }

    fn to_value(&self) -> Value {
        Value::from(*self)
    }
}

impl Scalar for Vec<String> {
    fn wire_type() -> WireType {
        WireType::string_list()
    }

    fn from_value(value: &Value, path: &AttributePath) -> Result<Self, DecodeError> {
        match value {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| String::from_value(item, &path.index(i)))
                .collect(),
            other => Err(mismatch::<Self>(other, path)),
        }
    }

    fn check_partial(value: &Value, path: &AttributePath) -> Result<(), DecodeError> {
        match value {
            Value::List(items) => items
                .iter()
                .enumerate()
                .filter(|(_, item)| !item.is_unknown())
                .try_for_each(|(i, item)| String::from_value(item, &path.index(i)).map(drop)),
            other => Err(mismatch::<Self>(other, path)),
        }
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().cloned().map(Value::String).collect())
    }
}

fn mismatch<T: Scalar>(value: &Value, path: &AttributePath) -> DecodeError {
    DecodeError::TypeMismatch {
        path: path.clone(),
        expected: T::wire_type().to_string(),
        found: value.kind(),
    }
}

/// A scalar that is known, not yet known, or explicitly absent
///
/// The enum makes "at most one of unknown/null" structural. New attributes
/// start out null.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Attr<T> {
    /// Explicitly absent
    #[default]
    Null,
    /// Will be supplied later
    Unknown,
    /// Authoritative value
    Known(T),
}

/// Optional string attribute
pub type TfString = Attr<String>;
/// Optional bool attribute
pub type TfBool = Attr<bool>;
/// Optional number attribute
pub type TfNumber = Attr<f64>;
/// Optional list-of-strings attribute
pub type TfStringList = Attr<Vec<String>>;

impl<T> Attr<T> {
    /// A known attribute
    pub fn known(value: impl Into<T>) -> Self {
        Attr::Known(value.into())
    }

    /// The value, if known
    pub fn get(&self) -> Option<&T> {
        match self {
            Attr::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Whether the value is known
    pub fn is_known(&self) -> bool {
        matches!(self, Attr::Known(_))
    }

    /// Whether the value will be supplied later
    pub fn is_unknown(&self) -> bool {
        matches!(self, Attr::Unknown)
    }

    /// Whether the value is explicitly absent
    pub fn is_null(&self) -> bool {
        matches!(self, Attr::Null)
    }

    /// Set a known value
    pub fn set(&mut self, value: impl Into<T>) {
        *self = Attr::Known(value.into());
    }

    /// Mark the value as not yet known
    pub fn set_unknown(&mut self) {
        *self = Attr::Unknown;
    }

    /// Mark the value as absent
    pub fn set_null(&mut self) {
        *self = Attr::Null;
    }
}

impl<T: Clone + Default> Attr<T> {
    /// The value if known, otherwise `T::default()`, paired with whether it
    /// was known
    pub fn get_or_default(&self) -> (T, bool) {
        match self {
            Attr::Known(v) => (v.clone(), true),
            _ => (T::default(), false),
        }
    }
}

impl<T: Scalar> Attr<T> {
    /// Decode a wire value, preserving unknown and null
    ///
    /// A list containing an unknown element decodes as wholly unknown once
    /// its known elements type-check.
    ///
    /// # Errors
    /// Returns `DecodeError::TypeMismatch` if the leaf or a known element has
    /// the wrong kind
    pub fn decode(value: &Value, path: &AttributePath) -> Result<Self, DecodeError> {
        match value {
            Value::Null => Ok(Attr::Null),
            Value::Unknown => Ok(Attr::Unknown),
            v if !v.is_wholly_known() => T::check_partial(v, path).map(|()| Attr::Unknown),
            v => T::from_value(v, path).map(Attr::Known),
        }
    }

    /// Encode as a wire value
    pub fn encode(&self) -> Value {
        match self {
            Attr::Null => Value::Null,
            Attr::Unknown => Value::Unknown,
            Attr::Known(v) => v.to_value(),
        }
    }
}

impl From<&str> for Attr<String> {
    fn from(s: &str) -> Self {
        Attr::Known(s.to_string())
    }
}

impl From<String> for Attr<String> {
    fn from(s: String) -> Self {
        Attr::Known(s)
    }
}
