//! Wire types describing the shape of a [`Value`]

use std::collections::BTreeMap;
use std::fmt;

use crate::error::DecodeError;
use crate::path::AttributePath;
use crate::value::Value;

/// Type of a wire value as declared to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireType {
    String,
    Bool,
    Number,
    List(Box<WireType>),
    Object(BTreeMap<String, WireType>),
    /// Type is decided by the value itself at request time
    Dynamic,
}

impl WireType {
    /// Build an object type from `(name, type)` pairs
    pub fn object<K, I>(attributes: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, WireType)>,
    {
        WireType::Object(attributes.into_iter().map(|(k, t)| (k.into(), t)).collect())
    }

    /// `list(string)`
    #[must_use]
    pub fn string_list() -> Self {
        WireType::List(Box::new(WireType::String))
    }

    /// Check that `value` conforms to this type
    ///
    /// Null and unknown conform to every type. Object values must carry exactly
    /// the declared attributes.
    ///
    /// # Errors
    /// Returns a `DecodeError` naming the first non-conforming location
    pub fn check(&self, value: &Value, path: &AttributePath) -> Result<(), DecodeError> {
        match (self, value) {
            (_, Value::Null | Value::Unknown)
            | (WireType::Dynamic, _)
            | (WireType::String, Value::String(_))
            | (WireType::Bool, Value::Bool(_))
            | (WireType::Number, Value::Number(_)) => Ok(()),
            (WireType::List(elem), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    elem.check(item, &path.index(i))?;
                }
                Ok(())
            }
            (WireType::Object(attrs), Value::Object(fields)) => {
                for key in fields.keys() {
                    if !attrs.contains_key(key) {
                        return Err(DecodeError::UnsupportedAttribute {
                            path: path.attr(key),
                            key: key.clone(),
                        });
                    }
                }
                for (name, ty) in attrs {
                    match fields.get(name) {
                        Some(v) => ty.check(v, &path.attr(name))?,
                        None => {
                            return Err(DecodeError::invalid(
                                &path.attr(name),
                                "attribute declared by type is missing from value",
                            ));
                        }
                    }
                }
                Ok(())
            }
            (ty, v) => Err(DecodeError::TypeMismatch {
                path: path.clone(),
                expected: ty.to_string(),
                found: v.kind(),
            }),
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireType::String => f.write_str("string"),
            WireType::Bool => f.write_str("bool"),
            WireType::Number => f.write_str("number"),
            WireType::Dynamic => f.write_str("dynamic"),
            WireType::List(elem) => write!(f, "list({elem})"),
            WireType::Object(attrs) => {
                f.write_str("object({")?;
                for (i, (name, ty)) in attrs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{name}={ty}")?;
                }
                f.write_str("})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_object_exact() {
        let ty = WireType::object([("host", WireType::String), ("user", WireType::String)]);
        let value = Value::object([("host", Value::from("localhost")), ("user", Value::Unknown)]);
        assert!(ty.check(&value, &AttributePath::root()).is_ok());

        let extra = Value::object([
            ("host", Value::from("localhost")),
            ("user", Value::Null),
            ("port", Value::from(22.0)),
        ]);
        let err = ty.check(&extra, &AttributePath::new("ssh")).unwrap_err();
        assert_eq!(err.path().map(ToString::to_string).as_deref(), Some("ssh.port"));
    }

    #[test]
    fn test_check_mismatch() {
        let ty = WireType::string_list();
        let value = Value::List(vec![Value::from("a"), Value::Bool(true)]);
        let err = ty.check(&value, &AttributePath::new("inline")).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TypeMismatch {
                path: AttributePath::new("inline").index(1),
                expected: "string".to_string(),
                found: "bool",
            }
        );
    }
}
