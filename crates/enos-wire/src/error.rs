//! Error types for enos-wire

use thiserror::Error;

use crate::path::AttributePath;

/// Errors that can occur while decoding a wire value onto a typed struct
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Leaf or object has a runtime type that cannot be coerced
    #[error("{path}: expected {expected}, got {found}")]
    TypeMismatch {
        /// Location of the offending value
        path: AttributePath,
        /// Type the target field declares
        expected: String,
        /// Kind of the value that was supplied
        found: &'static str,
    },

    /// Key is not part of the closed attribute set at this location
    #[error("{path}: unsupported argument {key:?}")]
    UnsupportedAttribute {
        /// Full path of the offending key
        path: AttributePath,
        /// The offending key
        key: String,
    },

    /// Value is well typed but structurally invalid
    #[error("{path}: {message}")]
    Invalid {
        /// Location of the offending value
        path: AttributePath,
        /// Description of the problem
        message: String,
    },

    /// Raw wire payload could not be parsed at all
    #[error("malformed wire payload: {0}")]
    Malformed(String),
}

impl DecodeError {
    /// Attribute path the error is attached to, if any
    #[must_use]
    pub fn path(&self) -> Option<&AttributePath> {
        match self {
            DecodeError::TypeMismatch { path, .. }
            | DecodeError::UnsupportedAttribute { path, .. }
            | DecodeError::Invalid { path, .. } => Some(path),
            DecodeError::Malformed(_) => None,
        }
    }

    /// Create an `Invalid` error
    pub fn invalid(path: &AttributePath, message: impl Into<String>) -> Self {
        DecodeError::Invalid {
            path: path.clone(),
            message: message.into(),
        }
    }
}
