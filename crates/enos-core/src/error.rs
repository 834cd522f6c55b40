//! Core error types for enos-core

use enos_exec::ExecError;
use enos_transport::TransportError;
use enos_wire::{AttributePath, DecodeError};
use thiserror::Error;

use crate::diag::Diagnostic;

/// Errors that can occur in a lifecycle phase
#[derive(Error, Debug)]
pub enum CoreError {
    /// Wire value does not match the resource's structure
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Transport resolution, validation or client construction failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Well formed but semantically invalid resource configuration
    #[error("{summary}: {detail}")]
    Validation {
        /// Offending attribute, when known
        path: Option<AttributePath>,
        /// Short description
        summary: String,
        /// Actionable detail
        detail: String,
    },

    /// The resource's business action failed
    #[error("{summary}: {detail}")]
    Action {
        /// Short description
        summary: String,
        /// Underlying failure
        detail: String,
    },

    /// Stored state uses a schema version this build does not know
    #[error("unsupported schema version {version} (current is {current})")]
    UnsupportedVersion {
        /// Version found in the stored state
        version: i64,
        /// Version this build writes
        current: i64,
    },

    /// No resource type registered under this name
    #[error("unknown resource type: {0}")]
    UnknownResource(String),

    /// The phase was cancelled before it started work
    #[error("operation cancelled")]
    Cancelled,

    /// Provider configuration problem
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl CoreError {
    /// Create a `Validation` error attached to `path`
    pub fn validation(
        path: AttributePath,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        CoreError::Validation {
            path: Some(path),
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    /// Create an `Action` error
    pub fn action(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        CoreError::Action {
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    /// Attribute path the error is attached to, if any
    #[must_use]
    pub fn path(&self) -> Option<&AttributePath> {
        match self {
            CoreError::Decode(e) => e.path(),
            CoreError::Transport(e) => e.path(),
            CoreError::Validation { path, .. } => path.as_ref(),
            _ => None,
        }
    }

    /// Convert into an error diagnostic
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = match self {
            CoreError::Decode(e) => Diagnostic::error("invalid configuration", e.to_string()),
            CoreError::Transport(TransportError::Invalid { summary, detail, .. })
            | CoreError::Validation { summary, detail, .. }
            | CoreError::Action { summary, detail } => Diagnostic::error(summary, detail),
            CoreError::Transport(e @ TransportError::Build { .. }) => {
                Diagnostic::error("unable to create transport client", e.to_string())
            }
            CoreError::Transport(e) => Diagnostic::error("invalid transport", e.to_string()),
            CoreError::UnsupportedVersion { .. } => {
                Diagnostic::error("unable to upgrade state", self.to_string())
            }
            CoreError::UnknownResource(_) | CoreError::Cancelled | CoreError::ConfigError(_) => {
                Diagnostic::error(self.to_string(), String::new())
            }
        };

        match self.path() {
            Some(path) => diagnostic.with_path(path.clone()),
            None => diagnostic,
        }
    }
}

impl From<ExecError> for CoreError {
    fn from(e: ExecError) -> Self {
        CoreError::action("remote execution failed", e.to_string())
    }
}
