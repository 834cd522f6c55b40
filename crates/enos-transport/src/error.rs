//! Error types for enos-transport

use enos_exec::ExecError;
use enos_wire::{AttributePath, DecodeError};
use thiserror::Error;

use crate::backend::TransportKind;

/// Errors raised while resolving a transport configuration
#[derive(Error, Debug)]
pub enum TransportError {
    /// Wire value does not match the transport's structure
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Well formed but semantically invalid configuration
    #[error("{path}: {summary}: {detail}")]
    Invalid {
        /// Offending attribute
        path: AttributePath,
        /// Short description
        summary: String,
        /// Actionable detail
        detail: String,
    },

    /// No backend is configured at any layer
    #[error("{path}: no transport configured")]
    NotConfigured {
        /// Location of the transport attribute
        path: AttributePath,
    },

    /// Whole transport value is not known yet
    #[error("{path}: transport configuration is not yet known")]
    NotKnown {
        /// Location of the transport attribute
        path: AttributePath,
    },

    /// Client construction failed despite a valid configuration
    #[error("failed to build {kind} transport (configured: {}): {source}", .supplied.join(", "))]
    Build {
        /// Backend that was being built
        kind: TransportKind,
        /// Keys that were supplied, never their values
        supplied: Vec<String>,
        /// Underlying failure
        #[source]
        source: ExecError,
    },
}

impl TransportError {
    /// Create an `Invalid` error
    pub fn invalid(
        path: AttributePath,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        TransportError::Invalid {
            path,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    /// Attribute path the error is attached to, if any
    #[must_use]
    pub fn path(&self) -> Option<&AttributePath> {
        match self {
            TransportError::Decode(e) => e.path(),
            TransportError::Invalid { path, .. }
            | TransportError::NotConfigured { path }
            | TransportError::NotKnown { path } => Some(path),
            TransportError::Build { .. } => None,
        }
    }

    /// Whether the failure looks transient rather than a configuration problem
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Build { source, .. } if source.is_retryable())
    }
}
