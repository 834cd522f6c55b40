//! Error types for enos-exec

use thiserror::Error;

/// Errors that can occur while running commands or copying files through a
/// transport
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Failed to connect to remote host
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Command exited non-zero
    #[error("command execution failed: {status} - {stderr}")]
    CommandFailed {
        /// Exit status code
        status: i32,
        /// Stderr output
        stderr: String,
    },

    /// SSH key or other credential material could not be used
    #[error("key error: {0}")]
    KeyError(String),

    /// Local helper process (nomad) could not be spawned
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),

    /// Transport was closed or never connected
    #[error("not connected")]
    NotConnected,

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

impl ExecError {
    /// Check if error is retryable
    ///
    /// Only connection level failures qualify; the caller decides whether to
    /// actually retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecError::ConnectionFailed(_) | ExecError::IoError(_))
    }
}

impl From<crate::keys::KeyError> for ExecError {
    fn from(e: crate::keys::KeyError) -> Self {
        ExecError::KeyError(e.to_string())
    }
}
