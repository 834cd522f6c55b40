//! Error types for enos-resources

use enos_core::CoreError;
use enos_exec::ExecError;
use thiserror::Error;

/// Errors raised by resource actions
#[derive(Error, Debug, Clone)]
pub enum ResourceError {
    /// A command ran but exited non-zero
    #[error("command failed with status {status}: {stderr}")]
    CommandFailed {
        /// What was being done
        action: String,
        /// Exit status
        status: i32,
        /// Stderr output
        stderr: String,
    },

    /// Transport error while running a command
    #[error("execution error: {0}")]
    ExecutionError(#[from] ExecError),

    /// Command output could not be understood
    #[error("parse error: {0}")]
    ParseError(String),

    /// Vault is still sealed after the unseal attempt
    #[error("vault is still sealed: {0}")]
    StillSealed(String),
}

impl ResourceError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResourceError::ExecutionError(e) if e.is_retryable())
    }
}

impl From<ResourceError> for CoreError {
    fn from(e: ResourceError) -> Self {
        let summary = match &e {
            ResourceError::CommandFailed { action, .. } => format!("failed to {action}"),
            ResourceError::ExecutionError(_) => "remote execution failed".to_string(),
            ResourceError::ParseError(_) => "unexpected command output".to_string(),
            ResourceError::StillSealed(_) => "failed to unseal vault".to_string(),
        };
        CoreError::action(summary, e.to_string())
    }
}
