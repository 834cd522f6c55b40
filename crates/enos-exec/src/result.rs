//! Request and result types for transport operations

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ExecError;

/// A chunk of command output delivered while the command is still running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

/// Sink receiving streamed command output
pub type OutputSink = mpsc::UnboundedSender<Output>;

/// A command to execute on the target
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Shell command line
    pub command: String,
    /// Bytes written to the command's stdin before it is closed
    pub stdin: Option<Vec<u8>>,
    /// Optional sink for streamed output
    pub output: Option<OutputSink>,
}

impl ExecRequest {
    /// Create a request for `command`
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stdin: None,
            output: None,
        }
    }

    /// Feed `stdin` to the command
    #[must_use]
    pub fn with_stdin(mut self, stdin: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    /// Stream stdout/stderr chunks to `sink` as they arrive
    #[must_use]
    pub fn with_output(mut self, sink: OutputSink) -> Self {
        self.output = Some(sink);
        self
    }

    /// Forward a chunk to the sink, if any
    ///
    /// A dropped receiver is not an error; the output is still collected.
    pub(crate) fn emit(&self, chunk: Output) {
        if let Some(sink) = &self.output {
            let _ = sink.send(chunk);
        }
    }
}

/// A file to place on the target
#[derive(Debug, Clone)]
pub struct CopyRequest {
    /// File contents
    pub content: Vec<u8>,
    /// Absolute destination path on the target
    pub destination: String,
    /// Mode passed to `chmod`
    pub chmod: Option<String>,
    /// Owner passed to `chown`
    pub chown: Option<String>,
}

impl CopyRequest {
    /// Create a copy request
    pub fn new(content: impl Into<Vec<u8>>, destination: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            destination: destination.into(),
            chmod: None,
            chown: None,
        }
    }

    /// Set the file mode
    #[must_use]
    pub fn with_chmod(mut self, mode: impl Into<String>) -> Self {
        self.chmod = Some(mode.into());
        self
    }

    /// Set the file owner
    #[must_use]
    pub fn with_chown(mut self, owner: impl Into<String>) -> Self {
        self.chown = Some(owner.into());
        self
    }
}

/// Result of a command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit status code (0 for success)
    pub status: i32,
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Combine stdout and stderr
    #[must_use]
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Turn a non-zero exit into `ExecError::CommandFailed`
    ///
    /// # Errors
    /// Returns `ExecError::CommandFailed` when the status is non-zero
    pub fn ensure_success(self) -> Result<Self, ExecError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ExecError::CommandFailed {
                status: self.status,
                stderr: self.stderr,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: i32, stderr: &str) -> CommandResult {
        CommandResult {
            status,
            stdout: "out".to_string(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_ensure_success() {
        assert!(result(0, "").ensure_success().is_ok());

        let err = result(2, "sealed").ensure_success().unwrap_err();
        assert!(matches!(err, ExecError::CommandFailed { status: 2, ref stderr } if stderr == "sealed"));
    }

    #[test]
    fn test_combined_output() {
        assert_eq!(result(0, "").combined_output(), "out");
        assert_eq!(result(0, "warn").combined_output(), "out\nwarn");
    }

    #[test]
    fn test_emit_without_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let request = ExecRequest::new("true").with_output(tx);
        request.emit(Output::Stdout(b"ignored".to_vec()));
    }
}
