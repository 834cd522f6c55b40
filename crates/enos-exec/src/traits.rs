//! Transport client trait

use std::borrow::Cow;

use async_trait::async_trait;
use shell_escape::unix::escape;
use tracing::debug;

use crate::error::ExecError;
use crate::result::{CommandResult, CopyRequest, ExecRequest};

/// Uniform capability every transport client provides
///
/// Clients are built from a resolved transport configuration and owned by the
/// operation that uses them; that operation calls [`Transport::close`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a command, streaming output to the request's sink if present
    async fn run(&self, request: ExecRequest) -> Result<CommandResult, ExecError>;

    /// Release any session resources held by the client
    async fn close(&self) -> Result<(), ExecError>;

    /// Short name of the transport kind
    fn transport_type(&self) -> &'static str;

    /// Execute a command line with no stdin
    async fn run_command(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.run(ExecRequest::new(cmd)).await
    }

    /// Write content to a path on the target, then apply mode and owner
    async fn copy(&self, request: CopyRequest) -> Result<(), ExecError> {
        let destination = shell_quote(&request.destination);
        debug!(
            transport = self.transport_type(),
            destination = %request.destination,
            bytes = request.content.len(),
            "copying file"
        );

        let write = ExecRequest::new(format!(
            "mkdir -p \"$(dirname {destination})\" && cat > {destination}"
        ))
        .with_stdin(request.content);
        self.run(write).await?.ensure_success()?;

        if let Some(mode) = &request.chmod {
            self.run_command(&format!("chmod {} {destination}", shell_quote(mode)))
                .await?
                .ensure_success()?;
        }

        if let Some(owner) = &request.chown {
            self.run_command(&format!("chown {} {destination}", shell_quote(owner)))
                .await?
                .ensure_success()?;
        }

        Ok(())
    }
}

/// Quote a single shell word for `sh -c`
#[must_use]
pub fn shell_quote(word: &str) -> String {
    escape(Cow::Borrowed(word)).into_owned()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, Option<Vec<u8>>)>>,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn run(&self, request: ExecRequest) -> Result<CommandResult, ExecError> {
            self.calls
                .lock()
                .unwrap()
                .push((request.command.clone(), request.stdin.clone()));
            Ok(CommandResult {
                status: 0,
                stdout: String::new(),
                stderr: String::new(),
                duration: Duration::ZERO,
            })
        }

        async fn close(&self) -> Result<(), ExecError> {
            Ok(())
        }

        fn transport_type(&self) -> &'static str {
            "recorder"
        }
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/etc/hosts"), "/etc/hosts");
        assert_eq!(shell_quote("/tmp/a file"), "'/tmp/a file'");
    }

    #[tokio::test]
    async fn test_copy_writes_then_sets_mode_and_owner() {
        let recorder = Recorder::default();
        let request = CopyRequest::new("hello", "/opt/app/config.hcl")
            .with_chmod("0640")
            .with_chown("vault");

        recorder.copy(request).await.unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].0.ends_with("cat > /opt/app/config.hcl"));
        assert_eq!(calls[0].1.as_deref(), Some(&b"hello"[..]));
        assert_eq!(calls[1].0, "chmod 0640 /opt/app/config.hcl");
        assert_eq!(calls[2].0, "chown vault /opt/app/config.hcl");
    }
}
