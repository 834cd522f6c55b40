//! Nomad transport using `nomad alloc exec`

use async_trait::async_trait;
use tracing::instrument;

use crate::error::ExecError;
use crate::process::{ProcessSpec, run_process};
use crate::result::{CommandResult, ExecRequest};
use crate::traits::Transport;

/// The allocation task a Nomad transport executes in
#[derive(Clone, PartialEq, Eq)]
pub struct NomadTarget {
    /// Nomad API address, passed as `NOMAD_ADDR`
    pub address: String,
    /// ACL token, passed as `NOMAD_TOKEN`
    pub secret_id: Option<String>,
    /// Allocation ID
    pub allocation_id: String,
    /// Task within the allocation
    pub task: String,
}

impl std::fmt::Debug for NomadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NomadTarget")
            .field("address", &self.address)
            .field("secret_id", &self.secret_id.as_ref().map(|_| "[redacted]"))
            .field("allocation_id", &self.allocation_id)
            .field("task", &self.task)
            .finish()
    }
}

/// Nomad transport
#[derive(Debug)]
pub struct NomadTransport {
    target: NomadTarget,
    nomad: String,
}

impl NomadTransport {
    /// Create a transport for an allocation task
    ///
    /// # Errors
    /// Returns `ExecError::ConfigError` if the address, allocation or task is
    /// empty
    pub fn new(target: NomadTarget) -> Result<Self, ExecError> {
        for (name, value) in [
            ("address", &target.address),
            ("allocation_id", &target.allocation_id),
            ("task", &target.task),
        ] {
            if value.trim().is_empty() {
                return Err(ExecError::ConfigError(format!("{name} is empty")));
            }
        }

        Ok(Self {
            target,
            nomad: "nomad".to_string(),
        })
    }

    /// Use a specific `nomad` binary
    #[must_use]
    pub fn with_nomad(mut self, nomad: impl Into<String>) -> Self {
        self.nomad = nomad.into();
        self
    }

    /// Target allocation task
    #[must_use]
    pub fn target(&self) -> &NomadTarget {
        &self.target
    }

    fn process_spec(&self, command: &str) -> ProcessSpec {
        let mut spec = ProcessSpec::new(&self.nomad).env("NOMAD_ADDR", &self.target.address);
        if let Some(token) = &self.target.secret_id {
            spec = spec.env("NOMAD_TOKEN", token);
        }
        spec.arg("alloc")
            .arg("exec")
            .arg("-i=true")
            .arg("-t=false")
            .arg("-task")
            .arg(&self.target.task)
            .arg(&self.target.allocation_id)
            .arg("sh")
            .arg("-c")
            .arg(command)
    }
}

#[async_trait]
impl Transport for NomadTransport {
    #[instrument(skip(self, request), fields(allocation = %self.target.allocation_id))]
    async fn run(&self, request: ExecRequest) -> Result<CommandResult, ExecError> {
        let spec = self.process_spec(&request.command);
        run_process(&spec, &request).await
    }

    async fn close(&self) -> Result<(), ExecError> {
        // every command is its own `nomad alloc exec` session
        Ok(())
    }

    fn transport_type(&self) -> &'static str {
        "nomad"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> NomadTarget {
        NomadTarget {
            address: "http://10.0.0.9:4646".to_string(),
            secret_id: Some("s3cr3t-token".to_string()),
            allocation_id: "8a1b".to_string(),
            task: "vault".to_string(),
        }
    }

    #[test]
    fn test_process_spec() {
        let transport = NomadTransport::new(target()).unwrap();
        let spec = transport.process_spec("vault status");
        assert_eq!(
            spec.args,
            ["alloc", "exec", "-i=true", "-t=false", "-task", "vault", "8a1b", "sh", "-c", "vault status"]
        );
        assert!(spec.env.contains(&("NOMAD_ADDR".to_string(), "http://10.0.0.9:4646".to_string())));
        assert!(spec.env.contains(&("NOMAD_TOKEN".to_string(), "s3cr3t-token".to_string())));
    }

    #[test]
    fn test_empty_fields_rejected() {
        let mut t = target();
        t.task = String::new();
        assert!(matches!(NomadTransport::new(t), Err(ExecError::ConfigError(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", target());
        assert!(!rendered.contains("s3cr3t-token"));
    }
}
