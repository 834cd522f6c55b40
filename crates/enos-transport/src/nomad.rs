//! Nomad backend configuration

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use enos_exec::{ExecError, NomadTarget, NomadTransport, Transport};
use enos_wire::{AttributePath, TfString};

use crate::backend::{
    BackendConfig, Field, SuppliedKeys, TransportKind, fmt_redacted, known, optional, require,
};
use crate::error::TransportError;

/// Nomad transport settings
#[derive(Clone, Default, PartialEq)]
pub struct NomadConfig {
    /// Nomad API address
    pub host: TfString,
    /// ACL token
    pub secret_id: TfString,
    /// Allocation to execute in
    pub allocation_id: TfString,
    /// Task within the allocation
    pub task_name: TfString,
    supplied: SuppliedKeys,
}

impl fmt::Debug for NomadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_redacted(self, "NomadConfig", f)
    }
}

#[async_trait]
impl BackendConfig for NomadConfig {
    const KIND: TransportKind = TransportKind::Nomad;

    const FIELDS: &'static [Field] = &[
        Field {
            name: "host",
            env: "ENOS_NOMAD_HOST",
            sensitive: false,
            forces_replacement: true,
        },
        Field {
            name: "secret_id",
            env: "ENOS_NOMAD_SECRET_ID",
            sensitive: true,
            forces_replacement: false,
        },
        Field {
            name: "allocation_id",
            env: "ENOS_NOMAD_ALLOCATION_ID",
            sensitive: false,
            forces_replacement: true,
        },
        Field {
            name: "task_name",
            env: "ENOS_NOMAD_TASK_NAME",
            sensitive: false,
            forces_replacement: true,
        },
    ];

    fn field(&self, name: &str) -> Option<&TfString> {
        match name {
            "host" => Some(&self.host),
            "secret_id" => Some(&self.secret_id),
            "allocation_id" => Some(&self.allocation_id),
            "task_name" => Some(&self.task_name),
            _ => None,
        }
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut TfString> {
        match name {
            "host" => Some(&mut self.host),
            "secret_id" => Some(&mut self.secret_id),
            "allocation_id" => Some(&mut self.allocation_id),
            "task_name" => Some(&mut self.task_name),
            _ => None,
        }
    }

    fn supplied(&self) -> &SuppliedKeys {
        &self.supplied
    }

    fn supplied_mut(&mut self) -> &mut SuppliedKeys {
        &mut self.supplied
    }

    fn validate(&self, path: &AttributePath) -> Result<(), TransportError> {
        require(&self.host, path, "host")?;
        require(&self.allocation_id, path, "allocation_id")?;
        require(&self.task_name, path, "task_name")?;
        Ok(())
    }

    async fn build_client(&self) -> Result<Arc<dyn Transport>, ExecError> {
        let transport = NomadTransport::new(NomadTarget {
            address: known(&self.host, "host")?.to_string(),
            secret_id: optional(&self.secret_id).map(str::to_string),
            allocation_id: known(&self.allocation_id, "allocation_id")?.to_string(),
            task: known(&self.task_name, "task_name")?.to_string(),
        })?;
        Ok(Arc::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NomadConfig {
        NomadConfig::default()
            .with("host", "http://10.0.0.9:4646")
            .with("secret_id", "s3cr3t")
            .with("allocation_id", "8a1b")
            .with("task_name", "vault")
    }

    #[test]
    fn test_validate() {
        let path = AttributePath::new("transport").attr("nomad");
        config().validate(&path).unwrap();

        let mut missing = config();
        missing.task_name.set_null();
        let err = missing.validate(&path).unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), "transport.nomad.task_name");

        let mut pending = config();
        pending.allocation_id.set_unknown();
        pending.validate(&path).unwrap();
    }

    #[tokio::test]
    async fn test_build_client() {
        let client = config().build_client().await.unwrap();
        assert_eq!(client.transport_type(), "nomad");
    }

    #[test]
    fn test_debug_redacts_secret_id() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("8a1b"));
    }
}
