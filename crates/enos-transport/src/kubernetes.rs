//! Kubernetes backend configuration

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use enos_exec::keys::base64_decode;
use enos_exec::kubernetes::{DEFAULT_NAMESPACE, parse_kubeconfig};
use enos_exec::{ExecError, KubeTarget, KubernetesTransport, Transport};
use enos_wire::{AttributePath, TfString};

use crate::backend::{
    BackendConfig, Field, SuppliedKeys, TransportKind, fmt_redacted, known, optional, require,
};
use crate::error::TransportError;

/// Kubernetes transport settings
#[derive(Clone, Default, PartialEq)]
pub struct K8sConfig {
    /// Base64 encoded kubeconfig
    pub kubeconfig_base64: TfString,
    /// Context inside the kubeconfig
    pub context_name: TfString,
    /// Pod namespace
    pub namespace: TfString,
    /// Pod name
    pub pod: TfString,
    /// Container name
    pub container: TfString,
    supplied: SuppliedKeys,
}

impl K8sConfig {
    /// Pod target once every identifier is known
    fn target(&self) -> Result<KubeTarget, ExecError> {
        Ok(KubeTarget {
            context: optional(&self.context_name).map(str::to_string),
            namespace: optional(&self.namespace)
                .unwrap_or(DEFAULT_NAMESPACE)
                .to_string(),
            pod: known(&self.pod, "pod")?.to_string(),
            container: optional(&self.container).map(str::to_string),
        })
    }
}

impl fmt::Debug for K8sConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_redacted(self, "K8sConfig", f)
    }
}

#[async_trait]
impl BackendConfig for K8sConfig {
    const KIND: TransportKind = TransportKind::Kubernetes;

    const FIELDS: &'static [Field] = &[
        Field {
            name: "kubeconfig_base64",
            env: "ENOS_KUBECONFIG",
            sensitive: true,
            forces_replacement: true,
        },
        Field {
            name: "context_name",
            env: "ENOS_K8S_CONTEXT_NAME",
            sensitive: false,
            forces_replacement: true,
        },
        Field {
            name: "namespace",
            env: "ENOS_K8S_NAMESPACE",
            sensitive: false,
            forces_replacement: true,
        },
        Field {
            name: "pod",
            env: "ENOS_K8S_POD",
            sensitive: false,
            forces_replacement: true,
        },
        Field {
            name: "container",
            env: "ENOS_K8S_CONTAINER",
            sensitive: false,
            forces_replacement: true,
        },
    ];

    fn field(&self, name: &str) -> Option<&TfString> {
        match name {
            "kubeconfig_base64" => Some(&self.kubeconfig_base64),
            "context_name" => Some(&self.context_name),
            "namespace" => Some(&self.namespace),
            "pod" => Some(&self.pod),
            "container" => Some(&self.container),
            _ => None,
        }
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut TfString> {
        match name {
            "kubeconfig_base64" => Some(&mut self.kubeconfig_base64),
            "context_name" => Some(&mut self.context_name),
            "namespace" => Some(&mut self.namespace),
            "pod" => Some(&mut self.pod),
            "container" => Some(&mut self.container),
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
        if let Some(encoded) = require(&self.kubeconfig_base64, path, "kubeconfig_base64")? {
            let invalid = |detail: String| {
                TransportError::invalid(path.attr("kubeconfig_base64"), "invalid kubeconfig", detail)
            };
            let decoded = base64_decode(encoded).map_err(|e| invalid(e.to_string()))?;
            parse_kubeconfig(&decoded).map_err(|e| invalid(e.to_string()))?;
        }

        require(&self.pod, path, "pod")?;
        Ok(())
    }

    async fn build_client(&self) -> Result<Arc<dyn Transport>, ExecError> {
        let kubeconfig = base64_decode(known(&self.kubeconfig_base64, "kubeconfig_base64")?)?;
        let transport = KubernetesTransport::new(self.target()?, &kubeconfig).await?;
        Ok(Arc::new(transport))
    }
}

/// Base64 of the kubeconfig fixture shared with `enos-exec`
#[cfg(test)]
pub(crate) fn encoded_test_kubeconfig() -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .encode(include_str!("../../enos-exec/testdata/kubeconfig.yaml"))
}
