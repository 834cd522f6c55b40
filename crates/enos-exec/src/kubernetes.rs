//! Kubernetes transport over the pod `exec` subresource
//!
//! Commands run through the API server with `kube`, so no `kubectl` binary or
//! on-disk kubeconfig is needed.

use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{Api, AttachParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, instrument};

use crate::error::ExecError;
use crate::process::pump;
use crate::result::{CommandResult, ExecRequest, Output};
use crate::traits::Transport;

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "default";

/// The pod and container a Kubernetes transport executes in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeTarget {
    /// Context inside the kubeconfig, current context when `None`
    pub context: Option<String>,
    /// Pod namespace
    pub namespace: String,
    /// Pod name
    pub pod: String,
    /// Container name, pod default when `None`
    pub container: Option<String>,
}

/// Parse decoded kubeconfig contents
///
/// # Errors
/// Returns `ExecError::ConfigError` if the contents are empty, not UTF-8 or
/// not a kubeconfig document
pub fn parse_kubeconfig(kubeconfig: &[u8]) -> Result<Kubeconfig, ExecError> {
    if kubeconfig.is_empty() {
        return Err(ExecError::ConfigError("kubeconfig is empty".to_string()));
    }
    let yaml = std::str::from_utf8(kubeconfig)
        .map_err(|e| ExecError::ConfigError(format!("kubeconfig is not UTF-8: {e}")))?;
    Kubeconfig::from_yaml(yaml).map_err(|e| ExecError::ConfigError(format!("invalid kubeconfig: {e}")))
}

/// Client configuration for `target`'s context
async fn client_config(target: &KubeTarget, kubeconfig: &[u8]) -> Result<Config, ExecError> {
    let kubeconfig = parse_kubeconfig(kubeconfig)?;
    let options = KubeConfigOptions {
        context: target.context.clone(),
        ..KubeConfigOptions::default()
    };
    Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| ExecError::ConfigError(format!("kubeconfig: {e}")))
}

/// Exit code carried by the status frame that ends an exec session
///
/// Non-zero codes arrive as a `Failure` whose cause has reason `ExitCode`;
/// a missing or unparseable status maps to -1.
fn exit_status(status: Option<&Status>) -> i32 {
    let Some(status) = status else {
        return -1;
    };
    if status.status.as_deref() == Some("Success") {
        return 0;
    }
    status
        .details
        .as_ref()
        .and_then(|details| details.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|cause| cause.reason.as_deref() == Some("ExitCode"))
        })
        .and_then(|cause| cause.message.as_deref())
        .and_then(|code| code.parse().ok())
        .unwrap_or(-1)
}

/// Kubernetes transport
///
/// Holds an API client scoped to the target namespace until closed.
pub struct KubernetesTransport {
    target: KubeTarget,
    pods: Mutex<Option<Api<Pod>>>,
}

impl std::fmt::Debug for KubernetesTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubernetesTransport")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl KubernetesTransport {
    /// Create a transport from decoded kubeconfig contents
    ///
    /// No request is made until the first command runs.
    ///
    /// # Errors
    /// Returns `ExecError::ConfigError` if the kubeconfig does not parse or
    /// lacks the requested context, and `ExecError::ConnectionFailed` if the
    /// API client cannot be built from it
    #[instrument(skip(kubeconfig), fields(pod = %target.pod, namespace = %target.namespace))]
    pub async fn new(target: KubeTarget, kubeconfig: &[u8]) -> Result<Self, ExecError> {
        let config = client_config(&target, kubeconfig).await?;
        debug!(cluster = %config.cluster_url, "kubeconfig resolved");

        let client = Client::try_from(config).map_err(|e| ExecError::ConnectionFailed(e.to_string()))?;
        let pods = Api::namespaced(client, &target.namespace);

        info!("kubernetes transport ready");

        Ok(Self {
            target,
            pods: Mutex::new(Some(pods)),
        })
    }

    /// Target pod and container
    #[must_use]
    pub fn target(&self) -> &KubeTarget {
        &self.target
    }

    fn pods(&self) -> Result<Api<Pod>, ExecError> {
        self.pods
            .lock()
            .map_err(|_| ExecError::IoError("kubernetes client lock poisoned".to_string()))?
            .clone()
            .ok_or(ExecError::NotConnected)
    }

    fn attach_params(&self, stdin: bool) -> AttachParams {
        let mut params = AttachParams::default().stdin(stdin).stdout(true).stderr(true);
        if let Some(container) = &self.target.container {
            params = params.container(container.as_str());
        }
        params
    }
}

async fn feed<W>(writer: Option<W>, data: Option<&[u8]>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(mut writer) = writer else {
        return Ok(());
    };
    if let Some(data) = data {
        writer.write_all(data).await?;
    }
    writer.shutdown().await
}

#[async_trait]
impl Transport for KubernetesTransport {
    #[instrument(skip(self, request), fields(pod = %self.target.pod))]
    async fn run(&self, request: ExecRequest) -> Result<CommandResult, ExecError> {
        let pods = self.pods()?;
        let start = Instant::now();

        debug!(command = %request.command, "executing in pod");

        let params = self.attach_params(request.stdin.is_some());
        let mut attached = pods
            .exec(
                &self.target.pod,
                ["sh", "-c", request.command.as_str()],
                &params,
            )
            .await
            .map_err(|e| ExecError::ConnectionFailed(format!("exec in {}: {e}", self.target.pod)))?;

        let status = attached
            .take_status()
            .ok_or_else(|| ExecError::IoError("exec status channel unavailable".to_string()))?;
        let stdin = attached.stdin();
        let stdout = attached
            .stdout()
            .ok_or_else(|| ExecError::IoError("exec stdout unavailable".to_string()))?;
        let stderr = attached
            .stderr()
            .ok_or_else(|| ExecError::IoError("exec stderr unavailable".to_string()))?;

        let (fed, out, err) = tokio::join!(
            feed(stdin, request.stdin.as_deref()),
            pump(stdout, &request, Output::Stdout),
            pump(stderr, &request, Output::Stderr),
        );
        fed.map_err(|e| ExecError::IoError(e.to_string()))?;
        let stdout = out.map_err(|e| ExecError::IoError(e.to_string()))?;
        let stderr = err.map_err(|e| ExecError::IoError(e.to_string()))?;

        let status = exit_status(status.await.as_ref());
        attached
            .join()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let duration = start.elapsed();
        let stderr = String::from_utf8_lossy(&stderr).to_string();

        debug!(status = status, duration = ?duration, "pod command completed");

        if status != 0 {
            error!(status = status, stderr = %stderr, "pod command failed");
        }

        Ok(CommandResult {
            status,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr,
            duration,
        })
    }

    async fn close(&self) -> Result<(), ExecError> {
        let pods = self
            .pods
            .lock()
            .map_err(|_| ExecError::IoError("kubernetes client lock poisoned".to_string()))?
            .take();
        if pods.is_some() {
            debug!(pod = %self.target.pod, "released kubernetes client");
        }
        Ok(())
    }

    fn transport_type(&self) -> &'static str {
        "kubernetes"
    }
}
