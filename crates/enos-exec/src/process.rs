//! Local helper process execution using `tokio::process`
//!
//! The Nomad transport drives `nomad alloc exec`; this module runs such
//! helpers with stdin piping and streamed output.

use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, error, instrument};

use crate::error::ExecError;
use crate::result::{CommandResult, ExecRequest, Output};

/// A local program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Program to execute
    pub program: String,
    /// Arguments, not shell-interpreted
    pub args: Vec<String>,
    /// Extra environment for the child
    pub env: Vec<(String, String)>,
}

impl ProcessSpec {
    /// Create a spec for `program`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append an argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set an environment variable for the child
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Run `spec`, feeding the request's stdin and streaming its output
///
/// # Errors
/// Returns `ExecError::SpawnError` if the program cannot be started and
/// `ExecError::IoError` if its pipes fail
#[instrument(skip_all, fields(program = %spec.program))]
pub async fn run_process(spec: &ProcessSpec, request: &ExecRequest) -> Result<CommandResult, ExecError> {
    let start = Instant::now();

    debug!(command = %request.command, "executing through local helper");

    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ExecError::SpawnError(format!("{}: {e}", spec.program)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| ExecError::IoError("child stdin unavailable".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ExecError::IoError("child stdout unavailable".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ExecError::IoError("child stderr unavailable".to_string()))?;

    let feed = async {
        if let Some(data) = &request.stdin {
            stdin.write_all(data).await?;
        }
        stdin.shutdown().await?;
        drop(stdin);
        Ok::<(), std::io::Error>(())
    };

    let (fed, out, err) = tokio::join!(
        feed,
        pump(stdout, request, Output::Stdout),
        pump(stderr, request, Output::Stderr),
    );
    fed.map_err(|e| ExecError::IoError(e.to_string()))?;
    let stdout = out.map_err(|e| ExecError::IoError(e.to_string()))?;
    let stderr = err.map_err(|e| ExecError::IoError(e.to_string()))?;

    let exit = child
        .wait()
        .await
        .map_err(|e| ExecError::IoError(e.to_string()))?;

    let duration = start.elapsed();
    let status = exit.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&stderr).to_string();

    debug!(status = status, duration = ?duration, "helper completed");

    if !exit.success() {
        error!(status = status, stderr = %stderr, "helper command failed");
    }

    Ok(CommandResult {
        status,
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr,
        duration,
    })
}

/// Copy `reader` to the request's output sink until EOF, returning
/// everything read
pub(crate) async fn pump<R>(
    mut reader: R,
    request: &ExecRequest,
    wrap: fn(Vec<u8>) -> Output,
) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut collected = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        request.emit(wrap(buf[..n].to_vec()));
        collected.extend_from_slice(&buf[..n]);
    }
    Ok(collected)
}
