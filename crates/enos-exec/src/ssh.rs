//! SSH transport using russh crate

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg};
use russh::{ChannelMsg, Disconnect, client};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::ExecError;
use crate::result::{CommandResult, ExecRequest, Output};
use crate::traits::Transport;

const DEFAULT_PORT: u16 = 22;

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Targets are ephemeral test infrastructure without stable host keys
        Ok(true)
    }
}

/// Network endpoint and login for an SSH target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    /// Host name or address
    pub host: String,
    /// Port (default 22)
    pub port: u16,
    /// Login user
    pub user: String,
}

impl SshTarget {
    /// Build a target from a `host` or `host:port` string
    ///
    /// Bare IPv6 addresses are taken as hosts without a port.
    ///
    /// # Errors
    /// Returns `ExecError::ConfigError` if the host is empty or the port is
    /// not a valid number
    pub fn parse(host: &str, user: impl Into<String>) -> Result<Self, ExecError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ExecError::ConfigError("host is empty".to_string()));
        }

        let (host, port) = match host.rsplit_once(':') {
            Some((name, port)) if !name.contains(':') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|e| ExecError::ConfigError(format!("invalid port {port:?}: {e}")))?;
                (name, port)
            }
            _ => (host, DEFAULT_PORT),
        };

        Ok(Self {
            host: host.to_string(),
            port,
            user: user.into(),
        })
    }
}

/// SSH transport
///
/// Holds one authenticated session; every command opens a fresh channel on it.
pub struct SshTransport {
    /// Connection target
    target: SshTarget,
    /// SSH session, `None` once closed
    session: Mutex<Option<client::Handle<SshClientHandler>>>,
}

impl std::fmt::Debug for SshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTransport")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl SshTransport {
    /// Connect and authenticate with a decoded private key
    ///
    /// # Errors
    /// Returns `ExecError::ConnectionFailed` if the host cannot be reached and
    /// `ExecError::AuthenticationFailed` if the key is rejected
    #[instrument(skip(key), fields(host = %target.host, user = %target.user))]
    pub async fn connect(target: SshTarget, key: PrivateKey) -> Result<Self, ExecError> {
        info!(port = target.port, "connecting to SSH");

        let config = Arc::new(client::Config::default());

        let mut session = client::connect(
            config,
            (&target.host[..], target.port),
            SshClientHandler,
        )
        .await
        .map_err(|e| ExecError::ConnectionFailed(e.to_string()))?;

        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        let auth_res = session
            .authenticate_publickey(
                &target.user,
                PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
            )
            .await
            .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?;

        if !auth_res.success() {
            return Err(ExecError::AuthenticationFailed(
                "public key authentication failed".to_string(),
            ));
        }

        info!("SSH connected and authenticated");

        Ok(Self {
            target,
            session: Mutex::new(Some(session)),
        })
    }

    /// Connection target
    #[must_use]
    pub fn target(&self) -> &SshTarget {
        &self.target
    }
}

#[async_trait]
impl Transport for SshTransport {
    #[instrument(skip(self, request), fields(host = %self.target.host))]
    async fn run(&self, request: ExecRequest) -> Result<CommandResult, ExecError> {
        let mut session_lock = self.session.lock().await;
        let session = session_lock.as_mut().ok_or(ExecError::NotConnected)?;

        debug!(command = %request.command, "executing remote command");

        let start = Instant::now();

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        channel
            .exec(true, request.command.as_str())
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        if let Some(stdin) = &request.stdin {
            channel
                .data(&stdin[..])
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
        }
        channel
            .eof()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let mut status = -1;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        // exit-status may arrive after EOF, so drain until the channel closes
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => {
                    request.emit(Output::Stdout(data.to_vec()));
                    stdout.extend_from_slice(&data);
                }
                ChannelMsg::ExtendedData { data, ext: 1 } => {
                    request.emit(Output::Stderr(data.to_vec()));
                    stderr.extend_from_slice(&data);
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    status = exit_status.cast_signed();
                }
                _ => {}
            }
        }

        let duration = start.elapsed();

        debug!(
            command = %request.command,
            status = status,
            duration = ?duration,
            "remote command completed"
        );

        Ok(CommandResult {
            status,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            duration,
        })
    }

    async fn close(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if let Some(session) = session_lock.take() {
            session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            info!(host = %self.target.host, "SSH disconnected");
        }
        Ok(())
    }

    fn transport_type(&self) -> &'static str {
        "ssh"
    }
}
