//! SSH backend configuration

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use enos_exec::{ExecError, KeySource, PassphraseSource, SshTarget, SshTransport, Transport};
use enos_wire::{AttributePath, TfString};
use tracing::debug;

use crate::backend::{
    BackendConfig, Field, SuppliedKeys, TransportKind, fmt_redacted, known, require,
};
use crate::error::TransportError;

/// SSH transport settings
#[derive(Clone, Default, PartialEq)]
pub struct SshConfig {
    /// Login user
    pub user: TfString,
    /// `host` or `host:port`
    pub host: TfString,
    /// Inline private key
    pub private_key: TfString,
    /// Path to a private key file
    pub private_key_path: TfString,
    /// Inline key passphrase
    pub passphrase: TfString,
    /// Path to a file holding the key passphrase
    pub passphrase_path: TfString,
    supplied: SuppliedKeys,
}

impl SshConfig {
    /// Where the private key comes from; `None` while not known
    ///
    /// An inline key wins over a key path. Paths may start with `~`.
    #[must_use]
    pub fn key_source(&self) -> Option<KeySource> {
        if let Some(pem) = self.private_key.get() {
            return Some(KeySource::Inline(pem.clone()));
        }
        self.private_key_path
            .get()
            .map(|path| KeySource::Path(expand_path(path)))
    }

    /// Where the passphrase comes from, if one is configured
    #[must_use]
    pub fn passphrase_source(&self) -> Option<PassphraseSource> {
        if let Some(passphrase) = self.passphrase.get() {
            return Some(PassphraseSource::Inline(passphrase.clone()));
        }
        self.passphrase_path
            .get()
            .map(|path| PassphraseSource::Path(expand_path(path)))
    }

    /// Attribute blamed for key problems
    fn key_attribute(&self) -> &'static str {
        if self.private_key.is_null() && !self.private_key_path.is_null() {
            "private_key_path"
        } else {
            "private_key"
        }
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

impl fmt::Debug for SshConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_redacted(self, "SshConfig", f)
    }
}

#[async_trait]
impl BackendConfig for SshConfig {
    const KIND: TransportKind = TransportKind::Ssh;

    const FIELDS: &'static [Field] = &[
        Field {
            name: "user",
            env: "ENOS_TRANSPORT_USER",
            sensitive: false,
            forces_replacement: false,
        },
        Field {
            name: "host",
            env: "ENOS_TRANSPORT_HOST",
            sensitive: false,
            forces_replacement: true,
        },
        Field {
            name: "private_key",
            env: "ENOS_TRANSPORT_PRIVATE_KEY",
            sensitive: true,
            forces_replacement: false,
        },
        Field {
            name: "private_key_path",
            env: "ENOS_TRANSPORT_PRIVATE_KEY_PATH",
            sensitive: false,
            forces_replacement: false,
        },
        Field {
            name: "passphrase",
            env: "ENOS_TRANSPORT_PASSPHRASE",
            sensitive: true,
            forces_replacement: false,
        },
        Field {
            name: "passphrase_path",
            env: "ENOS_TRANSPORT_PASSPHRASE_PATH",
            sensitive: false,
            forces_replacement: false,
        },
    ];

    fn field(&self, name: &str) -> Option<&TfString> {
        match name {
            "user" => Some(&self.user),
            "host" => Some(&self.host),
            "private_key" => Some(&self.private_key),
            "private_key_path" => Some(&self.private_key_path),
            "passphrase" => Some(&self.passphrase),
            "passphrase_path" => Some(&self.passphrase_path),
            _ => None,
        }
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut TfString> {
        match name {
            "user" => Some(&mut self.user),
            "host" => Some(&mut self.host),
            "private_key" => Some(&mut self.private_key),
            "private_key_path" => Some(&mut self.private_key_path),
            "passphrase" => Some(&mut self.passphrase),
            "passphrase_path" => Some(&mut self.passphrase_path),
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
        let host = require(&self.host, path, "host")?;
        let user = require(&self.user, path, "user")?;

        if let (Some(host), Some(user)) = (host, user) {
            SshTarget::parse(host, user).map_err(|e| {
                TransportError::invalid(path.attr("host"), "invalid host", e.to_string())
            })?;
        }

        if self.private_key.is_null() && self.private_key_path.is_null() {
            return Err(TransportError::invalid(
                path.attr("private_key"),
                "missing key",
                "one of private_key or private_key_path must be set",
            ));
        }

        // the dry parse needs every piece of key material
        let pending = [
            &self.private_key,
            &self.private_key_path,
            &self.passphrase,
            &self.passphrase_path,
        ]
        .iter()
        .any(|attr| attr.is_unknown());
        if pending {
            debug!("skipping SSH key check until key material is known");
            return Ok(());
        }

        if let Some(source) = self.key_source() {
            source
                .load(self.passphrase_source().as_ref())
                .map_err(|e| {
                    TransportError::invalid(
                        path.attr(self.key_attribute()),
                        "invalid private key",
                        e.to_string(),
                    )
                })?;
        }

        Ok(())
    }

    async fn build_client(&self) -> Result<Arc<dyn Transport>, ExecError> {
        let target = SshTarget::parse(known(&self.host, "host")?, known(&self.user, "user")?)?;
        let source = self
            .key_source()
            .ok_or_else(|| ExecError::ConfigError("private key is not known".to_string()))?;
        let key = source.load(self.passphrase_source().as_ref())?;

        let transport = SshTransport::connect(target, key).await?;
        Ok(Arc::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const KEY: &str = include_str!("../../enos-exec/testdata/id_ed25519");
    const ENCRYPTED_KEY: &str = include_str!("../../enos-exec/testdata/id_ed25519_passphrase");

    fn path() -> AttributePath {
        AttributePath::new("transport").attr("ssh")
    }

    fn minimal() -> SshConfig {
        SshConfig::default()
            .with("user", "ubuntu")
            .with("host", "localhost")
            .with("private_key", KEY)
    }

    fn error_path(err: &TransportError) -> String {
        err.path().map(ToString::to_string).unwrap_or_default()
    }

    #[test]
    fn test_minimal_config_validates() {
        minimal().validate(&path()).unwrap();
    }

    #[test]
    fn test_missing_key() {
        let mut config = minimal();
        config.private_key.set_null();

        let err = config.validate(&path()).unwrap_err();
        assert_eq!(error_path(&err), "transport.ssh.private_key");
        assert!(err.to_string().contains("missing key"));
    }

    #[test]
    fn test_missing_host_and_user() {
        let mut config = minimal();
        config.host.set_null();
        let err = config.validate(&path()).unwrap_err();
        assert_eq!(error_path(&err), "transport.ssh.host");

        let mut config = minimal();
        config.user.set_null();
        let err = config.validate(&path()).unwrap_err();
        assert_eq!(error_path(&err), "transport.ssh.user");
    }

    #[test]
    fn test_bad_port() {
        let config = minimal().with("host", "10.0.0.5:notaport");
        let err = config.validate(&path()).unwrap_err();
        assert_eq!(error_path(&err), "transport.ssh.host");
    }

    #[test]
    fn test_malformed_key_fails_early() {
        let config = minimal().with("private_key", "not a key");
        let err = config.validate(&path()).unwrap_err();
        assert_eq!(error_path(&err), "transport.ssh.private_key");
        assert!(err.to_string().contains("invalid private key"));
    }

    #[test]
    fn test_unknown_key_material_skips_dry_parse() {
        let mut config = minimal();
        config.private_key.set_unknown();
        config.validate(&path()).unwrap();

        let mut config = minimal();
        config.host.set_unknown();
        config.validate(&path()).unwrap();
    }

    #[test]
    fn test_encrypted_key_with_passphrase() {
        let config = minimal()
            .with("private_key", ENCRYPTED_KEY)
            .with("passphrase", "hunter2");
        config.validate(&path()).unwrap();

        let wrong = config.clone().with("passphrase", "wrong");
        assert!(wrong.validate(&path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_and_passphrase_paths() {
        use std::os::unix::fs::PermissionsExt;

        let mut key = tempfile::NamedTempFile::new().unwrap();
        key.write_all(ENCRYPTED_KEY.as_bytes()).unwrap();
        std::fs::set_permissions(key.path(), std::fs::Permissions::from_mode(0o600)).unwrap();

        let mut passphrase = tempfile::NamedTempFile::new().unwrap();
        writeln!(passphrase, "hunter2").unwrap();

        let config = SshConfig::default()
            .with("user", "ubuntu")
            .with("host", "10.0.0.5:2222")
            .with("private_key_path", key.path().display().to_string())
            .with("passphrase_path", passphrase.path().display().to_string());
        config.validate(&path()).unwrap();

        std::fs::set_permissions(key.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
        let err = config.validate(&path()).unwrap_err();
        assert_eq!(error_path(&err), "transport.ssh.private_key_path");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", minimal().with("passphrase", "SECRET"));
        assert!(!rendered.contains("SECRET"));
        assert!(!rendered.contains("PRIVATE KEY"));
        assert!(rendered.contains("\"localhost\""));
        assert!(rendered.contains("[redacted]"));
    }

    #[tokio::test]
    async fn test_build_requires_known_values() {
        let mut config = minimal();
        config.host.set_unknown();
        let err = config.build_client().await.err().expect("expected build_client to fail");
        assert!(matches!(err, ExecError::ConfigError(_)));
    }

    #[tokio::test]
    #[ignore = "requires an SSH server on localhost accepting testdata/id_ed25519"]
    async fn test_build_client_live() {
        let client = minimal().build_client().await.unwrap();
        assert_eq!(client.transport_type(), "ssh");
        client.close().await.unwrap();
    }
}
