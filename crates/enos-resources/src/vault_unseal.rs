//! `enos_vault_unseal`: unseal a Vault server on the target
//!
//! Shamir seals are unsealed by submitting keys one at a time until `vault
//! status` reports unsealed. Auto-unseal seals (`awskms`, `pkcs11`) only have
//! their status checked.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use enos_core::{Attribute, CoreError, Resource, Schema, State};
use enos_exec::{ExecRequest, Transport, shell_quote};
use enos_transport::TransportConfig;
use enos_wire::{
    AttributePath, DecodeError, ObjectReader, ObjectWriter, TfNumber, TfString, TfStringList, Value,
    WireObject, WireType,
};
use tracing::{debug, info, instrument, warn};

use crate::error::ResourceError;
use crate::remote::run_checked;

/// `vault status` exit code for an unsealed server
pub const STATUS_UNSEALED: i32 = 0;
/// `vault status` exit code for a sealed server
pub const STATUS_SEALED: i32 = 2;

/// How the server is sealed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SealType {
    #[default]
    Shamir,
    AwsKms,
    Pkcs11,
}

impl SealType {
    /// Whether Vault unseals itself
    #[must_use]
    pub fn is_auto(self) -> bool {
        !matches!(self, SealType::Shamir)
    }
}

impl FromStr for SealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shamir" => Ok(SealType::Shamir),
            "awskms" => Ok(SealType::AwsKms),
            "pkcs11" => Ok(SealType::Pkcs11),
            other => Err(format!(
                "unsupported seal type {other:?}, expected shamir, awskms or pkcs11"
            )),
        }
    }
}

impl fmt::Display for SealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SealType::Shamir => f.write_str("shamir"),
            SealType::AwsKms => f.write_str("awskms"),
            SealType::Pkcs11 => f.write_str("pkcs11"),
        }
    }
}

/// State of an `enos_vault_unseal`
#[derive(Clone, Default, PartialEq)]
pub struct VaultUnsealState {
    pub id: TfString,
    pub transport: TransportConfig,
    /// Path to the `vault` binary on the target
    pub bin_path: TfString,
    pub vault_addr: TfString,
    pub seal_type: TfString,
    pub unseal_keys: TfStringList,
    /// Exit code of the final `vault status`
    pub status: TfNumber,
}

impl VaultUnsealState {
    fn seal(&self) -> Result<SealType, String> {
        self.seal_type
            .get()
            .map_or(Ok(SealType::default()), |s| s.parse())
    }

    fn vault_command(&self, args: &str) -> String {
        let bin = self.bin_path.get().map_or("vault", String::as_str);
        let addr = self.vault_addr.get().map_or("", String::as_str);
        format!(
            "VAULT_ADDR={} {} {args}",
            shell_quote(addr),
            shell_quote(bin)
        )
    }
}

impl WireObject for VaultUnsealState {
    fn wire_type(&self) -> WireType {
        WireType::object([
            ("id", WireType::String),
            ("transport", self.transport.wire_type()),
            ("bin_path", WireType::String),
            ("vault_addr", WireType::String),
            ("seal_type", WireType::String),
            ("unseal_keys", WireType::string_list()),
            ("status", WireType::Number),
        ])
    }

    fn encode(&self) -> Value {
        ObjectWriter::new()
            .attr("id", &self.id)
            .object("transport", &self.transport)
            .attr("bin_path", &self.bin_path)
            .attr("vault_addr", &self.vault_addr)
            .attr("seal_type", &self.seal_type)
            .attr("unseal_keys", &self.unseal_keys)
            .attr("status", &self.status)
            .finish()
    }

    fn decode(value: &Value, path: &AttributePath) -> Result<Self, DecodeError> {
        let reader = ObjectReader::new(value, path)?;
        reader.reject_unknown_keys(&[
            "id",
            "transport",
            "bin_path",
            "vault_addr",
            "seal_type",
            "unseal_keys",
            "status",
        ])?;
        Ok(Self {
            id: reader.attr("id")?,
            transport: reader.object("transport")?,
            bin_path: reader.attr("bin_path")?,
            vault_addr: reader.attr("vault_addr")?,
            seal_type: reader.attr("seal_type")?,
            unseal_keys: reader.attr("unseal_keys")?,
            status: reader.attr("status")?,
        })
    }
}

impl State for VaultUnsealState {
    fn id(&self) -> &TfString {
        &self.id
    }

    fn id_mut(&mut self) -> &mut TfString {
        &mut self.id
    }

    fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    fn mark_outputs_unknown(&mut self) {
        self.status.set_unknown();
    }

    fn carry_outputs(&mut self, prior: &Self) {
        self.status = prior.status.clone();
    }
}

/// Unseals Vault
#[derive(Debug, Clone, Copy, Default)]
pub struct VaultUnseal;

impl VaultUnseal {
    /// Exit code of `vault status`; anything but sealed or unsealed is an error
    async fn status(
        &self,
        client: &dyn Transport,
        state: &VaultUnsealState,
    ) -> Result<i32, ResourceError> {
        let result = client.run(ExecRequest::new(state.vault_command("status"))).await?;
        match result.status {
            STATUS_UNSEALED | STATUS_SEALED => Ok(result.status),
            status => Err(ResourceError::CommandFailed {
                action: "query vault status".to_string(),
                status,
                stderr: result.stderr.trim().to_string(),
            }),
        }
    }

    #[instrument(skip_all)]
    async fn unseal(
        &self,
        client: &dyn Transport,
        state: &VaultUnsealState,
        seal: SealType,
    ) -> Result<i32, ResourceError> {
        let mut status = self.status(client, state).await?;
        if status == STATUS_UNSEALED {
            debug!("vault already unsealed");
            return Ok(status);
        }

        if seal.is_auto() {
            warn!(seal = %seal, "auto-unseal vault reports sealed");
            return Err(ResourceError::StillSealed(format!(
                "{seal} seal did not unseal the server"
            )));
        }

        let keys = state.unseal_keys.get().cloned().unwrap_or_default();
        for (i, key) in keys.iter().enumerate() {
            // the key goes over stdin so it never appears in a command line
            let request = ExecRequest::new(state.vault_command("operator unseal"))
                .with_stdin(format!("{key}\n"));
            run_checked(client, "submit unseal key", request).await?;

            status = self.status(client, state).await?;
            debug!(submitted = i + 1, status = status, "submitted unseal key");
            if status == STATUS_UNSEALED {
                return Ok(status);
            }
        }

        Err(ResourceError::StillSealed(format!(
            "server still sealed after {} unseal keys",
            keys.len()
        )))
    }
}

#[async_trait]
impl Resource for VaultUnseal {
    type State = VaultUnsealState;

    fn type_name(&self) -> &'static str {
        "enos_vault_unseal"
    }

    fn schema(&self) -> Schema {
        Schema::new(1)
            .attribute(Attribute::optional("transport", WireType::Dynamic))
            .attribute(Attribute::required("bin_path", WireType::String))
            .attribute(Attribute::required("vault_addr", WireType::String))
            .attribute(
                Attribute::optional("seal_type", WireType::String)
                    .describe("shamir (default), awskms or pkcs11"),
            )
            .attribute(Attribute::optional("unseal_keys", WireType::string_list()).sensitive())
            .attribute(
                Attribute::computed("status", WireType::Number)
                    .describe("Exit code of vault status: 0 unsealed, 2 sealed"),
            )
    }

    fn validate(&self, state: &VaultUnsealState) -> Result<(), CoreError> {
        let seal = state
            .seal()
            .map_err(|e| CoreError::validation(AttributePath::new("seal_type"), "invalid seal type", e))?;

        if seal == SealType::Shamir
            && !state.seal_type.is_unknown()
            && (state.unseal_keys.is_null()
                || state.unseal_keys.get().is_some_and(Vec::is_empty))
        {
            return Err(CoreError::validation(
                AttributePath::new("unseal_keys"),
                "missing unseal keys",
                "a shamir seal needs at least one unseal key",
            ));
        }

        Ok(())
    }

    fn needs_action(&self, prior: &VaultUnsealState, planned: &VaultUnsealState) -> bool {
        prior.bin_path != planned.bin_path
            || prior.vault_addr != planned.vault_addr
            || prior.seal_type != planned.seal_type
            || prior.unseal_keys != planned.unseal_keys
    }

    async fn apply(
        &self,
        client: Arc<dyn Transport>,
        state: &mut VaultUnsealState,
    ) -> Result<(), CoreError> {
        let seal = state
            .seal()
            .map_err(|e| CoreError::validation(AttributePath::new("seal_type"), "invalid seal type", e))?;

        info!(seal = %seal, "unsealing vault");
        let status = self.unseal(client.as_ref(), state, seal).await?;
        state.status.set(f64::from(status));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> VaultUnsealState {
        VaultUnsealState {
            bin_path: TfString::known("/opt/vault/bin/vault"),
            vault_addr: TfString::known("http://127.0.0.1:8200"),
            unseal_keys: TfStringList::known(vec!["k1".to_string(), "k2".to_string()]),
            ..VaultUnsealState::default()
        }
    }

    #[test]
    fn test_seal_type() {
        assert_eq!("awskms".parse::<SealType>(), Ok(SealType::AwsKms));
        assert!("transit".parse::<SealType>().is_err());
        assert_eq!(state().seal(), Ok(SealType::Shamir));
        assert!(SealType::Pkcs11.is_auto());
    }

    #[test]
    fn test_vault_command() {
        let command = state().vault_command("status");
        assert!(command.starts_with("VAULT_ADDR="));
        assert!(command.contains("http://127.0.0.1:8200"));
        assert!(command.ends_with(" /opt/vault/bin/vault status"));
    }

    #[test]
    fn test_validate() {
        assert!(VaultUnseal.validate(&state()).is_ok());

        let no_keys = VaultUnsealState {
            unseal_keys: TfStringList::Null,
            ..state()
        };
        let err = VaultUnseal.validate(&no_keys).unwrap_err();
        assert_eq!(err.path(), Some(&AttributePath::new("unseal_keys")));

        let auto = VaultUnsealState {
            seal_type: TfString::known("awskms"),
            ..no_keys
        };
        assert!(VaultUnseal.validate(&auto).is_ok());

        let bad = VaultUnsealState {
            seal_type: TfString::known("transit"),
            ..state()
        };
        let err = VaultUnseal.validate(&bad).unwrap_err();
        assert_eq!(err.path(), Some(&AttributePath::new("seal_type")));
    }

    #[test]
    fn test_needs_action_ignores_status() {
        let prior = VaultUnsealState {
            status: TfNumber::known(0.0),
            ..state()
        };
        assert!(!VaultUnseal.needs_action(&prior, &state()));

        let rotated = VaultUnsealState {
            unseal_keys: TfStringList::known(vec!["k3".to_string()]),
            ..state()
        };
        assert!(VaultUnseal.needs_action(&prior, &rotated));
    }
}
