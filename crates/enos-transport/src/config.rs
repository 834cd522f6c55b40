//! The `transport` attribute: at most one configured backend
//!
//! A request moves a [`TransportConfig`] through decode, default merging and
//! validation. Validation consumes the config and yields a
//! [`ResolvedTransport`], the only type that can build a client.

use std::fmt;
use std::sync::Arc;

use enos_exec::Transport;
use enos_wire::{AttributePath, DecodeError, ObjectReader, Value, WireObject, WireType};
use tracing::{debug, info, instrument};

use crate::backend::{
    BackendConfig, TransportKind, backend_type, decode_backend, encode_backend, merge_backend,
    redacted_lines, replaced_fields,
};
use crate::env::{EnvLookup, ProcessEnv};
use crate::error::TransportError;
use crate::kubernetes::K8sConfig;
use crate::nomad::NomadConfig;
use crate::ssh::SshConfig;

/// Attribute name resources use for their transport block
pub const TRANSPORT_ATTRIBUTE: &str = "transport";

/// The active backend of a transport block
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Backend {
    /// No backend block present
    #[default]
    Unconfigured,
    Ssh(SshConfig),
    Kubernetes(K8sConfig),
    Nomad(NomadConfig),
}

impl Backend {
    /// Kind of the active backend
    #[must_use]
    pub fn kind(&self) -> Option<TransportKind> {
        match self {
            Backend::Unconfigured => None,
            Backend::Ssh(_) => Some(TransportKind::Ssh),
            Backend::Kubernetes(_) => Some(TransportKind::Kubernetes),
            Backend::Nomad(_) => Some(TransportKind::Nomad),
        }
    }

    /// Keys supplied to the active backend
    #[must_use]
    pub fn supplied_keys(&self) -> Vec<String> {
        match self {
            Backend::Unconfigured => Vec::new(),
            Backend::Ssh(c) => c.supplied().iter().map(str::to_string).collect(),
            Backend::Kubernetes(c) => c.supplied().iter().map(str::to_string).collect(),
            Backend::Nomad(c) => c.supplied().iter().map(str::to_string).collect(),
        }
    }

    /// A backend of `kind` with no supplied keys
    fn empty(kind: TransportKind) -> Self {
        match kind {
            TransportKind::Ssh => Backend::Ssh(SshConfig::default()),
            TransportKind::Kubernetes => Backend::Kubernetes(K8sConfig::default()),
            TransportKind::Nomad => Backend::Nomad(NomadConfig::default()),
        }
    }

    fn decode(kind: TransportKind, value: &Value, path: &AttributePath) -> Result<Self, DecodeError> {
        Ok(match kind {
            TransportKind::Ssh => Backend::Ssh(decode_backend(value, path)?),
            TransportKind::Kubernetes => Backend::Kubernetes(decode_backend(value, path)?),
            TransportKind::Nomad => Backend::Nomad(decode_backend(value, path)?),
        })
    }

    fn encode(&self) -> Option<Value> {
        match self {
            Backend::Unconfigured => None,
            Backend::Ssh(c) => Some(encode_backend(c)),
            Backend::Kubernetes(c) => Some(encode_backend(c)),
            Backend::Nomad(c) => Some(encode_backend(c)),
        }
    }

    fn wire_type(&self) -> Option<WireType> {
        match self {
            Backend::Unconfigured => None,
            Backend::Ssh(c) => Some(backend_type(c)),
            Backend::Kubernetes(c) => Some(backend_type(c)),
            Backend::Nomad(c) => Some(backend_type(c)),
        }
    }

    fn redacted(&self) -> Vec<(&'static str, String)> {
        match self {
            Backend::Unconfigured => Vec::new(),
            Backend::Ssh(c) => redacted_lines(c),
            Backend::Kubernetes(c) => redacted_lines(c),
            Backend::Nomad(c) => redacted_lines(c),
        }
    }

    fn validate(&self, path: &AttributePath) -> Result<(), TransportError> {
        match self {
            Backend::Unconfigured => Ok(()),
            Backend::Ssh(c) => c.validate(path),
            Backend::Kubernetes(c) => c.validate(path),
            Backend::Nomad(c) => c.validate(path),
        }
    }

    async fn build_client(&self) -> Result<Option<Arc<dyn Transport>>, enos_exec::ExecError> {
        match self {
            Backend::Unconfigured => Ok(None),
            Backend::Ssh(c) => c.build_client().await.map(Some),
            Backend::Kubernetes(c) => c.build_client().await.map(Some),
            Backend::Nomad(c) => c.build_client().await.map(Some),
        }
    }

    /// Merge this backend over `defaults`, falling back to `env`
    ///
    /// A defaults backend of another kind contributes nothing.
    fn merge(&self, defaults: &Backend, env: &dyn EnvLookup) -> Backend {
        match (self, defaults) {
            (Backend::Ssh(c), Backend::Ssh(d)) => Backend::Ssh(merge_backend(c, Some(d), env)),
            (Backend::Ssh(c), _) => Backend::Ssh(merge_backend(c, None, env)),
            (Backend::Kubernetes(c), Backend::Kubernetes(d)) => {
                Backend::Kubernetes(merge_backend(c, Some(d), env))
            }
            (Backend::Kubernetes(c), _) => Backend::Kubernetes(merge_backend(c, None, env)),
            (Backend::Nomad(c), Backend::Nomad(d)) => {
                Backend::Nomad(merge_backend(c, Some(d), env))
            }
            (Backend::Nomad(c), _) => Backend::Nomad(merge_backend(c, None, env)),
            (Backend::Unconfigured, Backend::Unconfigured) => Backend::from_env(env),
            (Backend::Unconfigured, defaults) => defaults.merge(&Backend::Unconfigured, env),
        }
    }

    /// First backend the environment alone configures, in kind order
    fn from_env(env: &dyn EnvLookup) -> Backend {
        let ssh: SshConfig = merge_backend(&SshConfig::default(), None, env);
        if !ssh.supplied().is_empty() {
            return Backend::Ssh(ssh);
        }
        let k8s: K8sConfig = merge_backend(&K8sConfig::default(), None, env);
        if !k8s.supplied().is_empty() {
            return Backend::Kubernetes(k8s);
        }
        let nomad: NomadConfig = merge_backend(&NomadConfig::default(), None, env);
        if !nomad.supplied().is_empty() {
            return Backend::Nomad(nomad);
        }
        Backend::Unconfigured
    }

    fn replaced(&self, proposed: &Backend, path: &AttributePath) -> Vec<AttributePath> {
        match (self, proposed) {
            (Backend::Ssh(p), Backend::Ssh(n)) => replaced_fields(p, n, &path.attr("ssh")),
            (Backend::Kubernetes(p), Backend::Kubernetes(n)) => {
                replaced_fields(p, n, &path.attr("kubernetes"))
            }
            (Backend::Nomad(p), Backend::Nomad(n)) => replaced_fields(p, n, &path.attr("nomad")),
            // switching mechanisms means talking to a different target
            (prior, proposed) if prior.kind().is_some() && proposed.kind().is_some() => {
                vec![path.clone()]
            }
            _ => Vec::new(),
        }
    }
}

impl From<SshConfig> for Backend {
    fn from(config: SshConfig) -> Self {
        Backend::Ssh(config)
    }
}

impl From<K8sConfig> for Backend {
    fn from(config: K8sConfig) -> Self {
        Backend::Kubernetes(config)
    }
}

impl From<NomadConfig> for Backend {
    fn from(config: NomadConfig) -> Self {
        Backend::Nomad(config)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Presence {
    #[default]
    Null,
    Unknown,
    /// Kind chosen, its settings not known yet: `{"ssh": <unknown>}`
    UnknownBackend,
    Object,
}

/// A resource's or provider's `transport` attribute
///
/// `Clone` is a deep copy, including supplied keys, so every lifecycle phase
/// can work on its own instance.
#[derive(Clone, PartialEq)]
pub struct TransportConfig {
    path: AttributePath,
    presence: Presence,
    backend: Backend,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            path: AttributePath::new(TRANSPORT_ATTRIBUTE),
            presence: Presence::Null,
            backend: Backend::Unconfigured,
        }
    }
}

impl TransportConfig {
    /// A config with `backend` active
    pub fn new(backend: impl Into<Backend>) -> Self {
        Self {
            presence: Presence::Object,
            backend: backend.into(),
            ..Self::default()
        }
    }

    /// A config whose value is not known yet
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            presence: Presence::Unknown,
            ..Self::default()
        }
    }

    /// Relocate diagnostics to `path`
    #[must_use]
    pub fn at(mut self, path: AttributePath) -> Self {
        self.path = path;
        self
    }

    /// Location of this attribute
    #[must_use]
    pub fn path(&self) -> &AttributePath {
        &self.path
    }

    /// The active backend
    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Kind of the active backend
    #[must_use]
    pub fn kind(&self) -> Option<TransportKind> {
        self.backend.kind()
    }

    /// Whether the block, or the settings of its chosen backend, are not
    /// known yet
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self.presence, Presence::Unknown | Presence::UnknownBackend)
    }

    /// Whether exactly one backend is configured
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.presence == Presence::Object && self.backend.kind().is_some()
    }

    /// Keys supplied to the active backend
    #[must_use]
    pub fn supplied_keys(&self) -> Vec<String> {
        self.backend.supplied_keys()
    }

    /// Merge provider defaults and the process environment into a new config
    #[must_use]
    pub fn apply_defaults(&self, defaults: &TransportConfig) -> TransportConfig {
        self.apply_defaults_with_env(defaults, &ProcessEnv)
    }

    /// Merge provider defaults and `env` into a new config
    ///
    /// Per field: a known resource value wins, then a known provider value,
    /// then the field's environment variable; otherwise the resource value
    /// is kept as it was. Neither input is modified.
    #[must_use]
    pub fn apply_defaults_with_env(
        &self,
        defaults: &TransportConfig,
        env: &dyn EnvLookup,
    ) -> TransportConfig {
        if self.is_unknown() {
            return self.clone();
        }

        let backend = self.backend.merge(&defaults.backend, env);
        let presence = if backend.kind().is_some() {
            Presence::Object
        } else {
            self.presence
        };

        debug!(
            transport = ?backend.kind(),
            keys = ?backend.supplied_keys(),
            "applied transport defaults"
        );

        TransportConfig {
            path: self.path.clone(),
            presence,
            backend,
        }
    }

    /// Attribute paths whose change between `prior` and `proposed` forces the
    /// owning resource to be replaced
    ///
    /// Only identity fields are compared. Changing the backend kind replaces
    /// the whole `transport` attribute, even when the new backend's settings
    /// are not known yet.
    #[must_use]
    pub fn replaced_attribute_paths(
        prior: &TransportConfig,
        proposed: &TransportConfig,
    ) -> Vec<AttributePath> {
        if prior.presence == Presence::Unknown || proposed.presence == Presence::Unknown {
            return Vec::new();
        }
        if prior.is_unknown() || proposed.is_unknown() {
            return match (prior.kind(), proposed.kind()) {
                (Some(a), Some(b)) if a != b => vec![proposed.path.clone()],
                _ => Vec::new(),
            };
        }
        prior.backend.replaced(&proposed.backend, &proposed.path)
    }

    /// Check the config without consuming it
    ///
    /// # Errors
    /// Returns `TransportError::NotKnown` for an unknown block or backend,
    /// `TransportError::NotConfigured` when no backend is active and the
    /// backend's own validation error otherwise
    pub fn check(&self) -> Result<(), TransportError> {
        match (self.presence, self.backend.kind()) {
            (Presence::Unknown, _) => Err(TransportError::NotKnown {
                path: self.path.clone(),
            }),
            (Presence::UnknownBackend, Some(kind)) => Err(TransportError::NotKnown {
                path: self.path.attr(kind.name()),
            }),
            (_, None) => Err(TransportError::NotConfigured {
                path: self.path.clone(),
            }),
            (_, Some(kind)) => self.backend.validate(&self.path.attr(kind.name())),
        }
    }

    /// Validate and move to the resolved state
    ///
    /// # Errors
    /// Same as [`TransportConfig::check`]
    pub fn validate(self) -> Result<ResolvedTransport, TransportError> {
        self.check()?;
        let kind = self.backend.kind().ok_or_else(|| TransportError::NotConfigured {
            path: self.path.clone(),
        })?;
        Ok(ResolvedTransport {
            kind,
            path: self.path,
            backend: self.backend,
        })
    }
}

impl WireObject for TransportConfig {
    fn wire_type(&self) -> WireType {
        if let (Presence::UnknownBackend, Some(kind)) = (self.presence, self.backend.kind()) {
            return WireType::object([(kind.name(), WireType::Dynamic)]);
        }
        match self.backend.wire_type() {
            Some(inner) => self
                .backend
                .kind()
                .map_or(WireType::Dynamic, |kind| WireType::object([(kind.name(), inner)])),
            None => WireType::Dynamic,
        }
    }

    fn encode(&self) -> Value {
        match self.presence {
            Presence::Null => Value::Null,
            Presence::Unknown => Value::Unknown,
            Presence::UnknownBackend => match self.backend.kind() {
                Some(kind) => Value::object([(kind.name(), Value::Unknown)]),
                None => Value::Unknown,
            },
            Presence::Object => match (self.backend.kind(), self.backend.encode()) {
                (Some(kind), Some(inner)) => Value::object([(kind.name(), inner)]),
                _ => Value::object(Vec::<(String, Value)>::new()),
            },
        }
    }

    fn decode(value: &Value, path: &AttributePath) -> Result<Self, DecodeError> {
        let base = TransportConfig::default().at(path.clone());
        match value {
            Value::Null => return Ok(base),
            Value::Unknown => {
                return Ok(TransportConfig {
                    presence: Presence::Unknown,
                    ..base
                });
            }
            _ => {}
        }

        let reader = ObjectReader::new(value, path)?;
        let kinds: Vec<&str> = TransportKind::ALL.iter().map(|k| k.name()).collect();
        reader.reject_unknown_keys(&kinds)?;

        let present: Vec<TransportKind> = TransportKind::ALL
            .into_iter()
            .filter(|kind| reader.raw(kind.name()).is_some_and(|v| !v.is_null()))
            .collect();

        let backend = match present.as_slice() {
            [] => Backend::Unconfigured,
            [kind] => {
                let block = reader.raw(kind.name()).unwrap_or(&Value::Null);
                if block.is_unknown() {
                    return Ok(TransportConfig {
                        presence: Presence::UnknownBackend,
                        backend: Backend::empty(*kind),
                        ..base
                    });
                }
                Backend::decode(*kind, block, &path.attr(kind.name()))?
            }
            many => {
                let names: Vec<&str> = many.iter().map(|k| k.name()).collect();
                return Err(DecodeError::invalid(
                    path,
                    format!(
                        "only one transport may be configured, found {}",
                        names.join(", ")
                    ),
                ));
            }
        };

        Ok(TransportConfig {
            presence: Presence::Object,
            backend,
            ..base
        })
    }
}

impl fmt::Display for TransportConfig {
    /// Redacted dump for diagnostics
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.presence, self.backend.kind()) {
            (Presence::Unknown, _) => write!(f, "{} (known after apply)", self.path),
            (Presence::UnknownBackend, Some(kind)) => {
                write!(f, "{}.{} (known after apply)", self.path, kind)
            }
            (_, None) => write!(f, "{} (not configured)", self.path),
            (_, Some(kind)) => {
                write!(f, "{}.{} {{", self.path, kind)?;
                for (i, (key, value)) in self.backend.redacted().into_iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{key} = {value}")?;
                }
                f.write_str(" }")
            }
        }
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("path", &format_args!("{}", self.path))
            .field("presence", &self.presence)
            .field("backend", &self.backend)
            .finish()
    }
}

/// A validated transport config, ready to build a client
#[derive(Debug, Clone)]
pub struct ResolvedTransport {
    kind: TransportKind,
    path: AttributePath,
    backend: Backend,
}

impl ResolvedTransport {
    /// Kind of the resolved backend
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Location of the transport attribute
    #[must_use]
    pub fn path(&self) -> &AttributePath {
        &self.path
    }

    /// The validated backend
    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Construct the client
    ///
    /// # Errors
    /// Returns `TransportError::Build` carrying the backend kind and the
    /// supplied keys, never their values
    #[instrument(skip(self), fields(transport = %self.kind))]
    pub async fn build_client(&self) -> Result<Arc<dyn Transport>, TransportError> {
        info!("building transport client");

        let wrap = |source| TransportError::Build {
            kind: self.kind,
            supplied: self.backend.supplied_keys(),
            source,
        };

        match self.backend.build_client().await {
            Ok(Some(client)) => Ok(client),
            Ok(None) => Err(TransportError::NotConfigured {
                path: self.path.clone(),
            }),
            Err(source) => Err(wrap(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use enos_exec::ExecError;

    use super::*;
    use crate::env::EmptyEnv;

    fn decode_json(json: &str) -> Result<TransportConfig, DecodeError> {
        let value = Value::parse_json(json.as_bytes()).unwrap();
        TransportConfig::decode(&value, &AttributePath::new("transport"))
    }

    fn ssh(json: &str) -> TransportConfig {
        decode_json(&format!(r#"{{"ssh": {json}}}"#)).unwrap()
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn ssh_field(config: &TransportConfig, name: &str) -> enos_wire::TfString {
        match config.backend() {
            Backend::Ssh(c) => c.field(name).cloned().unwrap_or_default(),
            other => panic!("expected ssh backend, got {other:?}"),
        }
    }

    #[test]
    fn test_round_trip() {
        let inputs = [
            r#"{"ssh":{"host":"10.0.0.5","user":"ubuntu"}}"#,
            r#"{"ssh":{"host":"10.0.0.5","private_key_path":"~/.ssh/id"}}"#,
            r#"{"kubernetes":{"kubeconfig_base64":"YQ==","pod":"vault-0"}}"#,
            r#"{"nomad":{"allocation_id":"8a1b","host":"http://nomad:4646","task_name":"vault"}}"#,
            r#"{"ssh":{"host":"74D93920-ED26-11E3-AC10-0800200C9A66","user":null}}"#,
        ];
        for input in inputs {
            let value = Value::parse_json(input.as_bytes()).unwrap();
            let config = TransportConfig::decode(&value, &AttributePath::new("transport")).unwrap();
            assert_eq!(config.encode(), value, "round trip of {input}");
        }
    }

    #[test]
    fn test_null_and_unknown_round_trip() {
        for value in [Value::Null, Value::Unknown] {
            let config = TransportConfig::decode(&value, &AttributePath::new("transport")).unwrap();
            assert_eq!(config.encode(), value);
        }
    }

    #[test]
    fn test_closed_field_enforcement() {
        let err = decode_json(r#"{"ssh":{"host":"h","not_an_arg":"x"}}"#).unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), "transport.ssh.not_an_arg");

        // a kubernetes key is not an ssh key
        let err = decode_json(r#"{"ssh":{"pod":"p"}}"#).unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), "transport.ssh.pod");

        let err = decode_json(r#"{"winrm":{"host":"h"}}"#).unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), "transport.winrm");
    }

    #[test]
    fn test_mixed_backends_rejected() {
        let err = decode_json(r#"{"ssh":{"host":"h"},"nomad":{"host":"h"}}"#).unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), "transport");
        assert!(err.to_string().contains("ssh, nomad"));

        // a null block does not count
        let config = decode_json(r#"{"ssh":{"host":"h"},"nomad":null}"#).unwrap();
        assert_eq!(config.kind(), Some(TransportKind::Ssh));
    }

    #[test]
    fn test_type_mismatch() {
        let err = decode_json(r#"{"ssh":{"host":5}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { .. }));
        assert_eq!(err.path().unwrap().to_string(), "transport.ssh.host");

        assert!(decode_json(r#""ssh""#).is_err());
    }

    #[test]
    fn test_unknown_backend_block_carried() {
        let input = r#"{"ssh":"74D93920-ED26-11E3-AC10-0800200C9A66"}"#;
        let config = decode_json(input).unwrap();
        assert!(config.is_unknown());
        assert!(!config.is_configured());
        assert_eq!(config.kind(), Some(TransportKind::Ssh));
        assert_eq!(config.encode(), Value::parse_json(input.as_bytes()).unwrap());
        assert_eq!(config.wire_type().to_string(), "object({ssh=dynamic})");
        assert_eq!(config.to_string(), "transport.ssh (known after apply)");

        let merged = config.apply_defaults_with_env(&ssh(r#"{"user":"admin"}"#), &EmptyEnv);
        assert_eq!(merged, config);

        let err = config.validate().unwrap_err();
        assert!(matches!(err, TransportError::NotKnown { .. }));
        assert_eq!(err.path().unwrap().to_string(), "transport.ssh");
    }

    #[test]
    fn test_unknown_backend_block_replacement() {
        let prior = ssh(r#"{"host":"10.0.0.5"}"#);
        let same_kind = decode_json(r#"{"ssh":"74D93920-ED26-11E3-AC10-0800200C9A66"}"#).unwrap();
        assert!(TransportConfig::replaced_attribute_paths(&prior, &same_kind).is_empty());

        let other_kind = decode_json(r#"{"nomad":"74D93920-ED26-11E3-AC10-0800200C9A66"}"#).unwrap();
        assert_eq!(
            TransportConfig::replaced_attribute_paths(&prior, &other_kind),
            [AttributePath::new("transport")]
        );
    }

    #[test]
    fn test_wire_type_follows_supplied_keys() {
        let config = ssh(r#"{"host":"h","user":"u"}"#);
        assert_eq!(
            config.wire_type().to_string(),
            "object({ssh=object({host=string,user=string})})"
        );
        config.wire_type().check(&config.encode(), config.path()).unwrap();

        let merged = config.apply_defaults_with_env(&ssh(r#"{"private_key":"k"}"#), &EmptyEnv);
        assert_eq!(
            merged.wire_type().to_string(),
            "object({ssh=object({host=string,private_key=string,user=string})})"
        );

        assert_eq!(TransportConfig::default().wire_type(), WireType::Dynamic);
    }

    #[test]
    fn test_merge_precedence() {
        let resource = ssh(r#"{"host":"resource","user":"74D93920-ED26-11E3-AC10-0800200C9A66"}"#);
        let provider = ssh(r#"{"host":"provider","user":"provider-user","passphrase":"p"}"#);
        let env = env(&[
            ("ENOS_TRANSPORT_HOST", "env"),
            ("ENOS_TRANSPORT_USER", "env-user"),
            ("ENOS_TRANSPORT_PASSPHRASE", "env-pass"),
            ("ENOS_TRANSPORT_PRIVATE_KEY_PATH", "/env/key"),
        ]);

        let merged = resource.apply_defaults_with_env(&provider, &env);
        assert_eq!(ssh_field(&merged, "host").get().unwrap(), "resource");
        assert_eq!(ssh_field(&merged, "user").get().unwrap(), "provider-user");
        assert_eq!(ssh_field(&merged, "passphrase").get().unwrap(), "p");
        assert_eq!(ssh_field(&merged, "private_key_path").get().unwrap(), "/env/key");
        assert!(ssh_field(&merged, "private_key").is_null());
    }

    #[test]
    fn test_merge_keeps_unknown_without_fallback() {
        let resource = ssh(r#"{"host":"74D93920-ED26-11E3-AC10-0800200C9A66"}"#);
        let merged = resource.apply_defaults_with_env(&TransportConfig::default(), &EmptyEnv);
        assert!(ssh_field(&merged, "host").is_unknown());
        assert_eq!(merged.supplied_keys(), ["host"]);
    }

    #[test]
    fn test_merge_does_not_mutate_inputs() {
        let resource = ssh(r#"{"host":"10.0.0.5"}"#);
        let provider = ssh(r#"{"user":"admin"}"#);
        let (resource_before, provider_before) = (resource.clone(), provider.clone());

        let _ = resource.apply_defaults_with_env(&provider, &EmptyEnv);
        assert_eq!(resource, resource_before);
        assert_eq!(provider, provider_before);
    }

    #[test]
    fn test_default_merge_across_layers() {
        let provider = ssh(r#"{"user":"admin"}"#);
        let resource = ssh(r#"{"host":"10.0.0.5"}"#);

        let merged = resource.apply_defaults_with_env(&provider, &EmptyEnv);
        let expected = Value::parse_json(br#"{"ssh":{"host":"10.0.0.5","user":"admin"}}"#).unwrap();
        assert_eq!(merged.encode(), expected);
    }

    #[test]
    fn test_merge_from_provider_only() {
        let provider = ssh(r#"{"user":"admin","host":"10.0.0.5"}"#);
        let merged = TransportConfig::default().apply_defaults_with_env(&provider, &EmptyEnv);
        assert_eq!(merged.kind(), Some(TransportKind::Ssh));
        assert_eq!(merged.encode(), provider.encode());
    }

    #[test]
    fn test_merge_ignores_other_backend_defaults() {
        let provider = decode_json(r#"{"nomad":{"host":"http://nomad:4646"}}"#).unwrap();
        let merged = ssh(r#"{"host":"h"}"#).apply_defaults_with_env(&provider, &EmptyEnv);
        assert_eq!(merged.kind(), Some(TransportKind::Ssh));
        assert_eq!(merged.supplied_keys(), ["host"]);
    }

    #[test]
    fn test_environment_alone_configures_backend() {
        let env = env(&[("ENOS_K8S_POD", "vault-0"), ("ENOS_KUBECONFIG", "YQ==")]);
        let merged = TransportConfig::default().apply_defaults_with_env(&TransportConfig::default(), &env);
        assert_eq!(merged.kind(), Some(TransportKind::Kubernetes));

        let nothing =
            TransportConfig::default().apply_defaults_with_env(&TransportConfig::default(), &EmptyEnv);
        assert!(!nothing.is_configured());
        assert_eq!(nothing.encode(), Value::Null);
    }

    #[test]
    fn test_unknown_block_is_not_merged() {
        let merged = TransportConfig::unknown()
            .apply_defaults_with_env(&ssh(r#"{"user":"admin"}"#), &EmptyEnv);
        assert!(merged.is_unknown());
    }

    #[test]
    fn test_replacement_is_identity_scoped() {
        let prior = ssh(r#"{"host":"10.0.0.5","user":"u","passphrase":"a"}"#);

        let moved = ssh(r#"{"host":"10.0.0.6","user":"u","passphrase":"a"}"#);
        let paths: Vec<String> = TransportConfig::replaced_attribute_paths(&prior, &moved)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(paths, ["transport.ssh.host"]);

        let rekeyed = ssh(r#"{"host":"10.0.0.5","user":"other","passphrase":"b"}"#);
        assert!(TransportConfig::replaced_attribute_paths(&prior, &rekeyed).is_empty());
    }

    #[test]
    fn test_kubernetes_replacement() {
        let prior =
            decode_json(r#"{"kubernetes":{"kubeconfig_base64":"YQ==","context_name":"a","pod":"p"}}"#)
                .unwrap();
        let proposed =
            decode_json(r#"{"kubernetes":{"kubeconfig_base64":"Yg==","context_name":"b","pod":"p"}}"#)
                .unwrap();
        let paths: Vec<String> = TransportConfig::replaced_attribute_paths(&prior, &proposed)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            paths,
            [
                "transport.kubernetes.kubeconfig_base64",
                "transport.kubernetes.context_name"
            ]
        );
    }

    #[test]
    fn test_backend_switch_replaces_transport() {
        let prior = ssh(r#"{"host":"h"}"#);
        let proposed = decode_json(r#"{"nomad":{"host":"h"}}"#).unwrap();
        let paths = TransportConfig::replaced_attribute_paths(&prior, &proposed);
        assert_eq!(paths, [AttributePath::new("transport")]);

        assert!(TransportConfig::replaced_attribute_paths(&prior, &TransportConfig::unknown()).is_empty());
    }

    #[test]
    fn test_redaction() {
        let config = ssh(r#"{"host":"10.0.0.5","user":"ubuntu","private_key":"SECRET","passphrase":"hunter2"}"#);
        let dump = config.to_string();
        assert!(!dump.contains("SECRET"));
        assert!(!dump.contains("hunter2"));
        assert!(dump.contains("host = \"10.0.0.5\""));
        assert!(dump.contains("user = \"ubuntu\""));
        assert!(dump.contains("private_key = [redacted]"));
        assert!(dump.starts_with("transport.ssh {"));

        let debug = format!("{config:?}");
        assert!(!debug.contains("SECRET"));

        let nomad = decode_json(r#"{"nomad":{"host":"h","secret_id":"tok-123"}}"#).unwrap();
        assert!(!nomad.to_string().contains("tok-123"));
        assert!(nomad.to_string().contains("secret_id = [redacted]"));
    }

    #[test]
    fn test_clone_is_independent() {
        let original = ssh(r#"{"host":"10.0.0.5"}"#);
        let mut copy = original.clone();
        if let Backend::Ssh(c) = &mut copy.backend {
            c.set("user", "admin".into());
        }
        assert_eq!(original.supplied_keys(), ["host"]);
        assert_eq!(copy.supplied_keys(), ["host", "user"]);
    }

    #[test]
    fn test_validate_states() {
        let err = TransportConfig::default().validate().unwrap_err();
        assert!(matches!(err, TransportError::NotConfigured { .. }));

        let err = TransportConfig::unknown().validate().unwrap_err();
        assert!(matches!(err, TransportError::NotKnown { .. }));

        let err = ssh(r#"{"host":"10.0.0.5","user":"ubuntu"}"#).validate().unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), "transport.ssh.private_key");
    }

    #[test]
    fn test_errors_follow_relocated_path() {
        let config = ssh(r#"{"host":"10.0.0.5"}"#).at(AttributePath::new("provider").attr("transport"));
        let err = config.validate().unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), "provider.transport.ssh.user");
    }

    #[tokio::test]
    async fn test_build_error_names_supplied_keys_only() {
        let config = decode_json(
            r#"{"nomad":{"host":"http://nomad:4646","secret_id":"tok-123","allocation_id":" ","task_name":"t"}}"#,
        )
        .unwrap();
        // whitespace passes decode but the client rejects it
        let resolved = ResolvedTransport {
            kind: TransportKind::Nomad,
            path: config.path().clone(),
            backend: config.backend().clone(),
        };
        let err = resolved.build_client().await.err().expect("expected build_client to fail");
        let message = err.to_string();
        assert!(matches!(
            err,
            TransportError::Build {
                kind: TransportKind::Nomad,
                source: ExecError::ConfigError(_),
                ..
            }
        ));
        assert!(message.contains("secret_id"));
        assert!(!message.contains("tok-123"));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_resolved_builds_client() {
        let json = format!(
            r#"{{"kubernetes":{{"kubeconfig_base64":"{}","pod":"vault-0"}}}}"#,
            crate::kubernetes::encoded_test_kubeconfig()
        );
        let config = decode_json(&json).unwrap();
        let client = config.validate().unwrap().build_client().await.unwrap();
        assert_eq!(client.transport_type(), "kubernetes");
        client.close().await.unwrap();
    }
}
