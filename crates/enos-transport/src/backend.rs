//! Backend variant plumbing shared by SSH, Kubernetes and Nomad
//!
//! Each backend declares a static table of [`Field`]s. Decode, encode, default
//! merging, replacement and redaction are written once against that table.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use enos_exec::{ExecError, Transport};
use enos_wire::{AttributePath, DecodeError, ObjectReader, TfString, Value, WireType};

use crate::env::EnvLookup;
use crate::error::TransportError;

/// Placeholder shown instead of sensitive values
pub const REDACTED: &str = "[redacted]";

/// Supported remote execution mechanisms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransportKind {
    Ssh,
    Kubernetes,
    Nomad,
}

impl TransportKind {
    /// Every kind, in wire order
    pub const ALL: [TransportKind; 3] = [
        TransportKind::Ssh,
        TransportKind::Kubernetes,
        TransportKind::Nomad,
    ];

    /// Attribute name of this backend's block
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TransportKind::Ssh => "ssh",
            TransportKind::Kubernetes => "kubernetes",
            TransportKind::Nomad => "nomad",
        }
    }

    /// Look up a kind by block name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declaration of one backend field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Wire key
    pub name: &'static str,
    /// Environment variable consulted when no layer supplies a value
    pub env: &'static str,
    /// Redacted in diagnostics
    pub sensitive: bool,
    /// A change means the target identity changed
    pub forces_replacement: bool,
}

/// Keys present in the most recent decode
///
/// This set, not the field table, decides the generated wire type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuppliedKeys(BTreeSet<String>);

impl SuppliedKeys {
    /// Record a key
    pub fn insert(&mut self, key: impl Into<String>) {
        self.0.insert(key.into());
    }

    /// Whether `key` was supplied
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    /// Keys in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of supplied keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was supplied
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A transport backend's configuration
#[async_trait]
pub trait BackendConfig: Clone + Default + PartialEq + Send + Sync + 'static {
    /// Which backend this is
    const KIND: TransportKind;

    /// Declared fields; the closed key set for this backend
    const FIELDS: &'static [Field];

    /// Field by wire key
    fn field(&self, name: &str) -> Option<&TfString>;

    /// Mutable field by wire key
    fn field_mut(&mut self, name: &str) -> Option<&mut TfString>;

    /// Keys supplied in the last decode
    fn supplied(&self) -> &SuppliedKeys;

    /// Mutable supplied keys
    fn supplied_mut(&mut self) -> &mut SuppliedKeys;

    /// Check backend-specific requirements and dry-construct the client
    ///
    /// Unknown values are skipped; they are checked again once known.
    ///
    /// # Errors
    /// Returns `TransportError::Invalid` naming the offending field under `path`
    fn validate(&self, path: &AttributePath) -> Result<(), TransportError>;

    /// Construct the real client
    async fn build_client(&self) -> Result<Arc<dyn Transport>, ExecError>;

    /// Set a field and record it as supplied; `false` if the key is not declared
    fn set(&mut self, name: &str, value: TfString) -> bool {
        match self.field_mut(name) {
            Some(field) => {
                *field = value;
                self.supplied_mut().insert(name);
                true
            }
            None => false,
        }
    }

    /// Builder form of [`BackendConfig::set`]; undeclared keys are ignored
    #[must_use]
    fn with(mut self, name: &str, value: impl Into<TfString>) -> Self {
        self.set(name, value.into());
        self
    }
}

/// Declared keys of a backend
#[must_use]
pub fn field_names<B: BackendConfig>() -> Vec<&'static str> {
    B::FIELDS.iter().map(|f| f.name).collect()
}

/// Decode a backend block, enforcing the closed key set
pub(crate) fn decode_backend<B: BackendConfig>(
    value: &Value,
    path: &AttributePath,
) -> Result<B, DecodeError> {
    let reader = ObjectReader::new(value, path)?;
    reader.reject_unknown_keys(&field_names::<B>())?;

    let mut config = B::default();
    for key in reader.keys() {
        let attr = reader.attr::<String>(key)?;
        config.set(key, attr);
    }
    Ok(config)
}

/// Encode only the supplied keys
pub(crate) fn encode_backend<B: BackendConfig>(config: &B) -> Value {
    Value::Object(
        config
            .supplied()
            .iter()
            .filter_map(|key| config.field(key).map(|f| (key.to_string(), f.encode())))
            .collect(),
    )
}

/// Object type whose attributes are exactly the supplied keys
pub(crate) fn backend_type<B: BackendConfig>(config: &B) -> WireType {
    WireType::object(config.supplied().iter().map(|key| (key, WireType::String)))
}

/// Merge one backend: resource, then provider default, then environment
pub(crate) fn merge_backend<B: BackendConfig>(
    resource: &B,
    defaults: Option<&B>,
    env: &dyn EnvLookup,
) -> B {
    let mut merged = B::default();

    for field in B::FIELDS {
        let own = resource.field(field.name).cloned().unwrap_or_default();
        let chosen = if own.is_known() {
            own
        } else if let Some(default) = defaults
            .and_then(|d| d.field(field.name))
            .filter(|d| d.is_known())
        {
            default.clone()
        } else if let Some(value) = env.var(field.env) {
            TfString::Known(value)
        } else {
            own
        };

        if resource.supplied().contains(field.name) || !chosen.is_null() {
            merged.set(field.name, chosen);
        }
    }

    merged
}

/// Paths of identity fields that differ between two configs of one backend
pub(crate) fn replaced_fields<B: BackendConfig>(
    prior: &B,
    proposed: &B,
    path: &AttributePath,
) -> Vec<AttributePath> {
    B::FIELDS
        .iter()
        .filter(|field| field.forces_replacement)
        .filter(|field| prior.field(field.name) != proposed.field(field.name))
        .map(|field| path.attr(field.name))
        .collect()
}

/// Render a field for diagnostics
pub(crate) fn render_field(field: &Field, value: &TfString) -> String {
    match value {
        TfString::Null => "null".to_string(),
        TfString::Unknown => "(known after apply)".to_string(),
        TfString::Known(_) if field.sensitive => REDACTED.to_string(),
        TfString::Known(v) => format!("{v:?}"),
    }
}

/// Redacted `key = value` lines for the supplied fields
pub(crate) fn redacted_lines<B: BackendConfig>(config: &B) -> Vec<(&'static str, String)> {
    B::FIELDS
        .iter()
        .filter(|field| config.supplied().contains(field.name))
        .filter_map(|field| {
            config
                .field(field.name)
                .map(|value| (field.name, render_field(field, value)))
        })
        .collect()
}

/// Redacted `Debug` body shared by the backend configs
pub(crate) fn fmt_redacted<B: BackendConfig>(
    config: &B,
    name: &str,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    let mut s = f.debug_struct(name);
    for (key, rendered) in redacted_lines(config) {
        s.field(key, &format_args!("{rendered}"));
    }
    s.finish()
}

/// Value of a required field during validation
///
/// `Ok(None)` means the value is not known yet.
pub(crate) fn require<'a>(
    value: &'a TfString,
    path: &AttributePath,
    name: &str,
) -> Result<Option<&'a str>, TransportError> {
    match value {
        TfString::Null => Err(TransportError::invalid(
            path.attr(name),
            format!("missing {name}"),
            format!("the {name} attribute is required"),
        )),
        TfString::Unknown => Ok(None),
        TfString::Known(v) if v.trim().is_empty() => Err(TransportError::invalid(
            path.attr(name),
            format!("empty {name}"),
            format!("the {name} attribute must not be empty"),
        )),
        TfString::Known(v) => Ok(Some(v)),
    }
}

/// Value of a field that must be known when building a client
pub(crate) fn known<'a>(value: &'a TfString, name: &str) -> Result<&'a str, ExecError> {
    value
        .get()
        .map(String::as_str)
        .ok_or_else(|| ExecError::ConfigError(format!("{name} is not known")))
}

/// Known, non-empty value of an optional field
pub(crate) fn optional(value: &TfString) -> Option<&str> {
    value
        .get()
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        for kind in TransportKind::ALL {
            assert_eq!(TransportKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(TransportKind::from_name("winrm"), None);
        assert_eq!(TransportKind::Kubernetes.to_string(), "kubernetes");
    }

    #[test]
    fn test_render_field() {
        let secret = Field {
            name: "secret_id",
            env: "ENOS_NOMAD_SECRET_ID",
            sensitive: true,
            forces_replacement: false,
        };
        assert_eq!(render_field(&secret, &TfString::known("abc")), REDACTED);
        assert_eq!(render_field(&secret, &TfString::Unknown), "(known after apply)");
        assert_eq!(render_field(&secret, &TfString::Null), "null");

        let plain = Field {
            sensitive: false,
            ..secret
        };
        assert_eq!(render_field(&plain, &TfString::known("abc")), "\"abc\"");
    }

    #[test]
    fn test_require() {
        let path = AttributePath::new("transport").attr("ssh");
        assert_eq!(require(&TfString::known("h"), &path, "host").unwrap(), Some("h"));
        assert_eq!(require(&TfString::Unknown, &path, "host").unwrap(), None);

        let err = require(&TfString::Null, &path, "host").unwrap_err();
        assert_eq!(err.path().map(ToString::to_string).as_deref(), Some("transport.ssh.host"));
        assert!(require(&TfString::known("  "), &path, "host").is_err());
    }
}
