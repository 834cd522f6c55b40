//! Configuration loading and types

use std::path::{Path, PathBuf};

use enos_core::ProviderConfig;
use enos_wire::Value;
use eyre::WrapErr;
use serde::Deserialize;

/// File name looked up in the working directory and the user config dir
pub const CONFIG_FILE: &str = "enos.toml";

/// Top-level configuration for the enos binary
///
/// ```toml
/// log_level = "debug"
///
/// [provider.transport.ssh]
/// user = "ubuntu"
/// private_key_path = "~/.ssh/id_ed25519"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log level used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Provider block, decoded like the host's provider configuration
    #[serde(default)]
    pub provider: toml::Table,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            provider: toml::Table::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).wrap_err_with(|| format!("invalid {}", path.display()))?;
        Ok(config)
    }

    /// Load `explicit` if given, else the first existing default path, else
    /// defaults
    ///
    /// # Errors
    /// Returns error if the chosen file cannot be read or parsed
    pub fn discover(explicit: Option<&Path>) -> eyre::Result<Self> {
        let candidates: Vec<PathBuf> = [
            Some(PathBuf::from(CONFIG_FILE)),
            dirs::config_dir().map(|p| p.join("enos").join(CONFIG_FILE)),
        ]
        .into_iter()
        .flatten()
        .collect();
        Self::discover_in(explicit, &candidates)
    }

    fn discover_in(explicit: Option<&Path>, candidates: &[PathBuf]) -> eyre::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        for path in candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Config::default())
    }

    /// Provider defaults as a wire value
    ///
    /// # Errors
    /// Returns error if the table cannot be represented as JSON
    pub fn provider_value(&self) -> eyre::Result<Value> {
        let json = serde_json::to_value(&self.provider)?;
        Ok(Value::from_json(&json))
    }

    /// Decoded provider defaults
    ///
    /// # Errors
    /// Returns error if the provider block does not decode
    pub fn provider_config(&self) -> eyre::Result<ProviderConfig> {
        let value = self.provider_value()?;
        ProviderConfig::from_value(&value).wrap_err("invalid [provider] configuration")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use enos_core::CoreError;
    use enos_transport::TransportKind;

    use super::*;

    fn write(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::discover_in(None, &[PathBuf::from("/nonexistent/enos.toml")]).unwrap();
        assert_eq!(config.log_level, "info");
        assert!(!config.provider_config().unwrap().transport.is_configured());
    }

    #[test]
    fn test_provider_transport() {
        let file = write(
            r#"
log_level = "debug"

[provider.transport.ssh]
user = "ubuntu"
host = "10.0.0.5:2222"
"#,
        );
        let config = Config::discover_in(Some(file.path()), &[]).unwrap();
        assert_eq!(config.log_level, "debug");

        let provider = config.provider_config().unwrap();
        assert_eq!(provider.transport.kind(), Some(TransportKind::Ssh));
        assert_eq!(provider.transport.supplied_keys(), ["host", "user"]);
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let file = write("log_level = \"warn\"\n");
        let config = Config::discover_in(
            None,
            &[PathBuf::from("/nonexistent/enos.toml"), file.path().to_path_buf()],
        )
        .unwrap();
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_unknown_ssh_field_rejected() {
        let file = write("[provider.transport.ssh]\nport = 22\n");
        let config = Config::load(file.path()).unwrap();
        let err = config.provider_config().unwrap_err();
        let core = err.downcast_ref::<CoreError>().unwrap();
        assert_eq!(
            core.path().map(ToString::to_string).as_deref(),
            Some("transport.ssh.port")
        );
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        assert!(Config::discover_in(Some(Path::new("/nonexistent/enos.toml")), &[]).is_err());
    }
}
