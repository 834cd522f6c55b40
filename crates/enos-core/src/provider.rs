//! Provider-level defaults shared by every resource

use enos_transport::TransportConfig;
use enos_wire::{AttributePath, DecodeError, ObjectReader, ObjectWriter, Value, WireObject, WireType};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::CoreError;

/// Provider configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderConfig {
    /// Default transport merged under every resource's transport
    pub transport: TransportConfig,
}

impl ProviderConfig {
    /// Decode a provider configuration from the root of `value`
    ///
    /// # Errors
    /// Returns `CoreError::Decode` if the value does not match
    pub fn from_value(value: &Value) -> Result<Self, CoreError> {
        Ok(Self::decode(value, &AttributePath::root())?)
    }
}

impl WireObject for ProviderConfig {
    fn wire_type(&self) -> WireType {
        WireType::object([("transport", self.transport.wire_type())])
    }

    fn encode(&self) -> Value {
        ObjectWriter::new()
            .object("transport", &self.transport)
            .finish()
    }

    fn decode(value: &Value, path: &AttributePath) -> Result<Self, DecodeError> {
        let reader = ObjectReader::new(value, path)?;
        reader.reject_unknown_keys(&["transport"])?;
        Ok(Self {
            transport: reader.object("transport")?,
        })
    }
}

/// Holder of the current provider configuration
///
/// The lock is held only to clone the config out or replace it, never across
/// remote I/O.
#[derive(Debug, Default)]
pub struct ProviderStore {
    config: Mutex<ProviderConfig>,
}

impl ProviderStore {
    /// Create a store holding `config`
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }

    /// Snapshot of the current configuration
    pub async fn get(&self) -> ProviderConfig {
        self.config.lock().await.clone()
    }

    /// Replace the configuration
    pub async fn set(&self, config: ProviderConfig) {
        debug!(transport = %config.transport, "provider configuration updated");
        *self.config.lock().await = config;
    }

    /// Decode and install a provider configuration
    ///
    /// # Errors
    /// Returns `CoreError::Decode` if the value does not match; the current
    /// configuration is left in place
    pub async fn configure(&self, value: &Value) -> Result<(), CoreError> {
        let config = ProviderConfig::from_value(value)?;
        info!(transport = ?config.transport.kind(), "configuring provider");
        self.set(config).await;
        Ok(())
    }
}
