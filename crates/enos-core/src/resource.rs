//! Resource trait implemented by every managed object type

use std::sync::Arc;

use async_trait::async_trait;
use enos_exec::Transport;
use enos_transport::{ResolvedTransport, TransportError};
use enos_wire::Value;

use crate::error::CoreError;
use crate::schema::Schema;
use crate::state::State;

/// A managed object type
///
/// The lifecycle orchestrator drives decode, defaults, validation and client
/// construction; implementors supply the schema and the business action.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// Typed state
    type State: State;

    /// Host-facing type name, e.g. `enos_file`
    fn type_name(&self) -> &'static str;

    /// Current schema
    fn schema(&self) -> Schema;

    /// Convert raw state stored under `version` into the current encoding
    ///
    /// # Errors
    /// Returns `CoreError::UnsupportedVersion` for versions this build does
    /// not know
    fn upgrade(&self, version: i64, raw: Value) -> Result<Value, CoreError> {
        let current = self.schema().version;
        if version == current {
            Ok(raw)
        } else {
            Err(CoreError::UnsupportedVersion { version, current })
        }
    }

    /// Resource checks beyond decode and transport validation
    ///
    /// # Errors
    /// Returns `CoreError::Validation` naming the offending attribute
    fn validate(&self, _state: &Self::State) -> Result<(), CoreError> {
        Ok(())
    }

    /// Whether moving from `prior` to `planned` requires running the action
    ///
    /// Compares only the attributes the action depends on.
    fn needs_action(&self, prior: &Self::State, planned: &Self::State) -> bool;

    /// Run the business action, filling in computed outputs on `state`
    ///
    /// # Errors
    /// Returns `CoreError::Action` when the remote operation fails
    async fn apply(&self, client: Arc<dyn Transport>, state: &mut Self::State)
    -> Result<(), CoreError>;

    /// Whether Read should fetch fresh facts through [`Resource::refresh`]
    fn refreshes(&self) -> bool {
        false
    }

    /// Re-read externally observable facts into `state`
    ///
    /// # Errors
    /// Returns `CoreError::Action` when the facts cannot be read
    async fn refresh(
        &self,
        _client: Arc<dyn Transport>,
        _state: &mut Self::State,
    ) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Turns a resolved transport into a client
///
/// Tests swap in a factory returning mock transports.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Build a client for `transport`
    async fn build(&self, transport: &ResolvedTransport)
    -> Result<Arc<dyn Transport>, TransportError>;
}

/// Factory that builds real SSH, Kubernetes and Nomad clients
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportClientFactory;

#[async_trait]
impl ClientFactory for TransportClientFactory {
    async fn build(
        &self,
        transport: &ResolvedTransport,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        transport.build_client().await
    }
}
