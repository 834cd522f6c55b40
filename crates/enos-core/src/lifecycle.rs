//! Lifecycle phases shared by every resource type
//!
//! Each phase decodes its own copies of the states involved, so concurrent
//! calls for different objects never share mutable state. The provider store
//! is the single synchronization point.

use std::sync::Arc;

use async_trait::async_trait;
use enos_transport::TransportConfig;
use enos_wire::{AttributePath, Value, WireObject};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::diag::Diagnostic;
use crate::error::CoreError;
use crate::provider::ProviderStore;
use crate::resource::{ClientFactory, Resource};
use crate::schema::Schema;
use crate::state::{State, decode_state, encode_state};

/// `id` assigned when an action does not produce one
pub const STATIC_ID: &str = "static";

/// Result of Read
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResponse {
    pub state: Value,
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of Plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlanResponse {
    pub planned: Value,
    /// Attributes whose change forces the object to be replaced
    pub requires_replace: Vec<AttributePath>,
}

/// Result of Apply
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyResponse {
    pub new_state: Value,
    /// Whether the business action ran
    pub applied: bool,
}

/// Host-facing summary of a registered resource type
#[derive(Debug, Clone, Serialize)]
pub struct ResourceInfo {
    pub type_name: &'static str,
    pub schema: Schema,
}

/// Object-safe view of a resource's lifecycle, dispatched by type name
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Host-facing type name
    fn type_name(&self) -> &'static str;

    /// Current schema
    fn schema(&self) -> Schema;

    /// Check user configuration; no side effects
    async fn validate_config(&self, config: &Value, cancel: &CancellationToken) -> Vec<Diagnostic>;

    /// Re-encode state stored under `version` for the current schema
    async fn upgrade_state(
        &self,
        version: i64,
        raw: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, CoreError>;

    /// Refresh current state
    async fn read(&self, current: &Value, cancel: &CancellationToken)
    -> Result<ReadResponse, CoreError>;

    /// Compute the planned state and replacement paths
    async fn plan(
        &self,
        prior: &Value,
        proposed: &Value,
        cancel: &CancellationToken,
    ) -> Result<PlanResponse, CoreError>;

    /// Apply a plan; a null `planned` destroys the object
    async fn apply(
        &self,
        prior: &Value,
        planned: &Value,
        cancel: &CancellationToken,
    ) -> Result<ApplyResponse, CoreError>;

    /// State for an existing object identified by `id`
    async fn import_state(&self, id: &str, cancel: &CancellationToken) -> Result<Value, CoreError>;
}

/// Lifecycle orchestrator for one resource type
pub struct Lifecycle<R: Resource> {
    resource: R,
    provider: Arc<ProviderStore>,
    clients: Arc<dyn ClientFactory>,
}

impl<R: Resource> Lifecycle<R> {
    /// Create an orchestrator for `resource`
    pub fn new(resource: R, provider: Arc<ProviderStore>, clients: Arc<dyn ClientFactory>) -> Self {
        Self {
            resource,
            provider,
            clients,
        }
    }

    /// The wrapped resource
    pub fn resource(&self) -> &R {
        &self.resource
    }

    fn ensure_live(cancel: &CancellationToken) -> Result<(), CoreError> {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        Ok(())
    }

    /// Resource transport merged over the current provider defaults
    async fn defaulted(&self, transport: &TransportConfig) -> TransportConfig {
        let defaults = self.provider.get().await.transport;
        transport.apply_defaults(&defaults)
    }

    /// Run the refresh action, degrading every failure to a warning
    async fn refresh(&self, state: &mut R::State) -> Option<Diagnostic> {
        let outcome = async {
            let resolved = self.defaulted(state.transport()).await.validate()?;
            let client = self.clients.build(&resolved).await?;
            let result = self.resource.refresh(client.clone(), state).await;
            if let Err(e) = client.close().await {
                debug!(error = %e, "failed to close transport after refresh");
            }
            result
        }
        .await;

        match outcome {
            Ok(()) => None,
            Err(e) => {
                warn!(resource = %self.resource.type_name(), error = %e, "refresh failed, outputs marked unknown");
                state.mark_outputs_unknown();
                Some(Diagnostic::warning(
                    format!("unable to refresh {}", self.resource.type_name()),
                    e.to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl<R: Resource> ResourceHandler for Lifecycle<R> {
    fn type_name(&self) -> &'static str {
        self.resource.type_name()
    }

    fn schema(&self) -> Schema {
        self.resource.schema()
    }

    #[instrument(skip_all, fields(resource = %self.resource.type_name()))]
    async fn validate_config(&self, config: &Value, cancel: &CancellationToken) -> Vec<Diagnostic> {
        if let Err(e) = Self::ensure_live(cancel) {
            return vec![e.to_diagnostic()];
        }

        let mut diagnostics = self.resource.schema().check_config(config);
        if !diagnostics.is_empty() {
            return diagnostics;
        }

        match decode_state::<R::State>(config) {
            Ok(Some(state)) => {
                if let Err(e) = self.resource.validate(&state) {
                    diagnostics.push(e.to_diagnostic());
                }
            }
            Ok(None) => {}
            Err(e) => diagnostics.push(e.to_diagnostic()),
        }

        diagnostics
    }

    #[instrument(skip(self, raw, cancel), fields(resource = %self.resource.type_name()))]
    async fn upgrade_state(
        &self,
        version: i64,
        raw: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, CoreError> {
        Self::ensure_live(cancel)?;

        let upgraded = self.resource.upgrade(version, raw.clone())?;
        let state = decode_state::<R::State>(&upgraded)?;
        Ok(encode_state(state.as_ref()))
    }

    #[instrument(skip_all, fields(resource = %self.resource.type_name()))]
    async fn read(
        &self,
        current: &Value,
        cancel: &CancellationToken,
    ) -> Result<ReadResponse, CoreError> {
        Self::ensure_live(cancel)?;

        let Some(mut state) = decode_state::<R::State>(current)? else {
            return Ok(ReadResponse {
                state: Value::Null,
                diagnostics: Vec::new(),
            });
        };

        let mut diagnostics = Vec::new();
        if self.resource.refreshes() && state.id().is_known() {
            diagnostics.extend(self.refresh(&mut state).await);
        }

        Ok(ReadResponse {
            state: state.encode(),
            diagnostics,
        })
    }

    #[instrument(skip_all, fields(resource = %self.resource.type_name()))]
    async fn plan(
        &self,
        prior: &Value,
        proposed: &Value,
        cancel: &CancellationToken,
    ) -> Result<PlanResponse, CoreError> {
        Self::ensure_live(cancel)?;

        let prior = decode_state::<R::State>(prior)?;
        let Some(mut planned) = decode_state::<R::State>(proposed)? else {
            debug!("planning destroy");
            return Ok(PlanResponse {
                planned: Value::Null,
                requires_replace: Vec::new(),
            });
        };

        let transport = self.defaulted(planned.transport()).await;
        if !transport.is_unknown() {
            transport.check()?;
        }
        self.resource.validate(&planned)?;

        let mut requires_replace = Vec::new();
        match prior.as_ref().filter(|p| p.id().is_known()) {
            Some(prior) => {
                let prior_transport = self.defaulted(prior.transport()).await;
                requires_replace =
                    TransportConfig::replaced_attribute_paths(&prior_transport, &transport);

                *planned.id_mut() = prior.id().clone();
                if requires_replace.is_empty() && !self.resource.needs_action(prior, &planned) {
                    planned.carry_outputs(prior);
                } else {
                    planned.mark_outputs_unknown();
                }
            }
            None => {
                planned.id_mut().set_unknown();
                planned.mark_outputs_unknown();
            }
        }

        if requires_replace.is_empty() {
            debug!("planned in-place");
        } else {
            info!(paths = ?requires_replace, "change forces replacement");
        }

        Ok(PlanResponse {
            planned: planned.encode(),
            requires_replace,
        })
    }

    #[instrument(skip_all, fields(resource = %self.resource.type_name()))]
    async fn apply(
        &self,
        prior: &Value,
        planned: &Value,
        cancel: &CancellationToken,
    ) -> Result<ApplyResponse, CoreError> {
        Self::ensure_live(cancel)?;

        let Some(mut state) = decode_state::<R::State>(planned)? else {
            info!("destroyed");
            return Ok(ApplyResponse {
                new_state: Value::Null,
                applied: false,
            });
        };
        let prior = decode_state::<R::State>(prior)?;

        if let Some(prior) = prior.as_ref().filter(|p| p.id().is_known()) {
            if !self.resource.needs_action(prior, &state) {
                debug!("no change affects the action, keeping prior outputs");
                *state.id_mut() = prior.id().clone();
                state.carry_outputs(prior);
                return Ok(ApplyResponse {
                    new_state: state.encode(),
                    applied: false,
                });
            }
        }

        let resolved = self.defaulted(state.transport()).await.validate()?;
        self.resource.validate(&state)?;

        Self::ensure_live(cancel)?;
        let client = self.clients.build(&resolved).await?;

        info!(transport = %resolved.kind(), "applying");
        let result = self.resource.apply(client.clone(), &mut state).await;
        if let Err(e) = client.close().await {
            warn!(error = %e, "failed to close transport");
        }
        result?;

        if !state.id().is_known() {
            state.id_mut().set(STATIC_ID);
        }

        Ok(ApplyResponse {
            new_state: state.encode(),
            applied: true,
        })
    }

    #[instrument(skip(self, cancel), fields(resource = %self.resource.type_name()))]
    async fn import_state(&self, id: &str, cancel: &CancellationToken) -> Result<Value, CoreError> {
        Self::ensure_live(cancel)?;

        let mut state = R::State::default();
        state.id_mut().set(id);
        Ok(state.encode())
    }
}
