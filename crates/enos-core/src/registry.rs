//! Registry of resource types, dispatched by type name

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::CoreError;
use crate::lifecycle::{Lifecycle, ResourceHandler, ResourceInfo};
use crate::provider::ProviderStore;
use crate::resource::{ClientFactory, Resource, TransportClientFactory};

/// Every resource type the provider serves
pub struct Registry {
    provider: Arc<ProviderStore>,
    clients: Arc<dyn ClientFactory>,
    handlers: BTreeMap<&'static str, Arc<dyn ResourceHandler>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Arc::new(ProviderStore::default()), Arc::new(TransportClientFactory))
    }
}

impl Registry {
    /// Create an empty registry sharing `provider` and `clients`
    pub fn new(provider: Arc<ProviderStore>, clients: Arc<dyn ClientFactory>) -> Self {
        Self {
            provider,
            clients,
            handlers: BTreeMap::new(),
        }
    }

    /// Register a resource type
    ///
    /// A later registration under the same type name replaces the earlier one.
    pub fn register<R: Resource>(&mut self, resource: R) -> &mut Self {
        let name = resource.type_name();
        debug!(resource = %name, "registering resource type");
        let lifecycle = Lifecycle::new(resource, self.provider.clone(), self.clients.clone());
        self.handlers.insert(name, Arc::new(lifecycle));
        self
    }

    /// Handler for `type_name`
    ///
    /// # Errors
    /// Returns `CoreError::UnknownResource` if nothing is registered under it
    pub fn get(&self, type_name: &str) -> Result<Arc<dyn ResourceHandler>, CoreError> {
        self.handlers
            .get(type_name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownResource(type_name.to_string()))
    }

    /// Registered type names in sorted order
    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    /// Name and schema of every registered type
    #[must_use]
    pub fn describe(&self) -> Vec<ResourceInfo> {
        self.handlers
            .values()
            .map(|h| ResourceInfo {
                type_name: h.type_name(),
                schema: h.schema(),
            })
            .collect()
    }

    /// Shared provider configuration
    #[must_use]
    pub fn provider(&self) -> &Arc<ProviderStore> {
        &self.provider
    }
}
