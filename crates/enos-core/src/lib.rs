//! enos-core: Resource lifecycle orchestration
//!
//! Drives every managed object type through validate, upgrade, read, plan,
//! apply and import, resolving its transport against provider defaults on
//! the way.

pub mod diag;
pub mod error;
pub mod lifecycle;
pub mod provider;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod state;

pub use diag::{Diagnostic, Severity, has_errors};
pub use error::CoreError;
pub use lifecycle::{
    ApplyResponse, Lifecycle, PlanResponse, ReadResponse, ResourceHandler, ResourceInfo, STATIC_ID,
};
pub use provider::{ProviderConfig, ProviderStore};
pub use registry::Registry;
pub use resource::{ClientFactory, Resource, TransportClientFactory};
pub use schema::{Attribute, AttributeKind, ID_ATTRIBUTE, Schema};
pub use state::{State, decode_state, encode_state};

pub use tokio_util::sync::CancellationToken;
