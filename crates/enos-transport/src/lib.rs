//! enos-transport: Transport configuration resolution
//!
//! Decodes the `transport` attribute into one of the SSH, Kubernetes or Nomad
//! backend configs, merges provider defaults and environment fallbacks,
//! computes replacement paths, redacts secrets and builds clients.

pub mod backend;
pub mod config;
pub mod env;
pub mod error;
pub mod kubernetes;
pub mod nomad;
pub mod ssh;

pub use backend::{BackendConfig, Field, REDACTED, SuppliedKeys, TransportKind};
pub use config::{Backend, ResolvedTransport, TRANSPORT_ATTRIBUTE, TransportConfig};
pub use env::{EmptyEnv, EnvLookup, ProcessEnv};
pub use error::TransportError;
pub use kubernetes::K8sConfig;
pub use nomad::NomadConfig;
pub use ssh::SshConfig;
