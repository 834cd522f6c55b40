//! enos-resources: Managed object types
//!
//! Each type supplies a schema and a business action run over the resolved
//! transport: remote commands, files, Vault unsealing and host facts.

pub mod error;
pub mod file;
pub mod host_info;
mod remote;
pub mod remote_exec;
pub mod vault_unseal;

pub use error::ResourceError;
pub use file::{FileState, RemoteFile};
pub use host_info::{HostFacts, HostInfo, HostInfoState};
pub use remote_exec::{RemoteExec, RemoteExecState};
pub use vault_unseal::{SealType, VaultUnseal, VaultUnsealState};

use enos_core::Registry;

/// Register every resource type this crate provides
pub fn register_all(registry: &mut Registry) {
    registry
        .register(RemoteExec)
        .register(RemoteFile)
        .register(VaultUnseal)
        .register(HostInfo);
}
