//! enos-exec: Transport clients
//!
//! Provides the uniform run/copy/close capability and its SSH, Kubernetes and
//! Nomad implementations.

pub mod error;
pub mod keys;
pub mod kubernetes;
pub mod nomad;
pub mod process;
pub mod result;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use keys::{KeyError, KeySource, PassphraseSource};
pub use kubernetes::{KubeTarget, KubernetesTransport};
pub use nomad::{NomadTarget, NomadTransport};
pub use result::{CommandResult, CopyRequest, ExecRequest, Output, OutputSink};
pub use ssh::{SshTarget, SshTransport};
pub use traits::{Transport, shell_quote};
