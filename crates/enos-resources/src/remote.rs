//! Helpers shared by resource actions

use enos_exec::{CommandResult, ExecRequest, Transport};
use sha2::{Digest, Sha256};
use tracing::{debug, error};

use crate::error::ResourceError;

/// Run a request and fail on a non-zero exit status
pub(crate) async fn run_checked(
    client: &dyn Transport,
    action: &str,
    request: ExecRequest,
) -> Result<CommandResult, ResourceError> {
    let result = client.run(request).await?;
    debug!(action = action, status = result.status, "command completed");

    if !result.success() {
        error!(action = action, status = result.status, "command failed");
        return Err(ResourceError::CommandFailed {
            action: action.to_string(),
            status: result.status,
            stderr: result.stderr.trim().to_string(),
        });
    }
    Ok(result)
}

/// Hex encoded SHA-256 of `parts`, each terminated so boundaries matter
pub(crate) fn sha256_hex<I, T>(parts: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_ref());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
